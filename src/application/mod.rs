// Application layer - Use cases and the sampling/zoom engine
pub mod orchestrator;
pub mod query_executor;
pub mod renderer;
pub mod row_source;
pub mod view_controller;
pub mod zoom_sync;
