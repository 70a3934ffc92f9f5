// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_client;
pub mod http_response;
pub mod memory_source;
pub mod postgres_source;
