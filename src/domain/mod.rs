// Domain layer - Core business models
pub mod channel;
pub mod chart;
pub mod data;
pub mod error;
pub mod sampling;
pub mod test_run;
pub mod zoom;
