// Test bench telemetry: sampled time-series API and chart view engine
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
