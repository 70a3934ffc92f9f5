// Router assembly
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    all_channels, device_data, device_stats, health_check, list_channels, list_devices, list_tests,
    merged_data,
};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/ensayos", get(list_tests))
        .route("/api/devices", get(list_devices))
        .route("/api/channels", get(all_channels))
        .route("/api/channels/:device", get(list_channels))
        .route("/api/data", get(merged_data))
        .route("/api/data/:device", get(device_data))
        .route("/api/stats/:device", get(device_stats))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
