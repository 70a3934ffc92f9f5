// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use testbench_telemetry::application::row_source::load_registry;
use testbench_telemetry::infrastructure::config::{load_settings, SourceKind};
use testbench_telemetry::infrastructure::memory_source::InMemoryRowSource;
use testbench_telemetry::infrastructure::postgres_source::PostgresRowSource;
use testbench_telemetry::presentation::app_state::{AppState, DeviceInfo};
use testbench_telemetry::presentation::routes::build_router;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let settings = load_settings()?;
    let max_points = settings.sampling.max_points;
    let policy = settings.channels.resolution;

    // Create row source (infrastructure layer) and application state
    let state = match settings.source.kind {
        SourceKind::Postgres => {
            let database = settings
                .database
                .as_ref()
                .context("missing [database] section")?;
            let source = Arc::new(PostgresRowSource::connect(database, settings.devices.clone()).await?);
            let tables = settings.device_tables();
            let registry = load_registry(source.as_ref(), &tables).await?;
            let devices = settings
                .devices
                .iter()
                .map(|d| DeviceInfo {
                    table: d.table.clone(),
                    label: d.label().to_string(),
                })
                .collect();
            AppState::new(source, registry, devices, max_points, policy)
        }
        SourceKind::Demo => {
            tracing::warn!("Serving the built-in demo dataset");
            let source = Arc::new(InMemoryRowSource::demo()?);
            let tables = source.device_names();
            let registry = load_registry(source.as_ref(), &tables).await?;
            let devices = tables
                .iter()
                .map(|t| DeviceInfo {
                    table: t.clone(),
                    label: t.clone(),
                })
                .collect();
            AppState::new(source, registry, devices, max_points, policy)
        }
    };
    tracing::info!(
        "Loaded {} devices, {} channels",
        state.devices.len(),
        state.registry.channels().len()
    );

    // Build router (presentation layer)
    let router = build_router(Arc::new(state));

    // Start server
    let addr: SocketAddr = settings
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", settings.server.bind))?;
    tracing::info!("Starting testbench-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
