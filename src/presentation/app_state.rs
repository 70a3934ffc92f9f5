// Application state for HTTP handlers
use crate::application::orchestrator::FetchOrchestrator;
use crate::application::query_executor::QueryExecutor;
use crate::application::row_source::{Catalog, RowSource};
use crate::domain::channel::{ChannelRegistry, ResolutionPolicy};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub table: String,
    pub label: String,
}

#[derive(Clone)]
pub struct AppState {
    pub executor: QueryExecutor,
    pub orchestrator: FetchOrchestrator,
    pub catalog: Arc<dyn Catalog>,
    pub registry: Arc<ChannelRegistry>,
    pub devices: Vec<DeviceInfo>,
    pub max_points: usize,
}

impl AppState {
    pub fn new<S>(
        source: Arc<S>,
        registry: ChannelRegistry,
        devices: Vec<DeviceInfo>,
        max_points: usize,
        policy: ResolutionPolicy,
    ) -> Self
    where
        S: RowSource + Catalog + 'static,
    {
        let registry = Arc::new(registry);
        let executor = QueryExecutor::new(source.clone());
        let orchestrator = FetchOrchestrator::new(registry.clone(), Arc::new(executor.clone()), policy);
        Self {
            executor,
            orchestrator,
            catalog: source,
            registry,
            devices,
            max_points,
        }
    }
}
