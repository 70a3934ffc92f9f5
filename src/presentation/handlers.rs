// HTTP request handlers
use crate::domain::channel::{Channel, ChannelRef, ChannelRegistry};
use crate::domain::data::{DataResponse, DataStats, TimeRange};
use crate::domain::error::CoreError;
use crate::domain::test_run::TestRun;
use crate::presentation::app_state::{AppState, DeviceInfo};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    pub ensayo: Option<String>,
    pub channels: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub max_points: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub ensayo: Option<String>,
}

fn required_test_id(ensayo: Option<String>) -> Result<String, CoreError> {
    ensayo
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| CoreError::invalid("missing required parameter: ensayo"))
}

fn device_channels<'a>(state: &'a AppState, device: &str) -> Result<&'a [Channel], CoreError> {
    state
        .registry
        .list_channels(device)
        .ok_or_else(|| CoreError::UnknownDevice(device.to_string()))
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK", "timestamp": Utc::now().to_rfc3339() }))
}

pub async fn list_tests(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TestRun>>, CoreError> {
    state
        .catalog
        .list_tests()
        .await
        .map(Json)
        .map_err(CoreError::SourceUnavailable)
}

pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<Vec<DeviceInfo>> {
    Json(state.devices.clone())
}

/// Every device's channels, in registry order
pub async fn all_channels(State(state): State<Arc<AppState>>) -> Json<ChannelRegistry> {
    Json(state.registry.as_ref().clone())
}

pub async fn list_channels(
    Path(device): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Channel>>, CoreError> {
    device_channels(&state, &device).map(|channels| Json(channels.to_vec()))
}

/// Sampled data for one device
pub async fn device_data(
    Path(device): Path<String>,
    Query(query): Query<DataQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataResponse>, CoreError> {
    tracing::debug!("Data request for {}: {:?}", device, query);

    let known = device_channels(&state, &device)?;
    let test_id = required_test_id(query.ensayo)?;
    let channels: Vec<String> = query
        .channels
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();
    if channels.is_empty() {
        return Err(CoreError::invalid("missing required parameter: channels"));
    }
    if let Some(unknown) = channels.iter().find(|c| !known.iter().any(|k| &k.name == *c)) {
        return Err(CoreError::invalid(format!(
            "device '{}' has no channel '{}'",
            device, unknown
        )));
    }

    let range = TimeRange::from_bounds(query.start_time, query.end_time)?;
    let budget = query.max_points.unwrap_or(state.max_points);

    let response = state
        .executor
        .execute(&device, &test_id, &channels, range, budget)
        .await?;
    tracing::info!(
        "{}/{}: returned {} of {} rows (stride {})",
        device,
        test_id,
        response.metadata.returned_points,
        response.metadata.total_points,
        response.metadata.sampling_rate
    );
    Ok(Json(response))
}

/// Merged multi-device data for a `device:channel` selection
pub async fn merged_data(
    Query(query): Query<DataQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataResponse>, CoreError> {
    let test_id = required_test_id(query.ensayo)?;
    let selection = ChannelRef::parse_list(query.channels.as_deref().unwrap_or_default())?;
    let range = TimeRange::from_bounds(query.start_time, query.end_time)?;
    let budget = query.max_points.unwrap_or(state.max_points);

    state
        .orchestrator
        .fetch(&selection, &test_id, range, budget)
        .await
        .map(Json)
}

pub async fn device_stats(
    Path(device): Path<String>,
    Query(query): Query<StatsQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataStats>, CoreError> {
    device_channels(&state, &device)?;
    let test_id = required_test_id(query.ensayo)?;
    state.executor.stats(&device, &test_id).await.map(Json)
}
