// Multi-device fetch orchestrator - fan-out per device, merge by timestamp
use crate::application::query_executor::QueryExecutor;
use crate::domain::channel::{Channel, ChannelRef, ChannelRegistry, ResolutionPolicy};
use crate::domain::data::{DataResponse, TimeRange};
use crate::domain::error::{CoreError, CoreResult};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

/// Per-device query contract, served locally or over HTTP.
#[async_trait]
pub trait DeviceQuery: Send + Sync {
    async fn execute(
        &self,
        device: &str,
        test_id: &str,
        channels: &[String],
        range: Option<TimeRange>,
        point_budget: usize,
    ) -> CoreResult<DataResponse>;
}

#[async_trait]
impl DeviceQuery for QueryExecutor {
    async fn execute(
        &self,
        device: &str,
        test_id: &str,
        channels: &[String],
        range: Option<TimeRange>,
        point_budget: usize,
    ) -> CoreResult<DataResponse> {
        QueryExecutor::execute(self, device, test_id, channels, range, point_budget).await
    }
}

/// Channels of one device that a selection touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSelection {
    pub device: String,
    pub channels: Vec<String>,
}

/// A selected channel and the key its values carry in merged points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedSeries {
    pub device: String,
    pub key: String,
    pub channel: Channel,
}

/// Channel names selected from more than one device.
fn shared_names(groups: &[DeviceSelection]) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut shared = HashSet::new();
    for name in groups.iter().flat_map(|g| g.channels.iter()) {
        if !seen.insert(name.as_str()) {
            shared.insert(name.clone());
        }
    }
    shared
}

/// Merged values of a name shared across devices are keyed `device:name`.
fn value_key(device: &str, name: &str, shared: &HashSet<String>) -> String {
    if shared.contains(name) {
        format!("{}:{}", device, name)
    } else {
        name.to_string()
    }
}

fn rekey(response: &mut DataResponse, group: &DeviceSelection, shared: &HashSet<String>) {
    for name in group.channels.iter().filter(|n| shared.contains(n.as_str())) {
        let key = value_key(&group.device, name, shared);
        for point in &mut response.points {
            if let Some(value) = point.values.remove(name) {
                point.values.insert(key.clone(), value);
            }
        }
    }
}

#[derive(Clone)]
pub struct FetchOrchestrator {
    registry: Arc<ChannelRegistry>,
    devices: Arc<dyn DeviceQuery>,
    policy: ResolutionPolicy,
}

impl FetchOrchestrator {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        devices: Arc<dyn DeviceQuery>,
        policy: ResolutionPolicy,
    ) -> Self {
        Self {
            registry,
            devices,
            policy,
        }
    }

    /// Group a selection by owning device, in registry device order.
    pub fn partition(&self, selection: &[ChannelRef]) -> CoreResult<Vec<DeviceSelection>> {
        let mut groups: Vec<DeviceSelection> = Vec::new();
        for channel_ref in selection {
            let resolved = self.registry.resolve(channel_ref, self.policy)?;
            match groups.iter_mut().find(|g| g.device == resolved.device) {
                Some(group) => {
                    if !group.channels.contains(&resolved.channel.name) {
                        group.channels.push(resolved.channel.name.clone());
                    }
                }
                None => groups.push(DeviceSelection {
                    device: resolved.device.to_string(),
                    channels: vec![resolved.channel.name.clone()],
                }),
            }
        }

        let order: Vec<&str> = self.registry.devices().collect();
        groups.sort_by_key(|g| order.iter().position(|d| *d == g.device));
        Ok(groups)
    }

    /// Resolve a selection in its own order, one entry per distinct series,
    /// with the key each series is read from in merged points.
    pub fn series(&self, selection: &[ChannelRef]) -> CoreResult<Vec<SelectedSeries>> {
        let shared = shared_names(&self.partition(selection)?);
        let mut series: Vec<SelectedSeries> = Vec::with_capacity(selection.len());
        for channel_ref in selection {
            let resolved = self.registry.resolve(channel_ref, self.policy)?;
            let key = value_key(resolved.device, &resolved.channel.name, &shared);
            if series.iter().any(|s| s.key == key) {
                continue;
            }
            let mut channel = resolved.channel.clone();
            if shared.contains(&channel.name) {
                channel.display_name = format!("{} ({})", channel.display_name, resolved.device);
            }
            series.push(SelectedSeries {
                device: resolved.device.to_string(),
                key,
                channel,
            });
        }
        Ok(series)
    }

    /// Query every device touched by `selection` concurrently and merge the
    /// results. Any device failure fails the whole fetch.
    ///
    /// The merged metadata is copied from the first device's response; it is
    /// representative, not an aggregate. A channel name selected from several
    /// devices is keyed `device:name` in the merged points.
    pub async fn fetch(
        &self,
        selection: &[ChannelRef],
        test_id: &str,
        range: Option<TimeRange>,
        point_budget: usize,
    ) -> CoreResult<DataResponse> {
        if test_id.trim().is_empty() {
            return Err(CoreError::invalid("missing test id"));
        }
        if selection.is_empty() {
            return Err(CoreError::invalid("no channels selected"));
        }
        if point_budget == 0 {
            return Err(CoreError::invalid("point budget must be at least 1"));
        }
        if let Some(range) = range {
            TimeRange::new(range.start, range.end)?;
        }

        let groups = self.partition(selection)?;
        let shared = shared_names(&groups);
        for group in &groups {
            tracing::debug!("Fetching {:?} from device {}", group.channels, group.device);
        }

        let calls = groups.iter().map(|group| {
            self.devices
                .execute(&group.device, test_id, &group.channels, range, point_budget)
        });
        let results = join_all(calls).await;

        let mut responses = Vec::with_capacity(results.len());
        for (group, result) in groups.iter().zip(results) {
            match result {
                Ok(mut response) => {
                    rekey(&mut response, group, &shared);
                    responses.push(response);
                }
                Err(e) => {
                    tracing::error!("Device {} failed, dropping merged response: {}", group.device, e);
                    return Err(e);
                }
            }
        }

        Ok(merge_responses(responses, range))
    }
}

/// Concatenate in call order, then stable-sort by timestamp.
pub fn merge_responses(responses: Vec<DataResponse>, range: Option<TimeRange>) -> DataResponse {
    let metadata = responses.first().map(|r| r.metadata);
    let mut points: Vec<_> = responses.into_iter().flat_map(|r| r.points).collect();
    points.sort_by_key(|p| p.timestamp);

    let mut merged = DataResponse::new(points, 0, 1, range);
    if let Some(metadata) = metadata {
        merged.metadata = metadata;
    }
    merged
}
