// Row source and catalog traits for recorded test data
use crate::domain::channel::{Channel, ChannelRegistry, DeviceChannels};
use crate::domain::data::{DataPoint, DataStats, TimeRange};
use crate::domain::test_run::TestRun;
use async_trait::async_trait;

/// Row selection pushed down to a row source.
#[derive(Debug, Clone, Copy)]
pub struct RowQuery<'a> {
    pub test_id: &'a str,
    pub channels: &'a [String],
    pub range: Option<TimeRange>,
    /// Keep only rows whose stable ordinal is a multiple of this value.
    pub stride: Option<u64>,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait RowSource: Send + Sync {
    /// Count rows of a test in a device table, optionally within a closed UTC range
    async fn count(&self, device: &str, test_id: &str, range: Option<TimeRange>) -> anyhow::Result<u64>;

    /// Fetch rows ordered by ascending timestamp
    async fn fetch_range(&self, device: &str, query: RowQuery<'_>) -> anyhow::Result<Vec<DataPoint>>;

    async fn stats(&self, device: &str, test_id: &str) -> anyhow::Result<DataStats>;
}

/// Reference data loaded once per session.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_tests(&self) -> anyhow::Result<Vec<TestRun>>;

    async fn list_channels(&self, device: &str) -> anyhow::Result<Vec<Channel>>;
}

/// Build the channel registry for `devices`, keeping their order.
pub async fn load_registry<C>(catalog: &C, devices: &[String]) -> anyhow::Result<ChannelRegistry>
where
    C: Catalog + ?Sized,
{
    let mut entries = Vec::with_capacity(devices.len());
    for device in devices {
        let channels = catalog.list_channels(device).await?;
        tracing::debug!("Loaded {} channels for device {}", channels.len(), device);
        entries.push(DeviceChannels {
            device: device.clone(),
            channels,
        });
    }
    Ok(ChannelRegistry::new(entries))
}
