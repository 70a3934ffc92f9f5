// HTTP client for the per-device data API
use crate::application::orchestrator::DeviceQuery;
use crate::domain::channel::ChannelRegistry;
use crate::domain::data::{DataResponse, DataStats, TimeRange};
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::test_run::TestRun;
use crate::infrastructure::config::ClientSettings;
use anyhow::Context;
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDeviceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::new(settings.base_url.as_str())
    }

    pub fn data_url(
        &self,
        device: &str,
        test_id: &str,
        channels: &[String],
        range: Option<TimeRange>,
        point_budget: usize,
    ) -> String {
        let mut url = format!(
            "{}/api/data/{}?ensayo={}&channels={}&maxPoints={}",
            self.base_url,
            urlencoding::encode(device),
            urlencoding::encode(test_id),
            urlencoding::encode(&channels.join(",")),
            point_budget
        );
        if let Some(range) = range {
            let start = range.start.to_rfc3339_opts(SecondsFormat::Millis, true);
            let end = range.end.to_rfc3339_opts(SecondsFormat::Millis, true);
            url.push_str(&format!(
                "&startTime={}&endTime={}",
                urlencoding::encode(&start),
                urlencoding::encode(&end)
            ));
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> CoreResult<T> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))
            .map_err(CoreError::SourceUnavailable)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .context("Failed to parse data API response")
                .map_err(CoreError::SourceUnavailable);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        if status.is_client_error() {
            return Err(match status {
                StatusCode::NOT_FOUND => CoreError::UnknownDevice(message),
                _ => CoreError::InvalidArgument(message),
            });
        }
        Err(CoreError::SourceUnavailable(anyhow::anyhow!(
            "data API returned {}: {}",
            status,
            message
        )))
    }

    pub async fn list_tests(&self) -> CoreResult<Vec<TestRun>> {
        self.get_json(&format!("{}/api/ensayos", self.base_url)).await
    }

    /// Registry of every device's channels as served by `/api/channels`
    pub async fn all_channels(&self) -> CoreResult<ChannelRegistry> {
        self.get_json(&format!("{}/api/channels", self.base_url)).await
    }

    pub async fn stats(&self, device: &str, test_id: &str) -> CoreResult<DataStats> {
        self.get_json(&format!(
            "{}/api/stats/{}?ensayo={}",
            self.base_url,
            urlencoding::encode(device),
            urlencoding::encode(test_id)
        ))
        .await
    }
}

#[async_trait]
impl DeviceQuery for HttpDeviceClient {
    async fn execute(
        &self,
        device: &str,
        test_id: &str,
        channels: &[String],
        range: Option<TimeRange>,
        point_budget: usize,
    ) -> CoreResult<DataResponse> {
        if test_id.trim().is_empty() || channels.is_empty() {
            return Err(CoreError::invalid("missing required parameters: ensayo, channels"));
        }
        if point_budget == 0 {
            return Err(CoreError::invalid("point budget must be at least 1"));
        }
        let url = self.data_url(device, test_id, channels, range, point_budget);
        tracing::debug!("GET {}", url);
        self.get_json(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_data_url() {
        let client = HttpDeviceClient::new("http://localhost:3001/");
        let channels = vec!["tension".to_string(), "corriente".to_string()];
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 15, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 45, 0).unwrap(),
        )
        .unwrap();

        assert_eq!(
            client.data_url("fuente_valores", "E 1", &channels, None, 10_000),
            "http://localhost:3001/api/data/fuente_valores?ensayo=E%201&channels=tension%2Ccorriente&maxPoints=10000"
        );
        assert!(
            client
                .data_url("fuente_valores", "E1", &channels, Some(range), 500)
                .ends_with("&startTime=2024-01-01T00%3A15%3A00.000Z&endTime=2024-01-01T00%3A45%3A00.000Z")
        );
    }

    #[test]
    fn test_from_settings_uses_base_url() {
        let client = HttpDeviceClient::from_settings(&ClientSettings::default());
        assert!(client
            .data_url("Device1", "recta", &["temp".to_string()], None, 10)
            .starts_with("http://localhost:3001/api/data/Device1?"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_source_unavailable() {
        let client = HttpDeviceClient::new("http://127.0.0.1:9");
        let err = client
            .execute("fuente_valores", "E1", &["tension".to_string()], None, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SourceUnavailable(_)));
    }
}
