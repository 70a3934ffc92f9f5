// Configuration loading from config/telemetry.toml and TELEMETRY_* environment
use crate::application::renderer::DualViewRenderer;
use crate::domain::channel::ResolutionPolicy;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub database: Option<DatabaseSettings>,
    #[serde(default)]
    pub sampling: SamplingSettings,
    #[serde(default)]
    pub channels: ChannelSettings,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub client: ClientSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Postgres,
    Demo,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourceSettings {
    #[serde(default)]
    pub kind: SourceKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplingSettings {
    #[serde(default = "default_max_points")]
    pub max_points: usize,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChannelSettings {
    #[serde(default)]
    pub resolution: ResolutionPolicy,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub table: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description_table: Option<String>,
}

impl DeviceConfig {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.table)
    }

    /// Table holding display names and units, `*_valores` -> `*_descripcion` by default
    pub fn description_table(&self) -> String {
        self.description_table
            .clone()
            .unwrap_or_else(|| self.table.replace("_valores", "_descripcion"))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_title")]
    pub chart_title: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            debounce_ms: default_debounce_ms(),
            chart_title: default_title(),
        }
    }
}

impl ClientSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn renderer(&self) -> DualViewRenderer {
        DualViewRenderer::new(self.chart_title.clone())
    }
}

fn default_bind() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_title() -> String {
    "Time Series Chart".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_max_points() -> usize {
    10_000
}

fn default_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_debounce_ms() -> u64 {
    200
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sampling.max_points == 0 {
            anyhow::bail!("sampling.max_points must be at least 1");
        }
        if self.source.kind == SourceKind::Postgres {
            if self.database.is_none() {
                anyhow::bail!("source.kind = \"postgres\" requires a [database] section");
            }
            if self.devices.is_empty() {
                anyhow::bail!("at least one [[devices]] entry is required");
            }
        }
        Ok(())
    }

    pub fn device_tables(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.table.clone()).collect()
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/telemetry").required(false))
        .add_source(
            config::Environment::with_prefix("TELEMETRY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

pub fn settings_from_toml(toml: &str) -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let settings = settings_from_toml(
            r#"
            [server]
            bind = "127.0.0.1:4000"

            [source]
            kind = "postgres"

            [database]
            url = "postgres://localhost/automotive_testing_db"

            [sampling]
            max_points = 5000

            [channels]
            resolution = "strict"

            [[devices]]
            table = "fuente_valores"
            label = "Fuente de Alimentación"

            [[devices]]
            table = "motor_valores"
            description_table = "motor_canales"
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.bind, "127.0.0.1:4000");
        assert_eq!(settings.sampling.max_points, 5000);
        assert_eq!(settings.channels.resolution, ResolutionPolicy::Strict);
        assert_eq!(settings.database.as_ref().unwrap().max_connections, 10);
        assert_eq!(settings.devices[0].description_table(), "fuente_descripcion");
        assert_eq!(settings.devices[1].description_table(), "motor_canales");
        assert_eq!(settings.devices[1].label(), "motor_valores");
        assert_eq!(settings.client.debounce(), Duration::from_millis(200));
    }

    #[test]
    fn test_client_section() {
        let settings = settings_from_toml(
            r#"
            [source]
            kind = "demo"

            [client]
            base_url = "http://bench-01:3001"
            debounce_ms = 350
            chart_title = "Banco 1"
            "#,
        )
        .unwrap();
        assert_eq!(settings.client.base_url, "http://bench-01:3001");
        assert_eq!(settings.client.debounce(), Duration::from_millis(350));
        let detail = settings.client.renderer().build_detail(&[], &[], &[]);
        assert!(detail.is_empty());
    }

    #[test]
    fn test_demo_config_defaults() {
        let settings = settings_from_toml("[source]\nkind = \"demo\"\n").unwrap();
        assert_eq!(settings.source.kind, SourceKind::Demo);
        assert_eq!(settings.sampling.max_points, 10_000);
        assert_eq!(settings.channels.resolution, ResolutionPolicy::FirstMatch);
        assert_eq!(settings.server.bind, "0.0.0.0:3001");
    }

    #[test]
    fn test_postgres_requires_database() {
        assert!(settings_from_toml("[[devices]]\ntable = \"camara_valores\"\n").is_err());
    }
}
