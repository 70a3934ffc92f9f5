// In-memory row source used for demos and tests
use crate::application::row_source::{Catalog, RowQuery, RowSource};
use crate::domain::channel::Channel;
use crate::domain::data::{DataPoint, DataStats, TimeRange};
use crate::domain::test_run::TestRun;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;

#[derive(Debug, Clone)]
struct StoredRow {
    ordinal: u64,
    test_id: String,
    timestamp: DateTime<Utc>,
    values: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Default)]
struct DeviceTable {
    channels: Vec<Channel>,
    rows: Vec<StoredRow>,
}

/// Device tables held in memory. Ordinals are assigned in insertion order
/// starting at 1, like a serial primary key.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRowSource {
    tests: Vec<TestRun>,
    tables: HashMap<String, DeviceTable>,
}

impl InMemoryRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test(mut self, test: TestRun) -> Self {
        self.tests.push(test);
        self
    }

    pub fn with_device(mut self, device: impl Into<String>, channels: Vec<Channel>) -> Self {
        self.tables.entry(device.into()).or_default().channels = channels;
        self
    }

    /// Append a row; channels of the device missing from `values` are stored as null.
    pub fn push_row(
        &mut self,
        device: &str,
        test_id: &str,
        timestamp: DateTime<Utc>,
        values: &[(&str, f64)],
    ) -> Result<()> {
        let table = self
            .tables
            .get_mut(device)
            .with_context(|| format!("Unknown device table {}", device))?;

        let mut row_values: BTreeMap<String, Option<f64>> =
            table.channels.iter().map(|c| (c.name.clone(), None)).collect();
        for (name, value) in values {
            let slot = row_values
                .get_mut(*name)
                .with_context(|| format!("Device {} has no column {}", device, name))?;
            *slot = Some(*value);
        }

        let ordinal = table.rows.len() as u64 + 1;
        table.rows.push(StoredRow {
            ordinal,
            test_id: test_id.to_string(),
            timestamp,
            values: row_values,
        });
        Ok(())
    }

    pub fn device_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    fn table(&self, device: &str) -> Result<&DeviceTable> {
        self.tables
            .get(device)
            .with_context(|| format!("Unknown device table {}", device))
    }

    fn scoped_rows<'a>(
        table: &'a DeviceTable,
        test_id: &'a str,
        range: Option<TimeRange>,
    ) -> impl Iterator<Item = &'a StoredRow> + 'a {
        table
            .rows
            .iter()
            .filter(move |r| r.test_id == test_id)
            .filter(move |r| range.is_none_or(|range| range.contains(r.timestamp)))
    }

    /// Dataset matching the front end's mock service.
    pub fn demo() -> Result<Self> {
        let mut source = Self::new()
            .with_test(TestRun::new("recta", "Señal recta"))
            .with_test(TestRun::new("senoidal", "Señal senoidal"))
            .with_device(
                "Device1",
                vec![
                    Channel::new("temp", "Temperatura", "°C"),
                    Channel::new("hum", "Humedad", "%"),
                ],
            )
            .with_device(
                "Device2",
                vec![
                    Channel::new("pres", "Presión", "hPa"),
                    Channel::new("vel", "Velocidad", "m/s"),
                ],
            );

        let origin = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .context("Invalid demo origin")?;

        for h in 0..6i64 {
            for i in 0..100i64 {
                let ts = origin + Duration::hours(h) + Duration::seconds(i * 36);
                let x = i as f64 * 2.0 * PI;
                source.push_row(
                    "Device1",
                    "senoidal",
                    ts,
                    &[("temp", 20.0 + 5.0 * (x / 100.0).sin()), ("hum", 50.0 + 10.0 * (x / 100.0).cos())],
                )?;
                source.push_row(
                    "Device2",
                    "senoidal",
                    ts,
                    &[("pres", 1013.0 + 20.0 * (x / 50.0).sin()), ("vel", 50.0 + 30.0 * (x / 20.0).sin())],
                )?;
            }
        }
        for i in 0..100i64 {
            let ts = origin + Duration::seconds(i);
            let x = i as f64;
            source.push_row("Device1", "recta", ts, &[("temp", 20.0 + x * 0.1), ("hum", 50.0 + x * 0.2)])?;
            source.push_row("Device2", "recta", ts, &[("pres", 1013.0 + x * 0.05)])?;
        }
        Ok(source)
    }
}

#[async_trait]
impl RowSource for InMemoryRowSource {
    async fn count(&self, device: &str, test_id: &str, range: Option<TimeRange>) -> Result<u64> {
        let table = self.table(device)?;
        Ok(Self::scoped_rows(table, test_id, range).count() as u64)
    }

    async fn fetch_range(&self, device: &str, query: RowQuery<'_>) -> Result<Vec<DataPoint>> {
        let table = self.table(device)?;
        for name in query.channels {
            if !table.channels.iter().any(|c| &c.name == name) {
                anyhow::bail!("Device {} has no column {}", device, name);
            }
        }

        let mut rows: Vec<&StoredRow> = Self::scoped_rows(table, query.test_id, query.range)
            .filter(|r| query.stride.is_none_or(|stride| r.ordinal % stride == 0))
            .collect();
        rows.sort_by_key(|r| r.timestamp);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows
            .into_iter()
            .map(|r| DataPoint {
                timestamp: r.timestamp,
                values: query
                    .channels
                    .iter()
                    .map(|name| (name.clone(), r.values.get(name).copied().flatten()))
                    .collect(),
            })
            .collect())
    }

    async fn stats(&self, device: &str, test_id: &str) -> Result<DataStats> {
        let table = self.table(device)?;
        let timestamps: Vec<DateTime<Utc>> = Self::scoped_rows(table, test_id, None)
            .map(|r| r.timestamp)
            .collect();
        Ok(DataStats::new(
            timestamps.len() as u64,
            timestamps.iter().min().copied(),
            timestamps.iter().max().copied(),
        ))
    }
}

#[async_trait]
impl Catalog for InMemoryRowSource {
    async fn list_tests(&self) -> Result<Vec<TestRun>> {
        let mut tests = self.tests.clone();
        tests.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tests)
    }

    async fn list_channels(&self, device: &str) -> Result<Vec<Channel>> {
        Ok(self.table(device)?.channels.clone())
    }
}
