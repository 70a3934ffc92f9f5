// PostgreSQL row source - one table per device, one column per channel
use crate::application::row_source::{Catalog, RowQuery, RowSource};
use crate::domain::channel::Channel;
use crate::domain::data::{DataPoint, DataStats, TimeRange};
use crate::domain::test_run::TestRun;
use crate::infrastructure::config::{DatabaseSettings, DeviceConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

const ORDINAL_COLUMN: &str = "id";
const TIMESTAMP_COLUMN: &str = "timestamp";
const TEST_COLUMN: &str = "codigo_ensayo";

#[derive(Debug, Clone)]
pub struct PostgresRowSource {
    pool: PgPool,
    devices: Vec<DeviceConfig>,
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn utc_timestamp() -> String {
    format!("({} AT TIME ZONE 'UTC')", quote_ident(TIMESTAMP_COLUMN))
}

fn scope_clause(has_range: bool) -> String {
    let mut clause = format!("WHERE {} = $1", quote_ident(TEST_COLUMN));
    if has_range {
        clause.push_str(&format!(" AND {} BETWEEN $2 AND $3", utc_timestamp()));
    }
    clause
}

pub fn count_sql(table: &str, has_range: bool) -> String {
    format!(
        "SELECT COUNT(*) FROM {} {}",
        quote_ident(table),
        scope_clause(has_range)
    )
}

pub fn fetch_sql(table: &str, query: &RowQuery<'_>) -> String {
    let columns: Vec<String> = query
        .channels
        .iter()
        .map(|c| format!("CAST({0} AS DOUBLE PRECISION) AS {0}", quote_ident(c)))
        .collect();

    let mut sql = format!(
        "SELECT {} AS ts, {} FROM {} {}",
        utc_timestamp(),
        columns.join(", "),
        quote_ident(table),
        scope_clause(query.range.is_some())
    );
    if let Some(stride) = query.stride {
        sql.push_str(&format!(" AND ({} % {}) = 0", quote_ident(ORDINAL_COLUMN), stride));
    }
    sql.push_str(&format!(" ORDER BY {}", quote_ident(TIMESTAMP_COLUMN)));
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql
}

pub fn channels_sql(description_table: &str) -> String {
    format!(
        r#"
        WITH column_mapping AS (
            SELECT
                ROW_NUMBER() OVER (ORDER BY ordinal_position) AS canal_id,
                column_name::text AS column_name
            FROM information_schema.columns
            WHERE table_name = $1
              AND table_schema = current_schema()
              AND column_name NOT IN ('{}', '{}', '{}')
        )
        SELECT
            cm.column_name,
            COALESCE(cd.nombre::text, cm.column_name) AS display_name,
            COALESCE(cd.unidad::text, '') AS unit
        FROM column_mapping cm
        LEFT JOIN {} cd ON cm.canal_id = cd.canal_id
        ORDER BY cm.canal_id
        "#,
        ORDINAL_COLUMN,
        TIMESTAMP_COLUMN,
        TEST_COLUMN,
        quote_ident(description_table)
    )
}

impl PostgresRowSource {
    pub async fn connect(settings: &DatabaseSettings, devices: Vec<DeviceConfig>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        tracing::info!("Connected to PostgreSQL database");
        Ok(Self { pool, devices })
    }

    fn device(&self, device: &str) -> Result<&DeviceConfig> {
        self.devices
            .iter()
            .find(|d| d.table == device)
            .with_context(|| format!("Device table {} is not configured", device))
    }

    fn decode_row(row: &PgRow, channels: &[String]) -> std::result::Result<DataPoint, sqlx::Error> {
        let timestamp: DateTime<Utc> = row.try_get("ts")?;
        let mut point = DataPoint::new(timestamp);
        for channel in channels {
            let value: Option<f64> = row.try_get(channel.as_str())?;
            point.values.insert(channel.clone(), value);
        }
        Ok(point)
    }
}

#[async_trait]
impl RowSource for PostgresRowSource {
    async fn count(&self, device: &str, test_id: &str, range: Option<TimeRange>) -> Result<u64> {
        let table = &self.device(device)?.table;
        let sql = count_sql(table, range.is_some());
        tracing::debug!("Count query: {}", sql);

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(test_id);
        if let Some(range) = range {
            query = query.bind(range.start).bind(range.end);
        }
        let total = query
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count rows in {}", table))?;
        Ok(total.max(0) as u64)
    }

    async fn fetch_range(&self, device: &str, query: RowQuery<'_>) -> Result<Vec<DataPoint>> {
        let table = &self.device(device)?.table;
        let sql = fetch_sql(table, &query);
        tracing::debug!("Data query: {}", sql);

        let mut statement = sqlx::query(&sql).bind(query.test_id);
        if let Some(range) = query.range {
            statement = statement.bind(range.start).bind(range.end);
        }
        let rows = statement
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch rows from {}", table))?;

        rows.iter()
            .map(|row| Self::decode_row(row, query.channels))
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to decode rows from {}", table))
    }

    async fn stats(&self, device: &str, test_id: &str) -> Result<DataStats> {
        let table = &self.device(device)?.table;
        let sql = format!(
            "SELECT COUNT(*), MIN({ts}), MAX({ts}) FROM {} {}",
            quote_ident(table),
            scope_clause(false),
            ts = utc_timestamp(),
        );

        let (total, start, end): (i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
            sqlx::query_as(&sql)
                .bind(test_id)
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("Failed to read stats for {}", table))?;
        Ok(DataStats::new(total.max(0) as u64, start, end))
    }
}

#[async_trait]
impl Catalog for PostgresRowSource {
    async fn list_tests(&self) -> Result<Vec<TestRun>> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT codigo_ensayo::text, descripcion::text FROM ensayos ORDER BY codigo_ensayo",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch ensayos")?;

        Ok(rows
            .into_iter()
            .map(|(id, description)| TestRun::new(id, description.unwrap_or_default()))
            .collect())
    }

    async fn list_channels(&self, device: &str) -> Result<Vec<Channel>> {
        let config = self.device(device)?;
        let sql = channels_sql(&config.description_table());

        let rows: Vec<(String, String, String)> = sqlx::query_as(&sql)
            .bind(&config.table)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch channels for {}", device))?;

        Ok(rows
            .into_iter()
            .map(|(name, display_name, unit)| Channel::new(name, display_name, unit))
            .collect())
    }
}
