// Time-series data domain models
use crate::domain::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed UTC interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::invalid(format!(
                "time range start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Build from optional bounds; both or neither must be present.
    pub fn from_bounds(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> CoreResult<Option<Self>> {
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end).map(Some),
            (None, None) => Ok(None),
            _ => Err(CoreError::invalid(
                "startTime and endTime must be provided together",
            )),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// One row of readings. A channel missing from `values` has no reading at
/// this timestamp; a present key with `None` is a stored null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl DataPoint {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, channel: impl Into<String>, value: Option<f64>) -> Self {
        self.values.insert(channel.into(), value);
        self
    }

    /// `None` when the point carries no entry for `channel`
    pub fn get(&self, channel: &str) -> Option<Option<f64>> {
        self.values.get(channel).copied()
    }
}

/// Window the caller asked for, echoed back in the response metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl From<Option<TimeRange>> for RequestedRange {
    fn from(range: Option<TimeRange>) -> Self {
        Self {
            start: range.map(|r| r.start),
            end: range.map(|r| r.end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_points: u64,
    pub returned_points: u64,
    /// Stride used, 1 for a full scan.
    pub sampling_rate: u64,
    pub time_range: RequestedRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse {
    #[serde(rename = "data")]
    pub points: Vec<DataPoint>,
    pub metadata: ResponseMetadata,
}

impl DataResponse {
    pub fn new(points: Vec<DataPoint>, total_points: u64, sampling_rate: u64, range: Option<TimeRange>) -> Self {
        let returned_points = points.len() as u64;
        Self {
            points,
            metadata: ResponseMetadata {
                total_points,
                returned_points,
                sampling_rate,
                time_range: range.into(),
            },
        }
    }
}

/// Summary of one test's recording in one device table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStats {
    pub total_records: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
}

impl DataStats {
    pub fn new(total_records: u64, start_time: Option<DateTime<Utc>>, end_time: Option<DateTime<Utc>>) -> Self {
        let duration_hours = match (start_time, end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 3_600_000.0),
            _ => None,
        };
        Self {
            total_records,
            start_time,
            end_time,
            duration_hours,
        }
    }
}
