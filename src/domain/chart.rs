// Chart configuration domain models
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisPosition {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YAxisSpec {
    pub unit: String,
    pub name: Option<String>,
    pub position: AxisPosition,
    pub offset: u32,
    pub show_labels: bool,
    pub show_axis_line: bool,
    pub show_split_line: bool,
    pub label_format: Option<String>,
    pub color: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XAxisSpec {
    pub show_labels: bool,
    pub show_axis_line: bool,
    pub show_split_line: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSpec {
    pub channel: String,
    pub name: String,
    pub y_axis_index: usize,
    pub color: &'static str,
    pub smooth: bool,
    pub show_symbol: bool,
    pub data: Vec<(DateTime<Utc>, Option<f64>)>,
}

impl SeriesSpec {
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.data.iter().map(|(ts, _)| *ts).collect()
    }
}

/// Slider control below the overview, in percent of the plotted series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeSelector {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendSpec {
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: Option<String>,
    pub legend: Option<LegendSpec>,
    pub x_axis: Option<XAxisSpec>,
    pub y_axes: Vec<YAxisSpec>,
    pub series: Vec<SeriesSpec>,
    pub range_selector: Option<RangeSelector>,
    pub tooltip: bool,
}

impl ChartSpec {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Per-series timestamps, the input of the zoom synchronizer
    pub fn series_timestamps(&self) -> Vec<Vec<DateTime<Utc>>> {
        self.series.iter().map(SeriesSpec::timestamps).collect()
    }
}
