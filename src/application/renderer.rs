// Dual-view renderer - overview and detail chart specs from merged points
use crate::domain::channel::Channel;
use crate::domain::chart::{
    AxisPosition, ChartSpec, LegendSpec, RangeSelector, SeriesSpec, XAxisSpec, YAxisSpec,
};
use crate::domain::data::DataPoint;
use chrono::{DateTime, Utc};

pub const PALETTE: [&str; 10] = [
    "#5470c6", "#91cc75", "#fac858", "#ee6666", "#73c0de", "#3ba272", "#fc8452", "#9a60b4",
    "#ea7ccc", "#ff9f7f",
];

const AXIS_OFFSET_STEP: u32 = 60;

pub fn color_for(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Selected channel placed on its unit's axis.
struct Placement<'a> {
    selection_index: usize,
    channel: &'a Channel,
    axis_index: usize,
}

struct Layout<'a> {
    units: Vec<String>,
    placements: Vec<Placement<'a>>,
}

impl<'a> Layout<'a> {
    fn new(channels: &'a [Channel], selection: &[String]) -> Self {
        let mut units: Vec<String> = Vec::new();
        let mut placements = Vec::new();
        for (selection_index, name) in selection.iter().enumerate() {
            let Some(channel) = channels.iter().find(|c| &c.name == name) else {
                continue;
            };
            let unit = channel.axis_unit();
            let axis_index = match units.iter().position(|u| u == unit) {
                Some(i) => i,
                None => {
                    units.push(unit.to_string());
                    units.len() - 1
                }
            };
            placements.push(Placement {
                selection_index,
                channel,
                axis_index,
            });
        }
        Self { units, placements }
    }
}

fn axis_slot(index: usize) -> (AxisPosition, u32) {
    let position = if index % 2 == 0 {
        AxisPosition::Left
    } else {
        AxisPosition::Right
    };
    (position, (index / 2) as u32 * AXIS_OFFSET_STEP)
}

/// `(timestamp, value)` pairs from the points that carry `channel`.
pub fn series_data(points: &[DataPoint], channel: &str) -> Vec<(DateTime<Utc>, Option<f64>)> {
    points
        .iter()
        .filter_map(|p| p.get(channel).map(|value| (p.timestamp, value)))
        .collect()
}

#[derive(Debug, Clone)]
pub struct DualViewRenderer {
    title: String,
}

impl Default for DualViewRenderer {
    fn default() -> Self {
        Self::new("Time Series Chart")
    }
}

impl DualViewRenderer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Decoration-free full-range chart carrying the range selector
    pub fn build_overview(
        &self,
        points: &[DataPoint],
        channels: &[Channel],
        selection: &[String],
    ) -> ChartSpec {
        if points.is_empty() || selection.is_empty() {
            return ChartSpec::empty();
        }
        let layout = Layout::new(channels, selection);

        let y_axes = (0..layout.units.len())
            .map(|i| {
                let (position, offset) = axis_slot(i);
                YAxisSpec {
                    unit: layout.units[i].clone(),
                    name: None,
                    position,
                    offset,
                    show_labels: false,
                    show_axis_line: false,
                    show_split_line: false,
                    label_format: None,
                    color: None,
                }
            })
            .collect();

        let series = layout
            .placements
            .iter()
            .map(|p| SeriesSpec {
                channel: p.channel.name.clone(),
                name: format!("{} (overview)", p.channel.display_name),
                y_axis_index: p.axis_index,
                color: color_for(p.selection_index),
                smooth: true,
                show_symbol: false,
                data: series_data(points, &p.channel.name),
            })
            .collect();

        ChartSpec {
            title: None,
            legend: None,
            x_axis: Some(XAxisSpec {
                show_labels: false,
                show_axis_line: false,
                show_split_line: false,
            }),
            y_axes,
            series,
            range_selector: Some(RangeSelector {
                start: 0.0,
                end: 100.0,
            }),
            tooltip: false,
        }
    }

    /// Fully labelled chart of the current window
    pub fn build_detail(
        &self,
        points: &[DataPoint],
        channels: &[Channel],
        selection: &[String],
    ) -> ChartSpec {
        if points.is_empty() || selection.is_empty() {
            return ChartSpec::empty();
        }
        let layout = Layout::new(channels, selection);

        let y_axes = layout
            .units
            .iter()
            .enumerate()
            .map(|(i, unit)| {
                let (position, offset) = axis_slot(i);
                YAxisSpec {
                    unit: unit.clone(),
                    name: Some(unit.clone()),
                    position,
                    offset,
                    show_labels: true,
                    show_axis_line: true,
                    show_split_line: true,
                    label_format: Some(format!("{{value}} {unit}")),
                    color: Some(color_for(i)),
                }
            })
            .collect();

        let series = layout
            .placements
            .iter()
            .map(|p| SeriesSpec {
                channel: p.channel.name.clone(),
                name: p.channel.display_name.clone(),
                y_axis_index: p.axis_index,
                color: color_for(p.selection_index),
                smooth: true,
                show_symbol: false,
                data: series_data(points, &p.channel.name),
            })
            .collect();

        let legend = LegendSpec {
            entries: selection
                .iter()
                .map(|name| {
                    channels
                        .iter()
                        .find(|c| &c.name == name)
                        .map(|c| c.display_name.clone())
                        .unwrap_or_else(|| name.clone())
                })
                .collect(),
        };

        ChartSpec {
            title: Some(self.title.clone()),
            legend: Some(legend),
            x_axis: Some(XAxisSpec {
                show_labels: true,
                show_axis_line: true,
                show_split_line: false,
            }),
            y_axes,
            series,
            range_selector: None,
            tooltip: true,
        }
    }
}
