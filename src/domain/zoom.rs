// Zoom range domain model and slider-to-time mapping
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Absolute window derived from the overview slider, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Visible part of the overview as slider percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderWindow {
    pub start_percent: f64,
    pub end_percent: f64,
}

impl SliderWindow {
    pub const FULL: SliderWindow = SliderWindow {
        start_percent: 0.0,
        end_percent: 100.0,
    };

    /// Clamp both ends into `[0, 100]` and order them.
    pub fn new(start_percent: f64, end_percent: f64) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) };
        let (a, b) = (clamp(start_percent), clamp(end_percent));
        Self {
            start_percent: a.min(b),
            end_percent: a.max(b),
        }
    }

    /// Index range `[lo, hi)` of a series with `len` points under this window.
    pub fn index_range(&self, len: usize) -> std::ops::Range<usize> {
        let n = len as f64;
        let lo = ((n * self.start_percent / 100.0).floor() as usize).min(len);
        let hi = ((n * self.end_percent / 100.0).ceil() as usize).min(len);
        lo..hi.max(lo)
    }
}

/// Map a slider window onto the overview series' timestamps.
///
/// Each series is windowed against its own length; the result spans the
/// min/max timestamp among all points inside the windows. Returns `None`
/// when no point is visible.
pub fn visible_range<S>(series: &[S], window: SliderWindow) -> Option<ZoomRange>
where
    S: AsRef<[DateTime<Utc>]>,
{
    let mut bounds: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for timestamps in series {
        let timestamps = timestamps.as_ref();
        for &ts in &timestamps[window.index_range(timestamps.len())] {
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(ts), hi.max(ts)),
                None => (ts, ts),
            });
        }
    }
    bounds.map(|(start, end)| ZoomRange { start, end })
}
