// Query executor - applies a sampling plan to one device's row source
use crate::application::row_source::{RowQuery, RowSource};
use crate::domain::data::{DataResponse, DataStats, TimeRange};
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::sampling::SamplingPlan;
use std::sync::Arc;

#[derive(Clone)]
pub struct QueryExecutor {
    source: Arc<dyn RowSource>,
}

impl QueryExecutor {
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        Self { source }
    }

    /// Count, plan, then fetch at most `point_budget` rows in timestamp order.
    pub async fn execute(
        &self,
        device: &str,
        test_id: &str,
        channels: &[String],
        range: Option<TimeRange>,
        point_budget: usize,
    ) -> CoreResult<DataResponse> {
        if test_id.trim().is_empty() {
            return Err(CoreError::invalid("missing test id"));
        }
        if channels.is_empty() {
            return Err(CoreError::invalid("no channels selected"));
        }
        if point_budget == 0 {
            return Err(CoreError::invalid("point budget must be at least 1"));
        }
        if let Some(range) = range {
            TimeRange::new(range.start, range.end)?;
        }

        let total_count = self
            .source
            .count(device, test_id, range)
            .await
            .map_err(CoreError::SourceUnavailable)?;
        let plan = SamplingPlan::new(total_count, point_budget)?;

        tracing::debug!(
            "Plan for {}/{}: total={} budget={} stride={} full_scan={}",
            device,
            test_id,
            plan.total_count,
            plan.point_budget,
            plan.stride,
            plan.uses_full_scan
        );

        let mut points = self
            .source
            .fetch_range(
                device,
                RowQuery {
                    test_id,
                    channels,
                    range,
                    stride: plan.stride_filter(),
                    limit: plan.row_limit(),
                },
            )
            .await
            .map_err(CoreError::SourceUnavailable)?;

        // The modulo filter can overshoot the budget at the tail; the cap wins.
        if !plan.uses_full_scan {
            points.truncate(point_budget);
        }
        points.sort_by_key(|p| p.timestamp);

        Ok(DataResponse::new(points, total_count, plan.sampling_rate(), range))
    }

    pub async fn stats(&self, device: &str, test_id: &str) -> CoreResult<DataStats> {
        if test_id.trim().is_empty() {
            return Err(CoreError::invalid("missing test id"));
        }
        self.source
            .stats(device, test_id)
            .await
            .map_err(CoreError::SourceUnavailable)
    }
}
