// Sampling plan - decides between a full scan and modulo decimation
use crate::domain::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPlan {
    pub total_count: u64,
    pub point_budget: usize,
    /// Keep every `stride`-th row; 1 for a full scan.
    pub stride: u64,
    pub uses_full_scan: bool,
}

impl SamplingPlan {
    /// Plan a query returning at most `point_budget` rows out of `total_count`.
    pub fn new(total_count: u64, point_budget: usize) -> CoreResult<Self> {
        if point_budget == 0 {
            return Err(CoreError::invalid("point budget must be at least 1"));
        }

        let budget = point_budget as u64;
        if total_count <= budget {
            return Ok(Self {
                total_count,
                point_budget,
                stride: 1,
                uses_full_scan: true,
            });
        }

        Ok(Self {
            total_count,
            point_budget,
            stride: total_count.div_ceil(budget),
            uses_full_scan: false,
        })
    }

    /// Stride to push down to the row source, if decimating.
    pub fn stride_filter(&self) -> Option<u64> {
        (!self.uses_full_scan).then_some(self.stride)
    }

    /// Row cap to push down to the row source, if decimating.
    pub fn row_limit(&self) -> Option<usize> {
        (!self.uses_full_scan).then_some(self.point_budget)
    }

    pub fn sampling_rate(&self) -> u64 {
        self.stride
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scan_within_budget() {
        for total in [0, 1, 499, 500, 10_000] {
            let plan = SamplingPlan::new(total, 10_000).unwrap();
            assert!(plan.uses_full_scan);
            assert_eq!(plan.stride, 1);
            assert_eq!(plan.row_limit(), None);
            assert_eq!(plan.stride_filter(), None);
        }
    }

    #[test]
    fn test_decimation_stride_is_ceiling() {
        let plan = SamplingPlan::new(50_000, 10_000).unwrap();
        assert!(!plan.uses_full_scan);
        assert_eq!(plan.stride, 5);
        assert_eq!(plan.row_limit(), Some(10_000));

        let plan = SamplingPlan::new(10_001, 10_000).unwrap();
        assert_eq!(plan.stride, 2);

        for (total, budget) in [(7, 3), (1_000_003, 977), (99, 98), (12, 1)] {
            let plan = SamplingPlan::new(total, budget).unwrap();
            assert_eq!(plan.stride, total.div_ceil(budget as u64));
            assert!(total.div_ceil(plan.stride) <= budget as u64);
        }
    }

    #[test]
    fn test_zero_budget_rejected() {
        assert!(matches!(
            SamplingPlan::new(10, 0),
            Err(CoreError::InvalidArgument(_))
        ));
    }
}
