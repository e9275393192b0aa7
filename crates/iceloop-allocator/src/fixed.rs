//! Fixed strategy: configured percentages, health ignored

use iceloop_common::{AllocationConfig, AllocationPercentages, IceHealthState};

use crate::AllocationPolicy;

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedAllocationStrategy;

impl AllocationPolicy for FixedAllocationStrategy {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn percentages(
        &self,
        _health: &IceHealthState,
        config: &AllocationConfig,
    ) -> AllocationPercentages {
        config.percentages()
    }
}
