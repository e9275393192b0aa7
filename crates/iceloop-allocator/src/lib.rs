//! # Iceloop Allocator
//!
//! Maps an epoch's accumulated fees to a budget split across four categories:
//! buyback, liquidity provision, burn and cooling reserve.
//!
//! ## Strategies
//!
//! - **Fixed**: configured percentages, independent of health
//! - **Adaptive**: buyback share follows a health step function; the remainder
//!   keeps the configured lp:burn:cooling proportions
//!
//! ```text
//! amount_i = fee × pct_i / 100
//! ```
//!
//! Strategies return allocations with an empty action list. The executor
//! appends actions once it has executed them.

pub mod adaptive;
pub mod fixed;

pub use adaptive::AdaptiveAllocationStrategy;
pub use fixed::FixedAllocationStrategy;

use iceloop_common::{
    AllocationConfig, AllocationError, AllocationPercentages, EpochAllocation, IceHealthState,
    ALLOCATION_TOLERANCE,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Budget split policy
pub trait AllocationPolicy {
    /// Strategy name recorded on each allocation
    fn name(&self) -> &'static str;

    /// Percentages to apply for the given health
    fn percentages(&self, health: &IceHealthState, config: &AllocationConfig)
        -> AllocationPercentages;

    /// Split `fee_amount` into the four categories
    fn allocate(
        &self,
        fee_amount: Decimal,
        health: &IceHealthState,
        config: &AllocationConfig,
    ) -> Result<EpochAllocation, AllocationError> {
        if fee_amount < Decimal::ZERO {
            return Err(AllocationError::NegativeAmount(fee_amount));
        }

        let percentages = self.percentages(health, config);
        let allocation = EpochAllocation::from_percentages(
            health.epoch_number,
            self.name(),
            fee_amount,
            percentages,
        )?;
        check_conservation(&allocation)?;

        debug!(
            strategy = self.name(),
            epoch = health.epoch_number,
            total = %fee_amount,
            buyback = %allocation.buyback_amount,
            lp = %allocation.lp_amount,
            burn = %allocation.burn_amount,
            cooling = %allocation.cooling_amount,
            "Fees allocated"
        );

        Ok(allocation)
    }
}

/// Verify the four amounts sum to the total within relative tolerance
pub fn check_conservation(allocation: &EpochAllocation) -> Result<(), AllocationError> {
    let allocated = allocation.allocated_total();
    let expected = allocation.total_fees;
    let tolerance = Decimal::from_f64_retain(ALLOCATION_TOLERANCE).unwrap_or(Decimal::ZERO)
        * expected.abs();

    if (allocated - expected).abs() > tolerance {
        return Err(AllocationError::Conservation {
            allocated,
            expected,
        });
    }
    Ok(())
}

/// Strategy selector read from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Fixed,
    #[default]
    Adaptive,
}

/// The configured allocation strategy, selected once at startup
#[derive(Debug, Clone, Copy)]
pub enum AllocationStrategy {
    Fixed(FixedAllocationStrategy),
    Adaptive(AdaptiveAllocationStrategy),
}

impl AllocationStrategy {
    pub fn from_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Fixed => AllocationStrategy::Fixed(FixedAllocationStrategy),
            StrategyKind::Adaptive => AllocationStrategy::Adaptive(AdaptiveAllocationStrategy),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            AllocationStrategy::Fixed(_) => StrategyKind::Fixed,
            AllocationStrategy::Adaptive(_) => StrategyKind::Adaptive,
        }
    }
}

impl From<StrategyKind> for AllocationStrategy {
    fn from(kind: StrategyKind) -> Self {
        Self::from_kind(kind)
    }
}

impl AllocationPolicy for AllocationStrategy {
    fn name(&self) -> &'static str {
        match self {
            AllocationStrategy::Fixed(s) => s.name(),
            AllocationStrategy::Adaptive(s) => s.name(),
        }
    }

    fn percentages(
        &self,
        health: &IceHealthState,
        config: &AllocationConfig,
    ) -> AllocationPercentages {
        match self {
            AllocationStrategy::Fixed(s) => s.percentages(health, config),
            AllocationStrategy::Adaptive(s) => s.percentages(health, config),
        }
    }
}
