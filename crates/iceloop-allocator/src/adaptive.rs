//! Adaptive strategy: buyback share follows health
//!
//! | health        | buyback %            |
//! |---------------|----------------------|
//! | < 30          | 85                   |
//! | 30 ≤ h < 50   | 80                   |
//! | 50 ≤ h < 70   | configured base      |
//! | ≥ 70          | 50                   |
//!
//! The remaining share is spread over lp, burn and cooling in the proportions
//! of the base configuration:
//!
//! ```text
//! pct_i = base_i × (100 − adapted_buyback) / (100 − base_buyback)
//! ```
//!
//! A base buyback of 100% leaves no proportions to preserve. In that case the
//! other categories get 0% and buyback keeps the whole budget, so the split
//! still conserves the fee amount.

use iceloop_common::{AllocationConfig, AllocationPercentages, IceHealthState};
use rust_decimal::Decimal;

use crate::AllocationPolicy;

const CRITICAL_HEALTH: f64 = 30.0;
const WEAK_HEALTH: f64 = 50.0;
const STRONG_HEALTH: f64 = 70.0;

const CRITICAL_BUYBACK_PCT: u32 = 85;
const WEAK_BUYBACK_PCT: u32 = 80;
const STRONG_BUYBACK_PCT: u32 = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveAllocationStrategy;

impl AdaptiveAllocationStrategy {
    /// Buyback percentage for a health score
    pub fn buyback_pct(health: f64, base_buyback_pct: u32) -> u32 {
        if health < CRITICAL_HEALTH {
            CRITICAL_BUYBACK_PCT
        } else if health < WEAK_HEALTH {
            WEAK_BUYBACK_PCT
        } else if health < STRONG_HEALTH {
            base_buyback_pct
        } else {
            STRONG_BUYBACK_PCT
        }
    }
}

impl AllocationPolicy for AdaptiveAllocationStrategy {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn percentages(
        &self,
        health: &IceHealthState,
        config: &AllocationConfig,
    ) -> AllocationPercentages {
        let base_remaining = 100u32.saturating_sub(config.buyback_pct);
        if base_remaining == 0 {
            return AllocationPercentages {
                buyback: Decimal::ONE_HUNDRED,
                lp: Decimal::ZERO,
                burn: Decimal::ZERO,
                cooling: Decimal::ZERO,
            };
        }

        let buyback = Self::buyback_pct(health.health, config.buyback_pct);
        let remaining = Decimal::from(100 - buyback);
        let base_remaining = Decimal::from(base_remaining);
        let scale = |base: u32| Decimal::from(base) * remaining / base_remaining;

        AllocationPercentages {
            buyback: Decimal::from(buyback),
            lp: scale(config.lp_pct),
            burn: scale(config.burn_pct),
            cooling: scale(config.cooling_pct),
        }
    }
}
