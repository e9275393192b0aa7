//! # Iceloop Common
//!
//! Shared types and errors for the Iceloop epoch engine.
//!
//! ## Core Types
//!
//! - [`HealthMetricsInput`]: trailing-24h activity fed to the health engine
//! - [`IceHealthState`]: immutable per-epoch health snapshot (0-100 score)
//! - [`AllocationConfig`]/[`EpochAllocation`]: budget percentages and their split
//! - [`AllocationAction`]: one corrective action with its lifecycle status
//! - [`FeeEvent`]: an observed fee inflow
//! - [`Quote`]/[`SwapResult`]: swap engine contract types

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    AllocationError, ConfigError, FeeSourceError, IceError, MarketDataError, Result, SwapError,
    TreasuryError,
};
pub use types::{
    allocation::{
        ActionStatus, ActionType, AllocationAction, AllocationConfig, AllocationPercentages,
        EpochAllocation,
    },
    fee::{ConfirmationLevel, FeeEvent},
    health::{
        round2, HealthMetricsInput, HealthStatus, HealthWeights, IceHealthMetrics,
        IceHealthState,
    },
    swap::{Quote, QuoteRequest, SwapResult, SOL_MINT},
};

use rust_decimal::Decimal;

/// Iceloop version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum accumulated fees worth allocating (0.01 units)
pub const DUST_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest fee amount accepted for a single event or held pending at once
pub const MAX_FEE_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Buybacks per 24h that saturate the frequency sub-score
pub const BUYBACK_FREQUENCY_SATURATION: f64 = 4.0;

/// Liquidity that saturates the depth sub-score
pub const LIQUIDITY_SATURATION: f64 = 50.0;

/// Hours without action after which time decay saturates
pub const DECAY_HORIZON_HOURS: f64 = 72.0;

/// Assumed health decay in points per hour for time-to-threshold estimates
pub const ESTIMATED_DECAY_PER_HOUR: f64 = 0.25;

/// Default health threshold separating ALIVE from MELTING
pub const DEFAULT_HEALTH_THRESHOLD: f64 = 50.0;

/// Relative tolerance for allocation conservation checks
pub const ALLOCATION_TOLERANCE: f64 = 1e-6;
