//! # Iceloop Health
//!
//! Deterministic health scoring for the Iceloop epoch engine.
//!
//! ## Health Formula
//!
//! ```text
//! H = clamp(w_f·F + w_c·C + w_l·L − w_v·V − w_d·D, 0, 100)
//! ```
//!
//! Where:
//! - F: buyback frequency (4+ buybacks/24h saturates)
//! - C: buyback coverage of sell pressure
//! - L: liquidity depth (50 units saturates)
//! - V: volatility penalty (24h volatility percent)
//! - D: time decay (72h without action saturates)
//!
//! ## Status
//!
//! ALIVE at or above the threshold, MELTING below it, DEAD at zero.

pub mod engine;

pub use engine::HealthEngine;

use iceloop_common::{ConfigError, HealthWeights, DEFAULT_HEALTH_THRESHOLD};
use serde::{Deserialize, Serialize};

/// Health engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Sub-score weights (must sum to 1.0)
    pub weights: HealthWeights,
    /// Score separating ALIVE from MELTING
    pub threshold: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            weights: HealthWeights::default(),
            threshold: DEFAULT_HEALTH_THRESHOLD,
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(ConfigError::ThresholdRange(self.threshold));
        }
        Ok(())
    }
}
