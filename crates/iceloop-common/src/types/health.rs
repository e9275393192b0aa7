//! Health types - the per-epoch vitality signal
//!
//! A health snapshot is derived once per epoch from trailing-24h activity and
//! market conditions. It drives the adaptive allocation strategy and is the
//! headline figure of every epoch report.
//!
//! Scores are kept unrounded in memory. Rounding to two decimals happens only
//! when serializing or displaying, so threshold comparisons never flap on a
//! rounding boundary.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::ConfigError;

/// Tolerance applied when validating that health weights sum to 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.001;

/// Round a value to two decimal places for display and serialization
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn serialize_round2<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round2(*value))
}

/// Raw measurements feeding the health engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMetricsInput {
    /// Buybacks executed over the trailing 24h
    pub buyback_count_last_24h: u32,
    /// Volume spent on buybacks over the trailing 24h
    pub buyback_volume_last_24h: f64,
    /// Estimated sell pressure over the trailing 24h
    pub recent_sell_pressure: f64,
    /// Current pool liquidity
    pub current_liquidity: f64,
    /// Price volatility over the trailing 24h, in percent
    pub volatility_percent_24h: f64,
    /// Last corrective action (Unix seconds, 0 = never)
    pub last_action_timestamp: i64,
    /// Measurement time (Unix seconds)
    pub current_timestamp: i64,
}

impl HealthMetricsInput {
    /// Hours elapsed since the last corrective action
    ///
    /// A zero timestamp means no action was ever taken, which yields the full
    /// elapsed time since the epoch and therefore saturates any decay.
    pub fn hours_since_last_action(&self) -> f64 {
        (self.current_timestamp - self.last_action_timestamp) as f64 / 3600.0
    }
}

/// Weights applied to the five sub-scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    pub buyback_frequency: f64,
    pub buyback_coverage: f64,
    pub liquidity_depth: f64,
    pub volatility_penalty: f64,
    pub time_decay: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            buyback_frequency: 0.25,
            buyback_coverage: 0.25,
            liquidity_depth: 0.25,
            volatility_penalty: 0.15,
            time_decay: 0.10,
        }
    }
}

impl HealthWeights {
    /// Sum of all five weights
    pub fn sum(&self) -> f64 {
        self.buyback_frequency
            + self.buyback_coverage
            + self.liquidity_depth
            + self.volatility_penalty
            + self.time_decay
    }

    /// Check the weights are non-negative and sum to 1.0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("buyback_frequency", self.buyback_frequency),
            ("buyback_coverage", self.buyback_coverage),
            ("liquidity_depth", self.liquidity_depth),
            ("volatility_penalty", self.volatility_penalty),
            ("time_decay", self.time_decay),
        ];
        for (name, value) in named {
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::NegativeWeight { name, value });
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum(sum));
        }
        Ok(())
    }
}

/// Five normalized sub-scores, each within [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IceHealthMetrics {
    #[serde(serialize_with = "serialize_round2")]
    pub buyback_frequency: f64,
    #[serde(serialize_with = "serialize_round2")]
    pub buyback_coverage: f64,
    #[serde(serialize_with = "serialize_round2")]
    pub liquidity_depth: f64,
    #[serde(serialize_with = "serialize_round2")]
    pub volatility_penalty: f64,
    #[serde(serialize_with = "serialize_round2")]
    pub time_decay: f64,
}

impl IceHealthMetrics {
    /// Copy of the metrics rounded to two decimals
    pub fn rounded(&self) -> Self {
        Self {
            buyback_frequency: round2(self.buyback_frequency),
            buyback_coverage: round2(self.buyback_coverage),
            liquidity_depth: round2(self.liquidity_depth),
            volatility_penalty: round2(self.volatility_penalty),
            time_decay: round2(self.time_decay),
        }
    }
}

/// Coarse health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Score at or above the threshold
    Alive,
    /// Positive score below the threshold
    Melting,
    /// Score of zero, whatever the threshold
    Dead,
}

impl HealthStatus {
    /// Classify an unrounded score against a threshold
    pub fn classify(score: f64, threshold: f64) -> Self {
        if score <= 0.0 {
            HealthStatus::Dead
        } else if score >= threshold {
            HealthStatus::Alive
        } else {
            HealthStatus::Melting
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Alive => "ALIVE",
            HealthStatus::Melting => "MELTING",
            HealthStatus::Dead => "DEAD",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable health snapshot for one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceHealthState {
    /// Measurement time (Unix seconds)
    pub timestamp: i64,
    /// Composite score within [0, 100]
    #[serde(serialize_with = "serialize_round2")]
    pub health: f64,
    /// Sub-score breakdown
    pub metrics: IceHealthMetrics,
    /// Classification derived from the unrounded score
    pub status: HealthStatus,
    /// Last corrective action (Unix seconds, 0 = never)
    pub last_action_time: i64,
    /// Epoch this snapshot belongs to
    pub epoch_number: u64,
}

impl IceHealthState {
    /// Composite score rounded for display
    #[inline]
    pub fn display_health(&self) -> f64 {
        round2(self.health)
    }
}

impl fmt::Display for IceHealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch {} health {:.2} ({})",
            self.epoch_number, self.health, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.388_888), 1.39);
        assert_eq!(round2(68.644_9), 68.64);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_zero_score_is_dead_at_zero_threshold() {
        assert_eq!(HealthStatus::classify(0.0, 0.0), HealthStatus::Dead);
        assert_eq!(HealthStatus::classify(0.01, 0.0), HealthStatus::Alive);
        assert_eq!(HealthStatus::classify(0.0, 50.0), HealthStatus::Dead);
        assert_eq!(HealthStatus::classify(49.99, 50.0), HealthStatus::Melting);
        assert_eq!(HealthStatus::classify(50.0, 50.0), HealthStatus::Alive);
    }

    #[test]
    fn test_default_weights_valid() {
        let weights = HealthWeights::default();
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_weights_sum_rejected() {
        let weights = HealthWeights {
            time_decay: 0.2,
            ..HealthWeights::default()
        };
        assert!(matches!(weights.validate(), Err(ConfigError::WeightSum(_))));
    }

    #[test]
    fn test_weights_within_tolerance() {
        let weights = HealthWeights {
            time_decay: 0.1005,
            ..HealthWeights::default()
        };
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_classify_uses_unrounded_score() {
        // 49.996 would display as 50.00 but must stay below a threshold of 50
        assert_eq!(HealthStatus::classify(49.996, 50.0), HealthStatus::Melting);
        assert_eq!(HealthStatus::classify(50.0, 50.0), HealthStatus::Alive);
        assert_eq!(HealthStatus::classify(0.0, 50.0), HealthStatus::Dead);
    }

    #[test]
    fn test_serialization_rounds() {
        let state = IceHealthState {
            timestamp: 1_700_000_000,
            health: 73.361_111,
            metrics: IceHealthMetrics {
                buyback_frequency: 100.0,
                buyback_coverage: 100.0,
                liquidity_depth: 100.0,
                volatility_penalty: 10.0,
                time_decay: 1.388_889,
            },
            status: HealthStatus::Alive,
            last_action_time: 1_699_996_400,
            epoch_number: 1,
        };

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["health"], 73.36);
        assert_eq!(json["metrics"]["time_decay"], 1.39);
        assert_eq!(json["status"], "ALIVE");
        // In-memory value stays exact
        assert!((state.health - 73.361_111).abs() < 1e-9);
    }

    #[test]
    fn test_never_acted_saturates_elapsed() {
        let input = HealthMetricsInput {
            current_timestamp: 1_700_000_000,
            last_action_timestamp: 0,
            ..Default::default()
        };
        assert!(input.hours_since_last_action() > 72.0);
    }
}
