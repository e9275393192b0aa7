//! Health engine: H = Σ weighted sub-scores, clamped to [0, 100]

use iceloop_common::{
    round2, HealthMetricsInput, HealthStatus, IceHealthMetrics, IceHealthState,
    BUYBACK_FREQUENCY_SATURATION, DECAY_HORIZON_HOURS, ESTIMATED_DECAY_PER_HOUR,
    LIQUIDITY_SATURATION,
};
use tracing::debug;

use crate::HealthConfig;

/// Clamp a sub-score or composite into [0, 100]. NaN collapses to 0.
#[inline]
fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Pure, deterministic health scorer
#[derive(Debug, Clone)]
pub struct HealthEngine {
    config: HealthConfig,
}

impl HealthEngine {
    pub fn new(config: HealthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// Derive the five normalized sub-scores from raw measurements
    pub fn compute_metrics(input: &HealthMetricsInput) -> IceHealthMetrics {
        let buyback_frequency = clamp_score(
            input.buyback_count_last_24h as f64 / BUYBACK_FREQUENCY_SATURATION * 100.0,
        );

        let buyback_coverage = if input.recent_sell_pressure == 0.0 {
            100.0
        } else {
            clamp_score(input.buyback_volume_last_24h / input.recent_sell_pressure * 100.0)
        };

        let liquidity_depth =
            clamp_score(input.current_liquidity / LIQUIDITY_SATURATION * 100.0);

        let volatility_penalty = clamp_score(input.volatility_percent_24h);

        let time_decay =
            clamp_score(input.hours_since_last_action() / DECAY_HORIZON_HOURS * 100.0);

        IceHealthMetrics {
            buyback_frequency,
            buyback_coverage,
            liquidity_depth,
            volatility_penalty,
            time_decay,
        }
    }

    /// Weighted composite of the sub-scores, clamped to [0, 100]
    pub fn composite(&self, metrics: &IceHealthMetrics) -> f64 {
        let w = &self.config.weights;
        clamp_score(
            w.buyback_frequency * metrics.buyback_frequency
                + w.buyback_coverage * metrics.buyback_coverage
                + w.liquidity_depth * metrics.liquidity_depth
                - w.volatility_penalty * metrics.volatility_penalty
                - w.time_decay * metrics.time_decay,
        )
    }

    /// Compute the health snapshot for an epoch
    pub fn compute_health(&self, input: &HealthMetricsInput, epoch_number: u64) -> IceHealthState {
        let metrics = Self::compute_metrics(input);
        let health = self.composite(&metrics);
        let status = HealthStatus::classify(health, self.config.threshold);

        debug!(
            epoch = epoch_number,
            health = round2(health),
            status = %status,
            frequency = round2(metrics.buyback_frequency),
            coverage = round2(metrics.buyback_coverage),
            liquidity = round2(metrics.liquidity_depth),
            volatility = round2(metrics.volatility_penalty),
            decay = round2(metrics.time_decay),
            "Health computed"
        );

        IceHealthState {
            timestamp: input.current_timestamp,
            health,
            metrics,
            status,
            last_action_time: input.last_action_timestamp,
            epoch_number,
        }
    }

    /// Minutes until an ALIVE score decays to the threshold
    ///
    /// Linear extrapolation at [`ESTIMATED_DECAY_PER_HOUR`]. Advisory only;
    /// nothing in the control path reads it. Returns 0 when the state is
    /// already MELTING or DEAD.
    pub fn estimate_time_to_threshold(&self, state: &IceHealthState) -> u64 {
        if state.status != HealthStatus::Alive {
            return 0;
        }
        let margin = state.health - self.config.threshold;
        if margin <= 0.0 {
            return 0;
        }
        (margin / ESTIMATED_DECAY_PER_HOUR * 60.0).ceil() as u64
    }
}

impl Default for HealthEngine {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
