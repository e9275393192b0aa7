//! Logging and Prometheus metrics

use anyhow::Result;
use iceloop_common::{ActionType, IceHealthState};
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::executor::{EpochOutcome, ExecutorState};

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }
    Ok(())
}

/// Epoch engine metrics
pub struct ExecutorMetrics {
    registry: Registry,
    pub epochs_total: IntCounterVec,
    pub actions_total: IntCounterVec,
    pub allocated_total: prometheus::CounterVec,
    pub consecutive_failures: IntGauge,
    pub circuit_breaker_open: IntGauge,
    pub epoch_number: IntGauge,
    pub health_score: Gauge,
    pub epoch_duration_seconds: Histogram,
}

impl ExecutorMetrics {
    /// Create metrics registered into a fresh registry
    pub fn new() -> Result<Self> {
        let metrics = Self {
            registry: Registry::new(),
            epochs_total: IntCounterVec::new(
                Opts::new("iceloop_epochs_total", "Epochs by outcome and reason"),
                &["outcome", "reason"],
            )?,
            actions_total: IntCounterVec::new(
                Opts::new("iceloop_actions_total", "Allocation actions by type and status"),
                &["action", "status"],
            )?,
            allocated_total: prometheus::CounterVec::new(
                Opts::new("iceloop_allocated_total", "Fees allocated by category"),
                &["category"],
            )?,
            consecutive_failures: IntGauge::new(
                "iceloop_consecutive_failures",
                "Operational failures since the last settled epoch",
            )?,
            circuit_breaker_open: IntGauge::new(
                "iceloop_circuit_breaker_open",
                "1 while the circuit breaker is tripped",
            )?,
            epoch_number: IntGauge::new("iceloop_epoch_number", "Current epoch number")?,
            health_score: Gauge::new("iceloop_health_score", "Last computed health score")?,
            epoch_duration_seconds: Histogram::with_opts(
                HistogramOpts::new("iceloop_epoch_duration_seconds", "Epoch wall time")
                    .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            )?,
        };
        metrics.register()?;
        Ok(metrics)
    }

    fn register(&self) -> Result<()> {
        self.registry.register(Box::new(self.epochs_total.clone()))?;
        self.registry.register(Box::new(self.actions_total.clone()))?;
        self.registry.register(Box::new(self.allocated_total.clone()))?;
        self.registry.register(Box::new(self.consecutive_failures.clone()))?;
        self.registry.register(Box::new(self.circuit_breaker_open.clone()))?;
        self.registry.register(Box::new(self.epoch_number.clone()))?;
        self.registry.register(Box::new(self.health_score.clone()))?;
        self.registry.register(Box::new(self.epoch_duration_seconds.clone()))?;
        Ok(())
    }

    /// Record the outcome of one epoch
    pub fn observe_epoch(
        &self,
        health: &IceHealthState,
        outcome: &EpochOutcome,
        state: &ExecutorState,
        elapsed_secs: f64,
    ) {
        self.epochs_total
            .with_label_values(&[outcome.label(), outcome.reason()])
            .inc();
        self.health_score.set(health.health);
        self.epoch_duration_seconds.observe(elapsed_secs);
        self.observe_state(state);

        if let Some(allocation) = outcome.allocation() {
            for action_type in ActionType::ORDER {
                let amount = allocation.amount_for(action_type).to_f64().unwrap_or(0.0);
                if amount > 0.0 {
                    self.allocated_total
                        .with_label_values(&[action_type.as_str()])
                        .inc_by(amount);
                }
            }
            for action in &allocation.actions {
                self.actions_total
                    .with_label_values(&[action.action_type.as_str(), action.status.as_str()])
                    .inc();
            }
        }
    }

    /// Mirror executor state into gauges
    pub fn observe_state(&self, state: &ExecutorState) {
        self.consecutive_failures
            .set(i64::from(state.consecutive_failures));
        self.circuit_breaker_open
            .set(i64::from(state.circuit_breaker_active));
        self.epoch_number
            .set(i64::try_from(state.epoch_number).unwrap_or(i64::MAX));
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SkipReason;
    use iceloop_common::{
        AllocationAction, AllocationConfig, EpochAllocation, HealthStatus, IceHealthMetrics,
    };
    use rust_decimal_macros::dec;

    fn health() -> IceHealthState {
        IceHealthState {
            timestamp: 0,
            health: 42.5,
            metrics: IceHealthMetrics {
                buyback_frequency: 0.0,
                buyback_coverage: 0.0,
                liquidity_depth: 0.0,
                volatility_penalty: 0.0,
                time_decay: 0.0,
            },
            status: HealthStatus::Melting,
            last_action_time: 0,
            epoch_number: 3,
        }
    }

    #[test]
    fn test_observe_settled_epoch() {
        let metrics = ExecutorMetrics::new().unwrap();
        let mut allocation = EpochAllocation::from_percentages(
            3,
            "fixed",
            dec!(10),
            AllocationConfig::default().percentages(),
        )
        .unwrap();
        let mut action = AllocationAction::pending(ActionType::Buyback, dec!(7));
        action.mark_executed(Some("tx".into()));
        allocation.actions.push(action);

        let state = ExecutorState {
            epoch_number: 3,
            ..Default::default()
        };
        metrics.observe_epoch(&health(), &EpochOutcome::Settled(allocation), &state, 0.02);

        assert_eq!(
            metrics
                .epochs_total
                .with_label_values(&["settled", "none"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .actions_total
                .with_label_values(&["buyback", "executed"])
                .get(),
            1
        );
        assert_eq!(
            metrics.allocated_total.with_label_values(&["buyback"]).get(),
            7.0
        );
        assert_eq!(metrics.health_score.get(), 42.5);
        assert_eq!(metrics.epoch_number.get(), 3);
    }

    #[test]
    fn test_render_contains_breaker_gauge() {
        let metrics = ExecutorMetrics::new().unwrap();
        let state = ExecutorState {
            circuit_breaker_active: true,
            consecutive_failures: 5,
            ..Default::default()
        };
        metrics.observe_epoch(
            &health(),
            &EpochOutcome::Skipped(SkipReason::CircuitOpen),
            &state,
            0.0,
        );

        let text = metrics.render().unwrap();
        assert!(text.contains("iceloop_circuit_breaker_open 1"));
        assert!(text.contains("iceloop_consecutive_failures 5"));
        assert!(text.contains("reason=\"circuit_open\""));
    }
}
