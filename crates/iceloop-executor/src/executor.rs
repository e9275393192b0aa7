//! Epoch executor
//!
//! Runs one epoch at a time through a guarded sequence:
//!
//! ```text
//! Idle → CheckingPreconditions → Allocating → Executing → Settled
//!                 │                    │            │
//!                 └── skip / fail ─────┴────────────┴──→ Idle
//!
//! failures ≥ max_consecutive_failures → CircuitOpen (until manual reset)
//! ```
//!
//! Skips (breaker open, rate limit, dust) are silent and leave the failure
//! counter untouched. Low balance, balance query errors and errors or panics
//! while allocating or executing count as failures.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use iceloop_allocator::{AllocationPolicy, AllocationStrategy};
use iceloop_common::{
    AllocationConfig, AllocationError, ConfigError, EpochAllocation, IceHealthState,
    DUST_THRESHOLD, SOL_MINT,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::actions::{ActionRunner, BuybackParams};
use crate::fees::{FeeTracker, FeeTrackerSnapshot};
use crate::swap::SwapEngine;
use crate::treasury::Treasury;

/// Whether settled epochs act on-chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorMode {
    #[default]
    DryRun,
    Live,
}

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub mode: ExecutorMode,
    /// Minimum seconds between two settled epochs
    pub min_interval_seconds: u64,
    /// Failures in a row that trip the circuit breaker
    pub max_consecutive_failures: u32,
    /// Treasury balance required to run an epoch
    pub min_balance_to_operate: Decimal,
    pub max_slippage_bps: u32,
    /// Quotes above this impact are rejected without swapping
    pub max_price_impact_bps: u32,
    /// Asset spent on buybacks
    pub quote_asset: String,
    /// Token bought back
    pub target_asset: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::DryRun,
            min_interval_seconds: 240,
            max_consecutive_failures: 5,
            min_balance_to_operate: Decimal::new(5, 2),
            max_slippage_bps: 300,
            max_price_impact_bps: 500,
            quote_asset: SOL_MINT.to_string(),
            target_asset: "ICE".to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::InvalidValue {
                field: "executor.max_consecutive_failures",
                reason: "must be at least 1".into(),
            });
        }
        if i64::try_from(self.min_interval_seconds).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "executor.min_interval_seconds",
                reason: format!("cannot exceed {}", i64::MAX),
            });
        }
        if self.min_balance_to_operate < Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "executor.min_balance_to_operate",
                reason: "cannot be negative".into(),
            });
        }
        if self.max_slippage_bps > 10_000 {
            return Err(ConfigError::InvalidValue {
                field: "executor.max_slippage_bps",
                reason: "cannot exceed 10000".into(),
            });
        }
        if self.max_price_impact_bps == 0 || self.max_price_impact_bps > 10_000 {
            return Err(ConfigError::InvalidValue {
                field: "executor.max_price_impact_bps",
                reason: "must be within 1-10000".into(),
            });
        }
        if self.quote_asset.is_empty() || self.target_asset.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "executor.target_asset",
                reason: "quote and target assets are required".into(),
            });
        }
        Ok(())
    }

    fn buyback_params(&self) -> BuybackParams {
        BuybackParams {
            input_asset: self.quote_asset.clone(),
            output_asset: self.target_asset.clone(),
            max_slippage_bps: self.max_slippage_bps,
            max_price_impact_bps: self.max_price_impact_bps,
        }
    }
}

/// Mutable state carried between epochs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorState {
    /// Unix seconds of the last settled epoch (0 = never)
    pub last_execution_time: i64,
    pub consecutive_failures: u32,
    pub epoch_number: u64,
    pub circuit_breaker_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochPhase {
    Idle,
    CheckingPreconditions,
    Allocating,
    Executing,
    Settled,
    CircuitOpen,
}

/// Silent, uncounted reasons to skip an epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    CircuitOpen,
    RateLimited { elapsed_secs: i64, min_interval_secs: u64 },
    BelowDust { accumulated: Decimal },
}

/// Counted operational failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochFailure {
    InsufficientBalance { balance: Decimal, required: Decimal },
    BalanceUnavailable(String),
    Allocation(String),
    Panicked(String),
}

impl From<AllocationError> for EpochFailure {
    fn from(err: AllocationError) -> Self {
        EpochFailure::Allocation(err.to_string())
    }
}

/// Result of one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum EpochOutcome {
    Skipped(SkipReason),
    Failed(EpochFailure),
    Settled(EpochAllocation),
}

impl EpochOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            EpochOutcome::Skipped(_) => "skipped",
            EpochOutcome::Failed(_) => "failed",
            EpochOutcome::Settled(_) => "settled",
        }
    }

    /// Short machine-readable reason for skips and failures
    pub fn reason(&self) -> &'static str {
        match self {
            EpochOutcome::Skipped(SkipReason::CircuitOpen) => "circuit_open",
            EpochOutcome::Skipped(SkipReason::RateLimited { .. }) => "rate_limited",
            EpochOutcome::Skipped(SkipReason::BelowDust { .. }) => "below_dust",
            EpochOutcome::Failed(EpochFailure::InsufficientBalance { .. }) => {
                "insufficient_balance"
            }
            EpochOutcome::Failed(EpochFailure::BalanceUnavailable(_)) => "balance_unavailable",
            EpochOutcome::Failed(EpochFailure::Allocation(_)) => "allocation",
            EpochOutcome::Failed(EpochFailure::Panicked(_)) => "panicked",
            EpochOutcome::Settled(_) => "none",
        }
    }

    pub fn allocation(&self) -> Option<&EpochAllocation> {
        match self {
            EpochOutcome::Settled(allocation) => Some(allocation),
            _ => None,
        }
    }
}

/// Read-only view of executor and fee state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub mode: ExecutorMode,
    pub strategy: String,
    pub phase: EpochPhase,
    pub executor: ExecutorState,
    pub fees: FeeTrackerSnapshot,
}

/// Single-writer epoch state machine
pub struct Executor {
    config: ExecutorConfig,
    allocation: AllocationConfig,
    strategy: AllocationStrategy,
    swap: Arc<dyn SwapEngine>,
    treasury: Arc<dyn Treasury>,
    fees: Arc<FeeTracker>,
    state: ExecutorState,
    phase: EpochPhase,
}

impl Executor {
    pub fn new(
        config: ExecutorConfig,
        allocation: AllocationConfig,
        strategy: AllocationStrategy,
        swap: Arc<dyn SwapEngine>,
        treasury: Arc<dyn Treasury>,
        fees: Arc<FeeTracker>,
    ) -> Self {
        Self {
            config,
            allocation,
            strategy,
            swap,
            treasury,
            fees,
            state: ExecutorState::default(),
            phase: EpochPhase::Idle,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn phase(&self) -> EpochPhase {
        self.phase
    }

    /// Number the next call to [`run_epoch`](Self::run_epoch) will use
    pub fn next_epoch_number(&self) -> u64 {
        self.state.epoch_number + 1
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            mode: self.config.mode,
            strategy: self.strategy.name().to_string(),
            phase: self.phase,
            executor: self.state,
            fees: self.fees.snapshot(),
        }
    }

    /// Manually close the circuit breaker and clear the failure counter
    pub fn reset_circuit_breaker(&mut self) {
        let was_active = self.state.circuit_breaker_active;
        self.state.circuit_breaker_active = false;
        self.state.consecutive_failures = 0;
        self.phase = EpochPhase::Idle;
        info!(was_active, "Circuit breaker reset");
    }

    fn transition(&mut self, phase: EpochPhase) {
        debug!(from = ?self.phase, to = ?phase, "Epoch phase");
        self.phase = phase;
    }

    /// Run one epoch with `health` computed for this tick
    #[instrument(skip_all, fields(epoch = self.state.epoch_number + 1, health = health.display_health()))]
    pub async fn run_epoch(&mut self, health: &IceHealthState, now: i64) -> EpochOutcome {
        self.state.epoch_number += 1;

        if self.state.circuit_breaker_active {
            self.phase = EpochPhase::CircuitOpen;
            debug!("Circuit breaker open, epoch skipped");
            return EpochOutcome::Skipped(SkipReason::CircuitOpen);
        }

        self.transition(EpochPhase::CheckingPreconditions);

        let elapsed = now.saturating_sub(self.state.last_execution_time);
        let min_interval = i64::try_from(self.config.min_interval_seconds).unwrap_or(i64::MAX);
        if elapsed < min_interval {
            debug!(elapsed, "Minimum interval not reached");
            return self.skip(SkipReason::RateLimited {
                elapsed_secs: elapsed,
                min_interval_secs: self.config.min_interval_seconds,
            });
        }

        match self.treasury.balance().await {
            Ok(balance) if balance < self.config.min_balance_to_operate => {
                return self.fail(EpochFailure::InsufficientBalance {
                    balance,
                    required: self.config.min_balance_to_operate,
                });
            }
            Ok(_) => {}
            Err(e) => return self.fail(EpochFailure::BalanceUnavailable(e.to_string())),
        }

        let claim = self.fees.claim();
        if claim.amount < DUST_THRESHOLD {
            debug!(accumulated = %claim.amount, "Accumulated fees below dust threshold");
            return self.skip(SkipReason::BelowDust {
                accumulated: claim.amount,
            });
        }

        self.transition(EpochPhase::Allocating);
        let allocated = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.strategy
                .allocate(claim.amount, health, &self.allocation)
        }));
        let mut allocation = match allocated {
            Ok(Ok(allocation)) => allocation,
            Ok(Err(e)) => return self.fail(e.into()),
            Err(panic) => return self.fail(EpochFailure::Panicked(panic_message(panic))),
        };

        if self.config.mode == ExecutorMode::Live {
            self.transition(EpochPhase::Executing);
            let params = self.config.buyback_params();
            let runner = ActionRunner::new(self.swap.as_ref(), &params);
            let executed = AssertUnwindSafe(runner.execute(&mut allocation))
                .catch_unwind()
                .await;
            if let Err(panic) = executed {
                return self.fail(EpochFailure::Panicked(panic_message(panic)));
            }
        }

        self.fees.settle(&claim);
        self.state.consecutive_failures = 0;
        self.state.last_execution_time = now;
        self.transition(EpochPhase::Settled);

        info!(
            strategy = %allocation.strategy,
            total = %allocation.total_fees,
            executed = allocation.executed_actions().count(),
            failed = allocation.failed_actions().count(),
            "Epoch settled"
        );

        self.phase = EpochPhase::Idle;
        EpochOutcome::Settled(allocation)
    }

    fn skip(&mut self, reason: SkipReason) -> EpochOutcome {
        self.phase = EpochPhase::Idle;
        EpochOutcome::Skipped(reason)
    }

    fn fail(&mut self, failure: EpochFailure) -> EpochOutcome {
        self.state.consecutive_failures += 1;
        warn!(
            failure = ?failure,
            consecutive_failures = self.state.consecutive_failures,
            "Epoch failed"
        );

        if self.state.consecutive_failures >= self.config.max_consecutive_failures {
            self.state.circuit_breaker_active = true;
            self.phase = EpochPhase::CircuitOpen;
            error!(
                consecutive_failures = self.state.consecutive_failures,
                "Circuit breaker tripped, epochs suspended until manual reset"
            );
        } else {
            self.phase = EpochPhase::Idle;
        }

        EpochOutcome::Failed(failure)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
