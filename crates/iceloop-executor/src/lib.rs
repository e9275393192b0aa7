//! # Iceloop Executor
//!
//! Epoch engine that turns accumulated protocol fees into corrective token
//! actions.
//!
//! ## Epoch flow
//!
//! ```text
//! FeeSource ──poll──▶ FeeTracker
//!                         │ claim
//! MarketData + Activity ─▶ HealthEngine ─▶ Executor ─▶ AllocationStrategy
//!                                            │
//!                                            ├─ buyback ──▶ SwapEngine (quote, swap)
//!                                            ├─ add-lp / burn (not implemented)
//!                                            └─ cooling (reserved)
//!                                            │
//!                                          settle ──▶ FeeTracker
//! ```
//!
//! All collaborators sit behind traits and are selected once at startup from
//! [`IceConfig`].

pub mod actions;
pub mod api;
pub mod config;
pub mod executor;
pub mod fees;
pub mod market;
pub mod orchestrator;
pub mod swap;
pub mod telemetry;
pub mod treasury;

pub use config::IceConfig;
pub use executor::{
    EngineSnapshot, EpochFailure, EpochOutcome, EpochPhase, Executor, ExecutorConfig,
    ExecutorMode, ExecutorState, SkipReason,
};
pub use fees::{FeeInjector, FeeSource, FeeTracker, FeeTrackerSnapshot};
pub use orchestrator::{EpochReport, Orchestrator};
pub use swap::SwapEngine;
pub use telemetry::ExecutorMetrics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use iceloop_allocator::AllocationStrategy;
use iceloop_health::HealthEngine;
use tokio::sync::watch;
use tracing::info;

use crate::market::StaticMarketData;
use crate::treasury::SimulatedTreasury;

/// A fully wired engine
pub struct Iceloop {
    config: IceConfig,
    orchestrator: Arc<Orchestrator>,
    fee_source: Arc<dyn FeeSource>,
    fee_tracker: Arc<FeeTracker>,
    injector: Option<FeeInjector>,
}

impl Iceloop {
    /// Build every component from validated configuration
    pub fn from_config(config: IceConfig) -> Result<Self> {
        config.validate()?;

        let fee_tracker = Arc::new(FeeTracker::new());
        let (fee_source, injector) = fees::build_fee_source(&config.fees);
        let swap = swap::build_swap_engine(
            &config.swap,
            &config.executor.quote_asset,
            &config.executor.target_asset,
        );
        let treasury = Arc::new(SimulatedTreasury::from(&config.treasury));
        let market = Arc::new(StaticMarketData::new(config.market));

        let executor = Executor::new(
            config.executor.clone(),
            config.allocation,
            AllocationStrategy::from_kind(config.strategy),
            swap,
            treasury,
            fee_tracker.clone(),
        );
        let orchestrator = Arc::new(Orchestrator::new(
            HealthEngine::new(config.health.clone()),
            executor,
            market,
            Arc::new(ExecutorMetrics::new()?),
            config.epoch.report_history,
        ));

        info!(
            mode = ?config.executor.mode,
            strategy = ?config.strategy,
            swap = config.swap.engine.as_str(),
            fee_source = fee_source.name(),
            "Iceloop engine assembled"
        );

        Ok(Self {
            config,
            orchestrator,
            fee_source,
            fee_tracker,
            injector,
        })
    }

    pub fn config(&self) -> &IceConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        self.orchestrator.clone()
    }

    pub fn fee_tracker(&self) -> Arc<FeeTracker> {
        self.fee_tracker.clone()
    }

    /// Injector for the channel fee source, if configured
    pub fn injector(&self) -> Option<FeeInjector> {
        self.injector.clone()
    }

    pub fn api_state(&self) -> api::AppState {
        api::AppState {
            orchestrator: self.orchestrator.clone(),
            injector: self.injector.clone(),
        }
    }

    /// Run the fee poller and epoch loop until `shutdown` flips
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let poller = fees::spawn_fee_poller(
            self.fee_source.clone(),
            self.fee_tracker.clone(),
            Duration::from_secs(self.config.fees.poll_interval_seconds),
            shutdown.clone(),
        );

        self.orchestrator
            .clone()
            .run(Duration::from_secs(self.config.epoch.interval_seconds), shutdown)
            .await;

        poller.await?;
        Ok(())
    }
}
