//! Epoch orchestration
//!
//! Each tick builds the health input, scores it, hands the snapshot to the
//! executor and records a report. The executor mutex is held from health
//! computation to settlement, so epochs never overlap and the snapshot the
//! executor acts on carries the epoch number it will run under.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use iceloop_common::{IceHealthState, Result};
use iceloop_health::HealthEngine;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::executor::{EngineSnapshot, EpochOutcome, Executor, ExecutorState};
use crate::fees::FeeTrackerSnapshot;
use crate::market::{ActivityWindow, MarketDataSource};
use crate::telemetry::ExecutorMetrics;

/// Everything observed about one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub id: Uuid,
    pub epoch_number: u64,
    pub timestamp: i64,
    pub health: IceHealthState,
    /// Estimated minutes until health crosses the threshold
    pub minutes_to_threshold: u64,
    pub outcome: EpochOutcome,
    pub executor: ExecutorState,
    pub fees: FeeTrackerSnapshot,
    pub duration_ms: u64,
}

/// Bounded history of epoch reports, oldest evicted first
#[derive(Debug)]
pub struct ReportLog {
    capacity: usize,
    reports: RwLock<VecDeque<EpochReport>>,
}

impl ReportLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            reports: RwLock::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn push(&self, report: EpochReport) {
        let mut reports = self.reports.write();
        if reports.len() == self.capacity {
            reports.pop_front();
        }
        reports.push_back(report);
    }

    /// Up to `limit` reports, newest first
    pub fn recent(&self, limit: usize) -> Vec<EpochReport> {
        self.reports.read().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drives epochs against a shared executor
pub struct Orchestrator {
    health: HealthEngine,
    executor: tokio::sync::Mutex<Executor>,
    market: Arc<dyn MarketDataSource>,
    activity: Mutex<ActivityWindow>,
    metrics: Arc<ExecutorMetrics>,
    reports: ReportLog,
}

impl Orchestrator {
    pub fn new(
        health: HealthEngine,
        executor: Executor,
        market: Arc<dyn MarketDataSource>,
        metrics: Arc<ExecutorMetrics>,
        report_history: usize,
    ) -> Self {
        Self {
            health,
            executor: tokio::sync::Mutex::new(executor),
            market,
            activity: Mutex::new(ActivityWindow::new()),
            metrics,
            reports: ReportLog::new(report_history),
        }
    }

    pub fn metrics(&self) -> &ExecutorMetrics {
        &self.metrics
    }

    pub fn reports(&self) -> &ReportLog {
        &self.reports
    }

    /// Run one epoch at `now` (Unix seconds)
    #[instrument(skip(self))]
    pub async fn tick(&self, now: i64) -> Result<EpochReport> {
        let started = Instant::now();
        let mut executor = self.executor.lock().await;

        let market = self.market.snapshot().await?;
        let input = self.activity.lock().health_input(&market, now);
        let epoch_number = executor.next_epoch_number();
        let health = self.health.compute_health(&input, epoch_number);

        let outcome = executor.run_epoch(&health, now).await;
        let state = executor.state();
        let fees = executor.snapshot().fees;
        drop(executor);

        if let Some(allocation) = outcome.allocation() {
            self.activity.lock().record(allocation, now);
        }

        let elapsed = started.elapsed();
        self.metrics
            .observe_epoch(&health, &outcome, &state, elapsed.as_secs_f64());

        let report = EpochReport {
            id: Uuid::now_v7(),
            epoch_number,
            timestamp: now,
            minutes_to_threshold: self.health.estimate_time_to_threshold(&health),
            health,
            outcome,
            executor: state,
            fees,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        };

        info!(
            epoch = report.epoch_number,
            health = report.health.display_health(),
            status = %report.health.status,
            outcome = report.outcome.label(),
            reason = report.outcome.reason(),
            "Epoch complete"
        );
        match serde_json::to_string(&report) {
            Ok(json) => info!(target: "iceloop::report", report = %json),
            Err(e) => warn!(error = %e, "Failed to serialize epoch report"),
        }

        self.reports.push(report.clone());
        Ok(report)
    }

    /// Executor and fee state without side effects
    pub async fn snapshot(&self) -> EngineSnapshot {
        self.executor.lock().await.snapshot()
    }

    /// Manual circuit breaker reset
    pub async fn reset_circuit_breaker(&self) -> EngineSnapshot {
        let mut executor = self.executor.lock().await;
        executor.reset_circuit_breaker();
        self.metrics.observe_state(&executor.state());
        executor.snapshot()
    }

    /// Tick every `interval` until `shutdown` flips. An epoch in progress
    /// always completes before the loop exits.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "Epoch loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            let now = chrono::Utc::now().timestamp();
            if let Err(e) = self.tick(now).await {
                warn!(error = %e, "Epoch tick aborted");
            }
        }

        info!("Epoch loop stopped");
    }
}
