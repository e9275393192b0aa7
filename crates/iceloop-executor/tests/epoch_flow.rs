//! End-to-end epoch tests over the simulated collaborators

use std::sync::Arc;

use iceloop_allocator::{AllocationStrategy, StrategyKind};
use iceloop_common::{
    ActionStatus, ActionType, AllocationConfig, FeeEvent, HealthStatus, SOL_MINT,
};
use iceloop_executor::executor::{EpochFailure, SkipReason};
use iceloop_executor::market::{MarketSnapshot, StaticMarketData};
use iceloop_executor::swap::SimulatedSwapEngine;
use iceloop_executor::treasury::SimulatedTreasury;
use iceloop_executor::{
    EpochOutcome, Executor, ExecutorConfig, ExecutorMetrics, ExecutorMode, FeeTracker, IceConfig,
    Iceloop, Orchestrator,
};
use iceloop_health::{HealthConfig, HealthEngine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const T0: i64 = 1_700_000_000;

struct Engine {
    orchestrator: Orchestrator,
    fees: Arc<FeeTracker>,
    treasury: Arc<SimulatedTreasury>,
    market: Arc<StaticMarketData>,
}

fn engine(mode: ExecutorMode, strategy: StrategyKind, pool_quote_reserve: Decimal) -> Engine {
    let fees = Arc::new(FeeTracker::new());
    let treasury = Arc::new(SimulatedTreasury::new(dec!(5)));
    let market = Arc::new(StaticMarketData::new(MarketSnapshot {
        recent_sell_pressure: 2.0,
        current_liquidity: 40.0,
        volatility_percent_24h: 20.0,
    }));

    let executor = Executor::new(
        ExecutorConfig {
            mode,
            min_interval_seconds: 600,
            max_consecutive_failures: 2,
            max_price_impact_bps: 500,
            ..Default::default()
        },
        AllocationConfig::default(),
        AllocationStrategy::from_kind(strategy),
        Arc::new(SimulatedSwapEngine::new(
            SOL_MINT,
            "ICE",
            pool_quote_reserve,
            dec!(50000000),
        )),
        treasury.clone(),
        fees.clone(),
    );

    let orchestrator = Orchestrator::new(
        HealthEngine::new(HealthConfig::default()),
        executor,
        market.clone(),
        Arc::new(ExecutorMetrics::new().unwrap()),
        50,
    );

    Engine {
        orchestrator,
        fees,
        treasury,
        market,
    }
}

fn fee(reference: &str, amount: Decimal) -> FeeEvent {
    FeeEvent::new(reference, amount, "trading-fees").with_timestamp(T0)
}

#[tokio::test]
async fn live_epochs_raise_health_over_time() {
    let e = engine(ExecutorMode::Live, StrategyKind::Adaptive, dec!(5000));

    let mut scores = Vec::new();
    for i in 0..4 {
        e.fees.record(fee(&format!("sig-{i}"), dec!(2)));
        let report = e.orchestrator.tick(T0 + i * 600).await.unwrap();
        assert!(report.outcome.allocation().is_some(), "epoch {i} should settle");
        scores.push(report.health.health);
    }

    // Each executed buyback lifts frequency and coverage
    assert!(scores.windows(2).all(|w| w[1] > w[0]));

    let snapshot = e.orchestrator.snapshot().await;
    assert_eq!(snapshot.executor.epoch_number, 4);
    assert_eq!(snapshot.fees.pending, Decimal::ZERO);
    assert_eq!(snapshot.fees.lifetime_allocated, dec!(8));
    assert_eq!(snapshot.fees.last_processed_reference.as_deref(), Some("sig-3"));
}

#[tokio::test]
async fn price_impact_ceiling_rejects_buyback_in_thin_pool() {
    // 1.7 into a pool of 10 is far above 500 bps
    let e = engine(ExecutorMode::Live, StrategyKind::Fixed, dec!(10));
    e.fees.record(fee("sig-1", dec!(2.43)));

    let report = e.orchestrator.tick(T0).await.unwrap();
    let allocation = report.outcome.allocation().unwrap();

    let buyback = &allocation.actions[0];
    assert_eq!(buyback.action_type, ActionType::Buyback);
    assert_eq!(buyback.status, ActionStatus::Failed);
    assert!(buyback.tx_reference.is_none());

    // The epoch still settles and siblings still run
    let cooling = allocation
        .actions
        .iter()
        .find(|a| a.action_type == ActionType::CoolingEvent)
        .unwrap();
    assert_eq!(cooling.status, ActionStatus::Executed);
    assert_eq!(report.executor.consecutive_failures, 0);
}

#[tokio::test]
async fn epochs_respect_min_interval() {
    let e = engine(ExecutorMode::DryRun, StrategyKind::Fixed, dec!(5000));
    e.fees.record(fee("sig-1", dec!(1)));
    e.orchestrator.tick(T0).await.unwrap();

    let mut settled_at = vec![T0];
    for step in 1..=12 {
        let now = T0 + step * 100;
        e.fees.record(fee(&format!("sig-{}", step + 1), dec!(1)));
        let report = e.orchestrator.tick(now).await.unwrap();
        if report.outcome.allocation().is_some() {
            settled_at.push(now);
        } else {
            assert!(matches!(
                report.outcome,
                EpochOutcome::Skipped(SkipReason::RateLimited { .. })
            ));
        }
    }

    assert_eq!(settled_at, vec![T0, T0 + 600, T0 + 1200]);
    assert!(settled_at.windows(2).all(|w| w[1] - w[0] >= 600));
}

#[tokio::test]
async fn breaker_lifecycle_through_orchestrator() {
    let e = engine(ExecutorMode::Live, StrategyKind::Adaptive, dec!(5000));
    e.fees.record(fee("sig-1", dec!(1)));
    e.treasury.set_balance(dec!(0.001));

    let first = e.orchestrator.tick(T0).await.unwrap();
    assert!(matches!(
        first.outcome,
        EpochOutcome::Failed(EpochFailure::InsufficientBalance { .. })
    ));
    let second = e.orchestrator.tick(T0 + 1).await.unwrap();
    assert!(second.executor.circuit_breaker_active);

    e.treasury.set_balance(dec!(5));
    let third = e.orchestrator.tick(T0 + 10_000).await.unwrap();
    assert_eq!(third.outcome, EpochOutcome::Skipped(SkipReason::CircuitOpen));

    let snapshot = e.orchestrator.reset_circuit_breaker().await;
    assert!(!snapshot.executor.circuit_breaker_active);
    assert_eq!(snapshot.executor.consecutive_failures, 0);

    let fourth = e.orchestrator.tick(T0 + 10_001).await.unwrap();
    assert!(fourth.outcome.allocation().is_some());
}

#[tokio::test]
async fn dust_never_allocates() {
    let e = engine(ExecutorMode::Live, StrategyKind::Fixed, dec!(5000));
    e.fees.record(fee("sig-1", dec!(0.009)));

    for i in 0..3 {
        let report = e.orchestrator.tick(T0 + i * 1000).await.unwrap();
        assert!(matches!(
            report.outcome,
            EpochOutcome::Skipped(SkipReason::BelowDust { .. })
        ));
    }
    assert_eq!(e.fees.pending(), dec!(0.009));

    e.fees.record(fee("sig-2", dec!(0.001)));
    let report = e.orchestrator.tick(T0 + 5000).await.unwrap();
    assert_eq!(report.outcome.allocation().unwrap().total_fees, dec!(0.01));
}

#[tokio::test]
async fn snapshot_has_no_side_effects() {
    let e = engine(ExecutorMode::DryRun, StrategyKind::Fixed, dec!(5000));
    e.fees.record(fee("sig-1", dec!(1)));
    e.orchestrator.tick(T0).await.unwrap();

    let a = e.orchestrator.snapshot().await;
    let b = e.orchestrator.snapshot().await;
    assert_eq!(a, b);
    assert_eq!(e.orchestrator.reports().len(), 1);
}

#[tokio::test]
async fn collapsing_market_reads_dead() {
    let e = engine(ExecutorMode::DryRun, StrategyKind::Adaptive, dec!(5000));
    e.market.set(MarketSnapshot {
        recent_sell_pressure: 20.0,
        current_liquidity: 1.0,
        volatility_percent_24h: 50.0,
    });

    let report = e.orchestrator.tick(T0).await.unwrap();
    assert_eq!(report.health.status, HealthStatus::Dead);
    assert_eq!(report.health.display_health(), 0.0);
    assert_eq!(report.minutes_to_threshold, 0);
}

#[test]
fn engine_builds_from_default_config() {
    let engine = Iceloop::from_config(IceConfig::default()).unwrap();
    assert!(engine.injector().is_none());
    assert_eq!(engine.config().executor.mode, ExecutorMode::DryRun);
}
