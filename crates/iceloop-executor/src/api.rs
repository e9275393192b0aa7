//! HTTP status surface
//!
//! | method | path                      | purpose                          |
//! |--------|---------------------------|----------------------------------|
//! | GET    | `/health`                 | liveness                         |
//! | GET    | `/state`                  | executor and fee snapshot        |
//! | GET    | `/epochs?limit=N`         | recent epoch reports, newest first |
//! | GET    | `/metrics`                | Prometheus text format           |
//! | POST   | `/circuit-breaker/reset`  | manual breaker reset             |
//! | POST   | `/fees`                   | inject a fee event (channel source only) |

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use iceloop_common::{FeeEvent, VERSION};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use crate::executor::EngineSnapshot;
use crate::fees::FeeInjector;
use crate::orchestrator::{EpochReport, Orchestrator};

const DEFAULT_EPOCH_LIMIT: usize = 20;
const MAX_EPOCH_LIMIT: usize = 500;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub injector: Option<FeeInjector>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(engine_state))
        .route("/epochs", get(epochs))
        .route("/metrics", get(metrics))
        .route("/circuit-breaker/reset", post(reset_circuit_breaker))
        .route("/fees", post(inject_fee))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": VERSION }))
}

async fn engine_state(State(state): State<AppState>) -> Json<EngineSnapshot> {
    Json(state.orchestrator.snapshot().await)
}

#[derive(Debug, Deserialize)]
pub struct EpochsQuery {
    limit: Option<usize>,
}

async fn epochs(
    State(state): State<AppState>,
    Query(query): Query<EpochsQuery>,
) -> Json<Vec<EpochReport>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EPOCH_LIMIT)
        .min(MAX_EPOCH_LIMIT);
    Json(state.orchestrator.reports().recent(limit))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.orchestrator.metrics().render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn reset_circuit_breaker(State(state): State<AppState>) -> Json<EngineSnapshot> {
    info!("Manual circuit breaker reset requested");
    Json(state.orchestrator.reset_circuit_breaker().await)
}

#[derive(Debug, Deserialize)]
pub struct FeeRequest {
    reference: String,
    amount: Decimal,
    #[serde(default = "default_provenance")]
    provenance: String,
}

fn default_provenance() -> String {
    "external".to_string()
}

async fn inject_fee(State(state): State<AppState>, Json(request): Json<FeeRequest>) -> Response {
    let Some(injector) = state.injector.as_ref() else {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "fee injection requires the channel fee source" })),
        )
            .into_response();
    };

    let event = FeeEvent::new(request.reference, request.amount, request.provenance);
    match injector.inject(event).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Executor, ExecutorConfig};
    use crate::fees::{ChannelFeeSource, FeeSource, FeeTracker};
    use crate::market::{MarketSnapshot, StaticMarketData};
    use crate::swap::UnsupportedSwapEngine;
    use crate::telemetry::ExecutorMetrics;
    use crate::treasury::SimulatedTreasury;
    use iceloop_allocator::{AllocationStrategy, StrategyKind};
    use iceloop_common::AllocationConfig;
    use iceloop_health::{HealthConfig, HealthEngine};
    use rust_decimal_macros::dec;

    fn app_state(injector: Option<FeeInjector>) -> AppState {
        let executor = Executor::new(
            ExecutorConfig::default(),
            AllocationConfig::default(),
            AllocationStrategy::from_kind(StrategyKind::Fixed),
            Arc::new(UnsupportedSwapEngine::new("jupiter")),
            Arc::new(SimulatedTreasury::new(dec!(1))),
            Arc::new(FeeTracker::new()),
        );
        let orchestrator = Orchestrator::new(
            HealthEngine::new(HealthConfig::default()),
            executor,
            Arc::new(StaticMarketData::new(MarketSnapshot::default())),
            Arc::new(ExecutorMetrics::new().unwrap()),
            10,
        );
        AppState {
            orchestrator: Arc::new(orchestrator),
            injector,
        }
    }

    #[tokio::test]
    async fn test_state_and_epochs() {
        let state = app_state(None);
        state.orchestrator.tick(1_700_000_000).await.unwrap();

        let Json(snapshot) = engine_state(State(state.clone())).await;
        assert_eq!(snapshot.executor.epoch_number, 1);
        assert_eq!(snapshot.strategy, "fixed");

        let Json(reports) = epochs(State(state), Query(EpochsQuery { limit: Some(5) })).await;
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = app_state(None);
        state.orchestrator.tick(1_700_000_000).await.unwrap();

        let response = metrics(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fee_injection_requires_channel_source() {
        let state = app_state(None);
        let request = FeeRequest {
            reference: "sig-1".into(),
            amount: dec!(1),
            provenance: default_provenance(),
        };
        let response = inject_fee(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let (source, injector) = ChannelFeeSource::new(4);
        let state = app_state(Some(injector));
        let request = FeeRequest {
            reference: "sig-1".into(),
            amount: dec!(1),
            provenance: default_provenance(),
        };
        let response = inject_fee(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(source.detect().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fee_injection_rejects_amount_above_ceiling() {
        let (source, injector) = ChannelFeeSource::new(4);
        let state = app_state(Some(injector.clone()));
        let request = FeeRequest {
            reference: "sig-huge".into(),
            amount: Decimal::MAX,
            provenance: default_provenance(),
        };

        let response = inject_fee(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(source.detect().await.unwrap().is_empty());
        drop(injector);
    }

    #[tokio::test]
    async fn test_reset_endpoint() {
        let state = app_state(None);
        let Json(snapshot) = reset_circuit_breaker(State(state)).await;
        assert!(!snapshot.executor.circuit_breaker_active);
        assert_eq!(snapshot.executor.consecutive_failures, 0);
    }
}
