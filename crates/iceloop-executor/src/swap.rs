//! Swap engine contract and built-in venues
//!
//! The executor only needs two calls: a dry-run quote and an executed swap.
//! The simulated venue prices against a constant-product pool so that price
//! impact grows with trade size:
//!
//! ```text
//! in'        = in × (10000 − fee_bps) / 10000
//! out        = reserve_out × in' / (reserve_in + in')
//! impact_bps = in' / (reserve_in + in') × 10000
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use iceloop_common::{Quote, QuoteRequest, SwapError, SwapResult};
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

const BPS_DENOMINATOR: u32 = 10_000;

/// Venue able to quote and execute swaps
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwapEngine: Send + Sync {
    /// Price a swap without executing it
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError>;

    /// Execute a swap
    async fn swap(&self, request: &QuoteRequest) -> Result<SwapResult, SwapError>;
}

/// Venue selector read from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapEngineKind {
    #[default]
    Simulated,
    Jupiter,
    Meteora,
}

impl SwapEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapEngineKind::Simulated => "simulated",
            SwapEngineKind::Jupiter => "jupiter",
            SwapEngineKind::Meteora => "meteora",
        }
    }
}

/// Swap engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapSettings {
    pub engine: SwapEngineKind,
    /// Simulated pool reserve of the quote asset
    pub pool_quote_reserve: Decimal,
    /// Simulated pool reserve of the target token
    pub pool_target_reserve: Decimal,
    /// Simulated pool fee
    pub pool_fee_bps: u32,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            engine: SwapEngineKind::Simulated,
            pool_quote_reserve: Decimal::from(1_000),
            pool_target_reserve: Decimal::from(10_000_000),
            pool_fee_bps: 25,
        }
    }
}

/// Build the configured swap engine for the given asset pair
pub fn build_swap_engine(
    settings: &SwapSettings,
    quote_asset: &str,
    target_asset: &str,
) -> Arc<dyn SwapEngine> {
    match settings.engine {
        SwapEngineKind::Simulated => Arc::new(
            SimulatedSwapEngine::new(
                quote_asset,
                target_asset,
                settings.pool_quote_reserve,
                settings.pool_target_reserve,
            )
            .with_fee_bps(settings.pool_fee_bps),
        ),
        kind => Arc::new(UnsupportedSwapEngine::new(kind.as_str())),
    }
}

#[derive(Debug, Clone, Copy)]
struct PoolReserves {
    quote: Decimal,
    target: Decimal,
}

/// In-process constant-product pool for one asset pair
#[derive(Debug)]
pub struct SimulatedSwapEngine {
    quote_asset: String,
    target_asset: String,
    fee_bps: u32,
    reserves: Mutex<PoolReserves>,
}

/// Direction of a swap through the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    QuoteToTarget,
    TargetToQuote,
}

struct Priced {
    output: Decimal,
    impact_bps: f64,
}

impl SimulatedSwapEngine {
    pub fn new(
        quote_asset: impl Into<String>,
        target_asset: impl Into<String>,
        quote_reserve: Decimal,
        target_reserve: Decimal,
    ) -> Self {
        Self {
            quote_asset: quote_asset.into(),
            target_asset: target_asset.into(),
            fee_bps: 0,
            reserves: Mutex::new(PoolReserves {
                quote: quote_reserve,
                target: target_reserve,
            }),
        }
    }

    pub fn with_fee_bps(mut self, fee_bps: u32) -> Self {
        self.fee_bps = fee_bps.min(BPS_DENOMINATOR);
        self
    }

    /// Current (quote, target) reserves
    pub fn reserves(&self) -> (Decimal, Decimal) {
        let reserves = self.reserves.lock();
        (reserves.quote, reserves.target)
    }

    fn direction(&self, request: &QuoteRequest) -> Result<Direction, SwapError> {
        if request.input_asset == self.quote_asset && request.output_asset == self.target_asset {
            Ok(Direction::QuoteToTarget)
        } else if request.input_asset == self.target_asset
            && request.output_asset == self.quote_asset
        {
            Ok(Direction::TargetToQuote)
        } else {
            Err(SwapError::NoRoute {
                input: request.input_asset.clone(),
                output: request.output_asset.clone(),
            })
        }
    }

    fn price(
        &self,
        reserves: &PoolReserves,
        direction: Direction,
        amount_in: Decimal,
    ) -> Result<Priced, SwapError> {
        if amount_in <= Decimal::ZERO {
            return Err(SwapError::InvalidAmount);
        }

        let (reserve_in, reserve_out) = match direction {
            Direction::QuoteToTarget => (reserves.quote, reserves.target),
            Direction::TargetToQuote => (reserves.target, reserves.quote),
        };
        if reserve_in <= Decimal::ZERO || reserve_out <= Decimal::ZERO {
            return Err(SwapError::InsufficientLiquidity {
                requested: amount_in,
                available: reserve_out,
            });
        }

        let denominator = Decimal::from(BPS_DENOMINATOR);
        let effective_in = amount_in * Decimal::from(BPS_DENOMINATOR - self.fee_bps) / denominator;
        let share = effective_in / (reserve_in + effective_in);
        let output = reserve_out * share;

        Ok(Priced {
            output,
            impact_bps: (share * denominator).to_f64().unwrap_or(f64::MAX),
        })
    }

    fn route(&self, direction: Direction) -> String {
        match direction {
            Direction::QuoteToTarget => format!("sim:{}->{}", self.quote_asset, self.target_asset),
            Direction::TargetToQuote => format!("sim:{}->{}", self.target_asset, self.quote_asset),
        }
    }
}

#[async_trait]
impl SwapEngine for SimulatedSwapEngine {
    #[instrument(skip(self), fields(amount = %request.amount_in))]
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError> {
        let direction = self.direction(request)?;
        let reserves = *self.reserves.lock();
        let priced = self.price(&reserves, direction, request.amount_in)?;

        Ok(Quote {
            input_amount: request.amount_in,
            output_amount: priced.output,
            price_impact_bps: priced.impact_bps,
            fee_bps: self.fee_bps,
            route: self.route(direction),
        })
    }

    #[instrument(skip(self), fields(amount = %request.amount_in))]
    async fn swap(&self, request: &QuoteRequest) -> Result<SwapResult, SwapError> {
        let direction = self.direction(request)?;

        // Price and update reserves atomically
        let priced = {
            let mut reserves = self.reserves.lock();
            let priced = self.price(&reserves, direction, request.amount_in)?;
            match direction {
                Direction::QuoteToTarget => {
                    reserves.quote += request.amount_in;
                    reserves.target -= priced.output;
                }
                Direction::TargetToQuote => {
                    reserves.target += request.amount_in;
                    reserves.quote -= priced.output;
                }
            }
            priced
        };

        let result = SwapResult {
            transaction_reference: format!("sim-{}", Uuid::now_v7()),
            input_amount: request.amount_in,
            output_amount: priced.output,
            actual_price_impact_bps: priced.impact_bps,
        };
        debug!(
            tx = %result.transaction_reference,
            output = %result.output_amount,
            impact_bps = priced.impact_bps,
            "Simulated swap executed"
        );
        Ok(result)
    }
}

/// Placeholder for venues without an integration; every call fails
#[derive(Debug, Clone)]
pub struct UnsupportedSwapEngine {
    venue: String,
}

impl UnsupportedSwapEngine {
    pub fn new(venue: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
        }
    }

    fn error(&self) -> SwapError {
        SwapError::Unsupported {
            venue: self.venue.clone(),
        }
    }
}

#[async_trait]
impl SwapEngine for UnsupportedSwapEngine {
    async fn quote(&self, _request: &QuoteRequest) -> Result<Quote, SwapError> {
        Err(self.error())
    }

    async fn swap(&self, _request: &QuoteRequest) -> Result<SwapResult, SwapError> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iceloop_common::SOL_MINT;
    use rust_decimal_macros::dec;

    fn engine() -> SimulatedSwapEngine {
        SimulatedSwapEngine::new(SOL_MINT, "ICE", dec!(1000), dec!(1000000))
    }

    #[tokio::test]
    async fn test_quote_price_impact() {
        let engine = engine();
        let quote = engine
            .quote(&QuoteRequest::new(SOL_MINT, "ICE", dec!(10), 300))
            .await
            .unwrap();

        // 10 / 1010 of the pool
        assert!((quote.price_impact_bps - 99.0099).abs() < 0.001);
        assert!(quote.output_amount > dec!(9900) && quote.output_amount < dec!(9901));
        assert_eq!(quote.route, format!("sim:{}->ICE", SOL_MINT));
    }

    #[tokio::test]
    async fn test_quote_does_not_move_pool() {
        let engine = engine();
        let request = QuoteRequest::new(SOL_MINT, "ICE", dec!(5), 300);
        let first = engine.quote(&request).await.unwrap();
        let second = engine.quote(&request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.reserves(), (dec!(1000), dec!(1000000)));
    }

    #[tokio::test]
    async fn test_swap_updates_reserves() {
        let engine = engine();
        let request = QuoteRequest::new(SOL_MINT, "ICE", dec!(10), 300);
        let quoted = engine.quote(&request).await.unwrap();
        let result = engine.swap(&request).await.unwrap();

        assert_eq!(result.output_amount, quoted.output_amount);
        assert!(result.transaction_reference.starts_with("sim-"));

        let (quote_reserve, target_reserve) = engine.reserves();
        assert_eq!(quote_reserve, dec!(1010));
        assert_eq!(target_reserve, dec!(1000000) - result.output_amount);

        // Second identical swap gets a worse price
        let again = engine.quote(&request).await.unwrap();
        assert!(again.output_amount < quoted.output_amount);
    }

    #[tokio::test]
    async fn test_fee_reduces_output() {
        let with_fee = engine().with_fee_bps(100);
        let request = QuoteRequest::new(SOL_MINT, "ICE", dec!(10), 300);

        let free = engine().quote(&request).await.unwrap();
        let charged = with_fee.quote(&request).await.unwrap();
        assert!(charged.output_amount < free.output_amount);
        assert_eq!(charged.fee_bps, 100);
    }

    #[tokio::test]
    async fn test_unknown_pair_and_bad_amount() {
        let engine = engine();

        let err = engine
            .quote(&QuoteRequest::new("USDC", "ICE", dec!(1), 300))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::NoRoute { .. }));

        let err = engine
            .swap(&QuoteRequest::new(SOL_MINT, "ICE", Decimal::ZERO, 300))
            .await
            .unwrap_err();
        assert_eq!(err, SwapError::InvalidAmount);
    }

    #[tokio::test]
    async fn test_unsupported_venue() {
        let settings = SwapSettings {
            engine: SwapEngineKind::Jupiter,
            ..Default::default()
        };
        let engine = build_swap_engine(&settings, SOL_MINT, "ICE");

        let err = engine
            .quote(&QuoteRequest::new(SOL_MINT, "ICE", dec!(1), 300))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SwapError::Unsupported {
                venue: "jupiter".into()
            }
        );
    }
}
