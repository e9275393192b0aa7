//! Market conditions and trailing buyback activity
//!
//! Together these produce the [`HealthMetricsInput`] for each epoch: market
//! data supplies sell pressure, liquidity and volatility, while the
//! [`ActivityWindow`] remembers what the executor actually did over the last
//! 24 hours.

use std::collections::VecDeque;

use async_trait::async_trait;
use iceloop_common::{ActionType, EpochAllocation, HealthMetricsInput, MarketDataError};
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trailing window for activity metrics
pub const ACTIVITY_WINDOW_SECS: i64 = 24 * 3600;

/// Market measurements used by the health engine
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSnapshot {
    pub recent_sell_pressure: f64,
    pub current_liquidity: f64,
    pub volatility_percent_24h: f64,
}

/// Provider of current market conditions
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn snapshot(&self) -> Result<MarketSnapshot, MarketDataError>;
}

/// Market data pinned to configured values, adjustable at runtime
#[derive(Debug)]
pub struct StaticMarketData {
    snapshot: RwLock<MarketSnapshot>,
}

impl StaticMarketData {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn set(&self, snapshot: MarketSnapshot) {
        *self.snapshot.write() = snapshot;
    }
}

#[async_trait]
impl MarketDataSource for StaticMarketData {
    async fn snapshot(&self) -> Result<MarketSnapshot, MarketDataError> {
        Ok(*self.snapshot.read())
    }
}

#[derive(Debug, Clone, Copy)]
struct BuybackRecord {
    timestamp: i64,
    amount: Decimal,
}

/// Executed buybacks over the trailing 24h plus the last action time
#[derive(Debug, Default)]
pub struct ActivityWindow {
    buybacks: VecDeque<BuybackRecord>,
    last_action_timestamp: i64,
}

impl ActivityWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the executed actions of a settled epoch
    pub fn record(&mut self, allocation: &EpochAllocation, now: i64) {
        let mut any_executed = false;
        for action in allocation.executed_actions() {
            any_executed = true;
            if action.action_type == ActionType::Buyback {
                self.buybacks.push_back(BuybackRecord {
                    timestamp: now,
                    amount: action.amount,
                });
            }
        }
        if any_executed {
            self.last_action_timestamp = self.last_action_timestamp.max(now);
        }
    }

    fn prune(&mut self, now: i64) {
        while let Some(front) = self.buybacks.front() {
            if now - front.timestamp < ACTIVITY_WINDOW_SECS {
                break;
            }
            self.buybacks.pop_front();
        }
    }

    pub fn last_action_timestamp(&self) -> i64 {
        self.last_action_timestamp
    }

    /// Build the health input for `now`, dropping records older than 24h
    pub fn health_input(&mut self, market: &MarketSnapshot, now: i64) -> HealthMetricsInput {
        self.prune(now);
        let volume: Decimal = self.buybacks.iter().map(|b| b.amount).sum();

        HealthMetricsInput {
            buyback_count_last_24h: u32::try_from(self.buybacks.len()).unwrap_or(u32::MAX),
            buyback_volume_last_24h: volume.to_f64().unwrap_or(0.0),
            recent_sell_pressure: market.recent_sell_pressure,
            current_liquidity: market.current_liquidity,
            volatility_percent_24h: market.volatility_percent_24h,
            last_action_timestamp: self.last_action_timestamp,
            current_timestamp: now,
        }
    }
}
