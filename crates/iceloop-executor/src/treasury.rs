//! Treasury balance queries

use async_trait::async_trait;
use iceloop_common::TreasuryError;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Source of the operating balance checked before each epoch
#[async_trait]
pub trait Treasury: Send + Sync {
    async fn balance(&self) -> Result<Decimal, TreasuryError>;
}

/// Treasury settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreasurySettings {
    /// Starting balance of the simulated treasury
    pub initial_balance: Decimal,
}

impl Default for TreasurySettings {
    fn default() -> Self {
        Self {
            initial_balance: Decimal::ONE,
        }
    }
}

/// In-memory balance, adjustable at runtime
#[derive(Debug)]
pub struct SimulatedTreasury {
    balance: RwLock<Decimal>,
    available: RwLock<bool>,
}

impl SimulatedTreasury {
    pub fn new(balance: Decimal) -> Self {
        Self {
            balance: RwLock::new(balance),
            available: RwLock::new(true),
        }
    }

    pub fn set_balance(&self, balance: Decimal) {
        *self.balance.write() = balance;
    }

    /// Make balance queries fail until re-enabled
    pub fn set_available(&self, available: bool) {
        *self.available.write() = available;
    }
}

impl From<&TreasurySettings> for SimulatedTreasury {
    fn from(settings: &TreasurySettings) -> Self {
        Self::new(settings.initial_balance)
    }
}

#[async_trait]
impl Treasury for SimulatedTreasury {
    async fn balance(&self) -> Result<Decimal, TreasuryError> {
        if !*self.available.read() {
            return Err(TreasuryError::QueryFailed("treasury offline".into()));
        }
        Ok(*self.balance.read())
    }
}
