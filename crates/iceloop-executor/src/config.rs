//! Iceloop service configuration
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. TOML file named by `ICELOOP_CONFIG` (default `iceloop.toml`, optional)
//! 3. environment variables `ICELOOP__<SECTION>__<KEY>`, e.g.
//!    `ICELOOP__EXECUTOR__MODE=live`
//!
//! A `.env` file is read first if present.

use anyhow::{Context, Result};
use iceloop_allocator::StrategyKind;
use iceloop_common::{AllocationConfig, ConfigError};
use iceloop_health::HealthConfig;
use serde::{Deserialize, Serialize};

use crate::executor::ExecutorConfig;
use crate::fees::FeeSourceSettings;
use crate::market::MarketSnapshot;
use crate::swap::SwapSettings;
use crate::telemetry::LoggingSettings;
use crate::treasury::TreasurySettings;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "ICELOOP_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "iceloop.toml";
const ENV_PREFIX: &str = "ICELOOP";
const ENV_SEPARATOR: &str = "__";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    pub health: HealthConfig,
    pub allocation: AllocationConfig,
    pub strategy: StrategyKind,
    pub executor: ExecutorConfig,
    pub epoch: EpochSettings,
    pub swap: SwapSettings,
    pub fees: FeeSourceSettings,
    pub treasury: TreasurySettings,
    pub market: MarketSnapshot,
    pub api: ApiSettings,
    pub logging: LoggingSettings,
}

/// Epoch loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochSettings {
    /// Seconds between epoch ticks
    pub interval_seconds: u64,
    /// Epoch reports kept in memory
    pub report_history: usize,
}

impl Default for EpochSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            report_history: 100,
        }
    }
}

/// Status API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl ApiSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl IceConfig {
    /// Load configuration from `.env`, the config file and the environment
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load from a specific file (if it exists) plus the environment
    pub fn load_from(path: &str) -> Result<Self> {
        let cfg: IceConfig = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("reading configuration from {path}"))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every invariant the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.health.validate()?;
        self.allocation.validate()?;
        self.executor.validate()?;

        if self.epoch.interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "epoch.interval_seconds",
                reason: "must be positive".into(),
            });
        }
        if self.fees.poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fees.poll_interval_seconds",
                reason: "must be positive".into(),
            });
        }
        if self.fees.simulated_amount.is_sign_negative() {
            return Err(ConfigError::InvalidValue {
                field: "fees.simulated_amount",
                reason: "cannot be negative".into(),
            });
        }
        if self.treasury.initial_balance.is_sign_negative() {
            return Err(ConfigError::InvalidValue {
                field: "treasury.initial_balance",
                reason: "cannot be negative".into(),
            });
        }
        if self.swap.pool_quote_reserve <= rust_decimal::Decimal::ZERO
            || self.swap.pool_target_reserve <= rust_decimal::Decimal::ZERO
        {
            return Err(ConfigError::InvalidValue {
                field: "swap.pool_quote_reserve",
                reason: "simulated pool reserves must be positive".into(),
            });
        }

        let market = &self.market;
        if market.recent_sell_pressure < 0.0
            || market.current_liquidity < 0.0
            || market.volatility_percent_24h < 0.0
        {
            return Err(ConfigError::InvalidValue {
                field: "market",
                reason: "market values cannot be negative".into(),
            });
        }
        Ok(())
    }
}
