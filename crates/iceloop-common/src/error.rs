//! Error types for Iceloop
//!
//! Provides a unified error type and domain-specific error variants

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using IceError
pub type Result<T> = std::result::Result<T, IceError>;

/// Unified error type for Iceloop operations
#[derive(Debug, Error)]
pub enum IceError {
    // Allocation errors
    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    // Swap engine errors
    #[error("Swap error: {0}")]
    Swap(#[from] SwapError),

    // Fee source errors
    #[error("Fee source error: {0}")]
    FeeSource(#[from] FeeSourceError),

    // Treasury errors
    #[error("Treasury error: {0}")]
    Treasury(#[from] TreasuryError),

    // Market data errors
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Budget split errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    #[error("Fee amount cannot be negative: {0}")]
    NegativeAmount(Decimal),

    #[error("Fee amount {total_fees} overflows the {percentage}% share")]
    Overflow { total_fees: Decimal, percentage: Decimal },

    #[error("Allocation does not conserve the fee amount: allocated {allocated}, expected {expected}")]
    Conservation { allocated: Decimal, expected: Decimal },
}

/// Swap engine errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SwapError {
    #[error("No route for pair {input} -> {output}")]
    NoRoute { input: String, output: String },

    #[error("Swap venue not supported: {venue}")]
    Unsupported { venue: String },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Decimal, available: Decimal },
}

/// Fee detection errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeeSourceError {
    #[error("Fee source unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid fee event {reference}: {reason}")]
    InvalidEvent { reference: String, reason: String },
}

/// Treasury balance errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreasuryError {
    #[error("Balance query failed: {0}")]
    QueryFailed(String),
}

/// Market data errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Market data unavailable: {0}")]
    Unavailable(String),
}

/// Configuration validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Health weights must sum to 1.0 (±0.001), got {0}")]
    WeightSum(f64),

    #[error("Health weight {name} cannot be negative: {value}")]
    NegativeWeight { name: &'static str, value: f64 },

    #[error("Health threshold must be within 0-100, got {0}")]
    ThresholdRange(f64),

    #[error("Allocation percentages must sum to 100, got {0}")]
    AllocationSum(u64),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl From<serde_json::Error> for IceError {
    fn from(err: serde_json::Error) -> Self {
        IceError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for IceError {
    fn from(err: anyhow::Error) -> Self {
        IceError::Internal(err.to_string())
    }
}
