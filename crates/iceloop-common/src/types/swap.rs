//! Swap quote and result types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Wrapped SOL mint, the default quote asset for buybacks
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Parameters of a quote or swap request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub input_asset: String,
    pub output_asset: String,
    pub amount_in: Decimal,
    pub max_slippage_bps: u32,
}

impl QuoteRequest {
    pub fn new(
        input_asset: impl Into<String>,
        output_asset: impl Into<String>,
        amount_in: Decimal,
        max_slippage_bps: u32,
    ) -> Self {
        Self {
            input_asset: input_asset.into(),
            output_asset: output_asset.into(),
            amount_in,
            max_slippage_bps,
        }
    }
}

/// Dry-run price of a swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub input_amount: Decimal,
    pub output_amount: Decimal,
    pub price_impact_bps: f64,
    pub fee_bps: u32,
    /// Human-readable route description
    pub route: String,
}

/// Outcome of a submitted swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapResult {
    pub transaction_reference: String,
    pub input_amount: Decimal,
    pub output_amount: Decimal,
    pub actual_price_impact_bps: f64,
}
