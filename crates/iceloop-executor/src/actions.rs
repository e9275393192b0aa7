//! Per-category action execution
//!
//! Actions run in [`ActionType::ORDER`]. A failing action is recorded on the
//! allocation and never stops its siblings.

use iceloop_common::{
    ActionType, AllocationAction, EpochAllocation, QuoteRequest, SwapError,
};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use crate::swap::SwapEngine;

/// Reasons an individual action can fail
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    #[error("{0} not implemented")]
    NotImplemented(&'static str),

    #[error("Price impact {impact_bps:.2} bps exceeds ceiling of {ceiling_bps} bps")]
    PriceImpactExceeded { impact_bps: f64, ceiling_bps: u32 },

    #[error(transparent)]
    Swap(#[from] SwapError),
}

/// Parameters for buyback swaps
#[derive(Debug, Clone)]
pub struct BuybackParams {
    pub input_asset: String,
    pub output_asset: String,
    pub max_slippage_bps: u32,
    pub max_price_impact_bps: u32,
}

pub struct ActionRunner<'a> {
    swap: &'a dyn SwapEngine,
    params: &'a BuybackParams,
}

impl<'a> ActionRunner<'a> {
    pub fn new(swap: &'a dyn SwapEngine, params: &'a BuybackParams) -> Self {
        Self { swap, params }
    }

    /// Execute every non-zero category and append the resulting actions
    pub async fn execute(&self, allocation: &mut EpochAllocation) {
        for action_type in ActionType::ORDER {
            let amount = allocation.amount_for(action_type);
            if amount <= Decimal::ZERO {
                continue;
            }

            let mut action = AllocationAction::pending(action_type, amount);
            match self.run(action_type, amount).await {
                Ok(tx_reference) => {
                    info!(
                        action = action_type.as_str(),
                        amount = %amount,
                        tx = tx_reference.as_deref().unwrap_or("-"),
                        "Action executed"
                    );
                    action.mark_executed(tx_reference);
                }
                Err(e) => {
                    warn!(
                        action = action_type.as_str(),
                        amount = %amount,
                        error = %e,
                        "Action failed"
                    );
                    action.mark_failed(e.to_string());
                }
            }
            allocation.actions.push(action);
        }
    }

    async fn run(
        &self,
        action_type: ActionType,
        amount: Decimal,
    ) -> Result<Option<String>, ActionError> {
        match action_type {
            ActionType::Buyback => self.buyback(amount).await.map(Some),
            ActionType::AddLp => Err(ActionError::NotImplemented("Liquidity provision")),
            ActionType::Burn => Err(ActionError::NotImplemented("Burn")),
            // Budget is only reserved, nothing leaves the treasury
            ActionType::CoolingEvent => Ok(None),
        }
    }

    async fn buyback(&self, amount: Decimal) -> Result<String, ActionError> {
        let request = QuoteRequest::new(
            self.params.input_asset.clone(),
            self.params.output_asset.clone(),
            amount,
            self.params.max_slippage_bps,
        );

        let quote = self.swap.quote(&request).await?;
        if quote.price_impact_bps > self.params.max_price_impact_bps as f64 {
            return Err(ActionError::PriceImpactExceeded {
                impact_bps: quote.price_impact_bps,
                ceiling_bps: self.params.max_price_impact_bps,
            });
        }

        let result = self.swap.swap(&request).await?;
        Ok(result.transaction_reference)
    }
}
