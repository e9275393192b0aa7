//! Allocation types - budget split of an epoch's fees
//!
//! An [`EpochAllocation`] is produced by an allocation strategy with an empty
//! action list; the executor then appends one [`AllocationAction`] per
//! non-zero category, in the fixed priority order of [`ActionType::ORDER`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AllocationError, ConfigError};

/// Configured budget percentages (must sum to 100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub buyback_pct: u32,
    pub lp_pct: u32,
    pub burn_pct: u32,
    pub cooling_pct: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            buyback_pct: 70,
            lp_pct: 20,
            burn_pct: 5,
            cooling_pct: 5,
        }
    }
}

impl AllocationConfig {
    pub fn total(&self) -> u64 {
        [self.buyback_pct, self.lp_pct, self.burn_pct, self.cooling_pct]
            .into_iter()
            .map(u64::from)
            .sum()
    }

    /// Check the percentages sum to exactly 100
    pub fn validate(&self) -> Result<(), ConfigError> {
        let total = self.total();
        if total != 100 {
            return Err(ConfigError::AllocationSum(total));
        }
        Ok(())
    }

    /// Configured percentages as decimals
    pub fn percentages(&self) -> AllocationPercentages {
        AllocationPercentages {
            buyback: Decimal::from(self.buyback_pct),
            lp: Decimal::from(self.lp_pct),
            burn: Decimal::from(self.burn_pct),
            cooling: Decimal::from(self.cooling_pct),
        }
    }
}

/// Percentages actually applied in an epoch (may be fractional)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPercentages {
    pub buyback: Decimal,
    pub lp: Decimal,
    pub burn: Decimal,
    pub cooling: Decimal,
}

impl AllocationPercentages {
    pub fn total(&self) -> Decimal {
        self.buyback + self.lp + self.burn + self.cooling
    }
}

/// Kind of corrective action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Buyback,
    AddLp,
    Burn,
    CoolingEvent,
}

impl ActionType {
    /// Execution priority order within an epoch
    pub const ORDER: [ActionType; 4] = [
        ActionType::Buyback,
        ActionType::AddLp,
        ActionType::Burn,
        ActionType::CoolingEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Buyback => "buyback",
            ActionType::AddLp => "add-lp",
            ActionType::Burn => "burn",
            ActionType::CoolingEvent => "cooling-event",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Executed,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Executed => "executed",
            ActionStatus::Failed => "failed",
        }
    }
}

/// One corrective action taken for a budget category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationAction {
    pub action_type: ActionType,
    pub amount: Decimal,
    pub status: ActionStatus,
    /// Ledger transaction reference, when funds moved
    pub tx_reference: Option<String>,
    /// Failure description, when status is failed
    pub error: Option<String>,
}

impl AllocationAction {
    /// Create a pending action
    pub fn pending(action_type: ActionType, amount: Decimal) -> Self {
        Self {
            action_type,
            amount,
            status: ActionStatus::Pending,
            tx_reference: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != ActionStatus::Pending
    }

    /// Mark the action executed. No-op once terminal.
    pub fn mark_executed(&mut self, tx_reference: Option<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = ActionStatus::Executed;
        self.tx_reference = tx_reference;
    }

    /// Mark the action failed. No-op once terminal.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = ActionStatus::Failed;
        self.error = Some(error.into());
    }
}

/// Budget split of one epoch's accumulated fees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochAllocation {
    pub epoch_number: u64,
    /// Strategy that produced the split
    pub strategy: String,
    pub total_fees: Decimal,
    pub buyback_amount: Decimal,
    pub lp_amount: Decimal,
    pub burn_amount: Decimal,
    pub cooling_amount: Decimal,
    pub percentages: AllocationPercentages,
    pub actions: Vec<AllocationAction>,
}

impl EpochAllocation {
    /// Split `total_fees` by the given percentages
    pub fn from_percentages(
        epoch_number: u64,
        strategy: impl Into<String>,
        total_fees: Decimal,
        percentages: AllocationPercentages,
    ) -> Result<Self, AllocationError> {
        let share = |percentage: Decimal| {
            total_fees
                .checked_mul(percentage)
                .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
                .ok_or(AllocationError::Overflow {
                    total_fees,
                    percentage,
                })
        };

        Ok(Self {
            epoch_number,
            strategy: strategy.into(),
            total_fees,
            buyback_amount: share(percentages.buyback)?,
            lp_amount: share(percentages.lp)?,
            burn_amount: share(percentages.burn)?,
            cooling_amount: share(percentages.cooling)?,
            percentages,
            actions: Vec::new(),
        })
    }

    /// Amount allocated to a category
    pub fn amount_for(&self, action_type: ActionType) -> Decimal {
        match action_type {
            ActionType::Buyback => self.buyback_amount,
            ActionType::AddLp => self.lp_amount,
            ActionType::Burn => self.burn_amount,
            ActionType::CoolingEvent => self.cooling_amount,
        }
    }

    /// Sum of the four category amounts
    pub fn allocated_total(&self) -> Decimal {
        self.buyback_amount + self.lp_amount + self.burn_amount + self.cooling_amount
    }

    pub fn executed_actions(&self) -> impl Iterator<Item = &AllocationAction> {
        self.actions
            .iter()
            .filter(|a| a.status == ActionStatus::Executed)
    }

    pub fn failed_actions(&self) -> impl Iterator<Item = &AllocationAction> {
        self.actions
            .iter()
            .filter(|a| a.status == ActionStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_allocation_config_validation() {
        assert!(AllocationConfig::default().validate().is_ok());

        let bad = AllocationConfig {
            buyback_pct: 80,
            ..AllocationConfig::default()
        };
        assert_eq!(bad.validate(), Err(ConfigError::AllocationSum(110)));
    }

    #[test]
    fn test_split_from_percentages() {
        let pcts = AllocationConfig::default().percentages();
        let allocation = EpochAllocation::from_percentages(1, "fixed", dec!(2), pcts).unwrap();

        assert_eq!(allocation.buyback_amount, dec!(1.4));
        assert_eq!(allocation.lp_amount, dec!(0.4));
        assert_eq!(allocation.burn_amount, dec!(0.1));
        assert_eq!(allocation.cooling_amount, dec!(0.1));
        assert_eq!(allocation.allocated_total(), dec!(2));
        assert!(allocation.actions.is_empty());
    }

    #[test]
    fn test_split_overflow_is_an_error() {
        let pcts = AllocationConfig::default().percentages();
        let result = EpochAllocation::from_percentages(1, "fixed", Decimal::MAX, pcts);

        assert_eq!(
            result,
            Err(AllocationError::Overflow {
                total_fees: Decimal::MAX,
                percentage: dec!(70),
            })
        );
    }

    #[test]
    fn test_oversized_percentages_do_not_wrap() {
        let absurd = AllocationConfig {
            buyback_pct: u32::MAX,
            lp_pct: u32::MAX,
            burn_pct: 1,
            cooling_pct: 1,
        };
        let expected = 2 * u64::from(u32::MAX) + 2;

        assert_eq!(absurd.total(), expected);
        assert_eq!(absurd.validate(), Err(ConfigError::AllocationSum(expected)));
    }

    #[test]
    fn test_action_lifecycle_is_terminal() {
        let mut action = AllocationAction::pending(ActionType::Buyback, dec!(1));
        assert!(!action.is_terminal());

        action.mark_executed(Some("tx-1".into()));
        assert_eq!(action.status, ActionStatus::Executed);

        // Terminal actions ignore later transitions
        action.mark_failed("late failure");
        assert_eq!(action.status, ActionStatus::Executed);
        assert!(action.error.is_none());
        assert_eq!(action.tx_reference.as_deref(), Some("tx-1"));
    }

    #[test]
    fn test_action_type_serialization() {
        let json = serde_json::to_string(&ActionType::CoolingEvent).unwrap();
        assert_eq!(json, "\"cooling-event\"");
        assert_eq!(ActionType::AddLp.to_string(), "add-lp");
    }
}
