//! Fee inflow events

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FeeSourceError;
use crate::MAX_FEE_AMOUNT;

/// Ledger confirmation level of an observed fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

/// A single observed fee inflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeEvent {
    /// Unique reference (e.g. transaction signature)
    pub reference: String,
    /// Observation time (Unix seconds)
    pub timestamp: i64,
    pub amount: Decimal,
    /// Where the fee came from (e.g. "trading-fees", "creator-rewards")
    pub provenance: String,
    pub confirmation: ConfirmationLevel,
    /// Set once the event has been claimed by a settled epoch
    pub processed: bool,
}

impl FeeEvent {
    /// Create a new unprocessed fee event
    pub fn new(
        reference: impl Into<String>,
        amount: Decimal,
        provenance: impl Into<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            timestamp: chrono::Utc::now().timestamp(),
            amount,
            provenance: provenance.into(),
            confirmation: ConfirmationLevel::Confirmed,
            processed: false,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationLevel) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Validate the event
    pub fn validate(&self) -> Result<(), FeeSourceError> {
        if self.reference.is_empty() {
            return Err(FeeSourceError::InvalidEvent {
                reference: String::new(),
                reason: "reference is required".into(),
            });
        }
        if self.amount < Decimal::ZERO {
            return Err(FeeSourceError::InvalidEvent {
                reference: self.reference.clone(),
                reason: "amount cannot be negative".into(),
            });
        }
        if self.amount > MAX_FEE_AMOUNT {
            return Err(FeeSourceError::InvalidEvent {
                reference: self.reference.clone(),
                reason: format!("amount exceeds the {MAX_FEE_AMOUNT} ceiling"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fee_event_validation() {
        let event = FeeEvent::new("sig-1", dec!(0.5), "trading-fees");
        assert!(event.validate().is_ok());
        assert!(!event.processed);

        let negative = FeeEvent::new("sig-2", dec!(-1), "trading-fees");
        assert!(negative.validate().is_err());

        let unnamed = FeeEvent::new("", dec!(1), "trading-fees");
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_fee_event_amount_ceiling() {
        let at_ceiling = FeeEvent::new("sig-1", MAX_FEE_AMOUNT, "trading-fees");
        assert!(at_ceiling.validate().is_ok());

        let above = FeeEvent::new("sig-2", MAX_FEE_AMOUNT + dec!(0.000001), "trading-fees");
        assert!(matches!(
            above.validate(),
            Err(FeeSourceError::InvalidEvent { reference, .. }) if reference == "sig-2"
        ));

        let huge = FeeEvent::new("sig-3", Decimal::MAX, "trading-fees");
        assert!(huge.validate().is_err());
    }

    #[test]
    fn test_confirmation_ordering() {
        assert!(ConfirmationLevel::Finalized > ConfirmationLevel::Confirmed);
        assert!(ConfirmationLevel::Confirmed > ConfirmationLevel::Processed);
    }
}
