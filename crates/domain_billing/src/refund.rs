//! Refund state machine
//!
//! A refund reserves account credit the moment it is created: a pending
//! ledger entry debits the credit balance, so the money cannot be allocated
//! elsewhere while the refund is decided. The reservation is released on
//! rejection or cancellation and consumed permanently on fulfilment.
//!
//! Bank details exist only while a refund is still payable. Once it reaches
//! a terminal state they are removed from the record entirely.

use chrono::{DateTime, Utc};
use core_kernel::{LedgerEntryId, Money, RefundId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RefundStatus {
    Pending,
    Approved,
    Processing,
    Fulfilled,
    Rejected,
    Cancelled,
}

impl RefundStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefundStatus::Fulfilled | RefundStatus::Rejected | RefundStatus::Cancelled
        )
    }
}

/// Destination account for a payable refund
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub account_name: String,
    pub sort_code: String,
    pub account_number: String,
}

impl BankDetails {
    pub fn validate(&self) -> Result<(), BillingError> {
        let mut report = ValidationReport::new();
        if self.account_name.trim().is_empty() {
            report.add("accountName", "Enter the name on the account");
        }
        let sort_code_digits =
            self.sort_code.len() == 6 && self.sort_code.bytes().all(|b| b.is_ascii_digit());
        if !sort_code_digits || self.sort_code == "000000" {
            report.add("sortCode", "Enter a valid sort code");
        }
        if self.account_number.len() != 8
            || !self.account_number.bytes().all(|b| b.is_ascii_digit())
        {
            report.add("accountNumber", "Enter a valid account number");
        }
        report.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub amount: Money,
    /// Removed once the refund reaches a terminal state
    pub bank_details: Option<BankDetails>,
    pub notes: String,
    pub status: RefundStatus,
    /// The pending ledger entry holding the credit reservation
    pub reservation_entry: LedgerEntryId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Refund {
    pub fn is_decidable(&self) -> bool {
        self.status == RefundStatus::Pending
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self.status, RefundStatus::Approved | RefundStatus::Processing)
    }

    fn guard_decision(&self, decided_by: UserId) -> Result<(), BillingError> {
        if !self.is_decidable() {
            return Err(BillingError::invalid_transition(format!(
                "Refund {} is not pending",
                self.id
            )));
        }
        if decided_by == self.created_by {
            return Err(BillingError::business_rule(
                "A refund cannot be approved or rejected by its creator",
            ));
        }
        Ok(())
    }

    pub fn approve(&mut self, decided_by: UserId) -> Result<(), BillingError> {
        self.guard_decision(decided_by)?;
        self.status = RefundStatus::Approved;
        self.decided_by = Some(decided_by);
        self.decided_at = Some(Utc::now());
        Ok(())
    }

    pub fn reject(&mut self, decided_by: UserId) -> Result<(), BillingError> {
        self.guard_decision(decided_by)?;
        self.status = RefundStatus::Rejected;
        self.decided_by = Some(decided_by);
        self.decided_at = Some(Utc::now());
        self.bank_details = None;
        Ok(())
    }

    /// Marks the refund as sent to the payment run
    pub fn start_processing(&mut self) -> Result<(), BillingError> {
        if self.status != RefundStatus::Approved {
            return Err(BillingError::invalid_transition(format!(
                "Refund {} is not approved",
                self.id
            )));
        }
        self.status = RefundStatus::Processing;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), BillingError> {
        if !self.is_cancellable() {
            return Err(BillingError::invalid_transition(format!(
                "Refund {} cannot be cancelled from {:?}",
                self.id, self.status
            )));
        }
        self.status = RefundStatus::Cancelled;
        self.bank_details = None;
        Ok(())
    }

    /// Confirms payment via the reconciliation upload
    pub fn fulfil(&mut self) -> Result<(), BillingError> {
        if !matches!(self.status, RefundStatus::Approved | RefundStatus::Processing) {
            return Err(BillingError::invalid_transition(format!(
                "Refund {} cannot be fulfilled from {:?}",
                self.id, self.status
            )));
        }
        self.status = RefundStatus::Fulfilled;
        self.bank_details = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_details() -> BankDetails {
        BankDetails {
            account_name: "C Client".to_string(),
            sort_code: "110247".to_string(),
            account_number: "12345678".to_string(),
        }
    }

    fn pending() -> Refund {
        Refund {
            id: RefundId::new(),
            amount: Money::from_pence(5_000),
            bank_details: Some(bank_details()),
            notes: "Overpayment".to_string(),
            status: RefundStatus::Pending,
            reservation_entry: LedgerEntryId::new(),
            created_by: UserId::new(),
            created_at: Utc::now(),
            decided_by: None,
            decided_at: None,
        }
    }

    #[test]
    fn test_bank_details_validation() {
        assert!(bank_details().validate().is_ok());

        let mut details = bank_details();
        details.sort_code = "000000".to_string();
        assert!(details.validate().is_err());

        let mut details = bank_details();
        details.sort_code = "1102".to_string();
        assert!(details.validate().is_err());

        let mut details = bank_details();
        details.account_number = "1234567".to_string();
        assert!(details.validate().is_err());
    }

    #[test]
    fn test_self_decision_forbidden() {
        let mut refund = pending();
        let creator = refund.created_by;
        assert!(refund.approve(creator).is_err());
        assert!(refund.reject(creator).is_err());
        assert_eq!(refund.status, RefundStatus::Pending);
    }

    #[test]
    fn test_happy_path_removes_bank_details_at_fulfilment() {
        let mut refund = pending();
        refund.approve(UserId::new()).unwrap();
        refund.start_processing().unwrap();
        assert!(refund.bank_details.is_some());
        refund.fulfil().unwrap();
        assert_eq!(refund.status, RefundStatus::Fulfilled);
        assert!(refund.bank_details.is_none());
    }

    #[test]
    fn test_rejection_removes_bank_details() {
        let mut refund = pending();
        refund.reject(UserId::new()).unwrap();
        assert!(refund.bank_details.is_none());
        assert!(refund.status.is_terminal());
    }

    #[test]
    fn test_cancel_only_from_approved_or_processing() {
        let mut refund = pending();
        assert!(refund.cancel().is_err());
        refund.approve(UserId::new()).unwrap();
        refund.cancel().unwrap();
        assert_eq!(refund.status, RefundStatus::Cancelled);
        assert!(refund.fulfil().is_err());
    }
}
