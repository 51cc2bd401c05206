//! Invoice adjustments
//!
//! An adjustment is a proposed ledger entry. Nothing touches the ledger
//! until a second user approves it; rejection leaves only the decision in
//! history. The guards that depend on account state (balances, debt caps,
//! approver capability) live on the account aggregate.

use chrono::{DateTime, Utc};
use core_kernel::{AdjustmentId, InvoiceId, Money, UserId};
use serde::{Deserialize, Serialize};

use crate::error::BillingError;
use crate::ledger::TransactionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    CreditMemo,
    DebitMemo,
    CreditWriteOff,
    WriteOffReversal,
    FeeReductionReversal,
}

impl AdjustmentType {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            AdjustmentType::CreditMemo => TransactionType::CreditMemo,
            AdjustmentType::DebitMemo => TransactionType::DebitMemo,
            AdjustmentType::CreditWriteOff => TransactionType::WriteOff,
            AdjustmentType::WriteOffReversal => TransactionType::WriteOffReversal,
            AdjustmentType::FeeReductionReversal => TransactionType::FeeReductionReversal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustmentStatus {
    Pending,
    Applied,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: AdjustmentId,
    pub invoice_id: InvoiceId,
    pub adjustment_type: AdjustmentType,
    /// None for write-offs, whose amount is the balance at approval time
    pub amount: Option<Money>,
    pub notes: String,
    pub status: AdjustmentStatus,
    pub requested_by: UserId,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Adjustment {
    pub fn new(
        invoice_id: InvoiceId,
        adjustment_type: AdjustmentType,
        amount: Option<Money>,
        notes: String,
        requested_by: UserId,
    ) -> Self {
        Self {
            id: AdjustmentId::new(),
            invoice_id,
            adjustment_type,
            amount,
            notes,
            status: AdjustmentStatus::Pending,
            requested_by,
            created_at: Utc::now(),
            decided_by: None,
            decided_at: None,
        }
    }

    /// Only pending adjustments expose approve or reject
    pub fn is_decidable(&self) -> bool {
        self.status == AdjustmentStatus::Pending
    }

    fn decide(&mut self, status: AdjustmentStatus, decided_by: UserId) -> Result<(), BillingError> {
        if !self.is_decidable() {
            return Err(BillingError::invalid_transition(format!(
                "Adjustment {} has already been decided",
                self.id
            )));
        }
        if decided_by == self.requested_by {
            return Err(BillingError::business_rule(
                "An adjustment cannot be approved or rejected by its requester",
            ));
        }
        self.status = status;
        self.decided_by = Some(decided_by);
        self.decided_at = Some(Utc::now());
        Ok(())
    }

    pub fn approve(&mut self, decided_by: UserId) -> Result<(), BillingError> {
        self.decide(AdjustmentStatus::Applied, decided_by)
    }

    pub fn reject(&mut self, decided_by: UserId) -> Result<(), BillingError> {
        self.decide(AdjustmentStatus::Rejected, decided_by)
    }
}
