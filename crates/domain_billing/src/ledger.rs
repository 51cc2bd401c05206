//! Append-only ledger
//!
//! Every money movement on an account is a ledger entry with one or more
//! allocations. Entries are immutable once written; the only mutation the
//! ledger permits is resolving a Pending entry to Confirmed or Rejected.
//! Corrections are new reversing entries linked to the original.
//!
//! Balances are never stored. The outstanding amount of an invoice and the
//! account's unapplied credit are both projections over the allocations, so
//! they cannot drift from the entries that produced them.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{FeeReductionId, InvoiceId, LedgerEntryId, Money, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BillingError;

/// Transaction types, keyed by their historical names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    #[serde(rename = "MOTO CARD PAYMENT")]
    MotoCardPayment,
    #[serde(rename = "ONLINE CARD PAYMENT")]
    OnlineCardPayment,
    #[serde(rename = "OPG BACS PAYMENT")]
    OpgBacsPayment,
    #[serde(rename = "SUPERVISION BACS PAYMENT")]
    SupervisionBacsPayment,
    #[serde(rename = "CHEQUE PAYMENT")]
    ChequePayment,
    #[serde(rename = "DIRECT DEBIT PAYMENT")]
    DirectDebitPayment,
    #[serde(rename = "CREDIT MEMO")]
    CreditMemo,
    #[serde(rename = "DEBIT MEMO")]
    DebitMemo,
    #[serde(rename = "CREDIT WRITE OFF")]
    WriteOff,
    #[serde(rename = "WRITE OFF REVERSAL")]
    WriteOffReversal,
    #[serde(rename = "HARDSHIP")]
    Hardship,
    #[serde(rename = "REMISSION")]
    Remission,
    #[serde(rename = "EXEMPTION")]
    Exemption,
    #[serde(rename = "FEE REDUCTION REVERSAL")]
    FeeReductionReversal,
    #[serde(rename = "REFUND")]
    Refund,
    #[serde(rename = "REFUND REVERSAL")]
    RefundReversal,
    #[serde(rename = "CREDIT REAPPLY")]
    CreditReapply,
}

impl TransactionType {
    pub fn key(&self) -> &'static str {
        match self {
            TransactionType::MotoCardPayment => "MOTO CARD PAYMENT",
            TransactionType::OnlineCardPayment => "ONLINE CARD PAYMENT",
            TransactionType::OpgBacsPayment => "OPG BACS PAYMENT",
            TransactionType::SupervisionBacsPayment => "SUPERVISION BACS PAYMENT",
            TransactionType::ChequePayment => "CHEQUE PAYMENT",
            TransactionType::DirectDebitPayment => "DIRECT DEBIT PAYMENT",
            TransactionType::CreditMemo => "CREDIT MEMO",
            TransactionType::DebitMemo => "DEBIT MEMO",
            TransactionType::WriteOff => "CREDIT WRITE OFF",
            TransactionType::WriteOffReversal => "WRITE OFF REVERSAL",
            TransactionType::Hardship => "HARDSHIP",
            TransactionType::Remission => "REMISSION",
            TransactionType::Exemption => "EXEMPTION",
            TransactionType::FeeReductionReversal => "FEE REDUCTION REVERSAL",
            TransactionType::Refund => "REFUND",
            TransactionType::RefundReversal => "REFUND REVERSAL",
            TransactionType::CreditReapply => "CREDIT REAPPLY",
        }
    }

    pub fn is_payment(&self) -> bool {
        matches!(
            self,
            TransactionType::MotoCardPayment
                | TransactionType::OnlineCardPayment
                | TransactionType::OpgBacsPayment
                | TransactionType::SupervisionBacsPayment
                | TransactionType::ChequePayment
                | TransactionType::DirectDebitPayment
        )
    }

    pub fn is_fee_reduction(&self) -> bool {
        matches!(
            self,
            TransactionType::Hardship | TransactionType::Remission | TransactionType::Exemption
        )
    }

    /// Transfer entries move money between an invoice and unapplied credit
    /// without changing the account total, so their allocations net to zero.
    pub fn is_transfer(&self) -> bool {
        matches!(self, TransactionType::CreditReapply)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Status of a ledger entry
///
/// Pending entries exist only for reservations (refunds); everything else
/// enters the ledger already Confirmed. Rejected entries and their
/// allocations are excluded from all balance projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    Pending,
    Confirmed,
    Rejected,
}

/// Status of an allocation within an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AllocationStatus {
    /// Applied to an invoice
    Allocated,
    /// Held as account credit (or consuming it, when negative)
    Unapplied,
    /// Credit moved onto a newly raised invoice
    Reapplied,
    /// Rolled back with its entry
    Rejected,
}

impl AllocationStatus {
    /// Whether this allocation contributes to balance projections
    fn counts(&self) -> bool {
        !matches!(self, AllocationStatus::Rejected)
    }
}

/// One immutable money movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub status: EntryStatus,
    pub received_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub notes: Option<String>,
    /// Set when this entry reverses an earlier one
    pub reverses: Option<LedgerEntryId>,
    /// Set when this entry was generated by a fee reduction award
    pub fee_reduction_id: Option<FeeReductionId>,
}

/// Assignment of (part of) an entry's amount to an invoice or to credit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub entry_id: LedgerEntryId,
    /// None for unapplied credit movements
    pub invoice_id: Option<InvoiceId>,
    pub amount: Money,
    pub status: AllocationStatus,
}

/// The account's append-only ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    allocations: Vec<Allocation>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry together with its allocations
    ///
    /// The entry and its allocations commit atomically or not at all. The
    /// allocations must account for the entry's full amount: their sum must
    /// equal the entry amount, or zero for transfer entries.
    pub fn append(
        &mut self,
        entry: LedgerEntry,
        allocations: Vec<Allocation>,
    ) -> Result<(), BillingError> {
        if entry.amount.is_zero() && !entry.transaction_type.is_transfer() {
            return Err(BillingError::InvalidEntry(format!(
                "Zero-amount {} entry",
                entry.transaction_type
            )));
        }
        if allocations.is_empty() {
            return Err(BillingError::InvalidEntry(
                "Entry has no allocations".to_string(),
            ));
        }
        for alloc in &allocations {
            if alloc.entry_id != entry.id {
                return Err(BillingError::InvalidEntry(
                    "Allocation does not reference its entry".to_string(),
                ));
            }
        }
        let total: Money = allocations.iter().map(|a| a.amount).sum();
        let expected = if entry.transaction_type.is_transfer() {
            Money::zero()
        } else {
            entry.amount
        };
        if total != expected {
            return Err(BillingError::InvalidEntry(format!(
                "Allocations total {total}, entry amount {}",
                entry.amount
            )));
        }
        self.entries.push(entry);
        self.allocations.extend(allocations);
        Ok(())
    }

    /// Resolves a Pending entry to Confirmed or Rejected
    ///
    /// Rejecting an entry also rejects its allocations, removing them from
    /// every projection. This is the only mutation the ledger permits.
    pub fn set_entry_status(
        &mut self,
        entry_id: LedgerEntryId,
        status: EntryStatus,
    ) -> Result<(), BillingError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| BillingError::not_found(format!("Ledger entry {entry_id}")))?;
        if entry.status != EntryStatus::Pending {
            return Err(BillingError::invalid_transition(format!(
                "Ledger entry {entry_id} is not pending"
            )));
        }
        if status == EntryStatus::Pending {
            return Err(BillingError::invalid_transition(
                "Cannot resolve an entry back to pending".to_string(),
            ));
        }
        entry.status = status;
        if status == EntryStatus::Rejected {
            for alloc in self.allocations.iter_mut().filter(|a| a.entry_id == entry_id) {
                alloc.status = AllocationStatus::Rejected;
            }
        }
        Ok(())
    }

    pub fn entry(&self, entry_id: LedgerEntryId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    /// Entries in ledger order: received date ascending, then arrival order
    pub fn entries(&self) -> Vec<&LedgerEntry> {
        let mut entries: Vec<&LedgerEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.received_date);
        entries
    }

    pub fn allocations_for_entry(&self, entry_id: LedgerEntryId) -> Vec<&Allocation> {
        self.allocations
            .iter()
            .filter(|a| a.entry_id == entry_id)
            .collect()
    }

    /// Counted allocations against a specific invoice
    pub fn allocations_for_invoice(&self, invoice_id: InvoiceId) -> Vec<&Allocation> {
        self.allocations
            .iter()
            .filter(|a| a.invoice_id == Some(invoice_id))
            .collect()
    }

    fn counted(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.iter().filter(move |a| {
            a.status.counts()
                && self
                    .entry(a.entry_id)
                    .is_some_and(|e| e.status != EntryStatus::Rejected)
        })
    }

    /// Total applied to an invoice (positive reduces its balance)
    pub fn invoice_applied(&self, invoice_id: InvoiceId) -> Money {
        self.counted()
            .filter(|a| a.invoice_id == Some(invoice_id))
            .map(|a| a.amount)
            .sum()
    }

    /// Net reapplied credit currently sitting on an invoice
    pub fn reapplied_credit(&self, invoice_id: InvoiceId) -> Money {
        self.counted()
            .filter(|a| {
                a.invoice_id == Some(invoice_id) && a.status == AllocationStatus::Reapplied
            })
            .map(|a| a.amount)
            .sum()
    }

    /// The account's unapplied credit balance
    pub fn unapplied_credit(&self) -> Money {
        self.counted()
            .filter(|a| a.invoice_id.is_none())
            .map(|a| a.amount)
            .sum()
    }

    /// Checks the conservation invariant over the whole ledger
    ///
    /// For every non-rejected entry, the counted allocations must account
    /// for exactly its amount (zero for transfers), and no projection may
    /// go negative. A failure here is a logic defect, not a user error.
    pub fn verify_consistency(
        &self,
        invoice_amounts: &[(InvoiceId, Money)],
    ) -> Result<(), BillingError> {
        for entry in &self.entries {
            if entry.status == EntryStatus::Rejected {
                continue;
            }
            let allocated: Money = self
                .allocations
                .iter()
                .filter(|a| a.entry_id == entry.id && a.status.counts())
                .map(|a| a.amount)
                .sum();
            let expected = if entry.transaction_type.is_transfer() {
                Money::zero()
            } else {
                entry.amount
            };
            if allocated != expected {
                return Err(BillingError::Consistency(format!(
                    "Entry {} ({}) allocates {allocated} of {expected}",
                    entry.id, entry.transaction_type
                )));
            }
        }
        for (invoice_id, amount) in invoice_amounts {
            let applied = self.invoice_applied(*invoice_id);
            if applied > *amount {
                return Err(BillingError::Consistency(format!(
                    "Invoice {invoice_id} over-allocated: {applied} applied to {amount}"
                )));
            }
        }
        let credit = self.unapplied_credit();
        if credit.is_negative() {
            return Err(BillingError::Consistency(format!(
                "Negative credit balance: {credit}"
            )));
        }
        Ok(())
    }
}
