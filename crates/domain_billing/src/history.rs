//! Billing history projection
//!
//! A pure, replayable read model over the account: invoices raised, ledger
//! entries, and rejected adjustments (which leave no ledger trace), newest
//! first, with the outstanding balance as it stood after each event.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::Money;
use serde::Serialize;

use crate::account::FinanceAccount;
use crate::adjustment::AdjustmentStatus;
use crate::ledger::EntryStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "event")]
pub enum HistoryEvent {
    InvoiceRaised {
        reference: String,
        amount: Money,
    },
    LedgerEntry {
        transaction_type: String,
        amount: Money,
        status: EntryStatus,
        notes: Option<String>,
    },
    AdjustmentRejected {
        adjustment_type: String,
        notes: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryLine {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub event: HistoryEvent,
    /// Account outstanding balance after this event
    pub outstanding_after: Money,
}

/// Builds the account's billing history, newest first
pub fn billing_history(account: &FinanceAccount) -> Vec<HistoryLine> {
    // date, tiebreak timestamp, balance delta, event
    let mut events: Vec<(NaiveDate, DateTime<Utc>, Money, HistoryEvent)> = Vec::new();

    for invoice in account.invoices() {
        events.push((
            invoice.raised_date,
            invoice.created_at,
            invoice.amount,
            HistoryEvent::InvoiceRaised {
                reference: invoice.reference.clone(),
                amount: invoice.amount,
            },
        ));
    }

    for entry in account.ledger().entries() {
        let delta = if entry.status == EntryStatus::Rejected {
            Money::zero()
        } else {
            account
                .ledger()
                .allocations_for_entry(entry.id)
                .iter()
                .filter(|a| a.invoice_id.is_some())
                .map(|a| -a.amount)
                .sum()
        };
        events.push((
            entry.received_date,
            entry.created_at,
            delta,
            HistoryEvent::LedgerEntry {
                transaction_type: entry.transaction_type.key().to_string(),
                amount: entry.amount,
                status: entry.status,
                notes: entry.notes.clone(),
            },
        ));
    }

    for adjustment in account.adjustments() {
        if adjustment.status != AdjustmentStatus::Rejected {
            continue;
        }
        let decided_at = adjustment.decided_at.unwrap_or(adjustment.created_at);
        events.push((
            decided_at.date_naive(),
            decided_at,
            Money::zero(),
            HistoryEvent::AdjustmentRejected {
                adjustment_type: adjustment.adjustment_type.transaction_type().key().to_string(),
                notes: adjustment.notes.clone(),
            },
        ));
    }

    events.sort_by_key(|(date, created_at, _, _)| (*date, *created_at));

    let mut outstanding = Money::zero();
    let mut lines: Vec<HistoryLine> = events
        .into_iter()
        .map(|(date, _, delta, event)| {
            outstanding += delta;
            HistoryLine {
                date,
                event,
                outstanding_after: outstanding,
            }
        })
        .collect();
    lines.reverse();
    lines
}
