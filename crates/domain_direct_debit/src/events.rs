//! Trigger event processing
//!
//! Collection and failure triggers are delivered at least once, so every
//! (trigger, date, client) combination is recorded before it mutates state
//! and a redelivery is a logged no-op. Successful collections post a payment
//! through the billing allocation engine; failure events reverse the
//! matching collection.

use chrono::{DateTime, Days, NaiveDate, Utc};
use core_kernel::{ClientId, Money, ScheduledPaymentId, UserId};
use domain_billing::{FinanceAccount, PaymentMethod, TransactionType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::error::DirectDebitError;
use crate::mandate::DirectDebitInstruction;
use crate::schedule::{next_collection_date, ScheduleStatus, ScheduledPayment};

/// Scheduled triggers delivered by the events endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduledTrigger {
    #[serde(rename = "direct-debit-collection")]
    DirectDebitCollection,
    #[serde(rename = "failed-direct-debit-collections")]
    FailedDirectDebitCollections,
}

impl ScheduledTrigger {
    pub fn key(&self) -> &'static str {
        match self {
            ScheduledTrigger::DirectDebitCollection => "direct-debit-collection",
            ScheduledTrigger::FailedDirectDebitCollections => "failed-direct-debit-collections",
        }
    }
}

/// Idempotency keys already processed
///
/// Entries older than the retention window are purged on insert; a delivery
/// will never legitimately repeat after that long.
#[derive(Debug, Default)]
pub struct DedupeStore {
    seen: HashMap<(ScheduledTrigger, NaiveDate, ClientId), DateTime<Utc>>,
}

const RETENTION_DAYS: u64 = 62;

impl DedupeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases a key so a redelivery can retry after a failed run
    pub fn forget(
        &mut self,
        trigger: ScheduledTrigger,
        date: NaiveDate,
        client_id: ClientId,
    ) {
        self.seen.remove(&(trigger, date, client_id));
    }

    /// Records the key; returns false if it was already present
    pub fn check_and_record(
        &mut self,
        trigger: ScheduledTrigger,
        date: NaiveDate,
        client_id: ClientId,
    ) -> bool {
        let now = Utc::now();
        let cutoff = now - chrono::Duration::days(RETENTION_DAYS as i64);
        self.seen.retain(|_, recorded| *recorded > cutoff);
        match self.seen.entry((trigger, date, client_id)) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }
}

/// Per-account direct debit state, held alongside the finance account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectDebitState {
    pub instruction: Option<DirectDebitInstruction>,
    pub schedules: Vec<ScheduledPayment>,
}

impl DirectDebitState {
    pub fn active_instruction(&self) -> Option<&DirectDebitInstruction> {
        self.instruction.as_ref().filter(|i| i.is_active())
    }

    fn pending_schedule(&mut self) -> Option<&mut ScheduledPayment> {
        self.schedules
            .iter_mut()
            .find(|s| s.status == ScheduleStatus::Scheduled)
    }
}

/// Plans the next collection while a mandate is active
///
/// Called whenever the outstanding balance changes: on raising an invoice
/// and on mandate creation. At most one Scheduled entry exists at a time;
/// it is re-dated and re-amounted to the balance as it stands, and removed
/// when there is nothing left to collect.
pub fn schedule_collection(
    account: &FinanceAccount,
    state: &mut DirectDebitState,
    today: NaiveDate,
) -> Option<ScheduledPaymentId> {
    if account.payment_method != PaymentMethod::DirectDebit
        || state.active_instruction().is_none()
    {
        return None;
    }
    let amount = account.balances().outstanding;
    if !amount.is_positive() {
        state
            .schedules
            .retain(|s| s.status != ScheduleStatus::Scheduled);
        return None;
    }
    let collection_date = next_collection_date(today);
    if let Some(pending) = state.pending_schedule() {
        pending.collection_date = collection_date;
        pending.amount = amount;
        return Some(pending.id);
    }
    let schedule = ScheduledPayment {
        id: ScheduledPaymentId::new(),
        collection_date,
        amount,
        status: ScheduleStatus::Scheduled,
        entry: None,
        created_at: Utc::now(),
    };
    let schedule_id = schedule.id;
    state.schedules.push(schedule);
    info!(client_id = %account.client_id, %amount, %collection_date, "collection scheduled");
    Some(schedule_id)
}

/// Collects the account's outstanding balance on the given date
///
/// Returns None when there is nothing to collect or the account is not on
/// direct debit; both are expected outcomes of a broadcast trigger, not
/// errors.
pub fn process_collection(
    account: &mut FinanceAccount,
    state: &mut DirectDebitState,
    collection_date: NaiveDate,
    created_by: UserId,
) -> Result<Option<ScheduledPaymentId>, DirectDebitError> {
    if account.payment_method != PaymentMethod::DirectDebit
        || state.active_instruction().is_none()
    {
        return Ok(None);
    }
    let amount = account.balances().outstanding;
    if !amount.is_positive() {
        info!(client_id = %account.client_id, "nothing outstanding to collect");
        return Ok(None);
    }
    let entry = account.apply_payment(
        TransactionType::DirectDebitPayment,
        amount,
        collection_date,
        created_by,
    )?;
    let schedule_id = match state.pending_schedule() {
        Some(pending) => {
            pending.status = ScheduleStatus::Collected;
            pending.collection_date = collection_date;
            pending.amount = amount;
            pending.entry = Some(entry);
            pending.id
        }
        // override-dated runs can collect without a planned entry
        None => {
            let schedule = ScheduledPayment {
                id: ScheduledPaymentId::new(),
                collection_date,
                amount,
                status: ScheduleStatus::Collected,
                entry: Some(entry),
                created_at: Utc::now(),
            };
            let schedule_id = schedule.id;
            state.schedules.push(schedule);
            schedule_id
        }
    };
    info!(client_id = %account.client_id, %amount, %collection_date, "direct debit collected");
    Ok(Some(schedule_id))
}

/// Reverses the collection taken on the given date
///
/// The matching schedule moves to Failed and the payment entry is reversed,
/// reopening whatever the collection paid. No matching collection is a
/// logged no-op.
pub fn process_failed_collection(
    account: &mut FinanceAccount,
    state: &mut DirectDebitState,
    collection_date: NaiveDate,
    created_by: UserId,
) -> Result<Option<ScheduledPaymentId>, DirectDebitError> {
    let Some(schedule) = state
        .schedules
        .iter_mut()
        .find(|s| s.collection_date == collection_date && s.status == ScheduleStatus::Collected)
    else {
        info!(client_id = %account.client_id, %collection_date, "no collection to reverse");
        return Ok(None);
    };
    let entry = schedule.entry.ok_or_else(|| {
        DirectDebitError::invalid_transition(format!(
            "Schedule {} has no payment entry",
            schedule.id
        ))
    })?;
    schedule.status = ScheduleStatus::Failed;
    let schedule_id = schedule.id;
    account.reverse_payment(entry, created_by)?;
    info!(client_id = %account.client_id, %collection_date, "direct debit collection reversed");
    Ok(Some(schedule_id))
}

/// Upper bound on how stale an override date may be
pub fn override_date_in_window(override_date: NaiveDate, today: NaiveDate) -> bool {
    let earliest = today - Days::new(RETENTION_DAYS);
    override_date >= earliest && override_date <= today
}
