//! Direct Debit Domain
//!
//! Mandate registration against the payment provider, collection date
//! scheduling, and idempotent processing of the externally delivered
//! collection and failure triggers. Collections and reversals are posted to
//! the billing ledger through the `domain_billing` aggregate; this crate
//! never touches ledger internals directly.

pub mod error;
pub mod events;
pub mod mandate;
pub mod schedule;

pub use error::DirectDebitError;
pub use events::{
    override_date_in_window, process_collection, process_failed_collection, schedule_collection,
    DedupeStore, DirectDebitState, ScheduledTrigger,
};
pub use mandate::{
    cancel_mandate, register_mandate, validate_bank_details, DirectDebitInstruction,
    InstructionStatus,
};
pub use schedule::{next_collection_date, ScheduleStatus, ScheduledPayment};
