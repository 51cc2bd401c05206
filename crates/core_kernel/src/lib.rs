//! Core Kernel - Foundational types for the supervision finance system
//!
//! This crate provides the fundamental building blocks used across all domain
//! modules:
//! - Money as exact integer pence
//! - Strongly-typed entity identifiers
//! - Provider capability ports (direct debit, notifications)

pub mod identifiers;
pub mod money;
pub mod ports;

pub use identifiers::{
    AdjustmentId, ClientId, FeeReductionId, InvoiceId, LedgerEntryId, MandateId, RefundId,
    ScheduledPaymentId, UserId,
};
pub use money::{Money, MoneyError};
pub use ports::{
    MandateBankDetails, MandateRegistrar, MandateRegistration, Notification, Notifier,
    ProviderError,
};
