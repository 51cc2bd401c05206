//! Billing Domain
//!
//! This crate implements the supervision billing ledger and payment
//! allocation engine: one finance account per supervised client, holding an
//! append-only ledger of money movements, invoices whose status is always
//! derived from ledger projection, and the approval and state machine
//! workflows that feed the ledger.
//!
//! # Architecture
//!
//! The domain layer is infrastructure-agnostic, containing only business logic:
//! - **Aggregates**: FinanceAccount is the single aggregate root
//! - **Value Objects**: Money (in core_kernel), allocations, bank details
//! - **State Machines**: Adjustment approval, Refund lifecycle, Fee reductions
//! - **Projections**: invoice balances, account balances, billing history
//!
//! # Invariant
//!
//! After every mutation the ledger must conserve money exactly: each entry's
//! counted allocations sum to its amount, no invoice is over-allocated, and
//! the credit balance never goes negative. A violation halts the account.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{Actor, FinanceAccount, RaiseInvoice, TransactionType};
//!
//! let mut account = FinanceAccount::new(client_id, court_reference);
//! let invoice = account.raise_invoice(params, actor, today)?;
//! account.apply_payment(TransactionType::MotoCardPayment, amount, received, user)?;
//! assert!(account.balances().outstanding >= Money::zero());
//! ```

pub mod account;
pub mod adjustment;
pub mod allocation;
pub mod error;
pub mod fee_reduction;
pub mod history;
pub mod invoice;
pub mod ledger;
pub mod refund;

pub use account::{AccountBalances, Actor, FinanceAccount, PaymentMethod};
pub use adjustment::{Adjustment, AdjustmentStatus, AdjustmentType};
pub use allocation::{mirror_for_reversal, plan_reapply, split_payment, OpenInvoice};
pub use error::{BillingError, FieldError, ValidationReport};
pub use fee_reduction::{FeeReduction, FeeReductionStatus, FeeReductionType, GrantFeeReduction};
pub use history::{billing_history, HistoryEvent, HistoryLine};
pub use invoice::{FeeType, Invoice, InvoiceStatus, RaiseInvoice, SupervisionLevel};
pub use ledger::{
    Allocation, AllocationStatus, EntryStatus, Ledger, LedgerEntry, TransactionType,
};
pub use refund::{BankDetails, Refund, RefundStatus};
