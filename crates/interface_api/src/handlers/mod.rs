//! Request handlers

pub mod admin;
pub mod adjustments;
pub mod clients;
pub mod direct_debit;
pub mod fee_reductions;
pub mod health;
pub mod invoices;
pub mod refunds;
