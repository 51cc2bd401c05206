//! Request/Response data transfer objects

pub mod admin;
pub mod billing;
pub mod direct_debit;
