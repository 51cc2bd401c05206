//! Billing domain errors
//!
//! The taxonomy mirrors how failures are surfaced: validation problems are
//! aggregated and user-correctable, business rule violations are rejected
//! before any ledger mutation, and consistency failures are fatal for the
//! affected account.

use core_kernel::MoneyError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

/// An aggregated validation report
///
/// All field failures for a request are collected before returning, so the
/// caller can surface every problem at once rather than one per attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns Ok if no failures were recorded
    pub fn into_result(self) -> Result<(), BillingError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(BillingError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.errors.iter().map(|e| e.field.as_str()).collect();
        write!(f, "{}", fields.join(", "))
    }
}

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Field-level validation failures, aggregated; nothing was applied
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// A domain rule rejected the operation before any ledger mutation
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// A ledger entry was malformed (zero amount, unknown invoice)
    #[error("Invalid ledger entry: {0}")]
    InvalidEntry(String),

    /// An illegal state machine transition was requested
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Referenced entity does not exist on this account
    #[error("Not found: {0}")]
    NotFound(String),

    /// The dual-balance invariant failed; processing for this account must
    /// halt and operators must be alerted
    #[error("Ledger consistency failure: {0}")]
    Consistency(String),

    /// Arithmetic error
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}

impl BillingError {
    pub fn business_rule(message: impl Into<String>) -> Self {
        BillingError::BusinessRule(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BillingError::NotFound(message.into())
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        BillingError::InvalidTransition(message.into())
    }

    /// Builds a single-field validation error
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut report = ValidationReport::new();
        report.add(field, reason);
        BillingError::Validation(report)
    }
}
