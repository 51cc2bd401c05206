//! Direct debit domain errors

use core_kernel::ProviderError;
use domain_billing::{BillingError, ValidationReport};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectDebitError {
    /// Field-level failures on mandate details, aggregated
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// The provider declined or could not be reached; nothing was committed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A domain rule rejected the operation
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Posting the collection or reversal to the ledger failed
    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl DirectDebitError {
    pub fn business_rule(message: impl Into<String>) -> Self {
        DirectDebitError::BusinessRule(message.into())
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        DirectDebitError::InvalidTransition(message.into())
    }
}
