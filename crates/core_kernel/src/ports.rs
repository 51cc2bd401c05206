//! Provider ports
//!
//! The finance core talks to two external collaborators: the direct debit
//! provider (mandate registration and modulus checks) and the email
//! notifier. Both are abstracted behind narrow capability traits so the core
//! stays independently testable without network dependencies.
//!
//! Implementations live at the interface edge; the domain only ever sees
//! these traits. A provider call either succeeds or fails as a whole, and
//! the caller must not commit ledger state on failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Error type for provider operations
///
/// Provider failures are recoverable from the caller's perspective: they are
/// surfaced as a retryable error with no partial ledger state.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the request as invalid
    #[error("{service} rejected request: {message}")]
    Rejected { service: String, message: String },

    /// The provider could not be reached
    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    /// The provider did not respond within the bounded wait
    #[error("{service} timed out after {duration_ms}ms")]
    Timeout { service: String, duration_ms: u64 },
}

impl ProviderError {
    pub fn rejected(service: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Rejected {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Unavailable {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// Bank details for a direct debit mandate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MandateBankDetails {
    pub account_name: String,
    pub sort_code: String,
    pub account_number: String,
}

/// A mandate registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateRegistration {
    /// Court reference identifying the client with the provider
    pub client_reference: String,
    pub surname: String,
    pub bank_details: MandateBankDetails,
}

/// Direct debit provider capability
#[async_trait]
pub trait MandateRegistrar: Send + Sync {
    /// Validates a sort code / account number pair with the provider
    async fn modulus_check(
        &self,
        sort_code: &str,
        account_number: &str,
    ) -> Result<(), ProviderError>;

    /// Registers a new mandate
    async fn create_mandate(&self, registration: &MandateRegistration)
        -> Result<(), ProviderError>;

    /// Cancels the mandate for a client
    async fn cancel_mandate(&self, client_reference: &str) -> Result<(), ProviderError>;
}

/// An email notification to be dispatched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Notification {
    /// A requested report has been generated
    ReportReady { report_type: String },
    /// An uploaded file has been processed; failed lines keyed by row number
    UploadProcessed {
        upload_type: String,
        failed_lines: BTreeMap<usize, String>,
    },
}

/// Email dispatch capability
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &str, notification: Notification) -> Result<(), ProviderError>;
}
