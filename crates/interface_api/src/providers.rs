//! Default provider implementations
//!
//! The production deployment wires real AllPay and Notify clients in here.
//! These implementations log the exchange and succeed, which is enough for
//! local development and the API test suite; the domain only ever sees the
//! `MandateRegistrar` and `Notifier` traits.

use async_trait::async_trait;
use core_kernel::{
    MandateRegistrar, MandateRegistration, Notification, Notifier, ProviderError,
};
use tracing::info;

/// Mandate registrar that accepts everything and logs it
#[derive(Debug, Default, Clone)]
pub struct LoggingRegistrar;

#[async_trait]
impl MandateRegistrar for LoggingRegistrar {
    async fn modulus_check(
        &self,
        sort_code: &str,
        _account_number: &str,
    ) -> Result<(), ProviderError> {
        info!(%sort_code, "modulus check");
        Ok(())
    }

    async fn create_mandate(
        &self,
        registration: &MandateRegistration,
    ) -> Result<(), ProviderError> {
        info!(client_reference = %registration.client_reference, "mandate created");
        Ok(())
    }

    async fn cancel_mandate(&self, client_reference: &str) -> Result<(), ProviderError> {
        info!(%client_reference, "mandate cancelled");
        Ok(())
    }
}

/// Notifier that logs instead of dispatching email
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, email: &str, notification: Notification) -> Result<(), ProviderError> {
        match notification {
            Notification::ReportReady { report_type } => {
                info!(%email, %report_type, "report ready notification");
            }
            Notification::UploadProcessed {
                upload_type,
                failed_lines,
            } => {
                info!(
                    %email,
                    %upload_type,
                    failed = failed_lines.len(),
                    "upload processed notification"
                );
            }
        }
        Ok(())
    }
}
