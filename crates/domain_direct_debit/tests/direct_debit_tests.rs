//! Direct debit integration tests
//!
//! Mandate registration against a stub provider, collection idempotence
//! through the dedupe store, and the all-or-nothing guarantee on provider
//! failure.

use async_trait::async_trait;
use chrono::NaiveDate;
use core_kernel::{
    ClientId, MandateBankDetails, MandateRegistrar, MandateRegistration, Money, ProviderError,
    UserId,
};
use domain_billing::{Actor, FeeType, FinanceAccount, PaymentMethod, RaiseInvoice};
use domain_direct_debit::{
    cancel_mandate, process_collection, register_mandate, DedupeStore, ScheduledTrigger,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use test_utils::DirectDebitFixtures;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn details() -> MandateBankDetails {
    MandateBankDetails {
        account_name: "C Client".to_string(),
        sort_code: "110247".to_string(),
        account_number: "12345678".to_string(),
    }
}

/// Provider stub that counts calls and can fail any step
#[derive(Default)]
struct StubRegistrar {
    fail_modulus: bool,
    fail_create: bool,
    mandates_created: AtomicUsize,
    mandates_cancelled: AtomicUsize,
}

#[async_trait]
impl MandateRegistrar for StubRegistrar {
    async fn modulus_check(
        &self,
        _sort_code: &str,
        _account_number: &str,
    ) -> Result<(), ProviderError> {
        if self.fail_modulus {
            Err(ProviderError::rejected("allpay", "modulus check failed"))
        } else {
            Ok(())
        }
    }

    async fn create_mandate(
        &self,
        _registration: &MandateRegistration,
    ) -> Result<(), ProviderError> {
        if self.fail_create {
            return Err(ProviderError::unavailable("allpay", "connection refused"));
        }
        self.mandates_created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn cancel_mandate(&self, _client_reference: &str) -> Result<(), ProviderError> {
        self.mandates_cancelled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_mandate_registration_happy_path() {
    let registrar = StubRegistrar::default();
    let instruction = register_mandate(&registrar, "12345678", "Client", details())
        .await
        .unwrap();
    assert!(instruction.is_active());
    assert_eq!(registrar.mandates_created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_modulus_check_creates_nothing() {
    let registrar = StubRegistrar {
        fail_modulus: true,
        ..Default::default()
    };
    let result = register_mandate(&registrar, "12345678", "Client", details()).await;
    assert!(result.is_err());
    assert_eq!(registrar.mandates_created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_provider_outage_creates_nothing() {
    let registrar = StubRegistrar {
        fail_create: true,
        ..Default::default()
    };
    let result = register_mandate(&registrar, "12345678", "Client", details()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_invalid_details_never_reach_the_provider() {
    let registrar = StubRegistrar::default();
    let mut bad = details();
    bad.sort_code = "000000".to_string();
    let result = register_mandate(&registrar, "12345678", "Client", bad).await;
    assert!(result.is_err());
    assert_eq!(registrar.mandates_created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_mandate_round_trip() {
    let registrar = StubRegistrar::default();
    let mut instruction = register_mandate(&registrar, "12345678", "Client", details())
        .await
        .unwrap();
    cancel_mandate(&registrar, "12345678", &mut instruction)
        .await
        .unwrap();
    assert!(!instruction.is_active());
    assert_eq!(registrar.mandates_cancelled.load(Ordering::SeqCst), 1);
}

#[test]
fn test_redelivered_collection_trigger_does_not_double_collect() {
    let mut account = FinanceAccount::new(ClientId::new(), "12345678".to_string());
    account.set_payment_method(PaymentMethod::DirectDebit);
    account
        .raise_invoice(
            RaiseInvoice {
                fee_type: FeeType::AD,
                amount: None,
                raised_date: Some(date(2024, 1, 1)),
                start_date: None,
                end_date: None,
                supervision_level: None,
            },
            Actor::case_worker(UserId::new()),
            date(2024, 6, 1),
        )
        .unwrap();
    let mut state = DirectDebitFixtures::active_state();

    let mut dedupe = DedupeStore::new();
    let collection_date = date(2024, 7, 24);
    let client_id = account.client_id;

    // first delivery collects
    assert!(dedupe.check_and_record(
        ScheduledTrigger::DirectDebitCollection,
        collection_date,
        client_id
    ));
    process_collection(&mut account, &mut state, collection_date, UserId::new()).unwrap();
    assert_eq!(account.balances().outstanding, Money::zero());

    // redelivery is filtered before any ledger mutation
    assert!(!dedupe.check_and_record(
        ScheduledTrigger::DirectDebitCollection,
        collection_date,
        client_id
    ));
    assert_eq!(state.schedules.len(), 1);
    assert_eq!(account.ledger().entries().len(), 1);
}
