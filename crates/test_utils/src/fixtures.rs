//! Test Fixtures
//!
//! Pre-built values used across the test suites. Dates are fixed rather than
//! derived from the clock so assertions stay stable.

use chrono::{NaiveDate, Utc};
use core_kernel::{ClientId, MandateId, Money, UserId};
use domain_billing::Actor;
use domain_direct_debit::{DirectDebitInstruction, DirectDebitState, InstructionStatus};
use uuid::Uuid;

/// Common monetary amounts in pence
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// The fixed assessment fee
    pub fn assessment_fee() -> Money {
        Money::from_pence(10_000)
    }

    /// A typical annual general supervision fee
    pub fn general_fee() -> Money {
        Money::from_pence(32_000)
    }

    /// A small partial payment
    pub fn partial_payment() -> Money {
        Money::from_pence(5_000)
    }
}

/// Fixed calendar dates
pub struct DateFixtures;

impl DateFixtures {
    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// A mid-year working day, safely inside the 2024/25 award year
    pub fn today() -> NaiveDate {
        Self::date(2024, 6, 3)
    }

    /// The direct debit billing day for July 2024 (a Wednesday)
    pub fn billing_day() -> NaiveDate {
        Self::date(2024, 7, 24)
    }
}

/// Deterministic identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn client_id() -> ClientId {
        ClientId::from_uuid(Uuid::from_u128(1))
    }

    pub fn case_worker_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(100))
    }

    pub fn finance_manager_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(200))
    }
}

/// Common actors
pub struct ActorFixtures;

impl ActorFixtures {
    pub fn case_worker() -> Actor {
        Actor::case_worker(IdFixtures::case_worker_id())
    }

    pub fn finance_manager() -> Actor {
        Actor::finance_manager(IdFixtures::finance_manager_id())
    }

    /// A second finance manager, for approvals of the first one's requests
    pub fn second_finance_manager() -> Actor {
        Actor::finance_manager(UserId::from_uuid(Uuid::from_u128(201)))
    }
}

/// Direct debit state fixtures
pub struct DirectDebitFixtures;

impl DirectDebitFixtures {
    /// A state with an active instruction and no schedules
    pub fn active_state() -> DirectDebitState {
        DirectDebitState {
            instruction: Some(DirectDebitInstruction {
                id: MandateId::new(),
                account_name: "C Client".to_string(),
                sort_code: "110247".to_string(),
                account_number: "12345678".to_string(),
                status: InstructionStatus::Active,
                created_at: Utc::now(),
            }),
            schedules: Vec::new(),
        }
    }
}
