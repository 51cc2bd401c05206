//! Invoices and fee types
//!
//! Invoices are raised against a client account and never mutated afterwards;
//! everything that happens to one (payments, adjustments, reductions) is a
//! ledger entry allocated to it. Status is always derived from the projected
//! balance, never stored, so it cannot drift.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{InvoiceId, Money};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BillingError, ValidationReport};

/// Supervision fee types
///
/// The fee type determines which fields must accompany a raised invoice:
/// fixed-fee types carry only a raised date, level-based supervision types
/// require an amount, a billing period and a supervision level, and the
/// remaining period types require an amount and a billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeType {
    /// Assessment (deputy) - fixed fee
    AD,
    /// Annual supervision, level-based
    S2,
    S3,
    /// Annual supervision (bonds), level-based
    B2,
    B3,
    /// Period fees raised in arrears
    SF,
    SE,
    SO,
    /// Guardianship assessment - fixed fee
    GA,
    /// Guardianship supervision / termination
    GS,
    GT,
}

impl FeeType {
    pub const ALL: [FeeType; 11] = [
        FeeType::AD,
        FeeType::S2,
        FeeType::S3,
        FeeType::B2,
        FeeType::B3,
        FeeType::SF,
        FeeType::SE,
        FeeType::SO,
        FeeType::GA,
        FeeType::GS,
        FeeType::GT,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FeeType::AD => "AD",
            FeeType::S2 => "S2",
            FeeType::S3 => "S3",
            FeeType::B2 => "B2",
            FeeType::B3 => "B3",
            FeeType::SF => "SF",
            FeeType::SE => "SE",
            FeeType::SO => "SO",
            FeeType::GA => "GA",
            FeeType::GS => "GS",
            FeeType::GT => "GT",
        }
    }

    pub fn parse(s: &str) -> Option<FeeType> {
        Self::ALL.iter().copied().find(|t| t.key() == s)
    }

    /// Fixed-fee types take no amount from the caller
    pub fn fixed_fee(&self) -> Option<Money> {
        match self {
            FeeType::AD | FeeType::GA => Some(Money::from_pence(10_000)),
            _ => None,
        }
    }

    /// Whether a supervision level must accompany the invoice
    pub fn supervision_level_required(&self) -> bool {
        matches!(self, FeeType::S2 | FeeType::S3 | FeeType::B2 | FeeType::B3)
    }

    /// Whether a billing period (start and end dates) is required
    pub fn period_required(&self) -> bool {
        !matches!(self, FeeType::AD | FeeType::GA)
    }

    /// Types raised in arrears must carry a raised date in the past
    pub fn raised_date_in_past(&self) -> bool {
        matches!(self, FeeType::AD | FeeType::SF | FeeType::SE | FeeType::SO)
    }

    /// Upper bound on the invoice's outstanding debt, used to cap debit memos
    pub fn debt_cap(&self) -> Money {
        match self {
            FeeType::AD => Money::from_pence(10_000),
            _ => Money::from_pence(32_000),
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Supervision level for level-based fee types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SupervisionLevel {
    General,
    Minimal,
}

/// Derived invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    /// Projected balance is above zero
    Unpaid,
    /// Projected balance is exactly zero
    Closed,
}

/// An invoice raised against a client account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Human-readable reference, e.g. "AD000001/24"
    pub reference: String,
    pub fee_type: FeeType,
    pub amount: Money,
    pub raised_date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub supervision_level: Option<SupervisionLevel>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Formats a reference from a type-scoped sequence number and raised year
    pub fn make_reference(fee_type: FeeType, sequence: u32, raised_date: NaiveDate) -> String {
        use chrono::Datelike;
        format!(
            "{}{:06}/{:02}",
            fee_type.key(),
            sequence,
            raised_date.year() % 100
        )
    }
}

/// Parameters for raising an invoice
///
/// All fields except the fee type are optional at the boundary; which ones
/// are actually required depends on the type, and every missing or invalid
/// field is reported in a single aggregated validation report.
#[derive(Debug, Clone, Deserialize)]
pub struct RaiseInvoice {
    pub fee_type: FeeType,
    pub amount: Option<Money>,
    pub raised_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub supervision_level: Option<SupervisionLevel>,
}

impl RaiseInvoice {
    /// Validates the parameters against the fee type's requirements
    ///
    /// Returns the resolved amount on success.
    pub fn validate(&self, today: NaiveDate) -> Result<Money, BillingError> {
        let mut report = ValidationReport::new();
        let fee_type = self.fee_type;

        let amount = match (fee_type.fixed_fee(), self.amount) {
            (Some(fixed), _) => fixed,
            (None, Some(amount)) if amount.is_positive() => amount,
            (None, Some(_)) => {
                report.add("amount", "Amount must be above zero");
                Money::zero()
            }
            (None, None) => {
                report.add("amount", "Enter an amount");
                Money::zero()
            }
        };

        match self.raised_date {
            Some(raised) if fee_type.raised_date_in_past() && raised >= today => {
                report.add("raisedDate", "Raised date must be in the past");
            }
            Some(_) => {}
            None => report.add("raisedDate", "Enter a raised date"),
        }

        if fee_type.period_required() {
            match (self.start_date, self.end_date) {
                (Some(start), Some(end)) if start > end => {
                    report.add("startDate", "Start date must be before end date");
                }
                (Some(_), Some(_)) => {}
                (None, _) => report.add("startDate", "Enter a start date"),
                (_, None) => report.add("endDate", "Enter an end date"),
            }
        }

        if fee_type.supervision_level_required() && self.supervision_level.is_none() {
            report.add("supervisionLevel", "Select a supervision level");
        }

        report.into_result()?;
        Ok(amount)
    }
}
