//! Fee reduction awards
//!
//! An award covers whole supervision years: it runs from 1 April of the
//! start year to 31 March of the final year. Granting one credits every
//! invoice raised inside the period; cancelling posts reversing entries.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use core_kernel::{FeeReductionId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, ValidationReport};
use crate::ledger::TransactionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeeReductionType {
    Hardship,
    Remission,
    Exemption,
}

impl FeeReductionType {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            FeeReductionType::Hardship => TransactionType::Hardship,
            FeeReductionType::Remission => TransactionType::Remission,
            FeeReductionType::Exemption => TransactionType::Exemption,
        }
    }
}

/// Stored status; `Expired` is derived from the end date, never written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeeReductionStatus {
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeReduction {
    pub id: FeeReductionId,
    pub reduction_type: FeeReductionType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub date_received: NaiveDate,
    pub notes: String,
    pub cancelled: bool,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
}

impl FeeReduction {
    pub fn status(&self, today: NaiveDate) -> FeeReductionStatus {
        if self.cancelled {
            FeeReductionStatus::Cancelled
        } else if self.end_date < today {
            FeeReductionStatus::Expired
        } else {
            FeeReductionStatus::Active
        }
    }

    /// Whether the award covers the given invoice raised date
    pub fn covers(&self, raised_date: NaiveDate) -> bool {
        !self.cancelled && self.start_date <= raised_date && raised_date <= self.end_date
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        !self.cancelled && self.start_date <= end && start <= self.end_date
    }

    pub fn cancel(&mut self, reason: String) -> Result<(), BillingError> {
        if self.cancelled {
            return Err(BillingError::invalid_transition(format!(
                "Fee reduction {} is already cancelled",
                self.id
            )));
        }
        self.cancelled = true;
        self.cancellation_reason = Some(reason);
        Ok(())
    }
}

/// Parameters for granting an award
#[derive(Debug, Clone, Deserialize)]
pub struct GrantFeeReduction {
    pub reduction_type: FeeReductionType,
    /// First supervision year of the award (the year containing its 1 April)
    pub start_year: i32,
    /// Number of supervision years covered
    pub length_of_award: u8,
    pub date_received: NaiveDate,
    pub notes: String,
}

impl GrantFeeReduction {
    /// Award period: 1 April of the start year to 31 March after `length`
    /// supervision years
    pub fn award_period(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::from_ymd_opt(self.start_year, 4, 1)?;
        let end = NaiveDate::from_ymd_opt(self.start_year + i32::from(self.length_of_award), 3, 31)?;
        Some((start, end))
    }

    pub fn validate(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), BillingError> {
        let mut report = ValidationReport::new();
        if !(1..=3).contains(&self.length_of_award) {
            report.add("lengthOfAward", "Award length must be between 1 and 3 years");
        }
        if self.start_year < 2000 || self.start_year > today.year() + 1 {
            report.add("startYear", "Enter a valid start year");
        }
        if self.date_received > today {
            report.add("dateReceived", "Date received must not be in the future");
        }
        if self.notes.trim().is_empty() {
            report.add("notes", "Enter a reason for the award");
        }
        report.into_result()?;
        self.award_period()
            .ok_or_else(|| BillingError::field("startYear", "Enter a valid start year"))
    }
}
