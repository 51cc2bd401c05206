//! Collection scheduling
//!
//! Collections fall on the 24th of the month. If the 24th of the current
//! month has already passed, the next cycle is used; a 24th on a weekend
//! shifts forward to the Monday.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use core_kernel::{LedgerEntryId, Money, ScheduledPaymentId};
use serde::{Deserialize, Serialize};

const BILLING_DAY: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleStatus {
    Scheduled,
    Collected,
    Failed,
}

/// One planned or executed collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub id: ScheduledPaymentId,
    pub collection_date: NaiveDate,
    pub amount: Money,
    pub status: ScheduleStatus,
    /// The payment entry once collected
    pub entry: Option<LedgerEntryId>,
    pub created_at: DateTime<Utc>,
}

/// Next collection date on or after `from`
///
/// Every month has a 24th, so only the weekend shift can move the date:
/// Saturday goes to the following Monday (+2), Sunday to the Monday (+1).
pub fn next_collection_date(from: NaiveDate) -> NaiveDate {
    let (year, month) = if from.day() > BILLING_DAY {
        if from.month() == 12 {
            (from.year() + 1, 1)
        } else {
            (from.year(), from.month() + 1)
        }
    } else {
        (from.year(), from.month())
    };
    // the 24th exists in every month
    let billing = NaiveDate::from_ymd_opt(year, month, BILLING_DAY)
        .unwrap_or(from);
    match billing.weekday() {
        Weekday::Sat => billing + Days::new(2),
        Weekday::Sun => billing + Days::new(1),
        _ => billing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekday_24th_is_used_directly() {
        // 2024-07-24 is a Wednesday
        assert_eq!(next_collection_date(date(2024, 7, 1)), date(2024, 7, 24));
        assert_eq!(next_collection_date(date(2024, 7, 24)), date(2024, 7, 24));
    }

    #[test]
    fn test_passed_billing_day_rolls_to_next_month() {
        assert_eq!(next_collection_date(date(2024, 7, 25)), date(2024, 8, 26));
        assert_eq!(next_collection_date(date(2024, 12, 28)), date(2025, 1, 24));
    }

    #[test]
    fn test_saturday_shifts_to_monday() {
        // 2024-08-24 is a Saturday
        assert_eq!(next_collection_date(date(2024, 8, 1)), date(2024, 8, 26));
    }

    #[test]
    fn test_sunday_shifts_to_monday() {
        // 2024-11-24 is a Sunday
        assert_eq!(next_collection_date(date(2024, 11, 1)), date(2024, 11, 25));
    }
}
