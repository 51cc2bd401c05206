//! Property-Based Test Generators
//!
//! Shared proptest strategies for domain values.

use chrono::NaiveDate;
use core_kernel::Money;
use proptest::prelude::*;

/// A positive amount between a penny and one thousand pounds
pub fn positive_money() -> impl Strategy<Value = Money> {
    (1i64..=100_000).prop_map(Money::from_pence)
}

/// An invoice amount within the general supervision fee range
pub fn invoice_amount() -> impl Strategy<Value = Money> {
    (100i64..=32_000).prop_map(Money::from_pence)
}

/// A date somewhere in the 2023 and 2024 calendar years
pub fn working_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..730).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Days::new(offset as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    proptest! {
        #[test]
        fn test_positive_money_is_positive(amount in positive_money()) {
            prop_assert!(amount.is_positive());
        }

        #[test]
        fn test_working_date_stays_in_range(date in working_date()) {
            prop_assert!(date.year() == 2023 || date.year() == 2024);
        }
    }
}
