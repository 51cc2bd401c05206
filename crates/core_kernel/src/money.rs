//! Money as exact integer pence
//!
//! All monetary values in the system are GBP, held as signed 64-bit pence.
//! There is deliberately no floating-point or decimal representation:
//! equality and ordering are exact, and arithmetic either succeeds exactly
//! or fails with an overflow error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use thiserror::Error;

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Overflow during calculation")]
    Overflow,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// A monetary amount in GBP pence
///
/// Positive amounts are credits toward an invoice or the client's account;
/// negative amounts are reversals or charges, depending on the transaction
/// type that carries them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from an amount in pence
    pub const fn from_pence(pence: i64) -> Self {
        Self(pence)
    }

    /// A zero amount
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in pence
    pub const fn pence(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is strictly positive
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is strictly negative
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value
    pub const fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Returns the smaller of two amounts
    pub fn min(self, other: Money) -> Money {
        Self(self.0.min(other.0))
    }

    /// Checked addition
    pub fn checked_add(&self, other: Money) -> Result<Money, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: Money) -> Result<Money, MoneyError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Parses a decimal string such as "100", "32.5" or "32.50" into pence
    ///
    /// Uploaded payment files carry amounts in pounds with up to two decimal
    /// places; anything finer is rejected rather than rounded.
    pub fn parse_decimal(s: &str) -> Result<Money, MoneyError> {
        let s = s.trim();
        let invalid = || MoneyError::InvalidAmount(s.to_string());
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };
        let (pounds, pence) = match digits.split_once('.') {
            Some((p, frac)) if frac.len() == 1 => (p, format!("{frac}0")),
            Some((p, frac)) if frac.len() == 2 => (p, frac.to_string()),
            Some(_) => return Err(invalid()),
            None => (digits, "00".to_string()),
        };
        if pounds.is_empty() || !pounds.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let pounds: i64 = pounds.parse().map_err(|_| invalid())?;
        let pence: i64 = pence.parse().map_err(|_| invalid())?;
        pounds
            .checked_mul(100)
            .and_then(|p| p.checked_add(pence))
            .map(|total| Money(sign * total))
            .ok_or(MoneyError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}£{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_creation() {
        let m = Money::from_pence(10050);
        assert_eq!(m.pence(), 10050);
        assert!(m.is_positive());
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_pence(10000);
        let b = Money::from_pence(5000);

        assert_eq!((a + b).pence(), 15000);
        assert_eq!((a - b).pence(), 5000);
        assert_eq!((-a).pence(), -10000);
    }

    #[test]
    fn test_money_ordering() {
        assert!(Money::from_pence(100) > Money::from_pence(99));
        assert_eq!(
            Money::from_pence(50).min(Money::from_pence(120)),
            Money::from_pence(50)
        );
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_pence(10050).to_string(), "£100.50");
        assert_eq!(Money::from_pence(5).to_string(), "£0.05");
        assert_eq!(Money::from_pence(-3200).to_string(), "-£32.00");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(Money::parse_decimal("100"), Ok(Money::from_pence(10000)));
        assert_eq!(Money::parse_decimal("32.5"), Ok(Money::from_pence(3250)));
        assert_eq!(Money::parse_decimal("32.50"), Ok(Money::from_pence(3250)));
        assert_eq!(Money::parse_decimal("-0.01"), Ok(Money::from_pence(-1)));
        assert!(Money::parse_decimal("12.345").is_err());
        assert!(Money::parse_decimal("abc").is_err());
        assert!(Money::parse_decimal("").is_err());
    }

    #[test]
    fn test_checked_add_overflow() {
        let max = Money::from_pence(i64::MAX);
        assert_eq!(
            max.checked_add(Money::from_pence(1)),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, -50].iter().map(|p| Money::from_pence(*p)).sum();
        assert_eq!(total, Money::from_pence(300));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn money_addition_is_commutative(
            a in -1_000_000_000i64..1_000_000_000i64,
            b in -1_000_000_000i64..1_000_000_000i64
        ) {
            let ma = Money::from_pence(a);
            let mb = Money::from_pence(b);
            prop_assert_eq!(ma + mb, mb + ma);
        }

        #[test]
        fn parse_decimal_round_trips_pence(amount in 0i64..1_000_000_000i64) {
            let formatted = format!("{}.{:02}", amount / 100, amount % 100);
            prop_assert_eq!(Money::parse_decimal(&formatted), Ok(Money::from_pence(amount)));
        }
    }
}
