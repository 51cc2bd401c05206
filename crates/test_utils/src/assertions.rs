//! Custom Test Assertions
//!
//! Assertion helpers for domain types that give more meaningful error
//! messages than standard assertions.

use core_kernel::Money;
use domain_billing::FinanceAccount;

/// Asserts the account's outstanding balance
///
/// # Panics
///
/// Panics with both balances printed if the outstanding amount differs.
pub fn assert_outstanding(account: &FinanceAccount, expected: Money) {
    let balances = account.balances();
    assert_eq!(
        balances.outstanding, expected,
        "Outstanding balance mismatch: outstanding={}, credit={}, expected={}",
        balances.outstanding, balances.credit, expected
    );
}

/// Asserts the account's unapplied credit balance
pub fn assert_credit(account: &FinanceAccount, expected: Money) {
    let balances = account.balances();
    assert_eq!(
        balances.credit, expected,
        "Credit balance mismatch: outstanding={}, credit={}, expected={}",
        balances.outstanding, balances.credit, expected
    );
}

/// Asserts that the dual-balance invariant holds for the account
///
/// Total raised minus outstanding must equal total allocated minus held
/// credit. Every mutating operation checks this internally; tests call it
/// after sequences of operations as a belt check.
pub fn assert_balanced(account: &FinanceAccount) {
    account
        .verify()
        .expect("account should satisfy the ledger invariants");
}
