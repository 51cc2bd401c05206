//! Allocation planning
//!
//! Pure functions that decide how an amount of money spreads across open
//! invoices and account credit. They build the allocation rows for a ledger
//! entry without touching the ledger, so the account aggregate can validate
//! a whole plan and commit it atomically.

use core_kernel::{InvoiceId, LedgerEntryId, Money};

use crate::ledger::{Allocation, AllocationStatus};

/// Balance of one open invoice, in raised-date order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenInvoice {
    pub invoice_id: InvoiceId,
    pub balance: Money,
}

/// Splits an incoming amount across open invoices, oldest first
///
/// Each invoice absorbs up to its outstanding balance; whatever remains
/// after the last invoice becomes unapplied credit. The returned allocations
/// always sum to `amount`.
pub fn split_payment(
    entry_id: LedgerEntryId,
    amount: Money,
    open_invoices: &[OpenInvoice],
) -> Vec<Allocation> {
    let mut remaining = amount;
    let mut allocations = Vec::new();
    for invoice in open_invoices {
        if !remaining.is_positive() {
            break;
        }
        let portion = remaining.min(invoice.balance);
        if !portion.is_positive() {
            continue;
        }
        allocations.push(Allocation {
            entry_id,
            invoice_id: Some(invoice.invoice_id),
            amount: portion,
            status: AllocationStatus::Allocated,
        });
        remaining -= portion;
    }
    if !remaining.is_zero() {
        allocations.push(Allocation {
            entry_id,
            invoice_id: None,
            amount: remaining,
            status: AllocationStatus::Unapplied,
        });
    }
    allocations
}

/// Plans a credit reapply transfer onto open invoices
///
/// Consumes up to `credit` against the invoices oldest-first, pairing each
/// reapplied portion with a negative unapplied movement so the transfer nets
/// to zero. Returns the allocations and the total moved; the total is zero
/// when there is nothing to move.
pub fn plan_reapply(
    entry_id: LedgerEntryId,
    credit: Money,
    open_invoices: &[OpenInvoice],
) -> (Vec<Allocation>, Money) {
    let mut remaining = credit;
    let mut moved = Money::zero();
    let mut allocations = Vec::new();
    for invoice in open_invoices {
        if !remaining.is_positive() {
            break;
        }
        let portion = remaining.min(invoice.balance);
        if !portion.is_positive() {
            continue;
        }
        allocations.push(Allocation {
            entry_id,
            invoice_id: Some(invoice.invoice_id),
            amount: portion,
            status: AllocationStatus::Reapplied,
        });
        remaining -= portion;
        moved += portion;
    }
    if moved.is_positive() {
        allocations.push(Allocation {
            entry_id,
            invoice_id: None,
            amount: -moved,
            status: AllocationStatus::Unapplied,
        });
    }
    (allocations, moved)
}

/// Mirrors an entry's allocations for its reversing entry
///
/// Each bucket the original touched is undone in the same order with the
/// opposite sign, so reversal restores every invoice and the credit balance
/// exactly.
pub fn mirror_for_reversal(
    entry_id: LedgerEntryId,
    original: &[&Allocation],
) -> Vec<Allocation> {
    original
        .iter()
        .map(|alloc| Allocation {
            entry_id,
            invoice_id: alloc.invoice_id,
            amount: -alloc.amount,
            status: alloc.status,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(invoice_id: InvoiceId, balance: i64) -> OpenInvoice {
        OpenInvoice {
            invoice_id,
            balance: Money::from_pence(balance),
        }
    }

    #[test]
    fn test_payment_applies_oldest_first_with_carry() {
        let first = InvoiceId::new();
        let second = InvoiceId::new();
        let entry_id = LedgerEntryId::new();
        let allocations = split_payment(
            entry_id,
            Money::from_pence(12_000),
            &[open(first, 10_000), open(second, 5_000)],
        );
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].invoice_id, Some(first));
        assert_eq!(allocations[0].amount, Money::from_pence(10_000));
        assert_eq!(allocations[1].invoice_id, Some(second));
        assert_eq!(allocations[1].amount, Money::from_pence(2_000));
    }

    #[test]
    fn test_payment_excess_becomes_credit() {
        let invoice = InvoiceId::new();
        let entry_id = LedgerEntryId::new();
        let allocations =
            split_payment(entry_id, Money::from_pence(15_000), &[open(invoice, 10_000)]);
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[1].invoice_id, None);
        assert_eq!(allocations[1].amount, Money::from_pence(5_000));
        assert_eq!(allocations[1].status, AllocationStatus::Unapplied);
    }

    #[test]
    fn test_payment_with_no_invoices_is_all_credit() {
        let entry_id = LedgerEntryId::new();
        let allocations = split_payment(entry_id, Money::from_pence(4_000), &[]);
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].invoice_id, None);
        assert_eq!(allocations[0].amount, Money::from_pence(4_000));
    }

    #[test]
    fn test_allocations_conserve_amount() {
        let entry_id = LedgerEntryId::new();
        let allocations = split_payment(
            entry_id,
            Money::from_pence(7_531),
            &[open(InvoiceId::new(), 2_000), open(InvoiceId::new(), 3_000)],
        );
        let total: Money = allocations.iter().map(|a| a.amount).sum();
        assert_eq!(total, Money::from_pence(7_531));
    }

    #[test]
    fn test_reapply_nets_to_zero() {
        let invoice = InvoiceId::new();
        let entry_id = LedgerEntryId::new();
        let (allocations, moved) =
            plan_reapply(entry_id, Money::from_pence(2_500), &[open(invoice, 10_000)]);
        assert_eq!(moved, Money::from_pence(2_500));
        let total: Money = allocations.iter().map(|a| a.amount).sum();
        assert_eq!(total, Money::zero());
        assert_eq!(allocations[0].status, AllocationStatus::Reapplied);
    }

    #[test]
    fn test_reapply_with_no_credit_moves_nothing() {
        let (allocations, moved) = plan_reapply(
            LedgerEntryId::new(),
            Money::zero(),
            &[open(InvoiceId::new(), 10_000)],
        );
        assert!(allocations.is_empty());
        assert_eq!(moved, Money::zero());
    }

    #[test]
    fn test_mirror_reverses_each_bucket() {
        let invoice = InvoiceId::new();
        let original_entry = LedgerEntryId::new();
        let original = split_payment(
            original_entry,
            Money::from_pence(12_000),
            &[open(invoice, 10_000)],
        );
        let refs: Vec<&Allocation> = original.iter().collect();
        let reversal_entry = LedgerEntryId::new();
        let mirrored = mirror_for_reversal(reversal_entry, &refs);
        assert_eq!(mirrored.len(), 2);
        assert_eq!(mirrored[0].amount, Money::from_pence(-10_000));
        assert_eq!(mirrored[1].amount, Money::from_pence(-2_000));
        let total: Money = mirrored.iter().map(|a| a.amount).sum();
        assert_eq!(total, Money::from_pence(-12_000));
    }
}
