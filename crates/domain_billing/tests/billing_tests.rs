//! Billing domain integration tests
//!
//! End-to-end scenarios over the FinanceAccount aggregate: raising invoices,
//! allocating payments, adjustments, fee reductions, refunds, and the
//! conservation invariant across whole lifecycles.

use chrono::NaiveDate;
use core_kernel::{ClientId, Money, UserId};
use domain_billing::{
    billing_history, Actor, AdjustmentType, BankDetails, FeeReductionType, FeeType,
    FinanceAccount, GrantFeeReduction, InvoiceStatus, RaiseInvoice, SupervisionLevel,
    TransactionType,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2024, 6, 1)
}

fn new_account() -> FinanceAccount {
    FinanceAccount::new(ClientId::new(), "12345678".to_string())
}

fn raise_s2(account: &mut FinanceAccount, amount: i64, raised: NaiveDate) -> core_kernel::InvoiceId {
    account
        .raise_invoice(
            RaiseInvoice {
                fee_type: FeeType::S2,
                amount: Some(Money::from_pence(amount)),
                raised_date: Some(raised),
                start_date: Some(raised),
                end_date: Some(date(2099, 3, 31)),
                supervision_level: Some(SupervisionLevel::General),
            },
            Actor::case_worker(UserId::new()),
            today(),
        )
        .unwrap()
}

fn bank_details() -> BankDetails {
    BankDetails {
        account_name: "C Client".to_string(),
        sort_code: "110247".to_string(),
        account_number: "12345678".to_string(),
    }
}

mod allocation_scenarios {
    use super::*;

    #[test]
    fn test_payment_closes_oldest_invoice_before_newer() {
        let mut account = new_account();
        let first = raise_s2(&mut account, 10_000, date(2024, 1, 1));
        let second = raise_s2(&mut account, 5_000, date(2024, 2, 1));

        account
            .apply_payment(
                TransactionType::MotoCardPayment,
                Money::from_pence(12_000),
                date(2024, 3, 1),
                UserId::new(),
            )
            .unwrap();

        assert_eq!(account.invoice_status(first).unwrap(), InvoiceStatus::Closed);
        assert_eq!(
            account.invoice_balance(second).unwrap(),
            Money::from_pence(3_000)
        );
        assert_eq!(account.balances().credit, Money::zero());
    }

    #[test]
    fn test_payment_with_no_open_invoices_is_held_as_credit() {
        let mut account = new_account();
        account
            .apply_payment(
                TransactionType::OpgBacsPayment,
                Money::from_pence(6_000),
                date(2024, 3, 1),
                UserId::new(),
            )
            .unwrap();
        assert_eq!(account.balances().credit, Money::from_pence(6_000));
        assert_eq!(account.balances().outstanding, Money::zero());
    }

    #[test]
    fn test_reapply_covers_new_invoice_and_leaves_remainder() {
        let mut account = new_account();
        account
            .apply_payment(
                TransactionType::OpgBacsPayment,
                Money::from_pence(6_000),
                date(2024, 3, 1),
                UserId::new(),
            )
            .unwrap();

        let invoice = raise_s2(&mut account, 4_000, date(2024, 4, 1));
        assert_eq!(account.invoice_status(invoice).unwrap(), InvoiceStatus::Closed);
        assert_eq!(account.balances().credit, Money::from_pence(2_000));
    }

    #[test]
    fn test_reversal_is_symmetric() {
        let mut account = new_account();
        let first = raise_s2(&mut account, 10_000, date(2024, 1, 1));
        let second = raise_s2(&mut account, 5_000, date(2024, 2, 1));
        let before = account.balances();

        let payment = account
            .apply_payment(
                TransactionType::DirectDebitPayment,
                Money::from_pence(13_000),
                date(2024, 3, 1),
                UserId::new(),
            )
            .unwrap();
        account.reverse_payment(payment, UserId::new()).unwrap();

        let after = account.balances();
        assert_eq!(before, after);
        assert_eq!(
            account.invoice_balance(first).unwrap(),
            Money::from_pence(10_000)
        );
        assert_eq!(
            account.invoice_balance(second).unwrap(),
            Money::from_pence(5_000)
        );
    }

    #[test]
    fn test_reversal_recovers_credit_reapplied_to_later_invoice() {
        let mut account = new_account();
        let first = raise_s2(&mut account, 10_000, date(2024, 1, 1));
        let payment = account
            .apply_payment(
                TransactionType::MotoCardPayment,
                Money::from_pence(13_000),
                date(2024, 2, 1),
                UserId::new(),
            )
            .unwrap();
        // the excess covers the next invoice on raising
        let second = raise_s2(&mut account, 2_000, date(2024, 3, 1));
        assert_eq!(account.invoice_status(second).unwrap(), InvoiceStatus::Closed);
        assert_eq!(account.balances().credit, Money::from_pence(1_000));

        account.reverse_payment(payment, UserId::new()).unwrap();

        assert_eq!(
            account.invoice_balance(first).unwrap(),
            Money::from_pence(10_000)
        );
        assert_eq!(
            account.invoice_balance(second).unwrap(),
            Money::from_pence(2_000)
        );
        assert_eq!(account.balances().credit, Money::zero());
        account.verify().unwrap();
    }

    #[test]
    fn test_reversal_rejected_whole_when_credit_is_reserved() {
        let mut account = new_account();
        raise_s2(&mut account, 10_000, date(2024, 1, 1));
        let payment = account
            .apply_payment(
                TransactionType::MotoCardPayment,
                Money::from_pence(13_000),
                date(2024, 2, 1),
                UserId::new(),
            )
            .unwrap();
        account
            .create_refund(
                Money::from_pence(3_000),
                bank_details(),
                "Overpayment".to_string(),
                Actor::case_worker(UserId::new()),
                today(),
            )
            .unwrap();
        let before = account.balances();

        // the refund holds the credit the reversal would need, so nothing
        // may be committed
        assert!(account.reverse_payment(payment, UserId::new()).is_err());
        assert_eq!(account.balances(), before);
        assert_eq!(account.ledger().entries().len(), 2);
        account.verify().unwrap();
    }
}

mod adjustment_scenarios {
    use super::*;

    #[test]
    fn test_adjustment_bound_at_exact_balance() {
        let mut account = new_account();
        let invoice = raise_s2(&mut account, 10_000, date(2024, 1, 1));
        let requester = Actor::case_worker(UserId::new());

        // one penny over the balance is a violation, the exact balance is fine
        assert!(account
            .add_adjustment(
                invoice,
                AdjustmentType::CreditMemo,
                Some(Money::from_pence(10_001)),
                "n".to_string(),
                requester,
            )
            .is_err());
        assert!(account
            .add_adjustment(
                invoice,
                AdjustmentType::CreditMemo,
                Some(Money::from_pence(10_000)),
                "n".to_string(),
                requester,
            )
            .is_ok());
    }

    #[test]
    fn test_rejected_adjustment_changes_nothing() {
        let mut account = new_account();
        let invoice = raise_s2(&mut account, 10_000, date(2024, 1, 1));
        let adjustment = account
            .add_adjustment(
                invoice,
                AdjustmentType::CreditMemo,
                Some(Money::from_pence(5_000)),
                "Disputed".to_string(),
                Actor::case_worker(UserId::new()),
            )
            .unwrap();
        account
            .reject_adjustment(adjustment, Actor::finance_manager(UserId::new()))
            .unwrap();

        assert_eq!(
            account.invoice_balance(invoice).unwrap(),
            Money::from_pence(10_000)
        );
        assert_eq!(account.ledger().entries().len(), 0);
    }

    #[test]
    fn test_write_off_then_full_reversal_round_trips() {
        let mut account = new_account();
        let invoice = raise_s2(&mut account, 10_000, date(2024, 1, 1));
        let requester = Actor::case_worker(UserId::new());
        let manager = Actor::finance_manager(UserId::new());

        let write_off = account
            .add_adjustment(
                invoice,
                AdjustmentType::CreditWriteOff,
                None,
                "Uncollectable".to_string(),
                requester,
            )
            .unwrap();
        account.approve_adjustment(write_off, manager, today()).unwrap();
        assert_eq!(account.invoice_status(invoice).unwrap(), InvoiceStatus::Closed);

        let reversal = account
            .add_adjustment(
                invoice,
                AdjustmentType::WriteOffReversal,
                None,
                "Collectable after all".to_string(),
                requester,
            )
            .unwrap();
        account.approve_adjustment(reversal, manager, today()).unwrap();
        assert_eq!(
            account.invoice_balance(invoice).unwrap(),
            Money::from_pence(10_000)
        );
    }

    #[test]
    fn test_write_off_does_not_consume_credit() {
        let mut account = new_account();
        account
            .apply_payment(
                TransactionType::ChequePayment,
                Money::from_pence(2_000),
                date(2024, 1, 1),
                UserId::new(),
            )
            .unwrap();
        let invoice = raise_s2(&mut account, 10_000, date(2024, 2, 1));
        // the £20 credit reapplied on raise, leaving £80 outstanding
        assert_eq!(
            account.invoice_balance(invoice).unwrap(),
            Money::from_pence(8_000)
        );
        let credit_before = account.balances().credit;

        let write_off = account
            .add_adjustment(
                invoice,
                AdjustmentType::CreditWriteOff,
                None,
                "Uncollectable".to_string(),
                Actor::case_worker(UserId::new()),
            )
            .unwrap();
        account
            .approve_adjustment(write_off, Actor::finance_manager(UserId::new()), today())
            .unwrap();

        assert_eq!(account.invoice_status(invoice).unwrap(), InvoiceStatus::Closed);
        assert_eq!(account.balances().credit, credit_before);
    }
}

mod refund_scenarios {
    use super::*;

    #[test]
    fn test_reserved_credit_cannot_be_reapplied() {
        let mut account = new_account();
        account
            .apply_payment(
                TransactionType::OpgBacsPayment,
                Money::from_pence(10_000),
                date(2024, 1, 1),
                UserId::new(),
            )
            .unwrap();
        account
            .create_refund(
                Money::from_pence(10_000),
                bank_details(),
                "Overpayment".to_string(),
                Actor::case_worker(UserId::new()),
                today(),
            )
            .unwrap();
        assert_eq!(account.balances().credit, Money::zero());

        // a new invoice finds no credit to reapply
        let invoice = raise_s2(&mut account, 5_000, date(2024, 2, 1));
        assert_eq!(
            account.invoice_balance(invoice).unwrap(),
            Money::from_pence(5_000)
        );
    }

    #[test]
    fn test_cancellation_restores_credit() {
        let mut account = new_account();
        account
            .apply_payment(
                TransactionType::OpgBacsPayment,
                Money::from_pence(10_000),
                date(2024, 1, 1),
                UserId::new(),
            )
            .unwrap();
        let refund = account
            .create_refund(
                Money::from_pence(10_000),
                bank_details(),
                "Overpayment".to_string(),
                Actor::case_worker(UserId::new()),
                today(),
            )
            .unwrap();
        account
            .approve_refund(refund, Actor::finance_manager(UserId::new()))
            .unwrap();
        account.cancel_refund(refund).unwrap();
        assert_eq!(account.balances().credit, Money::from_pence(10_000));
    }
}

mod fee_reduction_scenarios {
    use super::*;

    #[test]
    fn test_award_grant_cancel_round_trips() {
        let mut account = new_account();
        let invoice = raise_s2(&mut account, 32_000, date(2024, 5, 1));
        let actor = Actor::case_worker(UserId::new());

        let reduction = account
            .grant_fee_reduction(
                GrantFeeReduction {
                    reduction_type: FeeReductionType::Remission,
                    start_year: 2024,
                    length_of_award: 1,
                    date_received: date(2024, 5, 10),
                    notes: "Low income".to_string(),
                },
                actor,
                today(),
            )
            .unwrap();
        assert_eq!(account.invoice_status(invoice).unwrap(), InvoiceStatus::Closed);

        account
            .cancel_fee_reduction(reduction, "Granted in error".to_string(), actor, today())
            .unwrap();
        assert_eq!(
            account.invoice_balance(invoice).unwrap(),
            Money::from_pence(32_000)
        );
    }

    #[test]
    fn test_invoice_raised_inside_active_award_is_credited() {
        let mut account = new_account();
        let actor = Actor::case_worker(UserId::new());
        account
            .grant_fee_reduction(
                GrantFeeReduction {
                    reduction_type: FeeReductionType::Exemption,
                    start_year: 2024,
                    length_of_award: 1,
                    date_received: date(2024, 5, 10),
                    notes: "Exempt".to_string(),
                },
                actor,
                today(),
            )
            .unwrap();

        let invoice = raise_s2(&mut account, 32_000, date(2024, 7, 1));
        assert_eq!(account.invoice_status(invoice).unwrap(), InvoiceStatus::Closed);
        assert_eq!(account.balances().credit, Money::zero());
    }
}

mod history_scenarios {
    use super::*;

    #[test]
    fn test_full_lifecycle_history_balances() {
        let mut account = new_account();
        raise_s2(&mut account, 10_000, date(2024, 1, 1));
        account
            .apply_payment(
                TransactionType::MotoCardPayment,
                Money::from_pence(4_000),
                date(2024, 2, 1),
                UserId::new(),
            )
            .unwrap();
        account
            .apply_payment(
                TransactionType::MotoCardPayment,
                Money::from_pence(6_000),
                date(2024, 3, 1),
                UserId::new(),
            )
            .unwrap();

        let history = billing_history(&account);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].outstanding_after, Money::zero());
        assert_eq!(history[1].outstanding_after, Money::from_pence(6_000));
        assert_eq!(history[2].outstanding_after, Money::from_pence(10_000));
    }
}

mod invariant_proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Raise(i64),
        Pay(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (100i64..50_000i64).prop_map(Op::Raise),
            (100i64..50_000i64).prop_map(Op::Pay),
        ]
    }

    proptest! {
        // money in == money applied + credit, whatever the interleaving
        #[test]
        fn account_conserves_money(ops in proptest::collection::vec(op_strategy(), 1..20)) {
            let mut account = new_account();
            let mut raised = Money::zero();
            let mut paid = Money::zero();
            let mut day = date(2024, 1, 1);
            for op in ops {
                day = day.succ_opt().unwrap();
                match op {
                    Op::Raise(amount) => {
                        raise_s2(&mut account, amount, day);
                        raised += Money::from_pence(amount);
                    }
                    Op::Pay(amount) => {
                        account
                            .apply_payment(
                                TransactionType::MotoCardPayment,
                                Money::from_pence(amount),
                                day,
                                UserId::new(),
                            )
                            .unwrap();
                        paid += Money::from_pence(amount);
                    }
                }
                let balances = account.balances();
                prop_assert!(balances.credit >= Money::zero());
                prop_assert!(balances.outstanding >= Money::zero());
                prop_assert_eq!(raised - balances.outstanding, paid - balances.credit);
            }
        }
    }
}
