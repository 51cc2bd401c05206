//! Test Data Builders
//!
//! Builds finance accounts in known states so tests specify only the parts
//! they care about. Every builder step goes through the real domain
//! operations, so a built account always satisfies the ledger invariants.

use chrono::NaiveDate;
use core_kernel::{ClientId, InvoiceId, Money};
use domain_billing::{
    Actor, FeeType, FinanceAccount, PaymentMethod, RaiseInvoice, SupervisionLevel, TransactionType,
};

use crate::fixtures::{ActorFixtures, DateFixtures, IdFixtures};

/// Builder for a finance account with invoices and payments already posted
pub struct TestAccountBuilder {
    client_id: ClientId,
    court_reference: String,
    payment_method: PaymentMethod,
    today: NaiveDate,
    actor: Actor,
    steps: Vec<Step>,
}

enum Step {
    Invoice(RaiseInvoice),
    Payment(Money, NaiveDate),
}

impl Default for TestAccountBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAccountBuilder {
    pub fn new() -> Self {
        Self {
            client_id: IdFixtures::client_id(),
            court_reference: "12345678".to_string(),
            payment_method: PaymentMethod::Demanded,
            today: DateFixtures::today(),
            actor: ActorFixtures::case_worker(),
            steps: Vec::new(),
        }
    }

    pub fn with_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_court_reference(mut self, reference: impl Into<String>) -> Self {
        self.court_reference = reference.into();
        self
    }

    pub fn on_direct_debit(mut self) -> Self {
        self.payment_method = PaymentMethod::DirectDebit;
        self
    }

    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Queues an assessment invoice raised on the given date
    pub fn with_assessment_invoice(mut self, raised_date: NaiveDate) -> Self {
        self.steps.push(Step::Invoice(RaiseInvoice {
            fee_type: FeeType::AD,
            amount: None,
            raised_date: Some(raised_date),
            start_date: None,
            end_date: None,
            supervision_level: None,
        }));
        self
    }

    /// Queues a general supervision invoice covering the year before the
    /// raised date
    pub fn with_supervision_invoice(mut self, amount: Money, raised_date: NaiveDate) -> Self {
        self.steps.push(Step::Invoice(RaiseInvoice {
            fee_type: FeeType::S2,
            amount: Some(amount),
            raised_date: Some(raised_date),
            start_date: Some(raised_date - chrono::Days::new(365)),
            end_date: Some(raised_date),
            supervision_level: Some(SupervisionLevel::General),
        }));
        self
    }

    /// Queues a MOTO card payment received on the given date
    pub fn with_payment(mut self, amount: Money, received_date: NaiveDate) -> Self {
        self.steps.push(Step::Payment(amount, received_date));
        self
    }

    /// Replays the queued steps through the domain operations
    ///
    /// Returns the account and the invoice ids in the order they were raised.
    pub fn build(self) -> (FinanceAccount, Vec<InvoiceId>) {
        let mut account = FinanceAccount::new(self.client_id, self.court_reference);
        account.set_payment_method(self.payment_method);
        let mut invoice_ids = Vec::new();
        for step in self.steps {
            match step {
                Step::Invoice(params) => {
                    let id = account
                        .raise_invoice(params, self.actor, self.today)
                        .expect("builder invoice should be valid");
                    invoice_ids.push(id);
                }
                Step::Payment(amount, received) => {
                    account
                        .apply_payment(
                            TransactionType::MotoCardPayment,
                            amount,
                            received,
                            self.actor.user_id,
                        )
                        .expect("builder payment should be valid");
                }
            }
        }
        (account, invoice_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::{assert_balanced, assert_credit, assert_outstanding};
    use crate::fixtures::{DateFixtures, MoneyFixtures};

    #[test]
    fn test_built_account_satisfies_invariants() {
        let (account, invoice_ids) = TestAccountBuilder::new()
            .with_assessment_invoice(DateFixtures::date(2024, 3, 1))
            .with_supervision_invoice(MoneyFixtures::general_fee(), DateFixtures::date(2024, 4, 1))
            .with_payment(MoneyFixtures::partial_payment(), DateFixtures::date(2024, 5, 1))
            .build();

        assert_eq!(invoice_ids.len(), 2);
        assert_outstanding(&account, Money::from_pence(37_000));
        assert_credit(&account, Money::zero());
        assert_balanced(&account);
    }

    #[test]
    fn test_overpayment_is_held_as_credit() {
        let (account, _) = TestAccountBuilder::new()
            .with_assessment_invoice(DateFixtures::date(2024, 3, 1))
            .with_payment(Money::from_pence(12_500), DateFixtures::date(2024, 5, 1))
            .build();

        assert_outstanding(&account, Money::zero());
        assert_credit(&account, Money::from_pence(2_500));
    }
}
