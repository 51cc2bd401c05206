//! The finance account aggregate
//!
//! One account per supervised client. The account owns its invoices, ledger,
//! adjustments, fee reductions and refunds, and is the only place ledger
//! mutations are composed: every operation validates its guards, builds a
//! full allocation plan, commits it atomically and re-checks the dual
//! balance invariant before returning.
//!
//! Callers must serialize operations per account. The aggregate itself is
//! single-threaded state behind whatever lock the interface layer holds.

use chrono::{NaiveDate, Utc};
use core_kernel::{
    AdjustmentId, ClientId, FeeReductionId, InvoiceId, LedgerEntryId, Money, RefundId, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info};

use crate::adjustment::{Adjustment, AdjustmentType};
use crate::allocation::{mirror_for_reversal, plan_reapply, split_payment, OpenInvoice};
use crate::error::BillingError;
use crate::fee_reduction::{FeeReduction, GrantFeeReduction};
use crate::invoice::{Invoice, InvoiceStatus, RaiseInvoice};
use crate::ledger::{
    Allocation, AllocationStatus, EntryStatus, Ledger, LedgerEntry, TransactionType,
};
use crate::refund::{BankDetails, Refund, RefundStatus};

/// How the client pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Demanded,
    DirectDebit,
}

/// The user performing an operation, with their capability resolved upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub finance_manager: bool,
}

impl Actor {
    pub fn finance_manager(user_id: UserId) -> Self {
        Self {
            user_id,
            finance_manager: true,
        }
    }

    pub fn case_worker(user_id: UserId) -> Self {
        Self {
            user_id,
            finance_manager: false,
        }
    }

    fn require_finance_manager(&self) -> Result<(), BillingError> {
        if self.finance_manager {
            Ok(())
        } else {
            Err(BillingError::business_rule(
                "Only a finance manager can make this decision",
            ))
        }
    }
}

/// Projected account balances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountBalances {
    pub outstanding: Money,
    pub credit: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceAccount {
    pub client_id: ClientId,
    pub court_reference: String,
    pub payment_method: PaymentMethod,
    invoices: Vec<Invoice>,
    ledger: Ledger,
    adjustments: Vec<Adjustment>,
    fee_reductions: Vec<FeeReduction>,
    refunds: Vec<Refund>,
    invoice_sequences: HashMap<String, u32>,
}

impl FinanceAccount {
    pub fn new(client_id: ClientId, court_reference: String) -> Self {
        Self {
            client_id,
            court_reference,
            payment_method: PaymentMethod::Demanded,
            invoices: Vec::new(),
            ledger: Ledger::new(),
            adjustments: Vec::new(),
            fee_reductions: Vec::new(),
            refunds: Vec::new(),
            invoice_sequences: HashMap::new(),
        }
    }

    // Projections

    pub fn invoices(&self) -> &[Invoice] {
        &self.invoices
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn adjustments(&self) -> &[Adjustment] {
        &self.adjustments
    }

    pub fn fee_reductions(&self) -> &[FeeReduction] {
        &self.fee_reductions
    }

    pub fn refunds(&self) -> &[Refund] {
        &self.refunds
    }

    pub fn invoice(&self, invoice_id: InvoiceId) -> Result<&Invoice, BillingError> {
        self.invoices
            .iter()
            .find(|i| i.id == invoice_id)
            .ok_or_else(|| BillingError::not_found(format!("Invoice {invoice_id}")))
    }

    pub fn invoice_balance(&self, invoice_id: InvoiceId) -> Result<Money, BillingError> {
        let invoice = self.invoice(invoice_id)?;
        Ok(invoice.amount - self.ledger.invoice_applied(invoice_id))
    }

    pub fn invoice_status(&self, invoice_id: InvoiceId) -> Result<InvoiceStatus, BillingError> {
        Ok(if self.invoice_balance(invoice_id)?.is_zero() {
            InvoiceStatus::Closed
        } else {
            InvoiceStatus::Unpaid
        })
    }

    pub fn balances(&self) -> AccountBalances {
        let outstanding = self
            .invoices
            .iter()
            .map(|i| i.amount - self.ledger.invoice_applied(i.id))
            .sum();
        AccountBalances {
            outstanding,
            credit: self.ledger.unapplied_credit(),
        }
    }

    /// Unpaid invoices in raised-date order, oldest first
    fn open_invoices(&self) -> Vec<OpenInvoice> {
        let mut open: Vec<(NaiveDate, OpenInvoice)> = self
            .invoices
            .iter()
            .filter_map(|invoice| {
                let balance = invoice.amount - self.ledger.invoice_applied(invoice.id);
                balance.is_positive().then_some((
                    invoice.raised_date,
                    OpenInvoice {
                        invoice_id: invoice.id,
                        balance,
                    },
                ))
            })
            .collect();
        open.sort_by_key(|(raised, _)| *raised);
        open.into_iter().map(|(_, invoice)| invoice).collect()
    }

    fn invoice_amounts(&self) -> Vec<(InvoiceId, Money)> {
        self.invoices.iter().map(|i| (i.id, i.amount)).collect()
    }

    /// Re-checks the dual-balance invariant after a mutation
    ///
    /// A failure here means the aggregate produced an unbalanced plan. It is
    /// a defect, so it is logged at error level for operators and processing
    /// of this account must stop.
    pub fn verify(&self) -> Result<(), BillingError> {
        self.ledger
            .verify_consistency(&self.invoice_amounts())
            .inspect_err(|err| {
                error!(
                    client_id = %self.client_id,
                    error = %err,
                    "ledger consistency failure, halting account"
                );
            })
    }

    fn new_entry(
        &self,
        amount: Money,
        transaction_type: TransactionType,
        received_date: NaiveDate,
        created_by: UserId,
    ) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new(),
            amount,
            transaction_type,
            status: EntryStatus::Confirmed,
            received_date,
            created_at: Utc::now(),
            created_by,
            notes: None,
            reverses: None,
            fee_reduction_id: None,
        }
    }

    // Invoice lifecycle

    /// Raises an invoice, then reapplies any unapplied credit
    pub fn raise_invoice(
        &mut self,
        params: RaiseInvoice,
        actor: Actor,
        today: NaiveDate,
    ) -> Result<InvoiceId, BillingError> {
        let amount = params.validate(today)?;
        let raised_date = params
            .raised_date
            .ok_or_else(|| BillingError::field("raisedDate", "Enter a raised date"))?;

        let sequence = self
            .invoice_sequences
            .entry(params.fee_type.key().to_string())
            .or_insert(0);
        *sequence += 1;
        let reference = Invoice::make_reference(params.fee_type, *sequence, raised_date);

        let invoice = Invoice {
            id: InvoiceId::new(),
            reference: reference.clone(),
            fee_type: params.fee_type,
            amount,
            raised_date,
            start_date: params.start_date.unwrap_or(raised_date),
            end_date: params.end_date.unwrap_or(raised_date),
            supervision_level: params.supervision_level,
            created_at: Utc::now(),
        };
        let invoice_id = invoice.id;
        self.invoices.push(invoice);
        info!(client_id = %self.client_id, %reference, "invoice raised");

        // An active award covers the new invoice before any credit moves
        if let Some(reduction) = self.fee_reductions.iter().find(|r| r.covers(raised_date)) {
            let reduction_id = reduction.id;
            let transaction_type = reduction.reduction_type.transaction_type();
            self.post_fee_reduction_credit(
                reduction_id,
                transaction_type,
                invoice_id,
                amount,
                today,
                actor.user_id,
            )?;
        }

        self.reapply_credit(today, actor.user_id)?;
        self.verify()?;
        Ok(invoice_id)
    }

    /// Moves unapplied credit onto open invoices, oldest first
    fn reapply_credit(&mut self, today: NaiveDate, created_by: UserId) -> Result<(), BillingError> {
        let credit = self.ledger.unapplied_credit();
        if !credit.is_positive() {
            return Ok(());
        }
        let open = self.open_invoices();
        let entry_id = LedgerEntryId::new();
        let (allocations, moved) = plan_reapply(entry_id, credit, &open);
        if !moved.is_positive() {
            return Ok(());
        }
        let mut entry = self.new_entry(moved, TransactionType::CreditReapply, today, created_by);
        entry.id = entry_id;
        entry.notes = Some("Excess credit applied to invoice".to_string());
        self.ledger.append(entry, allocations)?;
        info!(client_id = %self.client_id, amount = %moved, "excess credit reapplied");
        Ok(())
    }

    /// Pulls reapplied credit back off invoices, newest first
    ///
    /// Used when a reversal removes more unapplied credit than the account
    /// still holds. Fails without writing anything when the reapplied credit
    /// cannot cover the shortfall, because the credit has since been
    /// reserved or refunded.
    fn unapply_credit(
        &mut self,
        needed: Money,
        today: NaiveDate,
        created_by: UserId,
    ) -> Result<(), BillingError> {
        let entry_id = LedgerEntryId::new();
        let mut remaining = needed;
        let mut allocations = Vec::new();
        let mut invoice_ids: Vec<InvoiceId> = self.invoices.iter().map(|i| i.id).collect();
        invoice_ids.reverse();
        for invoice_id in invoice_ids {
            if !remaining.is_positive() {
                break;
            }
            let portion = remaining.min(self.ledger.reapplied_credit(invoice_id));
            if !portion.is_positive() {
                continue;
            }
            allocations.push(Allocation {
                entry_id,
                invoice_id: Some(invoice_id),
                amount: -portion,
                status: AllocationStatus::Reapplied,
            });
            remaining -= portion;
        }
        if !remaining.is_zero() {
            return Err(BillingError::business_rule(
                "Credit needed for the reversal has already been spent",
            ));
        }
        allocations.push(Allocation {
            entry_id,
            invoice_id: None,
            amount: needed,
            status: AllocationStatus::Unapplied,
        });
        let mut entry = self.new_entry(-needed, TransactionType::CreditReapply, today, created_by);
        entry.id = entry_id;
        entry.notes = Some("Reapplied credit returned for reversal".to_string());
        self.ledger.append(entry, allocations)?;
        info!(client_id = %self.client_id, amount = %needed, "reapplied credit unapplied");
        Ok(())
    }

    // Payments

    /// Applies an incoming payment through the allocation engine
    pub fn apply_payment(
        &mut self,
        transaction_type: TransactionType,
        amount: Money,
        received_date: NaiveDate,
        created_by: UserId,
    ) -> Result<LedgerEntryId, BillingError> {
        if !transaction_type.is_payment() {
            return Err(BillingError::InvalidEntry(format!(
                "{transaction_type} is not a payment type"
            )));
        }
        if !amount.is_positive() {
            return Err(BillingError::field("amount", "Amount must be above zero"));
        }
        let entry_id = LedgerEntryId::new();
        let allocations = split_payment(entry_id, amount, &self.open_invoices());
        let mut entry = self.new_entry(amount, transaction_type, received_date, created_by);
        entry.id = entry_id;
        self.ledger.append(entry, allocations)?;
        self.verify()?;
        Ok(entry_id)
    }

    /// Reverses a payment entry, reopening the invoices it paid
    pub fn reverse_payment(
        &mut self,
        original_id: LedgerEntryId,
        created_by: UserId,
    ) -> Result<LedgerEntryId, BillingError> {
        let original = self
            .ledger
            .entry(original_id)
            .ok_or_else(|| BillingError::not_found(format!("Ledger entry {original_id}")))?;
        if !original.transaction_type.is_payment() {
            return Err(BillingError::business_rule(
                "Only payment entries can be reversed",
            ));
        }
        if original.status != EntryStatus::Confirmed {
            return Err(BillingError::business_rule(
                "Only confirmed entries can be reversed",
            ));
        }
        let transaction_type = original.transaction_type;
        let amount = original.amount;
        let received_date = original.received_date;

        let entry_id = LedgerEntryId::new();
        let original_allocations = self.ledger.allocations_for_entry(original_id);
        let allocations = mirror_for_reversal(entry_id, &original_allocations);
        let credited: Money = original_allocations
            .iter()
            .filter(|a| a.invoice_id.is_none())
            .map(|a| a.amount)
            .sum();

        // Credit this payment left unapplied may since have been reapplied
        // to later invoices; pull it back off them before removing it
        let shortfall = credited - self.ledger.unapplied_credit();
        if shortfall.is_positive() {
            self.unapply_credit(shortfall, received_date, created_by)?;
        }

        let mut entry = self.new_entry(-amount, transaction_type, received_date, created_by);
        entry.id = entry_id;
        entry.reverses = Some(original_id);
        self.ledger.append(entry, allocations)?;
        self.verify()?;
        Ok(entry_id)
    }

    // Adjustments

    /// Adjustment types currently available on an invoice
    pub fn permitted_adjustments(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<AdjustmentType>, BillingError> {
        let invoice = self.invoice(invoice_id)?;
        let balance = invoice.amount - self.ledger.invoice_applied(invoice_id);
        let mut permitted = Vec::new();
        // An unreversed write-off freezes the invoice: reversal is the only
        // adjustment on offer until it is undone
        if self.reversible_write_off(invoice_id).is_some() {
            permitted.push(AdjustmentType::WriteOffReversal);
        } else {
            permitted.push(AdjustmentType::CreditMemo);
            if balance.is_positive() {
                permitted.push(AdjustmentType::CreditWriteOff);
            }
            if balance < invoice.fee_type.debt_cap() {
                permitted.push(AdjustmentType::DebitMemo);
            }
        }
        if self.reversible_fee_reduction_credit(invoice_id).is_positive() {
            permitted.push(AdjustmentType::FeeReductionReversal);
        }
        Ok(permitted)
    }

    /// The latest confirmed write-off on the invoice that has not been
    /// fully reversed, with the amount still reversible
    fn reversible_write_off(&self, invoice_id: InvoiceId) -> Option<(LedgerEntryId, Money)> {
        let mut written_off = Money::zero();
        let mut latest = None;
        for entry in self.ledger.entries() {
            if entry.status == EntryStatus::Rejected {
                continue;
            }
            let touches_invoice = self
                .ledger
                .allocations_for_entry(entry.id)
                .iter()
                .any(|a| a.invoice_id == Some(invoice_id));
            if !touches_invoice {
                continue;
            }
            match entry.transaction_type {
                TransactionType::WriteOff => {
                    written_off += entry.amount;
                    latest = Some(entry.id);
                }
                TransactionType::WriteOffReversal => written_off -= entry.amount.abs(),
                _ => {}
            }
        }
        latest.filter(|_| written_off.is_positive()).map(|id| (id, written_off))
    }

    /// Fee reduction credit on the invoice not yet reversed
    fn reversible_fee_reduction_credit(&self, invoice_id: InvoiceId) -> Money {
        let mut credit = Money::zero();
        for entry in self.ledger.entries() {
            if entry.status == EntryStatus::Rejected {
                continue;
            }
            let applied: Money = self
                .ledger
                .allocations_for_entry(entry.id)
                .iter()
                .filter(|a| a.invoice_id == Some(invoice_id))
                .map(|a| a.amount)
                .sum();
            if entry.transaction_type.is_fee_reduction()
                || entry.transaction_type == TransactionType::FeeReductionReversal
            {
                credit += applied;
            }
        }
        credit
    }

    /// Proposes an adjustment, validating its bounds against the current
    /// invoice balance
    pub fn add_adjustment(
        &mut self,
        invoice_id: InvoiceId,
        adjustment_type: AdjustmentType,
        amount: Option<Money>,
        notes: String,
        actor: Actor,
    ) -> Result<AdjustmentId, BillingError> {
        let invoice = self.invoice(invoice_id)?;
        let balance = invoice.amount - self.ledger.invoice_applied(invoice_id);
        let debt_cap = invoice.fee_type.debt_cap();

        match adjustment_type {
            AdjustmentType::CreditMemo => {
                let amount = require_amount(amount)?;
                if amount > balance {
                    return Err(BillingError::business_rule(format!(
                        "Credit memo of {amount} exceeds the invoice balance of {balance}"
                    )));
                }
            }
            AdjustmentType::DebitMemo => {
                let amount = require_amount(amount)?;
                if balance + amount > debt_cap {
                    return Err(BillingError::business_rule(format!(
                        "Debit memo would take the balance above the {debt_cap} cap"
                    )));
                }
            }
            AdjustmentType::CreditWriteOff => {
                if !balance.is_positive() {
                    return Err(BillingError::business_rule(
                        "Nothing outstanding to write off",
                    ));
                }
            }
            AdjustmentType::WriteOffReversal => {
                let (_, reversible) = self.reversible_write_off(invoice_id).ok_or_else(|| {
                    BillingError::business_rule("No write-off to reverse on this invoice")
                })?;
                if let Some(amount) = amount {
                    if !actor.finance_manager {
                        return Err(BillingError::business_rule(
                            "Only a finance manager can reinstate a partial amount",
                        ));
                    }
                    if amount > reversible || !amount.is_positive() {
                        return Err(BillingError::business_rule(format!(
                            "Reinstated amount must be between £0.01 and {reversible}"
                        )));
                    }
                }
            }
            AdjustmentType::FeeReductionReversal => {
                let amount = require_amount(amount)?;
                let reversible = self.reversible_fee_reduction_credit(invoice_id);
                if amount > reversible {
                    return Err(BillingError::business_rule(format!(
                        "Only {reversible} of fee reduction credit remains reversible"
                    )));
                }
            }
        }
        if notes.trim().is_empty() {
            return Err(BillingError::field("notes", "Enter a reason"));
        }
        let adjustment =
            Adjustment::new(invoice_id, adjustment_type, amount, notes, actor.user_id);
        let adjustment_id = adjustment.id;
        self.adjustments.push(adjustment);
        Ok(adjustment_id)
    }

    fn adjustment_mut(&mut self, adjustment_id: AdjustmentId) -> Result<&mut Adjustment, BillingError> {
        self.adjustments
            .iter_mut()
            .find(|a| a.id == adjustment_id)
            .ok_or_else(|| BillingError::not_found(format!("Adjustment {adjustment_id}")))
    }

    pub fn reject_adjustment(
        &mut self,
        adjustment_id: AdjustmentId,
        actor: Actor,
    ) -> Result<(), BillingError> {
        actor.require_finance_manager()?;
        self.adjustment_mut(adjustment_id)?.reject(actor.user_id)
    }

    /// Approves a pending adjustment, committing its ledger entry
    pub fn approve_adjustment(
        &mut self,
        adjustment_id: AdjustmentId,
        actor: Actor,
        today: NaiveDate,
    ) -> Result<LedgerEntryId, BillingError> {
        actor.require_finance_manager()?;
        let (invoice_id, adjustment_type, amount) = {
            let adjustment = self
                .adjustments
                .iter()
                .find(|a| a.id == adjustment_id)
                .ok_or_else(|| BillingError::not_found(format!("Adjustment {adjustment_id}")))?;
            if !adjustment.is_decidable() {
                return Err(BillingError::invalid_transition(format!(
                    "Adjustment {adjustment_id} has already been decided"
                )));
            }
            (adjustment.invoice_id, adjustment.adjustment_type, adjustment.amount)
        };

        let balance = self.invoice_balance(invoice_id)?;
        let entry_id = LedgerEntryId::new();
        let (entry_amount, allocations, reverses) = match adjustment_type {
            AdjustmentType::CreditMemo => {
                let amount = require_amount(amount)?;
                let applied = amount.min(balance);
                let mut allocations = Vec::new();
                if applied.is_positive() {
                    allocations.push(Allocation {
                        entry_id,
                        invoice_id: Some(invoice_id),
                        amount: applied,
                        status: AllocationStatus::Allocated,
                    });
                }
                let excess = amount - applied;
                if excess.is_positive() {
                    allocations.push(Allocation {
                        entry_id,
                        invoice_id: None,
                        amount: excess,
                        status: AllocationStatus::Unapplied,
                    });
                }
                (amount, allocations, None)
            }
            AdjustmentType::DebitMemo => {
                let amount = require_amount(amount)?;
                let invoice = self.invoice(invoice_id)?;
                if balance + amount > invoice.fee_type.debt_cap() {
                    return Err(BillingError::business_rule(format!(
                        "Debit memo would take the balance above the {} cap",
                        invoice.fee_type.debt_cap()
                    )));
                }
                (
                    -amount,
                    vec![Allocation {
                        entry_id,
                        invoice_id: Some(invoice_id),
                        amount: -amount,
                        status: AllocationStatus::Allocated,
                    }],
                    None,
                )
            }
            AdjustmentType::CreditWriteOff => {
                if !balance.is_positive() {
                    return Err(BillingError::business_rule(
                        "Nothing outstanding to write off",
                    ));
                }
                (
                    balance,
                    vec![Allocation {
                        entry_id,
                        invoice_id: Some(invoice_id),
                        amount: balance,
                        status: AllocationStatus::Allocated,
                    }],
                    None,
                )
            }
            AdjustmentType::WriteOffReversal => {
                let (original, reversible) =
                    self.reversible_write_off(invoice_id).ok_or_else(|| {
                        BillingError::business_rule("No write-off to reverse on this invoice")
                    })?;
                let reinstated = amount.unwrap_or(reversible);
                if reinstated > reversible || !reinstated.is_positive() {
                    return Err(BillingError::business_rule(format!(
                        "Reinstated amount must be between £0.01 and {reversible}"
                    )));
                }
                (
                    -reinstated,
                    vec![Allocation {
                        entry_id,
                        invoice_id: Some(invoice_id),
                        amount: -reinstated,
                        status: AllocationStatus::Allocated,
                    }],
                    Some(original),
                )
            }
            AdjustmentType::FeeReductionReversal => {
                let amount = require_amount(amount)?;
                let reversible = self.reversible_fee_reduction_credit(invoice_id);
                if amount > reversible {
                    return Err(BillingError::business_rule(format!(
                        "Only {reversible} of fee reduction credit remains reversible"
                    )));
                }
                (
                    -amount,
                    vec![Allocation {
                        entry_id,
                        invoice_id: Some(invoice_id),
                        amount: -amount,
                        status: AllocationStatus::Allocated,
                    }],
                    None,
                )
            }
        };

        self.adjustment_mut(adjustment_id)?.approve(actor.user_id)?;
        let transaction_type = adjustment_type.transaction_type();
        let mut entry = self.new_entry(entry_amount, transaction_type, today, actor.user_id);
        entry.id = entry_id;
        entry.reverses = reverses;
        self.ledger.append(entry, allocations)?;
        self.reapply_credit(today, actor.user_id)?;
        self.verify()?;
        Ok(entry_id)
    }

    // Fee reductions

    fn post_fee_reduction_credit(
        &mut self,
        reduction_id: FeeReductionId,
        transaction_type: TransactionType,
        invoice_id: InvoiceId,
        amount: Money,
        today: NaiveDate,
        created_by: UserId,
    ) -> Result<(), BillingError> {
        if !amount.is_positive() {
            return Ok(());
        }
        let entry_id = LedgerEntryId::new();
        let mut entry = self.new_entry(amount, transaction_type, today, created_by);
        entry.id = entry_id;
        entry.fee_reduction_id = Some(reduction_id);
        self.ledger.append(
            entry,
            vec![Allocation {
                entry_id,
                invoice_id: Some(invoice_id),
                amount,
                status: AllocationStatus::Allocated,
            }],
        )
    }

    /// Grants a fee reduction award and credits every covered invoice
    pub fn grant_fee_reduction(
        &mut self,
        params: GrantFeeReduction,
        actor: Actor,
        today: NaiveDate,
    ) -> Result<FeeReductionId, BillingError> {
        let (start_date, end_date) = params.validate(today)?;
        if let Some(existing) = self
            .fee_reductions
            .iter()
            .find(|r| r.overlaps(start_date, end_date))
        {
            return Err(BillingError::business_rule(format!(
                "Overlaps an existing award running {} to {}",
                existing.start_date, existing.end_date
            )));
        }
        let reduction = FeeReduction {
            id: FeeReductionId::new(),
            reduction_type: params.reduction_type,
            start_date,
            end_date,
            date_received: params.date_received,
            notes: params.notes,
            cancelled: false,
            cancellation_reason: None,
            created_at: Utc::now(),
            created_by: actor.user_id,
        };
        let reduction_id = reduction.id;
        let transaction_type = reduction.reduction_type.transaction_type();
        self.fee_reductions.push(reduction);

        let covered: Vec<(InvoiceId, Money)> = self
            .invoices
            .iter()
            .filter(|i| start_date <= i.raised_date && i.raised_date <= end_date)
            .map(|i| (i.id, i.amount - self.ledger.invoice_applied(i.id)))
            .collect();
        for (invoice_id, balance) in covered {
            self.post_fee_reduction_credit(
                reduction_id,
                transaction_type,
                invoice_id,
                balance,
                today,
                actor.user_id,
            )?;
        }
        self.verify()?;
        info!(client_id = %self.client_id, "fee reduction granted");
        Ok(reduction_id)
    }

    /// Cancels an award and reverses the credit it generated
    pub fn cancel_fee_reduction(
        &mut self,
        reduction_id: FeeReductionId,
        reason: String,
        actor: Actor,
        today: NaiveDate,
    ) -> Result<(), BillingError> {
        if reason.trim().is_empty() {
            return Err(BillingError::field("cancellationReason", "Enter a reason"));
        }
        let reduction = self
            .fee_reductions
            .iter_mut()
            .find(|r| r.id == reduction_id)
            .ok_or_else(|| BillingError::not_found(format!("Fee reduction {reduction_id}")))?;
        reduction.cancel(reason)?;

        let generated: Vec<LedgerEntryId> = self
            .ledger
            .entries()
            .iter()
            .filter(|e| {
                e.fee_reduction_id == Some(reduction_id)
                    && e.status != EntryStatus::Rejected
                    && e.transaction_type.is_fee_reduction()
            })
            .map(|e| e.id)
            .collect();
        for original_id in generated {
            let amount = self
                .ledger
                .entry(original_id)
                .map(|e| e.amount)
                .unwrap_or_default();
            let entry_id = LedgerEntryId::new();
            let original_allocations = self.ledger.allocations_for_entry(original_id);
            let allocations = mirror_for_reversal(entry_id, &original_allocations);
            let mut entry = self.new_entry(
                -amount,
                TransactionType::FeeReductionReversal,
                today,
                actor.user_id,
            );
            entry.id = entry_id;
            entry.reverses = Some(original_id);
            entry.fee_reduction_id = Some(reduction_id);
            self.ledger.append(entry, allocations)?;
        }
        self.verify()?;
        Ok(())
    }

    // Refunds

    /// Creates a refund, reserving the amount out of unapplied credit
    pub fn create_refund(
        &mut self,
        amount: Money,
        bank_details: BankDetails,
        notes: String,
        actor: Actor,
        today: NaiveDate,
    ) -> Result<RefundId, BillingError> {
        bank_details.validate()?;
        if !amount.is_positive() {
            return Err(BillingError::field("amount", "Amount must be above zero"));
        }
        let credit = self.ledger.unapplied_credit();
        if amount > credit {
            return Err(BillingError::business_rule(format!(
                "Refund of {amount} exceeds the credit balance of {credit}"
            )));
        }
        let entry_id = LedgerEntryId::new();
        let mut entry = self.new_entry(-amount, TransactionType::Refund, today, actor.user_id);
        entry.id = entry_id;
        entry.status = EntryStatus::Pending;
        self.ledger.append(
            entry,
            vec![Allocation {
                entry_id,
                invoice_id: None,
                amount: -amount,
                status: AllocationStatus::Unapplied,
            }],
        )?;

        let refund = Refund {
            id: RefundId::new(),
            amount,
            bank_details: Some(bank_details),
            notes,
            status: RefundStatus::Pending,
            reservation_entry: entry_id,
            created_by: actor.user_id,
            created_at: Utc::now(),
            decided_by: None,
            decided_at: None,
        };
        let refund_id = refund.id;
        self.refunds.push(refund);
        self.verify()?;
        Ok(refund_id)
    }

    fn refund_mut(&mut self, refund_id: RefundId) -> Result<&mut Refund, BillingError> {
        self.refunds
            .iter_mut()
            .find(|r| r.id == refund_id)
            .ok_or_else(|| BillingError::not_found(format!("Refund {refund_id}")))
    }

    pub fn refund(&self, refund_id: RefundId) -> Result<&Refund, BillingError> {
        self.refunds
            .iter()
            .find(|r| r.id == refund_id)
            .ok_or_else(|| BillingError::not_found(format!("Refund {refund_id}")))
    }

    pub fn approve_refund(&mut self, refund_id: RefundId, actor: Actor) -> Result<(), BillingError> {
        actor.require_finance_manager()?;
        self.refund_mut(refund_id)?.approve(actor.user_id)
    }

    /// Rejects a pending refund, releasing the reservation
    pub fn reject_refund(&mut self, refund_id: RefundId, actor: Actor) -> Result<(), BillingError> {
        actor.require_finance_manager()?;
        let reservation = {
            let refund = self.refund_mut(refund_id)?;
            refund.reject(actor.user_id)?;
            refund.reservation_entry
        };
        self.ledger.set_entry_status(reservation, EntryStatus::Rejected)?;
        self.verify()
    }

    pub fn start_refund_processing(&mut self, refund_id: RefundId) -> Result<(), BillingError> {
        self.refund_mut(refund_id)?.start_processing()
    }

    /// Cancels an approved or processing refund, restoring the credit
    pub fn cancel_refund(&mut self, refund_id: RefundId) -> Result<(), BillingError> {
        let reservation = {
            let refund = self.refund_mut(refund_id)?;
            refund.cancel()?;
            refund.reservation_entry
        };
        self.ledger.set_entry_status(reservation, EntryStatus::Rejected)?;
        self.verify()
    }

    /// Confirms the refund was paid; the reservation becomes permanent
    pub fn fulfil_refund(&mut self, refund_id: RefundId) -> Result<(), BillingError> {
        let reservation = {
            let refund = self.refund_mut(refund_id)?;
            refund.fulfil()?;
            refund.reservation_entry
        };
        self.ledger.set_entry_status(reservation, EntryStatus::Confirmed)?;
        self.verify()
    }

    /// A fulfilled refund came back; the money returns as unapplied credit
    pub fn reverse_fulfilled_refund(
        &mut self,
        refund_id: RefundId,
        created_by: UserId,
        today: NaiveDate,
    ) -> Result<LedgerEntryId, BillingError> {
        let (amount, reservation) = {
            let refund = self.refund(refund_id)?;
            if refund.status != RefundStatus::Fulfilled {
                return Err(BillingError::invalid_transition(format!(
                    "Refund {refund_id} is not fulfilled"
                )));
            }
            (refund.amount, refund.reservation_entry)
        };
        let entry_id = LedgerEntryId::new();
        let mut entry = self.new_entry(amount, TransactionType::RefundReversal, today, created_by);
        entry.id = entry_id;
        entry.reverses = Some(reservation);
        self.ledger.append(
            entry,
            vec![Allocation {
                entry_id,
                invoice_id: None,
                amount,
                status: AllocationStatus::Unapplied,
            }],
        )?;
        self.verify()?;
        Ok(entry_id)
    }

    pub fn set_payment_method(&mut self, payment_method: PaymentMethod) {
        self.payment_method = payment_method;
    }
}

fn require_amount(amount: Option<Money>) -> Result<Money, BillingError> {
    match amount {
        Some(amount) if amount.is_positive() => Ok(amount),
        Some(_) => Err(BillingError::field("amount", "Amount must be above zero")),
        None => Err(BillingError::field("amount", "Enter an amount")),
    }
}
