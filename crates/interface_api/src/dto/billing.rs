//! Billing request/response DTOs

use chrono::NaiveDate;
use core_kernel::{AdjustmentId, ClientId, FeeReductionId, InvoiceId, Money, RefundId};
use domain_billing::{
    AdjustmentStatus, AdjustmentType, FeeReductionStatus, FeeReductionType, FeeType,
    FinanceAccount, Invoice, InvoiceStatus, PaymentMethod, RaiseInvoice, Refund, RefundStatus,
    SupervisionLevel,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    pub court_reference: String,
    pub surname: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientResponse {
    pub client_id: ClientId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummaryResponse {
    pub client_id: ClientId,
    pub court_reference: String,
    pub payment_method: PaymentMethod,
    pub outstanding_balance: Money,
    pub credit_balance: Money,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseInvoiceRequest {
    pub fee_type: FeeType,
    /// Pence
    pub amount: Option<Money>,
    pub raised_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub supervision_level: Option<SupervisionLevel>,
}

impl From<RaiseInvoiceRequest> for RaiseInvoice {
    fn from(req: RaiseInvoiceRequest) -> Self {
        RaiseInvoice {
            fee_type: req.fee_type,
            amount: req.amount,
            raised_date: req.raised_date,
            start_date: req.start_date,
            end_date: req.end_date,
            supervision_level: req.supervision_level,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: InvoiceId,
    pub reference: String,
    pub fee_type: FeeType,
    pub amount: Money,
    pub raised_date: NaiveDate,
    pub status: InvoiceStatus,
    pub outstanding: Money,
    pub supervision_level: Option<SupervisionLevel>,
}

impl InvoiceResponse {
    pub fn project(account: &FinanceAccount, invoice: &Invoice) -> Self {
        let outstanding = invoice.amount - account.ledger().invoice_applied(invoice.id);
        Self {
            id: invoice.id,
            reference: invoice.reference.clone(),
            fee_type: invoice.fee_type,
            amount: invoice.amount,
            raised_date: invoice.raised_date,
            status: if outstanding.is_zero() {
                InvoiceStatus::Closed
            } else {
                InvoiceStatus::Unpaid
            },
            outstanding,
            supervision_level: invoice.supervision_level,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermittedAdjustmentsResponse {
    pub adjustment_types: Vec<AdjustmentType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAdjustmentRequest {
    pub adjustment_type: AdjustmentType,
    /// Pence; absent for write-offs
    pub amount: Option<Money>,
    pub notes: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentResponse {
    pub id: AdjustmentId,
    pub invoice_id: InvoiceId,
    pub adjustment_type: AdjustmentType,
    pub amount: Option<Money>,
    pub status: AdjustmentStatus,
    pub notes: String,
}

/// Outcome of an approve/reject decision request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approved,
    Rejected,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantFeeReductionRequest {
    pub reduction_type: FeeReductionType,
    pub start_year: i32,
    pub length_of_award: u8,
    pub date_received: NaiveDate,
    pub notes: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeReductionResponse {
    pub id: FeeReductionId,
    pub reduction_type: FeeReductionType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: FeeReductionStatus,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelFeeReductionRequest {
    pub cancellation_reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefundRequest {
    /// Pence
    pub amount: Money,
    pub account_name: String,
    pub sort_code: String,
    pub account_number: String,
    pub notes: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundBankDetails {
    pub account_name: String,
    pub sort_code: String,
    pub account_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub id: RefundId,
    pub amount: Money,
    pub status: RefundStatus,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_details: Option<RefundBankDetails>,
}

impl RefundResponse {
    /// Bank details appear only while the refund is still payable and only
    /// to finance managers
    pub fn project(refund: &Refund, viewer_is_finance_manager: bool) -> Self {
        let payable = matches!(refund.status, RefundStatus::Pending | RefundStatus::Approved);
        let bank_details = if payable && viewer_is_finance_manager {
            refund.bank_details.as_ref().map(|d| RefundBankDetails {
                account_name: d.account_name.clone(),
                sort_code: d.sort_code.clone(),
                account_number: d.account_number.clone(),
            })
        } else {
            None
        };
        Self {
            id: refund.id,
            amount: refund.amount,
            status: refund.status,
            notes: refund.notes.clone(),
            bank_details,
        }
    }
}
