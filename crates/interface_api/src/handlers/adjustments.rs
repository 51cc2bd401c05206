//! Adjustment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use core_kernel::{AdjustmentId, ClientId, InvoiceId};
use domain_billing::Actor;

use crate::dto::billing::{
    AddAdjustmentRequest, AdjustmentResponse, Decision, DecisionRequest,
    PermittedAdjustmentsResponse,
};
use crate::error::ApiError;
use crate::AppState;

pub async fn permitted_adjustments(
    State(state): State<AppState>,
    Path((client_id, invoice_id)): Path<(ClientId, InvoiceId)>,
) -> Result<Json<PermittedAdjustmentsResponse>, ApiError> {
    let record = state.client(client_id).await?;
    let record = record.lock().await;
    let adjustment_types = record.account.permitted_adjustments(invoice_id)?;
    Ok(Json(PermittedAdjustmentsResponse { adjustment_types }))
}

pub async fn add_adjustment(
    State(state): State<AppState>,
    Path((client_id, invoice_id)): Path<(ClientId, InvoiceId)>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<AddAdjustmentRequest>,
) -> Result<(StatusCode, Json<AdjustmentResponse>), ApiError> {
    let record = state.client(client_id).await?;
    let mut record = record.lock().await;
    let adjustment_id = record.account.add_adjustment(
        invoice_id,
        request.adjustment_type,
        request.amount,
        request.notes,
        actor,
    )?;
    let response = adjustment_response(&record.account, adjustment_id)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn decide_adjustment(
    State(state): State<AppState>,
    Path((client_id, adjustment_id)): Path<(ClientId, AdjustmentId)>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<AdjustmentResponse>, ApiError> {
    let record = state.client(client_id).await?;
    let mut record = record.lock().await;
    match request.decision {
        Decision::Approved => {
            record
                .account
                .approve_adjustment(adjustment_id, actor, Utc::now().date_naive())?;
        }
        Decision::Rejected => {
            record.account.reject_adjustment(adjustment_id, actor)?;
        }
    }
    let response = adjustment_response(&record.account, adjustment_id)?;
    Ok(Json(response))
}

fn adjustment_response(
    account: &domain_billing::FinanceAccount,
    adjustment_id: AdjustmentId,
) -> Result<AdjustmentResponse, ApiError> {
    let adjustment = account
        .adjustments()
        .iter()
        .find(|a| a.id == adjustment_id)
        .ok_or_else(|| ApiError::NotFound(format!("Adjustment {adjustment_id}")))?;
    Ok(AdjustmentResponse {
        id: adjustment.id,
        invoice_id: adjustment.invoice_id,
        adjustment_type: adjustment.adjustment_type,
        amount: adjustment.amount,
        status: adjustment.status,
        notes: adjustment.notes.clone(),
    })
}
