//! Refund handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use core_kernel::{ClientId, RefundId};
use domain_billing::{Actor, BankDetails};

use crate::dto::billing::{CreateRefundRequest, Decision, DecisionRequest, RefundResponse};
use crate::error::ApiError;
use crate::AppState;

pub async fn create_refund(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateRefundRequest>,
) -> Result<(StatusCode, Json<RefundResponse>), ApiError> {
    let record = state.client(client_id).await?;
    let mut record = record.lock().await;
    let refund_id = record.account.create_refund(
        request.amount,
        BankDetails {
            account_name: request.account_name,
            sort_code: request.sort_code,
            account_number: request.account_number,
        },
        request.notes,
        actor,
        Utc::now().date_naive(),
    )?;
    let refund = record.account.refund(refund_id)?;
    let response = RefundResponse::project(refund, actor.finance_manager);
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_refunds(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<RefundResponse>>, ApiError> {
    let record = state.client(client_id).await?;
    let record = record.lock().await;
    let refunds = record
        .account
        .refunds()
        .iter()
        .map(|refund| RefundResponse::project(refund, actor.finance_manager))
        .collect();
    Ok(Json(refunds))
}

pub async fn decide_refund(
    State(state): State<AppState>,
    Path((client_id, refund_id)): Path<(ClientId, RefundId)>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<RefundResponse>, ApiError> {
    let record = state.client(client_id).await?;
    let mut record = record.lock().await;
    match request.decision {
        Decision::Approved => record.account.approve_refund(refund_id, actor)?,
        Decision::Rejected => record.account.reject_refund(refund_id, actor)?,
    }
    let refund = record.account.refund(refund_id)?;
    Ok(Json(RefundResponse::project(refund, actor.finance_manager)))
}

/// Marks an approved refund as sent to the payment run
pub async fn start_processing(
    State(state): State<AppState>,
    Path((client_id, refund_id)): Path<(ClientId, RefundId)>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<RefundResponse>, ApiError> {
    let record = state.client(client_id).await?;
    let mut record = record.lock().await;
    record.account.start_refund_processing(refund_id)?;
    let refund = record.account.refund(refund_id)?;
    Ok(Json(RefundResponse::project(refund, actor.finance_manager)))
}

pub async fn cancel_refund(
    State(state): State<AppState>,
    Path((client_id, refund_id)): Path<(ClientId, RefundId)>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<RefundResponse>, ApiError> {
    let record = state.client(client_id).await?;
    let mut record = record.lock().await;
    record.account.cancel_refund(refund_id)?;
    let refund = record.account.refund(refund_id)?;
    Ok(Json(RefundResponse::project(refund, actor.finance_manager)))
}
