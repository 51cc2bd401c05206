//! Fee reduction handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use core_kernel::{ClientId, FeeReductionId};
use domain_billing::{Actor, GrantFeeReduction};

use crate::dto::billing::{
    CancelFeeReductionRequest, FeeReductionResponse, GrantFeeReductionRequest,
};
use crate::error::ApiError;
use crate::AppState;

pub async fn grant_fee_reduction(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<GrantFeeReductionRequest>,
) -> Result<(StatusCode, Json<FeeReductionResponse>), ApiError> {
    let today = Utc::now().date_naive();
    let record = state.client(client_id).await?;
    let mut record = record.lock().await;
    let reduction_id = record.account.grant_fee_reduction(
        GrantFeeReduction {
            reduction_type: request.reduction_type,
            start_year: request.start_year,
            length_of_award: request.length_of_award,
            date_received: request.date_received,
            notes: request.notes,
        },
        actor,
        today,
    )?;
    let response = fee_reduction_response(&record.account, reduction_id)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn cancel_fee_reduction(
    State(state): State<AppState>,
    Path((client_id, reduction_id)): Path<(ClientId, FeeReductionId)>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CancelFeeReductionRequest>,
) -> Result<Json<FeeReductionResponse>, ApiError> {
    let today = Utc::now().date_naive();
    let record = state.client(client_id).await?;
    let mut record = record.lock().await;
    record
        .account
        .cancel_fee_reduction(reduction_id, request.cancellation_reason, actor, today)?;
    let response = fee_reduction_response(&record.account, reduction_id)?;
    Ok(Json(response))
}

fn fee_reduction_response(
    account: &domain_billing::FinanceAccount,
    reduction_id: FeeReductionId,
) -> Result<FeeReductionResponse, ApiError> {
    let today = Utc::now().date_naive();
    let reduction = account
        .fee_reductions()
        .iter()
        .find(|r| r.id == reduction_id)
        .ok_or_else(|| ApiError::NotFound(format!("Fee reduction {reduction_id}")))?;
    Ok(FeeReductionResponse {
        id: reduction.id,
        reduction_type: reduction.reduction_type,
        start_date: reduction.start_date,
        end_date: reduction.end_date,
        status: reduction.status(today),
        notes: reduction.notes.clone(),
    })
}
