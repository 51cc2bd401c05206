//! Client account handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use core_kernel::ClientId;
use domain_billing::{billing_history, HistoryLine};

use crate::dto::billing::{AccountSummaryResponse, CreateClientRequest, CreateClientResponse};
use crate::error::ApiError;
use crate::AppState;

pub async fn create_client(
    State(state): State<AppState>,
    Json(request): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<CreateClientResponse>), ApiError> {
    if request.court_reference.trim().is_empty() {
        return Err(ApiError::BadRequest("Enter a court reference".to_string()));
    }
    let client_id = state
        .registry
        .create(request.court_reference, request.surname)
        .await
        .map_err(ApiError::BadRequest)?;
    Ok((StatusCode::CREATED, Json(CreateClientResponse { client_id })))
}

pub async fn get_account_summary(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
) -> Result<Json<AccountSummaryResponse>, ApiError> {
    let record = state.client(client_id).await?;
    let record = record.lock().await;
    let balances = record.account.balances();
    Ok(Json(AccountSummaryResponse {
        client_id,
        court_reference: record.account.court_reference.clone(),
        payment_method: record.account.payment_method,
        outstanding_balance: balances.outstanding,
        credit_balance: balances.credit,
    }))
}

pub async fn get_billing_history(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
) -> Result<Json<Vec<HistoryLine>>, ApiError> {
    let record = state.client(client_id).await?;
    let record = record.lock().await;
    Ok(Json(billing_history(&record.account)))
}
