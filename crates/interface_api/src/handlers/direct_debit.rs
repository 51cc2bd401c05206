//! Direct debit mandate handlers
//!
//! The mandate exchange with the provider runs while the client record is
//! locked, so a collection trigger can never observe a half-committed
//! instruction. Provider failure leaves the record untouched.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use core_kernel::{ClientId, MandateBankDetails};
use domain_billing::PaymentMethod;
use domain_direct_debit::{cancel_mandate, register_mandate, schedule_collection, ScheduleStatus};

use crate::dto::direct_debit::{CreateMandateRequest, MandateResponse};
use crate::error::ApiError;
use crate::AppState;

pub async fn create_mandate(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
    Json(request): Json<CreateMandateRequest>,
) -> Result<(StatusCode, Json<MandateResponse>), ApiError> {
    let record = state.client(client_id).await?;
    let mut held = record.lock().await;
    let record = &mut *held;
    if record.direct_debit.active_instruction().is_some() {
        return Err(ApiError::BadRequest(
            "An active direct debit instruction already exists".to_string(),
        ));
    }
    let court_reference = record.account.court_reference.clone();
    let surname = record.surname.clone();
    let instruction = register_mandate(
        state.registrar.as_ref(),
        &court_reference,
        &surname,
        MandateBankDetails {
            account_name: request.account_name,
            sort_code: request.sort_code,
            account_number: request.account_number,
        },
    )
    .await?;
    let response = MandateResponse {
        id: instruction.id,
        status: instruction.status,
    };
    record.direct_debit.instruction = Some(instruction);
    record.account.set_payment_method(PaymentMethod::DirectDebit);
    schedule_collection(
        &record.account,
        &mut record.direct_debit,
        Utc::now().date_naive(),
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// Cancels the instruction and reverts to demanded payments
///
/// Collections already taken stay on the ledger.
pub async fn cancel_instruction(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
) -> Result<Json<MandateResponse>, ApiError> {
    let record = state.client(client_id).await?;
    let mut record = record.lock().await;
    let court_reference = record.account.court_reference.clone();
    let Some(instruction) = record.direct_debit.instruction.as_mut() else {
        return Err(ApiError::NotFound(
            "No direct debit instruction for this client".to_string(),
        ));
    };
    cancel_mandate(state.registrar.as_ref(), &court_reference, instruction).await?;
    let response = MandateResponse {
        id: instruction.id,
        status: instruction.status,
    };
    record.account.set_payment_method(PaymentMethod::Demanded);
    record
        .direct_debit
        .schedules
        .retain(|s| s.status != ScheduleStatus::Scheduled);
    Ok(Json(response))
}
