//! Invoice handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use core_kernel::ClientId;
use domain_billing::Actor;
use domain_direct_debit::schedule_collection;

use crate::dto::billing::{InvoiceResponse, RaiseInvoiceRequest};
use crate::error::ApiError;
use crate::AppState;

pub async fn raise_invoice(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RaiseInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    let record = state.client(client_id).await?;
    let mut held = record.lock().await;
    let record = &mut *held;
    let today = Utc::now().date_naive();
    let invoice_id = record.account.raise_invoice(request.into(), actor, today)?;
    schedule_collection(&record.account, &mut record.direct_debit, today);
    let invoice = record.account.invoice(invoice_id)?;
    let response = InvoiceResponse::project(&record.account, invoice);
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
) -> Result<Json<Vec<InvoiceResponse>>, ApiError> {
    let record = state.client(client_id).await?;
    let record = record.lock().await;
    let invoices = record
        .account
        .invoices()
        .iter()
        .map(|invoice| InvoiceResponse::project(&record.account, invoice))
        .collect();
    Ok(Json(invoices))
}
