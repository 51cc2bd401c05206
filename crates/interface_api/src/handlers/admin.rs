//! Events, reports and uploads handlers
//!
//! Trigger events fan out across every client record. Delivery is at least
//! once, so each (trigger, date, client) key passes through the dedupe store
//! before any ledger mutation; a replay is logged and skipped.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use core_kernel::Notification;
use domain_billing::ValidationReport;
use domain_direct_debit::{
    override_date_in_window, process_collection, process_failed_collection, ScheduledTrigger,
};
use tracing::{info, warn};

use crate::dto::admin::{EventRequest, ReportRequest, UploadRequest, UploadResponse};
use crate::error::ApiError;
use crate::uploads::{process_upload, system_user};
use crate::AppState;

const SCHEDULED_EVENT: &str = "scheduled-event";
const UPLOAD_EVENT: &str = "finance-admin-upload";

pub async fn post_event(
    State(state): State<AppState>,
    Json(request): Json<EventRequest>,
) -> Result<StatusCode, ApiError> {
    match request.detail_type.as_str() {
        SCHEDULED_EVENT => {
            let trigger = request.detail.trigger.ok_or_else(|| {
                ApiError::BadRequest("Scheduled event carries no trigger".to_string())
            })?;
            let today = Utc::now().date_naive();
            let date = request
                .detail
                .date_override
                .map(|o| o.date)
                .unwrap_or(today);
            if !override_date_in_window(date, today) {
                return Err(ApiError::BadRequest(format!(
                    "Override date {date} is outside the processing window"
                )));
            }
            run_trigger(&state, trigger, date).await?;
            Ok(StatusCode::OK)
        }
        UPLOAD_EVENT => {
            let upload = request.detail.upload.ok_or_else(|| {
                ApiError::BadRequest("Upload event carries no upload detail".to_string())
            })?;
            handle_upload(&state, upload).await?;
            Ok(StatusCode::OK)
        }
        other => Err(ApiError::BadRequest(format!(
            "Unknown detail type {other}"
        ))),
    }
}

async fn run_trigger(
    state: &AppState,
    trigger: ScheduledTrigger,
    date: chrono::NaiveDate,
) -> Result<(), ApiError> {
    for (client_id, record) in state.registry.all().await {
        let fresh = state
            .dedupe
            .lock()
            .await
            .check_and_record(trigger, date, client_id);
        if !fresh {
            info!(%client_id, trigger = trigger.key(), %date, "duplicate trigger delivery, skipping");
            continue;
        }
        let mut held = record.lock().await;
        let record = &mut *held;
        let result = match trigger {
            ScheduledTrigger::DirectDebitCollection => process_collection(
                &mut record.account,
                &mut record.direct_debit,
                date,
                system_user(),
            ),
            ScheduledTrigger::FailedDirectDebitCollections => process_failed_collection(
                &mut record.account,
                &mut record.direct_debit,
                date,
                system_user(),
            ),
        };
        // one broken account must not block the rest of the run, and its
        // key must stay free for the redelivery to retry
        if let Err(err) = result {
            warn!(%client_id, trigger = trigger.key(), error = %err, "trigger processing failed");
            state.dedupe.lock().await.forget(trigger, date, client_id);
        }
    }
    Ok(())
}

pub async fn post_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<StatusCode, ApiError> {
    let mut report = ValidationReport::new();
    if request.report_type.trim().is_empty() {
        report.add("ReportType", "Select a report type");
    }
    if request.email.trim().is_empty() {
        report.add("Email", "Enter an email address");
    }
    if !report.is_empty() {
        return Err(ApiError::Validation(report));
    }

    // generation is out of band; the requester is notified when it lands
    let notifier = state.notifier.clone();
    let email = request.email.clone();
    let report_type = request.report_type.clone();
    tokio::spawn(async move {
        if let Err(err) = notifier
            .send(&email, Notification::ReportReady { report_type })
            .await
        {
            warn!(error = %err, "report notification failed");
        }
    });
    Ok(StatusCode::CREATED)
}

pub async fn post_upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    handle_upload(&state, request).await
}

async fn handle_upload(
    state: &AppState,
    upload: UploadRequest,
) -> Result<Json<UploadResponse>, ApiError> {
    if upload.email_address.trim().is_empty() {
        return Err(ApiError::BadRequest("Enter an email address".to_string()));
    }
    let today = Utc::now().date_naive();
    let (processed, failed_lines) = process_upload(&state.registry, &upload, today).await?;

    let notification = Notification::UploadProcessed {
        upload_type: upload.upload_type.key().to_string(),
        failed_lines: failed_lines.clone(),
    };
    let notifier = state.notifier.clone();
    let email = upload.email_address.clone();
    tokio::spawn(async move {
        if let Err(err) = notifier.send(&email, notification).await {
            warn!(error = %err, "upload notification failed");
        }
    });

    Ok(Json(UploadResponse {
        processed,
        failed_lines,
    }))
}
