//! Bulk upload processing
//!
//! Uploaded files are base64-encoded CSVs. Rows are processed one at a time
//! against the owning account; a bad row is recorded against its line number
//! and processing continues, so one mistyped reference never blocks a whole
//! payment run. The collected failures go back to the uploader by email.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDate;
use core_kernel::{Money, UserId};
use domain_billing::{RefundStatus, TransactionType};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::dto::admin::{UploadRequest, UploadType};
use crate::error::ApiError;
use crate::registry::Registry;

/// Ledger author for entries created by file processing
pub fn system_user() -> UserId {
    UserId::from_uuid(Uuid::nil())
}

/// Splits one CSV row, honouring double-quoted fields
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

struct Row {
    court_reference: String,
    amount: Money,
    date: Option<NaiveDate>,
}

fn parse_row(line: &str) -> Result<Row, String> {
    let fields = split_row(line);
    if fields.len() < 2 {
        return Err("Expected at least a court reference and an amount".to_string());
    }
    if fields[0].is_empty() {
        return Err("Missing court reference".to_string());
    }
    // quoted amounts carry thousand grouping
    let amount = Money::parse_decimal(&fields[1].replace(',', "")).map_err(|e| e.to_string())?;
    if !amount.is_positive() {
        return Err(format!("Amount must be above zero, got {}", fields[1]));
    }
    let date = match fields.get(2).filter(|d| !d.is_empty()) {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| format!("Invalid date {raw}, expected YYYY-MM-DD"))?,
        ),
        None => None,
    };
    Ok(Row {
        court_reference: fields[0].clone(),
        amount,
        date,
    })
}

/// Processes an uploaded file, returning the count of applied rows and the
/// failures keyed by line number
pub async fn process_upload(
    registry: &Registry,
    upload: &UploadRequest,
    today: NaiveDate,
) -> Result<(usize, BTreeMap<usize, String>), ApiError> {
    let decoded = BASE64
        .decode(&upload.data)
        .map_err(|_| ApiError::BadRequest("Upload data is not valid base64".to_string()))?;
    let content = String::from_utf8(decoded)
        .map_err(|_| ApiError::BadRequest("Upload data is not valid UTF-8".to_string()))?;

    let mut processed = 0usize;
    let mut failed_lines = BTreeMap::new();

    // line 0 is the header
    for (index, line) in content.lines().enumerate() {
        if index == 0 || line.trim().is_empty() {
            continue;
        }
        match apply_row(registry, upload, line, today).await {
            Ok(()) => processed += 1,
            Err(reason) => {
                failed_lines.insert(index, reason);
            }
        }
    }

    info!(
        upload_type = upload.upload_type.key(),
        processed,
        failed = failed_lines.len(),
        "upload processed"
    );
    Ok((processed, failed_lines))
}

async fn apply_row(
    registry: &Registry,
    upload: &UploadRequest,
    line: &str,
    today: NaiveDate,
) -> Result<(), String> {
    let row = parse_row(line)?;
    let record = registry
        .find_by_court_reference(&row.court_reference)
        .await
        .ok_or_else(|| format!("No client with court reference {}", row.court_reference))?;
    let mut record = record.lock().await;
    let received_date = row.date.or(upload.upload_date).unwrap_or(today);

    match upload.upload_type {
        UploadType::PaymentsMotoCard => {
            record
                .account
                .apply_payment(
                    TransactionType::MotoCardPayment,
                    row.amount,
                    received_date,
                    system_user(),
                )
                .map_err(|e| e.to_string())?;
        }
        UploadType::FulfilledRefunds => {
            let refund_id = record
                .account
                .refunds()
                .iter()
                .find(|r| {
                    r.amount == row.amount
                        && matches!(r.status, RefundStatus::Approved | RefundStatus::Processing)
                })
                .map(|r| r.id)
                .ok_or_else(|| {
                    format!("No approved refund of {} to fulfil", row.amount)
                })?;
            record.account.fulfil_refund(refund_id).map_err(|e| e.to_string())?;
        }
        UploadType::ReverseFulfilledRefunds => {
            let refund_id = record
                .account
                .refunds()
                .iter()
                .find(|r| r.amount == row.amount && r.status == RefundStatus::Fulfilled)
                .map(|r| r.id)
                .ok_or_else(|| {
                    format!("No fulfilled refund of {} to reverse", row.amount)
                })?;
            record
                .account
                .reverse_fulfilled_refund(refund_id, system_user(), received_date)
                .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}
