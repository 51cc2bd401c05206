//! Events, reports and uploads DTOs
//!
//! The events body mirrors the bridge's envelope: scheduled triggers carry a
//! date override, and the admin tool's upload events carry the upload fields
//! inline in the detail block.

use chrono::NaiveDate;
use domain_direct_debit::ScheduledTrigger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub source: String,
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    pub detail: EventDetail,
}

#[derive(Debug, Deserialize)]
pub struct EventDetail {
    pub trigger: Option<ScheduledTrigger>,
    #[serde(rename = "override")]
    pub date_override: Option<DateOverride>,
    #[serde(flatten)]
    pub upload: Option<UploadRequest>,
}

#[derive(Debug, Deserialize)]
pub struct DateOverride {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadType {
    PaymentsMotoCard,
    FulfilledRefunds,
    ReverseFulfilledRefunds,
}

impl UploadType {
    pub fn key(&self) -> &'static str {
        match self {
            UploadType::PaymentsMotoCard => "PAYMENTS_MOTO_CARD",
            UploadType::FulfilledRefunds => "FULFILLED_REFUNDS",
            UploadType::ReverseFulfilledRefunds => "REVERSE_FULFILLED_REFUNDS",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Base64-encoded CSV
    pub data: String,
    pub email_address: String,
    pub upload_type: UploadType,
    pub upload_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub processed: usize,
    pub failed_lines: BTreeMap<usize, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportRequest {
    pub report_type: String,
    pub email: String,
}
