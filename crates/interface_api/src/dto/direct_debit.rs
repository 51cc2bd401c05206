//! Direct debit request/response DTOs

use core_kernel::MandateId;
use domain_direct_debit::InstructionStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMandateRequest {
    pub account_name: String,
    pub sort_code: String,
    pub account_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MandateResponse {
    pub id: MandateId,
    pub status: InstructionStatus,
}
