//! API error handling
//!
//! Domain errors map onto stable HTTP statuses: aggregated validation
//! failures become 422 with a `validation_errors` map, business rule
//! rejections 400, provider failures 502 (retryable), and a consistency
//! failure 500 since it indicates a defect rather than a bad request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain_billing::{BillingError, ValidationReport};
use domain_direct_debit::DirectDebitError;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(ValidationReport),

    #[error("Provider unavailable: {0}")]
    Provider(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, validation_errors) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Validation(report) => {
                let errors = report
                    .errors
                    .into_iter()
                    .map(|e| (e.field, e.reason))
                    .collect();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "validation_error",
                    "Validation failed".to_string(),
                    Some(errors),
                )
            }
            ApiError::Provider(msg) => (StatusCode::BAD_GATEWAY, "provider_error", msg, None),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            validation_errors,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Validation(report) => ApiError::Validation(report),
            BillingError::NotFound(msg) => ApiError::NotFound(msg),
            BillingError::BusinessRule(_)
            | BillingError::InvalidEntry(_)
            | BillingError::InvalidTransition(_) => ApiError::BadRequest(err.to_string()),
            BillingError::Consistency(_) | BillingError::Money(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<DirectDebitError> for ApiError {
    fn from(err: DirectDebitError) -> Self {
        match err {
            DirectDebitError::Validation(report) => ApiError::Validation(report),
            DirectDebitError::Provider(inner) => ApiError::Provider(inner.to_string()),
            DirectDebitError::NotFound(msg) => ApiError::NotFound(msg),
            DirectDebitError::BusinessRule(_) | DirectDebitError::InvalidTransition(_) => {
                ApiError::BadRequest(err.to_string())
            }
            DirectDebitError::Billing(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_report_maps_to_422() {
        let mut report = ValidationReport::new();
        report.add("amount", "Enter an amount");
        let response = ApiError::Validation(report).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_business_rule_maps_to_400() {
        let err: ApiError = BillingError::business_rule("Insufficient credit").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_consistency_maps_to_500() {
        let err: ApiError = BillingError::Consistency("unbalanced".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
