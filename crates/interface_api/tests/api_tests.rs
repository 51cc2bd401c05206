//! End-to-end API tests
//!
//! Each test boots a fresh in-memory server with logging providers and
//! drives it over HTTP, asserting on response shapes the same way the
//! gateway's consumers would.

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use core_kernel::UserId;
use interface_api::config::ApiConfig;
use interface_api::middleware::{USER_ID_HEADER, USER_ROLES_HEADER};
use interface_api::providers::{LoggingNotifier, LoggingRegistrar};
use interface_api::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use test_utils::IdFixtures;

fn test_server() -> TestServer {
    let state = AppState::new(
        Arc::new(LoggingRegistrar),
        Arc::new(LoggingNotifier),
        ApiConfig::default(),
    );
    TestServer::new(create_router(state)).unwrap()
}

fn as_user(request: TestRequest, user_id: UserId, finance_manager: bool) -> TestRequest {
    let request = request.add_header(
        HeaderName::from_static(USER_ID_HEADER),
        HeaderValue::from_str(&user_id.as_uuid().to_string()).unwrap(),
    );
    if finance_manager {
        request.add_header(
            HeaderName::from_static(USER_ROLES_HEADER),
            HeaderValue::from_static("Finance Manager"),
        )
    } else {
        request
    }
}

fn as_case_worker(request: TestRequest) -> TestRequest {
    as_user(request, IdFixtures::case_worker_id(), false)
}

fn as_finance_manager(request: TestRequest) -> TestRequest {
    as_user(request, IdFixtures::finance_manager_id(), true)
}

async fn create_client(server: &TestServer, court_reference: &str) -> String {
    let response = as_case_worker(server.post("/api/v1/clients"))
        .json(&json!({
            "courtReference": court_reference,
            "surname": "Client"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["clientId"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn raise_assessment_invoice(server: &TestServer, client_id: &str) -> String {
    let response = as_case_worker(server.post(&format!("/api/v1/clients/{client_id}/invoices")))
        .json(&json!({
            "feeType": "AD",
            "raisedDate": "2024-03-01"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

async fn upload_moto_payments(server: &TestServer, csv: &str) -> Value {
    let response = as_case_worker(server.post("/api/v1/uploads"))
        .json(&json!({
            "data": BASE64.encode(csv),
            "emailAddress": "uploader@example.com",
            "uploadType": "PAYMENTS_MOTO_CARD"
        }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

async fn account_summary(server: &TestServer, client_id: &str) -> Value {
    let response = as_case_worker(server.get(&format!("/api/v1/clients/{client_id}"))).await;
    response.assert_status_ok();
    response.json::<Value>()
}

#[tokio::test]
async fn test_health_check_is_public() {
    let server = test_server();
    server.get("/health").await.assert_status_ok();
    server.get("/health/ready").await.assert_status_ok();
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let server = test_server();
    let response = server
        .post("/api/v1/clients")
        .json(&json!({"courtReference": "11111111", "surname": "Client"}))
        .await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invoice_and_payment_round_trip() {
    let server = test_server();
    let client_id = create_client(&server, "10000001").await;
    raise_assessment_invoice(&server, &client_id).await;

    let summary = account_summary(&server, &client_id).await;
    assert_eq!(summary["outstandingBalance"], json!(10_000));
    assert_eq!(summary["creditBalance"], json!(0));

    // Pay more than is owed; the excess is held as credit
    let result = upload_moto_payments(&server, "Court reference,Amount,Date\n10000001,150.00\n").await;
    assert_eq!(result["processed"], json!(1));
    assert_eq!(result["failedLines"], json!({}));

    let summary = account_summary(&server, &client_id).await;
    assert_eq!(summary["outstandingBalance"], json!(0));
    assert_eq!(summary["creditBalance"], json!(5_000));

    let invoices = as_case_worker(server.get(&format!("/api/v1/clients/{client_id}/invoices")))
        .await
        .json::<Value>();
    assert_eq!(invoices[0]["status"], json!("CLOSED"));
    assert_eq!(invoices[0]["outstanding"], json!(0));
    assert!(invoices[0]["reference"]
        .as_str()
        .unwrap()
        .starts_with("AD000001"));
}

#[tokio::test]
async fn test_upload_failures_keyed_by_line() {
    let server = test_server();
    create_client(&server, "10000002").await;

    let csv = "Court reference,Amount,Date\n10000002,50.00\nunknown-ref,10.00\n10000002,abc\n";
    let result = upload_moto_payments(&server, csv).await;
    assert_eq!(result["processed"], json!(1));
    let failed = result["failedLines"].as_object().unwrap();
    assert_eq!(failed.len(), 2);
    assert!(failed.contains_key("2"));
    assert!(failed.contains_key("3"));
}

#[tokio::test]
async fn test_invoice_validation_errors_are_aggregated() {
    let server = test_server();
    let client_id = create_client(&server, "10000003").await;

    let response = as_case_worker(server.post(&format!("/api/v1/clients/{client_id}/invoices")))
        .json(&json!({"feeType": "S2", "raisedDate": "2024-04-01"}))
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>();
    assert_eq!(body["error"], json!("validation_error"));
    let errors = body["validation_errors"].as_object().unwrap();
    assert!(errors.contains_key("amount"));
    assert!(errors.contains_key("startDate"));
    assert!(errors.contains_key("supervisionLevel"));
}

#[tokio::test]
async fn test_unknown_client_is_not_found() {
    let server = test_server();
    let response = as_case_worker(
        server.get("/api/v1/clients/00000000-0000-0000-0000-00000000dead"),
    )
    .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_credit_memo_requires_second_finance_manager() {
    let server = test_server();
    let client_id = create_client(&server, "10000004").await;
    let invoice_id = raise_assessment_invoice(&server, &client_id).await;

    let response = as_finance_manager(server.post(&format!(
        "/api/v1/clients/{client_id}/invoices/{invoice_id}/adjustments"
    )))
    .json(&json!({
        "adjustmentType": "CREDIT_MEMO",
        "amount": 4_000,
        "notes": "Duplicate charge"
    }))
    .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let adjustment_id = response.json::<Value>()["id"].as_str().unwrap().to_string();

    // The proposer cannot decide their own adjustment
    let response = as_finance_manager(server.put(&format!(
        "/api/v1/clients/{client_id}/adjustments/{adjustment_id}/decision"
    )))
    .json(&json!({"decision": "APPROVED"}))
    .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    // A different finance manager can
    let response = as_user(
        server.put(&format!(
            "/api/v1/clients/{client_id}/adjustments/{adjustment_id}/decision"
        )),
        UserId::new(),
        true,
    )
    .json(&json!({"decision": "APPROVED"}))
    .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], json!("APPLIED"));

    let summary = account_summary(&server, &client_id).await;
    assert_eq!(summary["outstandingBalance"], json!(6_000));
}

#[tokio::test]
async fn test_case_worker_cannot_decide_adjustment() {
    let server = test_server();
    let client_id = create_client(&server, "10000005").await;
    let invoice_id = raise_assessment_invoice(&server, &client_id).await;

    let response = as_case_worker(server.post(&format!(
        "/api/v1/clients/{client_id}/invoices/{invoice_id}/adjustments"
    )))
    .json(&json!({
        "adjustmentType": "CREDIT_MEMO",
        "amount": 1_000,
        "notes": "Overcharge"
    }))
    .await;
    let adjustment_id = response.json::<Value>()["id"].as_str().unwrap().to_string();

    let response = as_case_worker(server.put(&format!(
        "/api/v1/clients/{client_id}/adjustments/{adjustment_id}/decision"
    )))
    .json(&json!({"decision": "APPROVED"}))
    .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refund_bank_details_visible_only_to_finance_managers() {
    let server = test_server();
    let client_id = create_client(&server, "10000006").await;
    raise_assessment_invoice(&server, &client_id).await;
    upload_moto_payments(&server, "Court reference,Amount\n10000006,150.00\n").await;

    let response = as_case_worker(server.post(&format!("/api/v1/clients/{client_id}/refunds")))
        .json(&json!({
            "amount": 5_000,
            "accountName": "C Client",
            "sortCode": "110247",
            "accountNumber": "12345678",
            "notes": "Overpayment refund"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    // Reserving the refund removes the credit straight away
    let summary = account_summary(&server, &client_id).await;
    assert_eq!(summary["creditBalance"], json!(0));

    let refunds = as_finance_manager(server.get(&format!("/api/v1/clients/{client_id}/refunds")))
        .await
        .json::<Value>();
    assert!(refunds[0]["bankDetails"].is_object());

    let refunds = as_case_worker(server.get(&format!("/api/v1/clients/{client_id}/refunds")))
        .await
        .json::<Value>();
    assert!(refunds[0].get("bankDetails").is_none());
}

#[tokio::test]
async fn test_rejected_refund_restores_credit() {
    let server = test_server();
    let client_id = create_client(&server, "10000007").await;
    raise_assessment_invoice(&server, &client_id).await;
    upload_moto_payments(&server, "Court reference,Amount\n10000007,120.00\n").await;

    let response = as_case_worker(server.post(&format!("/api/v1/clients/{client_id}/refunds")))
        .json(&json!({
            "amount": 2_000,
            "accountName": "C Client",
            "sortCode": "110247",
            "accountNumber": "12345678",
            "notes": "Overpayment refund"
        }))
        .await;
    let refund_id = response.json::<Value>()["id"].as_str().unwrap().to_string();

    let response = as_finance_manager(server.put(&format!(
        "/api/v1/clients/{client_id}/refunds/{refund_id}/decision"
    )))
    .json(&json!({"decision": "REJECTED"}))
    .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], json!("REJECTED"));

    let summary = account_summary(&server, &client_id).await;
    assert_eq!(summary["creditBalance"], json!(2_000));
}

#[tokio::test]
async fn test_collection_trigger_is_idempotent() {
    let server = test_server();
    let client_id = create_client(&server, "10000008").await;
    raise_assessment_invoice(&server, &client_id).await;

    let response = as_case_worker(server.post(&format!(
        "/api/v1/clients/{client_id}/direct-debit"
    )))
    .json(&json!({
        "accountName": "C Client",
        "sortCode": "110247",
        "accountNumber": "12345678"
    }))
    .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let today = chrono::Utc::now().date_naive();
    let event = json!({
        "source": "scheduler",
        "detail-type": "scheduled-event",
        "detail": {
            "trigger": "direct-debit-collection",
            "override": {"date": today}
        }
    });

    as_case_worker(server.post("/api/v1/events"))
        .json(&event)
        .await
        .assert_status_ok();
    let summary = account_summary(&server, &client_id).await;
    assert_eq!(summary["outstandingBalance"], json!(0));

    // Redelivery of the same trigger must not collect twice
    as_case_worker(server.post("/api/v1/events"))
        .json(&event)
        .await
        .assert_status_ok();
    let summary = account_summary(&server, &client_id).await;
    assert_eq!(summary["outstandingBalance"], json!(0));
    assert_eq!(summary["creditBalance"], json!(0));
}

#[tokio::test]
async fn test_stale_override_date_is_rejected() {
    let server = test_server();
    let event = json!({
        "source": "scheduler",
        "detail-type": "scheduled-event",
        "detail": {
            "trigger": "direct-debit-collection",
            "override": {"date": "2020-01-24"}
        }
    });
    as_case_worker(server.post("/api/v1/events"))
        .json(&event)
        .await
        .assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_report_request_validation() {
    let server = test_server();
    let response = as_case_worker(server.post("/api/v1/reports"))
        .json(&json!({"ReportType": "AgedDebt", "Email": ""}))
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>();
    assert!(body["validation_errors"]
        .as_object()
        .unwrap()
        .contains_key("Email"));

    as_case_worker(server.post("/api/v1/reports"))
        .json(&json!({"ReportType": "AgedDebt", "Email": "finance@example.com"}))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

#[tokio::test]
async fn test_fee_reduction_grant_and_history() {
    let server = test_server();
    let client_id = create_client(&server, "10000009").await;
    raise_assessment_invoice(&server, &client_id).await;

    let response = as_case_worker(server.post(&format!(
        "/api/v1/clients/{client_id}/fee-reductions"
    )))
    .json(&json!({
        "reductionType": "REMISSION",
        "startYear": 2023,
        "lengthOfAward": 2,
        "dateReceived": "2024-02-01",
        "notes": "Evidence of low income"
    }))
    .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    // The award covers the invoice, clearing it
    let summary = account_summary(&server, &client_id).await;
    assert_eq!(summary["outstandingBalance"], json!(0));

    let history = as_case_worker(server.get(&format!(
        "/api/v1/clients/{client_id}/billing-history"
    )))
    .await
    .json::<Value>();
    let events: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|line| line["event"].as_str().unwrap())
        .collect();
    assert!(events.contains(&"invoiceRaised"));
    assert!(events.contains(&"ledgerEntry"));
}
