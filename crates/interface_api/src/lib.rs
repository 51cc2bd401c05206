//! HTTP API Layer
//!
//! This crate provides the REST API for the supervision finance core using
//! Axum.
//!
//! # Architecture
//!
//! - **Registry**: In-memory per-client account records, one lock per client
//! - **Handlers**: Request handlers for each domain
//! - **Middleware**: Actor resolution from gateway headers, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Providers**: Direct debit and notification port implementations
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(AppState::new(registrar, notifier, config));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod providers;
pub mod registry;
pub mod uploads;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use core_kernel::{ClientId, MandateRegistrar, Notifier};
use domain_direct_debit::DedupeStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::handlers::{
    adjustments, admin, clients, direct_debit, fee_reductions, health, invoices, refunds,
};
use crate::middleware::{actor_middleware, audit_middleware};
use crate::registry::{ClientRecord, Registry};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub dedupe: Arc<Mutex<DedupeStore>>,
    pub registrar: Arc<dyn MandateRegistrar>,
    pub notifier: Arc<dyn Notifier>,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(
        registrar: Arc<dyn MandateRegistrar>,
        notifier: Arc<dyn Notifier>,
        config: ApiConfig,
    ) -> Self {
        Self {
            registry: Registry::new(),
            dedupe: Arc::new(Mutex::new(DedupeStore::new())),
            registrar,
            notifier,
            config,
        }
    }

    /// Looks up a client record, mapping a miss to a 404
    pub async fn client(
        &self,
        client_id: ClientId,
    ) -> Result<Arc<tokio::sync::Mutex<ClientRecord>>, ApiError> {
        self.registry
            .get(client_id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Client {client_id} not found")))
    }
}

/// Creates the main API router
///
/// Everything under `/api/v1` requires a resolved actor; health checks and
/// nothing else are public.
pub fn create_router(state: AppState) -> Router {
    // Public routes (no actor required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Per-client routes
    let client_routes = Router::new()
        .route("/", post(clients::create_client))
        .route("/:client_id", get(clients::get_account_summary))
        .route("/:client_id/billing-history", get(clients::get_billing_history))
        .route(
            "/:client_id/invoices",
            post(invoices::raise_invoice).get(invoices::list_invoices),
        )
        .route(
            "/:client_id/invoices/:invoice_id/permitted-adjustments",
            get(adjustments::permitted_adjustments),
        )
        .route(
            "/:client_id/invoices/:invoice_id/adjustments",
            post(adjustments::add_adjustment),
        )
        .route(
            "/:client_id/adjustments/:adjustment_id/decision",
            put(adjustments::decide_adjustment),
        )
        .route(
            "/:client_id/fee-reductions",
            post(fee_reductions::grant_fee_reduction),
        )
        .route(
            "/:client_id/fee-reductions/:reduction_id/cancel",
            put(fee_reductions::cancel_fee_reduction),
        )
        .route(
            "/:client_id/refunds",
            post(refunds::create_refund).get(refunds::list_refunds),
        )
        .route(
            "/:client_id/refunds/:refund_id/decision",
            put(refunds::decide_refund),
        )
        .route(
            "/:client_id/refunds/:refund_id/processing",
            put(refunds::start_processing),
        )
        .route(
            "/:client_id/refunds/:refund_id/cancel",
            put(refunds::cancel_refund),
        )
        .route(
            "/:client_id/direct-debit",
            post(direct_debit::create_mandate).delete(direct_debit::cancel_instruction),
        );

    // Scheduled events, report requests and file uploads
    let admin_routes = Router::new()
        .route("/events", post(admin::post_event))
        .route("/reports", post(admin::post_report))
        .route("/uploads", post(admin::post_upload));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/clients", client_routes)
        .merge(admin_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn(actor_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
