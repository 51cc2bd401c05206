//! API middleware
//!
//! Authentication and role lookup happen upstream; by the time a request
//! reaches this service the gateway has attached the caller's identity and
//! resolved roles as headers. The actor middleware turns those into a typed
//! `Actor` for the handlers, rejecting requests with no identity.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use core_kernel::UserId;
use domain_billing::Actor;
use tracing::{info, warn};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";
const FINANCE_MANAGER_ROLE: &str = "Finance Manager";

/// Resolves the calling actor from gateway headers
pub async fn actor_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<UserId>().ok());

    let Some(user_id) = user_id else {
        warn!("Missing or invalid {USER_ID_HEADER} header");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let finance_manager = request
        .headers()
        .get(USER_ROLES_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|roles| roles.split(',').any(|r| r.trim() == FINANCE_MANAGER_ROLE))
        .unwrap_or(false);

    request.extensions_mut().insert(Actor {
        user_id,
        finance_manager,
    });
    Ok(next.run(request).await)
}

/// Audit logging middleware
///
/// Logs all API requests for compliance and debugging
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user = request
        .extensions()
        .get::<Actor>()
        .map(|a| a.user_id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    let start = Utc::now();
    let response = next.run(request).await;
    let duration = Utc::now() - start;

    info!(
        method = %method,
        uri = %uri,
        %user,
        status = %response.status().as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
