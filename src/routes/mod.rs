//! HTTP route handlers
//!
//! Each protected route declares the permission it requires; the declared
//! set is registered in the permission collection at startup so grants can
//! reference them before anyone has hit the route.

pub mod auth_routes;
pub mod health;
pub mod roles;
pub mod users;

pub use auth_routes::handle_auth_request;
pub use health::{health_check, version_info};
pub use roles::handle_role_request;
pub use users::handle_user_request;

use bytes::Bytes;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::new_id;
use crate::db::schemas::PermissionDoc;
use crate::db::store::AuthStore;
use crate::server::AppState;
use crate::types::{GatehouseError, Result};

pub(crate) type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Permissions declared by the route handlers, registered at startup
pub const DECLARED_PERMISSIONS: &[(&str, &str)] = &[
    ("Create User", "Register a new user account"),
    ("Get User", "Fetch a single user"),
    ("Query User", "List users"),
    ("Delete User", "Soft-delete a user"),
    ("Query Role", "List roles"),
    ("Delete Role", "Soft-delete a role"),
];

/// Insert any declared permission missing from the store
pub async fn ensure_declared_permissions(store: &dyn AuthStore) -> Result<()> {
    for (name, description) in DECLARED_PERMISSIONS {
        if store.find_permission_by_name(name).await?.is_none() {
            store
                .insert_permission(PermissionDoc::new(
                    new_id(),
                    (*name).to_string(),
                    (*description).to_string(),
                ))
                .await?;
            info!("Registered permission '{}'", name);
        }
    }
    Ok(())
}

// =============================================================================
// Shared response helpers
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, Credentials, NOnce",
        )
        .body(full_body(json))
        .unwrap_or_else(|_| Response::new(empty_body()))
}

pub(crate) fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, Credentials, NOnce",
        )
        .body(empty_body())
        .unwrap_or_else(|_| Response::new(empty_body()))
}

pub(crate) fn full_body(data: impl Into<Bytes>) -> BoxBody {
    use http_body_util::BodyExt;
    http_body_util::Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn empty_body() -> BoxBody {
    full_body(Bytes::new())
}

/// All values of a header, in order. Skips values that are not UTF-8.
pub(crate) fn header_values<B>(req: &Request<B>, name: &str) -> Vec<String> {
    req.headers()
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .collect()
}

pub(crate) async fn parse_json_body<T, B>(req: Request<B>) -> Result<T>
where
    T: for<'de> serde::Deserialize<'de>,
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    use http_body_util::BodyExt;

    let body = req
        .collect()
        .await
        .map_err(|e| GatehouseError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 10240 {
        return Err(GatehouseError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| GatehouseError::Http(format!("Invalid JSON: {}", e)))
}

/// Map an error to its HTTP response, auditing unexpected ones.
/// Clients never see internal failure detail.
pub(crate) async fn error_response(state: &AppState, err: GatehouseError) -> Response<BoxBody> {
    if err.is_unexpected() {
        state
            .audit
            .record_failure(error_name(&err), &err.to_string())
            .await;
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &ErrorResponse {
                error: "Internal server error".into(),
            },
        );
    }

    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.to_string(),
        },
    )
}

fn error_name(err: &GatehouseError) -> &'static str {
    match err {
        GatehouseError::Database(_) => "Database",
        GatehouseError::Config(_) => "Config",
        _ => "Internal",
    }
}

/// Attach the session headers every successful guarded response carries
pub(crate) fn with_session_headers(
    mut response: Response<BoxBody>,
    token: &str,
    fresh_nonce: &str,
) -> Response<BoxBody> {
    let headers = response.headers_mut();
    if let (Ok(token), Ok(nonce)) = (token.parse(), fresh_nonce.parse()) {
        headers.insert("Authorization", token);
        headers.insert("NOnce", nonce);
    }
    response
}

/// Guard pre-check for a protected route: validates the session headers,
/// consumes the nonce, and evaluates `permission`.
pub(crate) async fn pre_check<B>(
    state: &Arc<AppState>,
    permission: &'static str,
    req: &Request<B>,
) -> Result<crate::auth::GuardedRequest> {
    let guard = crate::auth::RequestGuard::new(&state.auth, permission);
    guard
        .pre_check(
            &header_values(req, "Authorization"),
            &header_values(req, "NOnce"),
        )
        .await
}

/// Guard post-step: extend the token, mint the response nonce
pub(crate) async fn rotate(
    state: &Arc<AppState>,
    permission: &'static str,
    ctx: &crate::auth::GuardedRequest,
) -> Result<String> {
    let guard = crate::auth::RequestGuard::new(&state.auth, permission);
    guard.rotate(ctx).await
}
