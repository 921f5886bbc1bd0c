//! Guarded user endpoints
//!
//! - GET    /api/users       ("Query User")
//! - GET    /api/users/{id}  ("Get User")
//! - DELETE /api/users/{id}  ("Delete User")
//!
//! Every success response carries rotated session headers. Password hash
//! and salt never leave the store layer.

use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::db::schemas::UserDoc;
use crate::routes::{
    cors_preflight, error_response, json_response, pre_check, rotate, with_session_headers,
    BoxBody, ErrorResponse,
};
use crate::server::AppState;
use crate::types::{GatehouseError, Result};

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_locked_out: bool,
}

impl From<UserDoc> for UserResponse {
    fn from(user: UserDoc) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_locked_out: user.is_locked_out,
        }
    }
}

/// Dispatch /api/users requests. Returns None for other paths.
pub async fn handle_user_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let rest = path.strip_prefix("/api/users")?;
    let id = match rest {
        "" | "/" => None,
        _ => Some(rest.trim_start_matches('/').to_string()),
    };

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match (method, id) {
        (Method::GET, None) => {
            guarded(&state, req, "Query User", |state, _, _req| async move {
                let users = state.auth.store().list_users().await?;
                let body: Vec<UserResponse> = users.into_iter().map(Into::into).collect();
                Ok(json_response(StatusCode::OK, &body))
            })
            .await
        }
        (Method::GET, Some(id)) => {
            guarded(&state, req, "Get User", |state, _, _req| async move {
                let user = state
                    .auth
                    .store()
                    .find_user_by_id(&id)
                    .await?
                    .ok_or_else(|| GatehouseError::NotFound(format!("user {id}")))?;
                Ok(json_response(StatusCode::OK, &UserResponse::from(user)))
            })
            .await
        }
        (Method::DELETE, Some(id)) => {
            guarded(&state, req, "Delete User", |state, _, _req| async move {
                if !state.auth.store().soft_delete_user(&id).await? {
                    return Err(GatehouseError::NotFound(format!("user {id}")));
                }
                Ok(json_response(
                    StatusCode::OK,
                    &serde_json::json!({ "deleted": true }),
                ))
            })
            .await
        }
        _ => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse {
                error: "Method not allowed".into(),
            },
        ),
    };

    Some(response)
}

/// Run `op` inside the guard protocol for `permission`. The request is
/// handed to `op` so body-reading operations go through the same path:
/// once pre_check passes, rotation happens whatever `op` returns,
/// including a body parse failure.
pub(crate) async fn guarded<B, F, Fut>(
    state: &Arc<AppState>,
    req: Request<B>,
    permission: &'static str,
    op: F,
) -> Response<BoxBody>
where
    F: FnOnce(Arc<AppState>, crate::auth::GuardedRequest, Request<B>) -> Fut,
    Fut: std::future::Future<Output = Result<Response<BoxBody>>>,
{
    let ctx = match pre_check(state, permission, &req).await {
        Ok(ctx) => ctx,
        Err(e) => return error_response(state, e).await,
    };

    let result = op(Arc::clone(state), ctx.clone(), req).await;

    let fresh_nonce = match rotate(state, permission, &ctx).await {
        Ok(nonce) => nonce,
        Err(e) => return error_response(state, e).await,
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => error_response(state, e).await,
    };

    with_session_headers(response, &ctx.token, &fresh_nonce)
}
