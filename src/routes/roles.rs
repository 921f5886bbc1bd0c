//! Guarded role endpoints
//!
//! - GET    /api/roles       ("Query Role")
//! - DELETE /api/roles/{id}  ("Delete Role")

use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::db::schemas::RoleDoc;
use crate::routes::users::guarded;
use crate::routes::{cors_preflight, json_response, BoxBody, ErrorResponse};
use crate::server::AppState;
use crate::types::GatehouseError;

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    pub permission_names: Vec<String>,
}

impl From<RoleDoc> for RoleResponse {
    fn from(role: RoleDoc) -> Self {
        Self {
            id: role.id,
            name: role.name,
            permission_names: role.permission_names,
        }
    }
}

/// Dispatch /api/roles requests. Returns None for other paths.
pub async fn handle_role_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let rest = path.strip_prefix("/api/roles")?;
    let id = match rest {
        "" | "/" => None,
        _ => Some(rest.trim_start_matches('/').to_string()),
    };

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match (method, id) {
        (Method::GET, None) => {
            guarded(&state, req, "Query Role", |state, _, _req| async move {
                let roles = state.auth.store().list_roles().await?;
                let body: Vec<RoleResponse> = roles.into_iter().map(Into::into).collect();
                Ok(json_response(StatusCode::OK, &body))
            })
            .await
        }
        (Method::DELETE, Some(id)) => {
            guarded(&state, req, "Delete Role", |state, _, _req| async move {
                if !state.auth.store().soft_delete_role(&id).await? {
                    return Err(GatehouseError::NotFound(format!("role {id}")));
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
