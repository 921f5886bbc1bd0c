//! HTTP routes for authentication
//!
//! - POST /auth/login    - Exchange a Credentials header for a session
//! - POST /auth/register - Create a user account (guarded by "Create User")
//!
//! Login reads the `Credentials` request header (base64 payload, see
//! `auth::credentials`) and an optional `Authorization` header carrying an
//! existing token. Success returns 200 with `Authorization` and `NOnce`
//! response headers; failure returns 401 with the error list in the body.

use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::routes::users::guarded;
use crate::routes::{
    cors_preflight, error_response, header_values, json_response, parse_json_body,
    with_session_headers, BoxBody, ErrorResponse,
};
use crate::server::AppState;
use crate::types::GatehouseError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub authenticated: bool,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UserCreatedResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
}

/// Dispatch /auth/* requests. Returns None for paths outside /auth.
pub async fn handle_auth_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let path = req.uri().path();
    let method = req.method();

    if !path.starts_with("/auth") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let path = path.split('?').next().unwrap_or(path);

    let response = match (method, path) {
        (&Method::POST, "/auth/login") => handle_login(req, state).await,
        (&Method::POST, "/auth/register") => handle_register(req, state).await,

        (_, "/auth/login") | (_, "/auth/register") => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse {
                error: "Method not allowed".into(),
            },
        ),

        _ => json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse {
                error: "Auth endpoint not found".into(),
            },
        ),
    };

    Some(response)
}

async fn handle_login<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody> {
    let credentials = match header_values(&req, "Credentials").into_iter().next() {
        Some(value) if !value.trim().is_empty() => value,
        _ => {
            return error_response(
                &state,
                GatehouseError::MalformedCredentials("missing Credentials header".into()),
            )
            .await
        }
    };

    let existing_token = header_values(&req, "Authorization").into_iter().next();

    let pair = match state
        .auth
        .authenticate(&credentials, existing_token.as_deref())
        .await
    {
        Ok(pair) => pair,
        Err(e) => return error_response(&state, e).await,
    };

    // The body is informational; the session lives in the headers
    let username = crate::auth::Credentials::parse(&credentials)
        .map(|c| c.username)
        .unwrap_or_default();
    info!(%username, "Login succeeded");

    let response = json_response(
        StatusCode::OK,
        &LoginResponse {
            authenticated: true,
            username,
        },
    );
    with_session_headers(response, &pair.token, &pair.nonce)
}

async fn handle_register<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    // The body is parsed inside the guarded section so a malformed payload
    // still consumes the nonce and yields a replacement in the response.
    guarded(&state, req, "Create User", |state, _, req| async move {
        let body: RegisterRequest = parse_json_body(req).await?;
        let user = state
            .auth
            .create_user(&body.username, &body.password, &body.email)
            .await?;
        Ok(json_response(
            StatusCode::CREATED,
            &UserCreatedResponse {
                id: user.id,
                username: user.username,
                email: user.email,
                role: user.role,
            },
        ))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordParams;
    use crate::auth::service::{digest_value, new_id};
    use crate::auth::{AuthService, ProtocolParams};
    use crate::config::Args;
    use crate::db::schemas::{UserDoc, UserPermissionDoc};
    use crate::db::store::{AuthStore, MemoryAuthStore};
    use crate::logging::AuditLogger;
    use bytes::Bytes;
    use clap::Parser;
    use http_body_util::Full;

    fn fast_params() -> ProtocolParams {
        ProtocolParams {
            password: PasswordParams {
                iterations: 10,
                salt_size: 32,
                derived_key_len: 32,
            },
            ..ProtocolParams::default()
        }
    }

    async fn registrar_session() -> (Arc<AppState>, MemoryAuthStore, String, String) {
        let store = MemoryAuthStore::new();
        let service = AuthService::new(Arc::new(store.clone()), fast_params());

        let user = UserDoc::new(
            "u1".into(),
            "alice".into(),
            "alice@example.com".into(),
            "hash".into(),
            "salt".into(),
            "Default".into(),
        );
        store.insert_user(user).await.unwrap();
        store
            .grant_permission(UserPermissionDoc::new(
                new_id(),
                "u1".into(),
                "p1".into(),
                "Create User".into(),
            ))
            .await
            .unwrap();

        let token = service.mint_token("u1").await.unwrap();
        let nonce = service.mint_nonce("u1").await.unwrap();

        let args = Args::parse_from(["gatehouse"]);
        let audit = AuditLogger::new(Arc::new(store.clone()));
        let state = Arc::new(AppState::new(args, service, audit));
        (state, store, token, nonce)
    }

    fn register_request(token: &str, nonce: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri("/auth/register")
            .header("Authorization", token)
            .header("NOnce", nonce)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_creates_user_and_rotates_session() {
        let (state, store, token, nonce) = registrar_session().await;

        let body = r#"{"username":"bob","password":"s3cret-pw","email":"bob@example.com"}"#;
        let response = handle_auth_request(register_request(&token, &nonce, body), state)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get("NOnce").is_some());
        assert!(store
            .find_user_by_username("bob")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_register_rotates_session_when_body_is_invalid() {
        let (state, store, token, nonce) = registrar_session().await;

        let response = handle_auth_request(register_request(&token, &nonce, "not json"), state)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // The spent nonce must be replaced even though the operation failed
        let fresh = response
            .headers()
            .get("NOnce")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .unwrap();
        assert_ne!(fresh, nonce);

        // And the token lease was extended
        let digest = digest_value(&token, "authorization token").unwrap();
        let stored = store.find_token(&digest).await.unwrap().unwrap();
        assert_eq!(stored.metadata.version, 2);
    }

    #[tokio::test]
    async fn test_register_without_session_is_unauthorized() {
        let (state, _, _, _) = registrar_session().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/register")
            .body(Full::new(Bytes::from(
                r#"{"username":"bob","password":"s3cret-pw","email":"bob@example.com"}"#,
            )))
            .unwrap();
        let response = handle_auth_request(request, state).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
