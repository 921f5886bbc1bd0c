//! Request guard for protected routes
//!
//! Every protected route declares one permission and runs the same
//! two-phase protocol around its operation:
//!
//! 1. `pre_check` validates the `Authorization` token, atomically consumes
//!    the `NOnce`, and evaluates the declared permission. Any failure is
//!    terminal and the operation never runs. The nonce is spent even when
//!    a later check fails, so a rejected request cannot be replayed.
//! 2. `rotate` extends the token expiry and mints a fresh nonce for the
//!    response headers. It runs once per successful pre_check, whatever
//!    the operation itself returned.

use tracing::debug;

use crate::auth::authorize::is_authorized;
use crate::auth::service::{digest_value, AuthService};
use crate::types::{GatehouseError, Result};

/// Session facts established by a successful pre_check
#[derive(Debug, Clone)]
pub struct GuardedRequest {
    pub user_id: String,
    /// The caller's token value, echoed back in the response
    pub token: String,
    token_sha256: String,
}

/// Guard for one protected route
pub struct RequestGuard<'a> {
    service: &'a AuthService,
    permission: &'static str,
}

impl<'a> RequestGuard<'a> {
    pub fn new(service: &'a AuthService, permission: &'static str) -> Self {
        Self {
            service,
            permission,
        }
    }

    /// Validate token + nonce, consume the nonce, check the permission
    pub async fn pre_check(
        &self,
        authorization_values: &[String],
        nonce_values: &[String],
    ) -> Result<GuardedRequest> {
        let token_value = match authorization_values {
            [single] if !single.trim().is_empty() => single.trim(),
            [] => {
                return Err(GatehouseError::InvalidToken(
                    "missing Authorization header".into(),
                ))
            }
            [_] => {
                return Err(GatehouseError::InvalidToken(
                    "empty Authorization header".into(),
                ))
            }
            _ => {
                return Err(GatehouseError::InvalidToken(
                    "multiple Authorization headers".into(),
                ))
            }
        };

        let nonce_value = nonce_values
            .first()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatehouseError::InvalidToken("missing NOnce header".into()))?;

        let token_sha256 = digest_value(token_value, "authorization token")?;
        let nonce_sha256 = digest_value(nonce_value, "nOnce token")?;

        let token = self
            .service
            .find_valid_token(token_value)
            .await?
            .ok_or_else(invalid_session)?;

        // Claim before authorizing: an authorization failure still costs
        // the caller this nonce.
        let claimed = self
            .service
            .store()
            .claim_nonce(&nonce_sha256)
            .await?
            .filter(|n| bson::DateTime::now() < n.expires_at)
            .ok_or_else(invalid_session)?;
        debug!(nonce_id = %claimed.id, "Consumed nonce");

        if !is_authorized(self.service.store().as_ref(), &token.user_id, self.permission).await? {
            return Err(GatehouseError::PermissionDenied(format!(
                "'{}' required",
                self.permission
            )));
        }

        Ok(GuardedRequest {
            user_id: token.user_id,
            token: token_value.to_string(),
            token_sha256,
        })
    }

    /// Extend the session token and mint the next nonce
    pub async fn rotate(&self, ctx: &GuardedRequest) -> Result<String> {
        self.service
            .store()
            .extend_token(&ctx.token_sha256, self.service.params().token_ttl_minutes)
            .await?;

        self.service.mint_nonce(&ctx.user_id).await
    }
}

fn invalid_session() -> GatehouseError {
    // Token and nonce failures share one message on purpose
    GatehouseError::InvalidToken("token or nonce is invalid or expired".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordParams;
    use crate::auth::service::{new_id, ProtocolParams};
    use crate::db::schemas::{expiry_from_now, UserDoc, UserPermissionDoc};
    use crate::db::store::{AuthStore, MemoryAuthStore};
    use std::sync::Arc;

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

    async fn session_with_permission(
        permission: Option<&str>,
    ) -> (AuthService, MemoryAuthStore, String, String) {
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

        if let Some(name) = permission {
            store
                .grant_permission(UserPermissionDoc::new(
                    new_id(),
                    "u1".into(),
                    "p1".into(),
                    name.into(),
                ))
                .await
                .unwrap();
        }

        let token = service.mint_token("u1").await.unwrap();
        let nonce = service.mint_nonce("u1").await.unwrap();
        (service, store, token, nonce)
    }

    #[tokio::test]
    async fn test_pre_check_accepts_valid_session() {
        let (service, _, token, nonce) = session_with_permission(Some("Get User")).await;
        let guard = RequestGuard::new(&service, "Get User");

        let ctx = guard
            .pre_check(&[token.clone()], &[nonce])
            .await
            .unwrap();
        assert_eq!(ctx.user_id, "u1");
        assert_eq!(ctx.token, token);
    }

    #[tokio::test]
    async fn test_replayed_nonce_is_rejected() {
        let (service, _, token, nonce) = session_with_permission(Some("Get User")).await;
        let guard = RequestGuard::new(&service, "Get User");

        guard
            .pre_check(&[token.clone()], &[nonce.clone()])
            .await
            .unwrap();

        let err = guard.pre_check(&[token], &[nonce]).await.unwrap_err();
        assert!(matches!(err, GatehouseError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let (service, store, token, nonce) = session_with_permission(Some("Get User")).await;
        let guard = RequestGuard::new(&service, "Get User");

        let digest = digest_value(&token, "authorization token").unwrap();
        // Not deleted, but past expiry
        let mut doc = store.find_token(&digest).await.unwrap().unwrap();
        doc.expires_at = expiry_from_now(-1);
        store.insert_token(doc).await.unwrap();

        let err = guard.pre_check(&[token], &[nonce]).await.unwrap_err();
        assert!(matches!(err, GatehouseError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_expired_nonce_is_rejected() {
        let (service, store, token, nonce) = session_with_permission(Some("Get User")).await;
        let guard = RequestGuard::new(&service, "Get User");

        let digest = digest_value(&nonce, "nOnce token").unwrap();
        let mut doc = store.claim_nonce(&digest).await.unwrap().unwrap();
        doc.expires_at = expiry_from_now(-1);
        store.insert_nonce(doc).await.unwrap();

        let err = guard.pre_check(&[token], &[nonce]).await.unwrap_err();
        assert!(matches!(err, GatehouseError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_denied_request_still_consumes_nonce() {
        let (service, store, token, nonce) = session_with_permission(None).await;
        store
            .insert_role(crate::db::schemas::RoleDoc::new(
                "r1".into(),
                "Operator".into(),
                vec![],
            ))
            .await
            .unwrap();
        let guard = RequestGuard::new(&service, "Delete Role");

        let err = guard
            .pre_check(&[token], &[nonce.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::PermissionDenied(_)));

        // The operation never ran, so the protected data is untouched,
        // but the nonce is gone.
        assert_eq!(store.list_roles().await.unwrap().len(), 1);
        let digest = digest_value(&nonce, "nOnce token").unwrap();
        assert!(store.claim_nonce(&digest).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_values_name_the_offending_header() {
        let (service, _, token, nonce) = session_with_permission(Some("Get User")).await;
        let guard = RequestGuard::new(&service, "Get User");

        let err = guard
            .pre_check(&["%%%".to_string()], &[nonce])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("authorization token"));

        let err = guard
            .pre_check(&[token], &["%%%".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nOnce token"));
    }

    #[tokio::test]
    async fn test_missing_or_multiple_headers() {
        let (service, _, token, nonce) = session_with_permission(Some("Get User")).await;
        let guard = RequestGuard::new(&service, "Get User");

        assert!(guard.pre_check(&[], &[nonce.clone()]).await.is_err());
        assert!(guard.pre_check(&[token.clone()], &[]).await.is_err());
        assert!(guard
            .pre_check(&[token.clone(), token], &[nonce])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_rotate_extends_token_and_replaces_nonce() {
        let (service, store, token, nonce) = session_with_permission(Some("Get User")).await;
        let guard = RequestGuard::new(&service, "Get User");

        let ctx = guard
            .pre_check(&[token.clone()], &[nonce.clone()])
            .await
            .unwrap();
        let fresh = guard.rotate(&ctx).await.unwrap();

        assert_ne!(fresh, nonce);

        let digest = digest_value(&token, "authorization token").unwrap();
        let extended = store.find_token(&digest).await.unwrap().unwrap();
        assert_eq!(extended.metadata.version, 2);
        assert!(extended.expires_at > expiry_from_now(5));

        // The fresh nonce is spendable exactly once
        let fresh_digest = digest_value(&fresh, "nOnce token").unwrap();
        assert!(store.claim_nonce(&fresh_digest).await.unwrap().is_some());
        assert!(store.claim_nonce(&fresh_digest).await.unwrap().is_none());
    }
}
