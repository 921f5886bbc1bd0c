//! Credential exchange and account creation
//!
//! `AuthService` owns the login flow: credentials in, session token plus
//! single-use nonce out. Token and nonce values are random bytes handed to
//! the client base64-encoded; the store only ever sees their SHA-256
//! digests.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::auth::credentials::Credentials;
use crate::auth::password::{self, PasswordParams};
use crate::db::schemas::{NonceDoc, UserDoc, UserPermissionDoc, UserTokenDoc, DEFAULT_ROLE};
use crate::db::store::AuthStore;
use crate::types::{GatehouseError, Result};

/// Token and nonce minting parameters
#[derive(Debug, Clone, Copy)]
pub struct ProtocolParams {
    pub token_ttl_minutes: i64,
    pub nonce_ttl_minutes: i64,
    /// Random bytes per token/nonce value
    pub token_size: usize,
    pub password: PasswordParams,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 10,
            nonce_ttl_minutes: 10,
            token_size: 64,
            password: PasswordParams::default(),
        }
    }
}

/// Fresh session state returned by a successful login
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Base64 token value for the `Authorization` header
    pub token: String,
    /// Base64 nonce value for the `NOnce` header
    pub nonce: String,
}

/// Hex SHA-256 digest of a base64-encoded secret value. `kind` names the
/// header in the error when the value is not valid base64.
pub fn digest_value(value_b64: &str, kind: &str) -> Result<String> {
    let raw = BASE64
        .decode(value_b64.trim())
        .map_err(|_| GatehouseError::InvalidToken(format!("{kind} is not valid base64")))?;
    Ok(hex::encode(Sha256::digest(&raw)))
}

/// Login, token minting, and account creation
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    params: ProtocolParams,
}

impl AuthService {
    pub fn new(store: Arc<dyn AuthStore>, params: ProtocolParams) -> Self {
        Self { store, params }
    }

    pub fn store(&self) -> &Arc<dyn AuthStore> {
        &self.store
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Exchange a `Credentials` header for a session.
    ///
    /// With a valid `existing_token` the caller keeps its token (expiry
    /// extended) and only the nonce is replaced. No store writes happen on
    /// any failure path. User, app, and password failures all collapse
    /// into the same `AuthenticationFailed` so callers cannot tell which
    /// check tripped.
    pub async fn authenticate(
        &self,
        credentials_header: &str,
        existing_token: Option<&str>,
    ) -> Result<TokenPair> {
        let creds = Credentials::parse(credentials_header)?;

        let user = self
            .store
            .find_user_by_username(&creds.username.to_lowercase())
            .await?
            .ok_or_else(|| {
                GatehouseError::AuthenticationFailed(format!(
                    "user '{}' was not found",
                    creds.username
                ))
            })?;

        let app_ok = match self.store.find_app(&creds.app_id).await? {
            Some(app) => app.allows_user(&user.username_lower),
            None => false,
        };
        if !app_ok {
            return Err(auth_failed());
        }

        if !password::verify_password(
            &creds.password,
            &user.password_hash,
            &user.salt,
            &self.params.password,
        )? {
            return Err(auth_failed());
        }

        let token = match existing_token {
            Some(value) => match self.find_valid_token(value).await {
                Ok(Some(existing)) if existing.user_id == user.id => {
                    self.store
                        .extend_token(&existing.value_sha256, self.params.token_ttl_minutes)
                        .await?;
                    debug!(user_id = %user.id, "Extended existing session token");
                    value.to_string()
                }
                _ => self.mint_token(&user.id).await?,
            },
            None => self.mint_token(&user.id).await?,
        };

        let nonce = self.mint_nonce(&user.id).await?;

        Ok(TokenPair { token, nonce })
    }

    /// Look up a live, unexpired token by its base64 value
    pub async fn find_valid_token(&self, value_b64: &str) -> Result<Option<UserTokenDoc>> {
        let digest = digest_value(value_b64, "authorization token")?;
        Ok(self
            .store
            .find_token(&digest)
            .await?
            .filter(|t| t.is_valid()))
    }

    /// Mint and persist a session token, returning its base64 value
    pub async fn mint_token(&self, user_id: &str) -> Result<String> {
        let (value_b64, digest) = self.new_secret();
        let doc = UserTokenDoc::new(
            new_id(),
            user_id.to_string(),
            digest,
            self.params.token_ttl_minutes,
        );
        self.store.insert_token(doc).await?;
        Ok(value_b64)
    }

    /// Mint and persist a single-use nonce, returning its base64 value
    pub async fn mint_nonce(&self, user_id: &str) -> Result<String> {
        let (value_b64, digest) = self.new_secret();
        let doc = NonceDoc::new(
            new_id(),
            user_id.to_string(),
            digest,
            self.params.nonce_ttl_minutes,
        );
        self.store.insert_nonce(doc).await?;
        Ok(value_b64)
    }

    /// Check a candidate password against a user's stored hash.
    /// `NotFound` if no such user exists.
    pub async fn is_password_correct(&self, user_id: &str, candidate: &str) -> Result<bool> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| GatehouseError::NotFound(format!("user {user_id}")))?;

        password::verify_password(
            candidate,
            &user.password_hash,
            &user.salt,
            &self.params.password,
        )
    }

    /// Create a user with the Default role, materializing the role's
    /// template permissions into real grants.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<UserDoc> {
        let mut problems = Vec::new();
        if username.trim().is_empty() {
            problems.push("username must not be empty");
        }
        if password.is_empty() {
            problems.push("password must not be empty");
        }
        if !email.contains('@') {
            problems.push("email is not valid");
        }
        if !problems.is_empty() {
            return Err(GatehouseError::BadRequest(problems.join(", ")));
        }

        if self
            .store
            .find_user_by_username(&username.to_lowercase())
            .await?
            .is_some()
        {
            return Err(GatehouseError::BadRequest(format!(
                "username '{username}' is already taken"
            )));
        }

        let hashed = password::hash_password(password, &self.params.password)?;
        let user = UserDoc::new(
            new_id(),
            username.to_string(),
            email.to_string(),
            hashed.hash,
            hashed.salt,
            DEFAULT_ROLE.to_string(),
        );
        self.store.insert_user(user.clone()).await?;

        self.grant_role_template(&user.id, DEFAULT_ROLE).await?;

        debug!(user_id = %user.id, username = %user.username, "Created user");
        Ok(user)
    }

    /// Copy a role's template permission names into grants for a user
    pub async fn grant_role_template(&self, user_id: &str, role_name: &str) -> Result<()> {
        let Some(role) = self.store.find_role_by_name(role_name).await? else {
            return Ok(());
        };

        for name in &role.permission_names {
            let permission_id = match self.store.find_permission_by_name(name).await? {
                Some(p) => p.id,
                None => continue,
            };
            self.store
                .grant_permission(UserPermissionDoc::new(
                    new_id(),
                    user_id.to_string(),
                    permission_id,
                    name.clone(),
                ))
                .await?;
        }
        Ok(())
    }

    fn new_secret(&self) -> (String, String) {
        let mut raw = vec![0u8; self.params.token_size];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        let value_b64 = BASE64.encode(&raw);
        let digest = hex::encode(Sha256::digest(&raw));
        (value_b64, digest)
    }
}

fn auth_failed() -> GatehouseError {
    GatehouseError::AuthenticationFailed(
        "app not found, user not entitled to app, or password incorrect".into(),
    )
}

/// New document id: uuid v4, simple (dashless) form
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{AppDoc, PermissionDoc, RoleDoc};
    use crate::db::store::MemoryAuthStore;

    const PASSWORD: &str = "reallyBadHardcodedPassword";

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

    async fn seeded_service() -> (AuthService, MemoryAuthStore) {
        let store = MemoryAuthStore::new();
        let service = AuthService::new(Arc::new(store.clone()), fast_params());

        let hashed =
            password::hash_password(PASSWORD, &service.params().password).unwrap();
        let user = UserDoc::new(
            new_id(),
            "superuser".into(),
            "superuser@example.com".into(),
            hashed.hash,
            hashed.salt,
            "Administrator".into(),
        );
        let mut app = AppDoc::new("defaultapp".into(), "Default app".into(), new_id());
        app.usernames.push("superuser".into());

        store.insert_user(user).await.unwrap();
        store.insert_app(app).await.unwrap();

        (service, store)
    }

    #[tokio::test]
    async fn test_login_mints_token_and_nonce() {
        let (service, _) = seeded_service().await;
        let header = Credentials::encode("defaultapp", "superuser", PASSWORD);

        let pair = service.authenticate(&header, None).await.unwrap();

        // 64 random bytes each, base64-decodable
        assert_eq!(BASE64.decode(&pair.token).unwrap().len(), 64);
        assert_eq!(BASE64.decode(&pair.nonce).unwrap().len(), 64);
        assert_ne!(pair.token, pair.nonce);
    }

    #[tokio::test]
    async fn test_login_is_username_case_insensitive() {
        let (service, _) = seeded_service().await;
        let header = Credentials::encode("defaultapp", "SuperUser", PASSWORD);
        assert!(service.authenticate(&header, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_relogin_extends_existing_token() {
        let (service, _) = seeded_service().await;
        let header = Credentials::encode("defaultapp", "superuser", PASSWORD);

        let first = service.authenticate(&header, None).await.unwrap();
        let second = service
            .authenticate(&header, Some(&first.token))
            .await
            .unwrap();

        // Token survives, nonce is replaced
        assert_eq!(first.token, second.token);
        assert_ne!(first.nonce, second.nonce);

        let doc = service.find_valid_token(&first.token).await.unwrap().unwrap();
        assert_eq!(doc.metadata.version, 2);
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_both_fail_closed() {
        let (service, store) = seeded_service().await;

        let unknown = Credentials::encode("defaultapp", "nobody", PASSWORD);
        let err = service.authenticate(&unknown, None).await.unwrap_err();
        assert!(matches!(err, GatehouseError::AuthenticationFailed(_)));

        let wrong_pw = Credentials::encode("defaultapp", "superuser", "wrong");
        let err = service.authenticate(&wrong_pw, None).await.unwrap_err();
        assert!(matches!(err, GatehouseError::AuthenticationFailed(_)));

        let wrong_app = Credentials::encode("otherapp", "superuser", PASSWORD);
        let err = service.authenticate(&wrong_app, None).await.unwrap_err();
        assert!(matches!(err, GatehouseError::AuthenticationFailed(_)));

        // Failures leave no session state behind
        assert!(store.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_credentials_short_circuit() {
        let (service, _) = seeded_service().await;
        let err = service.authenticate("%%%", None).await.unwrap_err();
        assert!(matches!(err, GatehouseError::MalformedCredentials(_)));
    }

    #[tokio::test]
    async fn test_is_password_correct_unknown_user() {
        let (service, _) = seeded_service().await;
        let err = service
            .is_password_correct("missing", PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_user_grants_default_role_template() {
        let (service, store) = seeded_service().await;

        store
            .insert_permission(PermissionDoc::new(
                "p1".into(),
                "Get User".into(),
                String::new(),
            ))
            .await
            .unwrap();
        store
            .insert_role(RoleDoc::new(
                "r1".into(),
                DEFAULT_ROLE.into(),
                vec!["Get User".into()],
            ))
            .await
            .unwrap();

        let user = service
            .create_user("alice", "a-password", "alice@example.com")
            .await
            .unwrap();

        let grants = store.permission_names_for_user(&user.id).await.unwrap();
        assert_eq!(grants, vec!["Get User".to_string()]);
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates_and_bad_input() {
        let (service, _) = seeded_service().await;

        // Existing username, case-insensitive
        let err = service
            .create_user("SUPERUSER", "pw", "s@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::BadRequest(_)));

        let err = service.create_user("bob", "", "bad-email").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("password"));
        assert!(message.contains("email"));
    }
}
