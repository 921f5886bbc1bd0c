//! Storage abstraction for authentication state
//!
//! `AuthStore` is the seam between the protocol logic and persistence.
//! `MongoAuthStore` backs production deployments; `MemoryAuthStore` backs
//! dev mode and unit tests with the same semantics, including atomic
//! nonce claiming.

use async_trait::async_trait;
use bson::{doc, DateTime};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{
    expiry_from_now, AppDoc, MessageDoc, NonceDoc, PermissionDoc, RoleDoc, UserDoc,
    UserPermissionDoc, UserTokenDoc, APP_COLLECTION, MESSAGE_COLLECTION, NONCE_COLLECTION,
    PERMISSION_COLLECTION, ROLE_COLLECTION, USER_COLLECTION, USER_PERMISSION_COLLECTION,
    USER_TOKEN_COLLECTION,
};
use crate::types::{GatehouseError, Result};

/// Persistence operations required by the credential-exchange protocol
#[async_trait]
pub trait AuthStore: Send + Sync {
    // users
    async fn find_user_by_username(&self, username_lower: &str) -> Result<Option<UserDoc>>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserDoc>>;
    async fn insert_user(&self, user: UserDoc) -> Result<()>;
    async fn list_users(&self) -> Result<Vec<UserDoc>>;
    async fn soft_delete_user(&self, id: &str) -> Result<bool>;

    // apps
    async fn find_app(&self, app_id: &str) -> Result<Option<AppDoc>>;
    async fn insert_app(&self, app: AppDoc) -> Result<()>;

    // tokens
    async fn insert_token(&self, token: UserTokenDoc) -> Result<()>;
    async fn find_token(&self, value_sha256: &str) -> Result<Option<UserTokenDoc>>;
    /// Push a live token's expiry `ttl_minutes` into the future.
    /// `NotFound` if no live token matches.
    async fn extend_token(&self, value_sha256: &str, ttl_minutes: i64) -> Result<()>;
    async fn invalidate_token(&self, value_sha256: &str) -> Result<()>;

    // nonces
    async fn insert_nonce(&self, nonce: NonceDoc) -> Result<()>;
    /// Atomically consume a nonce. At most one caller receives the document
    /// for a given value; every later claim on it returns `None`.
    async fn claim_nonce(&self, value_sha256: &str) -> Result<Option<NonceDoc>>;
    /// Soft-delete a nonce without reading it. No-op if missing.
    async fn invalidate_nonce(&self, value_sha256: &str) -> Result<()>;

    // permissions
    async fn permission_names_for_user(&self, user_id: &str) -> Result<Vec<String>>;
    async fn find_permission_by_name(&self, name: &str) -> Result<Option<PermissionDoc>>;
    async fn insert_permission(&self, permission: PermissionDoc) -> Result<()>;
    async fn grant_permission(&self, grant: UserPermissionDoc) -> Result<()>;

    // roles
    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleDoc>>;
    async fn insert_role(&self, role: RoleDoc) -> Result<()>;
    async fn list_roles(&self) -> Result<Vec<RoleDoc>>;
    async fn soft_delete_role(&self, id: &str) -> Result<bool>;

    // diagnostics
    async fn record_message(&self, message: MessageDoc) -> Result<()>;
}

/// MongoDB-backed store
#[derive(Clone)]
pub struct MongoAuthStore {
    users: MongoCollection<UserDoc>,
    apps: MongoCollection<AppDoc>,
    tokens: MongoCollection<UserTokenDoc>,
    nonces: MongoCollection<NonceDoc>,
    permissions: MongoCollection<PermissionDoc>,
    user_permissions: MongoCollection<UserPermissionDoc>,
    roles: MongoCollection<RoleDoc>,
    messages: MongoCollection<MessageDoc>,
}

impl MongoAuthStore {
    /// Open all collections and apply their indexes
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: client.collection(USER_COLLECTION).await?,
            apps: client.collection(APP_COLLECTION).await?,
            tokens: client.collection(USER_TOKEN_COLLECTION).await?,
            nonces: client.collection(NONCE_COLLECTION).await?,
            permissions: client.collection(PERMISSION_COLLECTION).await?,
            user_permissions: client.collection(USER_PERMISSION_COLLECTION).await?,
            roles: client.collection(ROLE_COLLECTION).await?,
            messages: client.collection(MESSAGE_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl AuthStore for MongoAuthStore {
    async fn find_user_by_username(&self, username_lower: &str) -> Result<Option<UserDoc>> {
        self.users
            .find_one(doc! { "username_lower": username_lower })
            .await
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "_id": id }).await
    }

    async fn insert_user(&self, user: UserDoc) -> Result<()> {
        self.users.insert_one(user).await
    }

    async fn list_users(&self) -> Result<Vec<UserDoc>> {
        self.users.find_many(doc! {}).await
    }

    async fn soft_delete_user(&self, id: &str) -> Result<bool> {
        let result = self.users.soft_delete(doc! { "_id": id }).await?;
        Ok(result.modified_count > 0)
    }

    async fn find_app(&self, app_id: &str) -> Result<Option<AppDoc>> {
        self.apps.find_one(doc! { "_id": app_id }).await
    }

    async fn insert_app(&self, app: AppDoc) -> Result<()> {
        self.apps.insert_one(app).await
    }

    async fn insert_token(&self, token: UserTokenDoc) -> Result<()> {
        self.tokens.insert_one(token).await
    }

    async fn find_token(&self, value_sha256: &str) -> Result<Option<UserTokenDoc>> {
        self.tokens
            .find_one(doc! { "value_sha256": value_sha256 })
            .await
    }

    async fn extend_token(&self, value_sha256: &str, ttl_minutes: i64) -> Result<()> {
        let result = self
            .tokens
            .update_one(
                doc! {
                    "value_sha256": value_sha256,
                    "metadata.is_deleted": { "$ne": true },
                },
                doc! {
                    "$set": {
                        "expires_at": expiry_from_now(ttl_minutes),
                        "metadata.updated_at": DateTime::now(),
                    },
                    "$inc": { "metadata.version": 1 },
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(GatehouseError::NotFound("token".into()));
        }
        Ok(())
    }

    async fn invalidate_token(&self, value_sha256: &str) -> Result<()> {
        self.tokens
            .soft_delete(doc! { "value_sha256": value_sha256 })
            .await?;
        Ok(())
    }

    async fn insert_nonce(&self, nonce: NonceDoc) -> Result<()> {
        self.nonces.insert_one(nonce).await
    }

    async fn claim_nonce(&self, value_sha256: &str) -> Result<Option<NonceDoc>> {
        self.nonces
            .claim_one(doc! { "value_sha256": value_sha256 })
            .await
    }

    async fn invalidate_nonce(&self, value_sha256: &str) -> Result<()> {
        self.nonces
            .soft_delete(doc! { "value_sha256": value_sha256 })
            .await?;
        Ok(())
    }

    async fn permission_names_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        let grants = self
            .user_permissions
            .find_many(doc! { "user_id": user_id })
            .await?;

        Ok(grants.into_iter().map(|g| g.permission_value).collect())
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<PermissionDoc>> {
        self.permissions.find_one(doc! { "name": name }).await
    }

    async fn insert_permission(&self, permission: PermissionDoc) -> Result<()> {
        self.permissions.insert_one(permission).await
    }

    async fn grant_permission(&self, grant: UserPermissionDoc) -> Result<()> {
        self.user_permissions.insert_one(grant).await
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleDoc>> {
        self.roles.find_one(doc! { "name": name }).await
    }

    async fn insert_role(&self, role: RoleDoc) -> Result<()> {
        self.roles.insert_one(role).await
    }

    async fn list_roles(&self) -> Result<Vec<RoleDoc>> {
        self.roles.find_many(doc! {}).await
    }

    async fn soft_delete_role(&self, id: &str) -> Result<bool> {
        let result = self.roles.soft_delete(doc! { "_id": id }).await?;
        Ok(result.modified_count > 0)
    }

    async fn record_message(&self, message: MessageDoc) -> Result<()> {
        self.messages.insert_one(message).await
    }
}

#[derive(Default)]
struct MemoryInner {
    users: HashMap<String, UserDoc>,
    apps: HashMap<String, AppDoc>,
    // tokens and nonces keyed by value digest, matching the unique index
    tokens: HashMap<String, UserTokenDoc>,
    nonces: HashMap<String, NonceDoc>,
    permissions: HashMap<String, PermissionDoc>,
    user_permissions: Vec<UserPermissionDoc>,
    roles: HashMap<String, RoleDoc>,
    messages: Vec<MessageDoc>,
}

/// In-memory store for dev mode and tests
#[derive(Clone, Default)]
pub struct MemoryAuthStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn stamp<T: crate::db::mongo::MutMetadata>(mut item: T) -> T {
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());
        item
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn find_user_by_username(&self, username_lower: &str) -> Result<Option<UserDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| !u.metadata.is_deleted && u.username_lower == username_lower)
            .cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(id)
            .filter(|u| !u.metadata.is_deleted)
            .cloned())
    }

    async fn insert_user(&self, user: UserDoc) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = Self::stamp(user);
        inner.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .filter(|u| !u.metadata.is_deleted)
            .cloned()
            .collect())
    }

    async fn soft_delete_user(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(id) {
            Some(user) if !user.metadata.is_deleted => {
                user.metadata.mark_deleted();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_app(&self, app_id: &str) -> Result<Option<AppDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .apps
            .get(app_id)
            .filter(|a| !a.metadata.is_deleted)
            .cloned())
    }

    async fn insert_app(&self, app: AppDoc) -> Result<()> {
        let mut inner = self.inner.write().await;
        let app = Self::stamp(app);
        inner.apps.insert(app.id.clone(), app);
        Ok(())
    }

    async fn insert_token(&self, token: UserTokenDoc) -> Result<()> {
        let mut inner = self.inner.write().await;
        let token = Self::stamp(token);
        inner.tokens.insert(token.value_sha256.clone(), token);
        Ok(())
    }

    async fn find_token(&self, value_sha256: &str) -> Result<Option<UserTokenDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tokens
            .get(value_sha256)
            .filter(|t| !t.metadata.is_deleted)
            .cloned())
    }

    async fn extend_token(&self, value_sha256: &str, ttl_minutes: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.tokens.get_mut(value_sha256) {
            Some(token) if !token.metadata.is_deleted => {
                token.expires_at = expiry_from_now(ttl_minutes);
                token.metadata.touch();
                Ok(())
            }
            _ => Err(GatehouseError::NotFound("token".into())),
        }
    }

    async fn invalidate_token(&self, value_sha256: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(token) = inner.tokens.get_mut(value_sha256) {
            token.metadata.mark_deleted();
        }
        Ok(())
    }

    async fn insert_nonce(&self, nonce: NonceDoc) -> Result<()> {
        let mut inner = self.inner.write().await;
        let nonce = Self::stamp(nonce);
        inner.nonces.insert(nonce.value_sha256.clone(), nonce);
        Ok(())
    }

    async fn claim_nonce(&self, value_sha256: &str) -> Result<Option<NonceDoc>> {
        // Single write-lock section keeps the check-and-mark atomic
        let mut inner = self.inner.write().await;
        match inner.nonces.get_mut(value_sha256) {
            Some(nonce) if !nonce.metadata.is_deleted => {
                let before = nonce.clone();
                nonce.metadata.mark_deleted();
                Ok(Some(before))
            }
            _ => Ok(None),
        }
    }

    async fn invalidate_nonce(&self, value_sha256: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(nonce) = inner.nonces.get_mut(value_sha256) {
            nonce.metadata.mark_deleted();
        }
        Ok(())
    }

    async fn permission_names_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .user_permissions
            .iter()
            .filter(|g| !g.metadata.is_deleted && g.user_id == user_id)
            .map(|g| g.permission_value.clone())
            .collect())
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<PermissionDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .permissions
            .values()
            .find(|p| !p.metadata.is_deleted && p.name == name)
            .cloned())
    }

    async fn insert_permission(&self, permission: PermissionDoc) -> Result<()> {
        let mut inner = self.inner.write().await;
        let permission = Self::stamp(permission);
        inner.permissions.insert(permission.id.clone(), permission);
        Ok(())
    }

    async fn grant_permission(&self, grant: UserPermissionDoc) -> Result<()> {
        let mut inner = self.inner.write().await;
        let grant = Self::stamp(grant);
        inner.user_permissions.push(grant);
        Ok(())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .roles
            .values()
            .find(|r| !r.metadata.is_deleted && r.name == name)
            .cloned())
    }

    async fn insert_role(&self, role: RoleDoc) -> Result<()> {
        let mut inner = self.inner.write().await;
        let role = Self::stamp(role);
        inner.roles.insert(role.id.clone(), role);
        Ok(())
    }

    async fn list_roles(&self) -> Result<Vec<RoleDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .roles
            .values()
            .filter(|r| !r.metadata.is_deleted)
            .cloned()
            .collect())
    }

    async fn soft_delete_role(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.roles.get_mut(id) {
            Some(role) if !role.metadata.is_deleted => {
                role.metadata.mark_deleted();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_message(&self, message: MessageDoc) -> Result<()> {
        let mut inner = self.inner.write().await;
        let message = Self::stamp(message);
        inner.messages.push(message);
        Ok(())
    }
}

impl MemoryAuthStore {
    /// Recorded diagnostic messages, newest last. Test-facing.
    pub async fn messages(&self) -> Vec<MessageDoc> {
        self.inner.read().await.messages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str) -> UserTokenDoc {
        UserTokenDoc::new(uuid::Uuid::new_v4().simple().to_string(), "u1".into(), value.into(), 10)
    }

    fn nonce(value: &str) -> NonceDoc {
        NonceDoc::new(uuid::Uuid::new_v4().simple().to_string(), "u1".into(), value.into(), 10)
    }

    #[tokio::test]
    async fn test_claim_nonce_is_single_use() {
        let store = MemoryAuthStore::new();
        store.insert_nonce(nonce("abc")).await.unwrap();

        let first = store.claim_nonce("abc").await.unwrap();
        assert!(first.is_some());

        let second = store.claim_nonce("abc").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let store = MemoryAuthStore::new();
        store.insert_nonce(nonce("race")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.claim_nonce("race").await },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_extend_token_bumps_expiry_and_version() {
        let store = MemoryAuthStore::new();
        let mut t = token("tok");
        t.expires_at = expiry_from_now(1);
        store.insert_token(t).await.unwrap();

        store.extend_token("tok", 10).await.unwrap();

        let extended = store.find_token("tok").await.unwrap().unwrap();
        assert!(extended.expires_at > expiry_from_now(5));
        assert_eq!(extended.metadata.version, 2);
    }

    #[tokio::test]
    async fn test_extend_missing_token_is_not_found() {
        let store = MemoryAuthStore::new();
        let err = store.extend_token("nope", 10).await.unwrap_err();
        assert!(matches!(err, GatehouseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalidated_nonce_cannot_be_claimed() {
        let store = MemoryAuthStore::new();
        store.insert_nonce(nonce("gone")).await.unwrap();

        store.invalidate_nonce("gone").await.unwrap();
        assert!(store.claim_nonce("gone").await.unwrap().is_none());

        // Invalidating again, or a value never issued, is a no-op
        store.invalidate_nonce("gone").await.unwrap();
        store.invalidate_nonce("never-issued").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidated_token_is_not_found_again() {
        let store = MemoryAuthStore::new();
        store.insert_token(token("tok")).await.unwrap();

        store.invalidate_token("tok").await.unwrap();
        assert!(store.find_token("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_soft_deleted_user_disappears_from_queries() {
        let store = MemoryAuthStore::new();
        let user = UserDoc::new(
            "u1".into(),
            "Alice".into(),
            "alice@example.com".into(),
            "hash".into(),
            "salt".into(),
            "Default".into(),
        );
        store.insert_user(user).await.unwrap();

        assert!(store.soft_delete_user("u1").await.unwrap());
        assert!(store.find_user_by_id("u1").await.unwrap().is_none());
        assert!(store
            .find_user_by_username("alice")
            .await
            .unwrap()
            .is_none());
        assert!(store.list_users().await.unwrap().is_empty());

        // Second delete is a no-op
        assert!(!store.soft_delete_user("u1").await.unwrap());
    }
}
