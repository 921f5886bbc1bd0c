//! Permission evaluation
//!
//! A user may perform an operation when any of their grants matches the
//! declared permission name case-insensitively, or when they hold the
//! super-admin permission. No grants means no access.

use crate::db::schemas::ALL_ACTIONS_PERMISSION;
use crate::db::store::AuthStore;
use crate::types::Result;

/// Whether `user_id` holds `permission_name` (or the super-admin override)
pub async fn is_authorized(
    store: &dyn AuthStore,
    user_id: &str,
    permission_name: &str,
) -> Result<bool> {
    let grants = store.permission_names_for_user(user_id).await?;

    Ok(grants.iter().any(|granted| {
        granted.eq_ignore_ascii_case(permission_name)
            || granted.eq_ignore_ascii_case(ALL_ACTIONS_PERMISSION)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::UserPermissionDoc;
    use crate::db::store::MemoryAuthStore;

    async fn grant(store: &MemoryAuthStore, user_id: &str, name: &str) {
        store
            .grant_permission(UserPermissionDoc::new(
                uuid::Uuid::new_v4().simple().to_string(),
                user_id.into(),
                "perm-id".into(),
                name.into(),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_exact_grant_authorizes() {
        let store = MemoryAuthStore::new();
        grant(&store, "u1", "Get User").await;

        assert!(is_authorized(&store, "u1", "Get User").await.unwrap());
        assert!(!is_authorized(&store, "u1", "Delete Role").await.unwrap());
    }

    #[tokio::test]
    async fn test_matching_is_case_insensitive() {
        let store = MemoryAuthStore::new();
        grant(&store, "u1", "get user").await;

        assert!(is_authorized(&store, "u1", "GET USER").await.unwrap());
    }

    #[tokio::test]
    async fn test_super_admin_grants_everything() {
        let store = MemoryAuthStore::new();
        grant(&store, "u1", ALL_ACTIONS_PERMISSION).await;

        assert!(is_authorized(&store, "u1", "Delete Role").await.unwrap());
        assert!(is_authorized(&store, "u1", "anything at all").await.unwrap());
    }

    #[tokio::test]
    async fn test_no_grants_authorize_nothing() {
        let store = MemoryAuthStore::new();
        assert!(!is_authorized(&store, "u1", "Get User").await.unwrap());
    }
}
