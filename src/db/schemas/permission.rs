//! Permission and user-permission grant schemas
//!
//! Permissions are named capabilities (e.g. "Get User"). They are
//! registered automatically at startup from the permissions declared on
//! route guards. A UserPermissionDoc grants one permission to one user.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for permissions
pub const PERMISSION_COLLECTION: &str = "permissions";

/// Collection name for user permission grants
pub const USER_PERMISSION_COLLECTION: &str = "user_permissions";

/// Distinguished permission name that satisfies every authorization check
pub const ALL_ACTIONS_PERMISSION: &str = "Administrator.AllActions";

/// Named capability gating one operation
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PermissionDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Permission name; matched case-insensitively during authorization
    pub name: String,

    #[serde(default)]
    pub description: String,
}

impl PermissionDoc {
    pub fn new(id: String, name: String, description: String) -> Self {
        Self {
            id,
            metadata: Metadata::new(),
            name,
            description,
        }
    }
}

impl IntoIndexes for PermissionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "name": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("permission_name_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for PermissionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Grant of one permission to one user. Uniqueness per (user, permission)
/// is expected but not structurally enforced.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserPermissionDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    pub permission_id: String,

    /// Grant value; matched against declared permission names
    #[serde(default)]
    pub permission_value: String,
}

impl UserPermissionDoc {
    pub fn new(id: String, user_id: String, permission_id: String, permission_value: String) -> Self {
        Self {
            id,
            metadata: Metadata::new(),
            user_id,
            permission_id,
            permission_value,
        }
    }
}

impl IntoIndexes for UserPermissionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user_id": 1 },
            Some(
                IndexOptions::builder()
                    .name("user_permission_user_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for UserPermissionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
