//! User document schema
//!
//! Stores account credentials (PBKDF2 hash + salt) and lockout state.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// Document ID
    #[serde(rename = "_id")]
    pub id: String,

    /// Common metadata (created_at, updated_at, is_deleted, version)
    #[serde(default)]
    pub metadata: Metadata,

    /// Username as entered at registration
    pub username: String,

    /// Lowercased username; usernames are unique case-insensitively
    pub username_lower: String,

    /// Email address
    pub email: String,

    /// Base64-encoded PBKDF2 password hash
    pub password_hash: String,

    /// Base64-encoded salt used to derive the hash
    pub salt: String,

    /// Consecutive failed login attempts
    #[serde(default)]
    pub failed_login_attempts: i32,

    #[serde(default)]
    pub is_email_confirmed: bool,

    #[serde(default)]
    pub is_locked_out: bool,

    #[serde(default)]
    pub is_lockout_enabled: bool,

    /// Name of the role assigned at registration
    pub role: String,

    /// Owning client, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl UserDoc {
    /// Create a new user document
    pub fn new(
        id: String,
        username: String,
        email: String,
        password_hash: String,
        salt: String,
        role: String,
    ) -> Self {
        let username_lower = username.to_lowercase();
        Self {
            id,
            metadata: Metadata::new(),
            username,
            username_lower,
            email,
            password_hash,
            salt,
            failed_login_attempts: 0,
            is_email_confirmed: false,
            is_locked_out: false,
            is_lockout_enabled: true,
            role,
            client_id: None,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "username_lower": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("username_lower_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
