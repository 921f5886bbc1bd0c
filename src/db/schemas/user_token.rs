//! Session token schema
//!
//! A token is a long-lived bearer credential. Only a SHA-256 digest of the
//! random value is stored; lookups go through the digest so the store
//! never compares raw byte arrays.

use bson::{doc, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for session tokens
pub const USER_TOKEN_COLLECTION: &str = "user_tokens";

/// Session token document
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserTokenDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owning user
    pub user_id: String,

    /// Hex SHA-256 digest of the token's random value
    pub value_sha256: String,

    /// When the token expires; pushed forward on every successful guarded call
    #[serde(default = "DateTime::now")]
    pub expires_at: DateTime,
}

impl UserTokenDoc {
    /// Create a new token record expiring `ttl_minutes` from now
    pub fn new(id: String, user_id: String, value_sha256: String, ttl_minutes: i64) -> Self {
        Self {
            id,
            metadata: Metadata::new(),
            user_id,
            value_sha256,
            expires_at: expiry_from_now(ttl_minutes),
        }
    }

    /// A token is valid only while not deleted and not expired
    pub fn is_valid(&self) -> bool {
        !self.metadata.is_deleted && DateTime::now() < self.expires_at
    }
}

// bson::DateTime has no Default, so the derive cannot be used here
impl Default for UserTokenDoc {
    fn default() -> Self {
        Self {
            id: String::new(),
            metadata: Metadata::new(),
            user_id: String::new(),
            value_sha256: String::new(),
            expires_at: DateTime::now(),
        }
    }
}

/// Compute an expiry timestamp `minutes` from now
pub fn expiry_from_now(minutes: i64) -> DateTime {
    DateTime::from_chrono(chrono::Utc::now() + chrono::Duration::minutes(minutes))
}

impl IntoIndexes for UserTokenDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "value_sha256": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("token_value_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("token_user_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserTokenDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
