//! Single-use nonce schema
//!
//! Each guarded request consumes exactly one nonce. Like tokens, only a
//! SHA-256 digest of the random value is persisted. A nonce that has been
//! claimed is soft-deleted and can never validate again.

use bson::{doc, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::user_token::expiry_from_now;
use crate::db::schemas::Metadata;

/// Collection name for nonces
pub const NONCE_COLLECTION: &str = "nonces";

/// Single-use nonce document
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NonceDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owning user
    pub user_id: String,

    /// Hex SHA-256 digest of the nonce's random value
    pub value_sha256: String,

    #[serde(default = "DateTime::now")]
    pub expires_at: DateTime,
}

impl NonceDoc {
    pub fn new(id: String, user_id: String, value_sha256: String, ttl_minutes: i64) -> Self {
        Self {
            id,
            metadata: Metadata::new(),
            user_id,
            value_sha256,
            expires_at: expiry_from_now(ttl_minutes),
        }
    }

    /// A nonce is spendable only while not claimed and not expired
    pub fn is_valid(&self) -> bool {
        !self.metadata.is_deleted && DateTime::now() < self.expires_at
    }
}

// bson::DateTime has no Default, so the derive cannot be used here
impl Default for NonceDoc {
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

impl IntoIndexes for NonceDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "value_sha256": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("nonce_value_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("nonce_user_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for NonceDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_nonce_is_never_valid() {
        assert!(!NonceDoc::default().is_valid());
    }

    #[test]
    fn test_fresh_nonce_is_valid() {
        let nonce = NonceDoc::new("n1".into(), "u1".into(), "cd".repeat(32), 10);
        assert!(nonce.is_valid());
    }

    #[test]
    fn test_claimed_nonce_is_invalid() {
        let mut nonce = NonceDoc::new("n1".into(), "u1".into(), "cd".repeat(32), 10);
        nonce.metadata.mark_deleted();
        assert!(!nonce.is_valid());
    }
}
