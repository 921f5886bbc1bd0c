//! Common metadata for all documents
//!
//! Tracks soft deletion, timestamps, and the optimistic-concurrency
//! version counter shared by every entity.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Metadata {
    /// Whether this document has been soft-deleted
    #[serde(default)]
    pub is_deleted: bool,

    /// When the document was soft-deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    /// When the document was last updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// When the document was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    /// Version counter, incremented on every mutation
    #[serde(default = "default_version")]
    pub version: i64,
}

fn default_version() -> i64 {
    1
}

impl Metadata {
    /// Create new metadata with current timestamp and version 1
    pub fn new() -> Self {
        Self {
            is_deleted: false,
            deleted_at: None,
            updated_at: Some(DateTime::now()),
            created_at: Some(DateTime::now()),
            version: 1,
        }
    }

    /// Mark the document updated and bump the version
    pub fn touch(&mut self) {
        self.updated_at = Some(DateTime::now());
        self.version += 1;
    }

    /// Soft-delete the document
    pub fn mark_deleted(&mut self) {
        self.is_deleted = true;
        self.deleted_at = Some(DateTime::now());
        self.touch();
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}
