//! Persisted diagnostic messages
//!
//! Unexpected errors crossing the HTTP boundary are captured here so
//! operators can review them after the fact.

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for diagnostic messages
pub const MESSAGE_COLLECTION: &str = "messages";

/// Message severity levels
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    #[default]
    Error,
}

/// Diagnostic message document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MessageDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub severity: Severity,

    /// Short label, typically the error variant or source
    pub name: String,

    /// Full message text
    pub description: String,
}

impl MessageDoc {
    pub fn new(id: String, severity: Severity, name: String, description: String) -> Self {
        Self {
            id,
            metadata: Metadata::new(),
            severity,
            name,
            description,
        }
    }
}

impl IntoIndexes for MessageDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![]
    }
}

impl MutMetadata for MessageDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
