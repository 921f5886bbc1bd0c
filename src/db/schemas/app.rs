//! App document schema
//!
//! An App represents an API consumer. Authentication confirms not just the
//! user's password but also that the user is a member of the requesting app.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for apps
pub const APP_COLLECTION: &str = "apps";

/// API consumer document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AppDoc {
    /// App identifier, supplied by the caller in the credential payload
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub description: String,

    /// Shared secret for the app
    #[serde(default)]
    pub secret: String,

    /// Lowercased usernames of the users entitled to use this app
    #[serde(default)]
    pub usernames: Vec<String>,
}

impl AppDoc {
    pub fn new(id: String, description: String, secret: String) -> Self {
        Self {
            id,
            metadata: Metadata::new(),
            description,
            secret,
            usernames: Vec::new(),
        }
    }

    /// Whether the given user (lowercased username) may use this app
    pub fn allows_user(&self, username_lower: &str) -> bool {
        self.usernames.iter().any(|u| u == username_lower)
    }
}

impl IntoIndexes for AppDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        Vec::new()
    }
}

impl MutMetadata for AppDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
