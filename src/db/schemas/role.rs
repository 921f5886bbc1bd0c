//! Role document schema
//!
//! A role is a named bundle of template permission grants. New users get
//! real permission grants materialized from their role's template.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for roles
pub const ROLE_COLLECTION: &str = "roles";

/// Role name assigned to newly registered users
pub const DEFAULT_ROLE: &str = "Default";

/// Role document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RoleDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Role name (e.g. "Administrator", "Default")
    pub name: String,

    /// Permission names granted to users created with this role
    #[serde(default)]
    pub permission_names: Vec<String>,
}

impl RoleDoc {
    pub fn new(id: String, name: String, permission_names: Vec<String>) -> Self {
        Self {
            id,
            metadata: Metadata::new(),
            name,
            permission_names,
        }
    }
}

impl IntoIndexes for RoleDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "name": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("role_name_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for RoleDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
