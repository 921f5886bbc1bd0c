//! Durable audit log for unexpected failures
//!
//! Errors the client only sees as a generic 500 are written to the
//! message collection so operators can inspect them later. Audit writes
//! never fail a request; a store outage here is logged and dropped.

use std::sync::Arc;
use tracing::{error, warn};

use crate::db::schemas::{MessageDoc, Severity};
use crate::db::store::AuthStore;

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuthStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Record an unexpected server-side failure
    pub async fn record_failure(&self, name: &str, description: &str) {
        error!(%name, "{}", description);

        let message = MessageDoc::new(
            crate::auth::new_id(),
            Severity::Error,
            name.to_string(),
            description.to_string(),
        );

        if let Err(e) = self.store.record_message(message).await {
            warn!("Failed to persist audit message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MemoryAuthStore;

    #[tokio::test]
    async fn test_failures_are_persisted() {
        let store = MemoryAuthStore::new();
        let audit = AuditLogger::new(Arc::new(store.clone()));

        audit.record_failure("Database", "connection refused").await;

        let messages = store.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].name, "Database");
        assert_eq!(messages[0].severity, Severity::Error);
    }
}
