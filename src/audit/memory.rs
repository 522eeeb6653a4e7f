//! In-memory audit log for development and tests

use super::AuditSink;
use crate::session::MessageRole;
use crate::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub role: MessageRole,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Default, Clone)]
pub struct InMemoryAuditLog {
    messages: Arc<RwLock<HashMap<String, Vec<AuditEntry>>>>,
    meta: Arc<RwLock<HashMap<String, Map<String, Value>>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self, session_id: &str) -> Vec<AuditEntry> {
        let messages = self.messages.read().await;
        messages.get(session_id).cloned().unwrap_or_default()
    }

    pub async fn meta(&self, session_id: &str) -> Map<String, Value> {
        let meta = self.meta.read().await;
        meta.get(session_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn append_message(&self, session_id: &str, role: MessageRole, text: &str) -> Result<()> {
        let mut messages = self.messages.write().await;
        messages
            .entry(session_id.to_string())
            .or_default()
            .push(AuditEntry {
                role,
                text: text.to_string(),
                timestamp: chrono::Utc::now(),
            });
        Ok(())
    }

    async fn patch_meta(&self, session_id: &str, fields: Map<String, Value>) -> Result<()> {
        let mut meta = self.meta.write().await;
        meta.entry(session_id.to_string())
            .or_default()
            .extend(fields);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_meta_patches_merge() {
        let log = InMemoryAuditLog::new();

        let mut first = Map::new();
        first.insert("customer_name".into(), json!("Ramesh S."));
        first.insert("email".into(), json!("old@example.com"));
        log.patch_meta("sess_m", first).await.unwrap();

        let mut second = Map::new();
        second.insert("email".into(), json!("ramesh@example.com"));
        log.patch_meta("sess_m", second).await.unwrap();

        let meta = log.meta("sess_m").await;
        assert_eq!(meta["customer_name"], json!("Ramesh S."));
        assert_eq!(meta["email"], json!("ramesh@example.com"));
    }
}
