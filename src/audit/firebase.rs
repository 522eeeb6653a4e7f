//! Firebase Realtime Database audit log
//!
//! Messages are pushed to `sessions/<id>/messages.json`, metadata is
//! merged into `sessions/<id>/meta.json`.

use super::AuditSink;
use crate::config::FirebaseConfig;
use crate::error::OrchestrationError;
use crate::session::MessageRole;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;

pub struct FirebaseAuditLog {
    client: Client,
    database_url: String,
    api_key: String,
}

impl FirebaseAuditLog {
    pub fn new(config: &FirebaseConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            database_url: config.database_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, session_id: &str, leaf: &str) -> String {
        format!(
            "{}/sessions/{}/{}.json?auth={}",
            self.database_url, session_id, leaf, self.api_key
        )
    }
}

fn message_record(role: MessageRole, text: &str) -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "sender": role.as_str(),
        "message": text,
    })
}

fn check_status(response: reqwest::Response, what: &str) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(OrchestrationError::CollaboratorUnavailable(format!(
            "firebase {} returned {}",
            what,
            response.status()
        )))
    }
}

#[async_trait]
impl AuditSink for FirebaseAuditLog {
    fn name(&self) -> &'static str {
        "firebase"
    }

    async fn append_message(&self, session_id: &str, role: MessageRole, text: &str) -> Result<()> {
        let body = message_record(role, text);

        let response = self
            .client
            .post(self.url(session_id, "messages"))
            .json(&body)
            .send()
            .await?;
        check_status(response, "message append")
    }

    async fn patch_meta(&self, session_id: &str, fields: Map<String, Value>) -> Result<()> {
        let response = self
            .client
            .patch(self.url(session_id, "meta"))
            .json(&Value::Object(fields))
            .send()
            .await?;
        check_status(response, "meta patch")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(database_url: &str) -> FirebaseAuditLog {
        let config = FirebaseConfig {
            database_url: database_url.to_string(),
            api_key: "secret".to_string(),
        };
        FirebaseAuditLog::new(&config, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_session_paths() {
        let log = log("https://loans.firebaseio.com/");

        assert_eq!(
            log.url("sess_1", "messages"),
            "https://loans.firebaseio.com/sessions/sess_1/messages.json?auth=secret"
        );
        assert_eq!(
            log.url("sess_1", "meta"),
            "https://loans.firebaseio.com/sessions/sess_1/meta.json?auth=secret"
        );
    }

    #[test]
    fn test_message_record_shape() {
        let record = message_record(MessageRole::Assistant, "Processing request...");

        assert_eq!(record["sender"], json!("assistant"));
        assert_eq!(record["message"], json!("Processing request..."));
        assert!(record["timestamp"].as_str().unwrap().contains('T'));
    }
}
