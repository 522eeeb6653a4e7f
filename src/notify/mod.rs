//! Outbound notification
//!
//! Delivers the sanction letter to the customer. A single attempt, no retry;
//! any failure is returned to the caller.

use crate::config::MailConfig;
use crate::error::OrchestrationError;
use crate::models::{DocumentReference, NotificationAck};
use crate::Result;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

pub const SANCTION_SUBJECT: &str = "Your Sanction Letter";
pub const SANCTION_BODY: &str = "Please find attached your sanction letter.";

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        document: &DocumentReference,
    ) -> Result<NotificationAck>;
}

/// Posts mail with the document attached to an HTTP mail relay.
pub struct HttpMailRelay {
    client: Client,
    relay_url: String,
    token: Option<String>,
    from: String,
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    attachments: Vec<RelayAttachment>,
}

#[derive(Debug, Serialize)]
struct RelayAttachment {
    filename: String,
    content_type: &'static str,
    content: String,
}

impl HttpMailRelay {
    pub fn new(config: &MailConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            relay_url: config.relay_url.clone(),
            token: config.token.clone(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Notifier for HttpMailRelay {
    fn name(&self) -> &'static str {
        "mail-relay"
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        document: &DocumentReference,
    ) -> Result<NotificationAck> {
        if to.trim().is_empty() {
            return Err(OrchestrationError::CollaboratorFailure(
                "customer has no email address".to_string(),
            ));
        }

        let bytes = tokio::fs::read(&document.location).await.map_err(|e| {
            OrchestrationError::CollaboratorFailure(format!(
                "cannot read attachment {}: {}",
                document.location.display(),
                e
            ))
        })?;

        let message = RelayMessage {
            from: &self.from,
            to,
            subject,
            text: body,
            attachments: vec![RelayAttachment {
                filename: document.file_name.clone(),
                content_type: "text/html",
                content: base64::engine::general_purpose::STANDARD.encode(bytes),
            }],
        };

        let mut request = self.client.post(&self.relay_url).json(&message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            OrchestrationError::CollaboratorFailure(format!("mail relay request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OrchestrationError::CollaboratorFailure(format!(
                "mail relay returned {}: {}",
                status, detail
            )));
        }

        let message_id = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string));

        info!(recipient = to, document = %document, "Sanction letter mailed");

        Ok(NotificationAck {
            recipient: to.to_string(),
            message_id,
        })
    }
}

/// Development notifier: records the delivery in the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
        document: &DocumentReference,
    ) -> Result<NotificationAck> {
        warn!(
            recipient = to,
            subject,
            document = %document,
            "MAIL_RELAY_URL not configured, notification logged only"
        );
        Ok(NotificationAck {
            recipient: to.to_string(),
            message_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relay_fails_loudly_without_attachment() {
        let relay = HttpMailRelay::new(
            &MailConfig {
                relay_url: "http://127.0.0.1:9/send".to_string(),
                token: None,
                from: "loans@example.com".to_string(),
            },
            Duration::from_secs(1),
        )
        .unwrap();

        let document = DocumentReference {
            file_name: "missing.html".to_string(),
            location: "/nonexistent/missing.html".into(),
        };

        let err = relay
            .send("a@example.com", SANCTION_SUBJECT, SANCTION_BODY, &document)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::CollaboratorFailure(_)));

        let err = relay
            .send("", SANCTION_SUBJECT, SANCTION_BODY, &document)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no email"));
    }

    #[tokio::test]
    async fn test_log_notifier_acks() {
        let document = DocumentReference {
            file_name: "x.html".to_string(),
            location: "x.html".into(),
        };
        let ack = LogNotifier
            .send("a@example.com", SANCTION_SUBJECT, SANCTION_BODY, &document)
            .await
            .unwrap();
        assert_eq!(ack.recipient, "a@example.com");
    }
}
