//! Conversation audit trail
//!
//! Every user and assistant message and the session metadata are mirrored
//! to an external key-value log. Writes are best-effort: failures and
//! timeouts are logged and swallowed, never surfaced to the turn.

use crate::config::AppConfig;
use crate::models::SanctionRecord;
use crate::session::MessageRole;
use crate::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub mod firebase;
pub mod memory;
pub mod postgres;

pub use firebase::FirebaseAuditLog;
pub use memory::InMemoryAuditLog;
pub use postgres::PostgresAuditLog;

/// External audit log.
#[async_trait]
pub trait AuditSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn append_message(&self, session_id: &str, role: MessageRole, text: &str) -> Result<()>;

    /// Merge `fields` into the session's metadata record.
    async fn patch_meta(&self, session_id: &str, fields: Map<String, Value>) -> Result<()>;
}

/// Fire-and-forget wrapper around an `AuditSink`.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Option<Arc<dyn AuditSink>>,
    timeout: Duration,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>, timeout: Duration) -> Self {
        Self {
            sink: Some(sink),
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self {
            sink: None,
            timeout: Duration::from_secs(1),
        }
    }

    pub async fn message(&self, session_id: &str, role: MessageRole, text: &str) {
        let Some(sink) = &self.sink else {
            return;
        };

        match tokio::time::timeout(self.timeout, sink.append_message(session_id, role, text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(session_id, sink = sink.name(), "Audit message write failed: {}", e),
            Err(_) => warn!(session_id, sink = sink.name(), "Audit message write timed out"),
        }
    }

    pub async fn meta(&self, session_id: &str, fields: Map<String, Value>) {
        let Some(sink) = &self.sink else {
            return;
        };

        match tokio::time::timeout(self.timeout, sink.patch_meta(session_id, fields)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(session_id, sink = sink.name(), "Audit meta patch failed: {}", e),
            Err(_) => warn!(session_id, sink = sink.name(), "Audit meta patch timed out"),
        }
    }
}

/// Pick the audit backend: Firebase, then Postgres, then in-memory.
pub fn build_audit_trail(config: &AppConfig) -> AuditTrail {
    let timeout = config.collaborator_timeout;

    if config.firebase.is_enabled() {
        match FirebaseAuditLog::new(&config.firebase, timeout) {
            Ok(log) => {
                info!("Audit backend: firebase");
                return AuditTrail::new(Arc::new(log), timeout);
            }
            Err(e) => warn!("Failed to build firebase audit client: {}", e),
        }
    }

    if let Some(url) = &config.postgres_url {
        match PostgresAuditLog::connect_lazy(url) {
            Ok(log) => {
                info!("Audit backend: postgres");
                return AuditTrail::new(Arc::new(log), timeout);
            }
            Err(e) => warn!(
                "Failed to initialize postgres audit backend, falling back to in-memory: {}",
                e
            ),
        }
    }

    info!("Audit backend: in-memory");
    AuditTrail::new(Arc::new(InMemoryAuditLog::new()), timeout)
}

/// SHA-256 over the serialized sanction record, recorded alongside it in
/// the audit meta so the stored record can be checked later.
pub fn compute_sanction_digest(record: &SanctionRecord) -> String {
    let mut hasher = Sha256::new();

    // Stream JSON directly into hasher (no intermediate String)
    if serde_json::to_writer(&mut HashWriter(&mut hasher), record).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
