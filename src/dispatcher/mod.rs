//! Workflow step dispatcher
//!
//! Executes `VERIFY_KYC` and `UNDERWRITE` against a locked session. This is
//! the only place external collaborators with durable side effects
//! (document issuance, notification) are called, each under a bounded timeout.

use crate::audit::{compute_sanction_digest, AuditTrail};
use crate::documents::DocumentRenderer;
use crate::error::OrchestrationError;
use crate::kyc::ProfileResolver;
use crate::models::{CustomerProfile, Outcome, SanctionRecord, WorkflowState};
use crate::notify::{Notifier, SANCTION_BODY, SANCTION_SUBJECT};
use crate::session::Session;
use crate::underwriting::UnderwritingEngine;
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod amount;
pub use amount::parse_amount;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
    Complete,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KycResult {
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<CustomerProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub next_state: WorkflowState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderwriteResult {
    pub status: StepStatus,
    pub outcome: Outcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenure_months: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_summary: Option<String>,
    pub next_state: WorkflowState,
}

pub struct WorkflowDispatcher {
    profiles: ProfileResolver,
    underwriting: UnderwritingEngine,
    renderer: Arc<dyn DocumentRenderer>,
    notifier: Arc<dyn Notifier>,
    audit: AuditTrail,
    timeout: Duration,
}

impl WorkflowDispatcher {
    pub fn new(
        profiles: ProfileResolver,
        underwriting: UnderwritingEngine,
        renderer: Arc<dyn DocumentRenderer>,
        notifier: Arc<dyn Notifier>,
        audit: AuditTrail,
        timeout: Duration,
    ) -> Self {
        Self {
            profiles,
            underwriting,
            renderer,
            notifier,
            audit,
            timeout,
        }
    }

    /// Run a collaborator call under the dispatcher's timeout.
    async fn bounded<T, F>(&self, collaborator: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| OrchestrationError::Timeout {
                collaborator,
                seconds: self.timeout.as_secs(),
            })?
    }

    /// Resolve `customer_id` and attach the profile to the session.
    ///
    /// Unknown or malformed ids produce an `error` result and leave the
    /// session untouched.
    pub async fn verify_kyc(&self, session: &mut Session, customer_id: &str) -> Result<KycResult> {
        let profile = match self.profiles.resolve(customer_id).await {
            Ok(profile) => profile,
            Err(OrchestrationError::NotFound(message)) | Err(OrchestrationError::Validation(message)) => {
                info!(session_id = %session.session_id, customer_id, "KYC verification failed");
                return Ok(KycResult {
                    status: StepStatus::Error,
                    profile: None,
                    message: Some(message),
                    next_state: session.state(),
                });
            }
            Err(e) => return Err(e),
        };

        let mut meta = Map::new();
        meta.insert("customer_name".into(), json!(profile.name));
        meta.insert("email".into(), json!(profile.email));
        self.audit.meta(&session.session_id, meta).await;

        session.attach_profile(profile.clone());

        info!(
            session_id = %session.session_id,
            customer_id = %profile.customer_id,
            state = %session.state(),
            "KYC verified"
        );

        Ok(KycResult {
            status: StepStatus::Success,
            profile: Some(profile),
            message: None,
            next_state: session.state(),
        })
    }

    /// Underwrite `amount` for the session's verified customer and, when
    /// sanctioned, issue and deliver the sanction letter.
    ///
    /// A session without a profile is an `InvalidPrecondition`. Render or
    /// notification failures are returned as errors; if the letter was
    /// issued before delivery failed, the sanction record is still attached
    /// with `notified = false`.
    pub async fn underwrite(&self, session: &mut Session, amount: f64) -> Result<UnderwriteResult> {
        let Some(profile) = session.profile.as_mut() else {
            return Err(OrchestrationError::InvalidPrecondition(
                "UNDERWRITE requires a verified customer; run VERIFY_KYC first".to_string(),
            ));
        };

        let decision = self.underwriting.decide(profile, amount);
        let profile = profile.clone();
        session.last_decision = Some(decision.clone());

        if !decision.outcome.is_sanctioned() {
            return Ok(UnderwriteResult {
                status: StepStatus::Complete,
                outcome: decision.outcome,
                message: decision.message,
                emi: None,
                tenure_months: None,
                notification_summary: None,
                next_state: session.state(),
            });
        }

        let tenure = decision
            .tenure_months
            .unwrap_or_else(|| crate::eligibility::tenure_months(profile.salary));

        let document = self
            .bounded("document renderer", self.renderer.render(&profile, amount, tenure))
            .await
            .map_err(|e| {
                error!(session_id = %session.session_id, "Sanction letter rendering failed: {}", e);
                e
            })?;

        let delivery = self
            .bounded(
                "notifier",
                self.notifier
                    .send(&profile.email, SANCTION_SUBJECT, SANCTION_BODY, &document),
            )
            .await;

        let record = SanctionRecord {
            document,
            recipient_email: profile.email.clone(),
            issued_at: Utc::now(),
            notified: delivery.is_ok(),
        };

        let mut meta = Map::new();
        meta.insert(
            "sanction_document".into(),
            json!(record.document.location.display().to_string()),
        );
        meta.insert("sanction_digest".into(), json!(compute_sanction_digest(&record)));
        meta.insert("sanction_notified".into(), Value::Bool(record.notified));
        self.audit.meta(&session.session_id, meta).await;

        session.sanction = Some(record);
        session.advance_to(WorkflowState::Decided);

        if let Err(e) = delivery {
            warn!(
                session_id = %session.session_id,
                recipient = %profile.email,
                notifier = self.notifier.name(),
                "Sanction letter issued but notification failed: {}",
                e
            );
            return Err(e);
        }

        info!(
            session_id = %session.session_id,
            outcome = %decision.outcome,
            recipient = %profile.email,
            notifier = self.notifier.name(),
            "Sanction letter delivered"
        );

        Ok(UnderwriteResult {
            status: StepStatus::Complete,
            outcome: decision.outcome,
            message: decision.message,
            emi: decision.emi,
            tenure_months: decision.tenure_months,
            notification_summary: Some(format!("Sanction letter sent to {}", profile.email)),
            next_state: session.state(),
        })
    }
}

#[cfg(test)]
mod tests;
