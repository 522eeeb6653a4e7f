//! Main orchestrator
//!
//! MESSAGE → RESOLVE INTENT → (DIRECTIVE?) → STEP → SESSION UPDATE
//!
//! Each turn holds the session lock from start to finish, so turns on one
//! session are serialized and workflow state can only move forward.

use crate::audit::{build_audit_trail, AuditTrail};
use crate::config::AppConfig;
use crate::dispatcher::{KycResult, StepStatus, UnderwriteResult, WorkflowDispatcher};
use crate::documents::FileLetterRenderer;
use crate::error::OrchestrationError;
use crate::intent::{
    directive_token, extract_amount, extract_customer_id, gemini, GeminiIntentClient,
    IntentResolution, IntentResolver, LocalMatcher,
};
use crate::kyc::{FirebaseProfileSource, FixtureProfileSource, ProfileResolver};
use crate::models::{DirectiveArguments, Step, WorkflowState};
use crate::notify::{HttpMailRelay, LogNotifier, Notifier};
use crate::session::{
    ConversationHistory, InMemorySessionStore, MessageRole, Session, SessionHandle, SessionStore,
};
use crate::underwriting::UnderwritingEngine;
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const PROCESSING_TEXT: &str = "Processing request...";

/// Reply to one inbound message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub session_id: String,
    pub response_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directive: Option<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<DirectiveArguments>,
    pub state: WorkflowState,
    /// Which resolver produced the reply: the language model or the local matcher.
    pub source: &'static str,
}

/// A workflow step requested by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum StepRequest {
    VerifyKyc { customer_id: String },
    Underwrite { loan_amount: f64 },
}

impl StepRequest {
    pub fn step(&self) -> Step {
        match self {
            StepRequest::VerifyKyc { .. } => Step::VerifyKyc,
            StepRequest::Underwrite { .. } => Step::Underwrite,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StepOutcome {
    Kyc(KycResult),
    Underwrite(UnderwriteResult),
}

/// Main orchestrator that coordinates sessions, intent and workflow steps
pub struct Orchestrator {
    sessions: Arc<dyn SessionStore>,
    intent: Option<Arc<dyn IntentResolver>>,
    dispatcher: WorkflowDispatcher,
    audit: AuditTrail,
    intent_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        intent: Option<Arc<dyn IntentResolver>>,
        dispatcher: WorkflowDispatcher,
        audit: AuditTrail,
        intent_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            intent,
            dispatcher,
            audit,
            intent_timeout,
        }
    }

    /// Wire every collaborator from configuration. Absent settings select
    /// the local fallbacks.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = config.collaborator_timeout;

        let mut profiles = ProfileResolver::new(timeout);
        if config.firebase.is_enabled() {
            profiles = profiles.with_source(Arc::new(FirebaseProfileSource::new(
                &config.firebase,
                timeout,
            )?));
        }
        profiles = profiles.with_source(Arc::new(FixtureProfileSource::new()));
        let profile_sources = profiles.source_names();

        let notifier: Arc<dyn Notifier> = match &config.mail {
            Some(mail) => Arc::new(HttpMailRelay::new(mail, timeout)?),
            None => {
                warn!("MAIL_RELAY_URL not set, sanction letters will not be delivered");
                Arc::new(LogNotifier)
            }
        };

        let intent: Option<Arc<dyn IntentResolver>> = if config.intent.is_enabled() {
            Some(Arc::new(GeminiIntentClient::new(&config.intent, timeout)?))
        } else {
            info!("GEMINI_API_KEY not set, using local intent matcher only");
            None
        };

        let notifier_name = notifier.name();

        let audit = build_audit_trail(config);
        let dispatcher = WorkflowDispatcher::new(
            profiles,
            UnderwritingEngine::new(),
            Arc::new(FileLetterRenderer::new(&config.sanctions_dir)),
            notifier,
            audit.clone(),
            timeout,
        );

        info!(
            profile_sources = ?profile_sources,
            notifier = notifier_name,
            sanctions_dir = %config.sanctions_dir.display(),
            "Orchestrator configured"
        );

        Ok(Self::new(
            Arc::new(InMemorySessionStore::new()),
            intent,
            dispatcher,
            audit,
            timeout,
        ))
    }

    /// Allocate a session in `AWAITING_ID`.
    pub async fn create_session(&self) -> String {
        let session_id = Session::allocate_id();
        self.sessions.put(new_session(&session_id)).await;
        info!(session_id = %session_id, "Session created");
        session_id
    }

    /// Existing session, or a fresh one under the caller's id.
    async fn session_handle(&self, session_id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.get(session_id).await {
            return handle;
        }
        debug!(session_id, "Unknown session id, creating session");
        self.sessions.insert_if_absent(new_session(session_id)).await
    }

    /// Handle one inbound user message and decide the next workflow step.
    pub async fn handle_message(&self, session_id: &str, text: &str) -> Result<ChatReply> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OrchestrationError::Validation(
                "message text must not be empty".to_string(),
            ));
        }

        let handle = self.session_handle(session_id).await;
        let mut session = handle.lock().await;
        session.touch();

        session.history.push(MessageRole::User, text);
        self.audit.message(session_id, MessageRole::User, text).await;

        let (resolution, source) = self.resolve_intent(&session, text).await;

        let (response_text, directive, arguments, transcript) = match resolution {
            IntentResolution::Invoke(step) => {
                let arguments = match step {
                    Step::VerifyKyc => DirectiveArguments {
                        customer_id: extract_customer_id(text),
                        loan_amount: None,
                    },
                    Step::Underwrite => DirectiveArguments {
                        customer_id: None,
                        loan_amount: extract_amount(text),
                    },
                };
                (
                    PROCESSING_TEXT.to_string(),
                    Some(step),
                    Some(arguments),
                    directive_token(step),
                )
            }
            IntentResolution::Reply(reply) => (reply.clone(), None, None, reply),
        };

        session.history.push(MessageRole::Assistant, transcript.as_str());
        self.audit
            .message(session_id, MessageRole::Assistant, &transcript)
            .await;

        info!(
            session_id,
            state = %session.state(),
            directive = ?directive,
            source,
            "Message handled"
        );

        Ok(ChatReply {
            session_id: session_id.to_string(),
            response_text,
            directive,
            arguments,
            state: session.state(),
            source,
        })
    }

    /// Ask the language model first; on absence, error or timeout use the
    /// local matcher. Directives that the session cannot act on are
    /// replaced by the local matcher's answer.
    async fn resolve_intent(&self, session: &Session, text: &str) -> (IntentResolution, &'static str) {
        let Some(intent) = &self.intent else {
            return (LocalMatcher::resolve(session, text), "local");
        };

        let resolution =
            match tokio::time::timeout(self.intent_timeout, intent.resolve(&session.history)).await {
                Ok(Ok(resolution)) => resolution,
                Ok(Err(e)) => {
                    warn!(session_id = %session.session_id, "Intent service failed, using local matcher: {}", e);
                    return (LocalMatcher::resolve(session, text), "local");
                }
                Err(_) => {
                    warn!(session_id = %session.session_id, "Intent service timed out, using local matcher");
                    return (LocalMatcher::resolve(session, text), "local");
                }
            };

        let actionable = match &resolution {
            IntentResolution::Reply(_) => true,
            IntentResolution::Invoke(Step::VerifyKyc) => extract_customer_id(text).is_some(),
            IntentResolution::Invoke(Step::Underwrite) => {
                session.profile.is_some() && extract_amount(text).is_some()
            }
        };

        if actionable {
            (resolution, intent.name())
        } else {
            debug!(session_id = %session.session_id, ?resolution, "Directive not actionable, using local matcher");
            (LocalMatcher::resolve(session, text), "local")
        }
    }

    /// Execute a workflow step for a session.
    pub async fn execute_step(&self, session_id: &str, request: StepRequest) -> Result<StepOutcome> {
        let handle = self.session_handle(session_id).await;
        let mut session = handle.lock().await;
        session.touch();

        info!(session_id, step = request.step().as_str(), "Executing workflow step");

        let (outcome, note) = match request {
            StepRequest::VerifyKyc { customer_id } => {
                let result = self.dispatcher.verify_kyc(&mut session, &customer_id).await?;
                let note = match (&result.status, &result.profile) {
                    (StepStatus::Success, Some(profile)) => format!(
                        "KYC verified for {}. How much loan amount would you like to apply for?",
                        profile.name
                    ),
                    _ => result
                        .message
                        .clone()
                        .unwrap_or_else(|| "KYC verification failed.".to_string()),
                };
                (StepOutcome::Kyc(result), note)
            }
            StepRequest::Underwrite { loan_amount } => {
                let result = self.dispatcher.underwrite(&mut session, loan_amount).await?;
                let note = match &result.notification_summary {
                    Some(summary) => format!("{} {}", result.message, summary),
                    None => result.message.clone(),
                };
                (StepOutcome::Underwrite(result), note)
            }
        };

        session.history.push(MessageRole::Assistant, note.as_str());
        self.audit.message(session_id, MessageRole::Assistant, &note).await;

        Ok(outcome)
    }

    /// Point-in-time copy of a session.
    pub async fn snapshot(&self, session_id: &str) -> Result<Session> {
        let handle = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| OrchestrationError::SessionNotFound(session_id.to_string()))?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// Drop sessions idle for at least `ttl`.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let removed = self.sessions.evict_idle(ttl).await;
        if removed > 0 {
            info!(removed, "Expired idle sessions");
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }
}

fn new_session(session_id: &str) -> Session {
    Session::new(
        session_id,
        ConversationHistory::with_system_prompt(&gemini::system_prompt()),
    )
}
