//! Session model and storage
//!
//! A session ties one conversation to at most one verified customer and
//! the decisions made for them. Workflow state only moves forward.

use crate::models::{CustomerProfile, SanctionRecord, UnderwritingDecision, WorkflowState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub mod history;
pub mod store;

pub use history::{ConversationHistory, ConversationMessage, MessageRole};
pub use store::{InMemorySessionStore, SessionHandle, SessionStore};

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub session_id: String,
    pub history: ConversationHistory,
    state: WorkflowState,
    pub profile: Option<CustomerProfile>,
    pub last_decision: Option<UnderwritingDecision>,
    pub sanction: Option<SanctionRecord>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, history: ConversationHistory) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            history,
            state: WorkflowState::AwaitingId,
            profile: None,
            last_decision: None,
            sanction: None,
            created_at: now,
            last_active: now,
        }
    }

    /// Allocate a fresh `sess_`-prefixed identifier.
    pub fn allocate_id() -> String {
        format!("sess_{}", Uuid::new_v4().simple())
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Move to `next` if it is ahead of the current state. Returns whether
    /// the state changed; a backwards request is ignored.
    pub fn advance_to(&mut self, next: WorkflowState) -> bool {
        if next > self.state {
            self.state = next;
            true
        } else {
            false
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// Attach a verified profile and move past `AWAITING_ID`. A different
    /// customer drops the previous customer's decision and sanction record.
    pub fn attach_profile(&mut self, profile: CustomerProfile) {
        let same_customer = self
            .profile
            .as_ref()
            .is_some_and(|current| current.customer_id == profile.customer_id);
        if !same_customer {
            self.last_decision = None;
            self.sanction = None;
        }
        self.profile = Some(profile);
        self.advance_to(WorkflowState::AwaitingAmount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_never_regresses() {
        let mut session = Session::new("sess_test", ConversationHistory::new());
        assert_eq!(session.state(), WorkflowState::AwaitingId);

        assert!(session.advance_to(WorkflowState::Decided));
        assert!(!session.advance_to(WorkflowState::AwaitingAmount));
        assert!(!session.advance_to(WorkflowState::AwaitingId));
        assert_eq!(session.state(), WorkflowState::Decided);
    }

    #[test]
    fn test_allocated_ids_are_unique() {
        let a = Session::allocate_id();
        let b = Session::allocate_id();
        assert!(a.starts_with("sess_"));
        assert_ne!(a, b);
    }
}
