//! Core data models for the loan workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

//
// ================= Workflow State =================
//

/// Per-session workflow position. Ordered: a session only ever moves forward.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    #[default]
    AwaitingId,
    AwaitingAmount,
    Decided,
}

//
// ================= Directives =================
//

/// Workflow step named by a directive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Step {
    #[serde(rename = "VERIFY_KYC")]
    VerifyKyc,
    #[serde(rename = "UNDERWRITE")]
    Underwrite,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::VerifyKyc => "VERIFY_KYC",
            Step::Underwrite => "UNDERWRITE",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "VERIFY_KYC" => Some(Step::VerifyKyc),
            "UNDERWRITE" => Some(Step::Underwrite),
            _ => None,
        }
    }
}

/// Arguments extracted from the inbound text that accompany a directive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<f64>,
}

//
// ================= Customer =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub credit_score: i64,
    pub salary: f64,
    /// Zero means "not provided"; underwriting derives and backfills it.
    #[serde(default)]
    pub pre_approved_limit: f64,
    #[serde(default = "default_loan_status")]
    pub current_loan_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
}

fn default_loan_status() -> String {
    "NA".to_string()
}

//
// ================= Underwriting =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    PreApproved,
    Approved,
    Rejected,
}

impl Outcome {
    pub fn is_sanctioned(&self) -> bool {
        matches!(self, Outcome::PreApproved | Outcome::Approved)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::PreApproved => "Pre-Approved",
            Outcome::Approved => "Approved",
            Outcome::Rejected => "Rejected",
        };
        write!(f, "{}", s)
    }
}

/// Result of one underwriting invocation. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnderwritingDecision {
    pub outcome: Outcome,
    pub message: String,
    pub requested_amount: Option<f64>,
    pub emi: Option<f64>,
    pub tenure_months: Option<u32>,
    pub pre_approved_limit: f64,
    pub decided_at: DateTime<Utc>,
}

//
// ================= Sanction =================
//

/// Opaque handle to an issued sanction document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentReference {
    pub file_name: String,
    pub location: PathBuf,
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name)
    }
}

/// Delivery receipt from the notification transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationAck {
    pub recipient: String,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SanctionRecord {
    pub document: DocumentReference,
    pub recipient_email: String,
    pub issued_at: DateTime<Utc>,
    /// False when the document was issued but delivery failed.
    pub notified: bool,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::AwaitingId => "AWAITING_ID",
            WorkflowState::AwaitingAmount => "AWAITING_AMOUNT",
            WorkflowState::Decided => "DECIDED",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_state_order() {
        assert!(WorkflowState::AwaitingId < WorkflowState::AwaitingAmount);
        assert!(WorkflowState::AwaitingAmount < WorkflowState::Decided);
    }

    #[test]
    fn test_step_wire_names() {
        assert_eq!(serde_json::to_string(&Step::VerifyKyc).unwrap(), "\"VERIFY_KYC\"");
        assert_eq!(Step::parse("UNDERWRITE"), Some(Step::Underwrite));
        assert_eq!(Step::parse("SEND_MAIL"), None);
        assert_eq!(
            serde_json::to_string(&WorkflowState::AwaitingAmount).unwrap(),
            "\"AWAITING_AMOUNT\""
        );
    }
}
