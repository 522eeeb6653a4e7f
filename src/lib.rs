//! Loan Orchestrator
//!
//! A conversational loan-origination backend that:
//! - Routes free-text user messages to a deterministic workflow
//! - Verifies customers against an external profile store with local fixtures
//! - Underwrites requested amounts with fixed eligibility rules
//! - Issues and emails sanction letters for approved loans
//! - Keeps per-session state that only moves forward
//!
//! TURN LOOP:
//! MESSAGE → INTENT → DIRECTIVE? → VERIFY_KYC | UNDERWRITE → SESSION UPDATE

pub mod agent;
pub mod api;
pub mod audit;
pub mod config;
pub mod dispatcher;
pub mod documents;
pub mod eligibility;
pub mod error;
pub mod intent;
pub mod kyc;
pub mod models;
pub mod notify;
pub mod session;
pub mod telemetry;
pub mod underwriting;

pub use error::Result;

// Re-export common types
pub use agent::{ChatReply, Orchestrator, StepOutcome, StepRequest};
pub use config::AppConfig;
pub use models::*;
