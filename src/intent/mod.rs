//! Intent resolution
//!
//! Turns a user message into either a direct reply or a typed directive.
//! The external language model is consulted first when configured; the
//! local matcher is used when it is absent or errors.

use crate::models::Step;
use crate::session::ConversationHistory;
use crate::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

pub mod gemini;
pub mod local;

pub use gemini::GeminiIntentClient;
pub use local::LocalMatcher;

/// What the intent layer decided for one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentResolution {
    /// User-facing text, no workflow step.
    Reply(String),
    /// Execute a workflow step.
    Invoke(Step),
}

/// External text-understanding collaborator.
#[async_trait]
pub trait IntentResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolve the latest user message in `history` (already appended).
    async fn resolve(&self, history: &ConversationHistory) -> Result<IntentResolution>;
}

lazy_static! {
    static ref DIRECTIVE_TOKEN: Regex = Regex::new(r"\[\[CALL:([A-Z_]+)\]\]\s*$").unwrap();
    static ref CUSTOMER_ID: Regex = Regex::new(r"(?i)\b(cust[a-z]*\d[a-z0-9]*)\b").unwrap();
    static ref AMOUNT: Regex = Regex::new(r"\d(?:[\d,]*\d)?").unwrap();
}

/// Directive token the language model is instructed to emit.
pub fn directive_token(step: Step) -> String {
    format!("[[CALL:{}]]", step.as_str())
}

/// Interpret raw model output. Only a trailing token naming a known step is
/// a directive; anything else is passed through as the reply.
pub fn parse_model_output(text: &str) -> IntentResolution {
    DIRECTIVE_TOKEN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Step::parse(m.as_str()))
        .map(IntentResolution::Invoke)
        .unwrap_or_else(|| IntentResolution::Reply(text.trim().to_string()))
}

/// First `cust<alphanumeric>` token containing a digit, lowercased.
pub fn extract_customer_id(text: &str) -> Option<String> {
    CUSTOMER_ID
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// First number of three or more digits, as an amount. Digit grouping
/// commas ("5,00,000", "500,000") are part of the number.
pub fn extract_amount(text: &str) -> Option<f64> {
    AMOUNT
        .find_iter(text)
        .map(|m| m.as_str().replace(',', ""))
        .find(|digits| digits.len() >= 3)
        .and_then(|digits| digits.parse::<f64>().ok())
}
