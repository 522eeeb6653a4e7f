//! Gemini intent client
//!
//! Sends the session transcript to Gemini with the loan-desk instructions and
//! converts the reply into an `IntentResolution` at this boundary.
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{directive_token, parse_model_output, IntentResolution, IntentResolver};
use crate::config::IntentConfig;
use crate::error::OrchestrationError;
use crate::models::Step;
use crate::session::{ConversationHistory, MessageRole};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Instructions given to the model as its system prompt.
pub fn system_prompt() -> String {
    format!(
        r#"You are the master agent for personal loan sales.

Primary tasks:
1. If the user provides a customer ID (custXXXX format), respond only {verify}.
2. After KYC is successful, if the user provides a loan amount, respond only {underwrite}.
3. After underwriting and the sanction email, if the user asks about the sanction letter, reply that it has already been emailed.

For anything else (general questions, EMI, required documents, personal loans, who you are)
answer normally in a helpful and friendly tone without any directive.

Never emit a directive unless:
- the user provides a customer ID ({verify})
- the user provides a loan amount after KYC ({underwrite})

Never mix text with a directive."#,
        verify = directive_token(Step::VerifyKyc),
        underwrite = directive_token(Step::Underwrite),
    )
}

pub struct GeminiIntentClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiIntentClient {
    pub fn new(config: &IntentConfig, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn build_request(&self, history: &ConversationHistory) -> GeminiRequest {
        let contents = history
            .messages()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| Content {
                role: Some(
                    match m.role {
                        MessageRole::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system_prompt(),
                }],
            },
        }
    }
}

#[async_trait]
impl IntentResolver for GeminiIntentClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn resolve(&self, history: &ConversationHistory) -> crate::Result<IntentResolution> {
        if self.api_key.is_empty() {
            return Err(OrchestrationError::CollaboratorUnavailable(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/{}:generateContent?key={}", BASE_URL, self.model, self.api_key);
        let request = self.build_request(history);

        info!(model = %self.model, "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                OrchestrationError::CollaboratorUnavailable(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(OrchestrationError::CollaboratorUnavailable(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            OrchestrationError::CollaboratorUnavailable(format!("Gemini parse error: {}", e))
        })?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                OrchestrationError::CollaboratorUnavailable("Empty response from Gemini".to_string())
            })?;

        Ok(parse_model_output(&text))
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: &str) -> GeminiIntentClient {
        let config = IntentConfig {
            api_key: api_key.to_string(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.7,
        };
        GeminiIntentClient::new(&config, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_request_maps_roles_and_skips_system() {
        let mut history = ConversationHistory::with_system_prompt("ignored here");
        history.push(MessageRole::User, "hi");
        history.push(MessageRole::Assistant, "hello");
        history.push(MessageRole::User, "my id is cust01");

        let request = client("key").build_request(&history);
        let json = serde_json::to_value(&request).unwrap();

        let roles: Vec<_> = json["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert!(json["system_instruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("[[CALL:VERIFY_KYC]]"));
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let mut history = ConversationHistory::new();
        history.push(MessageRole::User, "what is EMI?");

        let err = client("").resolve(&history).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::CollaboratorUnavailable(_)));
    }
}
