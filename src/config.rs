//! Runtime configuration
//!
//! Loaded from the process environment after reading an optional `.env`.
//! Empty collaborator settings disable the collaborator rather than fail.

use crate::error::OrchestrationError;
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub log_level: String,
    pub intent: IntentConfig,
    pub firebase: FirebaseConfig,
    pub postgres_url: Option<String>,
    pub mail: Option<MailConfig>,
    pub sanctions_dir: PathBuf,
    /// Upper bound on every external collaborator call.
    pub collaborator_timeout: Duration,
    /// Idle session expiry; `None` keeps sessions for the process lifetime.
    pub session_ttl: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct IntentConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl IntentConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FirebaseConfig {
    pub database_url: String,
    pub api_key: String,
}

impl FirebaseConfig {
    pub fn is_enabled(&self) -> bool {
        !self.database_url.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub relay_url: String,
    pub token: Option<String>,
    pub from: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let port = var("PORT")
            .or_else(|| var("API_PORT"))
            .map(|raw| parse_number::<u16>("PORT", &raw))
            .transpose()?
            .unwrap_or(5000);

        let temperature = var("LLM_TEMPERATURE")
            .map(|raw| parse_number::<f32>("LLM_TEMPERATURE", &raw))
            .transpose()?
            .unwrap_or(0.7);

        let timeout_secs = var("COLLABORATOR_TIMEOUT_SECS")
            .map(|raw| parse_number::<u64>("COLLABORATOR_TIMEOUT_SECS", &raw))
            .transpose()?
            .unwrap_or(10);
        if timeout_secs == 0 {
            return Err(OrchestrationError::Config(
                "COLLABORATOR_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let session_ttl = var("SESSION_TTL_SECS")
            .map(|raw| parse_number::<u64>("SESSION_TTL_SECS", &raw))
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let mail = var("MAIL_RELAY_URL").map(|relay_url| MailConfig {
            relay_url,
            token: var("MAIL_RELAY_TOKEN"),
            from: var("MAIL_FROM").unwrap_or_else(|| "loans@example.com".to_string()),
        });

        Ok(Self {
            port,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            intent: IntentConfig {
                api_key: var("GEMINI_API_KEY").unwrap_or_default(),
                model: var("LLM_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
                temperature,
            },
            firebase: FirebaseConfig {
                database_url: var("FIREBASE_DATABASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_default(),
                api_key: var("FIREBASE_API_KEY").unwrap_or_default(),
            },
            postgres_url: var("POSTGRES_URL").or_else(|| var("DATABASE_URL")),
            mail,
            sanctions_dir: var("SANCTIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("sanctions")),
            collaborator_timeout: Duration::from_secs(timeout_secs),
            session_ttl,
        })
    }
}

/// Non-empty, trimmed environment value
fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| OrchestrationError::Config(format!("{} must be a number, got '{}'", key, raw)))
}
