//! Tracing subscriber setup

use crate::error::OrchestrationError;
use crate::Result;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over `fallback_level`.
pub fn init(fallback_level: &str) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(fallback_level).map_err(|e| {
            OrchestrationError::Config(format!("invalid log filter '{}': {}", fallback_level, e))
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .map_err(|e| OrchestrationError::Config(format!("tracing init failed: {}", e)))
}
