//! Customer identity verification
//!
//! Profiles are resolved through an ordered list of sources. Each source
//! reports found, not found, or unavailable; the first hit wins and the
//! order is the fallback policy.

use crate::error::OrchestrationError;
use crate::models::CustomerProfile;
use crate::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod fixtures;
pub mod firebase;

pub use firebase::FirebaseProfileSource;
pub use fixtures::FixtureProfileSource;

pub const NOT_FOUND_MESSAGE: &str = "Customer ID not found";

/// Outcome of asking one source for a profile.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(CustomerProfile),
    NotFound,
    Unavailable(String),
}

/// Read-only profile store.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn lookup(&self, customer_id: &str) -> Lookup;
}

lazy_static! {
    static ref CUSTOMER_ID_FORMAT: Regex = Regex::new(r"^cust[a-z0-9]+$").unwrap();
}

/// Lowercase and check the `cust<alphanumeric>` shape.
pub fn normalize_customer_id(raw: &str) -> Result<String> {
    let id = raw.trim().to_ascii_lowercase();
    if CUSTOMER_ID_FORMAT.is_match(&id) {
        Ok(id)
    } else {
        Err(OrchestrationError::Validation(format!(
            "Invalid customer ID '{}', expected format custXXXX",
            raw.trim()
        )))
    }
}

/// Tries each source in order under a per-call timeout.
pub struct ProfileResolver {
    sources: Vec<Arc<dyn ProfileSource>>,
    timeout: Duration,
}

impl ProfileResolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sources: Vec::new(),
            timeout,
        }
    }

    /// Append a source; earlier sources take precedence.
    pub fn with_source(mut self, source: Arc<dyn ProfileSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn resolve(&self, raw_customer_id: &str) -> Result<CustomerProfile> {
        let customer_id = normalize_customer_id(raw_customer_id)?;

        for source in &self.sources {
            let lookup = match tokio::time::timeout(self.timeout, source.lookup(&customer_id)).await {
                Ok(lookup) => lookup,
                Err(_) => Lookup::Unavailable(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )),
            };

            match lookup {
                Lookup::Found(profile) => {
                    info!(customer_id = %customer_id, source = source.name(), "Customer profile resolved");
                    return Ok(profile);
                }
                Lookup::NotFound => {
                    debug!(customer_id = %customer_id, source = source.name(), "No profile in source");
                }
                Lookup::Unavailable(reason) => {
                    warn!(
                        customer_id = %customer_id,
                        source = source.name(),
                        reason = %reason,
                        "Profile source unavailable, trying next"
                    );
                }
            }
        }

        Err(OrchestrationError::NotFound(NOT_FOUND_MESSAGE.to_string()))
    }
}
