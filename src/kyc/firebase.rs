//! Firebase Realtime Database profile store
//!
//! Reads `customers/<id>.json`. KYC details live under a nested `kyc`
//! object and take precedence over top-level fields.

use super::{Lookup, ProfileSource};
use crate::config::FirebaseConfig;
use crate::models::CustomerProfile;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub struct FirebaseProfileSource {
    client: Client,
    database_url: String,
    api_key: String,
}

impl FirebaseProfileSource {
    pub fn new(config: &FirebaseConfig, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            database_url: config.database_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ProfileSource for FirebaseProfileSource {
    fn name(&self) -> &'static str {
        "firebase"
    }

    async fn lookup(&self, customer_id: &str) -> Lookup {
        let url = format!(
            "{}/customers/{}.json?auth={}",
            self.database_url, customer_id, self.api_key
        );

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return Lookup::Unavailable(format!("request failed: {}", e)),
        };

        if !response.status().is_success() {
            return Lookup::Unavailable(format!("status {}", response.status()));
        }

        match response.json::<Value>().await {
            Ok(body) => parse_customer_record(customer_id, body),
            Err(e) => Lookup::Unavailable(format!("invalid JSON: {}", e)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct KycSection {
    name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    phone: Option<Value>,
    pannumber: Option<String>,
    city: Option<String>,
    #[serde(default)]
    age: Option<Value>,
    currentloan: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerRecord {
    #[serde(default)]
    kyc: Option<KycSection>,
    name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    credit_score: Option<Value>,
    #[serde(default)]
    salary: Option<Value>,
    #[serde(default)]
    pre_approved_limit: Option<Value>,
}

/// Map a raw store record to a profile. `null` or an empty object is not found.
pub(crate) fn parse_customer_record(customer_id: &str, body: Value) -> Lookup {
    let is_empty = match &body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if is_empty {
        return Lookup::NotFound;
    }

    let record: CustomerRecord = match serde_json::from_value(body) {
        Ok(record) => record,
        Err(e) => return Lookup::Unavailable(format!("unexpected record shape: {}", e)),
    };
    let kyc = record.kyc.unwrap_or_default();

    let Some(name) = kyc.name.or(record.name) else {
        return Lookup::Unavailable("record has no name".to_string());
    };

    Lookup::Found(CustomerProfile {
        customer_id: customer_id.to_string(),
        name,
        email: kyc.email.or(record.email).unwrap_or_default(),
        phone: kyc.phone.map(value_text).unwrap_or_default(),
        credit_score: record.credit_score.and_then(value_number).unwrap_or(0.0) as i64,
        salary: record.salary.and_then(value_number).unwrap_or(0.0),
        pre_approved_limit: record
            .pre_approved_limit
            .and_then(value_number)
            .unwrap_or(0.0),
        current_loan_status: kyc.currentloan.unwrap_or_else(|| "NA".to_string()),
        pan_number: kyc.pannumber.filter(|s| !s.is_empty()),
        city: kyc.city.filter(|s| !s.is_empty()),
        age: kyc.age.map(value_text).filter(|s| !s.is_empty()),
    })
}

/// Numbers may be stored as JSON numbers or numeric strings.
fn value_number(value: Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
