//! Built-in customer fixtures, consulted after the external store.

use super::{Lookup, ProfileSource};
use crate::models::CustomerProfile;
use async_trait::async_trait;
use std::collections::HashMap;

pub struct FixtureProfileSource {
    customers: HashMap<String, CustomerProfile>,
}

impl FixtureProfileSource {
    pub fn new() -> Self {
        let customers = [
            fixture("cust01", "Ramesh S.", "ramesh@example.com", "9876543210", 810, 80_000.0),
            fixture("cust10", "Neha C.", "neha@example.com", "8080808080", 740, 50_000.0),
        ]
        .into_iter()
        .map(|p| (p.customer_id.clone(), p))
        .collect();

        Self { customers }
    }
}

impl Default for FixtureProfileSource {
    fn default() -> Self {
        Self::new()
    }
}

fn fixture(
    id: &str,
    name: &str,
    email: &str,
    phone: &str,
    credit_score: i64,
    salary: f64,
) -> CustomerProfile {
    CustomerProfile {
        customer_id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        credit_score,
        salary,
        pre_approved_limit: 0.0,
        current_loan_status: "NA".to_string(),
        pan_number: None,
        city: None,
        age: None,
    }
}

#[async_trait]
impl ProfileSource for FixtureProfileSource {
    fn name(&self) -> &'static str {
        "fixtures"
    }

    async fn lookup(&self, customer_id: &str) -> Lookup {
        match self.customers.get(&customer_id.to_ascii_lowercase()) {
            Some(profile) => Lookup::Found(profile.clone()),
            None => Lookup::NotFound,
        }
    }
}
