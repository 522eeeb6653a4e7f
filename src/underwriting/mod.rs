//! Underwriting decision engine
//!
//! Tiered, deterministic policy over a verified profile and a requested amount.
//! No external calls. The only side effect is backfilling a derived
//! pre-approved limit onto the profile.

use crate::eligibility;
use crate::models::{CustomerProfile, Outcome, UnderwritingDecision};
use chrono::Utc;
use tracing::info;

mod format;
pub use format::format_amount;

/// Policy constants applied by the engine.
#[derive(Debug, Clone)]
pub struct UnderwritingPolicy {
    /// Nominal annual rate used for EMI, in percent.
    pub annual_rate_percent: f64,
    pub minimum_credit_score: i64,
    /// Amounts up to `limit * stretch_multiple` may still be approved.
    pub stretch_multiple: f64,
    /// Maximum EMI as a share of monthly salary for stretch approvals.
    pub max_emi_to_salary: f64,
}

impl Default for UnderwritingPolicy {
    fn default() -> Self {
        Self {
            annual_rate_percent: 12.0,
            minimum_credit_score: 700,
            stretch_multiple: 2.0,
            max_emi_to_salary: 0.5,
        }
    }
}

pub struct UnderwritingEngine {
    policy: UnderwritingPolicy,
}

impl UnderwritingEngine {
    pub fn new() -> Self {
        Self {
            policy: UnderwritingPolicy::default(),
        }
    }

    /// Decide on `requested_amount` for `profile`.
    ///
    /// A non-finite or non-positive amount (callers pass `NaN` for text that
    /// did not parse) is rejected without touching the profile.
    pub fn decide(&self, profile: &mut CustomerProfile, requested_amount: f64) -> UnderwritingDecision {
        if !requested_amount.is_finite() || requested_amount <= 0.0 {
            return self.reject(None, profile.pre_approved_limit, "Loan amount must be numeric");
        }

        let limit = self.resolve_limit(profile);
        let salary = profile.salary;
        let tenure = eligibility::tenure_months(salary);
        let emi = eligibility::emi(requested_amount, self.policy.annual_rate_percent, tenure as i64);

        if profile.credit_score < self.policy.minimum_credit_score {
            return self.reject(
                Some(requested_amount),
                limit,
                &format!("Dear {}, your credit score is too low", profile.name),
            );
        }

        let Some(emi) = emi else {
            return self.reject(Some(requested_amount), limit, "Unable to compute EMI");
        };

        let decision = if requested_amount <= limit {
            self.sanction(
                Outcome::PreApproved,
                requested_amount,
                emi,
                tenure,
                limit,
                format!(
                    "Loan ₹{} pre-approved. EMI ₹{}/month for {} months.",
                    format_amount(requested_amount),
                    format_amount(emi),
                    tenure
                ),
            )
        } else if requested_amount <= self.policy.stretch_multiple * limit {
            if emi <= self.policy.max_emi_to_salary * salary {
                self.sanction(
                    Outcome::Approved,
                    requested_amount,
                    emi,
                    tenure,
                    limit,
                    format!(
                        "Loan ₹{} approved. EMI ₹{}/month for {} months.",
                        format_amount(requested_amount),
                        format_amount(emi),
                        tenure
                    ),
                )
            } else {
                self.reject(Some(requested_amount), limit, "EMI exceeds 50% of salary")
            }
        } else {
            self.reject(Some(requested_amount), limit, "Requested amount exceeds eligibility")
        };

        info!(
            customer_id = %profile.customer_id,
            outcome = %decision.outcome,
            requested_amount,
            limit,
            "Underwriting decision made"
        );

        decision
    }

    /// Stored limit when positive, otherwise derived from salary and written back.
    fn resolve_limit(&self, profile: &mut CustomerProfile) -> f64 {
        if profile.pre_approved_limit > 0.0 {
            return profile.pre_approved_limit;
        }

        let derived = eligibility::pre_approved_limit(profile.salary);
        profile.pre_approved_limit = derived;
        derived
    }

    fn sanction(
        &self,
        outcome: Outcome,
        amount: f64,
        emi: f64,
        tenure: u32,
        limit: f64,
        message: String,
    ) -> UnderwritingDecision {
        UnderwritingDecision {
            outcome,
            message,
            requested_amount: Some(amount),
            emi: Some(emi),
            tenure_months: Some(tenure),
            pre_approved_limit: limit,
            decided_at: Utc::now(),
        }
    }

    fn reject(&self, amount: Option<f64>, limit: f64, message: &str) -> UnderwritingDecision {
        UnderwritingDecision {
            outcome: Outcome::Rejected,
            message: message.to_string(),
            requested_amount: amount,
            emi: None,
            tenure_months: None,
            pre_approved_limit: limit,
            decided_at: Utc::now(),
        }
    }
}

impl Default for UnderwritingEngine {
    fn default() -> Self {
        Self::new()
    }
}
