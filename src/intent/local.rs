//! Local intent matcher
//!
//! Keyword/pattern fallback used when the language model is not configured
//! or fails. Rules are checked in order; the first match wins.

use super::{extract_amount, extract_customer_id, IntentResolution};
use crate::models::Step;
use crate::session::Session;

pub const ASK_CUSTOMER_ID: &str = "Please provide your customer ID in format custXXXX.";
pub const ASK_LOAN_AMOUNT: &str = "Please provide the loan amount.";

const SANCTION_KEYWORDS: &[&str] = &["sanction", "letter"];

pub struct LocalMatcher;

impl LocalMatcher {
    pub fn resolve(session: &Session, text: &str) -> IntentResolution {
        let lowered = text.to_lowercase();

        if extract_customer_id(&lowered).is_some() {
            return IntentResolution::Invoke(Step::VerifyKyc);
        }

        if let Some(sanction) = &session.sanction {
            if SANCTION_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
                return IntentResolution::Reply(sanction_status(
                    &sanction.recipient_email,
                    sanction.notified,
                ));
            }
        }

        if session.profile.is_some() {
            if extract_amount(&lowered).is_some() {
                return IntentResolution::Invoke(Step::Underwrite);
            }
            return IntentResolution::Reply(ASK_LOAN_AMOUNT.to_string());
        }

        IntentResolution::Reply(ASK_CUSTOMER_ID.to_string())
    }
}

/// Reply for follow-ups about an issued sanction letter.
pub fn sanction_status(email: &str, notified: bool) -> String {
    if notified {
        format!("The sanction letter has already been emailed to {}.", email)
    } else {
        format!(
            "Your sanction letter was issued but could not be emailed to {}. Please contact support.",
            email
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomerProfile, DocumentReference, SanctionRecord, WorkflowState};
    use crate::session::ConversationHistory;
    use chrono::Utc;

    fn profile() -> CustomerProfile {
        CustomerProfile {
            customer_id: "cust01".to_string(),
            name: "Ramesh S.".to_string(),
            email: "ramesh@example.com".to_string(),
            phone: String::new(),
            credit_score: 810,
            salary: 80_000.0,
            pre_approved_limit: 0.0,
            current_loan_status: "NA".to_string(),
            pan_number: None,
            city: None,
            age: None,
        }
    }

    fn fresh() -> Session {
        Session::new("sess_local", ConversationHistory::new())
    }

    #[test]
    fn test_customer_id_wins_in_any_state() {
        let session = fresh();
        assert_eq!(
            LocalMatcher::resolve(&session, "my id is cust01"),
            IntentResolution::Invoke(Step::VerifyKyc)
        );

        let mut verified = fresh();
        verified.attach_profile(profile());
        assert_eq!(
            LocalMatcher::resolve(&verified, "use CUST10 and give me 500000"),
            IntentResolution::Invoke(Step::VerifyKyc)
        );
    }

    #[test]
    fn test_amount_after_kyc() {
        let mut session = fresh();
        session.attach_profile(profile());
        assert_eq!(session.state(), WorkflowState::AwaitingAmount);

        assert_eq!(
            LocalMatcher::resolve(&session, "can I get 750000"),
            IntentResolution::Invoke(Step::Underwrite)
        );
        assert_eq!(
            LocalMatcher::resolve(&session, "maybe 50"),
            IntentResolution::Reply(ASK_LOAN_AMOUNT.to_string())
        );
    }

    #[test]
    fn test_amount_before_kyc_asks_for_id() {
        let session = fresh();
        assert_eq!(
            LocalMatcher::resolve(&session, "I need 500000"),
            IntentResolution::Reply(ASK_CUSTOMER_ID.to_string())
        );
    }

    #[test]
    fn test_sanction_follow_up() {
        let mut session = fresh();
        session.attach_profile(profile());
        session.sanction = Some(SanctionRecord {
            document: DocumentReference {
                file_name: "letter.html".to_string(),
                location: "sanctions/letter.html".into(),
            },
            recipient_email: "ramesh@example.com".to_string(),
            issued_at: Utc::now(),
            notified: true,
        });

        let reply = LocalMatcher::resolve(&session, "where is my Sanction Letter?");
        assert_eq!(
            reply,
            IntentResolution::Reply(
                "The sanction letter has already been emailed to ramesh@example.com.".to_string()
            )
        );

        // amount still wins over the follow-up when no keyword is present
        assert_eq!(
            LocalMatcher::resolve(&session, "now 300000 please"),
            IntentResolution::Invoke(Step::Underwrite)
        );
    }

    #[test]
    fn test_undelivered_sanction_is_not_reported_as_emailed() {
        let reply = sanction_status("neha@example.com", false);
        assert!(!reply.contains("already been emailed"));
        assert!(reply.contains("could not be emailed"));
    }
}
