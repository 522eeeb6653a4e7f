use super::*;
use crate::audit::InMemoryAuditLog;
use crate::kyc::FixtureProfileSource;
use crate::models::{DocumentReference, NotificationAck};
use crate::session::ConversationHistory;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_test::{assert_err, assert_ok};

#[derive(Default)]
struct CountingRenderer {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl DocumentRenderer for CountingRenderer {
    async fn render(&self, profile: &CustomerProfile, amount: f64, tenure: u32) -> Result<DocumentReference> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OrchestrationError::CollaboratorFailure("renderer down".into()));
        }
        let file_name = format!("{}_{}_{}.html", profile.customer_id, amount as u64, tenure);
        Ok(DocumentReference {
            location: file_name.clone().into(),
            file_name,
        })
    }
}

#[derive(Default)]
struct CountingNotifier {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Notifier for CountingNotifier {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn send(&self, to: &str, _: &str, _: &str, _: &DocumentReference) -> Result<NotificationAck> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OrchestrationError::CollaboratorFailure("smtp down".into()));
        }
        Ok(NotificationAck {
            recipient: to.to_string(),
            message_id: Some("m-1".into()),
        })
    }
}

struct HangingNotifier;

#[async_trait]
impl Notifier for HangingNotifier {
    fn name(&self) -> &'static str {
        "hanging"
    }

    async fn send(&self, to: &str, _: &str, _: &str, _: &DocumentReference) -> Result<NotificationAck> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(NotificationAck {
            recipient: to.to_string(),
            message_id: None,
        })
    }
}

struct Harness {
    dispatcher: WorkflowDispatcher,
    renderer: Arc<CountingRenderer>,
    notifier: Arc<CountingNotifier>,
    audit: InMemoryAuditLog,
}

fn harness(render_fails: bool, notify_fails: bool) -> Harness {
    let renderer = Arc::new(CountingRenderer {
        fail: render_fails,
        ..Default::default()
    });
    let notifier = Arc::new(CountingNotifier {
        fail: notify_fails,
        ..Default::default()
    });
    let audit = InMemoryAuditLog::new();
    let timeout = Duration::from_secs(5);

    let dispatcher = WorkflowDispatcher::new(
        ProfileResolver::new(timeout).with_source(Arc::new(FixtureProfileSource::new())),
        UnderwritingEngine::new(),
        renderer.clone(),
        notifier.clone(),
        AuditTrail::new(Arc::new(audit.clone()), timeout),
        timeout,
    );

    Harness {
        dispatcher,
        renderer,
        notifier,
        audit,
    }
}

fn session() -> Session {
    Session::new("sess_dispatch", ConversationHistory::new())
}

#[tokio::test]
async fn test_verify_kyc_attaches_profile_and_patches_meta() {
    let h = harness(false, false);
    let mut s = session();

    let result = assert_ok!(h.dispatcher.verify_kyc(&mut s, "CUST01").await);

    assert_eq!(result.status, StepStatus::Success);
    assert_eq!(result.next_state, WorkflowState::AwaitingAmount);
    assert_eq!(s.profile.as_ref().unwrap().name, "Ramesh S.");
    let meta = h.audit.meta("sess_dispatch").await;
    assert_eq!(meta["email"], json!("ramesh@example.com"));
}

#[tokio::test]
async fn test_verify_kyc_not_found_keeps_state() {
    let h = harness(false, false);
    let mut s = session();

    let result = assert_ok!(h.dispatcher.verify_kyc(&mut s, "cust404").await);

    assert_eq!(result.status, StepStatus::Error);
    assert_eq!(result.message.as_deref(), Some("Customer ID not found"));
    assert_eq!(result.next_state, WorkflowState::AwaitingId);
    assert!(s.profile.is_none());

    let result = assert_ok!(h.dispatcher.verify_kyc(&mut s, "12345").await);
    assert_eq!(result.status, StepStatus::Error);
    assert_eq!(s.state(), WorkflowState::AwaitingId);
}

#[tokio::test]
async fn test_underwrite_without_profile_is_rejected() {
    let h = harness(false, false);
    let mut s = session();

    let err = assert_err!(h.dispatcher.underwrite(&mut s, 500_000.0).await);

    assert!(matches!(err, OrchestrationError::InvalidPrecondition(_)));
    assert!(s.last_decision.is_none());
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sanctioned_loan_issues_letter_and_notifies() {
    let h = harness(false, false);
    let mut s = session();
    h.dispatcher.verify_kyc(&mut s, "cust01").await.unwrap();

    let result = assert_ok!(h.dispatcher.underwrite(&mut s, 500_000.0).await);

    assert_eq!(result.outcome, Outcome::PreApproved);
    assert_eq!(result.tenure_months, Some(60));
    assert_eq!(
        result.notification_summary.as_deref(),
        Some("Sanction letter sent to ramesh@example.com")
    );
    assert_eq!(result.next_state, WorkflowState::Decided);
    assert_eq!(s.state(), WorkflowState::Decided);

    let sanction = s.sanction.as_ref().unwrap();
    assert!(sanction.notified);
    assert_eq!(sanction.document.file_name, "cust01_500000_60.html");
    assert_eq!(s.profile.as_ref().unwrap().pre_approved_limit, 1_200_000.0);

    let meta = h.audit.meta("sess_dispatch").await;
    assert_eq!(meta["sanction_digest"].as_str().unwrap().len(), 64);
    assert_eq!(h.notifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejection_has_no_side_effects() {
    let h = harness(false, false);
    let mut s = session();
    h.dispatcher.verify_kyc(&mut s, "cust10").await.unwrap();

    // limit 750k; 3M is beyond twice the limit
    let result = assert_ok!(h.dispatcher.underwrite(&mut s, 3_000_000.0).await);

    assert_eq!(result.outcome, Outcome::Rejected);
    assert_eq!(result.next_state, WorkflowState::AwaitingAmount);
    assert!(result.notification_summary.is_none());
    assert!(s.sanction.is_none());
    assert_eq!(s.last_decision.as_ref().unwrap().outcome, Outcome::Rejected);
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.notifier.calls.load(Ordering::SeqCst), 0);

    let retry = assert_ok!(h.dispatcher.underwrite(&mut s, 400_000.0).await);
    assert_eq!(retry.outcome, Outcome::PreApproved);
}

#[tokio::test]
async fn test_non_numeric_amount_is_rejected_decision() {
    let h = harness(false, false);
    let mut s = session();
    h.dispatcher.verify_kyc(&mut s, "cust01").await.unwrap();

    let result = assert_ok!(
        h.dispatcher
            .underwrite(&mut s, parse_amount(&json!("a lot")))
            .await
    );

    assert_eq!(result.outcome, Outcome::Rejected);
    assert_eq!(result.message, "Loan amount must be numeric");
}

#[tokio::test]
async fn test_render_failure_is_fatal_and_leaves_state() {
    let h = harness(true, false);
    let mut s = session();
    h.dispatcher.verify_kyc(&mut s, "cust01").await.unwrap();

    let err = assert_err!(h.dispatcher.underwrite(&mut s, 500_000.0).await);

    assert!(matches!(err, OrchestrationError::CollaboratorFailure(_)));
    assert_eq!(s.state(), WorkflowState::AwaitingAmount);
    assert!(s.sanction.is_none());
    assert_eq!(h.notifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_notification_failure_keeps_issued_document() {
    let h = harness(false, true);
    let mut s = session();
    h.dispatcher.verify_kyc(&mut s, "cust01").await.unwrap();

    let err = assert_err!(h.dispatcher.underwrite(&mut s, 500_000.0).await);

    assert!(matches!(err, OrchestrationError::CollaboratorFailure(_)));
    let sanction = s.sanction.as_ref().expect("issued document recorded");
    assert!(!sanction.notified);
    assert_eq!(s.state(), WorkflowState::Decided);
    let meta = h.audit.meta("sess_dispatch").await;
    assert_eq!(meta["sanction_notified"], json!(false));
}

#[tokio::test(start_paused = true)]
async fn test_hung_notifier_times_out() {
    let timeout = Duration::from_secs(2);
    let dispatcher = WorkflowDispatcher::new(
        ProfileResolver::new(timeout).with_source(Arc::new(FixtureProfileSource::new())),
        UnderwritingEngine::new(),
        Arc::new(CountingRenderer::default()),
        Arc::new(HangingNotifier),
        AuditTrail::disabled(),
        timeout,
    );
    let mut s = session();
    dispatcher.verify_kyc(&mut s, "cust01").await.unwrap();

    let err = assert_err!(dispatcher.underwrite(&mut s, 500_000.0).await);

    assert!(matches!(err, OrchestrationError::Timeout { collaborator: "notifier", .. }));
    assert!(!s.sanction.as_ref().unwrap().notified);
}
