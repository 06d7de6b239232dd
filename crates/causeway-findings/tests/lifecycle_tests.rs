//! Lifecycle tests against the in-memory store's real CAS semantics.

use async_trait::async_trait;
use causeway_findings::{
    ApprovalAction, ApprovalStateMachine, Finding, FindingStatus, FindingsStore, RemediationError,
    Remediator, Severity, TransitionError, TransitionOutcome, UPDATE_RETRY_BUDGET,
};
use causeway_test_utils::MemoryStore;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts invocations; fails when constructed as failing.
#[derive(Default)]
struct CountingRemediator {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingRemediator {
    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Remediator for CountingRemediator {
    async fn execute(&self, _finding: &Finding) -> Result<String, RemediationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(RemediationError::Failed("rollback rejected".to_string()))
        } else {
            Ok("rolled back auth-service to v1.2.3".to_string())
        }
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    findings: FindingsStore,
    remediator: Arc<CountingRemediator>,
    machine: ApprovalStateMachine,
}

async fn harness(remediator: CountingRemediator) -> (Harness, Finding) {
    let store = Arc::new(MemoryStore::new());
    let findings = FindingsStore::with_prefix(store.clone(), "app-logs");
    findings.ensure_index().await.unwrap();

    let finding = Finding::new(
        "auto-monitor",
        "incident",
        Severity::High,
        "Error burst in auth-service",
        "12 errors in 15 minutes, baseline 0.2/minute",
    )
    .with_proposed_actions("rollback auth-service to v1.2.3");
    findings.store(&finding).await.unwrap();

    let remediator = Arc::new(remediator);
    let machine = ApprovalStateMachine::new(findings.clone(), remediator.clone());
    (
        Harness {
            store,
            findings,
            remediator,
            machine,
        },
        finding,
    )
}

#[tokio::test]
async fn approve_executes_remediation_and_processes() {
    let (h, finding) = harness(CountingRemediator::default()).await;

    let outcome = h
        .machine
        .transition(&finding.id, ApprovalAction::Approve)
        .await
        .unwrap();

    assert!(matches!(outcome, TransitionOutcome::Completed { .. }));
    assert_eq!(outcome.status(), FindingStatus::Processed);
    assert_eq!(h.remediator.calls(), 1);

    let stored = h.store.document(h.findings.index(), finding.id.as_str()).unwrap();
    assert_eq!(stored["status"], json!("processed"));
    assert_eq!(stored["human_approved"], json!(true));
    assert!(stored["action_result"].as_str().unwrap().contains("rolled back"));
    assert!(stored.get("processed_at").is_some());
}

#[tokio::test]
async fn double_approve_is_a_noop() {
    let (h, finding) = harness(CountingRemediator::default()).await;

    let first = h
        .machine
        .transition(&finding.id, ApprovalAction::Approve)
        .await
        .unwrap();
    assert!(!first.is_noop());

    let second = h
        .machine
        .transition(&finding.id, ApprovalAction::Approve)
        .await
        .unwrap();
    assert!(matches!(
        second,
        TransitionOutcome::AlreadyHandled {
            status: FindingStatus::Processed
        }
    ));
    // The side effect ran exactly once.
    assert_eq!(h.remediator.calls(), 1);
}

#[tokio::test]
async fn reject_is_terminal_and_skips_remediation() {
    let (h, finding) = harness(CountingRemediator::default()).await;

    let outcome = h
        .machine
        .transition(&finding.id, ApprovalAction::Reject)
        .await
        .unwrap();
    assert!(matches!(outcome, TransitionOutcome::Rejected { .. }));
    assert_eq!(h.remediator.calls(), 0);

    let stored = h.store.document(h.findings.index(), finding.id.as_str()).unwrap();
    assert_eq!(stored["status"], json!("rejected"));
    assert_eq!(stored["human_approved"], json!(false));

    // A late approve on the rejected finding is reported, not applied.
    let late = h
        .machine
        .transition(&finding.id, ApprovalAction::Approve)
        .await
        .unwrap();
    assert!(matches!(
        late,
        TransitionOutcome::AlreadyHandled {
            status: FindingStatus::Rejected
        }
    ));
    assert_eq!(h.remediator.calls(), 0);
}

#[tokio::test]
async fn remediation_failure_resolves_to_failed() {
    let (h, finding) = harness(CountingRemediator::failing()).await;

    let outcome = h
        .machine
        .transition(&finding.id, ApprovalAction::Approve)
        .await
        .unwrap();

    match outcome {
        TransitionOutcome::RemediationFailed { error, .. } => {
            assert!(error.contains("rollback rejected"));
        }
        other => panic!("expected remediation failure, got {other:?}"),
    }

    // Never left in approved: the failure is recorded terminally.
    let stored = h.store.document(h.findings.index(), finding.id.as_str()).unwrap();
    assert_eq!(stored["status"], json!("failed"));
    assert!(stored["error_message"].as_str().unwrap().contains("rollback rejected"));
    assert!(stored.get("failed_at").is_some());
}

#[tokio::test]
async fn conflict_retry_recovers_within_budget() {
    let (h, finding) = harness(CountingRemediator::default()).await;

    // The first two conditional writes lose the race; the third wins.
    h.store.inject_conflicts((UPDATE_RETRY_BUDGET - 1) as u64);
    let outcome = h
        .machine
        .transition(&finding.id, ApprovalAction::Reject)
        .await
        .unwrap();
    assert!(matches!(outcome, TransitionOutcome::Rejected { .. }));

    let stored = h.store.document(h.findings.index(), finding.id.as_str()).unwrap();
    assert_eq!(stored["status"], json!("rejected"));
}

#[tokio::test]
async fn conflict_exhaustion_is_fatal_and_leaves_state_valid() {
    let (h, finding) = harness(CountingRemediator::default()).await;

    h.store.inject_conflicts(UPDATE_RETRY_BUDGET as u64);
    let err = h
        .machine
        .transition(&finding.id, ApprovalAction::Approve)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransitionError::ConflictExhausted {
            attempts: UPDATE_RETRY_BUDGET
        }
    ));

    // No side effect ran and the document never left the transition graph.
    assert_eq!(h.remediator.calls(), 0);
    let stored = h.store.document(h.findings.index(), finding.id.as_str()).unwrap();
    assert_eq!(stored["status"], json!("pending_review"));
}

#[tokio::test]
async fn concurrent_transitions_have_one_winner() {
    let (h, finding) = harness(CountingRemediator::default()).await;
    let second_machine =
        ApprovalStateMachine::new(h.findings.clone(), h.remediator.clone());

    let (approve, reject) = tokio::join!(
        h.machine.transition(&finding.id, ApprovalAction::Approve),
        second_machine.transition(&finding.id, ApprovalAction::Reject),
    );
    let approve = approve.unwrap();
    let reject = reject.unwrap();

    // Exactly one caller transitioned the finding.
    assert_eq!(
        [approve.is_noop(), reject.is_noop()].iter().filter(|n| **n).count(),
        1
    );

    // Whatever interleaving happened, the stored status is terminal.
    let stored = h.store.document(h.findings.index(), finding.id.as_str()).unwrap();
    let status = stored["status"].as_str().unwrap();
    assert!(matches!(status, "processed" | "rejected" | "failed"));
    assert!(h.remediator.calls() <= 1);
}

#[tokio::test]
async fn transition_on_unknown_finding_is_not_found() {
    let (h, _) = harness(CountingRemediator::default()).await;
    let err = h
        .machine
        .transition(&"ghost".into(), ApprovalAction::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::NotFound(_)));
}

#[tokio::test]
async fn pending_listing_filters_by_agent() {
    let (h, _) = harness(CountingRemediator::default()).await;

    // The listing issues a status + agent term query; canned response is
    // served by the store queue.
    h.store.push_search(causeway_test_utils::hits_response(vec![Finding::new(
        "auto-monitor",
        "incident",
        Severity::Low,
        "t",
        "d",
    )
    .to_document()
    .unwrap()]));

    let pending = h.findings.pending(Some("auto-monitor")).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, FindingStatus::PendingReview);

    let body = &h.store.executed_searches()[0].1;
    assert_eq!(body["query"]["bool"]["must"][0]["term"]["status"], json!("pending_review"));
    assert_eq!(body["query"]["bool"]["must"][1]["term"]["agent_id"], json!("auto-monitor"));
}
