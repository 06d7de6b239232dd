//! The approval state machine
//!
//! ```text
//! pending_review --approve--> approved --(execute)--------> processed
//! pending_review --approve--> approved --(execute fails)--> failed
//! pending_review --reject--> rejected
//! ```
//!
//! No other edges exist. Re-delivery of an approval (duplicate webhook,
//! double click) against anything past `pending_review` is a no-op that
//! never re-executes side effects. Safety under concurrent callbacks
//! comes entirely from the store's conditional update; contenders
//! re-read and retry, never assume success.

use crate::error::TransitionError;
use crate::finding::{Finding, FindingId, FindingStatus};
use crate::remediation::Remediator;
use crate::store::{FindingsStore, UpdateDecision, UpdateOutcome};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Action carried by an approval callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

impl ApprovalAction {
    /// Wire representation of the action
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::Approve => "approve",
            ApprovalAction::Reject => "reject",
        }
    }
}

impl std::str::FromStr for ApprovalAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ApprovalAction::Approve),
            "reject" => Ok(ApprovalAction::Reject),
            other => Err(format!("unknown approval action: {other}")),
        }
    }
}

impl std::fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statuses reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: FindingStatus) -> Vec<FindingStatus> {
    use FindingStatus::*;
    match from {
        PendingReview => vec![Approved, Rejected],
        Approved => vec![Processed, Failed],
        Rejected | Processed | Failed => vec![],
    }
}

/// Validate one edge of the transition graph
pub fn validate_transition(
    from: FindingStatus,
    to: FindingStatus,
) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError::IllegalTransition { from, to })
    }
}

/// How one transition invocation resolved
#[derive(Debug)]
pub enum TransitionOutcome {
    /// Approved and remediation completed; the finding is `processed`
    Completed { finding: Finding },
    /// Approved but remediation failed; the finding is `failed`
    RemediationFailed { finding: Finding, error: String },
    /// Rejected; the finding is terminal
    Rejected { finding: Finding },
    /// The finding was already past review; nothing was done
    AlreadyHandled { status: FindingStatus },
}

impl TransitionOutcome {
    /// Status of the finding after this invocation
    #[must_use]
    pub fn status(&self) -> FindingStatus {
        match self {
            TransitionOutcome::Completed { .. } => FindingStatus::Processed,
            TransitionOutcome::RemediationFailed { .. } => FindingStatus::Failed,
            TransitionOutcome::Rejected { .. } => FindingStatus::Rejected,
            TransitionOutcome::AlreadyHandled { status } => *status,
        }
    }

    /// Whether this invocation was a no-op
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, TransitionOutcome::AlreadyHandled { .. })
    }
}

/// Drives approval transitions on stored findings
pub struct ApprovalStateMachine {
    findings: FindingsStore,
    remediator: Arc<dyn Remediator>,
}

impl ApprovalStateMachine {
    /// Create a state machine over a findings store and a remediator
    #[must_use]
    pub fn new(findings: FindingsStore, remediator: Arc<dyn Remediator>) -> Self {
        Self {
            findings,
            remediator,
        }
    }

    /// Apply an approve/reject action to a finding
    ///
    /// Approval stages through `approved`, then immediately attempts
    /// remediation and resolves to `processed` or `failed`; the finding
    /// is never left in `approved`.
    pub async fn transition(
        &self,
        id: &FindingId,
        action: ApprovalAction,
    ) -> Result<TransitionOutcome, TransitionError> {
        let target = match action {
            ApprovalAction::Approve => FindingStatus::Approved,
            ApprovalAction::Reject => FindingStatus::Rejected,
        };
        let feedback = format!("Action {target} via approval channel.");

        let outcome = self
            .findings
            .update_guarded(id, |finding| {
                if finding.status != FindingStatus::PendingReview {
                    return UpdateDecision::Skip;
                }
                UpdateDecision::Transition {
                    to: target,
                    patch: json!({
                        "human_feedback": feedback,
                        "human_approved": action == ApprovalAction::Approve,
                        "updated_at": Utc::now(),
                    }),
                }
            })
            .await?;

        let finding = match outcome {
            UpdateOutcome::Skipped(finding) => {
                tracing::info!(
                    finding_id = %id,
                    status = %finding.status,
                    "finding already handled; no action taken"
                );
                return Ok(TransitionOutcome::AlreadyHandled {
                    status: finding.status,
                });
            }
            UpdateOutcome::Updated(finding) => finding,
        };

        if action == ApprovalAction::Reject {
            tracing::info!(finding_id = %id, "finding rejected");
            return Ok(TransitionOutcome::Rejected { finding });
        }

        tracing::info!(finding_id = %id, "finding approved; executing remediation");
        match self.remediator.execute(&finding).await {
            Ok(result) => {
                let updated = self
                    .findings
                    .update_guarded(id, |_| UpdateDecision::Transition {
                        to: FindingStatus::Processed,
                        patch: json!({
                            "processed_at": Utc::now(),
                            "action_result": result.clone(),
                        }),
                    })
                    .await?;
                let finding = match updated {
                    UpdateOutcome::Updated(finding) | UpdateOutcome::Skipped(finding) => finding,
                };
                tracing::info!(finding_id = %id, "remediation completed");
                Ok(TransitionOutcome::Completed { finding })
            }
            Err(err) => {
                let detail = err.to_string();
                tracing::error!(finding_id = %id, error = %detail, "remediation failed");
                let updated = self
                    .findings
                    .update_guarded(id, |_| UpdateDecision::Transition {
                        to: FindingStatus::Failed,
                        patch: json!({
                            "failed_at": Utc::now(),
                            "error_message": detail.clone(),
                        }),
                    })
                    .await?;
                let finding = match updated {
                    UpdateOutcome::Updated(finding) | UpdateOutcome::Skipped(finding) => finding,
                };
                Ok(TransitionOutcome::RemediationFailed {
                    finding,
                    error: detail,
                })
            }
        }
    }
}
