//! The approval channel
//!
//! Consumes inbound approve/reject requests (`finding_id` + `action`),
//! drives the state machine, and maps every outcome onto a structured
//! response the boundary layer can render. Lifecycle failures surface as
//! a clear failure status, distinguishable from a success or a no-op.

use causeway_findings::{
    ApprovalAction, ApprovalStateMachine, FindingId, TransitionError, TransitionOutcome,
};
use serde::{Deserialize, Serialize};

/// Inbound approval callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub finding_id: String,
    /// `approve` or `reject`
    pub action: String,
}

/// Response status categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    Rejected,
    AlreadyHandled,
    Failed,
    Invalid,
}

/// Structured result rendered by the boundary layer
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalResponse {
    pub status: ApprovalStatus,
    pub message: String,
    pub finding_id: String,
}

impl ApprovalResponse {
    fn new(status: ApprovalStatus, message: impl Into<String>, finding_id: &str) -> Self {
        Self {
            status,
            message: message.into(),
            finding_id: finding_id.to_string(),
        }
    }
}

/// Handles approval callbacks against the state machine
pub struct ApprovalHandler {
    machine: ApprovalStateMachine,
}

impl ApprovalHandler {
    /// Create a handler over a state machine
    #[inline]
    #[must_use]
    pub fn new(machine: ApprovalStateMachine) -> Self {
        Self { machine }
    }

    /// Process one approval callback
    pub async fn handle(&self, request: ApprovalRequest) -> ApprovalResponse {
        let action: ApprovalAction = match request.action.parse() {
            Ok(action) => action,
            Err(err) => {
                return ApprovalResponse::new(ApprovalStatus::Invalid, err, &request.finding_id);
            }
        };
        let id = FindingId::from(request.finding_id.as_str());
        tracing::info!(finding_id = %id, %action, "processing approval request");

        match self.machine.transition(&id, action).await {
            Ok(TransitionOutcome::Completed { .. }) => ApprovalResponse::new(
                ApprovalStatus::Approved,
                "actions approved and executed",
                &request.finding_id,
            ),
            Ok(TransitionOutcome::RemediationFailed { error, .. }) => ApprovalResponse::new(
                ApprovalStatus::Failed,
                format!("actions approved but remediation failed: {error}"),
                &request.finding_id,
            ),
            Ok(TransitionOutcome::Rejected { .. }) => ApprovalResponse::new(
                ApprovalStatus::Rejected,
                "actions rejected; nothing will be executed",
                &request.finding_id,
            ),
            Ok(TransitionOutcome::AlreadyHandled { status }) => ApprovalResponse::new(
                ApprovalStatus::AlreadyHandled,
                format!("finding is already {status}; no action taken"),
                &request.finding_id,
            ),
            Err(err @ TransitionError::NotFound(_)) => ApprovalResponse::new(
                ApprovalStatus::Failed,
                err.to_string(),
                &request.finding_id,
            ),
            Err(err) => {
                tracing::error!(finding_id = %request.finding_id, %err, "transition failed");
                ApprovalResponse::new(
                    ApprovalStatus::Failed,
                    format!("transition failed: {err}"),
                    &request.finding_id,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ApprovalStatus::AlreadyHandled).unwrap(),
            "\"already_handled\""
        );
    }
}
