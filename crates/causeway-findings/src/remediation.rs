//! The remediation collaborator seam
//!
//! The core never executes mitigation itself; on approval it hands the
//! finding's proposed actions to this collaborator and records the
//! outcome. Errors and timeouts are treated identically: both route the
//! finding to the `failed` terminal state and are never auto-retried.

use crate::finding::Finding;
use async_trait::async_trait;
use std::time::Duration;

/// Failures of the external mitigation action
#[derive(Debug, thiserror::Error)]
pub enum RemediationError {
    /// The collaborator reported a failure
    #[error("remediation failed: {0}")]
    Failed(String),

    /// The collaborator did not respond in time
    #[error("remediation timed out after {0:?}")]
    Timeout(Duration),
}

/// External executor of approved mitigation actions
#[async_trait]
pub trait Remediator: Send + Sync {
    /// Execute the finding's proposed actions, returning a result summary
    async fn execute(&self, finding: &Finding) -> Result<String, RemediationError>;
}

/// Remediator that only records what would be executed
///
/// Stands in where no real deployment system is wired up; the approval
/// flow still resolves to `processed` with an acknowledgement.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggedRemediator;

#[async_trait]
impl Remediator for LoggedRemediator {
    async fn execute(&self, finding: &Finding) -> Result<String, RemediationError> {
        let actions = finding.proposed_actions.as_deref().unwrap_or("(none)");
        tracing::info!(
            finding_id = %finding.id,
            %actions,
            "recording approved actions"
        );
        Ok(format!("acknowledged actions for finding {}", finding.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Severity;

    #[tokio::test]
    async fn logged_remediator_acknowledges() {
        let finding = Finding::new("agent", "incident", Severity::Low, "t", "d")
            .with_proposed_actions("restart auth-service");
        let result = LoggedRemediator.execute(&finding).await.unwrap();
        assert!(result.contains(finding.id.as_str()));
    }
}
