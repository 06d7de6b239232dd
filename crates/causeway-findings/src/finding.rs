//! The persisted finding document
//!
//! Modeled as a tagged structure with an explicit status enum; the
//! constructor takes every required field, so a finding cannot exist
//! without them. The version token lives alongside the document (held by
//! readers), never inside it.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque unique finding identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingId(String);

impl FindingId {
    /// Generate a fresh identifier
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FindingId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for FindingId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FindingId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for FindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Lifecycle status of a finding
///
/// `pending_review` accepts approve/reject; `approved` is a transient
/// staging state immediately followed by a remediation attempt;
/// `processed`, `rejected`, and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    PendingReview,
    Approved,
    Rejected,
    Processed,
    Failed,
}

impl FindingStatus {
    /// Whether no further transition is permitted from this status
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FindingStatus::Rejected | FindingStatus::Processed | FindingStatus::Failed
        )
    }
}

impl std::fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FindingStatus::PendingReview => write!(f, "pending_review"),
            FindingStatus::Approved => write!(f, "approved"),
            FindingStatus::Rejected => write!(f, "rejected"),
            FindingStatus::Processed => write!(f, "processed"),
            FindingStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A persisted analysis outcome plus its approval lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Unique identifier
    pub id: FindingId,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Identifier of the producing agent
    pub agent_id: String,
    /// Kind of finding (e.g. "incident", "anomaly")
    pub finding_type: String,
    /// Severity
    pub severity: Severity,
    /// Short title
    pub title: String,
    /// Detailed description
    pub description: String,
    /// Actions already taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions_taken: Option<String>,
    /// Actions proposed but requiring human approval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_actions: Option<String>,
    /// Related resources (logs, metrics, reports)
    #[serde(default)]
    pub related_resources: IndexMap<String, Value>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: IndexMap<String, Value>,
    /// Categorization tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Lifecycle status
    pub status: FindingStatus,
    /// Human feedback captured on approve/reject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_feedback: Option<String>,
    /// Whether a human approved the proposed actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_approved: Option<bool>,
    /// Last lifecycle update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// When remediation completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// When remediation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    /// Remediation collaborator's result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_result: Option<String>,
    /// Remediation failure detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Finding {
    /// Create a finding in `pending_review` with every required field
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        finding_type: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: FindingId::new(),
            timestamp: Utc::now(),
            agent_id: agent_id.into(),
            finding_type: finding_type.into(),
            severity,
            title: title.into(),
            description: description.into(),
            actions_taken: None,
            proposed_actions: None,
            related_resources: IndexMap::new(),
            metadata: IndexMap::new(),
            tags: Vec::new(),
            status: FindingStatus::PendingReview,
            human_feedback: None,
            human_approved: None,
            updated_at: None,
            processed_at: None,
            failed_at: None,
            action_result: None,
            error_message: None,
        }
    }

    /// With actions already taken
    #[must_use]
    pub fn with_actions_taken(mut self, actions: impl Into<String>) -> Self {
        self.actions_taken = Some(actions.into());
        self
    }

    /// With proposed actions awaiting approval
    #[must_use]
    pub fn with_proposed_actions(mut self, actions: impl Into<String>) -> Self {
        self.proposed_actions = Some(actions.into());
        self
    }

    /// Attach a related resource
    #[must_use]
    pub fn with_resource(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.related_resources.insert(key.into(), value.into());
        self
    }

    /// Attach a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add a categorization tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Serialize into the stored document shape
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Parse a finding out of a stored document
    pub fn from_document(document: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finding() -> Finding {
        Finding::new(
            "auto-monitor",
            "incident",
            Severity::High,
            "Error burst in auth-service",
            "12 errors in 15 minutes",
        )
    }

    #[test]
    fn new_finding_starts_pending() {
        let finding = finding();
        assert_eq!(finding.status, FindingStatus::PendingReview);
        assert!(finding.human_approved.is_none());
        assert!(!finding.id.as_str().is_empty());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(FindingId::new(), FindingId::new());
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&FindingStatus::PendingReview).unwrap(),
            "\"pending_review\""
        );
        assert_eq!(
            serde_json::to_string(&FindingStatus::Processed).unwrap(),
            "\"processed\""
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(!FindingStatus::PendingReview.is_terminal());
        assert!(!FindingStatus::Approved.is_terminal());
        assert!(FindingStatus::Rejected.is_terminal());
        assert!(FindingStatus::Processed.is_terminal());
        assert!(FindingStatus::Failed.is_terminal());
    }

    #[test]
    fn document_roundtrip() {
        let original = finding()
            .with_proposed_actions("restart auth-service")
            .with_resource("service", "auth-service")
            .with_metadata("burst_ratio", 12.5)
            .with_tag("auto-detected");

        let document = original.to_document().unwrap();
        assert_eq!(document["status"], json!("pending_review"));
        assert_eq!(document["severity"], json!("high"));
        assert_eq!(document["related_resources"]["service"], json!("auth-service"));
        // Unset optionals are omitted from the document.
        assert!(document.get("human_feedback").is_none());

        let parsed = Finding::from_document(document).unwrap();
        assert_eq!(parsed.id, original.id);
        assert_eq!(parsed.proposed_actions.as_deref(), Some("restart auth-service"));
        assert_eq!(parsed.tags, vec!["auto-detected".to_string()]);
    }

    #[test]
    fn document_missing_required_field_is_rejected() {
        let document = json!({
            "id": "f1",
            "timestamp": "2024-04-10T12:00:00Z",
            "agent_id": "auto-monitor",
            // finding_type missing
            "severity": "low",
            "title": "t",
            "description": "d",
            "status": "pending_review"
        });
        assert!(Finding::from_document(document).is_err());
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
