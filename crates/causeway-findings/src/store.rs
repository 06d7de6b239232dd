//! Findings persistence
//!
//! Index bootstrap, reads, and the one shared optimistic-concurrency
//! update helper every finding mutation goes through: read the latest
//! revision, decide against it, conditionally write with its token, and
//! on conflict re-read and retry within a fixed budget.

use crate::error::TransitionError;
use crate::finding::{Finding, FindingId, FindingStatus};
use crate::state_machine::validate_transition;
use causeway_store::{DocumentStore, SearchRequest, StoreError, VersionToken};
use serde_json::{json, Value};
use std::sync::Arc;

/// Attempts per conditional update before giving up
pub const UPDATE_RETRY_BUDGET: usize = 3;

/// Maximum findings returned by a pending-review listing
pub const PENDING_SEARCH_LIMIT: usize = 100;

/// Findings index name for a given index prefix
#[must_use]
pub fn findings_index(prefix: &str) -> String {
    format!("{prefix}-agent-findings")
}

/// Schema of the findings index
#[must_use]
pub fn index_schema() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": {"type": "keyword"},
                "timestamp": {"type": "date"},
                "agent_id": {"type": "keyword"},
                "finding_type": {"type": "keyword"},
                "severity": {"type": "keyword"},
                "title": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
                "description": {"type": "text"},
                "actions_taken": {"type": "text"},
                "proposed_actions": {"type": "text"},
                "status": {"type": "keyword"},
                "human_feedback": {"type": "text"},
                "human_approved": {"type": "boolean"},
                "related_resources": {"type": "object"},
                "metadata": {"type": "object"},
                "tags": {"type": "keyword"}
            }
        },
        "settings": {
            "number_of_shards": 3,
            "number_of_replicas": 1
        }
    })
}

/// What a guarded update decided after reading the latest revision
#[derive(Debug)]
pub enum UpdateDecision {
    /// Move to `to`, merging `patch` (an object) into the document
    Transition { to: FindingStatus, patch: Value },
    /// Leave the document untouched
    Skip,
}

/// Result of a guarded update
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The transition was durably written; carries the merged finding
    Updated(Finding),
    /// The decision was to leave the document as read
    Skipped(Finding),
}

/// Store facade for the findings index
#[derive(Clone)]
pub struct FindingsStore {
    store: Arc<dyn DocumentStore>,
    index: String,
}

impl FindingsStore {
    /// Create a store over an explicit index name
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
        }
    }

    /// Create a store over the conventional index for `prefix`
    #[must_use]
    pub fn with_prefix(store: Arc<dyn DocumentStore>, prefix: &str) -> Self {
        Self::new(store, findings_index(prefix))
    }

    /// The index this store writes to
    #[inline]
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Create the findings index if it does not exist
    pub async fn ensure_index(&self) -> Result<(), StoreError> {
        self.store.ensure_index(&self.index, &index_schema()).await
    }

    /// Persist a new finding, returning its id
    pub async fn store(&self, finding: &Finding) -> Result<FindingId, StoreError> {
        let document = finding.to_document()?;
        self.store
            .put(&self.index, finding.id.as_str(), &document)
            .await?;
        tracing::info!(finding_id = %finding.id, severity = %finding.severity, "stored finding");
        Ok(finding.id.clone())
    }

    /// Fetch a finding and the token of the revision that was read
    pub async fn fetch(&self, id: &FindingId) -> Result<(Finding, VersionToken), StoreError> {
        let document = self.store.get(&self.index, id.as_str()).await?;
        let finding = Finding::from_document(document.source)?;
        Ok((finding, document.token))
    }

    /// Findings awaiting review, newest first, optionally for one agent
    pub async fn pending(&self, agent_id: Option<&str>) -> Result<Vec<Finding>, StoreError> {
        let mut request = SearchRequest::new(PENDING_SEARCH_LIMIT)
            .term("status", "pending_review")
            .sort_desc("timestamp");
        if let Some(agent_id) = agent_id {
            request = request.term("agent_id", agent_id);
        }

        let response = self.store.search(&self.index, &request).await?;
        let findings = response
            .hits
            .into_iter()
            .filter_map(|hit| match Finding::from_document(hit) {
                Ok(finding) => Some(finding),
                Err(err) => {
                    tracing::warn!(%err, "skipping unparseable finding document");
                    None
                }
            })
            .collect();
        Ok(findings)
    }

    /// Read-latest / conditional-write / retry-on-conflict
    ///
    /// `decide` runs against the freshest revision on every attempt, so a
    /// contender that loses the race re-evaluates before re-applying.
    /// Transition legality is validated here, against the revision the
    /// write is conditioned on; the decided status is merged into the
    /// patch. Exhausting the budget is fatal for this invocation.
    pub async fn update_guarded<F>(
        &self,
        id: &FindingId,
        mut decide: F,
    ) -> Result<UpdateOutcome, TransitionError>
    where
        F: FnMut(&Finding) -> UpdateDecision,
    {
        for attempt in 1..=UPDATE_RETRY_BUDGET {
            let (finding, token) = self.fetch(id).await?;
            let (to, mut patch) = match decide(&finding) {
                UpdateDecision::Skip => return Ok(UpdateOutcome::Skipped(finding)),
                UpdateDecision::Transition { to, patch } => (to, patch),
            };
            validate_transition(finding.status, to)?;
            patch["status"] = serde_json::to_value(to)?;

            match self
                .store
                .update_conditional(&self.index, id.as_str(), &patch, token)
                .await
            {
                Ok(_) => {
                    let mut document = finding.to_document()?;
                    if let (Some(target), Some(fields)) =
                        (document.as_object_mut(), patch.as_object())
                    {
                        for (key, value) in fields {
                            target.insert(key.clone(), value.clone());
                        }
                    }
                    return Ok(UpdateOutcome::Updated(Finding::from_document(document)?));
                }
                Err(err) if err.is_conflict() => {
                    tracing::warn!(
                        finding_id = %id,
                        attempt,
                        "update conflict; re-reading latest revision"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(TransitionError::ConflictExhausted {
            attempts: UPDATE_RETRY_BUDGET,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_name_convention() {
        assert_eq!(findings_index("app-logs"), "app-logs-agent-findings");
    }

    #[test]
    fn schema_declares_lifecycle_fields() {
        let schema = index_schema();
        assert_eq!(schema["mappings"]["properties"]["status"]["type"], json!("keyword"));
        assert_eq!(
            schema["mappings"]["properties"]["human_approved"]["type"],
            json!("boolean")
        );
    }
}
