//! Deployment detection and before/after impact analysis
//!
//! Deployments are detected from deployment-shaped log lines; each event
//! is then assessed by comparing ERROR counts in the fixed-width windows
//! immediately before and after it. Events are assessed independently,
//! never merged.

use crate::window::TimeWindow;
use causeway_store::{Aggregation, DocumentStore, SearchRequest, StoreError};
use chrono::{DateTime, Duration, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Log-message phrases that mark a deployment event
pub const DEPLOYMENT_KEYWORDS: [&str; 7] = [
    "deployment",
    "deployed",
    "version",
    "update",
    "upgraded",
    "rollout",
    "release",
];

/// Width of the before/after impact windows, in minutes
pub const DEFAULT_IMPACT_WINDOW_MINUTES: i64 = 60;

/// Percent change beyond which a deployment counts as impactful
pub const IMPACT_THRESHOLD_PERCENT: f64 = 20.0;

/// Maximum deployment log lines fetched per detection query
pub const DEPLOYMENT_SEARCH_LIMIT: usize = 100;

/// A detected deployment log event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    /// Service the deployment belongs to
    pub service: String,
    /// When the deployment was logged
    pub timestamp: DateTime<Utc>,
    /// The raw log message
    pub message: String,
}

/// Direction of a deployment's effect on the error rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// Error rate rose by more than the threshold
    Negative,
    /// Error rate fell by more than the threshold
    Positive,
    /// Change stayed within the threshold
    None,
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Impact::Negative => write!(f, "negative"),
            Impact::Positive => write!(f, "positive"),
            Impact::None => write!(f, "none"),
        }
    }
}

/// Error picture inside one impact window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactWindow {
    /// The measured interval
    pub window: TimeWindow,
    /// ERROR documents inside the interval
    pub error_count: u64,
    /// Status-code histogram of those documents
    pub status_codes: IndexMap<String, u64>,
}

/// Before/after assessment of one deployment event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactAssessment {
    /// The deployment being assessed
    pub event: DeploymentEvent,
    /// Window leading up to the deployment
    pub before: ImpactWindow,
    /// Window following the deployment
    pub after: ImpactWindow,
    /// `after - before` error count
    pub error_change: i64,
    /// Change relative to `max(1, before)`, in percent
    pub error_change_percent: f64,
    /// Classification of the change
    pub impact: Impact,
}

/// Aggregate view over all assessed deployments
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImpactSummary {
    pub total_deployments: usize,
    pub services_with_deployments: usize,
    pub negative_impact: usize,
    pub positive_impact: usize,
    pub no_impact: usize,
}

/// Result of one impact-analysis run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImpactReport {
    /// Per-event assessments (events whose queries failed are omitted)
    pub assessments: Vec<ImpactAssessment>,
    /// Aggregate counts
    pub summary: ImpactSummary,
    /// First query failure encountered, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Classify an error-count change
///
/// Thresholds are strict inequalities on the percent change, not on the
/// absolute delta.
#[must_use]
pub fn classify_impact(error_change: i64, percent: f64) -> Impact {
    if error_change > 0 && percent > IMPACT_THRESHOLD_PERCENT {
        Impact::Negative
    } else if error_change < 0 && percent.abs() > IMPACT_THRESHOLD_PERCENT {
        Impact::Positive
    } else {
        Impact::None
    }
}

/// Detects deployments and measures their before/after error deltas
pub struct DeploymentImpactAnalyzer {
    store: Arc<dyn DocumentStore>,
    index: String,
}

impl DeploymentImpactAnalyzer {
    /// Create an analyzer over the given logs index
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
        }
    }

    /// Find deployment-shaped log events inside `window`, newest first
    pub async fn find_deployments(
        &self,
        service: Option<&str>,
        window: TimeWindow,
    ) -> Result<Vec<DeploymentEvent>, StoreError> {
        let mut request = SearchRequest::new(DEPLOYMENT_SEARCH_LIMIT)
            .window(window.start(), window.end())
            .phrases(DEPLOYMENT_KEYWORDS)
            .sort_desc("timestamp");
        if let Some(service) = service {
            request = request.term("service", service);
        }

        let response = self.store.search(&self.index, &request).await?;
        let events = response
            .hits
            .iter()
            .filter_map(parse_deployment_hit)
            .collect::<Vec<_>>();
        tracing::debug!(count = events.len(), "detected deployment events");
        Ok(events)
    }

    /// Assess each deployment event independently
    ///
    /// A failed window query drops that event from the assessments and is
    /// recorded on the report's `error` field; the remaining events are
    /// still assessed.
    pub async fn analyze(&self, events: &[DeploymentEvent], width: Duration) -> ImpactReport {
        let mut report = ImpactReport::default();
        let mut services: IndexSet<&str> = IndexSet::new();

        for event in events {
            services.insert(event.service.as_str());

            let before_window = TimeWindow::before(event.timestamp, width);
            let after_window = TimeWindow::after(event.timestamp, width);
            let windows = tokio::try_join!(
                self.window_errors(&event.service, before_window),
                self.window_errors(&event.service, after_window)
            );
            let (before, after) = match windows {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(
                        service = %event.service,
                        %err,
                        "impact window query failed; skipping event"
                    );
                    report.error.get_or_insert_with(|| err.to_string());
                    continue;
                }
            };

            let error_change = after.error_count as i64 - before.error_count as i64;
            let error_change_percent =
                error_change as f64 / (before.error_count.max(1) as f64) * 100.0;
            let impact = classify_impact(error_change, error_change_percent);

            match impact {
                Impact::Negative => report.summary.negative_impact += 1,
                Impact::Positive => report.summary.positive_impact += 1,
                Impact::None => report.summary.no_impact += 1,
            }
            report.assessments.push(ImpactAssessment {
                event: event.clone(),
                before,
                after,
                error_change,
                error_change_percent,
                impact,
            });
        }

        report.summary.total_deployments = events.len();
        report.summary.services_with_deployments = services.len();
        report
    }

    async fn window_errors(
        &self,
        service: &str,
        window: TimeWindow,
    ) -> Result<ImpactWindow, StoreError> {
        let request = SearchRequest::counts()
            .window(window.start(), window.end())
            .levels(["ERROR"])
            .term("service", service)
            .agg("status_codes", Aggregation::terms("status_code", 10));

        let response = self.store.search(&self.index, &request).await?;
        let status_codes = response
            .agg("status_codes")
            .map(|agg| agg.bucket_counts().into_iter().collect())
            .unwrap_or_default();

        Ok(ImpactWindow {
            window,
            error_count: response.total,
            status_codes,
        })
    }
}

fn parse_deployment_hit(hit: &Value) -> Option<DeploymentEvent> {
    let service = hit.get("service")?.as_str()?.to_string();
    let timestamp = hit
        .get("timestamp")?
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())?
        .with_timezone(&Utc);
    let message = hit.get("message")?.as_str()?.to_string();
    Some(DeploymentEvent {
        service,
        timestamp,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classification_thresholds_are_strict() {
        // 10 -> 13 errors: +30%
        assert_eq!(classify_impact(3, 30.0), Impact::Negative);
        // 10 -> 7 errors: -30%
        assert_eq!(classify_impact(-3, -30.0), Impact::Positive);
        // 10 -> 11 errors: +10%
        assert_eq!(classify_impact(1, 10.0), Impact::None);
        // Exactly +20% does not cross the strict threshold.
        assert_eq!(classify_impact(2, 20.0), Impact::None);
        assert_eq!(classify_impact(-2, -20.0), Impact::None);
    }

    #[test]
    fn zero_before_count_uses_floor_of_one() {
        let error_change = 5i64;
        let percent = error_change as f64 / (0u64.max(1) as f64) * 100.0;
        assert_eq!(percent, 500.0);
        assert_eq!(classify_impact(error_change, percent), Impact::Negative);
    }

    #[test]
    fn deployment_hit_parsing() {
        let hit = json!({
            "service": "api-gateway",
            "timestamp": "2024-04-01T10:00:00Z",
            "message": "deployment of v2.1.0 complete",
            "level": "INFO"
        });
        let event = parse_deployment_hit(&hit).unwrap();
        assert_eq!(event.service, "api-gateway");
        assert_eq!(event.message, "deployment of v2.1.0 complete");
    }

    #[test]
    fn malformed_hit_is_skipped() {
        assert!(parse_deployment_hit(&json!({"service": "x"})).is_none());
        assert!(parse_deployment_hit(&json!({
            "service": "x",
            "timestamp": "not-a-time",
            "message": "deployed"
        }))
        .is_none());
    }

    #[test]
    fn impact_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Impact::Negative).unwrap(), "\"negative\"");
        assert_eq!(serde_json::to_string(&Impact::None).unwrap(), "\"none\"");
    }
}
