//! The trigger-driven monitoring run
//!
//! One invocation of `Monitor::run` is one periodic-trigger firing:
//! correlate the recent window, and when anything crosses the threshold,
//! enrich with baselines and deployment impact, persist a finding in
//! `pending_review`, and return the report. The periodic cadence itself
//! lives outside the core.
//!
//! Analysis-side query failures degrade to partial results; failing to
//! persist the finding is an error, since silently losing it is not
//! acceptable.

use crate::config::MonitorConfig;
use causeway_analysis::{
    BaselineEstimator, CorrelationResult, DependencyGraph, DeploymentImpactAnalyzer,
    ErrorBaseline, ErrorCorrelationEngine, ImpactReport, QueryCache, TimeWindow,
};
use causeway_findings::{Finding, FindingId, FindingsStore, Severity};
use causeway_store::{DocumentStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Burst ratio at or above which a finding is critical
pub const CRITICAL_BURST_RATIO: f64 = 10.0;

/// Per-service enrichment of a problematic service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceAssessment {
    pub service: String,
    pub error_count: u64,
    /// Errors per minute across the minutes that saw errors
    pub current_per_minute: f64,
    pub baseline: ErrorBaseline,
    /// Current rate over the (epsilon-floored) baseline rate
    pub burst_ratio: f64,
}

/// The structured assessment a run produces
#[derive(Debug, Clone, Serialize)]
pub struct IncidentReport {
    pub correlation: CorrelationResult,
    pub assessments: Vec<ServiceAssessment>,
    pub deployments: ImpactReport,
    pub severity: Severity,
}

/// How one monitoring run resolved
#[derive(Debug)]
pub enum MonitorOutcome {
    /// No service crossed the threshold
    Quiet { window: TimeWindow },
    /// A finding was persisted in `pending_review`
    FindingStored {
        finding_id: FindingId,
        report: IncidentReport,
    },
}

/// Failures of a monitoring run
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The finding could not be durably persisted
    #[error("failed to persist finding: {0}")]
    Persist(#[from] StoreError),
}

/// Orchestrates one analysis pass over the fleet
pub struct Monitor {
    config: MonitorConfig,
    engine: ErrorCorrelationEngine,
    estimator: BaselineEstimator,
    analyzer: DeploymentImpactAnalyzer,
    findings: FindingsStore,
}

impl Monitor {
    /// Wire the engines over one document store per the configuration
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: MonitorConfig) -> Self {
        let graph = DependencyGraph::from_services(&config.services);
        let logs_index = config.logs_index();
        let cache = QueryCache::with_ttl(10_000, config.cache_ttl());

        Self {
            engine: ErrorCorrelationEngine::new(store.clone(), graph, logs_index.clone()),
            estimator: BaselineEstimator::new(store.clone(), cache, logs_index.clone()),
            analyzer: DeploymentImpactAnalyzer::new(store.clone(), logs_index),
            findings: FindingsStore::with_prefix(store, &config.index_prefix),
            config,
        }
    }

    /// The findings store this monitor persists into
    #[inline]
    #[must_use]
    pub fn findings(&self) -> &FindingsStore {
        &self.findings
    }

    /// Execute one monitoring pass ending at `now`
    pub async fn run(&self, now: DateTime<Utc>) -> Result<MonitorOutcome, MonitorError> {
        let window = TimeWindow::last_minutes(now, self.config.window_minutes);
        tracing::info!(%window, threshold = self.config.error_threshold, "starting error check");

        let correlation = self
            .engine
            .correlate(window, self.config.error_threshold, self.config.include_warnings)
            .await;
        if correlation.is_quiet() {
            tracing::info!("no service crossed the threshold");
            return Ok(MonitorOutcome::Quiet { window });
        }

        let assessments = self.assess_services(&correlation, now).await;
        let deployments = self.assess_deployments(&correlation, now).await;
        let severity = derive_severity(&correlation, &assessments, &deployments);

        let report = IncidentReport {
            correlation,
            assessments,
            deployments,
            severity,
        };
        let finding = self.build_finding(&report);

        self.findings.ensure_index().await?;
        let finding_id = self.findings.store(&finding).await?;
        tracing::info!(%finding_id, %severity, "analysis persisted for review");

        Ok(MonitorOutcome::FindingStored { finding_id, report })
    }

    async fn assess_services(
        &self,
        correlation: &CorrelationResult,
        now: DateTime<Utc>,
    ) -> Vec<ServiceAssessment> {
        let mut assessments = Vec::new();
        for service in &correlation.problematic_services {
            let window = &correlation.service_errors[service.as_str()];
            let baseline = self
                .estimator
                .baseline(service, self.config.baseline_days, now)
                .await;
            let current_per_minute = window.per_minute_rate();
            assessments.push(ServiceAssessment {
                service: service.clone(),
                error_count: window.error_count,
                current_per_minute,
                burst_ratio: baseline.burst_ratio(current_per_minute),
                baseline,
            });
        }
        assessments
    }

    async fn assess_deployments(
        &self,
        correlation: &CorrelationResult,
        now: DateTime<Utc>,
    ) -> ImpactReport {
        let lookback = TimeWindow::last_hours(now, self.config.deployment_lookback_hours);
        let events = match self.analyzer.find_deployments(None, lookback).await {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(%err, "deployment detection failed; continuing without it");
                return ImpactReport {
                    error: Some(err.to_string()),
                    ..ImpactReport::default()
                };
            }
        };

        let relevant: Vec<_> = events
            .into_iter()
            .filter(|event| correlation.problematic_services.contains(&event.service))
            .collect();
        self.analyzer
            .analyze(&relevant, Duration::minutes(self.config.deployment_window_minutes))
            .await
    }

    fn build_finding(&self, report: &IncidentReport) -> Finding {
        let correlation = &report.correlation;
        let most_affected = correlation
            .problematic_services
            .iter()
            .max_by_key(|s| correlation.service_errors[s.as_str()].error_count)
            .cloned()
            .unwrap_or_default();
        let error_count = correlation
            .service_errors
            .get(&most_affected)
            .map_or(0, |w| w.error_count);

        let title = if correlation.problematic_services.len() == 1 {
            format!("Error burst in {most_affected}")
        } else {
            format!(
                "Error burst across {} services (worst: {most_affected})",
                correlation.problematic_services.len()
            )
        };
        let description = describe(report, &most_affected);

        Finding::new(
            self.config.agent_id.as_str(),
            "incident",
            report.severity,
            title,
            description,
        )
        .with_resource("service", most_affected.clone())
        .with_resource("error_count", error_count)
        .with_metadata(
            "problematic_services",
            json!(correlation.problematic_services),
        )
        .with_metadata(
            "root_causes",
            json!(correlation
                .potential_root_causes
                .iter()
                .map(|r| r.service.as_str())
                .collect::<Vec<_>>()),
        )
        .with_metadata(
            "negative_deployments",
            json!(report.deployments.summary.negative_impact),
        )
        .with_proposed_actions(propose_actions(report, &most_affected))
        .with_tag("auto-detected")
        .with_tag("error-burst")
    }
}

/// Severity of a run's outcome
///
/// Critical when a deployment shows negative impact or any service runs
/// at [`CRITICAL_BURST_RATIO`] times its baseline; high when a cascade is
/// present; medium otherwise.
fn derive_severity(
    correlation: &CorrelationResult,
    assessments: &[ServiceAssessment],
    deployments: &ImpactReport,
) -> Severity {
    if deployments.summary.negative_impact > 0
        || assessments.iter().any(|a| a.burst_ratio >= CRITICAL_BURST_RATIO)
    {
        Severity::Critical
    } else if !correlation.cascading_failures.is_empty() {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn describe(report: &IncidentReport, most_affected: &str) -> String {
    let correlation = &report.correlation;
    let mut lines = vec![format!(
        "{} of {} services crossed the error threshold in {}.",
        correlation.problematic_services.len(),
        correlation.summary.total_services_analyzed,
        correlation.summary.window,
    )];

    for root in &correlation.potential_root_causes {
        lines.push(format!(
            "Potential root cause: {} ({} errors, dependents: {}).",
            root.service,
            root.error_count,
            if root.dependent_services.is_empty() {
                "none".to_string()
            } else {
                root.dependent_services.join(", ")
            }
        ));
    }
    for cascade in &correlation.cascading_failures {
        let deps: Vec<&str> = cascade
            .failing_dependencies
            .iter()
            .map(|d| d.service.as_str())
            .collect();
        lines.push(format!(
            "Cascading failure: {} ({} errors) behind failing dependencies {}.",
            cascade.service,
            cascade.error_count,
            deps.join(", ")
        ));
    }
    if let Some(assessment) = report.assessments.iter().find(|a| a.service == most_affected) {
        lines.push(format!(
            "{} is running at {:.1}x its baseline rate ({:.2}/min vs {:.2}/min).",
            assessment.service,
            assessment.burst_ratio,
            assessment.current_per_minute,
            assessment.baseline.avg_per_minute,
        ));
    }
    if report.deployments.summary.negative_impact > 0 {
        lines.push(format!(
            "{} recent deployment(s) show negative impact.",
            report.deployments.summary.negative_impact
        ));
    }
    lines.join("\n")
}

fn propose_actions(report: &IncidentReport, most_affected: &str) -> String {
    if let Some(assessment) = report
        .deployments
        .assessments
        .iter()
        .find(|a| a.impact == causeway_analysis::Impact::Negative)
    {
        return format!(
            "Roll back the {} deployment logged at {} (\"{}\").",
            assessment.event.service,
            assessment.event.timestamp.to_rfc3339(),
            assessment.event.message,
        );
    }
    match report.correlation.potential_root_causes.first() {
        Some(root) => format!(
            "Restart {} and review its recent changes; it is the likely root cause.",
            root.service
        ),
        None => format!(
            "Investigate {most_affected}; no root cause stood out from the dependency graph."
        ),
    }
}
