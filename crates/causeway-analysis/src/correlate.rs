//! Cross-service error correlation
//!
//! Aggregates error (optionally + warning) counts per service over a
//! window, applies the problematic threshold, and classifies every
//! problematic service as either a potential root cause or a cascading
//! failure of its dependencies.
//!
//! Classification is a partition: a problematic service lands in exactly
//! one of the two lists. A service with at least one problematic
//! transitive dependency is a cascading failure; one with none is a
//! potential root cause.

use crate::graph::DependencyGraph;
use crate::window::TimeWindow;
use causeway_store::{Aggregation, DocumentStore, SearchRequest};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Default minimum error count for a service to be problematic
pub const DEFAULT_ERROR_THRESHOLD: u64 = 5;

/// Maximum services per correlation query
pub const CORRELATION_SERVICE_LIMIT: usize = 100;

/// Maximum distinct error types tracked per service
pub const ERROR_TYPE_LIMIT: usize = 10;

/// Sample documents captured per service
pub const SAMPLE_LIMIT: usize = 3;

/// Fixed timeline bucket width
pub const TIMELINE_INTERVAL: &str = "1m";

/// One point of a service's error timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub count: u64,
}

/// Error picture of one service inside the analysis window
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorWindow {
    /// Service name
    pub service: String,
    /// Total matching documents
    pub error_count: u64,
    /// Count per error type
    pub error_types: IndexMap<String, u64>,
    /// Minute-bucketed timeline (empty buckets omitted)
    pub timeline: Vec<TimelinePoint>,
    /// Up to [`SAMPLE_LIMIT`] recent sample documents
    pub samples: Vec<Value>,
}

impl ErrorWindow {
    /// Errors per minute across the minutes that actually saw errors
    #[must_use]
    pub fn per_minute_rate(&self) -> f64 {
        self.error_count as f64 / self.timeline.len().max(1) as f64
    }
}

/// A problematic service with no problematic dependencies
#[derive(Debug, Clone, Serialize)]
pub struct RootCause {
    pub service: String,
    pub error_count: u64,
    pub error_types: IndexMap<String, u64>,
    /// Services whose dependency list contains this one
    pub dependent_services: Vec<String>,
}

/// Evidence entry: a problematic dependency of a cascading failure
#[derive(Debug, Clone, Serialize)]
pub struct FailingDependency {
    pub service: String,
    pub error_count: u64,
    pub error_types: IndexMap<String, u64>,
}

/// A problematic service with at least one problematic dependency
#[derive(Debug, Clone, Serialize)]
pub struct CascadingFailure {
    pub service: String,
    pub error_count: u64,
    pub failing_dependencies: Vec<FailingDependency>,
}

/// Overview block of a correlation run
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationSummary {
    pub window: TimeWindow,
    pub total_services_analyzed: usize,
    pub problematic_services_count: usize,
    pub potential_root_causes_count: usize,
    pub cascading_failures_count: usize,
}

/// Full result of one correlation run
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationResult {
    pub summary: CorrelationSummary,
    pub service_errors: IndexMap<String, ErrorWindow>,
    pub problematic_services: Vec<String>,
    pub potential_root_causes: Vec<RootCause>,
    pub cascading_failures: Vec<CascadingFailure>,
    /// Dependency snapshot the classification ran against
    pub dependencies: IndexMap<String, Vec<String>>,
    /// Set when the correlation query failed and the result is degraded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CorrelationResult {
    /// Empty result over `window` (no events in range)
    #[must_use]
    pub fn empty(window: TimeWindow, graph: &DependencyGraph) -> Self {
        Self {
            summary: CorrelationSummary {
                window,
                total_services_analyzed: 0,
                problematic_services_count: 0,
                potential_root_causes_count: 0,
                cascading_failures_count: 0,
            },
            service_errors: IndexMap::new(),
            problematic_services: Vec::new(),
            potential_root_causes: Vec::new(),
            cascading_failures: Vec::new(),
            dependencies: graph.to_map(),
            error: None,
        }
    }

    /// Degraded empty result carrying the failure detail
    #[must_use]
    pub fn degraded(window: TimeWindow, graph: &DependencyGraph, error: String) -> Self {
        let mut result = Self::empty(window, graph);
        result.error = Some(error);
        result
    }

    /// Whether no service crossed the threshold
    #[inline]
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.problematic_services.is_empty()
    }
}

/// Partition the problematic set into root causes and cascading failures
///
/// For each problematic service, its problematic transitive dependencies
/// decide the side: any present means cascading failure (they become the
/// failing-dependency evidence), none means potential root cause (its
/// direct dependents are recorded instead). No ranking is applied between
/// multiple simultaneous root causes.
#[must_use]
pub fn classify(
    problematic: &IndexSet<String>,
    windows: &IndexMap<String, ErrorWindow>,
    graph: &DependencyGraph,
) -> (Vec<RootCause>, Vec<CascadingFailure>) {
    let mut root_causes = Vec::new();
    let mut cascading = Vec::new();

    for service in problematic {
        let window = &windows[service];
        let failing: Vec<String> = graph
            .descendants(service)
            .into_iter()
            .filter(|dep| problematic.contains(dep.as_str()))
            .collect();

        if failing.is_empty() {
            root_causes.push(RootCause {
                service: service.clone(),
                error_count: window.error_count,
                error_types: window.error_types.clone(),
                dependent_services: graph.dependents(service),
            });
        } else {
            cascading.push(CascadingFailure {
                service: service.clone(),
                error_count: window.error_count,
                failing_dependencies: failing
                    .iter()
                    .map(|dep| {
                        let dep_window = &windows[dep.as_str()];
                        FailingDependency {
                            service: dep.clone(),
                            error_count: dep_window.error_count,
                            error_types: dep_window.error_types.clone(),
                        }
                    })
                    .collect(),
            });
        }
    }

    (root_causes, cascading)
}

/// Correlates errors across the fleet and classifies the problem set
pub struct ErrorCorrelationEngine {
    store: Arc<dyn DocumentStore>,
    graph: DependencyGraph,
    index: String,
}

impl ErrorCorrelationEngine {
    /// Create an engine over the given logs index and dependency graph
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        graph: DependencyGraph,
        index: impl Into<String>,
    ) -> Self {
        Self {
            store,
            graph,
            index: index.into(),
        }
    }

    /// The dependency graph this engine classifies against
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Correlate errors over `window`
    ///
    /// Services at or above `threshold` form the problematic set
    /// (inclusive boundary). An empty window yields an empty result; a
    /// failed query yields a degraded empty result with `error` set.
    pub async fn correlate(
        &self,
        window: TimeWindow,
        threshold: u64,
        include_warnings: bool,
    ) -> CorrelationResult {
        let mut levels = vec!["ERROR"];
        if include_warnings {
            levels.push("WARN");
        }

        let request = SearchRequest::counts()
            .window(window.start(), window.end())
            .levels(levels)
            .agg(
                "by_service",
                Aggregation::terms("service", CORRELATION_SERVICE_LIMIT)
                    .sub(
                        "by_error_type",
                        Aggregation::terms("error_type", ERROR_TYPE_LIMIT).missing("Unknown"),
                    )
                    .sub(
                        "error_timeline",
                        Aggregation::date_histogram("timestamp", TIMELINE_INTERVAL),
                    )
                    .sub(
                        "error_samples",
                        Aggregation::top_hits(
                            SAMPLE_LIMIT,
                            ["timestamp", "message", "error_type", "status_code"],
                        ),
                    ),
            );

        let response = match self.store.search(&self.index, &request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(%err, "correlation query failed");
                return CorrelationResult::degraded(window, &self.graph, err.to_string());
            }
        };

        let mut service_errors: IndexMap<String, ErrorWindow> = IndexMap::new();
        if let Some(by_service) = response.agg("by_service") {
            for bucket in by_service.buckets() {
                let error_types = bucket
                    .agg("by_error_type")
                    .map(|agg| agg.bucket_counts().into_iter().collect())
                    .unwrap_or_default();
                let timeline = bucket
                    .agg("error_timeline")
                    .map(|agg| {
                        agg.buckets()
                            .iter()
                            .filter(|b| b.doc_count > 0)
                            .filter_map(|b| {
                                b.timestamp.map(|timestamp| TimelinePoint {
                                    timestamp,
                                    count: b.doc_count,
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let samples = bucket
                    .agg("error_samples")
                    .map(|agg| agg.hits().to_vec())
                    .unwrap_or_default();

                service_errors.insert(
                    bucket.key.clone(),
                    ErrorWindow {
                        service: bucket.key.clone(),
                        error_count: bucket.doc_count,
                        error_types,
                        timeline,
                        samples,
                    },
                );
            }
        }

        let problematic: IndexSet<String> = service_errors
            .values()
            .filter(|w| w.error_count >= threshold)
            .map(|w| w.service.clone())
            .collect();
        let (root_causes, cascading) = classify(&problematic, &service_errors, &self.graph);

        tracing::info!(
            services = service_errors.len(),
            problematic = problematic.len(),
            root_causes = root_causes.len(),
            cascading = cascading.len(),
            "correlation complete"
        );

        CorrelationResult {
            summary: CorrelationSummary {
                window,
                total_services_analyzed: service_errors.len(),
                problematic_services_count: problematic.len(),
                potential_root_causes_count: root_causes.len(),
                cascading_failures_count: cascading.len(),
            },
            service_errors,
            problematic_services: problematic.into_iter().collect(),
            potential_root_causes: root_causes,
            cascading_failures: cascading,
            dependencies: self.graph.to_map(),
            error: None,
        }
    }
}
