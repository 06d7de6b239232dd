//! Causeway Analysis - the analytical engines
//!
//! Everything that turns raw log aggregations into a structured incident
//! picture:
//! - Error correlation across services with root-cause/cascade
//!   classification over the dependency graph
//! - Deployment before/after impact analysis
//! - Historical-baseline estimation with TTL caching
//!
//! Analytical paths degrade: a failed store query yields an empty or
//! zero-valued result carrying an `error` field, so one failed
//! sub-analysis never blocks the others.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod baseline;
pub mod cache;
pub mod correlate;
pub mod deployment;
pub mod graph;
pub mod window;

pub use baseline::{BaselineEstimator, ErrorBaseline, BASELINE_EPSILON, DEFAULT_BASELINE_DAYS};
pub use cache::QueryCache;
pub use correlate::{
    CascadingFailure, CorrelationResult, CorrelationSummary, ErrorCorrelationEngine, ErrorWindow,
    FailingDependency, RootCause, TimelinePoint, DEFAULT_ERROR_THRESHOLD,
};
pub use deployment::{
    DeploymentEvent, DeploymentImpactAnalyzer, Impact, ImpactAssessment, ImpactReport,
    ImpactSummary, ImpactWindow, DEFAULT_IMPACT_WINDOW_MINUTES, DEPLOYMENT_KEYWORDS,
    IMPACT_THRESHOLD_PERCENT,
};
pub use graph::{DependencyGraph, ServiceConfig};
pub use window::TimeWindow;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
