//! Causeway Core - the trigger-driven orchestrator
//!
//! Two one-shot entry points, both stateless between invocations:
//! - [`Monitor::run`] - a periodic trigger fires one correlation +
//!   impact-analysis pass and persists a finding when warranted
//! - [`ApprovalHandler::handle`] - an approval callback drives the
//!   finding state machine once
//!
//! # Example
//!
//! ```rust,ignore
//! use causeway_core::{ApprovalHandler, Monitor, MonitorConfig};
//! use causeway_findings::{ApprovalStateMachine, LoggedRemediator};
//! use std::sync::Arc;
//!
//! # async fn example(store: Arc<dyn causeway_store::DocumentStore>) {
//! let config = MonitorConfig::from_env().expect("config");
//! let monitor = Monitor::new(store, config);
//! let outcome = monitor.run(chrono::Utc::now()).await.expect("run");
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod approval;
pub mod config;
pub mod monitor;
pub mod telemetry;

pub use approval::{ApprovalHandler, ApprovalRequest, ApprovalResponse, ApprovalStatus};
pub use config::{ConfigError, MonitorConfig, CONFIG_ENV_VAR, DEFAULT_INDEX_PREFIX};
pub use monitor::{
    IncidentReport, Monitor, MonitorError, MonitorOutcome, ServiceAssessment,
    CRITICAL_BURST_RATIO,
};
pub use telemetry::init_tracing;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Causeway Core
    pub use crate::{
        ApprovalHandler, ApprovalRequest, ApprovalResponse, Monitor, MonitorConfig,
        MonitorOutcome,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
