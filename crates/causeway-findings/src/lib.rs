//! Causeway Findings - the persisted analysis outcome and its lifecycle
//!
//! A `Finding` is the one entity with externally visible identity: the
//! record of an analysis result plus its human-approval lifecycle. It is
//! created in `pending_review`, mutated only through the approval state
//! machine, and never physically deleted.
//!
//! Every mutation goes through one shared optimistic-concurrency helper
//! (read latest, conditional write, bounded retry on conflict), so the
//! retry budget and conflict semantics are uniform across call sites.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod finding;
pub mod remediation;
pub mod state_machine;
pub mod store;

pub use error::TransitionError;
pub use finding::{Finding, FindingId, FindingStatus, Severity};
pub use remediation::{LoggedRemediator, RemediationError, Remediator};
pub use state_machine::{
    allowed_transitions, validate_transition, ApprovalAction, ApprovalStateMachine,
    TransitionOutcome,
};
pub use store::{findings_index, FindingsStore, UpdateDecision, UpdateOutcome, UPDATE_RETRY_BUDGET};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
