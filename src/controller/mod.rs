//! # Controller
//!
//! Lifecycle management for API extensions.
//!
//! - `backoff`: Fibonacci backoff for transient retries
//! - `diff`: Update actions between a desired spec and a remote snapshot
//! - `plan`: Manifest-wide plan and apply
//! - `reconciler`: Create/read/update/delete state machine with conflict retry
//! - `retry`: Bounded transient retry around one reconciler operation
//! - `types`: Instance state, outcomes and the reconciler error

pub mod backoff;
pub mod diff;
pub mod plan;
pub mod reconciler;
pub mod retry;
pub mod types;

pub use plan::{apply, plan, plan_destroy, ApplyError, ApplySummary, Plan, PlanAction, PlanEntry, PlanError};
pub use reconciler::{desired_spec, Reconciler};
pub use retry::{execute, Operation, Outcome, RetryPolicy};
pub use types::{InstanceState, ManagedExtension, ReadOutcome, ReconcilerError, UpdateOutcome};
