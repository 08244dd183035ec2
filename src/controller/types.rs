//! # Types
//!
//! Core types for the reconciler.

use crate::decode::DecodeError;
use crate::provider::{ErrorClass, RemoteError};
use crate::resource::{observed_attributes, Attributes, Destination, RemoteExtension};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("invalid configuration: {0}")]
    Decode(#[from] DecodeError),

    #[error("extension {id} not found")]
    NotFound { id: String },

    /// A version conflict survived the single re-read and retry
    #[error("extension {id} was modified concurrently (current version {})", .current_version.map_or_else(|| "unknown".to_string(), |v| v.to_string()))]
    Conflict {
        id: String,
        current_version: Option<i64>,
    },

    /// Rejected by the platform; the message is passed through verbatim
    #[error("{message}")]
    Validation { message: String },

    #[error("transient failure: {0}")]
    Transient(RemoteError),

    #[error("remote call failed: {0}")]
    Fatal(RemoteError),

    #[error("cannot {operation} an extension that is {state}")]
    InvalidState {
        operation: &'static str,
        state: InstanceState,
    },
}

impl ReconcilerError {
    /// Map a classified remote failure for the extension `id`
    pub(crate) fn from_remote(error: RemoteError, id: &str) -> Self {
        match error.classify() {
            ErrorClass::NotFound => ReconcilerError::NotFound { id: id.to_string() },
            ErrorClass::Conflict { current_version } => ReconcilerError::Conflict {
                id: id.to_string(),
                current_version,
            },
            ErrorClass::Validation(message) => ReconcilerError::Validation { message },
            ErrorClass::Transient => ReconcilerError::Transient(error),
            ErrorClass::Fatal => ReconcilerError::Fatal(error),
        }
    }

    /// Label used in logs and metrics
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            ReconcilerError::Decode(_) => "decode",
            ReconcilerError::NotFound { .. } => "not_found",
            ReconcilerError::Conflict { .. } => "conflict",
            ReconcilerError::Validation { .. } => "validation",
            ReconcilerError::Transient(_) => "transient",
            ReconcilerError::Fatal(_) => "fatal",
            ReconcilerError::InvalidState { .. } => "invalid_state",
        }
    }

    /// Whether a caller may retry the operation with backoff
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcilerError::Transient(_))
    }
}

/// Lifecycle state of one managed extension
///
/// `Creating`, `Updating` and `Deleting` are only observable when a call
/// was cancelled while in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
    Gone,
}

impl InstanceState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Absent => "absent",
            InstanceState::Creating => "creating",
            InstanceState::Present => "present",
            InstanceState::Updating => "updating",
            InstanceState::Deleting => "deleting",
            InstanceState::Gone => "gone",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed extension: its lifecycle state and the last remote-confirmed
/// snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedExtension {
    pub(crate) state: InstanceState,
    pub(crate) remote: Option<RemoteExtension>,
}

impl ManagedExtension {
    /// Not created yet
    #[must_use]
    pub fn absent() -> Self {
        Self {
            state: InstanceState::Absent,
            remote: None,
        }
    }

    /// Known to exist as `remote`
    #[must_use]
    pub fn present(remote: RemoteExtension) -> Self {
        Self {
            state: InstanceState::Present,
            remote: Some(remote),
        }
    }

    /// Rebuild from a stored snapshot, if any
    #[must_use]
    pub fn from_snapshot(remote: Option<RemoteExtension>) -> Self {
        remote.map_or_else(Self::absent, Self::present)
    }

    #[must_use]
    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Last remote-confirmed snapshot
    #[must_use]
    pub fn remote(&self) -> Option<&RemoteExtension> {
        self.remote.as_ref()
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.remote.as_ref().map(|remote| remote.id.as_str())
    }

    #[must_use]
    pub fn version(&self) -> Option<i64> {
        self.remote.as_ref().map(|remote| remote.version)
    }

    /// Observable attributes of the last remote-confirmed snapshot
    #[must_use]
    pub fn attributes(&self) -> Option<Attributes> {
        self.remote.as_ref().map(observed_attributes)
    }

    /// Record a remote-confirmed state, keeping credentials the platform
    /// masked from the previous snapshot
    pub(crate) fn confirm(&mut self, mut remote: RemoteExtension) {
        if let Some(previous) = &self.remote {
            remote
                .destination
                .restore_masked_credentials(&previous.destination);
        }
        self.state = InstanceState::Present;
        self.remote = Some(remote);
    }

    /// Record the platform's answer to a write of `applied`
    pub(crate) fn confirm_applied(
        &mut self,
        mut remote: RemoteExtension,
        applied: &Destination,
    ) {
        remote.destination.restore_masked_credentials(applied);
        self.state = InstanceState::Present;
        self.remote = Some(remote);
    }

    pub(crate) fn forget(&mut self) {
        self.state = InstanceState::Gone;
        self.remote = None;
    }
}

/// Result of a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The snapshot was refreshed
    Found,
    /// The platform no longer knows the extension
    Gone,
}

/// Result of an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Remote already matched; no call was made
    NoChange,
    /// An update was accepted
    Updated,
    /// A conflicting writer had already applied the desired spec
    Converged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_remote_keeps_validation_message() {
        let error = ReconcilerError::from_remote(
            RemoteError::status(400, "Invalid destination URL."),
            "ext-1",
        );
        assert_eq!(error.to_string(), "Invalid destination URL.");
        assert_eq!(error.class(), "validation");
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_from_remote_classes() {
        assert!(matches!(
            ReconcilerError::from_remote(RemoteError::status(404, "gone"), "ext-1"),
            ReconcilerError::NotFound { ref id } if id == "ext-1"
        ));
        assert!(ReconcilerError::from_remote(RemoteError::status(503, "busy"), "ext-1")
            .is_retryable());
        assert_eq!(
            ReconcilerError::from_remote(RemoteError::DeadlineExceeded, "ext-1").class(),
            "fatal"
        );
    }

    #[test]
    fn test_conflict_message() {
        let error = ReconcilerError::from_remote(RemoteError::conflict(Some(4)), "ext-1");
        assert_eq!(
            error.to_string(),
            "extension ext-1 was modified concurrently (current version 4)"
        );
    }

    #[test]
    fn test_invalid_state_message() {
        let error = ReconcilerError::InvalidState {
            operation: "update",
            state: InstanceState::Absent,
        };
        assert_eq!(error.to_string(), "cannot update an extension that is absent");
    }

    #[test]
    fn test_managed_extension_from_snapshot() {
        let instance = ManagedExtension::from_snapshot(None);
        assert_eq!(instance.state(), InstanceState::Absent);
        assert_eq!(instance.id(), None);
        assert_eq!(instance.attributes(), None);
    }
}
