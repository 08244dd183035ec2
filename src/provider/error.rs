//! # Remote Errors
//!
//! Failures reported by an [`ExtensionClient`](super::ExtensionClient) and
//! their classification into the outcomes the reconciler acts on.
//!
//! | Failure                                  | Class        |
//! |------------------------------------------|--------------|
//! | 404                                      | `NotFound`   |
//! | 409, or code `ConcurrentModification`    | `Conflict`   |
//! | 400                                      | `Validation` |
//! | 408, 429, 5xx, transport                 | `Transient`  |
//! | deadline exceeded, anything else         | `Fatal`      |

use std::fmt;
use thiserror::Error;

/// Error code the platform uses for version mismatches
pub const CONCURRENT_MODIFICATION: &str = "ConcurrentModification";

/// Failure of one remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The platform answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// First error code of the response body, if any
        code: Option<String>,
        /// Server-side version reported with a concurrent modification
        current_version: Option<i64>,
    },

    /// The request never got a response
    #[error("transport error: {0}")]
    Transport(String),

    /// The caller's deadline expired before the call completed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The platform answered with a body that could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Status error without a body
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        RemoteError::Status {
            status,
            message: message.into(),
            code: None,
            current_version: None,
        }
    }

    /// Version conflict as the platform reports it
    pub fn conflict(current_version: Option<i64>) -> Self {
        RemoteError::Status {
            status: 409,
            message: "Object has a different version than expected.".to_string(),
            code: Some(CONCURRENT_MODIFICATION.to_string()),
            current_version,
        }
    }

    #[must_use]
    pub fn classify(&self) -> ErrorClass {
        classify(self)
    }
}

/// Outcome class of a remote failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Conflict { current_version: Option<i64> },
    Validation(String),
    Transient,
    Fatal,
}

impl ErrorClass {
    /// Label used in logs and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::NotFound => "not_found",
            ErrorClass::Conflict { .. } => "conflict",
            ErrorClass::Validation(_) => "validation",
            ErrorClass::Transient => "transient",
            ErrorClass::Fatal => "fatal",
        }
    }

    /// Whether a caller may retry with backoff
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Transient)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a remote failure
#[must_use]
pub fn classify(error: &RemoteError) -> ErrorClass {
    match error {
        RemoteError::Status {
            status,
            message,
            code,
            current_version,
        } => {
            if code.as_deref() == Some(CONCURRENT_MODIFICATION) || *status == 409 {
                return ErrorClass::Conflict {
                    current_version: *current_version,
                };
            }
            match *status {
                404 => ErrorClass::NotFound,
                400 => ErrorClass::Validation(message.clone()),
                408 | 429 | 500..=599 => ErrorClass::Transient,
                _ => ErrorClass::Fatal,
            }
        }
        RemoteError::Transport(_) => ErrorClass::Transient,
        RemoteError::DeadlineExceeded | RemoteError::InvalidResponse(_) => ErrorClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        assert_eq!(
            RemoteError::status(404, "not found").classify(),
            ErrorClass::NotFound
        );
    }

    #[test]
    fn test_classify_conflict_carries_version() {
        assert_eq!(
            RemoteError::conflict(Some(7)).classify(),
            ErrorClass::Conflict {
                current_version: Some(7)
            }
        );
        assert_eq!(
            RemoteError::status(409, "conflict").classify(),
            ErrorClass::Conflict {
                current_version: None
            }
        );
    }

    #[test]
    fn test_classify_concurrent_modification_code_wins_over_status() {
        let error = RemoteError::Status {
            status: 400,
            message: "version mismatch".to_string(),
            code: Some(CONCURRENT_MODIFICATION.to_string()),
            current_version: Some(3),
        };
        assert_eq!(
            error.classify(),
            ErrorClass::Conflict {
                current_version: Some(3)
            }
        );
    }

    #[test]
    fn test_classify_validation_keeps_message() {
        let error = RemoteError::status(400, "The value '0' is not valid for field 'timeoutInMs'.");
        assert_eq!(
            error.classify(),
            ErrorClass::Validation(
                "The value '0' is not valid for field 'timeoutInMs'.".to_string()
            )
        );
    }

    #[test]
    fn test_classify_transient() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert_eq!(
                RemoteError::status(status, "busy").classify(),
                ErrorClass::Transient,
                "status {status}"
            );
        }
        assert_eq!(
            RemoteError::Transport("connection reset".to_string()).classify(),
            ErrorClass::Transient
        );
    }

    #[test]
    fn test_classify_fatal() {
        assert_eq!(RemoteError::status(401, "unauthorized").classify(), ErrorClass::Fatal);
        assert_eq!(RemoteError::status(403, "forbidden").classify(), ErrorClass::Fatal);
        assert_eq!(RemoteError::DeadlineExceeded.classify(), ErrorClass::Fatal);
        assert_eq!(
            RemoteError::InvalidResponse("not json".to_string()).classify(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ErrorClass::Transient.is_retryable());
        assert!(!ErrorClass::Fatal.is_retryable());
        assert!(!ErrorClass::NotFound.is_retryable());
        assert!(!ErrorClass::Conflict {
            current_version: None
        }
        .is_retryable());
        assert_eq!(ErrorClass::Validation(String::new()).as_str(), "validation");
    }
}
