//! # Error Handling Tests
//!
//! These tests verify:
//! - Classification of remote failures into not-found, conflict, validation,
//!   transient and fatal
//! - Mapping of classified failures onto reconciler errors
//! - Backoff growth between transient retries

use extension_controller::controller::backoff::FibonacciBackoff;
use extension_controller::controller::{
    execute, ManagedExtension, Operation, Reconciler, ReconcilerError, RetryPolicy,
};
use extension_controller::provider::memory::{ClientCall, InMemoryExtensions};
use extension_controller::provider::{classify, ErrorClass, RemoteError};
use std::sync::Arc;

mod common;

#[test]
fn test_status_codes_classification() {
    let cases = vec![
        (404, ErrorClass::NotFound),
        (
            409,
            ErrorClass::Conflict {
                current_version: None,
            },
        ),
        (400, ErrorClass::Validation("bad input".to_string())),
        (408, ErrorClass::Transient),
        (429, ErrorClass::Transient),
        (500, ErrorClass::Transient),
        (502, ErrorClass::Transient),
        (503, ErrorClass::Transient),
        (504, ErrorClass::Transient),
        (401, ErrorClass::Fatal),
        (403, ErrorClass::Fatal),
    ];

    for (status, expected) in cases {
        let error = RemoteError::status(status, "bad input");
        assert_eq!(
            classify(&error),
            expected,
            "HTTP {status} should be classified as {expected}"
        );
    }
}

#[test]
fn test_concurrent_modification_code_is_conflict_regardless_of_status() {
    let error = RemoteError::Status {
        status: 400,
        message: "Object has a different version than expected.".to_string(),
        code: Some("ConcurrentModification".to_string()),
        current_version: Some(7),
    };

    assert_eq!(
        classify(&error),
        ErrorClass::Conflict {
            current_version: Some(7)
        }
    );
}

#[test]
fn test_transport_and_unclassifiable_failures() {
    assert_eq!(
        classify(&RemoteError::Transport("connection reset".to_string())),
        ErrorClass::Transient
    );
    assert_eq!(classify(&RemoteError::DeadlineExceeded), ErrorClass::Fatal);
    assert_eq!(
        classify(&RemoteError::InvalidResponse("expected value".to_string())),
        ErrorClass::Fatal
    );
}

#[test]
fn test_only_transient_is_retryable() {
    assert!(ErrorClass::Transient.is_retryable());
    for class in [
        ErrorClass::NotFound,
        ErrorClass::Conflict {
            current_version: Some(1),
        },
        ErrorClass::Validation("x".to_string()),
        ErrorClass::Fatal,
    ] {
        assert!(!class.is_retryable(), "{class} must not be retryable");
    }
}

#[tokio::test]
async fn test_fatal_failure_keeps_original_message() {
    let platform = InMemoryExtensions::new();
    platform
        .fail_next(
            ClientCall::Create,
            RemoteError::status(403, "Insufficient scope."),
        )
        .await;
    let reconciler = Reconciler::new(Arc::new(platform.clone()));
    let mut instance = ManagedExtension::absent();

    let error = execute(
        &reconciler,
        &RetryPolicy::default(),
        &mut instance,
        Operation::Create(&common::http_spec("order-hook", "https://a.example.com")),
    )
    .await
    .unwrap_err();

    assert!(matches!(error, ReconcilerError::Fatal(_)));
    assert!(error.to_string().contains("Insufficient scope."));
    assert_eq!(platform.calls().await.create, 1);
}

#[test]
fn test_backoff_fibonacci_sequence() {
    let mut backoff = FibonacciBackoff::new(100, 10_000);
    let delays: Vec<u64> = (0..6).map(|_| backoff.next_backoff_ms()).collect();

    assert_eq!(delays, vec![100, 100, 200, 300, 500, 800]);
}

#[test]
fn test_backoff_capped_at_max() {
    let mut backoff = FibonacciBackoff::new(100, 1_000);
    for _ in 0..20 {
        assert!(backoff.next_backoff_ms() <= 1_000);
    }
}
