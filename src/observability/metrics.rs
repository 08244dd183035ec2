//! # Metrics
//!
//! Prometheus metrics for monitoring extension reconciliation.
//!
//! ## Metrics Exposed
//!
//! - `extension_reconciliations_total{operation}` - Reconciler operations started
//! - `extension_reconciliation_errors_total{operation,class}` - Failed operations by error class
//! - `extension_conflict_retries_total` - Version conflicts answered with a re-read and retry
//! - `extension_transient_retries_total` - Operations retried after a transient failure
//! - `extension_remote_operations_total{operation}` - Calls made to the extensions API
//! - `extension_remote_operation_duration_seconds{operation}` - Duration of those calls

use anyhow::{Context, Result};
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::path::Path;
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "extension_reconciliations_total",
            "Total number of reconciler operations",
        ),
        &["operation"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "extension_reconciliation_errors_total",
            "Total number of failed reconciler operations by error class",
        ),
        &["operation", "class"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static CONFLICT_RETRIES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "extension_conflict_retries_total",
        "Total number of version conflicts retried after a re-read",
    )
    .expect("Failed to create CONFLICT_RETRIES_TOTAL metric - this should never happen")
});

static TRANSIENT_RETRIES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "extension_transient_retries_total",
        "Total number of operations retried after a transient failure",
    )
    .expect("Failed to create TRANSIENT_RETRIES_TOTAL metric - this should never happen")
});

static REMOTE_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "extension_remote_operations_total",
            "Total number of calls to the extensions API",
        ),
        &["operation"],
    )
    .expect("Failed to create REMOTE_OPERATIONS_TOTAL metric - this should never happen")
});

static REMOTE_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "extension_remote_operation_duration_seconds",
            "Duration of calls to the extensions API in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .expect("Failed to create REMOTE_OPERATION_DURATION metric - this should never happen")
});

/// Register every metric with the registry
///
/// Safe to call more than once.
pub fn register_metrics() -> Result<()> {
    register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    register(Box::new(CONFLICT_RETRIES_TOTAL.clone()))?;
    register(Box::new(TRANSIENT_RETRIES_TOTAL.clone()))?;
    register(Box::new(REMOTE_OPERATIONS_TOTAL.clone()))?;
    register(Box::new(REMOTE_OPERATION_DURATION.clone()))?;

    Ok(())
}

fn register(collector: Box<dyn prometheus::core::Collector>) -> Result<()> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e).context("Failed to register metric"),
    }
}

pub fn increment_reconciliations(operation: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_reconciliation_errors(operation: &str, class: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[operation, class])
        .inc();
}

pub fn increment_conflict_retries() {
    CONFLICT_RETRIES_TOTAL.inc();
}

pub fn increment_transient_retries() {
    TRANSIENT_RETRIES_TOTAL.inc();
}

#[cfg(test)]
pub(crate) fn reconciliation_count(operation: &str) -> u64 {
    RECONCILIATIONS_TOTAL.with_label_values(&[operation]).get()
}

#[cfg(test)]
pub(crate) fn reconciliation_error_count(operation: &str, class: &str) -> u64 {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[operation, class])
        .get()
}

/// Record one call to the extensions API
pub fn record_remote_operation(operation: &str, duration: f64) {
    REMOTE_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    REMOTE_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

/// Render the registry in the Prometheus text exposition format
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
}

/// Write the registry to a file for a textfile collector
pub fn write_metrics_file(path: &Path) -> Result<()> {
    let text = gather_text()?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}
