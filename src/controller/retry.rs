//! # Transient Retry
//!
//! Bounded retry of one reconciler operation after transient failures, with
//! Fibonacci backoff between attempts.
//!
//! Only [`ReconcilerError::Transient`] is retried here. Conflicts are handled
//! inside the reconciler (one re-read and retry); everything else is final.
//!
//! A transient create failure does not tell whether the platform stored the
//! extension. A create is therefore retried only for extensions with a key,
//! and each retry first looks the key up and adopts a matching extension
//! instead of creating a second one.

use super::backoff::FibonacciBackoff;
use super::reconciler::Reconciler;
use super::types::{ManagedExtension, ReadOutcome, ReconcilerError, UpdateOutcome};
use crate::config::ControllerConfig;
use crate::observability::metrics;
use crate::resource::ExtensionSpec;
use tracing::warn;

/// How often and how patiently to retry transient failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub backoff_start_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            max_attempts: config.transient_max_attempts.max(1),
            backoff_start_ms: config.backoff_start_ms,
            backoff_max_ms: config.backoff_max_ms,
        }
    }

    /// A single attempt, no retry
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_start_ms: 0,
            backoff_max_ms: 0,
        }
    }

    fn backoff(&self) -> FibonacciBackoff {
        FibonacciBackoff::new(self.backoff_start_ms, self.backoff_max_ms)
    }
}

/// A reconciler operation to run under a retry policy
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Create(&'a ExtensionSpec),
    Read,
    Update(&'a ExtensionSpec),
    Delete,
}

impl Operation<'_> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create(_) => "create",
            Operation::Read => "read",
            Operation::Update(_) => "update",
            Operation::Delete => "delete",
        }
    }
}

/// What a successful operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Read(ReadOutcome),
    Updated(UpdateOutcome),
    Deleted,
}

/// Run `operation`, retrying transient failures up to the policy's bound
///
/// # Errors
/// Returns the last error once it is not transient or attempts are exhausted
pub async fn execute(
    reconciler: &Reconciler,
    policy: &RetryPolicy,
    instance: &mut ManagedExtension,
    operation: Operation<'_>,
) -> Result<Outcome, ReconcilerError> {
    let mut backoff = policy.backoff();
    let mut attempt = 1;

    loop {
        let result = match operation {
            Operation::Create(spec) => reconciler
                .create(instance, spec)
                .await
                .map(|()| Outcome::Created),
            Operation::Read => reconciler.read(instance).await.map(Outcome::Read),
            Operation::Update(spec) => reconciler
                .update(instance, spec)
                .await
                .map(Outcome::Updated),
            Operation::Delete => reconciler.delete(instance).await.map(|()| Outcome::Deleted),
        };

        match result {
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                if let Operation::Create(spec) = operation {
                    if spec.key.is_none() {
                        warn!(
                            "Transient failure on create of an extension without key, not retrying: {}",
                            e
                        );
                        return Err(e);
                    }
                }

                let delay = backoff.next_backoff();
                warn!(
                    "🔄 Transient failure on {} (attempt {}/{}), retrying in {}ms: {}",
                    operation.name(),
                    attempt,
                    policy.max_attempts,
                    delay.as_millis(),
                    e
                );
                metrics::increment_transient_retries();
                tokio::time::sleep(delay).await;
                attempt += 1;

                if let Operation::Create(spec) = operation {
                    if reconciler.adopt(instance, spec).await? {
                        return Ok(Outcome::Created);
                    }
                }
            }
            other => return other,
        }
    }
}
