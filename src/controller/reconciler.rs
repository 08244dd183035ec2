//! # Reconciler
//!
//! Owns the create/read/update/delete lifecycle of one managed extension at a
//! time.
//!
//! ```text
//!  absent ──create──▶ creating ──ok──▶ present ◀──ok── updating
//!     ▲                  │               │  ▲              ▲
//!     └────── error ─────┘               │  └──────────────┘ update
//!                                        │
//!                          read: 404 ────┼──▶ gone ◀── ok / 404 ── deleting
//!                                        └──────────── delete ────────▲
//! ```
//!
//! Version conflicts on update and delete are answered with exactly one
//! re-read and retry. Every other failure is returned with its class and
//! original message; transient retry is left to the caller
//! (see [`retry`](super::retry)).
//!
//! Callers serialize operations per instance. Each remote call is bounded by
//! the configured deadline; a call cut short leaves the instance in the state
//! produced by the last completed call.

use super::diff::diff;
use super::types::{
    InstanceState, ManagedExtension, ReadOutcome, ReconcilerError, UpdateOutcome,
};
use crate::decode::decode_extension;
use crate::observability::metrics;
use crate::provider::{ErrorClass, ExtensionClient, RemoteError};
use crate::resource::{ExtensionSpec, RemoteExtension};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Build the desired spec of one extension from its raw configuration
///
/// # Errors
/// Returns [`ReconcilerError::Decode`] for malformed, ambiguous or unknown values
pub fn desired_spec(raw: &Value) -> Result<ExtensionSpec, ReconcilerError> {
    Ok(decode_extension(raw)?)
}

#[derive(Clone)]
pub struct Reconciler {
    client: Arc<dyn ExtensionClient>,
    operation_timeout: Option<Duration>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(client: Arc<dyn ExtensionClient>) -> Self {
        Self {
            client,
            operation_timeout: None,
        }
    }

    /// Bound every remote call by `timeout`
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Create the extension: absent → creating → present
    ///
    /// On failure the instance stays absent; nothing is retried.
    ///
    /// # Errors
    /// Returns the classified remote failure, or `InvalidState` when the
    /// instance already exists
    pub async fn create(
        &self,
        instance: &mut ManagedExtension,
        spec: &ExtensionSpec,
    ) -> Result<(), ReconcilerError> {
        const OPERATION: &str = "create";
        if !matches!(
            instance.state,
            InstanceState::Absent | InstanceState::Creating | InstanceState::Gone
        ) {
            return Err(invalid_state(OPERATION, instance));
        }

        let span = info_span!(
            "reconciler.create",
            extension.key = spec.key.as_deref().unwrap_or_default()
        );
        async move {
            metrics::increment_reconciliations(OPERATION);
            instance.state = InstanceState::Creating;

            match self.call(self.client.create(spec)).await {
                Ok(remote) => {
                    info!(
                        "✅ Created extension {} (version {})",
                        remote.id, remote.version
                    );
                    instance.confirm_applied(remote, &spec.destination);
                    Ok(())
                }
                Err(e) => {
                    instance.state = InstanceState::Absent;
                    instance.remote = None;
                    Err(failed(OPERATION, ReconcilerError::from_remote(e, "<new>")))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Refresh the snapshot: present → present, or → gone on not-found
    ///
    /// # Errors
    /// Returns the classified remote failure, or `InvalidState` when there is
    /// no snapshot to refresh
    pub async fn read(
        &self,
        instance: &mut ManagedExtension,
    ) -> Result<ReadOutcome, ReconcilerError> {
        const OPERATION: &str = "read";
        let Some(id) = instance.id().map(str::to_string) else {
            return Err(invalid_state(OPERATION, instance));
        };

        let span = info_span!("reconciler.read", extension.id = %id);
        async move {
            metrics::increment_reconciliations(OPERATION);
            match self.fetch(&id).await {
                Ok(Some(remote)) => {
                    debug!("Read extension {} at version {}", id, remote.version);
                    instance.confirm(remote);
                    Ok(ReadOutcome::Found)
                }
                Ok(None) => {
                    warn!("Extension {} no longer exists remotely", id);
                    instance.forget();
                    Ok(ReadOutcome::Gone)
                }
                Err(e) => Err(failed(OPERATION, e)),
            }
        }
        .instrument(span)
        .await
    }

    /// Converge the remote to `spec`: present → updating → present
    ///
    /// The diff is taken against the last snapshot, so an identical spec makes
    /// no remote call. A conflict is answered with one re-read; when the
    /// re-read already matches `spec` the update is done, otherwise it is
    /// retried once against the fresh version.
    ///
    /// # Errors
    /// A second conflict is returned as `Conflict`. A not-found moves the
    /// instance to gone and returns `NotFound` so that the caller recreates it.
    pub async fn update(
        &self,
        instance: &mut ManagedExtension,
        spec: &ExtensionSpec,
    ) -> Result<UpdateOutcome, ReconcilerError> {
        const OPERATION: &str = "update";
        let Some(observed) = instance.remote.clone() else {
            return Err(invalid_state(OPERATION, instance));
        };

        let span = info_span!(
            "reconciler.update",
            extension.id = %observed.id,
            extension.version = observed.version
        );
        async move {
            metrics::increment_reconciliations(OPERATION);
            self.update_from(instance, spec, observed)
                .await
                .map_err(|e| failed(OPERATION, e))
        }
        .instrument(span)
        .await
    }

    async fn update_from(
        &self,
        instance: &mut ManagedExtension,
        spec: &ExtensionSpec,
        observed: RemoteExtension,
    ) -> Result<UpdateOutcome, ReconcilerError> {
        let actions = diff(spec, &observed);
        if actions.is_empty() {
            debug!("Extension {} already matches, nothing to update", observed.id);
            return Ok(UpdateOutcome::NoChange);
        }

        instance.state = InstanceState::Updating;
        let id = observed.id.clone();

        let error = match self
            .call(self.client.update(&id, observed.version, &actions))
            .await
        {
            Ok(remote) => {
                info!(
                    "✅ Updated extension {} to version {} ({} actions)",
                    id,
                    remote.version,
                    actions.len()
                );
                instance.confirm_applied(remote, &spec.destination);
                return Ok(UpdateOutcome::Updated);
            }
            Err(e) => e,
        };

        match error.classify() {
            ErrorClass::Conflict { current_version } => {
                warn!(
                    "🔄 Version conflict updating extension {} (sent {}, current {:?}), re-reading",
                    id, observed.version, current_version
                );
                metrics::increment_conflict_retries();
            }
            ErrorClass::NotFound => {
                instance.forget();
                return Err(ReconcilerError::NotFound { id });
            }
            _ => {
                instance.state = InstanceState::Present;
                return Err(ReconcilerError::from_remote(error, &id));
            }
        }

        let mut fresh = match self.fetch(&id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                instance.forget();
                return Err(ReconcilerError::NotFound { id });
            }
            Err(e) => {
                instance.state = InstanceState::Present;
                return Err(e);
            }
        };

        fresh
            .destination
            .restore_masked_credentials(&observed.destination);
        let actions = diff(spec, &fresh);
        if actions.is_empty() {
            info!(
                "Extension {} already matches at version {} after conflict",
                id, fresh.version
            );
            instance.confirm(fresh);
            return Ok(UpdateOutcome::Converged);
        }

        let fresh_version = fresh.version;
        instance.confirm(fresh);
        instance.state = InstanceState::Updating;

        match self
            .call(self.client.update(&id, fresh_version, &actions))
            .await
        {
            Ok(remote) => {
                info!(
                    "✅ Updated extension {} to version {} after conflict",
                    id, remote.version
                );
                instance.confirm_applied(remote, &spec.destination);
                Ok(UpdateOutcome::Updated)
            }
            Err(e) => {
                if e.classify() == ErrorClass::NotFound {
                    instance.forget();
                } else {
                    instance.state = InstanceState::Present;
                }
                Err(ReconcilerError::from_remote(e, &id))
            }
        }
    }

    /// Take over an extension already stored under `spec`'s key
    ///
    /// Used after a create failed in a way that leaves open whether the
    /// platform stored it. Returns `true` and confirms the instance when the
    /// stored extension matches `spec`; `false` when the key is free or
    /// `spec` has no key.
    ///
    /// # Errors
    /// Returns `Validation` when the key belongs to a different extension,
    /// or the classified remote failure of the lookup
    pub async fn adopt(
        &self,
        instance: &mut ManagedExtension,
        spec: &ExtensionSpec,
    ) -> Result<bool, ReconcilerError> {
        const OPERATION: &str = "adopt";
        let Some(key) = spec.key.as_deref() else {
            return Ok(false);
        };
        if !matches!(
            instance.state,
            InstanceState::Absent | InstanceState::Creating | InstanceState::Gone
        ) {
            return Err(invalid_state(OPERATION, instance));
        }

        let span = info_span!("reconciler.adopt", extension.key = key);
        async move {
            metrics::increment_reconciliations(OPERATION);
            let mut stored = match self.call(self.client.get_by_key(key)).await {
                Ok(stored) => stored,
                Err(e) if e.classify() == ErrorClass::NotFound => {
                    debug!("No extension stored under key {}", key);
                    return Ok(false);
                }
                Err(e) => return Err(failed(OPERATION, ReconcilerError::from_remote(e, key))),
            };

            stored.destination.restore_masked_credentials(&spec.destination);
            if !diff(spec, &stored).is_empty() {
                let error = ReconcilerError::Validation {
                    message: format!(
                        "Key '{key}' is already used by extension {} with a different definition.",
                        stored.id
                    ),
                };
                return Err(failed(OPERATION, error));
            }

            info!(
                "✅ Adopted extension {} (version {}) stored under key {}",
                stored.id, stored.version, key
            );
            instance.confirm_applied(stored, &spec.destination);
            Ok(true)
        }
        .instrument(span)
        .await
    }

    /// Remove the extension: present → deleting → gone
    ///
    /// Not-found counts as deleted. A conflict is answered with one re-read
    /// and a retry against the fresh version. An instance without a snapshot
    /// is already gone.
    ///
    /// # Errors
    /// A second conflict is returned as `Conflict`; other failures keep the
    /// instance present
    pub async fn delete(&self, instance: &mut ManagedExtension) -> Result<(), ReconcilerError> {
        const OPERATION: &str = "delete";
        let Some(observed) = instance.remote.clone() else {
            debug!("Delete requested for an extension that does not exist");
            instance.forget();
            return Ok(());
        };

        let span = info_span!(
            "reconciler.delete",
            extension.id = %observed.id,
            extension.version = observed.version
        );
        async move {
            metrics::increment_reconciliations(OPERATION);
            self.delete_from(instance, observed)
                .await
                .map_err(|e| failed(OPERATION, e))
        }
        .instrument(span)
        .await
    }

    async fn delete_from(
        &self,
        instance: &mut ManagedExtension,
        observed: RemoteExtension,
    ) -> Result<(), ReconcilerError> {
        let id = observed.id.clone();
        instance.state = InstanceState::Deleting;

        let error = match self.call(self.client.delete(&id, observed.version)).await {
            Ok(()) => {
                info!("🗑️  Deleted extension {}", id);
                instance.forget();
                return Ok(());
            }
            Err(e) => e,
        };

        match error.classify() {
            ErrorClass::NotFound => {
                info!("Extension {} was already deleted", id);
                instance.forget();
                return Ok(());
            }
            ErrorClass::Conflict { current_version } => {
                warn!(
                    "🔄 Version conflict deleting extension {} (sent {}, current {:?}), re-reading",
                    id, observed.version, current_version
                );
                metrics::increment_conflict_retries();
            }
            _ => {
                instance.state = InstanceState::Present;
                return Err(ReconcilerError::from_remote(error, &id));
            }
        }

        let fresh = match self.fetch(&id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                instance.forget();
                return Ok(());
            }
            Err(e) => {
                instance.state = InstanceState::Present;
                return Err(e);
            }
        };

        let fresh_version = fresh.version;
        instance.confirm(fresh);
        instance.state = InstanceState::Deleting;

        match self.call(self.client.delete(&id, fresh_version)).await {
            Ok(()) => {
                info!("🗑️  Deleted extension {} after conflict", id);
                instance.forget();
                Ok(())
            }
            Err(e) if e.classify() == ErrorClass::NotFound => {
                instance.forget();
                Ok(())
            }
            Err(e) => {
                instance.state = InstanceState::Present;
                Err(ReconcilerError::from_remote(e, &id))
            }
        }
    }

    /// Get by id, with not-found as `None`
    async fn fetch(&self, id: &str) -> Result<Option<RemoteExtension>, ReconcilerError> {
        match self.call(self.client.get(id)).await {
            Ok(remote) => Ok(Some(remote)),
            Err(e) if e.classify() == ErrorClass::NotFound => Ok(None),
            Err(e) => Err(ReconcilerError::from_remote(e, id)),
        }
    }

    /// Run one remote call under the configured deadline
    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        match self.operation_timeout {
            Some(timeout) => tokio::time::timeout(timeout, request)
                .await
                .unwrap_or(Err(RemoteError::DeadlineExceeded)),
            None => request.await,
        }
    }
}

fn invalid_state(operation: &'static str, instance: &ManagedExtension) -> ReconcilerError {
    let error = ReconcilerError::InvalidState {
        operation,
        state: instance.state,
    };
    metrics::increment_reconciliation_errors(operation, error.class());
    error
}

fn failed(operation: &'static str, error: ReconcilerError) -> ReconcilerError {
    warn!("Extension {} failed ({}): {}", operation, error.class(), error);
    metrics::increment_reconciliation_errors(operation, error.class());
    error
}
