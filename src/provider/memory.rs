//! # In-Memory Platform
//!
//! An [`ExtensionClient`] backed by a process-local map. It enforces the same
//! rules the platform does for the calls the reconciler makes:
//!
//! - ids are assigned on create and never change
//! - every accepted mutation increments `version`
//! - update and delete must name the current version, otherwise they fail
//!   with a `ConcurrentModification` conflict carrying the current version
//! - keys are unique, and triggers must name at least one action
//!
//! Tests drive the remaining paths through fault injection (before or after
//! the call takes effect), credential masking on responses, artificial
//! latency and out-of-band modification. Data does not survive the process.

use super::{ExtensionClient, RemoteError};
use crate::resource::{Destination, ExtensionSpec, ExtensionUpdateAction, RemoteExtension};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// One of the client calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCall {
    Get,
    GetByKey,
    Create,
    Update,
    Delete,
}

impl ClientCall {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCall::Get => "get",
            ClientCall::GetByKey => "get_by_key",
            ClientCall::Create => "create",
            ClientCall::Update => "update",
            ClientCall::Delete => "delete",
        }
    }
}

impl fmt::Display for ClientCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of calls received, per call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub get_by_key: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl CallCounts {
    /// Calls that may change remote state
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.create + self.update + self.delete
    }
}

#[derive(Debug)]
struct Fault {
    call: ClientCall,
    error: RemoteError,
    /// Returned after the call took effect instead of before
    after_commit: bool,
}

#[derive(Debug, Default)]
struct PlatformState {
    extensions: HashMap<String, RemoteExtension>,
    calls: CallCounts,
    faults: VecDeque<Fault>,
    latency: Option<Duration>,
    mask_credentials: bool,
}

impl PlatformState {
    fn take_fault(&mut self, call: ClientCall, after_commit: bool) -> Option<RemoteError> {
        let index = self
            .faults
            .iter()
            .position(|fault| fault.call == call && fault.after_commit == after_commit)?;
        self.faults.remove(index).map(|fault| fault.error)
    }

    /// The extension as a response body shows it
    fn respond(&self, extension: &RemoteExtension) -> RemoteExtension {
        let mut response = extension.clone();
        if self.mask_credentials {
            mask_credentials(&mut response.destination);
        }
        response
    }

    /// Finish a write: an after-commit fault replaces the response
    fn commit(
        &self,
        call: ClientCall,
        fault: Option<RemoteError>,
        extension: &RemoteExtension,
    ) -> Result<RemoteExtension, RemoteError> {
        match fault {
            Some(error) => {
                debug!("Injected fault after {} took effect: {}", call, error);
                Err(error)
            }
            None => Ok(self.respond(extension)),
        }
    }
}

/// In-memory extensions endpoint
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExtensions {
    state: Arc<Mutex<PlatformState>>,
}

impl InMemoryExtensions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an extension directly, bypassing call counting and faults
    pub async fn seed(&self, spec: &ExtensionSpec) -> RemoteExtension {
        let extension = new_extension(spec);
        self.state
            .lock()
            .await
            .extensions
            .insert(extension.id.clone(), extension.clone());
        extension
    }

    /// Fail the next call of the given kind with `error`
    ///
    /// Faults queue up per call kind and are consumed in order.
    pub async fn fail_next(&self, call: ClientCall, error: RemoteError) {
        self.state.lock().await.faults.push_back(Fault {
            call,
            error,
            after_commit: false,
        });
    }

    /// Let the next call of the given kind take effect, then fail with `error`
    ///
    /// Models a response lost after the platform stored the change.
    pub async fn fail_after_commit(&self, call: ClientCall, error: RemoteError) {
        self.state.lock().await.faults.push_back(Fault {
            call,
            error,
            after_commit: true,
        });
    }

    /// Mask credentials in every response, as the platform does
    pub async fn set_credential_masking(&self, enabled: bool) {
        self.state.lock().await.mask_credentials = enabled;
    }

    /// Delay every call by `latency`
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().await.latency = latency;
    }

    /// Change a stored extension out of band, as another writer would
    ///
    /// The version is incremented. Returns the new state, or `None` when the
    /// id is unknown.
    pub async fn modify_externally(
        &self,
        id: &str,
        change: impl FnOnce(&mut RemoteExtension) + Send,
    ) -> Option<RemoteExtension> {
        let mut state = self.state.lock().await;
        let extension = state.extensions.get_mut(id)?;
        change(extension);
        extension.version += 1;
        extension.last_modified_at = Utc::now();
        Some(extension.clone())
    }

    /// Remove a stored extension out of band
    pub async fn remove_externally(&self, id: &str) -> bool {
        self.state.lock().await.extensions.remove(id).is_some()
    }

    /// Current stored state of an extension
    pub async fn stored(&self, id: &str) -> Option<RemoteExtension> {
        self.state.lock().await.extensions.get(id).cloned()
    }

    pub async fn extension_count(&self) -> usize {
        self.state.lock().await.extensions.len()
    }

    pub async fn calls(&self) -> CallCounts {
        self.state.lock().await.calls
    }

    /// Count the call, apply latency and return any queued fault
    async fn begin(&self, call: ClientCall) -> Result<(), RemoteError> {
        let (fault, latency) = {
            let mut state = self.state.lock().await;
            match call {
                ClientCall::Get => state.calls.get += 1,
                ClientCall::GetByKey => state.calls.get_by_key += 1,
                ClientCall::Create => state.calls.create += 1,
                ClientCall::Update => state.calls.update += 1,
                ClientCall::Delete => state.calls.delete += 1,
            }
            (state.take_fault(call, false), state.latency)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match fault {
            Some(error) => {
                debug!("Injected fault for {}: {}", call, error);
                Err(error)
            }
            None => Ok(()),
        }
    }
}

fn new_extension(spec: &ExtensionSpec) -> RemoteExtension {
    let now = Utc::now();
    RemoteExtension {
        id: Uuid::new_v4().to_string(),
        version: 1,
        created_at: now,
        last_modified_at: now,
        key: spec.key.clone(),
        destination: spec.destination.clone(),
        triggers: spec.triggers.clone(),
        timeout_in_ms: spec.timeout_in_ms,
    }
}

/// Credentials as the platform renders them: asterisks and the last four
/// characters
fn mask_credentials(destination: &mut Destination) {
    for (_, value) in destination.credentials_mut() {
        let chars: Vec<char> = value.chars().collect();
        let visible: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        *value = format!("****{visible}");
    }
}

fn not_found(id: &str) -> RemoteError {
    RemoteError::Status {
        status: 404,
        message: format!("The Resource with ID '{id}' was not found."),
        code: Some("ResourceNotFound".to_string()),
        current_version: None,
    }
}

fn invalid_input(message: String, code: &str) -> RemoteError {
    RemoteError::Status {
        status: 400,
        message,
        code: Some(code.to_string()),
        current_version: None,
    }
}

/// Platform-side checks on a candidate extension
fn validate(
    extensions: &HashMap<String, RemoteExtension>,
    candidate: &RemoteExtension,
) -> Result<(), RemoteError> {
    if let Some(index) = candidate.triggers.iter().position(|t| t.actions.is_empty()) {
        return Err(invalid_input(
            format!("Trigger {index} must contain at least one action."),
            "InvalidInput",
        ));
    }

    if let Some(key) = &candidate.key {
        let taken = extensions
            .values()
            .any(|other| other.id != candidate.id && other.key.as_ref() == Some(key));
        if taken {
            return Err(invalid_input(
                format!("An extension with key '{key}' already exists."),
                "DuplicateField",
            ));
        }
    }

    Ok(())
}

#[async_trait]
impl ExtensionClient for InMemoryExtensions {
    async fn get(&self, id: &str) -> Result<RemoteExtension, RemoteError> {
        self.begin(ClientCall::Get).await?;
        let state = self.state.lock().await;
        state
            .extensions
            .get(id)
            .map(|extension| state.respond(extension))
            .ok_or_else(|| not_found(id))
    }

    async fn get_by_key(&self, key: &str) -> Result<RemoteExtension, RemoteError> {
        self.begin(ClientCall::GetByKey).await?;
        let state = self.state.lock().await;
        state
            .extensions
            .values()
            .find(|extension| extension.key.as_deref() == Some(key))
            .map(|extension| state.respond(extension))
            .ok_or_else(|| RemoteError::Status {
                status: 404,
                message: format!("The Resource with key '{key}' was not found."),
                code: Some("ResourceNotFound".to_string()),
                current_version: None,
            })
    }

    async fn create(&self, spec: &ExtensionSpec) -> Result<RemoteExtension, RemoteError> {
        self.begin(ClientCall::Create).await?;

        let extension = new_extension(spec);
        let mut state = self.state.lock().await;
        validate(&state.extensions, &extension)?;
        state
            .extensions
            .insert(extension.id.clone(), extension.clone());
        let fault = state.take_fault(ClientCall::Create, true);
        state.commit(ClientCall::Create, fault, &extension)
    }

    async fn update(
        &self,
        id: &str,
        version: i64,
        actions: &[ExtensionUpdateAction],
    ) -> Result<RemoteExtension, RemoteError> {
        self.begin(ClientCall::Update).await?;

        let mut state = self.state.lock().await;
        let current = state.extensions.get(id).ok_or_else(|| not_found(id))?;
        if current.version != version {
            return Err(RemoteError::conflict(Some(current.version)));
        }

        let mut updated = current.clone();
        for action in actions {
            action.apply_to(&mut updated);
        }
        validate(&state.extensions, &updated)?;

        if !actions.is_empty() {
            updated.version += 1;
            updated.last_modified_at = Utc::now();
        }
        state.extensions.insert(id.to_string(), updated.clone());
        let fault = state.take_fault(ClientCall::Update, true);
        state.commit(ClientCall::Update, fault, &updated)
    }

    async fn delete(&self, id: &str, version: i64) -> Result<(), RemoteError> {
        self.begin(ClientCall::Delete).await?;

        let mut state = self.state.lock().await;
        let current = state.extensions.get(id).ok_or_else(|| not_found(id))?;
        if current.version != version {
            return Err(RemoteError::conflict(Some(current.version)));
        }
        state.extensions.remove(id);
        match state.take_fault(ClientCall::Delete, true) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
