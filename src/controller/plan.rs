//! # Plan and Apply
//!
//! Drives the reconciler over a whole manifest.
//!
//! Planning refreshes every extension recorded in the state file, then
//! compares the decoded manifest against the refreshed snapshots:
//!
//! | manifest | remote     | action   |
//! |----------|------------|----------|
//! | present  | absent/gone| create   |
//! | present  | differs    | update   |
//! | present  | matches    | no-op    |
//! | missing  | any        | delete   |
//!
//! Applying runs each entry through the transient retry wrapper and writes
//! the state file after every entry, so an interrupted apply resumes from
//! what the platform last confirmed.

use super::diff::diff;
use super::reconciler::Reconciler;
use super::retry::{execute, Operation, Outcome, RetryPolicy};
use super::types::{InstanceState, ManagedExtension, ReadOutcome, ReconcilerError};
use crate::manifest::{Manifest, ManifestError};
use crate::resource::{ExtensionSpec, ExtensionUpdateAction};
use crate::state::{StateError, StateStore};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("failed to refresh `{name}`: {source}")]
    Refresh {
        name: String,
        source: ReconcilerError,
    },
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("failed to {operation} `{name}`: {source}")]
    Reconcile {
        name: String,
        operation: &'static str,
        source: ReconcilerError,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

/// What applying one entry will do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    NoOp,
    Create(ExtensionSpec),
    Update {
        spec: ExtensionSpec,
        actions: Vec<ExtensionUpdateAction>,
    },
    Delete,
}

impl PlanAction {
    /// One-character marker used when rendering a plan
    #[must_use]
    pub fn symbol(&self) -> char {
        match self {
            PlanAction::NoOp => ' ',
            PlanAction::Create(_) => '+',
            PlanAction::Update { .. } => '~',
            PlanAction::Delete => '-',
        }
    }

    #[must_use]
    pub fn is_change(&self) -> bool {
        !matches!(self, PlanAction::NoOp)
    }
}

/// One manifest or state entry and what to do with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub name: String,
    /// The instance as refreshed during planning
    pub instance: ManagedExtension,
    pub action: PlanAction,
}

impl fmt::Display for PlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self
            .instance
            .id()
            .map(|id| format!(" ({id})"))
            .unwrap_or_default();
        match &self.action {
            PlanAction::NoOp => write!(f, "  {}{target} unchanged", self.name),
            PlanAction::Create(_) => write!(f, "+ {} will be created", self.name),
            PlanAction::Update { actions, .. } => {
                let names: Vec<&str> = actions.iter().map(ExtensionUpdateAction::name).collect();
                write!(
                    f,
                    "~ {}{target} will be updated: {}",
                    self.name,
                    names.join(", ")
                )
            }
            PlanAction::Delete => write!(f, "- {}{target} will be deleted", self.name),
        }
    }
}

/// Ordered plan entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
}

impl Plan {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|entry| entry.action.is_change())
    }

    /// Counts of (create, update, delete)
    #[must_use]
    pub fn change_counts(&self) -> (usize, usize, usize) {
        self.entries
            .iter()
            .fold((0, 0, 0), |(c, u, d), entry| match entry.action {
                PlanAction::Create(_) => (c + 1, u, d),
                PlanAction::Update { .. } => (c, u + 1, d),
                PlanAction::Delete => (c, u, d + 1),
                PlanAction::NoOp => (c, u, d),
            })
    }
}

/// What an apply did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// Compute the plan that converges the platform to `manifest`
///
/// # Errors
/// Returns an error if the manifest does not decode or a refresh fails with
/// anything other than not-found
pub async fn plan(
    reconciler: &Reconciler,
    policy: &RetryPolicy,
    manifest: &Manifest,
    state: &StateStore,
) -> Result<Plan, PlanError> {
    let desired = manifest.decode()?;
    let mut refreshed = refresh(reconciler, policy, state).await?;

    let mut entries = Vec::with_capacity(desired.len() + refreshed.len());
    for (name, spec) in desired {
        let instance = refreshed
            .remove(&name)
            .unwrap_or_else(ManagedExtension::absent);
        let action = match instance.remote() {
            None => PlanAction::Create(spec),
            Some(remote) => {
                let actions = diff(&spec, remote);
                if actions.is_empty() {
                    PlanAction::NoOp
                } else {
                    PlanAction::Update { spec, actions }
                }
            }
        };
        entries.push(PlanEntry {
            name,
            instance,
            action,
        });
    }

    for (name, instance) in refreshed {
        entries.push(PlanEntry {
            name,
            instance,
            action: PlanAction::Delete,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Plan { entries })
}

/// Plan the deletion of everything recorded in `state`
#[must_use]
pub fn plan_destroy(state: &StateStore) -> Plan {
    let entries = state
        .iter()
        .map(|(name, remote)| PlanEntry {
            name: name.clone(),
            instance: ManagedExtension::present(remote.clone()),
            action: PlanAction::Delete,
        })
        .collect();
    Plan { entries }
}

/// Read every extension in `state` concurrently
async fn refresh(
    reconciler: &Reconciler,
    policy: &RetryPolicy,
    state: &StateStore,
) -> Result<BTreeMap<String, ManagedExtension>, PlanError> {
    let reads = state.iter().map(|(name, remote)| {
        let name = name.clone();
        let mut instance = ManagedExtension::present(remote.clone());
        async move {
            let result = execute(reconciler, policy, &mut instance, Operation::Read).await;
            (name, instance, result)
        }
    });

    let mut refreshed = BTreeMap::new();
    for (name, instance, result) in join_all(reads).await {
        match result {
            Ok(Outcome::Read(ReadOutcome::Gone)) => {
                warn!("{} was deleted outside of this tool", name);
            }
            Ok(_) => {}
            Err(source) => return Err(PlanError::Refresh { name, source }),
        }
        refreshed.insert(name, instance);
    }
    Ok(refreshed)
}

/// Execute `plan` in order, persisting the state after every entry
///
/// Stops at the first failing entry; entries applied before it stay recorded.
///
/// # Errors
/// Returns the failing entry's error, or a state write failure
pub async fn apply(
    reconciler: &Reconciler,
    policy: &RetryPolicy,
    plan: Plan,
    state: &mut StateStore,
) -> Result<ApplySummary, ApplyError> {
    let mut summary = ApplySummary::default();

    for entry in plan.entries {
        let PlanEntry {
            name,
            mut instance,
            action,
        } = entry;

        let result = match &action {
            PlanAction::NoOp => {
                summary.unchanged += 1;
                Ok(())
            }
            PlanAction::Create(spec) => {
                match execute(reconciler, policy, &mut instance, Operation::Create(spec)).await {
                    Ok(_) => {
                        summary.created += 1;
                        Ok(())
                    }
                    Err(source) => Err(("create", source)),
                }
            }
            PlanAction::Update { spec, .. } => {
                update_or_recreate(reconciler, policy, &mut instance, spec)
                    .await
                    .map(|recreated| {
                        if recreated {
                            summary.created += 1;
                        } else {
                            summary.updated += 1;
                        }
                    })
            }
            PlanAction::Delete => {
                match execute(reconciler, policy, &mut instance, Operation::Delete).await {
                    Ok(_) => {
                        summary.deleted += 1;
                        Ok(())
                    }
                    Err(source) => Err(("delete", source)),
                }
            }
        };

        state.set(&name, instance.remote().cloned());
        state.save()?;

        if let Err((operation, source)) = result {
            return Err(ApplyError::Reconcile {
                name,
                operation,
                source,
            });
        }
    }

    info!(
        "✅ Apply complete: {} created, {} updated, {} deleted, {} unchanged",
        summary.created, summary.updated, summary.deleted, summary.unchanged
    );
    Ok(summary)
}

/// Update `instance`, creating it again when the platform no longer knows it
///
/// Returns whether the extension was recreated.
async fn update_or_recreate(
    reconciler: &Reconciler,
    policy: &RetryPolicy,
    instance: &mut ManagedExtension,
    spec: &ExtensionSpec,
) -> Result<bool, (&'static str, ReconcilerError)> {
    match execute(reconciler, policy, instance, Operation::Update(spec)).await {
        Ok(_) => Ok(false),
        Err(ReconcilerError::NotFound { id }) if instance.state() == InstanceState::Gone => {
            warn!("Extension {} disappeared during update, recreating", id);
            execute(reconciler, policy, instance, Operation::Create(spec))
                .await
                .map(|_| true)
                .map_err(|source| ("create", source))
        }
        Err(source) => Err(("update", source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::InMemoryExtensions;
    use serde_json::json;
    use std::sync::Arc;

    fn manifest(url: &str) -> Manifest {
        let mut manifest = Manifest::default();
        manifest.extensions.insert(
            "hook".to_string(),
            json!({
                "destination": [{ "type": "HTTP", "url": url }],
                "trigger": [{ "resource_type_id": "order", "actions": ["Create"] }]
            }),
        );
        manifest
    }

    #[tokio::test]
    async fn test_plan_create_then_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = StateStore::load(dir.path().join("state.json")).unwrap();
        let platform = InMemoryExtensions::new();
        let reconciler = Reconciler::new(Arc::new(platform.clone()));
        let policy = RetryPolicy::no_retry();
        let desired = manifest("https://a.example.com");

        let first = plan(&reconciler, &policy, &desired, &state).await.unwrap();
        assert_eq!(first.change_counts(), (1, 0, 0));
        assert_eq!(first.entries[0].action.symbol(), '+');

        apply(&reconciler, &policy, first, &mut state).await.unwrap();
        assert_eq!(state.len(), 1);

        let second = plan(&reconciler, &policy, &desired, &state).await.unwrap();
        assert!(!second.has_changes());
    }

    #[tokio::test]
    async fn test_removed_entry_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = StateStore::load(dir.path().join("state.json")).unwrap();
        let platform = InMemoryExtensions::new();
        let reconciler = Reconciler::new(Arc::new(platform.clone()));
        let policy = RetryPolicy::no_retry();

        let first = plan(&reconciler, &policy, &manifest("https://a.example.com"), &state)
            .await
            .unwrap();
        apply(&reconciler, &policy, first, &mut state).await.unwrap();

        let second = plan(&reconciler, &policy, &Manifest::default(), &state)
            .await
            .unwrap();
        assert_eq!(second.change_counts(), (0, 0, 1));

        let summary = apply(&reconciler, &policy, second, &mut state).await.unwrap();
        assert_eq!(summary.deleted, 1);
        assert!(state.is_empty());
        assert_eq!(platform.extension_count().await, 0);
    }

    #[test]
    fn test_entry_display() {
        let entry = PlanEntry {
            name: "hook".to_string(),
            instance: ManagedExtension::absent(),
            action: PlanAction::Delete,
        };
        assert_eq!(entry.to_string(), "- hook will be deleted");
    }
}
