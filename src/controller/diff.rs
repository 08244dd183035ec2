//! # Diff
//!
//! Computes the update actions that move a remote extension to its desired
//! spec.
//!
//! Fields are compared as whole values: any change inside a destination
//! replaces the whole destination, any change to any trigger replaces the
//! whole trigger list. Actions are always emitted in the same order:
//! `setKey`, `changeDestination`, `changeTriggers`, `setTimeoutInMs`.

use crate::resource::{ExtensionSpec, ExtensionUpdateAction, RemoteExtension};

/// Update actions turning `observed` into `desired`
///
/// Empty when the remote already matches.
#[must_use]
pub fn diff(desired: &ExtensionSpec, observed: &RemoteExtension) -> Vec<ExtensionUpdateAction> {
    let mut actions = Vec::new();

    if desired.key != observed.key {
        actions.push(ExtensionUpdateAction::SetKey {
            key: desired.key.clone(),
        });
    }
    if desired.destination != observed.destination {
        actions.push(ExtensionUpdateAction::ChangeDestination {
            destination: desired.destination.clone(),
        });
    }
    if desired.triggers != observed.triggers {
        actions.push(ExtensionUpdateAction::ChangeTriggers {
            triggers: desired.triggers.clone(),
        });
    }
    if desired.timeout_in_ms != observed.timeout_in_ms {
        actions.push(ExtensionUpdateAction::SetTimeoutInMs {
            timeout_in_ms: desired.timeout_in_ms,
        });
    }

    actions
}

/// Whether the remote already matches the desired spec
#[must_use]
pub fn is_converged(desired: &ExtensionSpec, observed: &RemoteExtension) -> bool {
    diff(desired, observed).is_empty()
}
