//! # Extension Spec
//!
//! Desired state built from configuration, and the server-observed
//! counterpart it is reconciled against.

use super::{Destination, Trigger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Desired state of one API extension
///
/// Built fresh from configuration on every reconciliation pass. Serializes to
/// the platform's `ExtensionDraft`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub destination: Destination,
    pub triggers: Vec<Trigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_in_ms: Option<u32>,
}

/// Extension as confirmed by the platform
///
/// `id` is assigned on creation and never changes; `version` increases with
/// every accepted mutation and must accompany the next one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteExtension {
    pub id: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub destination: Destination,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_in_ms: Option<u32>,
}

impl RemoteExtension {
    /// The desired-state fields mirrored by this remote extension
    #[must_use]
    pub fn to_spec(&self) -> ExtensionSpec {
        ExtensionSpec {
            key: self.key.clone(),
            destination: self.destination.clone(),
            triggers: self.triggers.clone(),
            timeout_in_ms: self.timeout_in_ms,
        }
    }
}

/// Whole-value update action accepted by the platform
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ExtensionUpdateAction {
    SetKey {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
    ChangeDestination { destination: Destination },
    ChangeTriggers { triggers: Vec<Trigger> },
    SetTimeoutInMs {
        #[serde(
            rename = "timeoutInMs",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        timeout_in_ms: Option<u32>,
    },
}

impl ExtensionUpdateAction {
    /// Wire name of the action
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ExtensionUpdateAction::SetKey { .. } => "setKey",
            ExtensionUpdateAction::ChangeDestination { .. } => "changeDestination",
            ExtensionUpdateAction::ChangeTriggers { .. } => "changeTriggers",
            ExtensionUpdateAction::SetTimeoutInMs { .. } => "setTimeoutInMs",
        }
    }

    /// Apply this action to a remote extension in place
    ///
    /// Used by the in-memory platform; the real platform applies actions
    /// server side.
    pub fn apply_to(&self, extension: &mut RemoteExtension) {
        match self {
            ExtensionUpdateAction::SetKey { key } => extension.key.clone_from(key),
            ExtensionUpdateAction::ChangeDestination { destination } => {
                extension.destination = destination.clone();
            }
            ExtensionUpdateAction::ChangeTriggers { triggers } => {
                extension.triggers.clone_from(triggers);
            }
            ExtensionUpdateAction::SetTimeoutInMs { timeout_in_ms } => {
                extension.timeout_in_ms = *timeout_in_ms;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{HttpDestination, ResourceTypeId, TriggerAction};
    use serde_json::json;

    fn spec() -> ExtensionSpec {
        ExtensionSpec {
            key: Some("create-order".to_string()),
            destination: Destination::Http(HttpDestination {
                url: "https://example.com".to_string(),
                authentication: None,
            }),
            triggers: vec![Trigger {
                resource_type_id: ResourceTypeId::Customer,
                actions: vec![TriggerAction::Create],
                condition: None,
            }],
            timeout_in_ms: Some(200),
        }
    }

    #[test]
    fn test_spec_serializes_as_draft() {
        assert_eq!(
            serde_json::to_value(spec()).unwrap(),
            json!({
                "key": "create-order",
                "destination": { "type": "HTTP", "url": "https://example.com" },
                "triggers": [{ "resourceTypeId": "customer", "actions": ["Create"] }],
                "timeoutInMs": 200
            })
        );
    }

    #[test]
    fn test_update_action_wire_format() {
        let action = ExtensionUpdateAction::SetTimeoutInMs {
            timeout_in_ms: Some(500),
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({ "action": "setTimeoutInMs", "timeoutInMs": 500 })
        );

        let unset = ExtensionUpdateAction::SetKey { key: None };
        assert_eq!(
            serde_json::to_value(&unset).unwrap(),
            json!({ "action": "setKey" })
        );
        assert_eq!(unset.name(), "setKey");
    }

    #[test]
    fn test_remote_extension_from_wire() {
        let remote: RemoteExtension = serde_json::from_value(json!({
            "id": "2845b936-e407-4f29-957b-f8deb0fcba97",
            "version": 1,
            "createdAt": "2018-12-03T16:13:03.969Z",
            "lastModifiedAt": "2018-12-04T09:06:59.491Z",
            "key": "create-order",
            "destination": { "type": "HTTP", "url": "https://example.com" },
            "triggers": [{ "resourceTypeId": "customer", "actions": ["Create"] }],
            "timeoutInMs": 200
        }))
        .unwrap();

        assert_eq!(remote.version, 1);
        assert_eq!(remote.to_spec(), spec());
    }

    #[test]
    fn test_apply_to_replaces_whole_values() {
        let mut remote: RemoteExtension = serde_json::from_value(json!({
            "id": "ext-1",
            "version": 3,
            "createdAt": "2018-12-03T16:13:03.969Z",
            "lastModifiedAt": "2018-12-04T09:06:59.491Z",
            "destination": { "type": "HTTP", "url": "https://old.example.com" },
            "triggers": []
        }))
        .unwrap();

        let desired = spec();
        ExtensionUpdateAction::ChangeTriggers {
            triggers: desired.triggers.clone(),
        }
        .apply_to(&mut remote);
        ExtensionUpdateAction::ChangeDestination {
            destination: desired.destination.clone(),
        }
        .apply_to(&mut remote);

        assert_eq!(remote.triggers, desired.triggers);
        assert_eq!(remote.destination, desired.destination);
        assert_eq!(remote.id, "ext-1");
    }
}
