//! # Triggers
//!
//! Bindings of a commerce resource type and a set of lifecycle actions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource types an extension can be triggered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceTypeId {
    Cart,
    Order,
    Payment,
    Customer,
    QuoteRequest,
    StagedQuote,
    Quote,
    BusinessUnit,
    ShoppingList,
}

impl ResourceTypeId {
    pub const ALL: [ResourceTypeId; 9] = [
        ResourceTypeId::Cart,
        ResourceTypeId::Order,
        ResourceTypeId::Payment,
        ResourceTypeId::Customer,
        ResourceTypeId::QuoteRequest,
        ResourceTypeId::StagedQuote,
        ResourceTypeId::Quote,
        ResourceTypeId::BusinessUnit,
        ResourceTypeId::ShoppingList,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceTypeId::Cart => "cart",
            ResourceTypeId::Order => "order",
            ResourceTypeId::Payment => "payment",
            ResourceTypeId::Customer => "customer",
            ResourceTypeId::QuoteRequest => "quote-request",
            ResourceTypeId::StagedQuote => "staged-quote",
            ResourceTypeId::Quote => "quote",
            ResourceTypeId::BusinessUnit => "business-unit",
            ResourceTypeId::ShoppingList => "shopping-list",
        }
    }
}

impl fmt::Display for ResourceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceTypeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Lifecycle action on the triggering resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum TriggerAction {
    Create,
    Update,
}

impl TriggerAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerAction::Create => "Create",
            TriggerAction::Update => "Update",
        }
    }
}

impl fmt::Display for TriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(TriggerAction::Create),
            "Update" => Ok(TriggerAction::Update),
            other => Err(other.to_string()),
        }
    }
}

/// A single trigger
///
/// `actions` keeps input order and holds no duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub resource_type_id: ResourceTypeId,
    pub actions: Vec<TriggerAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_type_round_trips_through_str() {
        for resource_type in ResourceTypeId::ALL {
            assert_eq!(
                resource_type.as_str().parse::<ResourceTypeId>(),
                Ok(resource_type)
            );
        }
    }

    #[test]
    fn test_resource_type_rejects_unknown() {
        assert_eq!(
            "product".parse::<ResourceTypeId>(),
            Err("product".to_string())
        );
        // Matching is case sensitive
        assert!("Cart".parse::<ResourceTypeId>().is_err());
    }

    #[test]
    fn test_trigger_wire_format() {
        let trigger = Trigger {
            resource_type_id: ResourceTypeId::QuoteRequest,
            actions: vec![TriggerAction::Create, TriggerAction::Update],
            condition: None,
        };

        assert_eq!(
            serde_json::to_value(&trigger).unwrap(),
            json!({
                "resourceTypeId": "quote-request",
                "actions": ["Create", "Update"]
            })
        );
    }
}
