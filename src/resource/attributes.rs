//! # Observed Attributes
//!
//! Flattens a remote-confirmed extension into the attribute map exposed to
//! the host after each operation, e.g. `trigger.0.actions.1 = "Update"`.
//! Lists carry a `.#` count entry. Credential attributes are masked.

use super::{mask_secret_value, Authentication, Destination, RemoteExtension};
use std::collections::BTreeMap;

/// Flattened attribute map, ordered by attribute name
pub type Attributes = BTreeMap<String, String>;

/// Build the observable attributes of a remote extension
#[must_use]
pub fn observed_attributes(extension: &RemoteExtension) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("id".to_string(), extension.id.clone());
    attributes.insert("version".to_string(), extension.version.to_string());
    attributes.insert("created_at".to_string(), extension.created_at.to_rfc3339());
    attributes.insert(
        "last_modified_at".to_string(),
        extension.last_modified_at.to_rfc3339(),
    );
    if let Some(key) = &extension.key {
        attributes.insert("key".to_string(), key.clone());
    }
    if let Some(timeout) = extension.timeout_in_ms {
        attributes.insert("timeout_in_ms".to_string(), timeout.to_string());
    }

    attributes.insert("destination.#".to_string(), "1".to_string());
    for (field, value) in destination_fields(&extension.destination) {
        attributes.insert(format!("destination.0.{field}"), value);
    }

    attributes.insert("trigger.#".to_string(), extension.triggers.len().to_string());
    for (n, trigger) in extension.triggers.iter().enumerate() {
        attributes.insert(
            format!("trigger.{n}.resource_type_id"),
            trigger.resource_type_id.to_string(),
        );
        attributes.insert(
            format!("trigger.{n}.actions.#"),
            trigger.actions.len().to_string(),
        );
        for (m, action) in trigger.actions.iter().enumerate() {
            attributes.insert(format!("trigger.{n}.actions.{m}"), action.to_string());
        }
        if let Some(condition) = &trigger.condition {
            attributes.insert(format!("trigger.{n}.condition"), condition.clone());
        }
    }

    attributes
}

/// Destination fields under their configuration names
fn destination_fields(destination: &Destination) -> Vec<(&'static str, String)> {
    let mut fields = vec![("type", destination.type_name().to_string())];
    match destination {
        Destination::Http(http) => {
            fields.push(("url", http.url.clone()));
            match &http.authentication {
                Some(Authentication::AuthorizationHeader { header_value }) => {
                    fields.push(("authorization_header", mask_secret_value(header_value)));
                }
                Some(Authentication::AzureFunctions { key }) => {
                    fields.push(("azure_authentication", mask_secret_value(key)));
                }
                None => {}
            }
        }
        Destination::AwsLambda(lambda) => {
            fields.push(("arn", lambda.arn.clone()));
            fields.push(("access_key", lambda.access_key.clone()));
            fields.push(("access_secret", mask_secret_value(&lambda.access_secret)));
        }
        Destination::GoogleCloudFunction(function) => {
            fields.push(("url", function.url.clone()));
        }
        Destination::Sqs(sqs) => {
            fields.push(("queue_url", sqs.queue_url.clone()));
            fields.push(("access_key", sqs.access_key.clone()));
            fields.push(("access_secret", mask_secret_value(&sqs.access_secret)));
            fields.push(("region", sqs.region.clone()));
        }
        Destination::Sns(sns) => {
            fields.push(("topic_arn", sns.topic_arn.clone()));
            fields.push(("access_key", sns.access_key.clone()));
            fields.push(("access_secret", mask_secret_value(&sns.access_secret)));
        }
        Destination::GoogleCloudPubSub(pubsub) => {
            fields.push(("project_id", pubsub.project_id.clone()));
            fields.push(("topic", pubsub.topic.clone()));
        }
        Destination::AzureServiceBus(bus) => {
            fields.push((
                "connection_string",
                mask_secret_value(&bus.connection_string),
            ));
        }
    }
    fields
}
