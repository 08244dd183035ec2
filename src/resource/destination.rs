//! # Destinations
//!
//! Where the platform delivers an extension call, and how it authenticates.
//!
//! Serialized with the platform's wire names (`type` discriminator, camelCase
//! fields) so the same values are used for drafts, update actions and
//! responses.

use super::mask_secret_value;
use serde::{Deserialize, Serialize};

/// Extension destination
///
/// Exactly one variant is active per extension.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum Destination {
    /// Plain HTTP endpoint
    #[serde(rename = "HTTP")]
    Http(HttpDestination),
    /// AWS Lambda invocation with static IAM credentials
    #[serde(rename = "AWSLambda")]
    AwsLambda(AwsLambdaDestination),
    /// Google Cloud Function invoked over HTTPS
    #[serde(rename = "GoogleCloudFunction")]
    GoogleCloudFunction(GoogleCloudFunctionDestination),
    /// AWS SQS queue
    #[serde(rename = "SQS")]
    Sqs(SqsDestination),
    /// AWS SNS topic
    #[serde(rename = "SNS")]
    Sns(SnsDestination),
    /// Google Cloud Pub/Sub topic
    #[serde(rename = "GoogleCloudPubSub")]
    GoogleCloudPubSub(GoogleCloudPubSubDestination),
    /// Azure Service Bus queue or topic
    #[serde(rename = "AzureServiceBus")]
    AzureServiceBus(AzureServiceBusDestination),
}

impl Destination {
    /// Discriminator value as used both in configuration and on the wire
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Destination::Http(_) => "HTTP",
            Destination::AwsLambda(_) => "AWSLambda",
            Destination::GoogleCloudFunction(_) => "GoogleCloudFunction",
            Destination::Sqs(_) => "SQS",
            Destination::Sns(_) => "SNS",
            Destination::GoogleCloudPubSub(_) => "GoogleCloudPubSub",
            Destination::AzureServiceBus(_) => "AzureServiceBus",
        }
    }

    /// Credential fields by wire name
    #[must_use]
    pub fn credentials(&self) -> Vec<(&'static str, &str)> {
        match self {
            Destination::Http(http) => match &http.authentication {
                Some(Authentication::AuthorizationHeader { header_value }) => {
                    vec![("headerValue", header_value.as_str())]
                }
                Some(Authentication::AzureFunctions { key }) => vec![("key", key.as_str())],
                None => Vec::new(),
            },
            Destination::AwsLambda(lambda) => vec![("accessSecret", lambda.access_secret.as_str())],
            Destination::Sqs(sqs) => vec![("accessSecret", sqs.access_secret.as_str())],
            Destination::Sns(sns) => vec![("accessSecret", sns.access_secret.as_str())],
            Destination::AzureServiceBus(bus) => {
                vec![("connectionString", bus.connection_string.as_str())]
            }
            Destination::GoogleCloudFunction(_) | Destination::GoogleCloudPubSub(_) => Vec::new(),
        }
    }

    pub(crate) fn credentials_mut(&mut self) -> Vec<(&'static str, &mut String)> {
        match self {
            Destination::Http(http) => match &mut http.authentication {
                Some(Authentication::AuthorizationHeader { header_value }) => {
                    vec![("headerValue", header_value)]
                }
                Some(Authentication::AzureFunctions { key }) => vec![("key", key)],
                None => Vec::new(),
            },
            Destination::AwsLambda(lambda) => vec![("accessSecret", &mut lambda.access_secret)],
            Destination::Sqs(sqs) => vec![("accessSecret", &mut sqs.access_secret)],
            Destination::Sns(sns) => vec![("accessSecret", &mut sns.access_secret)],
            Destination::AzureServiceBus(bus) => {
                vec![("connectionString", &mut bus.connection_string)]
            }
            Destination::GoogleCloudFunction(_) | Destination::GoogleCloudPubSub(_) => Vec::new(),
        }
    }

    /// Put back credentials the platform returned masked
    ///
    /// The platform answers reads with credentials such as `****2345`. A field
    /// is restored from `applied` when it is a masked form of the applied
    /// value: leading asterisks followed by a suffix of it. Anything else is
    /// a real remote change and is kept.
    pub fn restore_masked_credentials(&mut self, applied: &Destination) {
        if self.type_name() != applied.type_name() {
            return;
        }
        let known = applied.credentials();
        for (field, value) in self.credentials_mut() {
            let plain = known
                .iter()
                .find(|(name, _)| *name == field)
                .map(|(_, plain)| *plain);
            if let Some(plain) = plain {
                if is_masked_form_of(value, plain) {
                    *value = plain.to_string();
                }
            }
        }
    }
}

/// Whether `masked` is the platform's masked rendering of `plain`
#[must_use]
pub fn is_masked_form_of(masked: &str, plain: &str) -> bool {
    let visible = masked.trim_start_matches('*');
    visible.len() < masked.len() && masked != plain && plain.ends_with(visible)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDestination {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
}

#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsLambdaDestination {
    pub arn: String,
    pub access_key: String,
    pub access_secret: String,
}

impl std::fmt::Debug for AwsLambdaDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsLambdaDestination")
            .field("arn", &self.arn)
            .field("access_key", &self.access_key)
            .field("access_secret", &mask_secret_value(&self.access_secret))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCloudFunctionDestination {
    pub url: String,
}

#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsDestination {
    pub queue_url: String,
    pub access_key: String,
    pub access_secret: String,
    pub region: String,
}

impl std::fmt::Debug for SqsDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsDestination")
            .field("queue_url", &self.queue_url)
            .field("access_key", &self.access_key)
            .field("access_secret", &mask_secret_value(&self.access_secret))
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnsDestination {
    pub topic_arn: String,
    pub access_key: String,
    pub access_secret: String,
}

impl std::fmt::Debug for SnsDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnsDestination")
            .field("topic_arn", &self.topic_arn)
            .field("access_key", &self.access_key)
            .field("access_secret", &mask_secret_value(&self.access_secret))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCloudPubSubDestination {
    pub project_id: String,
    pub topic: String,
}

#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureServiceBusDestination {
    pub connection_string: String,
}

impl std::fmt::Debug for AzureServiceBusDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureServiceBusDestination")
            .field("connection_string", &mask_secret_value(&self.connection_string))
            .finish()
    }
}

/// Authentication used by an HTTP destination
///
/// Variants are mutually exclusive; see `decode::authentication` for how a
/// configuration block selects one.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum Authentication {
    /// Value sent verbatim in the `Authorization` header
    AuthorizationHeader {
        #[serde(rename = "headerValue")]
        header_value: String,
    },
    /// Azure Functions host key
    AzureFunctions { key: String },
}

impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authentication::AuthorizationHeader { header_value } => f
                .debug_struct("AuthorizationHeader")
                .field("header_value", &mask_secret_value(header_value))
                .finish(),
            Authentication::AzureFunctions { key } => f
                .debug_struct("AzureFunctions")
                .field("key", &mask_secret_value(key))
                .finish(),
        }
    }
}
