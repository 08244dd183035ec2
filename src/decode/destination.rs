//! # Destination Decoding
//!
//! Decodes the `destination` block into one [`Destination`] variant selected
//! by its `type` discriminator.
//!
//! | `type`                | required fields                                   |
//! |-----------------------|---------------------------------------------------|
//! | `HTTP`                | `url` (+ optional authentication)                 |
//! | `AWSLambda`           | `arn`, `access_key`, `access_secret`              |
//! | `GoogleCloudFunction` | `url`                                             |
//! | `SQS`                 | `queue_url`, `access_key`, `access_secret`, `region` |
//! | `SNS`                 | `topic_arn`, `access_key`, `access_secret`        |
//! | `GoogleCloudPubSub`   | `project_id`, `topic`                             |
//! | `AzureServiceBus`     | `connection_string`                               |

use super::authentication::authentication_from;
use super::{DecodeError, Fields};
use crate::resource::{
    AwsLambdaDestination, AzureServiceBusDestination, Destination, GoogleCloudFunctionDestination,
    GoogleCloudPubSubDestination, HttpDestination, SnsDestination, SqsDestination,
};
use serde_json::{Map, Value};

const PATH: &str = "destination.0";

/// Decode a destination block
///
/// The input is the single-element sequence found under `destination`; only
/// the first element is read. A bare block is accepted as well.
pub fn decode_destination(raw: &Value) -> Result<Destination, DecodeError> {
    let block = single_block(raw)?;
    let fields = Fields::new(block, PATH);

    let destination_type = fields.required_string("type")?;
    let destination = match destination_type.as_str() {
        "HTTP" => Destination::Http(HttpDestination {
            url: fields.required_string("url")?,
            authentication: authentication_from(&fields)?,
        }),
        "AWSLambda" => Destination::AwsLambda(AwsLambdaDestination {
            arn: fields.required_string("arn")?,
            access_key: fields.required_string("access_key")?,
            access_secret: fields.required_string("access_secret")?,
        }),
        "GoogleCloudFunction" => {
            Destination::GoogleCloudFunction(GoogleCloudFunctionDestination {
                url: fields.required_string("url")?,
            })
        }
        "SQS" => Destination::Sqs(SqsDestination {
            queue_url: fields.required_string("queue_url")?,
            access_key: fields.required_string("access_key")?,
            access_secret: fields.required_string("access_secret")?,
            region: fields.required_string("region")?,
        }),
        "SNS" => Destination::Sns(SnsDestination {
            topic_arn: fields.required_string("topic_arn")?,
            access_key: fields.required_string("access_key")?,
            access_secret: fields.required_string("access_secret")?,
        }),
        "GoogleCloudPubSub" => Destination::GoogleCloudPubSub(GoogleCloudPubSubDestination {
            project_id: fields.required_string("project_id")?,
            topic: fields.required_string("topic")?,
        }),
        "AzureServiceBus" => Destination::AzureServiceBus(AzureServiceBusDestination {
            connection_string: fields.required_string("connection_string")?,
        }),
        other => return Err(DecodeError::UnknownDestinationType(other.to_string())),
    };

    Ok(destination)
}

fn single_block(raw: &Value) -> Result<&Map<String, Value>, DecodeError> {
    let first = match raw {
        Value::Array(items) => items.first().ok_or_else(|| DecodeError::MissingField {
            field: PATH.to_string(),
        })?,
        other => other,
    };

    first.as_object().ok_or_else(|| DecodeError::InvalidType {
        field: PATH.to_string(),
        expected: "a block",
    })
}
