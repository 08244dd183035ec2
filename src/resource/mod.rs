//! # Resource Types
//!
//! Strongly-typed model of an API extension.
//!
//! ## Module Structure
//!
//! - `destination.rs` - Destination and authentication variants
//! - `trigger.rs` - Resource types, actions and triggers
//! - `spec.rs` - Desired spec, remote extension and update actions
//! - `attributes.rs` - Flattened observable attributes

mod attributes;
mod destination;
mod spec;
mod trigger;

pub use attributes::{observed_attributes, Attributes};
pub use destination::{
    is_masked_form_of, Authentication, AwsLambdaDestination, AzureServiceBusDestination, Destination,
    GoogleCloudFunctionDestination, GoogleCloudPubSubDestination, HttpDestination,
    SnsDestination, SqsDestination,
};
pub use spec::{ExtensionSpec, ExtensionUpdateAction, RemoteExtension};
pub use trigger::{ResourceTypeId, Trigger, TriggerAction};

/// Mask a credential for logs and attributes
///
/// Values of up to 12 characters are hidden completely; longer ones keep the
/// first and last four characters. Authorization headers are often short
/// (`Basic 12345`), and at 12 a shown value still hides at least five
/// characters, where an 8 character cutoff would reveal all but one of a
/// 9 character header.
#[must_use]
pub fn mask_secret_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 12 {
        "****".to_string()
    } else {
        let first: String = chars[..4].iter().collect();
        let last: String = chars[chars.len() - 4..].iter().collect();
        format!("{first}...{last}")
    }
}
