//! Common test utilities
//!
//! Shared rustls setup for the Pact tests and spec builders for the
//! reconciler tests.

#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]

use extension_controller::resource::{
    Destination, ExtensionSpec, HttpDestination, ResourceTypeId, Trigger, TriggerAction,
};
use std::sync::Once;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Must run before any reqwest client is built.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");
        }
    });
}

/// HTTP extension on order creation
pub fn http_spec(key: &str, url: &str) -> ExtensionSpec {
    ExtensionSpec {
        key: Some(key.to_string()),
        destination: Destination::Http(HttpDestination {
            url: url.to_string(),
            authentication: None,
        }),
        triggers: vec![Trigger {
            resource_type_id: ResourceTypeId::Order,
            actions: vec![TriggerAction::Create],
            condition: None,
        }],
        timeout_in_ms: None,
    }
}
