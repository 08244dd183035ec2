//! # Extension Controller
//!
//! Reconciles declarative API extension definitions against a commerce
//! platform's extensions API.
//!
//! An extension is a destination (HTTP endpoint, cloud function or message
//! queue) plus the triggers that make the platform call it synchronously
//! when a resource of a given type is created or updated.
//!
//! ## Flow
//!
//! 1. **Decode** raw configuration blocks into an [`resource::ExtensionSpec`]
//!    ([`decode`])
//! 2. **Reconcile** each spec against the platform: create, read, update with
//!    optimistic concurrency, delete ([`controller::Reconciler`])
//! 3. **Classify** platform failures so callers know what to retry
//!    ([`provider::classify`])
//!
//! The `extctl` binary wires these into a manifest/state workflow
//! (`validate`, `plan`, `apply`, `destroy`, `show`).

pub mod config;
pub mod constants;
pub mod controller;
pub mod decode;
pub mod manifest;
pub mod observability;
pub mod provider;
pub mod resource;
pub mod state;
