//! # Extension Clients
//!
//! The remote platform as the reconciler sees it: lookups by id or key and
//! three version-aware writes, returning typed results or a [`RemoteError`].
//!
//! Implementations:
//! - `rest::ExtensionsREST` - HTTP API client
//! - `memory::InMemoryExtensions` - in-process platform for tests and dry runs

use crate::resource::{ExtensionSpec, ExtensionUpdateAction, RemoteExtension};
use async_trait::async_trait;

pub mod error;
pub mod memory;
pub mod rest;

pub use error::{classify, ErrorClass, RemoteError};

/// Client capability for the platform's extension endpoints
#[async_trait]
pub trait ExtensionClient: Send + Sync {
    /// Fetch an extension by id
    async fn get(&self, id: &str) -> Result<RemoteExtension, RemoteError>;

    /// Fetch an extension by its user-defined key
    async fn get_by_key(&self, key: &str) -> Result<RemoteExtension, RemoteError>;

    /// Create an extension from its draft
    async fn create(&self, spec: &ExtensionSpec) -> Result<RemoteExtension, RemoteError>;

    /// Apply update actions against the given version
    async fn update(
        &self,
        id: &str,
        version: i64,
        actions: &[ExtensionUpdateAction],
    ) -> Result<RemoteExtension, RemoteError>;

    /// Delete an extension at the given version
    async fn delete(&self, id: &str, version: i64) -> Result<(), RemoteError>;
}
