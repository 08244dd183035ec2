//! # Manifest
//!
//! Declarative list of extensions, keyed by a local name:
//!
//! ```yaml
//! extensions:
//!   order-validation:
//!     key: create-order
//!     timeout_in_ms: 1000
//!     destination:
//!       - type: AWSLambda
//!         arn: arn:aws:lambda:eu-west-1:111111111:function:api_extensions
//!         access_key: ABCSDF123123123
//!         access_secret: "****abc/"
//!     trigger:
//!       - resource_type_id: cart
//!         actions: [Create, Update]
//! ```
//!
//! Files ending in `.json` are read as JSON, everything else as YAML. Blocks
//! are kept as raw trees and decoded separately.

use crate::decode::{decode_extension, DecodeError};
use crate::resource::ExtensionSpec;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(String),

    #[error("extension `{name}`: {source}")]
    Decode { name: String, source: DecodeError },
}

/// Raw extension blocks by name, in name order
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub extensions: BTreeMap<String, Value>,
}

impl Manifest {
    /// Read a manifest file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    /// Parse a YAML manifest
    ///
    /// # Errors
    /// Returns an error if the text is not a manifest
    pub fn from_yaml(text: &str) -> Result<Self, ManifestError> {
        serde_yaml::from_str(text).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Parse a JSON manifest
    ///
    /// # Errors
    /// Returns an error if the text is not a manifest
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(text).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Decode every block into its desired spec
    ///
    /// # Errors
    /// Returns the first decode failure with the name of its extension
    pub fn decode(&self) -> Result<BTreeMap<String, ExtensionSpec>, ManifestError> {
        self.extensions
            .iter()
            .map(|(name, raw)| {
                decode_extension(raw)
                    .map(|spec| (name.clone(), spec))
                    .map_err(|source| ManifestError::Decode {
                        name: name.clone(),
                        source,
                    })
            })
            .collect()
    }
}
