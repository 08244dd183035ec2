//! # State File
//!
//! Last remote-confirmed snapshot of every managed extension, keyed by its
//! manifest name and stored as JSON.
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so a crash never leaves a truncated state file behind.

use crate::resource::RemoteExtension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse state file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(
        "state file {} has format version {found}, expected {}",
        .path.display(),
        FORMAT_VERSION
    )]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("failed to write state file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateDocument {
    format_version: u32,
    /// Incremented on every write
    serial: u64,
    #[serde(default)]
    extensions: BTreeMap<String, RemoteExtension>,
}

/// State file bound to its path
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    document: StateDocument,
}

impl StateStore {
    /// Load the state at `path`; a missing file is an empty state
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let document = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let document: StateDocument =
                    serde_json::from_str(&text).map_err(|source| StateError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                if document.format_version != FORMAT_VERSION {
                    return Err(StateError::UnsupportedVersion {
                        found: document.format_version,
                        path,
                    });
                }
                document
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", path.display());
                StateDocument {
                    format_version: FORMAT_VERSION,
                    serial: 0,
                    extensions: BTreeMap::new(),
                }
            }
            Err(source) => return Err(StateError::Read { path, source }),
        };

        Ok(Self { path, document })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn serial(&self) -> u64 {
        self.document.serial
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RemoteExtension> {
        self.document.extensions.get(name)
    }

    /// Names and snapshots in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RemoteExtension)> {
        self.document.extensions.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.document.extensions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.document.extensions.len()
    }

    /// Record the snapshot of `name`, or drop it when `None`
    pub fn set(&mut self, name: &str, remote: Option<RemoteExtension>) {
        match remote {
            Some(remote) => {
                self.document.extensions.insert(name.to_string(), remote);
            }
            None => {
                self.document.extensions.remove(name);
            }
        }
    }

    /// Write the state atomically
    ///
    /// # Errors
    /// Returns an error if the temporary file cannot be written or renamed
    pub fn save(&mut self) -> Result<(), StateError> {
        self.document.serial += 1;
        let write_error = |source: std::io::Error| StateError::Write {
            path: self.path.clone(),
            source,
        };

        let text = serde_json::to_string_pretty(&self.document)
            .map_err(|e| write_error(std::io::Error::other(e)))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
        file.write_all(text.as_bytes()).map_err(write_error)?;
        file.write_all(b"\n").map_err(write_error)?;
        file.as_file().sync_all().map_err(write_error)?;
        file.persist(&self.path).map_err(|e| write_error(e.error))?;

        debug!(
            "Saved state {} (serial {})",
            self.path.display(),
            self.document.serial
        );
        Ok(())
    }
}
