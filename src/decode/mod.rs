//! # Configuration Decoding
//!
//! Turns raw configuration trees (`serde_json::Value`, whether parsed from
//! YAML or JSON) into a typed [`ExtensionSpec`].
//!
//! Decoders never retry and never guess: a missing, mistyped, ambiguous or
//! unknown value is a [`DecodeError`] naming the offending field.
//!
//! ## Raw Shape
//!
//! ```yaml
//! key: create-order
//! timeout_in_ms: 1000
//! destination:
//!   - type: HTTP
//!     url: https://example.com
//!     authorization_header: Basic 12345
//! trigger:
//!   - resource_type_id: customer
//!     actions: [Create, Update]
//! ```

pub mod authentication;
pub mod destination;
pub mod trigger;

pub use authentication::decode_authentication;
pub use destination::decode_destination;
pub use trigger::decode_triggers;

use crate::constants::{MAX_KEY_LENGTH, MAX_TIMEOUT_IN_MS, MIN_KEY_LENGTH, MIN_TIMEOUT_IN_MS};
use crate::resource::ExtensionSpec;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("key pattern is a valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}` must be {expected}")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    #[error("unsupported destination type `{0}`")]
    UnknownDestinationType(String),

    #[error(
        "authentication is ambiguous: {} are all set but only one may be",
        .fields.join(", ")
    )]
    AmbiguousAuthentication { fields: Vec<&'static str> },

    #[error("trigger {index}: unknown resource_type_id `{value}`")]
    UnknownResourceType { index: usize, value: String },

    #[error("trigger {index}: unknown action `{value}`")]
    UnknownAction { index: usize, value: String },

    #[error("timeout_in_ms {value} is outside the allowed range {min}..={max}")]
    TimeoutOutOfRange { value: i64, min: i64, max: i64 },

    #[error("invalid key `{0}`: expected 2-256 characters of [A-Za-z0-9_-]")]
    InvalidKey(String),
}

/// Decode one extension block into its desired spec
pub fn decode_extension(raw: &Value) -> Result<ExtensionSpec, DecodeError> {
    let block = raw.as_object().ok_or_else(|| DecodeError::InvalidType {
        field: "extension".to_string(),
        expected: "a block",
    })?;
    let fields = Fields::new(block, "");

    let key = fields.optional_string("key")?;
    if let Some(key) = &key {
        validate_key(key)?;
    }

    let timeout_in_ms = fields
        .optional_integer("timeout_in_ms")?
        .map(validate_timeout)
        .transpose()?;

    let destination = match block.get("destination") {
        Some(value) if !value.is_null() => decode_destination(value)?,
        _ => {
            return Err(DecodeError::MissingField {
                field: "destination".to_string(),
            })
        }
    };

    let triggers = match block.get("trigger") {
        Some(value) if !value.is_null() => decode_triggers(value)?,
        _ => {
            return Err(DecodeError::MissingField {
                field: "trigger".to_string(),
            })
        }
    };

    Ok(ExtensionSpec {
        key,
        destination,
        triggers,
        timeout_in_ms,
    })
}

fn validate_key(key: &str) -> Result<(), DecodeError> {
    let length = key.chars().count();
    if (MIN_KEY_LENGTH..=MAX_KEY_LENGTH).contains(&length) && KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(DecodeError::InvalidKey(key.to_string()))
    }
}

fn validate_timeout(value: i64) -> Result<u32, DecodeError> {
    let out_of_range = || DecodeError::TimeoutOutOfRange {
        value,
        min: MIN_TIMEOUT_IN_MS,
        max: MAX_TIMEOUT_IN_MS,
    };
    if !(MIN_TIMEOUT_IN_MS..=MAX_TIMEOUT_IN_MS).contains(&value) {
        return Err(out_of_range());
    }
    u32::try_from(value).map_err(|_| out_of_range())
}

/// Typed access to the scalar fields of one raw block
///
/// `path` prefixes field names in errors, e.g. `destination.0.url`.
/// Null and empty-string values count as unset.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fields<'a> {
    block: &'a Map<String, Value>,
    path: &'a str,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(block: &'a Map<String, Value>, path: &'a str) -> Self {
        Self { block, path }
    }

    pub(crate) fn qualified(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        }
    }

    pub(crate) fn optional_string(&self, name: &str) -> Result<Option<String>, DecodeError> {
        match self.block.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(DecodeError::InvalidType {
                field: self.qualified(name),
                expected: "a string",
            }),
        }
    }

    pub(crate) fn required_string(&self, name: &str) -> Result<String, DecodeError> {
        self.optional_string(name)?
            .ok_or_else(|| DecodeError::MissingField {
                field: self.qualified(name),
            })
    }

    pub(crate) fn optional_integer(&self, name: &str) -> Result<Option<i64>, DecodeError> {
        match self.block.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| {
                DecodeError::InvalidType {
                    field: self.qualified(name),
                    expected: "an integer",
                }
            }),
            Some(_) => Err(DecodeError::InvalidType {
                field: self.qualified(name),
                expected: "an integer",
            }),
        }
    }

    /// A list of strings; unset decodes to an empty list
    pub(crate) fn string_list(&self, name: &str) -> Result<Vec<String>, DecodeError> {
        match self.block.get(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(DecodeError::InvalidType {
                        field: format!("{}.{i}", self.qualified(name)),
                        expected: "a string",
                    }),
                })
                .collect(),
            Some(_) => Err(DecodeError::InvalidType {
                field: self.qualified(name),
                expected: "a list of strings",
            }),
        }
    }
}
