//! # API Credentials
//!
//! Client credentials for the platform's OAuth2 endpoint, read from the
//! conventional `CTP_*` variables.
//!
//! | Variable            | Required | Default                                   |
//! |---------------------|----------|-------------------------------------------|
//! | `CTP_PROJECT_KEY`   | yes      |                                           |
//! | `CTP_CLIENT_ID`     | yes      |                                           |
//! | `CTP_CLIENT_SECRET` | yes      |                                           |
//! | `CTP_SCOPES`        | no       | `manage_extensions:{project_key}`         |
//! | `CTP_API_URL`       | no       | [`DEFAULT_API_URL`]                       |
//! | `CTP_AUTH_URL`      | no       | [`DEFAULT_AUTH_URL`]                      |

use super::{env_lookup, var_or_default_str};
use crate::constants::{DEFAULT_API_URL, DEFAULT_AUTH_URL};
use crate::resource::mask_secret_value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("environment variable {0} is required")]
    MissingVariable(&'static str),
}

/// Credentials for one project
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub project_key: String,
    pub client_id: String,
    pub client_secret: String,
    /// Space-separated OAuth2 scopes
    pub scopes: String,
    pub api_url: String,
    pub auth_url: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("project_key", &self.project_key)
            .field("client_id", &self.client_id)
            .field("client_secret", &mask_secret_value(&self.client_secret))
            .field("scopes", &self.scopes)
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

impl ApiCredentials {
    /// Load credentials from the process environment
    ///
    /// # Errors
    /// Returns an error naming the first required variable that is unset or empty
    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_lookup(env_lookup)
    }

    /// Load credentials through an arbitrary variable lookup
    ///
    /// # Errors
    /// Returns an error naming the first required variable that is unset or empty
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(CredentialsError::MissingVariable(key))
        };

        let project_key = required("CTP_PROJECT_KEY")?;
        let client_id = required("CTP_CLIENT_ID")?;
        let client_secret = required("CTP_CLIENT_SECRET")?;
        let default_scope = format!("manage_extensions:{project_key}");

        Ok(Self {
            scopes: var_or_default_str(&lookup, "CTP_SCOPES", &default_scope),
            api_url: trim_url(var_or_default_str(&lookup, "CTP_API_URL", DEFAULT_API_URL)),
            auth_url: trim_url(var_or_default_str(&lookup, "CTP_AUTH_URL", DEFAULT_AUTH_URL)),
            project_key,
            client_id,
            client_secret,
        })
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
