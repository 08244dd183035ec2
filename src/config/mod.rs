//! # Configuration
//!
//! Settings loaded from environment variables.
//!
//! - `controller`: retry, backoff, deadline and logging settings
//! - `credentials`: API client credentials

pub mod controller;
pub mod credentials;

pub use controller::ControllerConfig;
pub use credentials::{ApiCredentials, CredentialsError};

/// Read a variable through `lookup` and parse it, or return the default
pub(crate) fn var_or_default<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a variable as boolean, or return the default
pub(crate) fn var_or_default_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read a variable as string, or return the default
pub(crate) fn var_or_default_str<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Lookup against the process environment
pub(crate) fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
