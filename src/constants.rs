//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default commercetools HTTP API endpoint
pub const DEFAULT_API_URL: &str = "https://api.europe-west1.gcp.commercetools.com";

/// Default commercetools OAuth2 endpoint
pub const DEFAULT_AUTH_URL: &str = "https://auth.europe-west1.gcp.commercetools.com";

/// Default deadline applied to every remote call (seconds)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts for an operation failing with a transient error
pub const DEFAULT_TRANSIENT_MAX_ATTEMPTS: u32 = 3;

/// Default Fibonacci backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 250;

/// Default Fibonacci backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 5_000;

/// Lower bound accepted for `timeout_in_ms`
pub const MIN_TIMEOUT_IN_MS: i64 = 1;

/// Upper bound accepted for `timeout_in_ms`
///
/// The platform default limit is 2000ms; projects can have it raised to 10000ms.
pub const MAX_TIMEOUT_IN_MS: i64 = 10_000;

/// Minimum length of a user-assigned extension key
pub const MIN_KEY_LENGTH: usize = 2;

/// Maximum length of a user-assigned extension key
pub const MAX_KEY_LENGTH: usize = 256;

/// Default location of the manifest file read by `extctl`
pub const DEFAULT_MANIFEST_PATH: &str = "extensions.yaml";

/// Default location of the state file written by `extctl`
pub const DEFAULT_STATE_PATH: &str = "extensions.state.json";
