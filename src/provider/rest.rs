//! Extensions REST Client
//!
//! Native REST implementation of [`ExtensionClient`] for the platform's HTTP
//! API. Uses reqwest for HTTP requests and an OAuth2 client-credentials token.
//!
//! | Call   | Request                                              |
//! |--------|------------------------------------------------------|
//! | get    | `GET {api}/{project}/extensions/{id}`                |
//! | by key | `GET {api}/{project}/extensions/key={key}`           |
//! | create | `POST {api}/{project}/extensions`                    |
//! | update | `POST {api}/{project}/extensions/{id}`               |
//! | delete | `DELETE {api}/{project}/extensions/{id}?version={v}` |
//!
//! Non-success responses are parsed from the platform's error body so that
//! error codes and the current version of a conflicting resource survive
//! into [`RemoteError::Status`].

use super::{ExtensionClient, RemoteError};
use crate::config::ApiCredentials;
use crate::observability::metrics;
use crate::resource::{ExtensionSpec, ExtensionUpdateAction, RemoteExtension};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

/// Extensions REST client
pub struct ExtensionsREST {
    http_client: Client,
    api_url: String,
    project_key: String,
    access_token: String,
}

// ============================================================================
// Request/Response Structures
// ============================================================================

/// Request body for `POST /{project}/extensions/{id}`
#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    version: i64,
    actions: &'a [ExtensionUpdateAction],
}

/// Error response body
///
/// `statusCode` and `message` describe the first error; `errors` lists all of
/// them with a machine-readable `code`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    message: String,
    #[serde(default)]
    errors: Vec<ErrorObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorObject {
    code: String,
    /// Present on `ConcurrentModification` errors
    #[serde(default)]
    current_version: Option<i64>,
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl std::fmt::Debug for ExtensionsREST {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionsREST")
            .field("project_key", &self.project_key)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl ExtensionsREST {
    /// Create a client and obtain an access token
    ///
    /// # Errors
    /// Returns an error if client initialization or token retrieval fails
    pub async fn new(credentials: &ApiCredentials) -> Result<Self> {
        info!(
            "Initializing extensions REST client for project: {}",
            credentials.project_key
        );

        let http_client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        let access_token = Self::get_access_token(&http_client, credentials).await?;

        Ok(Self {
            http_client,
            api_url: credentials.api_url.clone(),
            project_key: credentials.project_key.clone(),
            access_token,
        })
    }

    /// Create a client with an already issued token
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn with_access_token(
        api_url: impl Into<String>,
        project_key: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            project_key: project_key.into(),
            access_token: access_token.into(),
        })
    }

    /// Client-credentials grant against `{auth_url}/oauth/token`
    async fn get_access_token(http_client: &Client, credentials: &ApiCredentials) -> Result<String> {
        let response = http_client
            .post(format!("{}/oauth/token", credentials.auth_url))
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", credentials.scopes.as_str()),
            ])
            .send()
            .await
            .context("Failed to request access token")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Token request rejected with HTTP {}: {}",
                status.as_u16(),
                error_text
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;
        info!("Retrieved access token for project {}", credentials.project_key);
        Ok(token.access_token)
    }

    /// Build HTTP request with authentication headers
    fn make_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}/{}", self.api_url, self.project_key, path);
        debug!("{} {}", method, url);

        let auth_header = if self.access_token.starts_with("Bearer ") {
            self.access_token.clone()
        } else {
            format!("Bearer {}", self.access_token)
        };

        self.http_client
            .request(method, url)
            .header("Authorization", auth_header)
    }

    /// Send a request and decode a successful response body
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, RemoteError> {
        let start = Instant::now();
        let result = match request.send().await {
            Ok(response) => read_response(response).await,
            Err(e) => Err(RemoteError::Transport(e.to_string())),
        };
        metrics::record_remote_operation(operation, start.elapsed().as_secs_f64());
        result
    }
}

async fn read_response<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;

    if status.is_success() {
        serde_json::from_str(&body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    } else {
        Err(handle_error_response(status.as_u16(), &body))
    }
}

/// Turn an error response into a [`RemoteError::Status`]
///
/// Bodies that are not in the platform's error format keep the raw text as
/// the message.
pub(crate) fn handle_error_response(status: u16, body: &str) -> RemoteError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(error_response) => {
            let first = error_response.errors.first();
            RemoteError::Status {
                status,
                message: error_response.message,
                code: first.map(|e| e.code.clone()),
                current_version: error_response
                    .errors
                    .iter()
                    .find_map(|e| e.current_version),
            }
        }
        Err(_) => RemoteError::status(status, body.trim()),
    }
}

#[async_trait]
impl ExtensionClient for ExtensionsREST {
    async fn get(&self, id: &str) -> Result<RemoteExtension, RemoteError> {
        let span = tracing::debug_span!("extension.get", extension.id = id);
        let request = self.make_request(Method::GET, &format!("extensions/{id}"));

        self.execute("get", request).instrument(span).await
    }

    async fn get_by_key(&self, key: &str) -> Result<RemoteExtension, RemoteError> {
        let span = tracing::debug_span!("extension.get_by_key", extension.key = key);
        let request = self.make_request(Method::GET, &format!("extensions/key={key}"));

        self.execute("get_by_key", request).instrument(span).await
    }

    async fn create(&self, spec: &ExtensionSpec) -> Result<RemoteExtension, RemoteError> {
        let span = info_span!(
            "extension.create",
            extension.key = spec.key.as_deref().unwrap_or_default(),
            destination.kind = spec.destination.type_name()
        );
        let request = self.make_request(Method::POST, "extensions").json(spec);

        self.execute("create", request).instrument(span).await
    }

    async fn update(
        &self,
        id: &str,
        version: i64,
        actions: &[ExtensionUpdateAction],
    ) -> Result<RemoteExtension, RemoteError> {
        let span = info_span!(
            "extension.update",
            extension.id = id,
            extension.version = version,
            actions = actions.len()
        );
        let request = self
            .make_request(Method::POST, &format!("extensions/{id}"))
            .json(&UpdateRequest { version, actions });

        self.execute("update", request).instrument(span).await
    }

    async fn delete(&self, id: &str, version: i64) -> Result<(), RemoteError> {
        let span = info_span!("extension.delete", extension.id = id, extension.version = version);
        let request = self.make_request(
            Method::DELETE,
            &format!("extensions/{id}?version={version}"),
        );

        // The platform answers with the deleted extension
        self.execute::<serde_json::Value>("delete", request)
            .instrument(span)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ErrorClass;

    #[test]
    fn test_conflict_body_keeps_current_version() {
        let body = r#"{
            "statusCode": 409,
            "message": "Object 2845b936 has a different version than expected. Expected: 1 - Actual: 2.",
            "errors": [{
                "code": "ConcurrentModification",
                "message": "Object 2845b936 has a different version than expected. Expected: 1 - Actual: 2.",
                "currentVersion": 2
            }]
        }"#;

        let error = handle_error_response(409, body);
        assert_eq!(
            error.classify(),
            ErrorClass::Conflict {
                current_version: Some(2)
            }
        );
    }

    #[test]
    fn test_validation_body_message_verbatim() {
        let body = r#"{
            "statusCode": 400,
            "message": "Request body does not contain valid JSON.",
            "errors": [{ "code": "InvalidJsonInput", "message": "Request body does not contain valid JSON." }]
        }"#;

        match handle_error_response(400, body) {
            RemoteError::Status { message, code, .. } => {
                assert_eq!(message, "Request body does not contain valid JSON.");
                assert_eq!(code.as_deref(), Some("InvalidJsonInput"));
            }
            other => panic!("Expected status error, got {other:?}"),
        }
    }

    #[test]
    fn test_unstructured_body_kept_as_message() {
        let error = handle_error_response(502, "<html>Bad Gateway</html>\n");
        assert_eq!(error, RemoteError::status(502, "<html>Bad Gateway</html>"));
        assert_eq!(error.classify(), ErrorClass::Transient);
    }

    #[test]
    fn test_debug_hides_token() {
        let client =
            ExtensionsREST::with_access_token("http://localhost:1/", "shop", "secret-token")
                .unwrap();
        let debug = format!("{client:?}");

        assert!(!debug.contains("secret-token"));
        assert_eq!(client.api_url, "http://localhost:1");
    }

    #[test]
    fn test_update_request_wire_format() {
        let actions = [ExtensionUpdateAction::SetKey {
            key: Some("order-hook".to_string()),
        }];
        let body = serde_json::to_value(UpdateRequest {
            version: 4,
            actions: &actions,
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "version": 4,
                "actions": [{ "action": "setKey", "key": "order-hook" }]
            })
        );
    }
}
