//! # Authentication Decoding
//!
//! Selects at most one authentication variant from a flat block.
//!
//! The block is scanned for every recognised authentication field. Zero set
//! fields means no authentication; more than one is rejected rather than
//! silently picking a credential.

use super::{DecodeError, Fields};
use crate::resource::Authentication;
use serde_json::{Map, Value};

/// Field holding the verbatim `Authorization` header value
pub const AUTHORIZATION_HEADER: &str = "authorization_header";

/// Field holding an Azure Functions host key
pub const AZURE_AUTHENTICATION: &str = "azure_authentication";

/// Every field that selects an authentication variant
pub const AUTHENTICATION_FIELDS: [&str; 2] = [AUTHORIZATION_HEADER, AZURE_AUTHENTICATION];

/// Decode the authentication of a flat block
///
/// Returns `Ok(None)` when no authentication field is set.
pub fn decode_authentication(
    block: &Map<String, Value>,
) -> Result<Option<Authentication>, DecodeError> {
    authentication_from(&Fields::new(block, ""))
}

pub(crate) fn authentication_from(
    fields: &Fields<'_>,
) -> Result<Option<Authentication>, DecodeError> {
    let mut present = Vec::new();
    for name in AUTHENTICATION_FIELDS {
        if let Some(value) = fields.optional_string(name)? {
            present.push((name, value));
        }
    }

    if present.len() > 1 {
        return Err(DecodeError::AmbiguousAuthentication {
            fields: present.into_iter().map(|(name, _)| name).collect(),
        });
    }

    Ok(present.pop().map(|(name, value)| match name {
        AZURE_AUTHENTICATION => Authentication::AzureFunctions { key: value },
        _ => Authentication::AuthorizationHeader {
            header_value: value,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(value: &Value) -> &Map<String, Value> {
        value.as_object().unwrap()
    }

    #[test]
    fn test_authorization_header() {
        let input = json!({ "authorization_header": "12345" });

        let auth = decode_authentication(block(&input)).unwrap();
        assert_eq!(
            auth,
            Some(Authentication::AuthorizationHeader {
                header_value: "12345".to_string()
            })
        );
    }

    #[test]
    fn test_azure_key() {
        let input = json!({ "azure_authentication": "AzureKey" });

        let auth = decode_authentication(block(&input)).unwrap();
        assert_eq!(
            auth,
            Some(Authentication::AzureFunctions {
                key: "AzureKey".to_string()
            })
        );
    }

    #[test]
    fn test_ambiguous_authentication() {
        let input = json!({
            "authorization_header": "12345",
            "azure_authentication": "AzureKey"
        });

        let result = decode_authentication(block(&input));
        assert_eq!(
            result,
            Err(DecodeError::AmbiguousAuthentication {
                fields: vec![AUTHORIZATION_HEADER, AZURE_AUTHENTICATION]
            })
        );
    }

    #[test]
    fn test_no_authentication() {
        let input = json!({ "url": "https://example.com" });
        assert_eq!(decode_authentication(block(&input)), Ok(None));
    }

    #[test]
    fn test_empty_values_are_unset() {
        // Unset optional strings arrive as "" from the configuration layer
        let input = json!({
            "authorization_header": "12345",
            "azure_authentication": ""
        });

        assert!(matches!(
            decode_authentication(block(&input)),
            Ok(Some(Authentication::AuthorizationHeader { .. }))
        ));
    }

    #[test]
    fn test_non_string_value_is_rejected() {
        let input = json!({ "authorization_header": 12345 });

        assert_eq!(
            decode_authentication(block(&input)),
            Err(DecodeError::InvalidType {
                field: "authorization_header".to_string(),
                expected: "a string"
            })
        );
    }
}
