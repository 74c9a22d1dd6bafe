//! OAuth 2.0 Token Introspection (RFC 7662)
//!
//! Used when a bearer token cannot be verified locally: the key store is
//! empty, or the token is not a JWT signed by a known key.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use secrecy::SecretString;
//! use turbomcp_auth::fetch::HttpFetch;
//! use turbomcp_auth::introspection::{IntrospectionClient, Introspector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let timeout = std::time::Duration::from_secs(10);
//! let fetch = Arc::new(HttpFetch::new("https://auth.example.com", timeout)?);
//! let secret = SecretString::new("secret".to_string());
//! let client = IntrospectionClient::new(fetch, "/oauth/introspect", "client_id", Some(secret));
//!
//! let response = client.introspect("opaque-token", Some("access_token")).await?;
//! if response.active {
//!     println!("Subject: {:?}", response.sub);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{AuthError, Result};
use crate::fetch::{Fetch, FetchRequest, remote_error};

/// Token introspection request per RFC 7662 Section 2.1
#[derive(Clone)]
pub struct IntrospectionRequest {
    /// The token to introspect (REQUIRED)
    pub token: String,

    /// Hint about token type (access_token or refresh_token)
    pub token_type_hint: Option<String>,
}

impl IntrospectionRequest {
    /// Form members, with the client authenticating in the body
    pub fn form<'a>(
        &'a self,
        client_id: &'a str,
        client_secret: Option<&'a SecretString>,
    ) -> Vec<(&'a str, &'a str)> {
        let mut form = vec![("token", self.token.as_str()), ("client_id", client_id)];
        if let Some(secret) = client_secret {
            form.push(("client_secret", secret.expose_secret().as_str()));
        }
        if let Some(hint) = &self.token_type_hint {
            form.push(("token_type_hint", hint.as_str()));
        }
        form
    }
}

impl fmt::Debug for IntrospectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrospectionRequest")
            .field("token", &"[REDACTED]")
            .field("token_type_hint", &self.token_type_hint)
            .finish()
    }
}

/// Token introspection response per RFC 7662 Section 2.2
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active (REQUIRED)
    pub active: bool,

    /// Scope(s) associated with the token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Username (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Token type (Bearer, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiration timestamp (seconds since epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued at timestamp (seconds since epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not before timestamp (seconds since epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Value>,

    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// JWT ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Additional fields
    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

/// Asks the authority about a token
#[async_trait]
pub trait Introspector: Send + Sync {
    /// Introspect `token`
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the authority cannot be reached or rejects
    /// the request. An inactive token is a successful response with
    /// `active: false`.
    async fn introspect(
        &self,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<IntrospectionResponse>;
}

/// [`Introspector`] that posts to the introspection endpoint
///
/// The client authenticates with `client_id` (and `client_secret` when it
/// has one) in the form body.
#[derive(Clone)]
pub struct IntrospectionClient {
    fetch: Arc<dyn Fetch>,
    path: String,
    client_id: String,
    client_secret: Option<SecretString>,
}

impl fmt::Debug for IntrospectionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrospectionClient")
            .field("path", &self.path)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl IntrospectionClient {
    /// Create a new introspection client
    pub fn new(
        fetch: Arc<dyn Fetch>,
        path: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<SecretString>,
    ) -> Self {
        Self {
            fetch,
            path: path.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    /// Check if a token is active (convenience method)
    ///
    /// # Errors
    ///
    /// Same as [`Introspector::introspect`].
    pub async fn is_token_active(&self, token: &str) -> Result<bool> {
        let response = self.introspect(token, Some("access_token")).await?;
        Ok(response.active)
    }
}

#[async_trait]
impl Introspector for IntrospectionClient {
    async fn introspect(
        &self,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<IntrospectionResponse> {
        let body = IntrospectionRequest {
            token: token.to_string(),
            token_type_hint: token_type_hint.map(str::to_string),
        };
        let form = body.form(&self.client_id, self.client_secret.as_ref());
        let request =
            FetchRequest::post_form(self.path.clone(), &form).header("Accept", "application/json");

        debug!(request = ?body, "Introspecting token");
        let response = self.fetch.fetch(request).await?.error_for_status()?;
        if response.body.is_empty() {
            return Err(AuthError::EmptyResponse);
        }
        if !response.is_content_type("application/json") {
            return Err(AuthError::UnacceptableContentType(
                response.content_type().unwrap_or_default().to_string(),
            ));
        }

        let json: Value = serde_json::from_slice(&response.body)
            .map_err(|e| AuthError::InvalidResponse(format!("introspection response: {e}")))?;
        if let Some(message) = remote_error(&json) {
            return Err(AuthError::Remote(message));
        }
        serde_json::from_value(json)
            .map_err(|e| AuthError::InvalidResponse(format!("introspection response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_debug_redacts_token() {
        let request = IntrospectionRequest {
            token: "secret-token-value".into(),
            token_type_hint: Some("access_token".into()),
        };
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("secret-token-value"));
        assert!(rendered.contains("access_token"));
    }

    #[test]
    fn test_response_keeps_unknown_members() {
        let response: IntrospectionResponse = serde_json::from_value(json!({
            "active": true,
            "sub": "alice",
            "exp": 1_700_000_000,
            "tenant": "acme"
        }))
        .unwrap();
        assert!(response.active);
        assert_eq!(response.exp, Some(1_700_000_000));
        assert_eq!(response.additional.get("tenant"), Some(&json!("acme")));
    }

    #[test]
    fn test_client_authenticates_in_form() {
        let request = IntrospectionRequest {
            token: "tok".into(),
            token_type_hint: None,
        };
        let secret = SecretString::new("s3cret".into());
        assert_eq!(
            request.form("client", Some(&secret)),
            vec![("token", "tok"), ("client_id", "client"), ("client_secret", "s3cret")]
        );

        let request = IntrospectionRequest {
            token_type_hint: Some("refresh_token".into()),
            ..request
        };
        assert_eq!(
            request.form("public-client", None),
            vec![
                ("token", "tok"),
                ("client_id", "public-client"),
                ("token_type_hint", "refresh_token"),
            ]
        );
    }
}
