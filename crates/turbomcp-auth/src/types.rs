//! Credential and token-endpoint types

use std::fmt;

use oauth2::{PkceCodeChallenge, PkceCodeVerifier};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, Result};

/// A bearer token presented by a caller
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BearerToken {
    /// The access token string
    pub access_token: String,
    /// Token type, usually `Bearer`
    pub token_type: Option<String>,
    /// Refresh token, if the caller holds one
    pub refresh_token: Option<String>,
    /// OpenID Connect id token, if the caller holds one
    pub id_token: Option<String>,
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// What a caller presents to [`OAuth2Provider::authenticate`](crate::OAuth2Provider::authenticate)
#[derive(Debug, Clone)]
pub enum Credentials {
    /// A token to validate
    Bearer(BearerToken),
    /// Authorization code returned to the redirect URI
    AuthorizationCode {
        code: String,
        redirect_uri: Option<String>,
        /// PKCE verifier (RFC 7636)
        code_verifier: Option<String>,
    },
    /// The client authenticates as itself
    ClientCredentials { scopes: Vec<String> },
    /// Resource owner username and password
    Password {
        username: String,
        password: SecretString,
        scopes: Vec<String>,
    },
    /// JWT bearer assertion grant
    ///
    /// Without an explicit `assertion`, one is signed with the client's key.
    JwtBearer {
        assertion: Option<String>,
        subject: Option<String>,
        scopes: Vec<String>,
    },
}

impl Credentials {
    /// Bearer credential carrying only an access token
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Credentials::Bearer(BearerToken {
            access_token: access_token.into(),
            ..Default::default()
        })
    }

    /// Password credential
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Password {
            username: username.into(),
            password: SecretString::new(password.into()),
            scopes: Vec::new(),
        }
    }

    /// The bearer token, when one is present and non-empty
    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Credentials::Bearer(bearer) if !bearer.access_token.is_empty() => {
                Some(&bearer.access_token)
            }
            _ => None,
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Bearer(_) => "bearer",
            Credentials::AuthorizationCode { .. } => "authorization_code",
            Credentials::ClientCredentials { .. } => "client_credentials",
            Credentials::Password { .. } => "password",
            Credentials::JwtBearer { .. } => "jwt_bearer",
        }
    }
}

/// Parameters of an authorization URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeParams {
    /// Where the authority sends the user back
    pub redirect_uri: Option<String>,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Opaque CSRF state
    pub state: Option<String>,
    /// PKCE challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE challenge method, `S256` or `plain`
    pub code_challenge_method: Option<String>,
    /// Any other query parameters, appended in order
    pub extra: Vec<(String, String)>,
}

impl AuthorizeParams {
    /// Set an `S256` PKCE challenge derived from `verifier` (RFC 7636 Section 4.2)
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] unless the verifier is 43 to 128
    /// characters long.
    pub fn with_pkce_verifier(mut self, verifier: &str) -> Result<Self> {
        if !(43..=128).contains(&verifier.len()) {
            return Err(AuthError::InvalidCredentials(format!(
                "PKCE verifier must be 43 to 128 characters, got {}",
                verifier.len()
            )));
        }
        let challenge =
            PkceCodeChallenge::from_code_verifier_sha256(&PkceCodeVerifier::new(verifier.into()));
        self.code_challenge = Some(challenge.as_str().to_string());
        self.code_challenge_method = Some(challenge.method().as_str().to_string());
        Ok(self)
    }
}

/// Successful token endpoint response (RFC 6749 Section 5.1)
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Lifetime in seconds from issuance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Members not covered above
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |token: &Option<String>| token.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("TokenResponse")
            .field("access_token", &redacted(&self.access_token))
            .field("token_type", &self.token_type)
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("id_token", &redacted(&self.id_token))
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field("additional", &self.additional.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl From<BearerToken> for TokenResponse {
    fn from(bearer: BearerToken) -> Self {
        Self {
            access_token: Some(bearer.access_token),
            token_type: bearer.token_type,
            refresh_token: bearer.refresh_token,
            id_token: bearer.id_token,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bearer_token_must_be_non_empty() {
        assert_eq!(Credentials::bearer("abc").bearer_token(), Some("abc"));
        assert_eq!(Credentials::bearer("").bearer_token(), None);
        assert_eq!(Credentials::password("u", "p").bearer_token(), None);
    }

    #[test]
    fn test_token_response_debug_hides_tokens() {
        let response: TokenResponse = serde_json::from_value(json!({
            "access_token": "at-123",
            "refresh_token": "rt-456",
            "token_type": "Bearer",
            "expires_in": 3600,
            "custom": true
        }))
        .unwrap();
        let rendered = format!("{response:?}");
        assert!(!rendered.contains("at-123"));
        assert!(!rendered.contains("rt-456"));
        assert!(rendered.contains("custom"));
        assert_eq!(response.additional.get("custom"), Some(&json!(true)));
    }

    #[test]
    fn test_pkce_challenge_from_verifier() {
        // RFC 7636 Appendix B
        let params = AuthorizeParams::default()
            .with_pkce_verifier("dBjftJeZ4CVP-mJ92K9qpvv_gXLIUC4Lq5r_EYBX5vA")
            .unwrap();
        assert_eq!(
            params.code_challenge.as_deref(),
            Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGjSstw-cM")
        );
        assert_eq!(params.code_challenge_method.as_deref(), Some("S256"));

        let err = AuthorizeParams::default().with_pkce_verifier("short").unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert!(
            AuthorizeParams::default()
                .with_pkce_verifier(&"a".repeat(129))
                .is_err()
        );
    }

    #[test]
    fn test_password_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::password("alice", "hunter2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
