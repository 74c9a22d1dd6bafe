//! Error types for authentication, key refresh and OAuth2 endpoint calls

use thiserror::Error;
use turbomcp_jose::{JoseError, KeyError};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AuthError>;

/// Failure reported by a [`Fetch`](crate::fetch::Fetch) implementation
///
/// Only transport-level problems belong here. A response with a non-2xx
/// status is still a successful fetch; callers decide what it means.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The path could not be resolved against the configured site
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP client failure (connect, TLS, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Any other transport failure, for non-reqwest implementations
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the authentication orchestrator and its collaborators
#[derive(Debug, Error)]
pub enum AuthError {
    /// Key construction, signature or claim failure
    #[error(transparent)]
    Jose(#[from] JoseError),

    /// The token is past its expiry (after any leeway)
    #[error("Expired token")]
    ExpiredToken,

    /// The authority reported the token as not active
    #[error("Inactive token")]
    InactiveToken,

    /// The HTTP collaborator failed before a response was available
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The response body was empty
    #[error("No Body")]
    EmptyResponse,

    /// The response declared a media type this client cannot read
    #[error("Cannot handle content type: {0}")]
    UnacceptableContentType(String),

    /// The authority answered with an OAuth2 `error` member or a failure status
    #[error("{0}")]
    Remote(String),

    /// The response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The credential does not fit the configured flow
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Client configuration is incomplete or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<KeyError> for AuthError {
    fn from(err: KeyError) -> Self {
        AuthError::Jose(JoseError::InvalidKey(err))
    }
}

impl AuthError {
    /// Whether the rejection is caused by token expiry
    pub fn is_expired(&self) -> bool {
        match self {
            AuthError::ExpiredToken => true,
            AuthError::Jose(err) => err.is_expired(),
            _ => false,
        }
    }

    /// Whether retrying the same call later might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Fetch(_))
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            AuthError::Jose(err) => err.category(),
            AuthError::ExpiredToken => "expired_token",
            AuthError::InactiveToken => "inactive_token",
            AuthError::Fetch(_) => "transport",
            AuthError::EmptyResponse => "empty_response",
            AuthError::UnacceptableContentType(_) => "content_type",
            AuthError::Remote(_) => "remote",
            AuthError::InvalidResponse(_) => "invalid_response",
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turbomcp_jose::{ClaimError, KeyErrorKind};

    #[test]
    fn test_expiry_detection() {
        assert!(AuthError::ExpiredToken.is_expired());
        let expired = JoseError::ClaimInvalid(ClaimError::Expired { exp: 1 });
        assert!(AuthError::Jose(expired).is_expired());
        assert!(!AuthError::Jose(JoseError::SignatureInvalid).is_expired());
        assert!(!AuthError::InactiveToken.is_expired());
    }

    #[test]
    fn test_key_error_converts_through_jose() {
        let err: AuthError = KeyError::new(KeyErrorKind::MissingParameter, "missing `k`").into();
        assert_eq!(err.category(), "invalid_key");
    }

    #[test]
    fn test_display_matches_wire_messages() {
        assert_eq!(AuthError::ExpiredToken.to_string(), "Expired token");
        assert_eq!(AuthError::EmptyResponse.to_string(), "No Body");
        assert_eq!(
            AuthError::UnacceptableContentType("text/html".into()).to_string(),
            "Cannot handle content type: text/html"
        );
    }
}
