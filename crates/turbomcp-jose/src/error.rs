//! Error types for key construction and token verification

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Result type for JOSE operations
pub type Result<T> = std::result::Result<T, JoseError>;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Specific reason a JWK could not be turned into key material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyErrorKind {
    /// A required JWK member is absent
    MissingParameter,
    /// A member is not valid base64/base64url or has the wrong length
    InvalidEncoding,
    /// `kty` names a key type this crate does not handle
    UnsupportedKeyType,
    /// `crv` names a curve other than P-256
    UnsupportedCurve,
    /// `alg` is unknown or incompatible with the key type
    UnsupportedAlgorithm,
    /// The parameters do not form a valid key
    InvalidKey,
    /// An `x5c` entry could not be parsed as an X.509 certificate
    InvalidCertificate,
    /// A certificate's `notAfter` is in the past
    CertificateExpired,
    /// A certificate's `notBefore` is in the future
    CertificateNotYetValid,
    /// A certificate is not issued and signed by the next one in the chain
    BrokenChain,
}

impl KeyErrorKind {
    /// Whether this kind reports a certificate validity-period violation
    pub fn is_certificate_validity(self) -> bool {
        matches!(
            self,
            KeyErrorKind::CertificateExpired | KeyErrorKind::CertificateNotYetValid
        )
    }

    /// Stable identifier for logging
    pub fn as_str(self) -> &'static str {
        match self {
            KeyErrorKind::MissingParameter => "missing_parameter",
            KeyErrorKind::InvalidEncoding => "invalid_encoding",
            KeyErrorKind::UnsupportedKeyType => "unsupported_key_type",
            KeyErrorKind::UnsupportedCurve => "unsupported_curve",
            KeyErrorKind::UnsupportedAlgorithm => "unsupported_algorithm",
            KeyErrorKind::InvalidKey => "invalid_key",
            KeyErrorKind::InvalidCertificate => "invalid_certificate",
            KeyErrorKind::CertificateExpired => "certificate_expired",
            KeyErrorKind::CertificateNotYetValid => "certificate_not_yet_valid",
            KeyErrorKind::BrokenChain => "broken_chain",
        }
    }
}

impl fmt::Display for KeyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A JWK could not be constructed into usable key material
///
/// The [`kind`](KeyError::kind) can be matched directly. When a lower-level
/// cause exists (for instance a [`CertificateValidityError`]) it is kept as
/// the error [`source`](std::error::Error::source).
#[derive(Debug, Error)]
#[error("invalid key ({kind}): {message}")]
pub struct KeyError {
    kind: KeyErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl KeyError {
    /// Create an error without an underlying cause
    pub fn new(kind: KeyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create an error that wraps the cause that triggered it
    pub fn with_source(
        kind: KeyErrorKind,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub(crate) fn missing(parameter: &str) -> Self {
        Self::new(
            KeyErrorKind::MissingParameter,
            format!("missing required parameter `{parameter}`"),
        )
    }

    /// The specific reason for the failure
    pub fn kind(&self) -> KeyErrorKind {
        self.kind
    }

    /// Human-readable detail
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Downcast the preserved cause to a certificate validity error, if that is what it is
    pub fn certificate_validity(&self) -> Option<&CertificateValidityError> {
        self.source
            .as_deref()
            .and_then(|e| e.downcast_ref::<CertificateValidityError>())
    }
}

/// A certificate was presented outside of its validity window
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateValidityError {
    /// `notAfter` lies in the past
    #[error("certificate `{subject}` expired at {not_after} (now {now})")]
    Expired {
        /// Certificate subject
        subject: String,
        /// Expiry as unix seconds
        not_after: i64,
        /// Evaluation time as unix seconds
        now: i64,
    },
    /// `notBefore` lies in the future
    #[error("certificate `{subject}` is not valid before {not_before} (now {now})")]
    NotYetValid {
        /// Certificate subject
        subject: String,
        /// Start of validity as unix seconds
        not_before: i64,
        /// Evaluation time as unix seconds
        now: i64,
    },
}

/// A standard temporal claim rejected the token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// `exp` is not in the future
    #[error("token expired at {exp}")]
    Expired {
        /// Expiration as unix seconds
        exp: i64,
    },
    /// `nbf` is in the future
    #[error("token not valid before {nbf}")]
    NotYetValid {
        /// Not-before as unix seconds
        nbf: i64,
    },
    /// A temporal claim is present but not numeric
    #[error("claim `{0}` is not a numeric date")]
    Malformed(&'static str),
}

/// Errors produced while signing, decoding or verifying compact tokens
#[derive(Debug, Error)]
pub enum JoseError {
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    #[error("algorithm {alg} cannot be used with a {key_type} key")]
    UnsupportedAlgorithm {
        alg: String,
        key_type: &'static str,
    },

    #[error("key has no private component")]
    NoPrivateKey,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("no key registered for algorithm {alg} (kid: {kid:?})")]
    UnknownKey { alg: String, kid: Option<String> },

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("invalid claim: {0}")]
    ClaimInvalid(#[from] ClaimError),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl JoseError {
    /// Whether the token was rejected only because `exp` has passed
    pub fn is_expired(&self) -> bool {
        matches!(self, JoseError::ClaimInvalid(ClaimError::Expired { .. }))
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            JoseError::InvalidKey(_) => "invalid_key",
            JoseError::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
            JoseError::NoPrivateKey => "no_private_key",
            JoseError::MalformedToken(_) => "malformed_token",
            JoseError::UnknownKey { .. } => "unknown_key",
            JoseError::SignatureInvalid => "signature_invalid",
            JoseError::ClaimInvalid(_) => "claim_invalid",
            JoseError::Signing(_) => "signing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_validity_cause_is_preserved() {
        let cause = CertificateValidityError::Expired {
            subject: "CN=test".to_string(),
            not_after: 10,
            now: 20,
        };
        let err =
            KeyError::with_source(KeyErrorKind::CertificateExpired, "chain[0]", cause.clone());

        assert!(err.kind().is_certificate_validity());
        assert_eq!(err.certificate_validity(), Some(&cause));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn test_plain_key_error_has_no_validity_cause() {
        let err = KeyError::missing("n");
        assert_eq!(err.kind(), KeyErrorKind::MissingParameter);
        assert!(!err.kind().is_certificate_validity());
        assert!(err.certificate_validity().is_none());
        assert!(err.to_string().contains("`n`"));
    }

    #[test]
    fn test_expired_helper() {
        assert!(JoseError::from(ClaimError::Expired { exp: 1 }).is_expired());
        assert!(!JoseError::from(ClaimError::NotYetValid { nbf: 1 }).is_expired());
        assert!(!JoseError::SignatureInvalid.is_expired());
        assert_eq!(JoseError::SignatureInvalid.category(), "signature_invalid");
    }
}
