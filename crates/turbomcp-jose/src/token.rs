//! Compact JWS serialization: splitting, decoding, claim checks and encoding

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crypto;
use crate::error::{ClaimError, JoseError, Result};
use crate::key::KeyMaterial;

/// JOSE header of a compact token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Signature algorithm name
    pub alg: String,

    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Media type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Any other header parameters
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

/// Token split into its segments, not yet trusted
#[derive(Debug)]
pub(crate) struct RawToken<'a> {
    pub(crate) header: Header,
    pub(crate) claims: Map<String, Value>,
    pub(crate) signing_input: &'a str,
    pub(crate) signature: Vec<u8>,
}

impl<'a> RawToken<'a> {
    pub(crate) fn parse(token: &'a str) -> Result<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = segments.as_slice() else {
            return Err(JoseError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        };

        let header: Header = decode_json("header", header_b64)?;
        let claims: Map<String, Value> = decode_json("payload", payload_b64)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| JoseError::MalformedToken(format!("signature: {e}")))?;

        // Exact original bytes, never re-encoded
        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];

        Ok(Self {
            header,
            claims,
            signing_input,
            signature,
        })
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str, encoded: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| JoseError::MalformedToken(format!("{segment}: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| JoseError::MalformedToken(format!("{segment}: {e}")))
}

/// A token whose signature has been verified against a key store
///
/// Instances only come out of [`KeyStore`](crate::KeyStore) verification,
/// so holding one means the signature checked out.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    header: Header,
    algorithm: Algorithm,
    claims: Map<String, Value>,
    signing_input: String,
    signature: Vec<u8>,
    verified_with: Option<String>,
}

impl DecodedToken {
    pub(crate) fn verified(
        raw: RawToken<'_>,
        algorithm: Algorithm,
        key: &KeyMaterial,
    ) -> Self {
        Self {
            header: raw.header,
            algorithm,
            claims: raw.claims,
            signing_input: raw.signing_input.to_string(),
            signature: raw.signature,
            verified_with: key.kid().map(str::to_string),
        }
    }

    /// JOSE header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Algorithm the signature was verified with
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Payload claims
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Single claim by name
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Consume the token, keeping only its claims
    pub fn into_claims(self) -> Map<String, Value> {
        self.claims
    }

    /// `header.payload` exactly as presented
    pub fn signing_input(&self) -> &str {
        &self.signing_input
    }

    /// Raw signature bytes
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Key ID of the key that verified the signature, if it had one
    pub fn verified_with(&self) -> Option<&str> {
        self.verified_with.as_deref()
    }

    /// `exp` as unix seconds
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::Malformed`] if `exp` is present but not numeric.
    pub fn expires_at(&self) -> std::result::Result<Option<i64>, ClaimError> {
        numeric_date(&self.claims, "exp")
    }

    /// `nbf` as unix seconds
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::Malformed`] if `nbf` is present but not numeric.
    pub fn not_before(&self) -> std::result::Result<Option<i64>, ClaimError> {
        numeric_date(&self.claims, "nbf")
    }
}

/// Read a NumericDate claim; fractional seconds are truncated
pub fn numeric_date(
    claims: &Map<String, Value>,
    name: &'static str,
) -> std::result::Result<Option<i64>, ClaimError> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or(ClaimError::Malformed(name)),
    }
}

/// Check `exp` and `nbf` against `now` with `leeway` seconds of tolerance
///
/// # Errors
///
/// Returns a [`ClaimError`] if the token is expired, not yet valid, or
/// carries non-numeric temporal claims.
pub fn validate_temporal_claims(
    claims: &Map<String, Value>,
    now: i64,
    leeway: u64,
) -> std::result::Result<(), ClaimError> {
    let leeway = i64::try_from(leeway).unwrap_or(i64::MAX);
    if let Some(exp) = numeric_date(claims, "exp")? {
        if exp.saturating_add(leeway) <= now {
            return Err(ClaimError::Expired { exp });
        }
    }
    if let Some(nbf) = numeric_date(claims, "nbf")? {
        if nbf.saturating_sub(leeway) > now {
            return Err(ClaimError::NotYetValid { nbf });
        }
    }
    Ok(())
}

/// Sign `claims` into a compact token with `key`
///
/// The header carries `alg`, `typ: JWT` and the key's `kid` when it has one.
///
/// # Errors
///
/// Returns [`JoseError::UnsupportedAlgorithm`] or [`JoseError::NoPrivateKey`]
/// from the signer, or [`JoseError::Signing`] if the claims cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(
    key: &KeyMaterial,
    alg: Algorithm,
    claims: &T,
) -> Result<String> {
    let header = Header {
        alg: crypto::algorithm_name(alg).to_string(),
        kid: key.kid().map(str::to_string),
        typ: Some("JWT".to_string()),
        additional: Map::new(),
    };
    let header = serde_json::to_vec(&header).map_err(|e| JoseError::Signing(e.to_string()))?;
    let payload = serde_json::to_vec(claims).map_err(|e| JoseError::Signing(e.to_string()))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = crypto::sign(key, alg, signing_input.as_bytes())?;
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Read the header of a compact token without verifying anything
///
/// # Errors
///
/// Returns [`JoseError::MalformedToken`] if the token is not a three-segment
/// JWS with a JSON header and payload.
pub fn peek_header(token: &str) -> Result<Header> {
    RawToken::parse(token).map(|raw| raw.header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_rejects_wrong_segment_count() {
        for token in ["", "a.b", "a.b.c.d"] {
            let err = RawToken::parse(token).unwrap_err();
            assert!(matches!(err, JoseError::MalformedToken(_)), "{token}");
        }
    }

    #[test]
    fn test_parse_rejects_non_json_header() {
        let header = URL_SAFE_NO_PAD.encode("not json");
        let payload = URL_SAFE_NO_PAD.encode("{}");
        let err = RawToken::parse(&format!("{header}.{payload}.")).unwrap_err();
        assert!(matches!(err, JoseError::MalformedToken(m) if m.starts_with("header")));
    }

    #[test]
    fn test_signing_input_is_original_text() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256", "kid":"k1"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{ "sub" : "alice" }"#);
        let token = format!("{header}.{payload}.c2ln");
        let raw = RawToken::parse(&token).unwrap();
        assert_eq!(raw.signing_input, format!("{header}.{payload}"));
        assert_eq!(raw.header.kid.as_deref(), Some("k1"));
        assert_eq!(raw.signature, b"sig");
    }

    #[test]
    fn test_temporal_claims() {
        let now = 1_000;
        assert!(validate_temporal_claims(&claims(json!({})), now, 0).is_ok());
        assert!(validate_temporal_claims(&claims(json!({"exp": 1_001})), now, 0).is_ok());
        assert_eq!(
            validate_temporal_claims(&claims(json!({"exp": 1_000})), now, 0),
            Err(ClaimError::Expired { exp: 1_000 })
        );
        assert!(validate_temporal_claims(&claims(json!({"exp": 990})), now, 30).is_ok());
        assert_eq!(
            validate_temporal_claims(&claims(json!({"nbf": 1_010})), now, 0),
            Err(ClaimError::NotYetValid { nbf: 1_010 })
        );
        assert_eq!(
            validate_temporal_claims(&claims(json!({"exp": "tomorrow"})), now, 0),
            Err(ClaimError::Malformed("exp"))
        );
    }

    #[test]
    fn test_fractional_numeric_date() {
        let c = claims(json!({"exp": 1234.9}));
        assert_eq!(numeric_date(&c, "exp"), Ok(Some(1234)));
    }
}
