//! JWK and JWK Set descriptions (RFC 7517)
//!
//! These are plain deserialized documents. Nothing here is validated;
//! [`KeyMaterial::from_jwk`](crate::KeyMaterial::from_jwk) does that.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON Web Key as published by an authority
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA`, `EC`, `oct`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,

    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Intended algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Intended use (`sig` / `enc`), informational only
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    // RSA
    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// RSA private exponent, or EC private scalar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// First prime factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    /// Second prime factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    /// First factor CRT exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    /// Second factor CRT exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    /// First CRT coefficient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,

    // EC
    /// Curve name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Affine x coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Affine y coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    // oct
    /// Symmetric secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,

    /// X.509 certificate chain, standard base64 DER, leaf first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
}

impl Jwk {
    /// Whether any private or secret member is present
    pub fn has_private_parts(&self) -> bool {
        self.d.is_some() || self.k.is_some()
    }
}

// Manual Debug impl to keep private members out of logs
impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .field("use", &self.key_use)
            .field("n", &self.n)
            .field("e", &self.e)
            .field("d", &redact(&self.d))
            .field("crv", &self.crv)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("k", &redact(&self.k))
            .field("x5c", &self.x5c.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

/// JWK Set document
///
/// Entries stay as raw JSON so that one malformed key cannot fail the
/// deserialization of the whole set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Published keys
    #[serde(default)]
    pub keys: Vec<serde_json::Value>,
}

impl JwkSet {
    /// Build a set from typed keys
    ///
    /// # Errors
    ///
    /// Returns an error if a key cannot be serialized to JSON.
    pub fn from_keys<'a>(
        keys: impl IntoIterator<Item = &'a Jwk>,
    ) -> Result<Self, serde_json::Error> {
        let keys = keys
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys })
    }
}
