//! Key store: an immutable-by-convention index of verification keys
//!
//! Keys are indexed by their declared algorithm. Keys without a declared
//! algorithm are kept aside and considered for any algorithm of their family.
//! Keys without a `kid` act as wildcards for the key-id part of a lookup.

use std::collections::HashMap;
use std::sync::Arc;

use jsonwebtoken::Algorithm;
use tracing::{debug, trace};

use crate::crypto;
use crate::error::{JoseError, KeyError, KeyErrorKind, Result};
use crate::jwk::{Jwk, JwkSet};
use crate::key::KeyMaterial;
use crate::token::{self, DecodedToken, RawToken};

/// A JWK Set entry that was left out of a store
#[derive(Debug)]
pub struct SkippedKey {
    /// Position in the `keys` array
    pub index: usize,
    /// `kid` of the entry, when readable
    pub kid: Option<String>,
    /// Why the entry was skipped
    pub error: KeyError,
}

/// Collection of verification keys
///
/// # Example
///
/// ```rust
/// use turbomcp_jose::{Jwk, KeyStore};
///
/// let mut store = KeyStore::new();
/// assert!(store.is_unsecure());
///
/// let jwk: Jwk = serde_json::from_str(
///     r#"{"kty":"oct","k":"c2VjcmV0LWtleS1tYXRlcmlhbA","alg":"HS256","kid":"k1"}"#,
/// )?;
/// store.add_jwk(&jwk)?;
/// assert!(!store.is_unsecure());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    by_algorithm: HashMap<Algorithm, Vec<Arc<KeyMaterial>>>,
    unassigned: Vec<Arc<KeyMaterial>>,
    leeway: u64,
}

impl KeyStore {
    /// Empty (unsecure) store
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock-skew tolerance, in seconds, applied to `exp`/`nbf`
    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }

    /// Configured clock-skew tolerance in seconds
    pub fn leeway(&self) -> u64 {
        self.leeway
    }

    /// Build a store from a JWK Set
    ///
    /// Each entry is constructed independently. Entries that fail are
    /// returned in the second tuple element instead of failing the set.
    pub fn from_jwk_set(set: &JwkSet) -> (Self, Vec<SkippedKey>) {
        let mut store = Self::new();
        let mut skipped = Vec::new();

        for (index, value) in set.keys.iter().enumerate() {
            let kid = value
                .get("kid")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);

            let built = serde_json::from_value::<Jwk>(value.clone())
                .map_err(|e| {
                    KeyError::with_source(
                        KeyErrorKind::InvalidEncoding,
                        "entry is not a JWK object",
                        e,
                    )
                })
                .and_then(|jwk| KeyMaterial::from_jwk(&jwk));

            match built {
                Ok(key) => store.add(key),
                Err(error) => {
                    debug!(index, kid = ?kid, error = %error, "Skipping JWK Set entry");
                    skipped.push(SkippedKey { index, kid, error });
                }
            }
        }

        (store, skipped)
    }

    /// Add already-constructed key material
    pub fn add(&mut self, key: KeyMaterial) {
        let key = Arc::new(key);
        match key.algorithm() {
            Some(alg) => self.by_algorithm.entry(alg).or_default().push(key),
            None => self.unassigned.push(key),
        }
    }

    /// Construct and add a single key
    ///
    /// # Errors
    ///
    /// Returns the construction error; unlike set ingestion, nothing is skipped.
    pub fn add_jwk(&mut self, jwk: &Jwk) -> std::result::Result<(), KeyError> {
        self.add(KeyMaterial::from_jwk(jwk)?);
        Ok(())
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.by_algorithm.values().map(Vec::len).sum::<usize>() + self.unassigned.len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True exactly when no key is loaded, so local verification is meaningless
    pub fn is_unsecure(&self) -> bool {
        self.is_empty()
    }

    /// Whether any key carries this `kid`
    pub fn contains_kid(&self, kid: &str) -> bool {
        self.keys().any(|key| key.kid() == Some(kid))
    }

    /// Iterate over every key
    pub fn keys(&self) -> impl Iterator<Item = &Arc<KeyMaterial>> {
        self.by_algorithm.values().flatten().chain(&self.unassigned)
    }

    /// Keys usable for `alg` whose `kid` matches (or that have none)
    pub fn candidates<'a>(
        &'a self,
        alg: Algorithm,
        kid: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Arc<KeyMaterial>> + 'a {
        self.by_algorithm
            .get(&alg)
            .into_iter()
            .flatten()
            .chain(self.unassigned.iter().filter(move |key| key.supports(alg)))
            .filter(move |key| match (kid, key.kid()) {
                (Some(wanted), Some(have)) => wanted == have,
                _ => true,
            })
    }

    /// Verify the signature of a compact token, ignoring temporal claims
    ///
    /// # Errors
    ///
    /// - [`JoseError::MalformedToken`] if the token cannot be split or decoded
    /// - [`JoseError::UnknownKey`] if no key matches the header `alg`/`kid`
    /// - [`JoseError::SignatureInvalid`] if no candidate key verifies the signature
    pub fn verify_signature(&self, token: &str) -> Result<DecodedToken> {
        let raw = RawToken::parse(token)?;
        let unknown = || JoseError::UnknownKey {
            alg: raw.header.alg.clone(),
            kid: raw.header.kid.clone(),
        };
        let alg = crypto::parse_algorithm(&raw.header.alg).ok_or_else(unknown)?;

        let mut tried = 0usize;
        let mut verified_by = None;
        for key in self.candidates(alg, raw.header.kid.as_deref()) {
            tried += 1;
            if crypto::verify(key, alg, raw.signing_input.as_bytes(), &raw.signature)? {
                verified_by = Some(Arc::clone(key));
                break;
            }
        }

        match verified_by {
            Some(key) => {
                trace!(kid = ?key.kid(), "Token signature verified");
                Ok(DecodedToken::verified(raw, alg, &key))
            }
            None if tried == 0 => Err(unknown()),
            None => Err(JoseError::SignatureInvalid),
        }
    }

    /// Decode a compact token, verify its signature and its `exp`/`nbf` claims
    ///
    /// # Errors
    ///
    /// Everything [`KeyStore::verify_signature`] returns, plus
    /// [`JoseError::ClaimInvalid`] when a temporal claim rejects the token.
    pub fn decode_and_verify(&self, token: &str) -> Result<DecodedToken> {
        let decoded = self.verify_signature(token)?;
        token::validate_temporal_claims(
            decoded.claims(),
            chrono::Utc::now().timestamp(),
            self.leeway,
        )?;
        Ok(decoded)
    }
}
