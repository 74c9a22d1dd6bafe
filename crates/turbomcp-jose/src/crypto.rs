//! Signature creation and verification over raw signing input
//!
//! Algorithm/key compatibility is resolved through a static table. A key is
//! never used with an algorithm outside its family, so a token cannot pick
//! e.g. `HS256` to have an RSA public key treated as an HMAC secret.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::Algorithm;
use tracing::debug;

use crate::error::{JoseError, Result};
use crate::key::{KeyMaterial, KeyType};

/// Key family an algorithm belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmFamily {
    /// `HS*`, symmetric secret
    Hmac,
    /// `RS*` and `PS*`
    Rsa,
    /// `ES*`
    Ec,
}

impl AlgorithmFamily {
    /// The key type able to serve this family
    pub fn key_type(self) -> KeyType {
        match self {
            AlgorithmFamily::Hmac => KeyType::Oct,
            AlgorithmFamily::Rsa => KeyType::Rsa,
            AlgorithmFamily::Ec => KeyType::Ec,
        }
    }
}

const ALGORITHMS: &[(Algorithm, &str, AlgorithmFamily)] = &[
    (Algorithm::HS256, "HS256", AlgorithmFamily::Hmac),
    (Algorithm::HS384, "HS384", AlgorithmFamily::Hmac),
    (Algorithm::HS512, "HS512", AlgorithmFamily::Hmac),
    (Algorithm::RS256, "RS256", AlgorithmFamily::Rsa),
    (Algorithm::RS384, "RS384", AlgorithmFamily::Rsa),
    (Algorithm::RS512, "RS512", AlgorithmFamily::Rsa),
    (Algorithm::PS256, "PS256", AlgorithmFamily::Rsa),
    (Algorithm::PS384, "PS384", AlgorithmFamily::Rsa),
    (Algorithm::PS512, "PS512", AlgorithmFamily::Rsa),
    (Algorithm::ES256, "ES256", AlgorithmFamily::Ec),
    (Algorithm::ES384, "ES384", AlgorithmFamily::Ec),
];

/// Family of a supported algorithm, `None` for anything else (e.g. `EdDSA`)
pub fn family(alg: Algorithm) -> Option<AlgorithmFamily> {
    ALGORITHMS
        .iter()
        .find(|(a, _, _)| *a == alg)
        .map(|(_, _, family)| *family)
}

/// JOSE name of an algorithm, as it appears in a token header
pub fn algorithm_name(alg: Algorithm) -> &'static str {
    ALGORITHMS
        .iter()
        .find(|(a, _, _)| *a == alg)
        .map_or("unsupported", |(_, name, _)| *name)
}

/// Parse a JOSE algorithm name; `none` and unknown names yield `None`
pub fn parse_algorithm(name: &str) -> Option<Algorithm> {
    ALGORITHMS
        .iter()
        .find(|(_, n, _)| *n == name)
        .map(|(alg, _, _)| *alg)
}

fn ensure_supported(key: &KeyMaterial, alg: Algorithm) -> Result<()> {
    if key.supports(alg) {
        Ok(())
    } else {
        Err(JoseError::UnsupportedAlgorithm {
            alg: algorithm_name(alg).to_string(),
            key_type: key.key_type().as_str(),
        })
    }
}

/// Verify `signature` over `signing_input`
///
/// Returns `Ok(false)` when the signature does not match; that is an
/// expected outcome, not an error.
///
/// # Errors
///
/// Returns [`JoseError::UnsupportedAlgorithm`] if `alg` is outside the key's family.
pub fn verify(
    key: &KeyMaterial,
    alg: Algorithm,
    signing_input: &[u8],
    signature: &[u8],
) -> Result<bool> {
    ensure_supported(key, alg)?;
    let encoded = URL_SAFE_NO_PAD.encode(signature);
    match jsonwebtoken::crypto::verify(&encoded, signing_input, key.decoding_key(), alg) {
        Ok(valid) => Ok(valid),
        Err(e) => {
            debug!(kid = ?key.kid(), error = %e, "Signature rejected by crypto backend");
            Ok(false)
        }
    }
}

/// Sign `signing_input` with the private or secret half of `key`
///
/// # Errors
///
/// - [`JoseError::UnsupportedAlgorithm`] if `alg` is outside the key's family
/// - [`JoseError::NoPrivateKey`] if the key only holds a public half
/// - [`JoseError::Signing`] if the backend fails
pub fn sign(key: &KeyMaterial, alg: Algorithm, signing_input: &[u8]) -> Result<Vec<u8>> {
    ensure_supported(key, alg)?;
    let encoding = key.encoding_key().ok_or(JoseError::NoPrivateKey)?;
    let encoded = jsonwebtoken::crypto::sign(signing_input, encoding, alg)
        .map_err(|e| JoseError::Signing(e.to_string()))?;
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| JoseError::Signing(e.to_string()))
}
