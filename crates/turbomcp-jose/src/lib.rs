//! # TurboMCP JOSE - Key Material and Token Verification
//!
//! Builds typed keys from JWK descriptions and uses them to sign and verify
//! compact JWS tokens.
//!
//! ## Architecture
//!
//! - [`jwk`] - JWK / JWK Set documents (RFC 7517)
//! - [`key`] - [`KeyMaterial`]: RSA, EC P-256, symmetric and `x5c` certificate-chain keys
//! - [`crypto`] - algorithm family table, [`verify`] and [`sign`] over raw signing input
//! - [`store`] - [`KeyStore`]: lookup by `(alg, kid)`, unsecure detection, decode-and-verify
//! - [`token`] - compact serialization, temporal claims and [`encode`]
//!
//! ## Quick Start
//!
//! ```rust
//! use turbomcp_jose::{Algorithm, JwkSet, KeyStore, encode};
//! use serde_json::json;
//!
//! let set: JwkSet = serde_json::from_value(json!({
//!     "keys": [{"kty": "oct", "k": "c2VjcmV0LWtleS1tYXRlcmlhbA", "alg": "HS256", "kid": "k1"}]
//! }))?;
//! let (store, skipped) = KeyStore::from_jwk_set(&set);
//! assert!(skipped.is_empty());
//!
//! let key = store.keys().next().expect("one key");
//! let token = encode(key, Algorithm::HS256, &json!({"sub": "alice"}))?;
//!
//! let decoded = store.decode_and_verify(&token)?;
//! assert_eq!(decoded.claim("sub"), Some(&json!("alice")));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod crypto;
pub mod error;
pub mod jwk;
pub mod key;
pub mod store;
pub mod token;
pub mod x509;

pub use jsonwebtoken::Algorithm;

pub use crypto::{AlgorithmFamily, sign, verify};
pub use error::{
    CertificateValidityError, ClaimError, JoseError, KeyError, KeyErrorKind, Result,
};
pub use jwk::{Jwk, JwkSet};
pub use key::{EcCurve, KeyKind, KeyMaterial, KeyType};
pub use store::{KeyStore, SkippedKey};
pub use token::{DecodedToken, Header, encode, peek_header};
pub use x509::{CertificateChainKey, LeafKey};
