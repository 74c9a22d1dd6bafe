//! Typed key material built from JWK descriptions
//!
//! A [`KeyMaterial`] holds exactly one representation ([`KeyKind`]) plus the
//! prepared `jsonwebtoken` verification/signing keys for it. It is immutable
//! once built and is shared behind `Arc` by [`KeyStore`](crate::KeyStore).

use std::fmt;
use std::time::SystemTime;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretVec};

use crate::crypto::{self, AlgorithmFamily};
use crate::error::{KeyError, KeyErrorKind};
use crate::jwk::Jwk;
use crate::x509::{self, CertificateChainKey, LeafKey};

/// Coarse key type, used for algorithm compatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// RSA (also certificate chains with an RSA leaf)
    Rsa,
    /// Elliptic curve (also certificate chains with an EC leaf)
    Ec,
    /// Symmetric secret
    Oct,
}

impl KeyType {
    /// JWK `kty` spelling
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::Rsa => "RSA",
            KeyType::Ec => "EC",
            KeyType::Oct => "oct",
        }
    }
}

/// Supported named curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    /// NIST P-256
    P256,
}

impl EcCurve {
    fn from_name(name: &str) -> Result<Self, KeyError> {
        match name {
            "P-256" => Ok(EcCurve::P256),
            other => Err(KeyError::new(
                KeyErrorKind::UnsupportedCurve,
                format!("unsupported curve `{other}`"),
            )),
        }
    }

    /// The only signature algorithm defined for this curve
    pub fn algorithm(self) -> Algorithm {
        match self {
            EcCurve::P256 => Algorithm::ES256,
        }
    }
}

/// RSA public key with optional private half
#[derive(Debug, Clone)]
pub struct RsaKey {
    public: RsaPublicKey,
    private: Option<RsaPrivateKey>,
    crt: bool,
}

impl RsaKey {
    /// Public half
    pub fn public(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Whether the private exponent is present
    pub fn has_private(&self) -> bool {
        self.private.is_some()
    }

    /// Whether the private key was built from the full CRT parameter set
    pub fn is_crt(&self) -> bool {
        self.crt
    }
}

/// EC public point with optional private scalar
#[derive(Debug, Clone)]
pub struct EcKey {
    curve: EcCurve,
    public: p256::PublicKey,
    private: Option<p256::SecretKey>,
}

impl EcKey {
    /// Named curve
    pub fn curve(&self) -> EcCurve {
        self.curve
    }

    /// Public point
    pub fn public(&self) -> &p256::PublicKey {
        &self.public
    }

    /// Whether the private scalar is present
    pub fn has_private(&self) -> bool {
        self.private.is_some()
    }
}

/// Symmetric secret
pub struct SymmetricKey {
    secret: SecretVec<u8>,
}

impl SymmetricKey {
    /// Secret length in bytes
    pub fn len(&self) -> usize {
        self.secret.expose_secret().len()
    }

    /// Whether the secret is empty (never true for a constructed key)
    pub fn is_empty(&self) -> bool {
        self.secret.expose_secret().is_empty()
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("secret", &"[REDACTED]")
            .field("len", &self.len())
            .finish()
    }
}

/// Exactly one key representation
#[derive(Debug)]
pub enum KeyKind {
    /// `kty = RSA`
    Rsa(RsaKey),
    /// `kty = EC`
    Ec(EcKey),
    /// `kty = oct`
    Symmetric(SymmetricKey),
    /// Leaf key of an `x5c` chain
    CertificateChain(CertificateChainKey),
}

/// A key ready to verify (and, with a private half, sign) compact tokens
pub struct KeyMaterial {
    kid: Option<String>,
    alg: Option<Algorithm>,
    key_use: Option<String>,
    kind: KeyKind,
    decoding: DecodingKey,
    encoding: Option<EncodingKey>,
}

impl KeyMaterial {
    /// Build key material from a JWK description
    ///
    /// An `x5c` member takes precedence over the raw key members; otherwise
    /// `kty` selects the representation.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] when the description is incomplete, malformed,
    /// unsupported, or (for certificate chains) outside its validity window.
    /// Validity failures carry kind [`KeyErrorKind::CertificateExpired`] or
    /// [`KeyErrorKind::CertificateNotYetValid`] with the specific
    /// [`CertificateValidityError`](crate::CertificateValidityError) as source.
    ///
    /// # Example
    ///
    /// ```rust
    /// use turbomcp_jose::{Jwk, KeyMaterial, KeyType};
    ///
    /// let jwk: Jwk = serde_json::from_str(
    ///     r#"{"kty":"oct","k":"c2VjcmV0LWtleS1tYXRlcmlhbA","alg":"HS256","kid":"k1"}"#,
    /// )?;
    /// let key = KeyMaterial::from_jwk(&jwk)?;
    /// assert_eq!(key.key_type(), KeyType::Oct);
    /// assert_eq!(key.kid(), Some("k1"));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyError> {
        Self::from_jwk_at(jwk, SystemTime::now())
    }

    /// Build key material, evaluating certificate validity at `now`
    ///
    /// # Errors
    ///
    /// See [`KeyMaterial::from_jwk`].
    pub fn from_jwk_at(jwk: &Jwk, now: SystemTime) -> Result<Self, KeyError> {
        let alg = jwk
            .alg
            .as_deref()
            .map(|name| {
                crypto::parse_algorithm(name).ok_or_else(|| {
                    KeyError::new(
                        KeyErrorKind::UnsupportedAlgorithm,
                        format!("unsupported algorithm `{name}`"),
                    )
                })
            })
            .transpose()?;

        let kind = match jwk.x5c.as_deref() {
            Some(chain) if !chain.is_empty() => {
                let now = chrono::DateTime::<chrono::Utc>::from(now).timestamp();
                KeyKind::CertificateChain(x509::parse_chain(chain, now)?)
            }
            _ => match jwk.kty.as_deref() {
                Some("RSA") => KeyKind::Rsa(rsa_key(jwk)?),
                Some("EC") => KeyKind::Ec(ec_key(jwk)?),
                Some("oct") => KeyKind::Symmetric(symmetric_key(jwk)?),
                Some(other) => {
                    return Err(KeyError::new(
                        KeyErrorKind::UnsupportedKeyType,
                        format!("unsupported key type `{other}`"),
                    ));
                }
                None => return Err(KeyError::missing("kty")),
            },
        };

        let (decoding, encoding) = jwt_keys(&kind)?;
        let material = Self {
            kid: jwk.kid.clone(),
            alg: None,
            key_use: jwk.key_use.clone(),
            kind,
            decoding,
            encoding,
        };

        match alg {
            Some(alg) if !material.supports(alg) => Err(KeyError::new(
                KeyErrorKind::UnsupportedAlgorithm,
                format!(
                    "algorithm {} cannot be used with a {} key",
                    crypto::algorithm_name(alg),
                    material.key_type().as_str()
                ),
            )),
            _ => Ok(Self { alg, ..material }),
        }
    }

    /// Key ID, if published
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Declared algorithm, if published
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.alg
    }

    /// Published `use` member (not enforced)
    pub fn key_use(&self) -> Option<&str> {
        self.key_use.as_deref()
    }

    /// Underlying representation
    pub fn kind(&self) -> &KeyKind {
        &self.kind
    }

    /// Coarse key type; certificate chains report their leaf key type
    pub fn key_type(&self) -> KeyType {
        match &self.kind {
            KeyKind::Rsa(_) => KeyType::Rsa,
            KeyKind::Ec(_) => KeyType::Ec,
            KeyKind::Symmetric(_) => KeyType::Oct,
            KeyKind::CertificateChain(chain) => match chain.leaf() {
                LeafKey::Rsa(_) => KeyType::Rsa,
                LeafKey::Ec(_) => KeyType::Ec,
            },
        }
    }

    /// Whether this key can sign (private or secret half present)
    pub fn can_sign(&self) -> bool {
        self.encoding.is_some()
    }

    /// Whether `alg` may be used with this key
    ///
    /// The algorithm family must match the key type, EC keys only accept the
    /// algorithm of their curve, and a declared `alg` must match exactly.
    pub fn supports(&self, alg: Algorithm) -> bool {
        if self.alg.is_some_and(|declared| declared != alg) {
            return false;
        }
        let Some(family) = crypto::family(alg) else {
            return false;
        };
        if family.key_type() != self.key_type() {
            return false;
        }
        family != AlgorithmFamily::Ec || alg == EcCurve::P256.algorithm()
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    pub(crate) fn encoding_key(&self) -> Option<&EncodingKey> {
        self.encoding.as_ref()
    }
}

// Manual Debug impl to keep prepared key bytes out of logs
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .field("use", &self.key_use)
            .field("key_type", &self.key_type())
            .field("can_sign", &self.can_sign())
            .finish_non_exhaustive()
    }
}

fn decode_b64url(name: &str, value: &str) -> Result<Vec<u8>, KeyError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| {
            KeyError::with_source(
                KeyErrorKind::InvalidEncoding,
                format!("parameter `{name}` is not base64url"),
                e,
            )
        })
}

fn required<'a>(name: &str, value: Option<&'a String>) -> Result<&'a str, KeyError> {
    value.map(String::as_str).ok_or_else(|| KeyError::missing(name))
}

fn biguint(name: &str, value: &str) -> Result<BigUint, KeyError> {
    decode_b64url(name, value).map(|bytes| BigUint::from_bytes_be(&bytes))
}

fn rsa_key(jwk: &Jwk) -> Result<RsaKey, KeyError> {
    let n = biguint("n", required("n", jwk.n.as_ref())?)?;
    let e = biguint("e", required("e", jwk.e.as_ref())?)?;
    let public = RsaPublicKey::new(n.clone(), e.clone()).map_err(|err| {
        KeyError::with_source(KeyErrorKind::InvalidKey, "invalid RSA public key", err)
    })?;

    let Some(d) = jwk.d.as_deref() else {
        return Ok(RsaKey {
            public,
            private: None,
            crt: false,
        });
    };
    let d = biguint("d", d)?;

    let crt = [&jwk.p, &jwk.q, &jwk.dp, &jwk.dq, &jwk.qi]
        .iter()
        .all(|member| member.is_some());
    // Without the CRT set the primes are recovered from n, e and d
    let primes = match (crt, jwk.p.as_deref(), jwk.q.as_deref()) {
        (true, Some(p), Some(q)) => vec![biguint("p", p)?, biguint("q", q)?],
        _ => Vec::new(),
    };

    let mut private = RsaPrivateKey::from_components(n, e, d, primes).map_err(|err| {
        KeyError::with_source(KeyErrorKind::InvalidKey, "invalid RSA private key", err)
    })?;
    private
        .validate()
        .and_then(|()| private.precompute())
        .map_err(|err| {
            KeyError::with_source(KeyErrorKind::InvalidKey, "inconsistent RSA private key", err)
        })?;

    Ok(RsaKey {
        public,
        private: Some(private),
        crt,
    })
}

fn ec_key(jwk: &Jwk) -> Result<EcKey, KeyError> {
    let curve = EcCurve::from_name(required("crv", jwk.crv.as_ref())?)?;
    let coordinate = |name: &str, value: Option<&String>| -> Result<Vec<u8>, KeyError> {
        let bytes = decode_b64url(name, required(name, value)?)?;
        if bytes.len() != 32 {
            return Err(KeyError::new(
                KeyErrorKind::InvalidEncoding,
                format!("parameter `{name}` must be 32 bytes for P-256"),
            ));
        }
        Ok(bytes)
    };
    let x = coordinate("x", jwk.x.as_ref())?;
    let y = coordinate("y", jwk.y.as_ref())?;

    // uncompressed SEC1 point: 0x04 || x || y
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(&x);
    sec1.extend_from_slice(&y);
    let public = p256::PublicKey::from_sec1_bytes(&sec1)
        .map_err(|_| KeyError::new(KeyErrorKind::InvalidKey, "point is not on curve P-256"))?;

    let private = match jwk.d.as_deref() {
        Some(d) => {
            let scalar = decode_b64url("d", d)?;
            let secret = p256::SecretKey::from_slice(&scalar).map_err(|err| {
                KeyError::with_source(KeyErrorKind::InvalidKey, "invalid P-256 private scalar", err)
            })?;
            if secret.public_key() != public {
                return Err(KeyError::new(
                    KeyErrorKind::InvalidKey,
                    "private scalar does not match the public point",
                ));
            }
            Some(secret)
        }
        None => None,
    };

    Ok(EcKey {
        curve,
        public,
        private,
    })
}

fn symmetric_key(jwk: &Jwk) -> Result<SymmetricKey, KeyError> {
    let secret = decode_b64url("k", required("k", jwk.k.as_ref())?)?;
    if secret.is_empty() {
        return Err(KeyError::new(
            KeyErrorKind::InvalidKey,
            "symmetric key must not be empty",
        ));
    }
    Ok(SymmetricKey {
        secret: SecretVec::new(secret),
    })
}

fn rsa_decoding_key(public: &RsaPublicKey) -> DecodingKey {
    DecodingKey::from_rsa_raw_components(&public.n().to_bytes_be(), &public.e().to_bytes_be())
}

fn ec_decoding_key(public: &p256::PublicKey) -> Result<DecodingKey, KeyError> {
    let point = public.to_encoded_point(false);
    let (Some(x), Some(y)) = (point.x(), point.y()) else {
        return Err(KeyError::new(
            KeyErrorKind::InvalidKey,
            "EC point has no affine coordinates",
        ));
    };
    DecodingKey::from_ec_components(&URL_SAFE_NO_PAD.encode(x), &URL_SAFE_NO_PAD.encode(y))
        .map_err(|err| {
            KeyError::with_source(KeyErrorKind::InvalidKey, "cannot prepare EC public key", err)
        })
}

fn jwt_keys(kind: &KeyKind) -> Result<(DecodingKey, Option<EncodingKey>), KeyError> {
    let encoding_error = |err: String| {
        KeyError::new(
            KeyErrorKind::InvalidKey,
            format!("cannot prepare signing key: {err}"),
        )
    };

    match kind {
        KeyKind::Rsa(key) => {
            let encoding = key
                .private
                .as_ref()
                .map(|private| {
                    private
                        .to_pkcs1_der()
                        .map(|der| EncodingKey::from_rsa_der(der.as_bytes()))
                        .map_err(|err| encoding_error(err.to_string()))
                })
                .transpose()?;
            Ok((rsa_decoding_key(&key.public), encoding))
        }
        KeyKind::Ec(key) => {
            let encoding = key
                .private
                .as_ref()
                .map(|secret| {
                    secret
                        .to_pkcs8_der()
                        .map(|der| EncodingKey::from_ec_der(der.as_bytes()))
                        .map_err(|err| encoding_error(err.to_string()))
                })
                .transpose()?;
            Ok((ec_decoding_key(&key.public)?, encoding))
        }
        KeyKind::Symmetric(key) => {
            let secret = key.secret.expose_secret();
            Ok((
                DecodingKey::from_secret(secret),
                Some(EncodingKey::from_secret(secret)),
            ))
        }
        KeyKind::CertificateChain(chain) => {
            let decoding = match chain.leaf() {
                LeafKey::Rsa(public) => rsa_decoding_key(public),
                LeafKey::Ec(public) => ec_decoding_key(public)?,
            };
            Ok((decoding, None))
        }
    }
}
