//! `x5c` certificate chain evaluation
//!
//! Only the validity window of every certificate and the integrity of each
//! immediate issuer link are checked. There is no trust anchor and no
//! revocation lookup.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rsa::{BigUint, RsaPublicKey};
use x509_parser::certificate::X509Certificate;
use x509_parser::public_key::PublicKey;

use crate::error::{CertificateValidityError, KeyError, KeyErrorKind};

/// Public key carried by the leaf certificate
#[derive(Debug, Clone)]
pub enum LeafKey {
    /// RSA subject public key
    Rsa(RsaPublicKey),
    /// P-256 subject public key
    Ec(p256::PublicKey),
}

/// Key extracted from a validated certificate chain
#[derive(Debug, Clone)]
pub struct CertificateChainKey {
    leaf: LeafKey,
    subject: String,
    not_after: i64,
    chain_len: usize,
}

impl CertificateChainKey {
    /// Leaf subject public key
    pub fn leaf(&self) -> &LeafKey {
        &self.leaf
    }

    /// Leaf subject distinguished name
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Leaf `notAfter` as unix seconds
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    /// Number of certificates in the chain, leaf included
    pub fn chain_len(&self) -> usize {
        self.chain_len
    }
}

/// Decode and evaluate a chain at `now` (unix seconds)
pub(crate) fn parse_chain(chain: &[String], now: i64) -> Result<CertificateChainKey, KeyError> {
    let ders = chain
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            STANDARD.decode(entry.trim()).map_err(|e| {
                KeyError::with_source(
                    KeyErrorKind::InvalidEncoding,
                    format!("x5c[{i}] is not valid base64"),
                    e,
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let certs = ders
        .iter()
        .enumerate()
        .map(|(i, der)| {
            x509_parser::parse_x509_certificate(der)
                .map(|(_, cert)| cert)
                .map_err(|e| {
                    KeyError::new(
                        KeyErrorKind::InvalidCertificate,
                        format!("x5c[{i}] is not a DER certificate: {e}"),
                    )
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let Some(leaf) = certs.first() else {
        return Err(KeyError::new(
            KeyErrorKind::MissingParameter,
            "x5c must contain at least one certificate",
        ));
    };

    for (i, cert) in certs.iter().enumerate() {
        check_validity(i, cert, now)?;
    }

    for (i, pair) in certs.windows(2).enumerate() {
        let (child, issuer) = (&pair[0], &pair[1]);
        if child.issuer().as_raw() != issuer.subject().as_raw() {
            return Err(KeyError::new(
                KeyErrorKind::BrokenChain,
                format!(
                    "x5c[{i}] issuer `{}` does not match x5c[{}] subject `{}`",
                    child.issuer(),
                    i + 1,
                    issuer.subject()
                ),
            ));
        }
        child
            .verify_signature(Some(issuer.public_key()))
            .map_err(|e| {
                KeyError::with_source(
                    KeyErrorKind::BrokenChain,
                    format!("x5c[{i}] signature does not verify with x5c[{}]", i + 1),
                    e,
                )
            })?;
    }

    Ok(CertificateChainKey {
        leaf: leaf_key(leaf)?,
        subject: leaf.subject().to_string(),
        not_after: leaf.validity().not_after.timestamp(),
        chain_len: certs.len(),
    })
}

fn check_validity(index: usize, cert: &X509Certificate<'_>, now: i64) -> Result<(), KeyError> {
    let validity = cert.validity();
    let not_before = validity.not_before.timestamp();
    let not_after = validity.not_after.timestamp();
    let subject = cert.subject().to_string();

    if now > not_after {
        return Err(KeyError::with_source(
            KeyErrorKind::CertificateExpired,
            format!("x5c[{index}] has expired"),
            CertificateValidityError::Expired {
                subject,
                not_after,
                now,
            },
        ));
    }
    if now < not_before {
        return Err(KeyError::with_source(
            KeyErrorKind::CertificateNotYetValid,
            format!("x5c[{index}] is not yet valid"),
            CertificateValidityError::NotYetValid {
                subject,
                not_before,
                now,
            },
        ));
    }
    Ok(())
}

fn leaf_key(cert: &X509Certificate<'_>) -> Result<LeafKey, KeyError> {
    let parsed = cert.public_key().parsed().map_err(|e| {
        KeyError::with_source(
            KeyErrorKind::InvalidCertificate,
            "leaf certificate public key cannot be parsed",
            e,
        )
    })?;

    match parsed {
        PublicKey::RSA(rsa) => {
            let n = BigUint::from_bytes_be(rsa.modulus);
            let e = BigUint::from_bytes_be(rsa.exponent);
            RsaPublicKey::new(n, e).map(LeafKey::Rsa).map_err(|e| {
                KeyError::with_source(
                    KeyErrorKind::InvalidKey,
                    "leaf certificate RSA key is invalid",
                    e,
                )
            })
        }
        PublicKey::EC(point) => p256::PublicKey::from_sec1_bytes(point.data())
            .map(LeafKey::Ec)
            .map_err(|_| {
                KeyError::new(
                    KeyErrorKind::UnsupportedCurve,
                    "leaf certificate EC key is not on curve P-256",
                )
            }),
        _ => Err(KeyError::new(
            KeyErrorKind::UnsupportedKeyType,
            "leaf certificate key is neither RSA nor EC",
        )),
    }
}
