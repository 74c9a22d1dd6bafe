//! Shared fixtures for turbomcp-jose integration tests

#![allow(dead_code)]

use std::sync::OnceLock;

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use turbomcp_jose::Jwk;

/// RFC 7517 Appendix A.2 RSA private key, full CRT parameter set
pub fn rfc_rsa_private_jwk() -> Jwk {
    serde_json::from_value(serde_json::json!({
        "kty": "RSA",
        "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
        "e": "AQAB",
        "d": "X4cTteJY_gn4FYPsXB8rdXix5vwsg1FLN5E3EaG6RJoVH-HLLKD9M7dx5oo7GURknchnrRweUkC7hT5fJLM0WbFAKNLWY2vv7B6NqXSzUvxT0_YSfqijwp3RTzlBaCxWp4doFk5N2o8Gy_nHNKroADIkJ46pRUohsXywbReAdYaMwFs9tv8d_cPVY3i07a3t8MN6TNwm0dSawm9v47UiCl3Sk5ZiG7xojPLu4sbg1U2jx4IBTNBznbJSzFHK66jT8bgkuqsk0GjskDJk19Z4qwjwbsnn4j2WBii3RL-Us2lGVkY8fkFzme1z0HbIkfz0Y6mqnOYtqc0X4jfcKoAC8Q",
        "p": "83i-7IvMGXoMXCskv73TKr8637FiO7Z27zv8oj6pbWUQyLPQBQxtPVnwD20R-60eTDmD2ujnMt5PoqMrm8RfmNhVWDtjjMmCMjOpSXicFHj7XOuVIYQyqVWlWEh6dN36GVZYk93N8Bc9vY41xy8B9RzzOGVQzXvNEvn7O0nVbfs",
        "q": "3dfOR9cuYq-0S-mkFLzgItgMEfFzB2q3hWehMuG0oCuqnb3vobLyumqjVZQO1dIrdwgTnCdpYzBcOfW5r370AFXjiWft_NGEiovonizhKpo9VVS78TzFgxkIdrecRezsZ-1kYd_s1qDbxtkDEgfAITAG9LUnADun4vIcb6yelxk",
        "dp": "G4sPXkc6Ya9y8oJW9_ILj4xuppu0lzi_H7VTkS8xj5SdX3coE0oimYwxIi2emTAue0UOa5dpgFGyBJ4c8tQ2VF402XRugKDTP8akYhFo5tAA77Qe_NmtuYZc3C3m3I24G2GvR5sSDxUyAN2zq8Lfn9EUms6rY3Ob8YeiKkTiBj0",
        "dq": "s9lAH9fggBsoFR8Oac2R_E2gw282rT2kGOAhvIllETE1efrA6huUUvMfBcMpn8lqeW6vzznYY5SSQF7pMdC_agI3nG8Ibp1BUb0JUiraRNqUfLhcQb_d9GF4Dh7e74WbRsobRonujTYN1xCaP6TO61jvWrX-L18txXw494Q_cgk",
        "qi": "GyM_p6JrXySiz1toFgKbWV-JdI3jQ4ypu9rbMWx3rQJBfmt0FoYzgUIZEVFEcOqwemRN81zoDAaa-Bk0KWNGDjJHZDdDmFhW3AN7lI-puxk_mHZGJ11rxyR8O55XLSe3SPmRfKwZI6yU24ZxvQKFYItdldUKGzO6Ia6zTKhAVRU",
        "alg": "RS256",
        "kid": "2011-04-29"
    }))
    .unwrap()
}

/// RFC 7517 Appendix A.2 P-256 private key
pub fn rfc_ec_private_jwk() -> Jwk {
    serde_json::from_value(serde_json::json!({
        "kty": "EC",
        "crv": "P-256",
        "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
        "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM",
        "d": "870MB6gfuTJ4HtUnUvYMyJpr5eUZNP4Bk43bVdj3eAE",
        "kid": "1"
    }))
    .unwrap()
}

/// Strip every private member from a JWK
pub fn public_only(jwk: &Jwk) -> Jwk {
    Jwk {
        d: None,
        p: None,
        q: None,
        dp: None,
        dq: None,
        qi: None,
        k: None,
        ..jwk.clone()
    }
}

fn generated_rsa() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("RSA key generation")
    })
}

/// Freshly generated RSA key with `n`, `e` and `d` only (no CRT members)
pub fn generated_rsa_jwk(kid: &str) -> Jwk {
    let key = generated_rsa();
    Jwk {
        kty: Some("RSA".into()),
        kid: Some(kid.into()),
        n: Some(URL_SAFE_NO_PAD.encode(key.n().to_bytes_be())),
        e: Some(URL_SAFE_NO_PAD.encode(key.e().to_bytes_be())),
        d: Some(URL_SAFE_NO_PAD.encode(key.d().to_bytes_be())),
        ..Default::default()
    }
}

/// Freshly generated P-256 key as a private JWK
pub fn generated_ec_jwk(kid: &str) -> (Jwk, p256::SecretKey) {
    let secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
    (ec_jwk_from_secret(&secret, kid), secret)
}

/// Private JWK for an existing P-256 secret
pub fn ec_jwk_from_secret(secret: &p256::SecretKey, kid: &str) -> Jwk {
    let point = secret.public_key().to_encoded_point(false);
    Jwk {
        kty: Some("EC".into()),
        crv: Some("P-256".into()),
        kid: Some(kid.into()),
        x: point.x().map(|x| URL_SAFE_NO_PAD.encode(x)),
        y: point.y().map(|y| URL_SAFE_NO_PAD.encode(y)),
        d: Some(URL_SAFE_NO_PAD.encode(secret.to_bytes())),
        ..Default::default()
    }
}

/// Symmetric JWK
pub fn oct_jwk(kid: &str, secret: &[u8], alg: Option<&str>) -> Jwk {
    Jwk {
        kty: Some("oct".into()),
        kid: Some(kid.into()),
        alg: alg.map(Into::into),
        k: Some(URL_SAFE_NO_PAD.encode(secret)),
        ..Default::default()
    }
}

/// rcgen key pair backed by the given P-256 secret
pub fn rcgen_key_pair(secret: &p256::SecretKey) -> rcgen::KeyPair {
    let der = secret.to_pkcs8_der().expect("pkcs8 encoding");
    rcgen::KeyPair::try_from(der.as_bytes()).expect("rcgen key pair")
}

/// Self-signed certificate valid between the given years
pub fn self_signed(
    key_pair: &rcgen::KeyPair,
    not_before_year: i32,
    not_after_year: i32,
) -> rcgen::Certificate {
    let mut params = rcgen::CertificateParams::new(vec!["auth.example.com".to_string()])
        .expect("certificate params");
    params.not_before = rcgen::date_time_ymd(not_before_year, 1, 1);
    params.not_after = rcgen::date_time_ymd(not_after_year, 1, 1);
    params.self_signed(key_pair).expect("self-signed certificate")
}

/// CA certificate and key pair
pub fn certificate_authority(name: &str) -> (rcgen::Certificate, rcgen::KeyPair) {
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).expect("ca params");
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, name);
    let key_pair = rcgen::KeyPair::generate().expect("ca key");
    let cert = params.self_signed(&key_pair).expect("ca certificate");
    (cert, key_pair)
}

/// Leaf certificate issued by `ca`
pub fn issued_by(
    leaf_key: &rcgen::KeyPair,
    ca: &rcgen::Certificate,
    ca_key: &rcgen::KeyPair,
) -> rcgen::Certificate {
    let params = rcgen::CertificateParams::new(vec!["leaf.example.com".to_string()])
        .expect("leaf params");
    params.signed_by(leaf_key, ca, ca_key).expect("leaf certificate")
}

/// Standard base64 of a certificate's DER, as it appears in `x5c`
pub fn x5c_entry(cert: &rcgen::Certificate) -> String {
    STANDARD.encode(cert.der())
}

/// JWK carrying only an `x5c` chain
pub fn x5c_jwk(chain: Vec<String>, alg: Option<&str>) -> Jwk {
    Jwk {
        kid: Some("cert".into()),
        alg: alg.map(Into::into),
        key_use: Some("sig".into()),
        x5c: Some(chain),
        ..Default::default()
    }
}
