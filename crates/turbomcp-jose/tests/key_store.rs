//! Decode-and-verify behavior of the key store

mod common;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use common::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use turbomcp_jose::{
    Algorithm, ClaimError, JoseError, JwkSet, KeyMaterial, KeyStore, encode, peek_header,
};

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn store_with(jwks: &[turbomcp_jose::Jwk]) -> KeyStore {
    let mut store = KeyStore::new();
    for jwk in jwks {
        store.add_jwk(jwk).unwrap();
    }
    store
}

#[test]
fn test_round_trip_reproduces_claims() {
    let claims = json!({
        "sub": "alice",
        "scope": "read write",
        "exp": now() + 300,
        "nested": {"roles": ["admin"]}
    });

    for (jwk, alg) in [
        (oct_jwk("k1", b"round-trip-secret-material-0001", Some("HS256")), Algorithm::HS256),
        (rfc_rsa_private_jwk(), Algorithm::RS256),
        (generated_ec_jwk("ec").0, Algorithm::ES256),
    ] {
        let key = KeyMaterial::from_jwk(&jwk).unwrap();
        let token = encode(&key, alg, &claims).unwrap();

        let store = store_with(&[jwk]);
        let decoded = store.decode_and_verify(&token).unwrap();

        assert_eq!(Value::Object(decoded.claims().clone()), claims);
        assert_eq!(decoded.algorithm(), alg);
        assert_eq!(decoded.verified_with(), key.kid());
    }
}

#[test]
fn test_header_carries_alg_and_kid() {
    let key = KeyMaterial::from_jwk(&oct_jwk("k1", b"header-secret", None)).unwrap();
    let token = encode(&key, Algorithm::HS384, &json!({})).unwrap();
    let header = peek_header(&token).unwrap();
    assert_eq!(header.alg, "HS384");
    assert_eq!(header.kid.as_deref(), Some("k1"));
    assert_eq!(header.typ.as_deref(), Some("JWT"));
}

#[test]
fn test_public_half_verifies_token_signed_by_private_half() {
    let private = rfc_rsa_private_jwk();
    let token = encode(
        &KeyMaterial::from_jwk(&private).unwrap(),
        Algorithm::RS256,
        &json!({"sub": "bob"}),
    )
    .unwrap();

    let store = store_with(&[public_only(&private)]);
    assert_eq!(
        store.decode_and_verify(&token).unwrap().claim("sub"),
        Some(&json!("bob"))
    );
}

#[test]
fn test_unknown_key() {
    let signer = KeyMaterial::from_jwk(&oct_jwk("k1", b"signing-secret", Some("HS256"))).unwrap();
    let token = encode(&signer, Algorithm::HS256, &json!({"sub": "x"})).unwrap();

    // Same algorithm, different kid
    let store = store_with(&[oct_jwk("k2", b"signing-secret", Some("HS256"))]);
    assert!(matches!(
        store.decode_and_verify(&token),
        Err(JoseError::UnknownKey { kid: Some(kid), .. }) if kid == "k1"
    ));

    // No key for the algorithm at all
    let store = store_with(&[rfc_rsa_private_jwk()]);
    assert!(matches!(
        store.decode_and_verify(&token),
        Err(JoseError::UnknownKey { .. })
    ));

    assert!(matches!(
        KeyStore::new().decode_and_verify(&token),
        Err(JoseError::UnknownKey { .. })
    ));
}

#[test]
fn test_tampered_payload_and_signature() {
    let jwk = oct_jwk("k1", b"tamper-secret", Some("HS256"));
    let key = KeyMaterial::from_jwk(&jwk).unwrap();
    let store = store_with(&[jwk]);
    let token = encode(&key, Algorithm::HS256, &json!({"sub": "alice", "admin": false})).unwrap();
    let parts: Vec<&str> = token.split('.').collect();

    let forged_payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"alice","admin":true}"#);
    let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
    assert!(matches!(
        store.decode_and_verify(&tampered),
        Err(JoseError::SignatureInvalid)
    ));

    let forged_signature = URL_SAFE_NO_PAD.encode([0u8; 32]);
    let tampered = format!("{}.{}.{}", parts[0], parts[1], forged_signature);
    assert!(matches!(
        store.decode_and_verify(&tampered),
        Err(JoseError::SignatureInvalid)
    ));
}

#[test]
fn test_wrong_secret_same_kid() {
    let signer = KeyMaterial::from_jwk(&oct_jwk("k1", b"real-secret", Some("HS256"))).unwrap();
    let token = encode(&signer, Algorithm::HS256, &json!({})).unwrap();
    let store = store_with(&[oct_jwk("k1", b"other-secret", Some("HS256"))]);
    assert!(matches!(
        store.decode_and_verify(&token),
        Err(JoseError::SignatureInvalid)
    ));
}

#[test]
fn test_temporal_claims() {
    let jwk = oct_jwk("k1", b"claims-secret", Some("HS256"));
    let key = KeyMaterial::from_jwk(&jwk).unwrap();
    let store = store_with(&[jwk]);

    let expired = encode(&key, Algorithm::HS256, &json!({"exp": now() - 60})).unwrap();
    let err = store.decode_and_verify(&expired).unwrap_err();
    assert!(matches!(err, JoseError::ClaimInvalid(ClaimError::Expired { .. })));
    assert!(err.is_expired());

    // Signature alone is still fine
    assert!(store.verify_signature(&expired).is_ok());

    let early = encode(&key, Algorithm::HS256, &json!({"nbf": now() + 600})).unwrap();
    assert!(matches!(
        store.decode_and_verify(&early),
        Err(JoseError::ClaimInvalid(ClaimError::NotYetValid { .. }))
    ));

    let lenient = store.clone().with_leeway(120);
    assert!(lenient.decode_and_verify(&expired).is_ok());
}

#[test]
fn test_malformed_tokens() {
    let store = store_with(&[oct_jwk("k1", b"secret", None)]);
    for token in ["", "abc", "a.b", "a.b.c.d", "!!!.e30.", "e30.!!!."] {
        assert!(
            matches!(store.decode_and_verify(token), Err(JoseError::MalformedToken(_))),
            "{token:?}"
        );
    }
}

#[test]
fn test_store_from_set_single_symmetric_key() {
    let set: JwkSet = serde_json::from_value(json!({
        "keys": [{
            "kty": "oct",
            "k": URL_SAFE_NO_PAD.encode(b"k1-secret"),
            "alg": "HS256",
            "kid": "k1"
        }]
    }))
    .unwrap();

    let (store, skipped) = KeyStore::from_jwk_set(&set);

    assert!(skipped.is_empty());
    assert_eq!(store.len(), 1);
    assert!(!store.is_unsecure());
    assert!(store.contains_kid("k1"));
}
