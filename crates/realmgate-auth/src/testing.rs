//! Shared fixtures for unit tests.

use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// An RSA key pair in the shapes the realm and the tests need.
pub(crate) struct TestKey {
    private_key: RsaPrivateKey,
    /// Public key as published by a realm: bare base64 DER.
    pub public_key_b64: String,
    /// PKCS#8 PEM private key, for signing with jsonwebtoken.
    pub private_pem: String,
}

impl TestKey {
    fn generate() -> Self {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let der = private_key.to_public_key().to_public_key_der().unwrap();
        let private_pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        Self {
            public_key_b64: STANDARD.encode(der.as_bytes()),
            private_pem,
            private_key,
        }
    }

    /// Signs `payload` under an arbitrary `header` with RS256.
    pub fn sign(&self, header: &Value, payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap());
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        let signing_input = format!("{header}.{payload}");
        let digest = Sha256::digest(signing_input.as_bytes());
        let signature = self
            .private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .unwrap();
        format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
    }

    /// Signs `payload` with a standard RS256 header.
    pub fn token(&self, payload: &Value) -> String {
        self.sign(&json!({"alg": "RS256", "typ": "JWT", "kid": "test"}), payload)
    }
}

/// The realm signing key used across tests.
pub(crate) fn test_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(TestKey::generate)
}

/// A second, unrelated key.
pub(crate) fn other_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(TestKey::generate)
}

pub(crate) fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Typical Keycloak access token payload.
pub(crate) fn keycloak_claims(sub: &str, email: &str, session_state: &str, roles: &[&str]) -> Value {
    json!({
        "exp": unix_now() + 300,
        "iat": unix_now(),
        "sub": sub,
        "typ": "Bearer",
        "azp": "intranet",
        "session_state": session_state,
        "email": email,
        "preferred_username": email.split('@').next().unwrap_or(email),
        "given_name": "Ada",
        "family_name": "Lovelace",
        "realm_access": {"roles": roles}
    })
}
