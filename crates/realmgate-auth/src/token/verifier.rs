//! Identity token verification.
//!
//! Tokens are compact JWS values signed by the realm with RS256. The realm
//! publishes its key as bare base64 DER, which is wrapped into a PEM
//! `PUBLIC KEY` block before parsing.
//!
//! Verification order matters: the header algorithm is checked before any
//! signature work, and claims are only inspected once the signature holds.
//! There is no clock leeway and no audience or issuer claim check; the issuer
//! is compared against the callback parameter by the login orchestrator.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::claims::{VerifiedClaims, numeric_date};
use crate::{SsoError, SsoResult};

/// The only accepted signing algorithm.
pub const SUPPORTED_ALGORITHM: &str = "RS256";

const PEM_LINE_LENGTH: usize = 64;

/// URL-safe base64 that accepts both padded and unpadded input.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Deserialize)]
struct JwsHeader {
    #[serde(default)]
    alg: Option<Value>,
}

/// Verifies `token` against the realm key at the current time.
///
/// # Errors
///
/// See [`verify_at`].
pub fn verify(token: &str, public_key: &str, expected_session: &str) -> SsoResult<VerifiedClaims> {
    verify_at(
        token,
        public_key,
        expected_session,
        OffsetDateTime::now_utc().unix_timestamp(),
    )
}

/// Verifies `token` as of `now` (seconds since the epoch).
///
/// # Errors
///
/// - `MalformedToken` if the token is not three base64url JSON segments, or
///   the signature segment does not decode
/// - `UnsupportedAlgorithm` if the header algorithm is not RS256
/// - `InvalidKey` if the realm key does not parse
/// - `InvalidSignature` if the signature does not match
/// - `Verification` on any other failure of the RSA primitive
/// - `TokenExpired` if `exp` is absent or earlier than `now`
/// - `SessionMismatch` if `session_state` is absent or differs
pub fn verify_at(
    token: &str,
    public_key: &str,
    expected_session: &str,
    now: i64,
) -> SsoResult<VerifiedClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header_b64, payload_b64, signature_b64] = segments.as_slice() else {
        return Err(SsoError::malformed_token(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let header: JwsHeader = decode_segment(header_b64, "header")?;
    let payload: Map<String, Value> = decode_segment(payload_b64, "payload")?;

    match header.alg {
        Some(Value::String(ref alg)) if alg == SUPPORTED_ALGORITHM => {}
        Some(Value::String(alg)) => return Err(SsoError::unsupported_algorithm(alg)),
        Some(other) => return Err(SsoError::unsupported_algorithm(other.to_string())),
        None => return Err(SsoError::unsupported_algorithm("none")),
    }

    let key = parse_public_key(public_key)?;
    let signature = BASE64_URL
        .decode(signature_b64)
        .map_err(|e| SsoError::malformed_token(format!("signature is not base64url: {e}")))?;
    verify_signature(
        &key,
        format!("{header_b64}.{payload_b64}").as_bytes(),
        &signature,
    )?;

    check_expiry(&payload, now)?;
    check_session(&payload, expected_session)?;

    Ok(VerifiedClaims::from_map(payload))
}

fn decode_segment<T: DeserializeOwned>(segment: &str, name: &str) -> SsoResult<T> {
    let bytes = BASE64_URL
        .decode(segment)
        .map_err(|e| SsoError::malformed_token(format!("{name} is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SsoError::malformed_token(format!("{name} is not a JSON object: {e}")))
}

/// Wraps a bare base64 key body into a PEM `PUBLIC KEY` block.
///
/// Whitespace is removed and the body is split into 64-character lines.
/// Input that already carries PEM armor is returned trimmed.
#[must_use]
pub fn public_key_pem(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("-----BEGIN") {
        return trimmed.to_string();
    }

    let body: Vec<char> = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    let lines: Vec<String> = body
        .chunks(PEM_LINE_LENGTH)
        .map(|line| line.iter().collect())
        .collect();
    format!(
        "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----\n",
        lines.join("\n")
    )
}

/// Parses the realm key, bare or PEM-armored.
///
/// # Errors
///
/// Returns `InvalidKey` if the key is empty or not an RSA public key.
pub fn parse_public_key(raw: &str) -> SsoResult<RsaPublicKey> {
    if raw.trim().is_empty() {
        return Err(SsoError::invalid_key("public key is empty"));
    }
    let pem = public_key_pem(raw);
    let parsed = if pem.starts_with("-----BEGIN RSA PUBLIC KEY-----") {
        RsaPublicKey::from_pkcs1_pem(&pem).map_err(|e| e.to_string())
    } else {
        RsaPublicKey::from_public_key_pem(&pem).map_err(|e| e.to_string())
    };
    parsed.map_err(SsoError::invalid_key)
}

fn verify_signature(key: &RsaPublicKey, signing_input: &[u8], signature: &[u8]) -> SsoResult<()> {
    let digest = Sha256::digest(signing_input);
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .map_err(|e| match e {
            rsa::Error::Verification => SsoError::InvalidSignature,
            other => SsoError::verification(other.to_string()),
        })
}

fn check_expiry(payload: &Map<String, Value>, now: i64) -> SsoResult<()> {
    let exp = payload
        .get("exp")
        .and_then(numeric_date)
        .ok_or_else(SsoError::token_without_expiry)?;
    if exp < now {
        return Err(SsoError::token_expired());
    }
    Ok(())
}

fn check_session(payload: &Map<String, Value>, expected: &str) -> SsoResult<()> {
    match payload.get("session_state").and_then(Value::as_str) {
        Some(session) if session == expected => Ok(()),
        _ => Err(SsoError::SessionMismatch),
    }
}
