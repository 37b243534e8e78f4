//! Local credential generation and hashing.
//!
//! Users provisioned from the realm never log in with a local password, but
//! the directory still needs one. A fresh random password is generated on
//! every reconciliation and only its Argon2id hash is stored.
//!
//! # Example
//!
//! ```
//! use realmgate_auth::credentials::{generate_password, hash_password, verify_password};
//!
//! let password = generate_password();
//! let hash = hash_password(&password).unwrap();
//! assert!(verify_password(&password, &hash).unwrap());
//! ```

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of generated local passwords.
pub const PASSWORD_LENGTH: usize = 32;

/// Generates a random alphanumeric password.
#[must_use]
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Generates an opaque 256-bit session token, base64url encoded.
#[must_use]
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hashes a password with Argon2id into PHC string format.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Checks a password against a stored PHC hash.
///
/// # Errors
///
/// Returns `Err` only if the stored hash is not a valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}
