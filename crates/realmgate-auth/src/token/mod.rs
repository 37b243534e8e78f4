//! Authorization code redemption and identity token verification.
//!
//! - [`exchange`] - Redeems the callback code at the realm token endpoint
//! - [`verifier`] - Checks the RS256 signature, expiry and session of a token
//! - [`claims`] - Typed access to the verified payload

pub mod claims;
pub mod exchange;
pub mod verifier;

pub use claims::VerifiedClaims;
pub use exchange::{CodeExchanger, TokenExchanger};
pub use verifier::{SUPPORTED_ALGORITHM, parse_public_key, public_key_pem, verify, verify_at};
