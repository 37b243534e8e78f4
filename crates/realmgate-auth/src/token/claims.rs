//! Claims of a verified identity token.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The full payload of a token whose signature, expiry and session have been
/// checked.
///
/// Only [`crate::token::verifier`] produces values of this type, so holding
/// one means the token was verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerifiedClaims(Map<String, Value>);

impl VerifiedClaims {
    pub(crate) fn from_map(payload: Map<String, Value>) -> Self {
        Self(payload)
    }

    /// Returns a string claim, if present and a string.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Returns a raw claim.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// `sub`, the subject identifier at the identity provider.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.string("sub")
    }

    /// `email`
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.string("email")
    }

    /// `preferred_username`
    #[must_use]
    pub fn preferred_username(&self) -> Option<&str> {
        self.string("preferred_username")
    }

    /// `given_name`
    #[must_use]
    pub fn given_name(&self) -> Option<&str> {
        self.string("given_name")
    }

    /// `family_name`
    #[must_use]
    pub fn family_name(&self) -> Option<&str> {
        self.string("family_name")
    }

    /// `session_state`
    #[must_use]
    pub fn session_state(&self) -> Option<&str> {
        self.string("session_state")
    }

    /// `exp` in seconds since the epoch.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        numeric_date(self.0.get("exp")?)
    }

    /// `realm_access.roles` in claim order. Non-string entries are skipped.
    #[must_use]
    pub fn realm_roles(&self) -> Vec<&str> {
        self.0
            .get("realm_access")
            .and_then(|access| access.get("roles"))
            .and_then(Value::as_array)
            .map(|roles| roles.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Consumes the claims, returning the payload.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Reads a JWT NumericDate, accepting integral and fractional seconds.
pub(crate) fn numeric_date(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs.floor() as i64))
}
