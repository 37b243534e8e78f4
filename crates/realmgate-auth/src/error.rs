//! Single sign-on error types.
//!
//! Every failure of the login flow and of the role-mapping administration is
//! expressed as an [`SsoError`]. The login orchestrator is the only place that
//! turns an error into a terminal, user-visible failure page.

use std::fmt;

/// Prefix shown in front of every login failure presented to the end user.
pub const LOGIN_ERROR_PREFIX: &str = "A critical Login error has occurred. Please inform the server administrator and report this error: ";

/// Errors that can occur during a single sign-on login or its administration.
#[derive(Debug, thiserror::Error)]
pub enum SsoError {
    /// The realm configuration is incomplete or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// No realm configuration has been saved yet.
    #[error("Single sign-on is not configured.")]
    NotConfigured,

    /// A transport failure, timeout, non-success status or unparseable body
    /// while talking to the identity provider.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network failure.
        message: String,
    },

    /// The realm descriptor lacks one of its mandatory fields.
    #[error("Realm descriptor is incomplete: missing {field}")]
    DescriptorIncomplete {
        /// The missing descriptor field.
        field: &'static str,
    },

    /// The token endpoint did not answer with a usable token.
    ///
    /// `status` is `0` when no HTTP response was received at all.
    #[error("Token exchange failed with status {status}: {body}")]
    TokenExchange {
        /// HTTP status code, or `0` for transport failures.
        status: u16,
        /// Response body or transport error text.
        body: String,
    },

    /// The token is not a well-formed compact JWS.
    #[error("Malformed token: {message}")]
    MalformedToken {
        /// Description of the decoding failure.
        message: String,
    },

    /// The token header names an algorithm other than RS256.
    #[error("Unsupported token algorithm: {alg}")]
    UnsupportedAlgorithm {
        /// The algorithm found in the token header.
        alg: String,
    },

    /// The realm public key could not be parsed.
    #[error("Invalid public key: {message}")]
    InvalidKey {
        /// Description of the key parsing failure.
        message: String,
    },

    /// The token signature does not match the realm public key.
    #[error("Invalid signature.")]
    InvalidSignature,

    /// The signature could not be checked because of an internal fault.
    #[error("Signature verification failed: {message}")]
    Verification {
        /// Description of the fault.
        message: String,
    },

    /// The token has expired or carries no expiration.
    #[error("{detail}")]
    TokenExpired {
        /// Human readable reason.
        detail: &'static str,
    },

    /// The token's `session_state` differs from the callback's.
    #[error("Session state does not match.")]
    SessionMismatch,

    /// The callback issuer is not the configured realm.
    #[error("Issuer does not match.")]
    IssuerMismatch,

    /// A mandatory callback parameter is absent or blank.
    #[error("{}", missing_parameter_message(name))]
    MissingParameter {
        /// Query parameter name.
        name: &'static str,
    },

    /// A verified token lacks a claim required for reconciliation.
    #[error("Token is missing the {claim} claim.")]
    MissingClaim {
        /// Claim name.
        claim: &'static str,
    },

    /// The user directory failed.
    #[error("User directory error: {message}")]
    Directory {
        /// Description of the directory failure.
        message: String,
    },

    /// A role mapping refers to a local role that does not exist.
    #[error("Unknown local role: {role}")]
    UnknownRole {
        /// The unknown role name.
        role: String,
    },

    /// A role name is empty or too long.
    #[error("Invalid role name: {message}")]
    InvalidRoleName {
        /// Description of the problem.
        message: String,
    },

    /// No role mapping exists with the given id.
    #[error("Role mapping {id} not found")]
    RoleMappingNotFound {
        /// The requested mapping id.
        id: i64,
    },

    /// A settings or role mapping store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },
}

fn missing_parameter_message(name: &str) -> String {
    match name {
        "iss" => "No issuer received.".to_string(),
        "code" => "No authentication code received.".to_string(),
        "session_state" => "No session state received.".to_string(),
        other => format!("No {other} received."),
    }
}

impl SsoError {
    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a new `TokenExchange` error.
    #[must_use]
    pub fn token_exchange(status: u16, body: impl Into<String>) -> Self {
        Self::TokenExchange {
            status,
            body: body.into(),
        }
    }

    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported_algorithm(alg: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm { alg: alg.into() }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a new `Verification` error.
    #[must_use]
    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification {
            message: message.into(),
        }
    }

    /// Creates a `TokenExpired` error for a token past its `exp`.
    #[must_use]
    pub fn token_expired() -> Self {
        Self::TokenExpired {
            detail: "Token has expired.",
        }
    }

    /// Creates a `TokenExpired` error for a token without `exp`.
    #[must_use]
    pub fn token_without_expiry() -> Self {
        Self::TokenExpired {
            detail: "Token has no expiration date.",
        }
    }

    /// Creates a new `MissingParameter` error.
    #[must_use]
    pub fn missing_parameter(name: &'static str) -> Self {
        Self::MissingParameter { name }
    }

    /// Creates a new `MissingClaim` error.
    #[must_use]
    pub fn missing_claim(claim: &'static str) -> Self {
        Self::MissingClaim { claim }
    }

    /// Creates a new `Directory` error.
    #[must_use]
    pub fn directory(message: impl Into<String>) -> Self {
        Self::Directory {
            message: message.into(),
        }
    }

    /// Creates a new `UnknownRole` error.
    #[must_use]
    pub fn unknown_role(role: impl Into<String>) -> Self {
        Self::UnknownRole { role: role.into() }
    }

    /// Creates a new `InvalidRoleName` error.
    #[must_use]
    pub fn invalid_role_name(message: impl Into<String>) -> Self {
        Self::InvalidRoleName {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Returns `true` if a fresh realm descriptor might resolve this error,
    /// i.e. the signing key may have been rotated.
    #[must_use]
    pub fn invalidates_descriptor(&self) -> bool {
        matches!(self, Self::InvalidSignature | Self::InvalidKey { .. })
    }

    /// Returns the error category for logging and status selection.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } | Self::NotConfigured => ErrorCategory::Configuration,
            Self::Network { .. } | Self::DescriptorIncomplete { .. } => ErrorCategory::Network,
            Self::TokenExchange { .. }
            | Self::MalformedToken { .. }
            | Self::UnsupportedAlgorithm { .. }
            | Self::InvalidKey { .. }
            | Self::InvalidSignature
            | Self::Verification { .. }
            | Self::TokenExpired { .. }
            | Self::SessionMismatch
            | Self::MissingClaim { .. } => ErrorCategory::Token,
            Self::IssuerMismatch
            | Self::MissingParameter { .. }
            | Self::UnknownRole { .. }
            | Self::InvalidRoleName { .. }
            | Self::RoleMappingNotFound { .. } => ErrorCategory::Request,
            Self::Directory { .. } => ErrorCategory::Directory,
            Self::Storage { .. } => ErrorCategory::Storage,
        }
    }

    /// Short machine-readable code used in admin API responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config_error",
            Self::NotConfigured => "not_configured",
            Self::Network { .. } => "network_error",
            Self::DescriptorIncomplete { .. } => "descriptor_incomplete",
            Self::TokenExchange { .. } => "token_exchange_error",
            Self::MalformedToken { .. } => "malformed_token",
            Self::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
            Self::InvalidKey { .. } => "invalid_key",
            Self::InvalidSignature => "invalid_signature",
            Self::Verification { .. } => "verification_error",
            Self::TokenExpired { .. } => "token_expired",
            Self::SessionMismatch => "session_mismatch",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::MissingParameter { .. } => "missing_parameter",
            Self::MissingClaim { .. } => "missing_claim",
            Self::Directory { .. } => "directory_error",
            Self::UnknownRole { .. } => "unknown_role",
            Self::InvalidRoleName { .. } => "invalid_role_name",
            Self::RoleMappingNotFound { .. } => "not_found",
            Self::Storage { .. } => "storage_error",
        }
    }

    /// The message shown to the end user when a login aborts.
    #[must_use]
    pub fn user_message(&self) -> String {
        format!("{LOGIN_ERROR_PREFIX}{self}")
    }
}

/// Categories of single sign-on errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or invalid realm configuration.
    Configuration,
    /// Identity provider unreachable or answering garbage.
    Network,
    /// Token exchange, decoding, signature or claim failures.
    Token,
    /// Bad input from the browser or admin client.
    Request,
    /// Local user directory failures.
    Directory,
    /// Settings or role mapping persistence failures.
    Storage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Network => write!(f, "network"),
            Self::Token => write!(f, "token"),
            Self::Request => write!(f, "request"),
            Self::Directory => write!(f, "directory"),
            Self::Storage => write!(f, "storage"),
        }
    }
}
