//! # realmgate-auth
//!
//! Keycloak single sign-on for a site with its own user directory.
//!
//! This crate provides:
//! - Realm metadata discovery and caching
//! - Authorization code exchange at the realm token endpoint
//! - RS256 identity token verification
//! - Reconciliation of realm identities with local user records
//! - Mapping of realm roles onto local roles
//! - Axum handlers for the login callback and an admin API
//!
//! ## Overview
//!
//! The browser returns from the realm to `GET /sso/login` with `iss`, `code`
//! and `session_state`. The [`LoginOrchestrator`] checks the issuer against
//! the saved realm settings, redeems the code, verifies the token against the
//! realm's public key, finds or creates the matching local user, applies role
//! mappings and starts a local session. Any failure aborts the login with an
//! [`SsoError`].
//!
//! ## Modules
//!
//! - [`config`] - Public URLs, timeouts, cookie and admin settings
//! - [`realm`] - Realm settings and metadata descriptor
//! - [`token`] - Code exchange and token verification
//! - [`reconcile`] - Local user reconciliation
//! - [`roles`] - Role mapping
//! - [`login`] - The login flow
//! - [`storage`] - Storage traits and in-memory backends
//! - [`http`] - Axum HTTP handlers

pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod login;
pub mod realm;
pub mod reconcile;
pub mod roles;
pub mod storage;
pub mod token;

#[cfg(test)]
mod testing;

pub use config::{CALLBACK_PATH, ConfigError, CookieConfig, SsoConfig};
pub use error::{ErrorCategory, LOGIN_ERROR_PREFIX, SsoError};
pub use http::{SsoState, sso_router};
pub use login::{CallbackParams, LoginOrchestrator, LoginOutcome, LoginState};
pub use realm::{
    DescriptorCache, DescriptorSource, MASKED_SECRET, RealmConfig, RealmDescriptor,
    RealmDescriptorFetcher,
};
pub use reconcile::{IdentityReconciler, ReconcileAction, ReconcileOutcome};
pub use roles::{RoleMapper, add_mapping, delete_mapping};
pub use storage::{
    LocalUser, LoginSession, MemoryRoleMappingStore, MemorySettingsStore, MemoryUserDirectory,
    RoleMapping, RoleMappingStore, SettingsStore, UserDirectory, UserFields, load_realm,
    save_realm,
};
pub use token::{CodeExchanger, TokenExchanger, VerifiedClaims};

/// Type alias for single sign-on results.
pub type SsoResult<T> = Result<T, SsoError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use realmgate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::SsoResult;
    pub use crate::config::{ConfigError, SsoConfig};
    pub use crate::error::{ErrorCategory, SsoError};
    pub use crate::http::{SsoState, sso_router};
    pub use crate::login::{CallbackParams, LoginOrchestrator, LoginOutcome};
    pub use crate::realm::RealmConfig;
    pub use crate::storage::{RoleMapping, RoleMappingStore, SettingsStore, UserDirectory};
}
