//! User directory trait.
//!
//! The directory owns local user records, their roles and their login
//! sessions. The login flow only reaches it through this interface.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::SsoResult;

/// A local user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    /// Directory identifier.
    pub id: String,
    /// Login name.
    pub login: String,
    /// Email address, unique within the directory.
    pub email: String,
    /// First name.
    pub given_name: String,
    /// Last name.
    pub family_name: String,
    /// Realm subject this record was provisioned from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_subject: Option<String>,
}

/// Profile fields written on create and update.
#[derive(Clone, PartialEq, Eq)]
pub struct UserFields {
    /// Login name.
    pub login: String,
    /// Email address.
    pub email: String,
    /// First name.
    pub given_name: String,
    /// Last name.
    pub family_name: String,
    /// Plaintext password. Directories store a hash only.
    pub password: String,
}

impl fmt::Debug for UserFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFields")
            .field("login", &self.login)
            .field("email", &self.email)
            .field("given_name", &self.given_name)
            .field("family_name", &self.family_name)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// An established local login session.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginSession {
    /// Opaque session token, carried in the session cookie.
    pub token: String,
    /// The logged-in user.
    pub user_id: String,
    /// When the session stops being valid.
    pub expires_at: OffsetDateTime,
}

impl fmt::Debug for LoginSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSession")
            .field("token", &"[redacted]")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Local user store.
///
/// Every failure is reported as `SsoError::Directory`.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds a user by email address.
    async fn find_by_email(&self, email: &str) -> SsoResult<Option<LocalUser>>;

    /// Finds a user by id.
    async fn find_by_id(&self, user_id: &str) -> SsoResult<Option<LocalUser>>;

    /// Creates a user and returns its new id.
    async fn create(&self, fields: &UserFields) -> SsoResult<String>;

    /// Overwrites the profile fields and password of a user.
    async fn update(&self, user_id: &str, fields: &UserFields) -> SsoResult<()>;

    /// Deletes a user together with its roles and sessions.
    async fn delete(&self, user_id: &str) -> SsoResult<()>;

    /// Returns the realm subject stored on a user, if any.
    async fn get_external_marker(&self, user_id: &str) -> SsoResult<Option<String>>;

    /// Stores the realm subject on a user.
    async fn set_external_marker(&self, user_id: &str, subject: &str) -> SsoResult<()>;

    /// Lists the local roles currently held by a user.
    async fn list_local_roles(&self, user_id: &str) -> SsoResult<Vec<String>>;

    /// Grants a local role. Granting a held role is a no-op.
    async fn grant_role(&self, user_id: &str, role: &str) -> SsoResult<()>;

    /// Revokes a local role. Revoking a role not held is a no-op.
    async fn revoke_role(&self, user_id: &str, role: &str) -> SsoResult<()>;

    /// Lists the local role registry, i.e. every role that may be granted.
    async fn available_roles(&self) -> SsoResult<Vec<String>>;

    /// Starts a login session for a user.
    async fn establish_session(&self, user_id: &str, ttl: Duration) -> SsoResult<LoginSession>;

    /// Ends a login session. Unknown tokens are ignored.
    async fn end_session(&self, token: &str) -> SsoResult<()>;
}
