//! Identity reconciliation.
//!
//! Maps a verified token onto a local user record. Users are matched by
//! email; the realm subject stored on the record decides whether the match
//! is the same person:
//!
//! | Local user by email | Stored subject  | Action                         |
//! |---------------------|-----------------|--------------------------------|
//! | none                | -               | create, store subject          |
//! | found               | equals `sub`    | update profile and password    |
//! | found               | absent or other | delete, create, store subject  |
//!
//! The delete-then-create order of the last case means a failed create leaves
//! no local account behind. That failure is logged at error level and the
//! returned error names the deleted account.

use std::fmt;
use std::sync::Arc;

use crate::credentials::generate_password;
use crate::storage::{UserDirectory, UserFields};
use crate::token::VerifiedClaims;
use crate::{SsoError, SsoResult};

/// What reconciliation did to the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// No user had the token's email; a new one was created.
    Created,
    /// A user with the email belonged to another realm subject; it was
    /// deleted and a new one created.
    Recreated,
    /// The user with the email belongs to the subject; it was updated.
    Updated,
}

impl ReconcileAction {
    /// Returns `true` if a new user record was written.
    #[must_use]
    pub fn created_user(&self) -> bool {
        matches!(self, Self::Created | Self::Recreated)
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Recreated => write!(f, "recreated"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Result of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// The local user the login belongs to.
    pub user_id: String,
    /// What happened to get there.
    pub action: ReconcileAction,
}

/// Reconciles verified claims with the user directory.
#[derive(Clone)]
pub struct IdentityReconciler {
    directory: Arc<dyn UserDirectory>,
}

impl IdentityReconciler {
    /// Creates a reconciler over `directory`.
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Reconciles and returns the local user id.
    ///
    /// # Errors
    ///
    /// See [`Self::reconcile_detailed`].
    pub async fn reconcile(&self, claims: &VerifiedClaims) -> SsoResult<String> {
        Ok(self.reconcile_detailed(claims).await?.user_id)
    }

    /// Reconciles and reports which branch ran.
    ///
    /// # Errors
    ///
    /// - `MissingClaim` if `email` or `sub` is absent or empty
    /// - `Directory` if any directory call fails
    pub async fn reconcile_detailed(&self, claims: &VerifiedClaims) -> SsoResult<ReconcileOutcome> {
        let email = non_empty(claims.email()).ok_or_else(|| SsoError::missing_claim("email"))?;
        let subject = non_empty(claims.subject()).ok_or_else(|| SsoError::missing_claim("sub"))?;
        let fields = profile(claims, email);

        let Some(existing) = self.directory.find_by_email(email).await? else {
            let user_id = self.create(&fields, subject).await?;
            tracing::info!(user_id = %user_id, "Created local user for realm subject");
            return Ok(ReconcileOutcome {
                user_id,
                action: ReconcileAction::Created,
            });
        };

        let marker = self.directory.get_external_marker(&existing.id).await?;
        if marker.as_deref() == Some(subject) {
            self.directory.update(&existing.id, &fields).await?;
            tracing::debug!(user_id = %existing.id, "Updated local user from realm claims");
            return Ok(ReconcileOutcome {
                user_id: existing.id,
                action: ReconcileAction::Updated,
            });
        }

        tracing::warn!(
            user_id = %existing.id,
            has_marker = marker.is_some(),
            "Local user belongs to another realm subject, replacing it"
        );
        self.directory.delete(&existing.id).await?;

        match self.create(&fields, subject).await {
            Ok(user_id) => {
                tracing::info!(
                    deleted_user_id = %existing.id,
                    user_id = %user_id,
                    "Recreated local user for realm subject"
                );
                Ok(ReconcileOutcome {
                    user_id,
                    action: ReconcileAction::Recreated,
                })
            }
            Err(e) => {
                tracing::error!(
                    deleted_user_id = %existing.id,
                    login = %existing.login,
                    error = %e,
                    "Local user was deleted but its replacement could not be created"
                );
                Err(SsoError::directory(format!(
                    "User {} ({}) was deleted because it belongs to another realm account, \
                     but creating its replacement failed: {e}",
                    existing.id, existing.login
                )))
            }
        }
    }

    async fn create(&self, fields: &UserFields, subject: &str) -> SsoResult<String> {
        let user_id = self.directory.create(fields).await?;
        self.directory.set_external_marker(&user_id, subject).await?;
        Ok(user_id)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Profile fields from the claims, with a fresh random password.
/// The login falls back to the email when `preferred_username` is missing.
fn profile(claims: &VerifiedClaims, email: &str) -> UserFields {
    UserFields {
        login: non_empty(claims.preferred_username())
            .unwrap_or(email)
            .to_string(),
        email: email.to_string(),
        given_name: claims.given_name().unwrap_or_default().to_string(),
        family_name: claims.family_name().unwrap_or_default().to_string(),
        password: generate_password(),
    }
}
