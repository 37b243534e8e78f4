//! Mapping of realm roles onto local roles.
//!
//! A [`RoleMapper`] is a snapshot of the role mapping table taken when it is
//! built. Applying it to a user replaces the user's local roles with the
//! mapped counterparts of the realm roles carried by the token. An empty
//! mapping table leaves local roles alone, so sites that manage roles locally
//! are unaffected.

use std::collections::HashMap;

use crate::storage::{RoleMapping, RoleMappingStore, UserDirectory};
use crate::token::VerifiedClaims;
use crate::{SsoError, SsoResult};

/// Longest accepted role name, in characters.
pub const MAX_ROLE_NAME_LENGTH: usize = 255;

/// External to local role lookup.
#[derive(Debug, Clone, Default)]
pub struct RoleMapper {
    mappings: HashMap<String, String>,
}

impl RoleMapper {
    /// Builds a mapper from mapping rows. A later row for the same external
    /// role overrides an earlier one.
    #[must_use]
    pub fn new(rows: &[RoleMapping]) -> Self {
        let mappings = rows
            .iter()
            .map(|row| (row.external_role.clone(), row.local_role.clone()))
            .collect();
        Self { mappings }
    }

    /// Builds a mapper from every row of the store.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn load(store: &dyn RoleMappingStore) -> SsoResult<Self> {
        let rows = store.list_all().await?;
        Ok(Self::new(&rows))
    }

    /// Number of distinct external roles mapped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Returns `true` if no role is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Looks up the local role for an external role.
    #[must_use]
    pub fn resolve(&self, external_role: &str) -> Option<&str> {
        self.mappings.get(external_role).map(String::as_str)
    }

    /// Resolves every realm role of the token, in claim order. Unmapped
    /// roles are skipped; duplicates are kept.
    #[must_use]
    pub fn resolve_all(&self, claims: &VerifiedClaims) -> Vec<&str> {
        claims
            .realm_roles()
            .into_iter()
            .filter_map(|role| self.resolve(role))
            .collect()
    }

    /// Replaces the local roles of `user_id` with the mapped realm roles.
    ///
    /// Does nothing when no mapping exists. Otherwise every current local
    /// role is revoked and each mapped role is granted in claim order; a user
    /// whose realm roles map to nothing ends up with no local role.
    ///
    /// Returns the granted roles.
    ///
    /// # Errors
    ///
    /// Returns the first directory error. Roles revoked before the failure
    /// stay revoked.
    pub async fn apply_to(
        &self,
        directory: &dyn UserDirectory,
        user_id: &str,
        claims: &VerifiedClaims,
    ) -> SsoResult<Vec<String>> {
        if self.is_empty() {
            tracing::debug!(user_id, "No role mappings configured, keeping local roles");
            return Ok(Vec::new());
        }

        for role in directory.list_local_roles(user_id).await? {
            directory.revoke_role(user_id, &role).await?;
        }

        let mut granted = Vec::new();
        for role in self.resolve_all(claims) {
            directory.grant_role(user_id, role).await?;
            granted.push(role.to_string());
        }

        tracing::debug!(user_id, roles = ?granted, "Applied role mappings");
        Ok(granted)
    }
}

/// Trims a role name and checks its length.
///
/// # Errors
///
/// Returns `InvalidRoleName` if the trimmed name is empty or longer than
/// [`MAX_ROLE_NAME_LENGTH`] characters.
pub fn validate_role_name(name: &str, label: &str) -> SsoResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SsoError::invalid_role_name(format!("The {label} is empty.")));
    }
    if trimmed.chars().count() > MAX_ROLE_NAME_LENGTH {
        return Err(SsoError::invalid_role_name(format!(
            "The {label} is longer than {MAX_ROLE_NAME_LENGTH} characters."
        )));
    }
    Ok(trimmed.to_string())
}

/// Validates and stores a new role mapping.
///
/// # Errors
///
/// - `InvalidRoleName` if either name is empty or too long
/// - `UnknownRole` if the local role is not in the directory's registry
/// - directory and storage errors unchanged
pub async fn add_mapping(
    store: &dyn RoleMappingStore,
    directory: &dyn UserDirectory,
    external_role: &str,
    local_role: &str,
) -> SsoResult<RoleMapping> {
    let external_role = validate_role_name(external_role, "Keycloak role name")?;
    let local_role = validate_role_name(local_role, "local role name")?;

    let available = directory.available_roles().await?;
    if !available.iter().any(|role| *role == local_role) {
        return Err(SsoError::unknown_role(local_role));
    }

    let mapping = store.insert(&external_role, &local_role).await?;
    tracing::info!(
        id = mapping.id,
        external_role = %mapping.external_role,
        local_role = %mapping.local_role,
        "Role mapping added"
    );
    Ok(mapping)
}

/// Deletes a role mapping by id.
///
/// # Errors
///
/// Returns `RoleMappingNotFound` if the id is not positive or no mapping had
/// it, and storage errors unchanged.
pub async fn delete_mapping(store: &dyn RoleMappingStore, id: i64) -> SsoResult<()> {
    if id <= 0 || !store.delete_by_id(id).await? {
        return Err(SsoError::RoleMappingNotFound { id });
    }
    tracing::info!(id, "Role mapping deleted");
    Ok(())
}
