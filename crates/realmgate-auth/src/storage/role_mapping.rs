//! Role mapping storage trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::SsoResult;

/// One external role name mapped to one local role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMapping {
    /// Store-assigned identifier.
    pub id: i64,
    /// Role name in the realm (`realm_access.roles`).
    pub external_role: String,
    /// Local role granted to users holding the external role.
    pub local_role: String,
}

/// Persistence of role mappings.
#[async_trait]
pub trait RoleMappingStore: Send + Sync {
    /// Returns every mapping ordered by id.
    async fn list_all(&self) -> SsoResult<Vec<RoleMapping>>;

    /// Inserts a mapping and returns it with its new id.
    ///
    /// Names are stored as given; validation is the caller's job.
    async fn insert(&self, external_role: &str, local_role: &str) -> SsoResult<RoleMapping>;

    /// Deletes a mapping. Returns `false` if no mapping had that id.
    async fn delete_by_id(&self, id: i64) -> SsoResult<bool>;
}
