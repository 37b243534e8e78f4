//! Arc-owning storage adapters.
//!
//! These adapters wrap the lifetime-based storage types and own an Arc<PgPool>,
//! allowing them to be used as `Arc<dyn SettingsStore>` and
//! `Arc<dyn RoleMappingStore>` by the login flow.

use std::sync::Arc;

use async_trait::async_trait;

use realmgate_auth::{RealmConfig, RoleMapping, RoleMappingStore, SettingsStore, SsoError, SsoResult};

use crate::role_mapping::RoleMappingStorage;
use crate::settings::SettingsStorage;
use crate::{PgPool, StorageError};

/// Rejected input stays visible to the caller; database faults do not.
fn to_sso(e: StorageError) -> SsoError {
    match e {
        StorageError::InvalidInput(ref message) => SsoError::config(message.clone()),
        StorageError::Database(_) => SsoError::storage(e.to_string()),
    }
}

// =============================================================================
// Arc-Owning Settings Store
// =============================================================================

/// Arc-owning PostgreSQL settings store.
#[derive(Clone)]
pub struct ArcSettingsStore {
    pool: Arc<PgPool>,
}

impl ArcSettingsStore {
    /// Create a new Arc-owning settings store.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for ArcSettingsStore {
    async fn load(&self) -> SsoResult<Option<RealmConfig>> {
        SettingsStorage::new(&self.pool).load().await.map_err(to_sso)
    }

    async fn save(&self, config: &RealmConfig) -> SsoResult<()> {
        SettingsStorage::new(&self.pool)
            .save(config)
            .await
            .map_err(to_sso)
    }
}

// =============================================================================
// Arc-Owning Role Mapping Store
// =============================================================================

/// Arc-owning PostgreSQL role mapping store.
#[derive(Clone)]
pub struct ArcRoleMappingStore {
    pool: Arc<PgPool>,
}

impl ArcRoleMappingStore {
    /// Create a new Arc-owning role mapping store.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleMappingStore for ArcRoleMappingStore {
    async fn list_all(&self) -> SsoResult<Vec<RoleMapping>> {
        RoleMappingStorage::new(&self.pool)
            .list_all()
            .await
            .map_err(to_sso)
    }

    async fn insert(&self, external_role: &str, local_role: &str) -> SsoResult<RoleMapping> {
        RoleMappingStorage::new(&self.pool)
            .insert(external_role, local_role)
            .await
            .map_err(to_sso)
    }

    async fn delete_by_id(&self, id: i64) -> SsoResult<bool> {
        RoleMappingStorage::new(&self.pool)
            .delete_by_id(id)
            .await
            .map_err(to_sso)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_maps_to_config_error() {
        let err = to_sso(StorageError::invalid_input(
            "realm is longer than 255 characters",
        ));
        assert!(matches!(err, SsoError::Config { .. }));
        assert_eq!(
            err.to_string(),
            "Configuration error: realm is longer than 255 characters"
        );
        assert_eq!(err.category(), realmgate_auth::ErrorCategory::Configuration);
    }

    #[test]
    fn test_database_error_maps_to_sso_storage() {
        let err = to_sso(StorageError::Database(sqlx_core::Error::PoolTimedOut));
        assert!(matches!(err, SsoError::Storage { .. }));
    }

    #[test]
    fn test_overlong_settings_are_rejected_before_the_database() {
        let config = RealmConfig::new("https://sso.example.com", "r".repeat(256), "site", "s");
        let err = crate::settings::validate_lengths(&config).map_err(to_sso).unwrap_err();
        assert!(matches!(err, SsoError::Config { .. }));
        assert!(err.to_string().contains("realm"));
    }
}
