//! Settings store trait.
//!
//! Holds the single realm configuration row. Implementations are provided by
//! storage backends (in-memory, PostgreSQL).

use async_trait::async_trait;

use crate::realm::RealmConfig;
use crate::{SsoError, SsoResult};

/// Persistence of the realm connection settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Loads the saved settings, or `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `SsoError::Storage` if the backend fails.
    async fn load(&self) -> SsoResult<Option<RealmConfig>>;

    /// Replaces the saved settings.
    ///
    /// # Errors
    ///
    /// Returns `SsoError::Storage` if the backend fails.
    async fn save(&self, config: &RealmConfig) -> SsoResult<()>;
}

/// Loads the realm settings a login needs.
///
/// # Errors
///
/// Returns `NotConfigured` if nothing was saved, `Config` if a field is
/// empty, and storage errors unchanged.
pub async fn load_realm(store: &dyn SettingsStore) -> SsoResult<RealmConfig> {
    let config = store.load().await?.ok_or(SsoError::NotConfigured)?;
    config.validate()?;
    Ok(config)
}

/// Normalizes, validates and saves new realm settings.
///
/// Every field is trimmed and trailing slashes are stripped from the server
/// URL before validation.
///
/// # Errors
///
/// Returns `Config` naming the first empty field, or the storage error.
pub async fn save_realm(store: &dyn SettingsStore, input: RealmConfig) -> SsoResult<RealmConfig> {
    let config = input.normalized();
    config.validate()?;
    store.save(&config).await?;
    tracing::info!(
        server_url = %config.server_url,
        realm = %config.realm,
        client_id = %config.client_id,
        "Realm settings saved"
    );
    Ok(config)
}
