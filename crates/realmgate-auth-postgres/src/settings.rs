//! Realm settings storage.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;

use realmgate_auth::RealmConfig;

use crate::schema::MAX_COLUMN_LENGTH;
use crate::{PgPool, StorageError, StorageResult};

/// Settings row id.
const SETTINGS_ID: i16 = 1;

/// Realm settings operations.
pub struct SettingsStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsStorage<'a> {
    /// Create a new settings storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Loads the settings row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn load(&self) -> StorageResult<Option<RealmConfig>> {
        let row: Option<(String, String, String, String)> = query_as(
            r#"
            SELECT serverurl, realm, clientid, clientsecret
            FROM realmgate_sso_settings
            WHERE id = $1
            "#,
        )
        .bind(SETTINGS_ID)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(server_url, realm, client_id, client_secret)| RealmConfig {
            server_url,
            realm,
            client_id,
            client_secret,
        }))
    }

    /// Inserts or replaces the settings row.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a value does not fit its column, or an
    /// error if the database query fails.
    pub async fn save(&self, config: &RealmConfig) -> StorageResult<()> {
        validate_lengths(config)?;

        query(
            r#"
            INSERT INTO realmgate_sso_settings (id, serverurl, realm, clientid, clientsecret)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET serverurl = EXCLUDED.serverurl,
                realm = EXCLUDED.realm,
                clientid = EXCLUDED.clientid,
                clientsecret = EXCLUDED.clientsecret
            "#,
        )
        .bind(SETTINGS_ID)
        .bind(&config.server_url)
        .bind(&config.realm)
        .bind(&config.client_id)
        .bind(&config.client_secret)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

/// Checks the varchar columns of the settings row.
pub(crate) fn validate_lengths(config: &RealmConfig) -> StorageResult<()> {
    check_length("serverurl", &config.server_url)?;
    check_length("realm", &config.realm)?;
    check_length("clientid", &config.client_id)
}

/// Rejects values longer than a varchar column.
pub(crate) fn check_length(column: &str, value: &str) -> StorageResult<()> {
    if value.chars().count() > MAX_COLUMN_LENGTH {
        return Err(StorageError::invalid_input(format!(
            "{column} is longer than {MAX_COLUMN_LENGTH} characters"
        )));
    }
    Ok(())
}
