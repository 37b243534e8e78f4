//! Table definitions.

use sqlx_core::query::query;

use crate::{PgPool, StorageResult};

/// Realm settings table. Holds at most one row, with id 1.
pub const SETTINGS_TABLE: &str = "realmgate_sso_settings";

/// Role mapping table.
pub const ROLE_MAPPING_TABLE: &str = "realmgate_role_mappings";

/// Column width of every varchar column.
pub const MAX_COLUMN_LENGTH: usize = 255;

const CREATE_SETTINGS: &str = r#"
    CREATE TABLE IF NOT EXISTS realmgate_sso_settings (
        id SMALLINT PRIMARY KEY CHECK (id = 1),
        serverurl VARCHAR(255) NOT NULL,
        realm VARCHAR(255) NOT NULL,
        clientid VARCHAR(255) NOT NULL,
        clientsecret TEXT NOT NULL
    )
"#;

const CREATE_ROLE_MAPPINGS: &str = r#"
    CREATE TABLE IF NOT EXISTS realmgate_role_mappings (
        id BIGSERIAL PRIMARY KEY,
        keycloak_role_name VARCHAR(255) NOT NULL,
        local_role_name VARCHAR(255) NOT NULL
    )
"#;

/// Creates both tables if they do not exist.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub async fn ensure_schema(pool: &PgPool) -> StorageResult<()> {
    for statement in [CREATE_SETTINGS, CREATE_ROLE_MAPPINGS] {
        query(statement).execute(pool).await?;
    }
    tracing::debug!(
        settings_table = SETTINGS_TABLE,
        role_mapping_table = ROLE_MAPPING_TABLE,
        "SSO schema ready"
    );
    Ok(())
}
