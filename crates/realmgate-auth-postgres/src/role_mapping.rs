//! Role mapping storage.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;

use realmgate_auth::RoleMapping;

use crate::settings::check_length;
use crate::{PgPool, StorageResult};

fn from_tuple((id, external_role, local_role): (i64, String, String)) -> RoleMapping {
    RoleMapping {
        id,
        external_role,
        local_role,
    }
}

/// Role mapping operations.
pub struct RoleMappingStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> RoleMappingStorage<'a> {
    /// Create a new role mapping storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Lists every mapping ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> StorageResult<Vec<RoleMapping>> {
        let rows: Vec<(i64, String, String)> = query_as(
            r#"
            SELECT id, keycloak_role_name, local_role_name
            FROM realmgate_role_mappings
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(from_tuple).collect())
    }

    /// Inserts a mapping.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a name does not fit its column, or an error
    /// if the database query fails.
    pub async fn insert(&self, external_role: &str, local_role: &str) -> StorageResult<RoleMapping> {
        check_length("keycloak_role_name", external_role)?;
        check_length("local_role_name", local_role)?;

        let row: (i64, String, String) = query_as(
            r#"
            INSERT INTO realmgate_role_mappings (keycloak_role_name, local_role_name)
            VALUES ($1, $2)
            RETURNING id, keycloak_role_name, local_role_name
            "#,
        )
        .bind(external_role)
        .bind(local_role)
        .fetch_one(self.pool)
        .await?;

        Ok(from_tuple(row))
    }

    /// Deletes a mapping. Returns `false` if no row had that id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_by_id(&self, id: i64) -> StorageResult<bool> {
        let rows_affected = query("DELETE FROM realmgate_role_mappings WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}
