//! PostgreSQL storage backend for RealmGate SSO
//!
//! Provides persistent storage for:
//!
//! - Realm settings (a single row with id 1)
//! - Role mappings (realm role name to local role name)
//!
//! # Example
//!
//! ```ignore
//! use realmgate_auth_postgres::PostgresSsoStorage;
//!
//! let storage = PostgresSsoStorage::connect("postgres://localhost/realmgate", 5).await?;
//! storage.ensure_schema().await?;
//!
//! let settings = storage.settings_store();
//! let mappings = storage.role_mapping_store();
//! ```

pub mod role_mapping;
pub mod schema;
pub mod settings;
pub mod storage_adapters;

use std::sync::Arc;

use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use role_mapping::RoleMappingStorage;
pub use settings::SettingsStorage;
pub use storage_adapters::{ArcRoleMappingStore, ArcSettingsStore};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during SSO storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Returns `true` if this is an invalid input error.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// PostgreSQL SSO Storage
// =============================================================================

/// PostgreSQL storage backend for SSO settings and role mappings.
#[derive(Debug, Clone)]
pub struct PostgresSsoStorage {
    pool: Arc<PgPool>,
}

impl PostgresSsoStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(Arc::new(pool)))
    }

    /// Creates the SSO tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        schema::ensure_schema(&self.pool).await
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get settings storage operations.
    #[must_use]
    pub fn settings(&self) -> SettingsStorage<'_> {
        SettingsStorage::new(&self.pool)
    }

    /// Get role mapping storage operations.
    #[must_use]
    pub fn role_mappings(&self) -> RoleMappingStorage<'_> {
        RoleMappingStorage::new(&self.pool)
    }

    /// Settings store for the login flow.
    #[must_use]
    pub fn settings_store(&self) -> ArcSettingsStore {
        ArcSettingsStore::new(Arc::clone(&self.pool))
    }

    /// Role mapping store for the login flow.
    #[must_use]
    pub fn role_mapping_store(&self) -> ArcRoleMappingStore {
        ArcRoleMappingStore::new(Arc::clone(&self.pool))
    }
}

// =============================================================================
// Tests
// =============================================================================
