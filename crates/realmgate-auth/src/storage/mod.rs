//! Storage traits for single sign-on data.
//!
//! This module defines the interfaces the login flow depends on:
//!
//! - [`SettingsStore`] - The single realm configuration row
//! - [`RoleMappingStore`] - External to local role mappings
//! - [`UserDirectory`] - Local users, their roles and sessions
//!
//! # Implementations
//!
//! - [`memory`] - In-memory backends
//! - `realmgate-auth-postgres` - PostgreSQL settings and role mapping storage

pub mod directory;
pub mod memory;
pub mod role_mapping;
pub mod settings;

pub use directory::{LocalUser, LoginSession, UserDirectory, UserFields};
pub use memory::{MemoryRoleMappingStore, MemorySettingsStore, MemoryUserDirectory};
pub use role_mapping::{RoleMapping, RoleMappingStore};
pub use settings::{SettingsStore, load_realm, save_realm};
