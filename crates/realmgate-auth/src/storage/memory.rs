//! In-memory storage backends.
//!
//! Used by the server when no database is configured, and by tests. State
//! lives behind `tokio::sync::RwLock`s, so writes are serialized and readers
//! always see a consistent snapshot.

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{
    LocalUser, LoginSession, RoleMapping, RoleMappingStore, SettingsStore, UserDirectory,
    UserFields,
};
use crate::credentials::{generate_session_token, hash_password};
use crate::realm::RealmConfig;
use crate::{SsoError, SsoResult};

/// Local roles every fresh in-memory directory knows about.
pub const DEFAULT_LOCAL_ROLES: [&str; 5] =
    ["administrator", "editor", "author", "contributor", "subscriber"];

// =============================================================================
// Settings
// =============================================================================

/// Single-slot settings store.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    config: RwLock<Option<RealmConfig>>,
}

impl MemorySettingsStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `config`.
    #[must_use]
    pub fn with_config(config: RealmConfig) -> Self {
        Self {
            config: RwLock::new(Some(config)),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> SsoResult<Option<RealmConfig>> {
        Ok(self.config.read().await.clone())
    }

    async fn save(&self, config: &RealmConfig) -> SsoResult<()> {
        *self.config.write().await = Some(config.clone());
        Ok(())
    }
}

// =============================================================================
// Role Mappings
// =============================================================================

#[derive(Debug, Default)]
struct MappingTable {
    rows: Vec<RoleMapping>,
    last_id: i64,
}

/// Role mapping store with auto-increment ids.
#[derive(Debug, Default)]
pub struct MemoryRoleMappingStore {
    table: RwLock<MappingTable>,
}

impl MemoryRoleMappingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleMappingStore for MemoryRoleMappingStore {
    async fn list_all(&self) -> SsoResult<Vec<RoleMapping>> {
        Ok(self.table.read().await.rows.clone())
    }

    async fn insert(&self, external_role: &str, local_role: &str) -> SsoResult<RoleMapping> {
        let mut table = self.table.write().await;
        table.last_id += 1;
        let mapping = RoleMapping {
            id: table.last_id,
            external_role: external_role.to_string(),
            local_role: local_role.to_string(),
        };
        table.rows.push(mapping.clone());
        Ok(mapping)
    }

    async fn delete_by_id(&self, id: i64) -> SsoResult<bool> {
        let mut table = self.table.write().await;
        let before = table.rows.len();
        table.rows.retain(|row| row.id != id);
        Ok(table.rows.len() != before)
    }
}

// =============================================================================
// User Directory
// =============================================================================

struct StoredUser {
    user: LocalUser,
    password_hash: String,
    roles: Vec<String>,
}

#[derive(Default)]
struct DirectoryState {
    users: HashMap<String, StoredUser>,
    sessions: HashMap<String, LoginSession>,
    last_id: u64,
}

/// In-memory user directory with a fixed local role registry.
pub struct MemoryUserDirectory {
    state: RwLock<DirectoryState>,
    registry: Vec<String>,
    #[cfg(test)]
    fail_create: AtomicBool,
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_ROLES)
    }
}

impl MemoryUserDirectory {
    /// Creates a directory whose role registry is `roles`.
    #[must_use]
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: RwLock::new(DirectoryState::default()),
            registry: roles.into_iter().map(Into::into).collect(),
            #[cfg(test)]
            fail_create: AtomicBool::new(false),
        }
    }

    /// Returns every user, ordered by id.
    pub async fn users(&self) -> Vec<LocalUser> {
        let state = self.state.read().await;
        let mut users: Vec<LocalUser> = state.users.values().map(|s| s.user.clone()).collect();
        users.sort_by_key(|u| u.id.parse::<u64>().unwrap_or(u64::MAX));
        users
    }

    /// Looks up a live session by token.
    pub async fn session(&self, token: &str) -> Option<LoginSession> {
        let state = self.state.read().await;
        state
            .sessions
            .get(token)
            .filter(|s| s.expires_at > OffsetDateTime::now_utc())
            .cloned()
    }

    /// Returns the stored password hash of a user.
    pub async fn password_hash(&self, user_id: &str) -> Option<String> {
        let state = self.state.read().await;
        state.users.get(user_id).map(|s| s.password_hash.clone())
    }

    /// Makes the next `create` fail.
    #[cfg(test)]
    pub(crate) fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    /// Hashes on the blocking pool; Argon2 takes tens of milliseconds.
    async fn hash(password: &str) -> SsoResult<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| SsoError::directory(format!("Password hashing task failed: {e}")))?
            .map_err(|e| SsoError::directory(format!("Failed to hash password: {e}")))
    }
}

fn no_such_user(user_id: &str) -> SsoError {
    SsoError::directory(format!("User {user_id} does not exist."))
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> SsoResult<Option<LocalUser>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|s| s.user.email.eq_ignore_ascii_case(email))
            .map(|s| s.user.clone()))
    }

    async fn find_by_id(&self, user_id: &str) -> SsoResult<Option<LocalUser>> {
        let state = self.state.read().await;
        Ok(state.users.get(user_id).map(|s| s.user.clone()))
    }

    async fn create(&self, fields: &UserFields) -> SsoResult<String> {
        #[cfg(test)]
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(SsoError::directory("User creation failed."));
        }
        if fields.login.trim().is_empty() {
            return Err(SsoError::directory("Cannot create a user with an empty login."));
        }
        let password_hash = Self::hash(&fields.password).await?;

        let mut state = self.state.write().await;
        if state.users.values().any(|s| s.user.login == fields.login) {
            return Err(SsoError::directory(format!(
                "Login {} is already taken.",
                fields.login
            )));
        }
        if state
            .users
            .values()
            .any(|s| s.user.email.eq_ignore_ascii_case(&fields.email))
        {
            return Err(SsoError::directory("Email address is already registered."));
        }

        state.last_id += 1;
        let id = state.last_id.to_string();
        state.users.insert(
            id.clone(),
            StoredUser {
                user: LocalUser {
                    id: id.clone(),
                    login: fields.login.clone(),
                    email: fields.email.clone(),
                    given_name: fields.given_name.clone(),
                    family_name: fields.family_name.clone(),
                    external_subject: None,
                },
                password_hash,
                roles: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn update(&self, user_id: &str, fields: &UserFields) -> SsoResult<()> {
        let password_hash = Self::hash(&fields.password).await?;
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|s| s.user.id != user_id && s.user.login == fields.login)
        {
            return Err(SsoError::directory(format!(
                "Login {} is already taken.",
                fields.login
            )));
        }
        let stored = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| no_such_user(user_id))?;
        stored.user.login = fields.login.clone();
        stored.user.email = fields.email.clone();
        stored.user.given_name = fields.given_name.clone();
        stored.user.family_name = fields.family_name.clone();
        stored.password_hash = password_hash;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> SsoResult<()> {
        let mut state = self.state.write().await;
        state
            .users
            .remove(user_id)
            .ok_or_else(|| no_such_user(user_id))?;
        state.sessions.retain(|_, s| s.user_id != user_id);
        Ok(())
    }

    async fn get_external_marker(&self, user_id: &str) -> SsoResult<Option<String>> {
        let state = self.state.read().await;
        let stored = state.users.get(user_id).ok_or_else(|| no_such_user(user_id))?;
        Ok(stored.user.external_subject.clone())
    }

    async fn set_external_marker(&self, user_id: &str, subject: &str) -> SsoResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| no_such_user(user_id))?;
        stored.user.external_subject = Some(subject.to_string());
        Ok(())
    }

    async fn list_local_roles(&self, user_id: &str) -> SsoResult<Vec<String>> {
        let state = self.state.read().await;
        let stored = state.users.get(user_id).ok_or_else(|| no_such_user(user_id))?;
        Ok(stored.roles.clone())
    }

    async fn grant_role(&self, user_id: &str, role: &str) -> SsoResult<()> {
        if !self.registry.iter().any(|r| r == role) {
            return Err(SsoError::directory(format!("Role {role} does not exist.")));
        }
        let mut state = self.state.write().await;
        let stored = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| no_such_user(user_id))?;
        if !stored.roles.iter().any(|r| r == role) {
            stored.roles.push(role.to_string());
        }
        Ok(())
    }

    async fn revoke_role(&self, user_id: &str, role: &str) -> SsoResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| no_such_user(user_id))?;
        stored.roles.retain(|r| r != role);
        Ok(())
    }

    async fn available_roles(&self) -> SsoResult<Vec<String>> {
        Ok(self.registry.clone())
    }

    async fn establish_session(&self, user_id: &str, ttl: Duration) -> SsoResult<LoginSession> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(user_id) {
            return Err(no_such_user(user_id));
        }
        let now = OffsetDateTime::now_utc();
        state.sessions.retain(|_, s| s.expires_at > now);
        let session = LoginSession {
            token: generate_session_token(),
            user_id: user_id.to_string(),
            expires_at: now + ttl,
        };
        state.sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn end_session(&self, token: &str) -> SsoResult<()> {
        self.state.write().await.sessions.remove(token);
        Ok(())
    }
}
