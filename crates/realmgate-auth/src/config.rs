//! Single sign-on configuration.
//!
//! These are the deployment-level settings of the login flow: where the site
//! lives, how long outgoing calls may take, and how the session cookie looks.
//! The realm itself (server URL, realm name, client credentials) is not part
//! of this configuration; it is loaded per request from the settings store.
//!
//! # Example (TOML)
//!
//! ```toml
//! [sso]
//! base_url = "https://intranet.example.com"
//! request_timeout = "10s"
//! descriptor_cache_ttl = "5m"
//!
//! [sso.cookie]
//! name = "realmgate_session"
//! secure = true
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Callback path the identity provider redirects back to.
pub const CALLBACK_PATH: &str = "/sso/login";

/// Root single sign-on configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SsoConfig {
    /// Public base URL of the site, without trailing slash.
    /// The callback URL is derived from it.
    pub base_url: String,

    /// Where the browser lands after a successful login.
    /// Defaults to `{base_url}/`.
    pub home_url: Option<String>,

    /// Timeout for the realm descriptor fetch and the token exchange.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// How long a fetched realm descriptor is reused. Zero disables caching.
    #[serde(with = "humantime_serde")]
    pub descriptor_cache_ttl: Duration,

    /// Lifetime of a local login session.
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,

    /// Session cookie settings.
    pub cookie: CookieConfig,

    /// Bearer token protecting the admin API. The admin API is not mounted
    /// when unset.
    pub admin_token: Option<String>,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            home_url: None,
            request_timeout: Duration::from_secs(10),
            descriptor_cache_ttl: Duration::from_secs(300),
            session_ttl: Duration::from_secs(12 * 3600),
            cookie: CookieConfig::default(),
            admin_token: None,
        }
    }
}

impl SsoConfig {
    /// Creates a configuration for the given site base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Sets the post-login landing URL.
    #[must_use]
    pub fn with_home_url(mut self, url: impl Into<String>) -> Self {
        self.home_url = Some(url.into());
        self
    }

    /// Sets the outgoing request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the descriptor cache TTL.
    #[must_use]
    pub fn with_descriptor_cache_ttl(mut self, ttl: Duration) -> Self {
        self.descriptor_cache_ttl = ttl;
        self
    }

    /// Sets the admin API bearer token.
    #[must_use]
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    /// The exact `redirect_uri` registered with the identity provider.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), CALLBACK_PATH)
    }

    /// The post-login landing URL.
    #[must_use]
    pub fn home_url(&self) -> String {
        match &self.home_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!("{}/", self.base_url.trim_end_matches('/')),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the base URL is not an absolute
    /// http(s) URL or a timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| {
            ConfigError::InvalidValue(format!("base_url '{}' is not a URL: {e}", self.base_url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue(
                "base_url must use http or https".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be > 0".to_string(),
            ));
        }
        if self.session_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "session_ttl must be > 0".to_string(),
            ));
        }
        if self.cookie.name.trim().is_empty() {
            return Err(ConfigError::Missing("cookie.name".to_string()));
        }
        if matches!(&self.admin_token, Some(t) if t.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "admin_token cannot be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name.
    pub name: String,
    /// Only send the cookie over HTTPS.
    pub secure: bool,
    /// Cookie path.
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "realmgate_session".to_string(),
            secure: true,
            path: "/".to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}
