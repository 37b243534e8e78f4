//! Realm connection settings.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::{SsoError, SsoResult};

/// Placeholder returned instead of the client secret by admin views.
pub const MASKED_SECRET: &str = "********";

/// Connection settings of one Keycloak realm.
///
/// Loaded once per request from the settings store and treated as immutable
/// for the rest of that request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmConfig {
    /// Identity provider base URL, without trailing slash.
    pub server_url: String,
    /// Realm name.
    pub realm: String,
    /// OAuth client id registered in the realm.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

impl fmt::Debug for RealmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealmConfig")
            .field("server_url", &self.server_url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

impl RealmConfig {
    /// Creates realm settings. Input is normalized but not validated.
    #[must_use]
    pub fn new(
        server_url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            realm: realm.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
        .normalized()
    }

    /// Trims every field and strips trailing slashes from the server URL.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            server_url: self.server_url.trim().trim_end_matches('/').to_string(),
            realm: self.realm.trim().to_string(),
            client_id: self.client_id.trim().to_string(),
            client_secret: self.client_secret.trim().to_string(),
        }
    }

    /// Checks that every field is set.
    ///
    /// # Errors
    ///
    /// Returns `SsoError::Config` naming the first empty field, or if the
    /// server URL still ends with a slash.
    pub fn validate(&self) -> SsoResult<()> {
        for (name, value) in [
            ("server URL", &self.server_url),
            ("realm", &self.realm),
            ("client id", &self.client_id),
            ("client secret", &self.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(SsoError::config(format!("The {name} is not set.")));
            }
        }
        if self.server_url.ends_with('/') {
            return Err(SsoError::config(
                "The server URL must not end with a slash.",
            ));
        }
        Ok(())
    }

    /// The realm base URL, which is also the expected `iss` of the callback.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.server_url, self.realm)
    }

    /// URL of the browser-facing authorization endpoint, with the query
    /// needed to start an authorization-code login.
    #[must_use]
    pub fn login_url(&self, redirect_uri: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid")
            .finish();
        format!("{}/protocol/openid-connect/auth?{query}", self.issuer())
    }

    /// URL of the realm logout endpoint.
    #[must_use]
    pub fn logout_url(&self, post_logout_redirect_uri: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("post_logout_redirect_uri", post_logout_redirect_uri)
            .append_pair("client_id", &self.client_id)
            .finish();
        format!("{}/protocol/openid-connect/logout?{query}", self.issuer())
    }

    /// A copy safe to show in admin screens.
    #[must_use]
    pub fn masked(&self) -> Self {
        Self {
            client_secret: if self.client_secret.is_empty() {
                String::new()
            } else {
                MASKED_SECRET.to_string()
            },
            ..self.clone()
        }
    }
}
