//! Realm descriptor fetching and caching.
//!
//! Keycloak publishes realm metadata at `{server_url}/realms/{realm}`. The
//! document carries the realm's signing key (bare base64 DER, no PEM armor)
//! and the token and account service URLs:
//!
//! ```json
//! {
//!   "realm": "staff",
//!   "public_key": "MIIBIjANBgkqh...",
//!   "token-service": "https://id.example.com/realms/staff/protocol/openid-connect",
//!   "account-service": "https://id.example.com/realms/staff/account",
//!   "tokens-not-before": 0
//! }
//! ```
//!
//! - [`RealmDescriptorFetcher`] - Fetches the document over HTTP, no retries
//! - [`DescriptorCache`] - Reuses fetched descriptors for a configurable TTL

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::RealmConfig;
use crate::{SsoError, SsoResult};

/// Signing key and endpoints of a realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmDescriptor {
    /// Base64 body of the realm's RSA public key.
    pub public_key: String,
    /// Base URL of the OpenID Connect protocol endpoints.
    pub token_endpoint: String,
    /// URL of the account console.
    pub account_service_url: String,
}

/// Raw realm metadata as served by the identity provider.
#[derive(Debug, Deserialize)]
struct RealmMetadata {
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default, rename = "token-service")]
    token_service: Option<String>,
    #[serde(default, rename = "account-service")]
    account_service: Option<String>,
}

impl RealmMetadata {
    fn into_descriptor(self) -> SsoResult<RealmDescriptor> {
        Ok(RealmDescriptor {
            public_key: required(self.public_key, "public_key")?,
            token_endpoint: required(self.token_service, "token-service")?,
            account_service_url: required(self.account_service, "account-service")?,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> SsoResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(SsoError::DescriptorIncomplete { field }),
    }
}

/// Anything that can produce the descriptor of a realm.
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    /// Returns the descriptor of the configured realm.
    async fn descriptor(&self, config: &RealmConfig) -> SsoResult<RealmDescriptor>;

    /// Drops any cached descriptor of the realm. No-op for uncached sources.
    async fn invalidate(&self, _config: &RealmConfig) {}
}

// =============================================================================
// Fetcher
// =============================================================================

/// Fetches realm descriptors from the identity provider.
#[derive(Debug, Clone)]
pub struct RealmDescriptorFetcher {
    http_client: reqwest::Client,
}

impl RealmDescriptorFetcher {
    /// Creates a fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `SsoError::Config` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> SsoResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SsoError::config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    /// Creates a fetcher on top of an existing HTTP client.
    #[must_use]
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Fetches the descriptor of the configured realm.
    ///
    /// # Errors
    ///
    /// - `Config` if the realm settings are incomplete
    /// - `Network` on transport failure, timeout, non-success status or an
    ///   unparseable body
    /// - `DescriptorIncomplete` if the key or an endpoint is missing
    pub async fn fetch(&self, config: &RealmConfig) -> SsoResult<RealmDescriptor> {
        config.validate()?;
        let url = config.issuer();

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "Failed to fetch realm descriptor");
                SsoError::network(format!("Failed to fetch realm descriptor: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "Realm descriptor request rejected");
            return Err(SsoError::network(format!(
                "Realm descriptor request returned status {}",
                status.as_u16()
            )));
        }

        let metadata: RealmMetadata = response.json().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Failed to parse realm descriptor");
            SsoError::network(format!("Failed to parse realm descriptor: {e}"))
        })?;

        let descriptor = metadata.into_descriptor()?;
        tracing::debug!(realm = %config.realm, "Fetched realm descriptor");
        Ok(descriptor)
    }
}

#[async_trait]
impl DescriptorSource for RealmDescriptorFetcher {
    async fn descriptor(&self, config: &RealmConfig) -> SsoResult<RealmDescriptor> {
        self.fetch(config).await
    }
}

// =============================================================================
// Cache
// =============================================================================

struct CachedDescriptor {
    descriptor: RealmDescriptor,
    fetched_at: Instant,
}

/// In-memory TTL cache in front of a [`RealmDescriptorFetcher`].
///
/// Entries are keyed by realm URL, so changing the saved server or realm
/// never serves a stale key for the new realm. A zero TTL disables caching.
pub struct DescriptorCache {
    fetcher: RealmDescriptorFetcher,
    cache: Arc<RwLock<HashMap<String, CachedDescriptor>>>,
    ttl: Duration,
}

impl DescriptorCache {
    /// Creates a cache around `fetcher`.
    #[must_use]
    pub fn new(fetcher: RealmDescriptorFetcher, ttl: Duration) -> Self {
        Self {
            fetcher,
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Returns a cached descriptor or fetches a fresh one.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`RealmDescriptorFetcher::fetch`]. Failed
    /// fetches are never cached.
    pub async fn get(&self, config: &RealmConfig) -> SsoResult<RealmDescriptor> {
        if self.ttl.is_zero() {
            return self.fetcher.fetch(config).await;
        }

        let key = config.issuer();
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&key) {
                if cached.fetched_at.elapsed() < self.ttl {
                    tracing::trace!(realm = %key, "Realm descriptor cache hit");
                    return Ok(cached.descriptor.clone());
                }
                tracing::trace!(realm = %key, "Realm descriptor cache entry expired");
            }
        }

        let descriptor = self.fetcher.fetch(config).await?;
        let mut cache = self.cache.write().await;
        cache.insert(
            key,
            CachedDescriptor {
                descriptor: descriptor.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(descriptor)
    }

    /// Removes the entry of one realm.
    pub async fn remove(&self, config: &RealmConfig) {
        let mut cache = self.cache.write().await;
        if cache.remove(&config.issuer()).is_some() {
            tracing::debug!(realm = %config.realm, "Invalidated realm descriptor");
        }
    }

    /// Number of cached descriptors, expired ones included.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl DescriptorSource for DescriptorCache {
    async fn descriptor(&self, config: &RealmConfig) -> SsoResult<RealmDescriptor> {
        self.get(config).await
    }

    async fn invalidate(&self, config: &RealmConfig) {
        self.remove(config).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn realm_for(server: &MockServer) -> RealmConfig {
        RealmConfig::new(server.uri(), "staff", "intranet", "s3cret")
    }

    fn metadata(server: &MockServer) -> serde_json::Value {
        json!({
            "realm": "staff",
            "public_key": "MIIBIjANBgkq",
            "token-service": format!("{}/realms/staff/protocol/openid-connect", server.uri()),
            "account-service": format!("{}/realms/staff/account", server.uri()),
            "tokens-not-before": 0
        })
    }

    fn fetcher() -> RealmDescriptorFetcher {
        RealmDescriptorFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_descriptor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/staff"))
            .respond_with(ResponseTemplate::new(200).set_body_json(metadata(&server)))
            .mount(&server)
            .await;

        let descriptor = fetcher().fetch(&realm_for(&server)).await.unwrap();
        assert_eq!(descriptor.public_key, "MIIBIjANBgkq");
        assert_eq!(
            descriptor.token_endpoint,
            format!("{}/realms/staff/protocol/openid-connect", server.uri())
        );
        assert!(descriptor.account_service_url.ends_with("/realms/staff/account"));
    }

    #[tokio::test]
    async fn test_missing_token_service_is_incomplete() {
        let server = MockServer::start().await;
        let mut body = metadata(&server);
        body.as_object_mut().unwrap().remove("token-service");
        Mock::given(method("GET"))
            .and(path("/realms/staff"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = fetcher().fetch(&realm_for(&server)).await.unwrap_err();
        assert!(matches!(
            err,
            SsoError::DescriptorIncomplete {
                field: "token-service"
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_public_key_is_incomplete() {
        let server = MockServer::start().await;
        let mut body = metadata(&server);
        body["public_key"] = json!("");
        Mock::given(method("GET"))
            .and(path("/realms/staff"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = fetcher().fetch(&realm_for(&server)).await.unwrap_err();
        assert!(matches!(
            err,
            SsoError::DescriptorIncomplete {
                field: "public_key"
            }
        ));
    }

    #[tokio::test]
    async fn test_http_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/staff"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher().fetch(&realm_for(&server)).await.unwrap_err();
        assert!(matches!(err, SsoError::Network { .. }));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/staff"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>down</html>"))
            .mount(&server)
            .await;

        let err = fetcher().fetch(&realm_for(&server)).await.unwrap_err();
        assert!(matches!(err, SsoError::Network { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let config = RealmConfig::new("http://127.0.0.1:1", "staff", "intranet", "s3cret");
        let err = fetcher().fetch(&config).await.unwrap_err();
        assert!(matches!(err, SsoError::Network { .. }));
    }

    #[tokio::test]
    async fn test_incomplete_config_is_rejected_before_request() {
        let config = RealmConfig::new("http://127.0.0.1:1", "", "intranet", "s3cret");
        let err = fetcher().fetch(&config).await.unwrap_err();
        assert!(matches!(err, SsoError::Config { .. }));
    }

    #[tokio::test]
    async fn test_cache_reuses_descriptor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/staff"))
            .respond_with(ResponseTemplate::new(200).set_body_json(metadata(&server)))
            .expect(1)
            .mount(&server)
            .await;

        let cache = DescriptorCache::new(fetcher(), Duration::from_secs(60));
        let config = realm_for(&server);
        let first = cache.get(&config).await.unwrap();
        let second = cache.get(&config).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_cache_invalidate_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/staff"))
            .respond_with(ResponseTemplate::new(200).set_body_json(metadata(&server)))
            .expect(2)
            .mount(&server)
            .await;

        let cache = DescriptorCache::new(fetcher(), Duration::from_secs(60));
        let config = realm_for(&server);
        cache.descriptor(&config).await.unwrap();
        cache.invalidate(&config).await;
        assert!(cache.is_empty().await);
        cache.descriptor(&config).await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/staff"))
            .respond_with(ResponseTemplate::new(200).set_body_json(metadata(&server)))
            .expect(2)
            .mount(&server)
            .await;

        let cache = DescriptorCache::new(fetcher(), Duration::ZERO);
        let config = realm_for(&server);
        cache.get(&config).await.unwrap();
        cache.get(&config).await.unwrap();
        assert!(cache.is_empty().await);
    }
}
