use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use realmgate_auth::{
    LoginOrchestrator, MemoryRoleMappingStore, MemorySettingsStore, MemoryUserDirectory,
    RoleMappingStore, SettingsStore, SsoState, UserDirectory, save_realm, sso_router,
};
use realmgate_auth_postgres::PostgresSsoStorage;

use crate::config::{AppConfig, StorageBackend};
use crate::handlers;

pub struct RealmgateServer {
    addr: SocketAddr,
    app: Router,
}

/// Settings and role mapping stores selected by `storage.backend`.
async fn build_stores(
    cfg: &AppConfig,
) -> anyhow::Result<(Arc<dyn SettingsStore>, Arc<dyn RoleMappingStore>)> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory SSO storage");
            Ok((
                Arc::new(MemorySettingsStore::new()),
                Arc::new(MemoryRoleMappingStore::new()),
            ))
        }
        StorageBackend::Postgres => {
            let pg = cfg
                .storage
                .postgres
                .as_ref()
                .context("storage.postgres is not configured")?;
            let storage = PostgresSsoStorage::connect(&pg.url, pg.pool_size)
                .await
                .context("failed to connect to PostgreSQL")?;
            if pg.ensure_schema {
                storage
                    .ensure_schema()
                    .await
                    .context("failed to create SSO tables")?;
            }
            Ok((
                Arc::new(storage.settings_store()),
                Arc::new(storage.role_mapping_store()),
            ))
        }
    }
}

/// Writes the configured realm seed unless settings were already saved.
async fn seed_realm(cfg: &AppConfig, settings: &dyn SettingsStore) -> anyhow::Result<()> {
    let Some(ref realm) = cfg.realm else {
        return Ok(());
    };
    if settings.load().await?.is_some() {
        tracing::debug!("Realm settings already stored, ignoring configured seed");
        return Ok(());
    }
    save_realm(settings, realm.clone()).await?;
    Ok(())
}

pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let (settings, role_mappings) = build_stores(cfg).await?;
    seed_realm(cfg, settings.as_ref()).await?;

    // Only realm settings and role mappings are persisted; an embedding
    // application supplies its own `UserDirectory`.
    if cfg.storage.backend == StorageBackend::Postgres {
        tracing::warn!(
            "Local users and sessions are kept in memory and are lost on restart; \
             every user is provisioned again on first login"
        );
    }
    let directory: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::default());
    let orchestrator =
        LoginOrchestrator::from_config(&cfg.sso, settings, role_mappings, directory)?;
    let state = SsoState::new(orchestrator, cfg.sso.clone());

    let body_limit = cfg.server.body_limit_bytes;
    Ok(Router::new()
        .route("/healthz", get(handlers::healthz))
        .merge(sso_router(state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    // The query carries the authorization code; log the path only.
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit)))
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<RealmgateServer> {
        let app = build_app(&self.config).await?;
        Ok(RealmgateServer {
            addr: self.config.addr(),
            app,
        })
    }
}

impl RealmgateServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
