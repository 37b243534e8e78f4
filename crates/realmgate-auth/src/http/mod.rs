//! Axum handlers for the single sign-on endpoints.
//!
//! | Route                               | Handler                  |
//! |-------------------------------------|--------------------------|
//! | `GET /sso/login`                    | authorization callback   |
//! | `GET /sso/start`                    | redirect to the realm    |
//! | `GET /sso/logout`                   | end the local session    |
//! | `GET, PUT /sso/admin/settings`      | realm settings           |
//! | `GET, POST /sso/admin/role-mappings`| role mapping table       |
//! | `DELETE /sso/admin/role-mappings/{id}` | remove one mapping    |
//! | `GET /sso/admin/roles`              | local role registry      |
//!
//! The admin routes are only mounted when an admin token is configured.
//!
//! # Usage
//!
//! ```ignore
//! use realmgate_auth::http::{SsoState, sso_router};
//!
//! let app = axum::Router::new().merge(sso_router(SsoState::new(orchestrator, config)));
//! ```

pub mod admin;
pub mod login;
pub mod pages;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get},
};

use crate::config::{CALLBACK_PATH, SsoConfig};
use crate::login::LoginOrchestrator;

pub use admin::{
    AdminAuth, ApiError, NewRoleMapping, SettingsInput, SettingsView, add_role_mapping_handler,
    delete_role_mapping_handler, get_settings_handler, list_role_mappings_handler,
    list_roles_handler, put_settings_handler,
};
pub use login::{login_handler, logout_handler, start_handler};
pub use pages::render_login_error;

/// Path that starts a login.
pub const START_PATH: &str = "/sso/start";

/// Path that ends a login.
pub const LOGOUT_PATH: &str = "/sso/logout";

/// State shared by the single sign-on handlers.
#[derive(Clone)]
pub struct SsoState {
    /// The login flow and its stores.
    pub orchestrator: LoginOrchestrator,
    /// Public URLs, cookie and admin settings.
    pub config: Arc<SsoConfig>,
}

impl SsoState {
    /// Creates handler state.
    #[must_use]
    pub fn new(orchestrator: LoginOrchestrator, config: SsoConfig) -> Self {
        Self {
            orchestrator,
            config: Arc::new(config),
        }
    }
}

/// Builds the router for every single sign-on endpoint.
pub fn sso_router(state: SsoState) -> Router {
    let mut router = Router::new()
        .route(CALLBACK_PATH, get(login_handler))
        .route(START_PATH, get(start_handler))
        .route(LOGOUT_PATH, get(logout_handler));

    if state.config.admin_token.is_some() {
        router = router.merge(admin_routes());
    } else {
        tracing::info!("No admin token configured, SSO admin API disabled");
    }

    router.with_state(state)
}

fn admin_routes() -> Router<SsoState> {
    Router::new()
        .route(
            "/sso/admin/settings",
            get(get_settings_handler).put(put_settings_handler),
        )
        .route(
            "/sso/admin/role-mappings",
            get(list_role_mappings_handler).post(add_role_mapping_handler),
        )
        .route(
            "/sso/admin/role-mappings/{id}",
            delete(delete_role_mapping_handler),
        )
        .route("/sso/admin/roles", get(list_roles_handler))
}
