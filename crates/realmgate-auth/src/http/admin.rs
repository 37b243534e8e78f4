//! Admin JSON API for realm settings and role mappings.
//!
//! Every handler requires `Authorization: Bearer <admin_token>`. Errors are
//! returned as `{"error": "<code>", "message": "<text>"}`.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts, Path, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::SsoState;
use crate::realm::{MASKED_SECRET, RealmConfig};
use crate::roles::{add_mapping, delete_mapping};
use crate::storage::{
    RoleMapping, RoleMappingStore, SettingsStore, UserDirectory, save_realm,
};
use crate::SsoError;

// =============================================================================
// Admin Auth Extractor
// =============================================================================

/// Proof that the request carried the configured admin token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
    SsoState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = SsoState::from_ref(state);
        let Some(expected) = state.config.admin_token.as_deref() else {
            return Err(ApiError::Unauthorized);
        };

        let presented = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if tokens_match(token, expected) => Ok(Self),
            Some(_) => {
                tracing::debug!("Admin access denied: wrong token");
                Err(ApiError::Unauthorized)
            }
            None => {
                tracing::debug!("Admin access denied: no bearer token");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

// =============================================================================
// Errors
// =============================================================================

/// Error returned by the admin API.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or wrong admin token.
    Unauthorized,
    /// The operation failed.
    Sso(SsoError),
}

impl From<SsoError> for ApiError {
    fn from(e: SsoError) -> Self {
        Self::Sso(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = match self {
            Self::Unauthorized => {
                let body = ErrorBody {
                    error: "unauthorized",
                    message: "Admin token required.".to_string(),
                };
                let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                return response;
            }
            Self::Sso(e) => e,
        };

        let status = match &e {
            SsoError::Config { .. }
            | SsoError::InvalidRoleName { .. }
            | SsoError::UnknownRole { .. } => StatusCode::BAD_REQUEST,
            SsoError::NotConfigured | SsoError::RoleMappingNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            tracing::error!(category = %e.category(), error = %e, "Admin request failed");
            "Internal error.".to_string()
        } else {
            e.to_string()
        };

        let body = ErrorBody {
            error: e.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Realm settings as shown to administrators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsView {
    /// Whether settings were saved.
    pub configured: bool,
    /// Identity provider base URL.
    pub server_url: String,
    /// Realm name.
    pub realm: String,
    /// OAuth client id.
    pub client_id: String,
    /// Masked client secret, empty if none is stored.
    pub client_secret: String,
    /// Redirect URI to register with the realm client.
    pub callback_url: String,
}

impl SettingsView {
    fn new(config: Option<RealmConfig>, callback_url: String) -> Self {
        match config {
            Some(config) => {
                let masked = config.masked();
                Self {
                    configured: true,
                    server_url: masked.server_url,
                    realm: masked.realm,
                    client_id: masked.client_id,
                    client_secret: masked.client_secret,
                    callback_url,
                }
            }
            None => Self {
                configured: false,
                server_url: String::new(),
                realm: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
                callback_url,
            },
        }
    }
}

/// New realm settings.
///
/// Sending the masked placeholder as `client_secret` keeps the stored secret.
#[derive(Clone, Deserialize)]
pub struct SettingsInput {
    pub server_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
}

/// New role mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRoleMapping {
    pub external_role: String,
    pub local_role: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /sso/admin/settings`
pub async fn get_settings_handler(
    _admin: AdminAuth,
    State(state): State<SsoState>,
) -> Result<Json<SettingsView>, ApiError> {
    let stored = state.orchestrator.settings().load().await?;
    Ok(Json(SettingsView::new(stored, state.config.callback_url())))
}

/// `PUT /sso/admin/settings`
pub async fn put_settings_handler(
    _admin: AdminAuth,
    State(state): State<SsoState>,
    Json(input): Json<SettingsInput>,
) -> Result<Json<SettingsView>, ApiError> {
    let store = state.orchestrator.settings();

    let client_secret = if input.client_secret.trim() == MASKED_SECRET {
        store
            .load()
            .await?
            .map(|stored| stored.client_secret)
            .unwrap_or_default()
    } else {
        input.client_secret
    };

    let saved = save_realm(
        store.as_ref(),
        RealmConfig {
            server_url: input.server_url,
            realm: input.realm,
            client_id: input.client_id,
            client_secret,
        },
    )
    .await?;

    Ok(Json(SettingsView::new(Some(saved), state.config.callback_url())))
}

/// `GET /sso/admin/role-mappings`
pub async fn list_role_mappings_handler(
    _admin: AdminAuth,
    State(state): State<SsoState>,
) -> Result<Json<Vec<RoleMapping>>, ApiError> {
    Ok(Json(state.orchestrator.role_mappings().list_all().await?))
}

/// `POST /sso/admin/role-mappings`
pub async fn add_role_mapping_handler(
    _admin: AdminAuth,
    State(state): State<SsoState>,
    Json(input): Json<NewRoleMapping>,
) -> Result<(StatusCode, Json<RoleMapping>), ApiError> {
    let mapping = add_mapping(
        state.orchestrator.role_mappings().as_ref(),
        state.orchestrator.directory().as_ref(),
        &input.external_role,
        &input.local_role,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

/// `DELETE /sso/admin/role-mappings/{id}`
pub async fn delete_role_mapping_handler(
    _admin: AdminAuth,
    State(state): State<SsoState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    delete_mapping(state.orchestrator.role_mappings().as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /sso/admin/roles`
pub async fn list_roles_handler(
    _admin: AdminAuth,
    State(state): State<SsoState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.orchestrator.directory().available_roles().await?))
}
