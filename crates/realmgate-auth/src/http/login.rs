//! Browser-facing login handlers.
//!
//! `GET /sso/login` is the authorization callback registered with the realm.
//! On success the browser receives a session cookie and is redirected to the
//! home URL; on failure it gets an HTML error page.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::SsoState;
use super::pages::render_login_error;
use crate::config::CookieConfig;
use crate::error::ErrorCategory;
use crate::login::CallbackParams;
use crate::storage::{UserDirectory, load_realm};
use crate::SsoError;

// =============================================================================
// Handlers
// =============================================================================

/// Handles the authorization callback.
pub async fn login_handler(
    State(state): State<SsoState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    let home_url = state.config.home_url();
    match state.orchestrator.handle_callback(&params).await {
        Ok(outcome) => {
            let cookie = session_cookie(
                &state.config.cookie,
                outcome.session.token,
                state.config.session_ttl,
            );
            (jar.add(cookie), Redirect::to(&home_url)).into_response()
        }
        Err(e) => login_error_response(&e, &home_url),
    }
}

/// Redirects the browser to the realm's login page.
pub async fn start_handler(State(state): State<SsoState>) -> Response {
    match load_realm(state.orchestrator.settings().as_ref()).await {
        Ok(realm) => Redirect::to(&realm.login_url(&state.config.callback_url())).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot start login");
            login_error_response(&e, &state.config.home_url())
        }
    }
}

/// Ends the local session and sends the browser through the realm logout.
///
/// Without realm settings the browser goes straight to the home URL.
pub async fn logout_handler(State(state): State<SsoState>, jar: CookieJar) -> Response {
    let cookie_config = &state.config.cookie;
    let home_url = state.config.home_url();

    if let Some(cookie) = jar.get(&cookie_config.name) {
        let directory = state.orchestrator.directory();
        if let Err(e) = directory.end_session(cookie.value()).await {
            tracing::warn!(error = %e, "Failed to end local session");
        }
    }

    let jar = jar.remove(Cookie::build(cookie_config.name.clone()).path(cookie_config.path.clone()));

    let target = match load_realm(state.orchestrator.settings().as_ref()).await {
        Ok(realm) => realm.logout_url(&home_url),
        Err(e) => {
            tracing::debug!(error = %e, "No realm to log out of, redirecting home");
            home_url
        }
    };

    (jar, Redirect::to(&target)).into_response()
}

// =============================================================================
// Helpers
// =============================================================================

/// Builds the local session cookie.
fn session_cookie(config: &CookieConfig, token: String, ttl: Duration) -> Cookie<'static> {
    let max_age = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    Cookie::build((config.name.clone(), token))
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .path(config.path.clone())
        .max_age(time::Duration::seconds(max_age))
        .build()
}

/// HTTP status for a failed login.
pub(crate) fn login_status(error: &SsoError) -> StatusCode {
    match error.category() {
        ErrorCategory::Request => StatusCode::BAD_REQUEST,
        ErrorCategory::Token => StatusCode::UNAUTHORIZED,
        ErrorCategory::Network => StatusCode::BAD_GATEWAY,
        ErrorCategory::Configuration => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Directory | ErrorCategory::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn login_error_response(error: &SsoError, home_url: &str) -> Response {
    (
        login_status(error),
        Html(render_login_error(error, home_url)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LOGIN_ERROR_PREFIX;
    use crate::http::sso_router;
    use crate::http::test_support::{body_string, fixture, realm_config};
    use crate::storage::RoleMappingStore;
    use crate::testing::{keycloak_claims, test_key};
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;

    const CALLBACK: &str =
        "/sso/login?iss=https%3A%2F%2Fidp.example.com%2Frealms%2Fmain&code=abc&session_state=sess-1";

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_login_sets_cookie_and_redirects_home() {
        let token = test_key().token(&keycloak_claims("S1", "ada@example.com", "sess-1", &["editors"]));
        let f = fixture(Some(realm_config()), token, false);
        f.role_mappings.insert("editors", "editor").await.unwrap();

        let response = sso_router(f.state.clone()).oneshot(get(CALLBACK)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://site.example.com/"
        );

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("realmgate_session="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Secure"));
        assert!(set_cookie.contains("SameSite=Lax"));

        let token = set_cookie
            .trim_start_matches("realmgate_session=")
            .split(';')
            .next()
            .unwrap();
        let session = f.directory.session(token).await.unwrap();
        assert_eq!(
            f.directory.list_local_roles(&session.user_id).await.unwrap(),
            vec!["editor"]
        );
    }

    #[tokio::test]
    async fn test_missing_parameter_renders_error_page() {
        let f = fixture(Some(realm_config()), String::new(), false);
        let response = sso_router(f.state)
            .oneshot(get("/sso/login?iss=x&code=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let body = body_string(response).await;
        assert!(body.contains(LOGIN_ERROR_PREFIX));
        assert!(body.contains("No session state received."));
    }

    #[tokio::test]
    async fn test_bad_token_is_unauthorized() {
        let f = fixture(Some(realm_config()), "not.a.token".to_string(), false);
        let response = sso_router(f.state).oneshot(get(CALLBACK)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(f.directory.users().await.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_login_is_unavailable() {
        let f = fixture(None, String::new(), false);
        let response = sso_router(f.state).oneshot(get(CALLBACK)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_start_redirects_to_realm() {
        let f = fixture(Some(realm_config()), String::new(), false);
        let response = sso_router(f.state).oneshot(get("/sso/start")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with(
            "https://idp.example.com/realms/main/protocol/openid-connect/auth?"
        ));
        assert!(location.contains("client_id=site"));
        assert!(location.contains("redirect_uri=https%3A%2F%2Fsite.example.com%2Fsso%2Flogin"));
    }

    #[tokio::test]
    async fn test_logout_ends_session_and_clears_cookie() {
        let f = fixture(Some(realm_config()), String::new(), false);
        let user_id = f
            .directory
            .create(&crate::storage::UserFields {
                login: "ada".to_string(),
                email: "ada@example.com".to_string(),
                given_name: String::new(),
                family_name: String::new(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        let session = f
            .directory
            .establish_session(&user_id, Duration::from_secs(60))
            .await
            .unwrap();

        let request = Request::builder()
            .uri("/sso/logout")
            .header(header::COOKIE, format!("realmgate_session={}", session.token))
            .body(Body::empty())
            .unwrap();
        let response = sso_router(f.state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with(
            "https://idp.example.com/realms/main/protocol/openid-connect/logout?"
        ));
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("realmgate_session="));
        assert!(set_cookie.contains("Max-Age=0"));
        assert!(f.directory.session(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn test_logout_without_realm_goes_home() {
        let f = fixture(None, String::new(), false);
        let response = sso_router(f.state).oneshot(get("/sso/logout")).await.unwrap();
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://site.example.com/"
        );
    }

    #[test]
    fn test_login_status() {
        assert_eq!(login_status(&SsoError::IssuerMismatch), StatusCode::BAD_REQUEST);
        assert_eq!(login_status(&SsoError::InvalidSignature), StatusCode::UNAUTHORIZED);
        assert_eq!(login_status(&SsoError::network("down")), StatusCode::BAD_GATEWAY);
        assert_eq!(
            login_status(&SsoError::storage("db")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
