//! End-to-end login against a mocked Keycloak realm.

use std::sync::OnceLock;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use realmgate_auth::{LOGIN_ERROR_PREFIX, RealmConfig};
use realmgate_server::{AppConfig, build_app};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REALM: &str = "main";
const SITE: &str = "https://intranet.example.com";
const ADMIN_TOKEN: &str = "let-me-in";

struct RealmKey {
    private_pem: String,
    public_key: String,
}

fn realm_key() -> &'static RealmKey {
    static KEY: OnceLock<RealmKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).expect("rsa key");
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("pkcs8 pem")
            .to_string();
        // Keycloak publishes the key as a PEM body without armor.
        let public_key = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("public pem")
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        RealmKey {
            private_pem,
            public_key,
        }
    })
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn access_token(sub: &str, email: &str, session_state: &str) -> String {
    let claims = json!({
        "exp": unix_now() + 300,
        "iat": unix_now(),
        "sub": sub,
        "session_state": session_state,
        "email": email,
        "preferred_username": email.split('@').next().unwrap(),
        "given_name": "Grace",
        "family_name": "Hopper",
        "realm_access": {"roles": ["editors", "offline_access"]}
    });
    let key = EncodingKey::from_rsa_pem(realm_key().private_pem.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
}

/// Mounts the realm descriptor and a token endpoint answering `token`.
async fn mock_realm(token: &str) -> MockServer {
    let idp = MockServer::start().await;
    let issuer = format!("{}/realms/{REALM}", idp.uri());

    Mock::given(method("GET"))
        .and(path(format!("/realms/{REALM}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "realm": REALM,
            "public_key": realm_key().public_key,
            "token-service": format!("{issuer}/protocol/openid-connect"),
            "account-service": format!("{issuer}/account"),
            "tokens-not-before": 0
        })))
        .mount(&idp)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/realms/{REALM}/protocol/openid-connect/token")))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": 300
        })))
        .mount(&idp)
        .await;

    idp
}

fn app_config(idp: &MockServer) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.sso.base_url = SITE.to_string();
    cfg.sso.admin_token = Some(ADMIN_TOKEN.to_string());
    cfg.realm = Some(RealmConfig::new(idp.uri(), REALM, "intranet", "s3cr3t"));
    cfg
}

async fn start_server(cfg: AppConfig) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let app = build_app(&cfg).await.expect("build app");

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn callback_url(base: &str, iss: &str, session_state: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("iss", iss)
        .append_pair("code", "the-code")
        .append_pair("session_state", session_state)
        .finish();
    format!("{base}/sso/login?{query}")
}

#[tokio::test]
async fn login_redirects_home_with_session_cookie() {
    let idp = mock_realm(&access_token("kc-1", "grace@example.com", "sess-1")).await;
    let issuer = format!("{}/realms/{REALM}", idp.uri());
    let (base, shutdown_tx, handle) = start_server(app_config(&idp)).await;
    let client = client();

    // Map the realm role before logging in
    let resp = client
        .post(format!("{base}/sso/admin/role-mappings"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({"external_role": "editors", "local_role": "editor"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .get(callback_url(&base, &issuer, "sess-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 303);
    assert_eq!(resp.headers()["location"], format!("{SITE}/"));

    let cookie = resp.headers()["set-cookie"].to_str().unwrap();
    assert!(cookie.starts_with("realmgate_session="));
    assert!(cookie.contains("HttpOnly"));

    // The code was redeemed once
    let token_calls = idp
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .count();
    assert_eq!(token_calls, 1);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn login_rejects_foreign_issuer_without_calling_realm() {
    let idp = mock_realm(&access_token("kc-1", "grace@example.com", "sess-1")).await;
    let (base, shutdown_tx, handle) = start_server(app_config(&idp)).await;

    let resp = client()
        .get(callback_url(&base, "https://evil.example.com/realms/main", "sess-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert!(resp.headers().get("set-cookie").is_none());

    let body = resp.text().await.unwrap();
    assert!(body.contains(LOGIN_ERROR_PREFIX));
    assert!(body.contains("Issuer does not match."));
    assert!(idp.received_requests().await.unwrap().is_empty());

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn login_rejects_session_mismatch() {
    let idp = mock_realm(&access_token("kc-1", "grace@example.com", "sess-1")).await;
    let issuer = format!("{}/realms/{REALM}", idp.uri());
    let (base, shutdown_tx, handle) = start_server(app_config(&idp)).await;

    let resp = client()
        .get(callback_url(&base, &issuer, "sess-other"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Session state does not match."));

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn health_and_admin_settings() {
    let idp = mock_realm("unused").await;
    let (base, shutdown_tx, handle) = start_server(app_config(&idp)).await;
    let client = client();

    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let resp = client
        .get(format!("{base}/sso/admin/settings"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{base}/sso/admin/settings"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["configured"], true);
    assert_eq!(body["client_id"], "intranet");
    assert_ne!(body["client_secret"], "s3cr3t");
    assert_eq!(body["callback_url"], format!("{SITE}/sso/login"));

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
