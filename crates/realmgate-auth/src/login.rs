//! Login orchestration.
//!
//! Drives one authorization-code callback from the browser to an established
//! local session:
//!
//! ```text
//! Start -> IssuerChecked -> CodeExchanged -> TokenVerified
//!       -> IdentityReconciled -> RolesApplied -> SessionEstablished
//! ```
//!
//! Any error moves the flow to `Aborted`. Nothing is retried and nothing
//! already written is rolled back.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::SsoConfig;
use crate::realm::{DescriptorCache, DescriptorSource, RealmDescriptorFetcher};
use crate::reconcile::{IdentityReconciler, ReconcileAction};
use crate::roles::RoleMapper;
use crate::storage::{LoginSession, RoleMappingStore, SettingsStore, UserDirectory, load_realm};
use crate::token::{CodeExchanger, TokenExchanger, verifier};
use crate::{SsoError, SsoResult};

/// Progress of a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// Callback received.
    Start,
    /// The callback issuer is the configured realm.
    IssuerChecked,
    /// The code was redeemed for a token.
    CodeExchanged,
    /// Signature, expiry and session of the token hold.
    TokenVerified,
    /// A local user exists for the token.
    IdentityReconciled,
    /// Local roles reflect the realm roles.
    RolesApplied,
    /// A local session was started.
    SessionEstablished,
    /// The login failed.
    Aborted,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::IssuerChecked => "issuer_checked",
            Self::CodeExchanged => "code_exchanged",
            Self::TokenVerified => "token_verified",
            Self::IdentityReconciled => "identity_reconciled",
            Self::RolesApplied => "roles_applied",
            Self::SessionEstablished => "session_established",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Query parameters of the authorization callback.
#[derive(Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Issuer that sent the browser back.
    #[serde(default)]
    pub iss: Option<String>,
    /// Authorization code.
    #[serde(default)]
    pub code: Option<String>,
    /// Realm session the code belongs to.
    #[serde(default)]
    pub session_state: Option<String>,
}

impl fmt::Debug for CallbackParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackParams")
            .field("iss", &self.iss)
            .field("code", &self.code.as_ref().map(|_| "[redacted]"))
            .field("session_state", &self.session_state)
            .finish()
    }
}

impl CallbackParams {
    /// Creates callback parameters with every field set.
    #[must_use]
    pub fn new(
        iss: impl Into<String>,
        code: impl Into<String>,
        session_state: impl Into<String>,
    ) -> Self {
        Self {
            iss: Some(iss.into()),
            code: Some(code.into()),
            session_state: Some(session_state.into()),
        }
    }

    /// Returns `(iss, code, session_state)` if all are present and not blank.
    ///
    /// # Errors
    ///
    /// Returns `MissingParameter` naming the first missing parameter.
    pub fn require(&self) -> SsoResult<(&str, &str, &str)> {
        Ok((
            required(self.iss.as_deref(), "iss")?,
            required(self.code.as_deref(), "code")?,
            required(self.session_state.as_deref(), "session_state")?,
        ))
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> SsoResult<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SsoError::missing_parameter(name))
}

/// A completed login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// The logged-in local user.
    pub user_id: String,
    /// What reconciliation did.
    pub action: ReconcileAction,
    /// Local roles granted from realm roles. Empty when no mapping exists.
    pub roles: Vec<String>,
    /// The new local session.
    pub session: LoginSession,
}

/// Runs the authorization-code login flow.
#[derive(Clone)]
pub struct LoginOrchestrator {
    settings: Arc<dyn SettingsStore>,
    role_mappings: Arc<dyn RoleMappingStore>,
    directory: Arc<dyn UserDirectory>,
    descriptors: Arc<dyn DescriptorSource>,
    exchanger: Arc<dyn CodeExchanger>,
    reconciler: IdentityReconciler,
    session_ttl: Duration,
}

impl LoginOrchestrator {
    /// Assembles an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        role_mappings: Arc<dyn RoleMappingStore>,
        directory: Arc<dyn UserDirectory>,
        descriptors: Arc<dyn DescriptorSource>,
        exchanger: Arc<dyn CodeExchanger>,
    ) -> Self {
        Self {
            reconciler: IdentityReconciler::new(directory.clone()),
            settings,
            role_mappings,
            directory,
            descriptors,
            exchanger,
            session_ttl: SsoConfig::default().session_ttl,
        }
    }

    /// Assembles an orchestrator talking HTTP to the realm, with a
    /// descriptor cache and the callback URL taken from `config`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if an HTTP client cannot be built.
    pub fn from_config(
        config: &SsoConfig,
        settings: Arc<dyn SettingsStore>,
        role_mappings: Arc<dyn RoleMappingStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> SsoResult<Self> {
        // One connection pool for both realm endpoints.
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SsoError::config(format!("Failed to create HTTP client: {e}")))?;
        let fetcher = RealmDescriptorFetcher::with_client(http_client.clone());
        let descriptors = DescriptorCache::new(fetcher, config.descriptor_cache_ttl);
        let exchanger = TokenExchanger::with_client(http_client, config.callback_url());
        Ok(Self::new(
            settings,
            role_mappings,
            directory,
            Arc::new(descriptors),
            Arc::new(exchanger),
        )
        .with_session_ttl(config.session_ttl))
    }

    /// Sets the lifetime of established sessions.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// The settings store logins read from.
    #[must_use]
    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// The user directory logins write to.
    #[must_use]
    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    /// The role mapping store logins read from.
    #[must_use]
    pub fn role_mappings(&self) -> &Arc<dyn RoleMappingStore> {
        &self.role_mappings
    }

    /// Handles an authorization callback.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the flow. It has already been logged
    /// together with the state the flow had reached.
    pub async fn handle_callback(&self, params: &CallbackParams) -> SsoResult<LoginOutcome> {
        let mut state = LoginState::Start;
        match self.run(params, &mut state).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(
                    reached = %state,
                    state = %LoginState::Aborted,
                    category = %e.category(),
                    error = %e,
                    "Login aborted"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, params: &CallbackParams, state: &mut LoginState) -> SsoResult<LoginOutcome> {
        let (iss, code, session_state) = params.require()?;

        let realm = load_realm(self.settings.as_ref()).await?;
        if iss != realm.issuer() {
            return Err(SsoError::IssuerMismatch);
        }
        advance(state, LoginState::IssuerChecked);

        let descriptor = self.descriptors.descriptor(&realm).await?;
        let token = self
            .exchanger
            .exchange(
                code,
                &descriptor.token_endpoint,
                &realm.client_id,
                &realm.client_secret,
            )
            .await?;
        advance(state, LoginState::CodeExchanged);

        let claims = match verifier::verify(&token, &descriptor.public_key, session_state) {
            Ok(claims) => claims,
            Err(e) => {
                if e.invalidates_descriptor() {
                    self.descriptors.invalidate(&realm).await;
                }
                return Err(e);
            }
        };
        advance(state, LoginState::TokenVerified);

        let reconciled = self.reconciler.reconcile_detailed(&claims).await?;
        if reconciled.action.created_user() {
            tracing::info!(
                user_id = %reconciled.user_id,
                action = %reconciled.action,
                "Provisioned local user"
            );
        }
        advance(state, LoginState::IdentityReconciled);

        let mapper = RoleMapper::load(self.role_mappings.as_ref()).await?;
        let roles = mapper
            .apply_to(self.directory.as_ref(), &reconciled.user_id, &claims)
            .await?;
        advance(state, LoginState::RolesApplied);

        let session = self
            .directory
            .establish_session(&reconciled.user_id, self.session_ttl)
            .await?;
        advance(state, LoginState::SessionEstablished);

        tracing::info!(
            user_id = %reconciled.user_id,
            action = %reconciled.action,
            realm = %realm.realm,
            "Login completed"
        );

        Ok(LoginOutcome {
            user_id: reconciled.user_id,
            action: reconciled.action,
            roles,
            session,
        })
    }
}

fn advance(state: &mut LoginState, next: LoginState) {
    *state = next;
    tracing::debug!(state = %next, "Login state");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::{RealmConfig, RealmDescriptor};
    use crate::storage::{MemoryRoleMappingStore, MemorySettingsStore, MemoryUserDirectory};
    use crate::testing::{keycloak_claims, other_key, test_key};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ISSUER: &str = "https://id.example.com/realms/staff";

    /// Stand-in for the realm: serves a descriptor and answers exchanges
    /// with a fixed token, counting every call.
    struct FakeRealm {
        public_key: String,
        token: String,
        descriptor_calls: AtomicUsize,
        exchange_calls: AtomicUsize,
        invalidations: AtomicUsize,
    }

    impl FakeRealm {
        fn new(token: String) -> Arc<Self> {
            Arc::new(Self {
                public_key: test_key().public_key_b64.clone(),
                token,
                descriptor_calls: AtomicUsize::new(0),
                exchange_calls: AtomicUsize::new(0),
                invalidations: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> (usize, usize) {
            (
                self.descriptor_calls.load(Ordering::SeqCst),
                self.exchange_calls.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl DescriptorSource for FakeRealm {
        async fn descriptor(&self, _config: &RealmConfig) -> SsoResult<RealmDescriptor> {
            self.descriptor_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RealmDescriptor {
                public_key: self.public_key.clone(),
                token_endpoint: format!("{ISSUER}/protocol/openid-connect"),
                account_service_url: format!("{ISSUER}/account"),
            })
        }

        async fn invalidate(&self, _config: &RealmConfig) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CodeExchanger for FakeRealm {
        async fn exchange(
            &self,
            code: &str,
            token_endpoint: &str,
            client_id: &str,
            client_secret: &str,
        ) -> SsoResult<String> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(token_endpoint, format!("{ISSUER}/protocol/openid-connect"));
            assert_eq!(client_id, "intranet");
            assert_eq!(client_secret, "s3cret");
            if code == "bad-code" {
                return Err(SsoError::token_exchange(400, r#"{"error":"invalid_grant"}"#));
            }
            Ok(self.token.clone())
        }
    }

    struct Harness {
        realm: Arc<FakeRealm>,
        directory: Arc<MemoryUserDirectory>,
        mappings: Arc<MemoryRoleMappingStore>,
        orchestrator: LoginOrchestrator,
    }

    fn harness_with(token: String, settings: MemorySettingsStore) -> Harness {
        let realm = FakeRealm::new(token);
        let directory = Arc::new(MemoryUserDirectory::default());
        let mappings = Arc::new(MemoryRoleMappingStore::new());
        let orchestrator = LoginOrchestrator::new(
            Arc::new(settings),
            mappings.clone(),
            directory.clone(),
            realm.clone(),
            realm.clone(),
        );
        Harness {
            realm,
            directory,
            mappings,
            orchestrator,
        }
    }

    fn harness(token: String) -> Harness {
        let settings = MemorySettingsStore::with_config(RealmConfig::new(
            "https://id.example.com",
            "staff",
            "intranet",
            "s3cret",
        ));
        harness_with(token, settings)
    }

    fn valid_token(roles: &[&str]) -> String {
        test_key().token(&keycloak_claims("S1", "ada@example.com", "sess-1", roles))
    }

    #[tokio::test]
    async fn test_successful_login() {
        let h = harness(valid_token(&["editors"]));
        h.mappings.insert("editors", "editor").await.unwrap();

        let outcome = h
            .orchestrator
            .handle_callback(&CallbackParams::new(ISSUER, "code-1", "sess-1"))
            .await
            .unwrap();

        assert_eq!(outcome.action, ReconcileAction::Created);
        assert_eq!(outcome.roles, vec!["editor"]);
        assert_eq!(outcome.session.user_id, outcome.user_id);
        assert!(h.directory.session(&outcome.session.token).await.is_some());
        assert_eq!(
            h.directory.list_local_roles(&outcome.user_id).await.unwrap(),
            vec!["editor"]
        );
        assert_eq!(h.realm.calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_second_login_updates_same_user() {
        let h = harness(valid_token(&[]));
        let params = CallbackParams::new(ISSUER, "code-1", "sess-1");
        let first = h.orchestrator.handle_callback(&params).await.unwrap();
        let second = h.orchestrator.handle_callback(&params).await.unwrap();
        assert_eq!(second.action, ReconcileAction::Updated);
        assert_eq!(first.user_id, second.user_id);
    }

    #[tokio::test]
    async fn test_missing_session_state_aborts_before_any_call() {
        let h = harness(valid_token(&[]));
        let params = CallbackParams {
            session_state: Some("  ".to_string()),
            ..CallbackParams::new(ISSUER, "code-1", "")
        };
        let err = h.orchestrator.handle_callback(&params).await.unwrap_err();
        assert!(matches!(
            err,
            SsoError::MissingParameter {
                name: "session_state"
            }
        ));
        assert_eq!(h.realm.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_missing_parameters_are_named() {
        let h = harness(valid_token(&[]));
        let err = h
            .orchestrator
            .handle_callback(&CallbackParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::MissingParameter { name: "iss" }));

        let params = CallbackParams {
            code: None,
            ..CallbackParams::new(ISSUER, "", "sess-1")
        };
        let err = h.orchestrator.handle_callback(&params).await.unwrap_err();
        assert!(matches!(err, SsoError::MissingParameter { name: "code" }));
    }

    #[tokio::test]
    async fn test_issuer_mismatch_never_exchanges() {
        let h = harness(valid_token(&[]));
        let params = CallbackParams::new("https://evil.example.com/realms/staff", "code-1", "sess-1");
        let err = h.orchestrator.handle_callback(&params).await.unwrap_err();
        assert!(matches!(err, SsoError::IssuerMismatch));
        assert_eq!(h.realm.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_issuer_compared_without_normalization() {
        let h = harness(valid_token(&[]));
        let params = CallbackParams::new(format!("{ISSUER}/"), "code-1", "sess-1");
        let err = h.orchestrator.handle_callback(&params).await.unwrap_err();
        assert!(matches!(err, SsoError::IssuerMismatch));
    }

    #[tokio::test]
    async fn test_not_configured() {
        let h = harness_with(valid_token(&[]), MemorySettingsStore::new());
        let err = h
            .orchestrator
            .handle_callback(&CallbackParams::new(ISSUER, "code-1", "sess-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::NotConfigured));
    }

    #[tokio::test]
    async fn test_exchange_failure_aborts() {
        let h = harness(valid_token(&[]));
        let err = h
            .orchestrator
            .handle_callback(&CallbackParams::new(ISSUER, "bad-code", "sess-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::TokenExchange { status: 400, .. }));
        assert!(h.directory.users().await.is_empty());
    }

    #[tokio::test]
    async fn test_session_mismatch_creates_no_user() {
        let h = harness(valid_token(&[]));
        let err = h
            .orchestrator
            .handle_callback(&CallbackParams::new(ISSUER, "code-1", "sess-other"))
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::SessionMismatch));
        assert!(h.directory.users().await.is_empty());
        assert_eq!(h.realm.invalidations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_signature_invalidates_descriptor() {
        let token = other_key().token(&keycloak_claims("S1", "ada@example.com", "sess-1", &[]));
        let h = harness(token);
        let err = h
            .orchestrator
            .handle_callback(&CallbackParams::new(ISSUER, "code-1", "sess-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::InvalidSignature));
        assert_eq!(h.realm.invalidations.load(Ordering::SeqCst), 1);
        assert!(h.directory.users().await.is_empty());
    }

    #[test]
    fn test_callback_params_debug_hides_code() {
        let debug = format!("{:?}", CallbackParams::new(ISSUER, "secret-code", "sess-1"));
        assert!(!debug.contains("secret-code"));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LoginState::IssuerChecked.to_string(), "issuer_checked");
        assert_eq!(LoginState::Aborted.to_string(), "aborted");
    }
}
