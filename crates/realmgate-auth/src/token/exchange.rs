//! Authorization code redemption.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{SsoError, SsoResult};

/// Redeems an authorization code for a signed access token.
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    /// Exchanges `code` at `{token_endpoint}/token`, returning the raw
    /// access token.
    async fn exchange(
        &self,
        code: &str,
        token_endpoint: &str,
        client_id: &str,
        client_secret: &str,
    ) -> SsoResult<String>;
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// HTTP implementation of [`CodeExchanger`].
///
/// Posts a form-encoded `authorization_code` grant carrying the client
/// credentials in the body. Only a `200 OK` with an `access_token` counts as
/// success.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http_client: reqwest::Client,
    redirect_uri: String,
}

impl TokenExchanger {
    /// Creates an exchanger that sends `redirect_uri` verbatim.
    ///
    /// # Errors
    ///
    /// Returns `SsoError::Config` if the HTTP client cannot be built.
    pub fn new(redirect_uri: impl Into<String>, timeout: Duration) -> SsoResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SsoError::config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(http_client, redirect_uri))
    }

    /// Creates an exchanger on top of an existing HTTP client.
    #[must_use]
    pub fn with_client(http_client: reqwest::Client, redirect_uri: impl Into<String>) -> Self {
        Self {
            http_client,
            redirect_uri: redirect_uri.into(),
        }
    }
}

#[async_trait]
impl CodeExchanger for TokenExchanger {
    async fn exchange(
        &self,
        code: &str,
        token_endpoint: &str,
        client_id: &str,
        client_secret: &str,
    ) -> SsoResult<String> {
        let url = format!("{}/token", token_endpoint.trim_end_matches('/'));
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        tracing::debug!(url = %url, client_id, "Exchanging authorization code");

        let response = self
            .http_client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "Token endpoint unreachable");
                SsoError::token_exchange(0, e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SsoError::token_exchange(status, format!("failed to read body: {e}")))?;

        if status != 200 {
            tracing::warn!(url = %url, status, "Token endpoint rejected the authorization code");
            return Err(SsoError::token_exchange(status, body));
        }

        match serde_json::from_str::<TokenResponse>(&body) {
            Ok(TokenResponse {
                access_token: Some(token),
            }) if !token.is_empty() => Ok(token),
            _ => Err(SsoError::token_exchange(status, body)),
        }
    }
}
