//! OAuth2 client-credentials token acquisition for Resource Manager

use crate::credentials::Credentials;
use crate::error::AzureError;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

/// Refresh tokens this long before they expire
const EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: DateTime<Utc>,
}

/// Caches one bearer token for a service principal and refreshes it before expiry
#[derive(Debug)]
pub struct TokenProvider {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(client: Client, credentials: &Credentials) -> Self {
        let token_url = format!(
            "{}{}/oauth2/v2.0/token",
            credentials.auth_base_url,
            urlencoding::encode(&credentials.tenant_id)
        );
        let scope = format!("{}/.default", credentials.base_url.trim_end_matches('/'));
        Self {
            client,
            token_url,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            scope,
            cached: Mutex::new(None),
        }
    }

    /// Bearer token, fetched on first use and whenever the cached one is near expiry
    pub async fn token(&self) -> Result<String, AzureError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting access token for client [{}]", self.client_id);
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AzureError::Authentication(format!(
                "token request for client [{}] failed: {} - {}",
                self.client_id, status, body
            )));
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = body.expires_in.unwrap_or(3600);
        let token = CachedToken {
            access_token: body.access_token,
            refresh_at: Utc::now() + Duration::seconds((lifetime - EXPIRY_MARGIN_SECS).max(0)),
        };
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }
}
