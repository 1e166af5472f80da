#![doc = "HTTP remote store for the CLI: bridges the core `RemoteStore` trait to a Nacos-style configuration server."]
//
//! # Remote store integration (CLI <-> Core)
//!
//! This module wires the [`RemoteStore`] trait from `config-sync-core` to a real
//! configuration server reached over HTTP, using the server's open API:
//!
//! - `GET    /nacos/v1/cs/configs?dataId&group[&tenant]`: read content (404 = absent)
//! - `POST   /nacos/v1/cs/configs` (form: dataId, group, content, type[, tenant]): publish
//! - `DELETE /nacos/v1/cs/configs?dataId&group[&tenant]`: remove
//! - `POST   /nacos/v1/auth/login`: obtain an `accessToken` when credentials are set
//!
//! Every transport or server error is logged here and reported to the core as
//! `None` / `false`; nothing crosses the trait boundary as an error.

use async_trait::async_trait;
use config_sync_core::contract::{RemoteStore, EXISTS_TIMEOUT};
use config_sync_core::metadata::ConfigMetadata;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const CONFIGS_PATH: &str = "/nacos/v1/cs/configs";
const LOGIN_PATH: &str = "/nacos/v1/auth/login";

/// Connection settings for the configuration server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub server_addr: String,
    /// Tenant / namespace id; empty means the server's public namespace.
    pub namespace: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Default request timeout, used when the caller does not supply one.
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            server_addr: "localhost:8848".to_string(),
            namespace: None,
            username: None,
            password: None,
            timeout_ms: 5000,
        }
    }
}

/// Tokens are renewed this long before the server-side expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    /// Lifetime in seconds; absent means the token never expires.
    #[serde(default)]
    token_ttl: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Option<Instant>,
}

impl CachedToken {
    fn from_login(login: LoginResponse, now: Instant) -> Self {
        let refresh_at = login
            .token_ttl
            .map(|ttl| now + Duration::from_secs(ttl).saturating_sub(TOKEN_REFRESH_MARGIN));
        Self {
            value: login.access_token,
            refresh_at,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.refresh_at.map_or(true, |at| now < at)
    }
}

pub struct HttpConfigStore {
    client: reqwest::Client,
    base_url: String,
    namespace: Option<String>,
    credentials: Option<(String, String)>,
    access_token: Mutex<Option<CachedToken>>,
}

impl HttpConfigStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                e
            })?;
        let base_url = normalise_base_url(&config.server_addr);
        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };
        tracing::info!(
            base_url = %base_url,
            namespace = config.namespace.as_deref().unwrap_or(""),
            auth = credentials.is_some(),
            "Initialized HttpConfigStore"
        );
        Ok(Self {
            client,
            base_url,
            namespace: config.namespace.clone().filter(|ns| !ns.is_empty()),
            credentials,
            access_token: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query parameters shared by every config call.
    async fn params(&self, data_id: &str, group: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![("dataId", data_id.to_string()), ("group", group.to_string())];
        if let Some(ns) = &self.namespace {
            params.push(("tenant", ns.clone()));
        }
        if let Some(token) = self.token().await {
            params.push(("accessToken", token));
        }
        params
    }

    /// Cached access token, logging in again once it is close to expiry.
    async fn token(&self) -> Option<String> {
        let (username, password) = self.credentials.as_ref()?;
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Some(token.value.clone());
        }

        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let result = self
            .client
            .post(&url)
            .form(&[("username", username.as_str()), ("password", password.as_str())])
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => match resp.json::<LoginResponse>().await {
                Ok(login) => {
                    tracing::info!(token_ttl = ?login.token_ttl, "Logged in to configuration server");
                    let token = CachedToken::from_login(login, Instant::now());
                    let value = token.value.clone();
                    *cached = Some(token);
                    Some(value)
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to decode login response");
                    None
                }
            },
            Ok(resp) => {
                tracing::error!(status = %resp.status(), "Login to configuration server rejected");
                None
            }
            Err(e) => {
                tracing::error!(error = ?e, "Login request failed");
                None
            }
        }
    }
}

fn normalise_base_url(server_addr: &str) -> String {
    let trimmed = server_addr.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Servers answer writes with a literal `true` / `false` body.
fn body_is_true(body: &str) -> bool {
    body.trim().eq_ignore_ascii_case("true")
}

#[async_trait]
impl RemoteStore for HttpConfigStore {
    async fn get(&self, data_id: &str, group: &str, timeout: Duration) -> Option<String> {
        let url = format!("{}{}", self.base_url, CONFIGS_PATH);
        let params = self.params(data_id, group).await;
        let result = self
            .client
            .get(&url)
            .query(&params)
            .timeout(timeout)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => {
                tracing::debug!(data_id, group, "Config not found on server");
                None
            }
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(content) => Some(content),
                Err(e) => {
                    tracing::error!(error = ?e, data_id, group, "Failed to read config body");
                    None
                }
            },
            Ok(resp) => {
                tracing::error!(status = %resp.status(), data_id, group, "Server error fetching config");
                None
            }
            Err(e) => {
                tracing::error!(error = ?e, data_id, group, "Failed to fetch config");
                None
            }
        }
    }

    async fn exists(&self, data_id: &str, group: &str) -> bool {
        self.get(data_id, group, EXISTS_TIMEOUT)
            .await
            .map(|content| !content.trim().is_empty())
            .unwrap_or(false)
    }

    async fn publish(&self, metadata: &ConfigMetadata) -> bool {
        let group = metadata.effective_group();
        tracing::info!(
            data_id = %metadata.data_id,
            group,
            namespace = %metadata.namespace,
            "Publishing config"
        );
        let url = format!("{}{}", self.base_url, CONFIGS_PATH);
        let mut form = self.params(&metadata.data_id, group).await;
        form.push(("content", metadata.content_text()));
        form.push(("type", metadata.config_type().as_str().to_string()));

        match self.client.post(&url).form(&form).send().await {
            Ok(resp) if resp.status().is_success() => {
                let ok = resp.text().await.map(|b| body_is_true(&b)).unwrap_or(false);
                if ok {
                    tracing::info!(data_id = %metadata.data_id, group, "Successfully published config");
                } else {
                    tracing::warn!(data_id = %metadata.data_id, group, "Server refused to publish config");
                }
                ok
            }
            Ok(resp) => {
                tracing::error!(status = %resp.status(), data_id = %metadata.data_id, group, "Server error publishing config");
                false
            }
            Err(e) => {
                tracing::error!(error = ?e, data_id = %metadata.data_id, group, "Failed to publish config");
                false
            }
        }
    }

    async fn remove(&self, data_id: &str, group: &str) -> bool {
        tracing::info!(data_id, group, "Removing config");
        let url = format!("{}{}", self.base_url, CONFIGS_PATH);
        let params = self.params(data_id, group).await;
        match self.client.delete(&url).query(&params).send().await {
            Ok(resp) if resp.status().is_success() => {
                resp.text().await.map(|b| body_is_true(&b)).unwrap_or(false)
            }
            Ok(resp) => {
                tracing::error!(status = %resp.status(), data_id, group, "Server error removing config");
                false
            }
            Err(e) => {
                tracing::error!(error = ?e, data_id, group, "Failed to remove config");
                false
            }
        }
    }
}
