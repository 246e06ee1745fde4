//! Favorites API client.
//!
//! Routes, relative to `base_url`:
//! - `GET    /api/v1/users/{user}/favorites/{category}` returns `FavoriteIds`
//! - `PUT    /api/v1/users/{user}/favorites/{category}/{id}` favorites
//! - `DELETE /api/v1/users/{user}/favorites/{category}/{id}` unfavorites

use crate::error::{SyncError, SyncResult};
use crate::gateway::FavoritesGateway;
use async_trait::async_trait;
use favorites_types::{Category, EntityId, FavoriteIds, UserId};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Environment variable holding the API base URL.
pub const ENV_API_URL: &str = "FAVORITES_API_URL";
/// Environment variable holding the request timeout in seconds.
pub const ENV_API_TIMEOUT_SECS: &str = "FAVORITES_API_TIMEOUT_SECS";
/// Environment variable holding a bearer token.
pub const ENV_API_TOKEN: &str = "FAVORITES_API_TOKEN";

/// HTTP gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpGatewayConfig {
    /// Base URL of the favorites API (e.g. `https://api.example.com`).
    pub base_url: String,
    /// Client-side request timeout.
    pub timeout_secs: u64,
    /// Sent as `Authorization: Bearer ...` when set.
    pub bearer_token: Option<String>,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 15,
            bearer_token: None,
        }
    }
}

impl HttpGatewayConfig {
    /// Builds a config from `FAVORITES_API_*` variables, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> SyncResult<Self> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(ENV_API_URL) {
            config.base_url = url;
        }
        if let Ok(secs) = std::env::var(ENV_API_TIMEOUT_SECS) {
            config.timeout_secs = secs.trim().parse().map_err(|_| {
                SyncError::Config(format!("{ENV_API_TIMEOUT_SECS} must be a number, got {secs:?}"))
            })?;
        }
        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            if !token.is_empty() {
                config.bearer_token = Some(token);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Rejects configs the client cannot work with.
    pub fn validate(&self) -> SyncResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(SyncError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(SyncError::Config("timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Gateway backed by the favorites HTTP API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    config: HttpGatewayConfig,
    client: Client,
}

impl HttpGateway {
    /// Creates a gateway for `config`.
    pub fn new(config: HttpGatewayConfig) -> SyncResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpGatewayConfig {
        &self.config
    }

    fn category_url(&self, user: &UserId, category: Category) -> String {
        format!(
            "{}/api/v1/users/{}/favorites/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(user.as_str()),
            category.as_str()
        )
    }

    fn entity_url(&self, user: &UserId, category: Category, id: &EntityId) -> String {
        format!(
            "{}/{}",
            self.category_url(user, category),
            urlencoding::encode(id.as_str())
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let resp = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status, body))
    }
}

/// Maps a non-2xx response to the sync error taxonomy.
pub fn status_error(status: StatusCode, body: String) -> SyncError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        body
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Unauthorized,
        StatusCode::CONFLICT => SyncError::Conflict(message),
        _ => SyncError::ServerError {
            status: Some(status.as_u16()),
            message,
        },
    }
}

fn transport_error(e: reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::Timeout
    } else if e.is_decode() {
        SyncError::InvalidResponse(e.to_string())
    } else {
        SyncError::Unreachable(e.to_string())
    }
}

#[async_trait]
impl FavoritesGateway for HttpGateway {
    async fn list_favorites(
        &self,
        user: &UserId,
        category: Category,
    ) -> SyncResult<Vec<EntityId>> {
        let url = self.category_url(user, category);
        debug!("GET {}", url);
        let resp = self.send(self.client.get(&url)).await?;
        let body = resp.text().await.map_err(transport_error)?;
        let page: FavoriteIds = serde_json::from_str(&body)?;
        if page.category != category {
            return Err(SyncError::InvalidResponse(format!(
                "asked for {category}, got {}",
                page.category
            )));
        }
        Ok(page.ids)
    }

    async fn set_favorite(
        &self,
        user: &UserId,
        category: Category,
        id: &EntityId,
        favorite: bool,
    ) -> SyncResult<()> {
        let url = self.entity_url(user, category, id);
        let request = if favorite {
            debug!("PUT {}", url);
            self.client.put(&url)
        } else {
            debug!("DELETE {}", url);
            self.client.delete(&url)
        };
        self.send(request).await?;
        Ok(())
    }
}
