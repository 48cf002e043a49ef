//! Discord REST transport.
//!
//! [`DiscordApi`] is the seam between the scraper and the network: the
//! production [`DiscordClient`] wraps reqwest, tests script responses.

pub mod models;

use crate::config::Config;
use crate::error::ScrapeError;
use crate::gate::GatePermit;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

/// Scope id of the direct-message pseudo guild.
pub const DM_SCOPE: &str = "@me";

pub const GUILDS_PATH: &str = "v9/users/@me/guilds";

pub fn channels_path(guild_id: &str) -> String {
    format!("v9/guilds/{}/channels", guild_id)
}

pub fn search_path(scope_id: &str) -> String {
    if scope_id == DM_SCOPE {
        "v9/users/@me/messages/search/tabs".to_string()
    } else {
        format!("v9/guilds/{}/messages/search/tabs", scope_id)
    }
}

/// Raw response: status plus the body parsed as JSON. A body that is not
/// JSON arrives as `Value::Null` and is left for the classifier to judge.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

#[async_trait]
pub trait DiscordApi: Send + Sync {
    async fn get(&self, permit: GatePermit, path: &str) -> Result<ApiResponse, ScrapeError>;

    async fn post(
        &self,
        permit: GatePermit,
        path: &str,
        body: &Value,
    ) -> Result<ApiResponse, ScrapeError>;
}

pub struct DiscordClient {
    http: reqwest::Client,
    base: String,
}

impl DiscordClient {
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&config.discord_token).map_err(|_| {
            ScrapeError::InvalidConfig("DISCORD_TOKEN contains invalid header characters".into())
        })?;
        token.set_sensitive(true);
        headers.insert(AUTHORIZATION, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .connect_timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            http,
            base: config.api_base.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    async fn read(resp: reqwest::Response) -> Result<ApiResponse, ScrapeError> {
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl DiscordApi for DiscordClient {
    async fn get(&self, _permit: GatePermit, path: &str) -> Result<ApiResponse, ScrapeError> {
        debug!("Discord API: GET {}", path);
        let resp = self.http.get(self.url(path)).send().await?;
        Self::read(resp).await
    }

    async fn post(
        &self,
        _permit: GatePermit,
        path: &str,
        body: &Value,
    ) -> Result<ApiResponse, ScrapeError> {
        debug!("Discord API: POST {}", path);
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        Self::read(resp).await
    }
}
