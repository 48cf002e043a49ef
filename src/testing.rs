//! Test fixtures: a scripted Discord API and payload builders.

use crate::config::Config;
use crate::discord::{ApiResponse, DiscordApi};
use crate::error::ScrapeError;
use crate::gate::GatePermit;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub(crate) fn test_config() -> Config {
    Config {
        discord_token: "test".to_string(),
        user_id: "acc".to_string(),
        username: "scraper".to_string(),
        database_url: ":memory:".to_string(),
        deep_scrape: false,
        guild_allowlist: Vec::new(),
        api_base: "http://localhost/api".to_string(),
        requests_per_window: 10_000,
        rate_window: Duration::from_secs(1),
        rate_limit_delay: Duration::from_secs(5),
        backoff_factor: 1.2,
        page_size: 25,
        http_timeout: Duration::from_secs(30),
        max_rate_limit_retries: 50,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
    pub at: Instant,
}

/// Replays queued responses per path. An unscripted path answers `200 []`,
/// which reads as an empty listing or an exhausted search.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    responses: Mutex<HashMap<String, VecDeque<ApiResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
    fail_transport: Mutex<Option<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: impl Into<String>, status: u16, body: Value) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(path.into())
            .or_default()
            .push_back(ApiResponse { status, body });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.path == path)
            .collect()
    }

    /// Every POST to `path` fails as if the connection dropped.
    pub fn fail_posts_to(&self, path: &str) {
        *self.fail_transport.lock().unwrap() = Some(path.to_string());
    }

    fn record(&self, method: &'static str, path: &str, body: Option<Value>) -> ApiResponse {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            body,
            at: Instant::now(),
        });
        self.responses
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(ApiResponse {
                status: 200,
                body: json!([]),
            })
    }
}

#[async_trait]
impl DiscordApi for ScriptedApi {
    async fn get(&self, _permit: GatePermit, path: &str) -> Result<ApiResponse, ScrapeError> {
        Ok(self.record("GET", path, None))
    }

    async fn post(
        &self,
        _permit: GatePermit,
        path: &str,
        body: &Value,
    ) -> Result<ApiResponse, ScrapeError> {
        if self.fail_transport.lock().unwrap().as_deref() == Some(path) {
            self.record("POST", path, Some(body.clone()));
            return Err(ScrapeError::UnexpectedStatus {
                endpoint: path.to_string(),
                status: 0,
            });
        }
        Ok(self.record("POST", path, Some(body.clone())))
    }
}

/// A search hit in the nested `[[message]]` wire shape.
pub(crate) fn hit(id: &str, channel: &str, timestamp: &str, files: &[&str]) -> Value {
    let attachments: Vec<Value> = files
        .iter()
        .map(|file| {
            json!({
                "id": file,
                "url": format!("https://cdn.example/{}.png", file),
                "filename": format!("{}.png", file),
                "size": 2048,
                "content_type": "image/png",
                "width": 128,
                "height": 96
            })
        })
        .collect();
    json!([{
        "id": id,
        "content": format!("message {}", id),
        "channel_id": channel,
        "author": {"id": "u1", "username": "alice"},
        "timestamp": timestamp,
        "edited_timestamp": null,
        "attachments": attachments
    }])
}

pub(crate) fn search_page(hits: Vec<Value>, cursor: Option<&str>) -> Value {
    json!({
        "tabs": {"media": {
            "messages": hits,
            "cursor": cursor.map(|timestamp| json!({"timestamp": timestamp, "type": "timestamp"}))
        }}
    })
}

pub(crate) fn empty_page() -> Value {
    search_page(Vec::new(), None)
}

pub(crate) fn rate_limited(retry_after: f64) -> Value {
    json!({
        "message": "You are being rate limited.",
        "retry_after": retry_after,
        "global": false
    })
}
