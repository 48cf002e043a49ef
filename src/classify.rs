//! Turns raw API responses into outcomes the walker and the orchestrator can
//! act on. Pure functions only: no I/O, no clock.

use crate::discord::models::SearchMessage;
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

const RATE_LIMIT_SENTINEL: &str = "rate limited";

/// One page of search hits and the cursor that follows it.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub messages: Vec<SearchMessage>,
    pub cursor: Option<String>,
}

#[derive(Debug)]
pub enum PageOutcome {
    Page(SearchPage),
    /// No hits, or a payload too malformed to hold any.
    Exhausted,
    /// `retry_after` is the server's suggestion in seconds, when it sent one.
    RateLimited { retry_after: Option<f64> },
    Forbidden,
    NotFound,
    Fatal { status: u16 },
}

#[derive(Debug)]
pub enum ListOutcome<T> {
    Items(Vec<T>),
    RateLimited { retry_after: Option<f64> },
    Forbidden,
    NotFound,
    Fatal { status: u16 },
}

enum StatusClass {
    Success,
    Forbidden,
    NotFound,
    TooManyRequests,
    Other(u16),
}

fn status_class(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        403 => StatusClass::Forbidden,
        404 => StatusClass::NotFound,
        429 => StatusClass::TooManyRequests,
        other => StatusClass::Other(other),
    }
}

/// `Some(hint)` when the body carries the rate-limit sentinel.
fn rate_limit_hint(body: &Value) -> Option<Option<f64>> {
    let message = body.get("message")?.as_str()?;
    if !message.to_lowercase().contains(RATE_LIMIT_SENTINEL) {
        return None;
    }
    let retry_after = body
        .get("retry_after")
        .and_then(Value::as_f64)
        .filter(|secs| secs.is_finite() && *secs >= 0.0);
    Some(retry_after)
}

fn json_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Message timestamps are RFC 3339 but the API's cursor is epoch
/// milliseconds; convert so both kinds of cursor order the same way.
fn cursor_from_timestamp(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|at| at.timestamp_millis().to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

pub fn classify_search(status: u16, body: &Value) -> PageOutcome {
    match status_class(status) {
        StatusClass::Forbidden => return PageOutcome::Forbidden,
        StatusClass::NotFound => return PageOutcome::NotFound,
        // Status 429 always waits the fixed delay; its body is not consulted.
        StatusClass::TooManyRequests => return PageOutcome::RateLimited { retry_after: None },
        StatusClass::Other(status) => return PageOutcome::Fatal { status },
        StatusClass::Success => {}
    }

    if let Some(retry_after) = rate_limit_hint(body) {
        return PageOutcome::RateLimited { retry_after };
    }

    let media = &body["tabs"]["media"];
    let hits = match media["messages"].as_array() {
        Some(hits) if !hits.is_empty() => hits,
        Some(_) => return PageOutcome::Exhausted,
        None => {
            debug!("Classifier: search payload has no tabs.media.messages, treating as exhausted");
            return PageOutcome::Exhausted;
        }
    };

    let messages: Vec<SearchMessage> = hits
        .iter()
        .filter_map(|group| {
            // Each hit is wrapped in its own array.
            let hit = match group {
                Value::Array(items) => items.first()?,
                other => other,
            };
            match serde_json::from_value::<SearchMessage>(hit.clone()) {
                Ok(msg) if msg.id.is_some() => Some(msg),
                Ok(_) => {
                    debug!("Classifier: skipping search hit without id");
                    None
                }
                Err(e) => {
                    debug!("Classifier: skipping undecodable search hit: {}", e);
                    None
                }
            }
        })
        .collect();

    let cursor = json_string(&media["cursor"]["timestamp"]).or_else(|| {
        messages
            .iter()
            .rev()
            .find_map(|m| m.timestamp.as_deref().filter(|t| !t.is_empty()))
            .map(cursor_from_timestamp)
    });

    PageOutcome::Page(SearchPage { messages, cursor })
}

pub fn classify_listing<T: DeserializeOwned>(status: u16, body: &Value) -> ListOutcome<T> {
    match status_class(status) {
        StatusClass::Forbidden => return ListOutcome::Forbidden,
        StatusClass::NotFound => return ListOutcome::NotFound,
        StatusClass::TooManyRequests => return ListOutcome::RateLimited { retry_after: None },
        StatusClass::Other(status) => return ListOutcome::Fatal { status },
        StatusClass::Success => {}
    }

    if let Some(retry_after) = rate_limit_hint(body) {
        return ListOutcome::RateLimited { retry_after };
    }

    let items = body
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value::<T>(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    ListOutcome::Items(items)
}
