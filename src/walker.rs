//! Pull-based pagination over one scope's media search.
//!
//! Each [`CursorWalker::next_page`] call performs at most one successful
//! round trip (plus throttled retries of the same request) and yields one
//! page, the end of the sequence, or the reason the scope is unreachable.

use crate::classify::{classify_search, PageOutcome, SearchPage};
use crate::config::Config;
use crate::discord::models::SearchRequest;
use crate::discord::{search_path, DiscordApi};
use crate::error::ScrapeError;
use crate::gate::RequestGate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct WalkSettings {
    pub page_size: u32,
    pub backoff_factor: f64,
    /// Wait applied to a 429 status, or a throttle body without `retry_after`.
    pub rate_limit_delay: Duration,
    pub max_rate_limit_retries: u32,
}

impl WalkSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.page_size,
            backoff_factor: config.backoff_factor,
            rate_limit_delay: config.rate_limit_delay,
            max_rate_limit_retries: config.max_rate_limit_retries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Idle,
    Requesting,
    PageReady,
    RateLimited,
    Exhausted,
    Denied,
    NotFound,
    Failed,
}

impl WalkState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WalkState::Exhausted | WalkState::Denied | WalkState::NotFound | WalkState::Failed
        )
    }
}

/// Why a scope can no longer be searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    Forbidden,
    NotFound,
}

#[derive(Debug)]
pub enum WalkStep {
    Page(SearchPage),
    Exhausted,
    Unavailable(Unavailable),
}

pub struct CursorWalker {
    api: Arc<dyn DiscordApi>,
    gate: Arc<RequestGate>,
    scope_id: String,
    path: String,
    cursor: Option<String>,
    state: WalkState,
    settings: WalkSettings,
}

impl CursorWalker {
    /// `start` is the resume cursor; `None` walks from the first page.
    pub fn new(
        api: Arc<dyn DiscordApi>,
        gate: Arc<RequestGate>,
        scope_id: &str,
        start: Option<String>,
        settings: WalkSettings,
    ) -> Self {
        Self {
            api,
            gate,
            scope_id: scope_id.to_string(),
            path: search_path(scope_id),
            cursor: start,
            state: WalkState::Idle,
            settings,
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub async fn next_page(&mut self) -> Result<WalkStep, ScrapeError> {
        match self.state {
            WalkState::Exhausted | WalkState::Failed => return Ok(WalkStep::Exhausted),
            WalkState::Denied => return Ok(WalkStep::Unavailable(Unavailable::Forbidden)),
            WalkState::NotFound => return Ok(WalkStep::Unavailable(Unavailable::NotFound)),
            _ => {}
        }

        let body = serde_json::to_value(SearchRequest::media(
            self.cursor.as_deref(),
            self.settings.page_size,
        ))?;
        let mut throttled = 0u32;

        loop {
            self.state = WalkState::Requesting;
            let permit = self.gate.acquire().await;
            let response = match self.api.post(permit, &self.path, &body).await {
                Ok(response) => response,
                Err(e) => {
                    self.state = WalkState::Failed;
                    return Err(e);
                }
            };

            match classify_search(response.status, &response.body) {
                PageOutcome::Page(page) => {
                    self.accept_cursor(page.cursor.as_deref());
                    debug!(
                        "Walker: {} yielded {} messages, cursor now {:?}",
                        self.scope_id,
                        page.messages.len(),
                        self.cursor
                    );
                    return Ok(WalkStep::Page(page));
                }
                PageOutcome::Exhausted => {
                    debug!("Walker: {} exhausted", self.scope_id);
                    self.state = WalkState::Exhausted;
                    return Ok(WalkStep::Exhausted);
                }
                PageOutcome::RateLimited { retry_after } => {
                    throttled += 1;
                    if throttled > self.settings.max_rate_limit_retries {
                        self.state = WalkState::Failed;
                        return Err(ScrapeError::RetriesExhausted {
                            endpoint: self.path.clone(),
                            attempts: throttled,
                        });
                    }
                    let delay = self.backoff(retry_after);
                    self.state = WalkState::RateLimited;
                    warn!(
                        "Walker: {} rate limited, retrying in {:.1}s",
                        self.scope_id,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
                PageOutcome::Forbidden => {
                    self.state = WalkState::Denied;
                    return Ok(WalkStep::Unavailable(Unavailable::Forbidden));
                }
                PageOutcome::NotFound => {
                    self.state = WalkState::NotFound;
                    return Ok(WalkStep::Unavailable(Unavailable::NotFound));
                }
                PageOutcome::Fatal { status } => {
                    self.state = WalkState::Failed;
                    return Err(ScrapeError::UnexpectedStatus {
                        endpoint: self.path.clone(),
                        status,
                    });
                }
            }
        }
    }

    /// A page that cannot move the cursor forward is the last one: asking
    /// again would return the same page.
    fn accept_cursor(&mut self, next: Option<&str>) {
        match next {
            Some(next) if self.cursor.as_deref() != Some(next) => {
                self.cursor = Some(next.to_string());
                self.state = WalkState::PageReady;
            }
            _ => {
                warn!(
                    "Walker: {} returned a page without a new cursor, stopping here",
                    self.scope_id
                );
                self.state = WalkState::Exhausted;
            }
        }
    }

    fn backoff(&self, retry_after: Option<f64>) -> Duration {
        backoff_delay(retry_after, &self.settings)
    }
}

/// `retry_after` scaled by the backoff factor, or the fixed delay when the
/// server gave no hint.
pub(crate) fn backoff_delay(retry_after: Option<f64>, settings: &WalkSettings) -> Duration {
    retry_after
        .and_then(|secs| Duration::try_from_secs_f64(secs * settings.backoff_factor).ok())
        .unwrap_or(settings.rate_limit_delay)
}
