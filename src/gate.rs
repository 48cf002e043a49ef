//! Process-wide outbound request budget.
//!
//! Discord enforces its quota per token, not per guild, so one gate is shared
//! by every caller that talks to the API.

use crate::config::Config;
use crate::error::ScrapeError;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Proof that a request slot was granted. Only [`RequestGate::acquire`]
/// creates one, and every [`crate::discord::DiscordApi`] call consumes one.
#[derive(Debug)]
pub struct GatePermit {
    _private: (),
}

pub struct RequestGate {
    limiter: DirectRateLimiter,
    max_requests: u32,
    window: Duration,
}

impl RequestGate {
    /// Allows `max_requests` back to back, then one more every
    /// `window / max_requests`.
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, ScrapeError> {
        let burst = NonZeroU32::new(max_requests).ok_or_else(|| {
            ScrapeError::InvalidConfig("request gate needs at least one request per window".into())
        })?;
        let quota = Quota::with_period(window / max_requests)
            .ok_or_else(|| {
                ScrapeError::InvalidConfig("request gate window must be non-zero".into())
            })?
            .allow_burst(burst);

        Ok(Self {
            limiter: RateLimiter::direct(quota),
            max_requests,
            window,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ScrapeError> {
        Self::new(config.requests_per_window, config.rate_window)
    }

    /// Waits until the budget has room. Never fails, only delays.
    pub async fn acquire(&self) -> GatePermit {
        if self.limiter.check().is_err() {
            debug!(
                "Request gate: budget of {} per {:?} spent, waiting",
                self.max_requests, self.window
            );
            self.limiter.until_ready().await;
        }
        GatePermit { _private: () }
    }

    #[cfg(test)]
    pub(crate) fn unlimited() -> Self {
        Self::new(10_000, Duration::from_secs(1)).unwrap()
    }
}
