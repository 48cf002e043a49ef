/// Errors raised while talking to the Discord API.
///
/// Everything in here is fatal for the run. Throttling, lost permissions and
/// malformed payloads are outcomes, not errors, and never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Discord API returned status {status} for {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("Still rate limited on {endpoint} after {attempts} attempts")]
    RetriesExhausted { endpoint: String, attempts: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
