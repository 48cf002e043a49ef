use crate::error::ScrapeError;
use clap::Parser;
use dotenvy::dotenv;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api";
/// Results per search page; the search endpoint caps this at 25.
pub const SEARCH_PAGE_SIZE: u32 = 25;
/// Safety factor applied to a server-suggested `retry_after`.
pub const BACKOFF_FACTOR: f64 = 1.2;

/// Command line surface. Every credential flag falls back to the
/// environment, which `.env` may populate.
#[derive(Parser)]
#[command(name = "mediasweep", version, about = "Incrementally archive Discord media attachments")]
pub struct Cli {
    /// Discord token used for the Authorization header
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Discord user ID of the scraping account
    #[arg(long, env = "DISCORD_USER_ID")]
    pub user_id: Option<String>,

    /// Discord username of the scraping account
    #[arg(long, env = "DISCORD_USERNAME")]
    pub username: Option<String>,

    /// Path to the SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "messages.db")]
    pub db_path: String,

    /// Walk every scope from the beginning instead of resuming
    #[arg(long)]
    pub deep_scrape: bool,

    /// Only scan these guild IDs (repeatable). DMs are always scanned.
    #[arg(long = "guild", env = "SCRAPE_GUILDS", value_delimiter = ',')]
    pub guilds: Vec<String>,

    #[arg(long, env = "DISCORD_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Outbound requests allowed per rate window
    #[arg(long, default_value_t = 5)]
    pub requests_per_window: u32,

    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    pub rate_window: Duration,

    /// Delay before retrying a bare HTTP 429
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub rate_limit_delay: Duration,

    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    pub http_timeout: Duration,

    /// Consecutive throttles tolerated on one request before giving up
    #[arg(long, default_value_t = 50)]
    pub max_rate_limit_retries: u32,
}

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub user_id: String,
    pub username: String,
    pub database_url: String,
    pub deep_scrape: bool,
    pub guild_allowlist: Vec<String>,
    pub api_base: String,
    pub requests_per_window: u32,
    pub rate_window: Duration,
    pub rate_limit_delay: Duration,
    pub backoff_factor: f64,
    pub page_size: u32,
    pub http_timeout: Duration,
    pub max_rate_limit_retries: u32,
}

impl Config {
    /// Loads `.env` (if any), then parses the process arguments.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        let cli = Cli::parse();
        Ok(Self::from_cli(cli)?)
    }

    pub fn from_cli(cli: Cli) -> Result<Self, ScrapeError> {
        let discord_token = required(cli.token, "DISCORD_TOKEN")?;
        let user_id = required(cli.user_id, "DISCORD_USER_ID")?;
        let username = required(cli.username, "DISCORD_USERNAME")?;

        if cli.requests_per_window == 0 {
            return Err(ScrapeError::InvalidConfig(
                "--requests-per-window must be at least 1".to_string(),
            ));
        }
        if cli.rate_window.is_zero() {
            return Err(ScrapeError::InvalidConfig(
                "--rate-window must be longer than zero".to_string(),
            ));
        }

        let guild_allowlist = cli
            .guilds
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        Ok(Config {
            discord_token,
            user_id,
            username,
            database_url: cli.db_path,
            deep_scrape: cli.deep_scrape,
            guild_allowlist,
            api_base: cli.api_base.trim_end_matches('/').to_string(),
            requests_per_window: cli.requests_per_window,
            rate_window: cli.rate_window,
            rate_limit_delay: cli.rate_limit_delay,
            backoff_factor: BACKOFF_FACTOR,
            page_size: SEARCH_PAGE_SIZE,
            http_timeout: cli.http_timeout,
            max_rate_limit_retries: cli.max_rate_limit_retries,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, ScrapeError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ScrapeError::InvalidConfig(format!("{} must be set", name)))
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("database_url", &self.database_url)
            .field("deep_scrape", &self.deep_scrape)
            .field("guild_allowlist", &self.guild_allowlist)
            .field("api_base", &self.api_base)
            .field("requests_per_window", &self.requests_per_window)
            .field("rate_window", &self.rate_window)
            .field("rate_limit_delay", &self.rate_limit_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("page_size", &self.page_size)
            .field("http_timeout", &self.http_timeout)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .finish()
    }
}
