use mediasweep::config::Config;
use mediasweep::db::Database;
use mediasweep::discord::DiscordClient;
use mediasweep::gate::RequestGate;
use mediasweep::scraper::Scraper;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config);

    let db = Database::new(&config)?;
    db.execute_init()?;

    let api = Arc::new(DiscordClient::new(&config)?);
    let gate = Arc::new(RequestGate::from_config(&config)?);

    info!("Starting scrape for {}...", config.username);
    let summary = Scraper::new(config, db, api, gate).run().await?;
    info!("Done: {:?}", summary);

    Ok(())
}
