mod config;
mod core;
mod errors;
mod memory;
mod models;
mod providers;
mod redact;

use anyhow::Context;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::retry::RateLimitedRetrier;
use crate::core::runtime::Runtime;
use crate::memory::StateStore;
use crate::providers::telegram::TelegramNotifier;
use crate::providers::twitter::TwitterSource;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(e) = dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;
    info!(
        accounts = config.accounts.len(),
        bearer_token = %redact::token(&config.twitter_bearer_token),
        state_file = %config.state_file.display(),
        "starting tweet-relay"
    );

    let fetcher = TwitterSource::new(&config.twitter_bearer_token);
    let sink = TelegramNotifier::new(&config.telegram_bot_token, &config.telegram_chat_id)
        .context("configuration error")?;
    let store = StateStore::new(&config.state_file);

    let mut runtime = Runtime::new(
        config.accounts.clone(),
        RateLimitedRetrier::new(fetcher),
        sink,
        store,
    );
    runtime.run_guarded().await?;

    Ok(())
}
