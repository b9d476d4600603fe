use std::sync::Arc;

use anyhow::Result;
use teloxide::Bot;

use avagen::core::{config, logging, web_server};
use avagen::provider::{HeyGenClient, VideoProvider};
use avagen::reconcile::{scheduler, ServiceDeps};
use avagen::storage;
use avagen::telegram::{MessagingChannel, TelegramChannel};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logger("avagen.log")?;
    logging::log_startup_configuration();

    // Configuration errors are fatal at startup, not at first use
    if config::HEYGEN_API_KEY.is_empty() {
        anyhow::bail!("HEYGEN_API_KEY is not set");
    }
    if std::env::var("TELOXIDE_TOKEN").is_err() {
        anyhow::bail!("TELOXIDE_TOKEN is not set");
    }

    let db = Arc::new(storage::create_pool(&config::DATABASE_PATH)?);
    let provider: Arc<dyn VideoProvider> = Arc::new(HeyGenClient::from_env()?);
    let channel: Arc<dyn MessagingChannel> = Arc::new(TelegramChannel::new(Bot::from_env()));

    let deps = Arc::new(ServiceDeps {
        db,
        provider,
        channel,
    });

    scheduler::start_scheduler(Arc::clone(&deps));

    web_server::start_web_server(*config::WEB_PORT, deps)
        .await
        .map_err(|e| anyhow::anyhow!("Web server failed: {}", e))?;

    Ok(())
}
