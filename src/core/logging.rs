//! Logging initialization and startup configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Startup diagnostics for the provider key, bot token and trigger secret

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs service configuration at application startup
///
/// Validates and logs:
/// - HEYGEN_API_KEY presence (masked)
/// - TELOXIDE_TOKEN presence
/// - CRON_SECRET / trigger endpoint protection
/// - Database path and reconciliation interval
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Avagen Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config::HEYGEN_API_KEY.is_empty() {
        log::error!("❌ HEYGEN_API_KEY: not set — video generation will FAIL");
    } else {
        log::info!("✅ HEYGEN_API_KEY: set (****)");
    }
    log::info!("   HEYGEN_API_BASE_URL: {}", config::HEYGEN_API_BASE_URL.as_str());

    if std::env::var("TELOXIDE_TOKEN").is_ok() {
        log::info!("✅ TELOXIDE_TOKEN: set");
    } else {
        log::error!("❌ TELOXIDE_TOKEN: not set — delivery to Telegram will FAIL");
    }

    if config::CRON_SECRET.is_some() {
        log::info!("✅ CRON_SECRET: set, /reconcile requires bearer auth");
    } else {
        log::warn!("⚠️  CRON_SECRET: not set, /reconcile is unauthenticated");
    }

    log::info!("   DATABASE_PATH: {}", config::DATABASE_PATH.as_str());
    log::info!(
        "   Reconcile interval: {}s, web port: {}",
        *config::reconcile::CHECK_INTERVAL_SECS,
        *config::WEB_PORT
    );
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
