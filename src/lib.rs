//! Avagen — Telegram bot service for HeyGen avatar video generation
//!
//! This library provides the full dispatch → reconcile → deliver flow for
//! avatar video jobs: submission to the provider, periodic status
//! reconciliation, and delivery of finished videos (or failure notices)
//! to users via the Telegram Bot API.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging and the HTTP trigger surface
//! - `storage`: Job records and credit accounting in SQLite
//! - `provider`: HeyGen API client behind the `VideoProvider` trait
//! - `reconcile`: Dispatcher, status reconciler and scheduler
//! - `telegram`: Messaging channel used for delivery

pub mod core;
pub mod provider;
pub mod reconcile;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use provider::{HeyGenClient, VideoProvider, VideoStatus};
pub use reconcile::ServiceDeps;
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{MessagingChannel, TelegramChannel};
