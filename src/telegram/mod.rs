//! Telegram delivery integration

pub mod captions;
pub mod channel;

pub use channel::{MessagingChannel, TelegramChannel};
