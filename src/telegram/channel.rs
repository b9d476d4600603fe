//! Messaging channel abstraction and its Telegram implementation.
//!
//! The reconciler only sees the `MessagingChannel` trait; expected transport
//! failures come back as `false` so one unreachable recipient never aborts a
//! delivery pass. The channel performs no persistence — the caller decides
//! what a successful send means for the job record.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;

/// Outbound messaging operations the delivery path depends on.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Push a finished asset (video URL) with a caption. Returns whether the
    /// send succeeded.
    async fn send_asset(&self, recipient: i64, asset_url: &str, caption: &str) -> bool;

    /// Push a plain text message. Returns whether the send succeeded.
    async fn send_text(&self, recipient: i64, text: &str) -> bool;
}

/// Telegram Bot API implementation of the messaging channel.
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessagingChannel for TelegramChannel {
    async fn send_asset(&self, recipient: i64, asset_url: &str, caption: &str) -> bool {
        let url = match url::Url::parse(asset_url) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Invalid asset URL for chat {}: {}", recipient, e);
                return false;
            }
        };

        match self
            .bot
            .send_video(ChatId(recipient), InputFile::url(url))
            .caption(caption.to_string())
            .supports_streaming(true)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Failed to send video to chat {}: {}", recipient, e);
                false
            }
        }
    }

    async fn send_text(&self, recipient: i64, text: &str) -> bool {
        match self.bot.send_message(ChatId(recipient), text).await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Failed to send message to chat {}: {}", recipient, e);
                false
            }
        }
    }
}
