use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode, Recipient};

use crate::core::reconcile::NotificationSink;
use crate::errors::{ConfigError, DeliveryError};

/// Telegram delivery channel. Messages are sent in HTML parse mode with link
/// previews disabled; the chat target is a numeric chat ID or an `@channel`
/// username.
pub struct TelegramNotifier {
    bot: Bot,
    chat: Recipient,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str) -> Result<Self, ConfigError> {
        Ok(TelegramNotifier {
            bot: Bot::new(token),
            chat: parse_chat_target(chat_id)?,
        })
    }
}

fn parse_chat_target(raw: &str) -> Result<Recipient, ConfigError> {
    let raw = raw.trim();
    if raw.starts_with('@') {
        return Ok(Recipient::ChannelUsername(raw.to_string()));
    }
    raw.parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| ConfigError::InvalidChatId(raw.to_string()))
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        self.bot
            .send_message(self.chat.clone(), text)
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError::new(e.to_string()))
    }
}
