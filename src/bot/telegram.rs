//! Telegram implementation of the wizard's chat seam.
//!
//! Bound to one chat; every operation retries transient network failures
//! with the shared backoff strategy.

use crate::utils::retry_telegram_operation;
use crate::wizard::transport::{Button, ChatTransport};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId,
};

/// One chat's outbound channel
pub struct TelegramChat {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramChat {
    /// Bind a transport to a chat.
    #[must_use]
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

fn build_markup(buttons: Vec<Vec<Button>>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(buttons.into_iter().map(|row| {
        row.into_iter()
            .map(|b| InlineKeyboardButton::callback(b.label, b.data))
            .collect::<Vec<_>>()
    }))
}

#[async_trait]
impl ChatTransport for TelegramChat {
    async fn send_text(&self, text: &str) -> Result<()> {
        retry_telegram_operation(|| async {
            self.bot
                .send_message(self.chat_id, text.to_string())
                .await
                .map_err(|e| anyhow!("Telegram send error: {e}"))
        })
        .await
        .map(|_| ())
    }

    async fn send_buttons(&self, text: &str, buttons: Vec<Vec<Button>>) -> Result<()> {
        let markup = build_markup(buttons);
        retry_telegram_operation(|| async {
            self.bot
                .send_message(self.chat_id, text.to_string())
                .reply_markup(markup.clone())
                .await
                .map_err(|e| anyhow!("Telegram send error: {e}"))
        })
        .await
        .map(|_| ())
    }

    async fn edit_text(&self, message_id: i32, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(self.chat_id, MessageId(message_id), text.to_string())
            .await
            .map_err(|e| anyhow!("Telegram edit error: {e}"))?;
        Ok(())
    }

    async fn clear_buttons(&self, message_id: i32) -> Result<()> {
        self.bot
            .edit_message_reply_markup(self.chat_id, MessageId(message_id))
            .reply_markup(InlineKeyboardMarkup::default())
            .await
            .map_err(|e| anyhow!("Telegram edit error: {e}"))?;
        Ok(())
    }

    async fn ack_callback(&self, callback_id: &str, text: &str) -> Result<()> {
        let mut req = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if !text.is_empty() {
            req = req.text(text.to_string());
        }
        req.await
            .map_err(|e| anyhow!("Telegram callback answer error: {e}"))?;
        Ok(())
    }

    async fn fetch_photo(&self, file_id: &str) -> Result<Vec<u8>> {
        retry_telegram_operation(|| async {
            let file = self
                .bot
                .get_file(FileId(file_id.to_string()))
                .await
                .map_err(|e| anyhow!("Telegram get_file error: {e}"))?;
            let mut buf = Vec::new();
            self.bot
                .download_file(&file.path, &mut buf)
                .await
                .map_err(|e| anyhow!("Telegram download error: {e}"))?;
            Ok(buf)
        })
        .await
    }
}
