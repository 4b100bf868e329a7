//! Chat-platform seam for the wizards.
//!
//! Step handlers never talk to Telegram directly; they go through
//! [`ChatTransport`], which is bound to one chat. The live implementation
//! is [`crate::bot::telegram::TelegramChat`]; tests use the generated mock.

use anyhow::Result;
use async_trait::async_trait;

/// One inline button: a label and the opaque callback payload it fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Visible label
    pub label: String,
    /// Callback data token
    pub data: String,
}

impl Button {
    /// Convenience constructor.
    #[must_use]
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Outbound chat operations available to step handlers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a plain text reply
    async fn send_text(&self, text: &str) -> Result<()>;
    /// Send a text reply with an inline keyboard, one row per inner vec
    async fn send_buttons(&self, text: &str, buttons: Vec<Vec<Button>>) -> Result<()>;
    /// Edit the text of a previously sent message
    async fn edit_text(&self, message_id: i32, text: &str) -> Result<()>;
    /// Remove the inline keyboard from a previously sent message
    async fn clear_buttons(&self, message_id: i32) -> Result<()>;
    /// Acknowledge a button press (empty text for a silent ack)
    async fn ack_callback(&self, callback_id: &str, text: &str) -> Result<()>;
    /// Download a photo the user attached, by file identifier
    async fn fetch_photo(&self, file_id: &str) -> Result<Vec<u8>>;
}
