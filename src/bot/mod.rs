//! Telegram-facing layer: shared context, command handlers, callback
//! routing, admin tools, throttling, and the live chat transport.

/// User management callbacks
pub mod admin;
/// Inline-button router
pub mod callbacks;
/// Command and message handlers
pub mod handlers;
/// Rate limiter and denial cooldown
pub mod rate_limit;
/// Telegram implementation of the wizard transport
pub mod telegram;

use crate::config::Settings;
use crate::gateway::categories::CategoryCache;
use crate::gateway::PublishingGateway;
use crate::store::UserStore;
use crate::wizard::transport::ChatTransport;
use crate::wizard::{Conversations, WizardDeps};
use rate_limit::{DenialCache, RateLimiter};
use std::sync::Arc;
use teloxide::prelude::*;

/// Shared runtime context handed to every handler
pub struct App {
    /// Loaded settings
    pub settings: Arc<Settings>,
    /// Authorized users and passcodes
    pub users: Arc<UserStore>,
    /// WordPress client
    pub gateway: Arc<dyn PublishingGateway>,
    /// Cached category list
    pub categories: Arc<CategoryCache>,
    /// Active conversations
    pub conversations: Arc<Conversations>,
    /// Per-command throttle
    pub rate_limiter: Arc<RateLimiter>,
    /// Access-denied cooldown
    pub denials: Arc<DenialCache>,
}

impl App {
    /// Wizard dependencies bound to one chat.
    #[must_use]
    pub fn wizard_deps(&self, bot: &Bot, chat_id: ChatId) -> WizardDeps {
        let transport: Arc<dyn ChatTransport> =
            Arc::new(telegram::TelegramChat::new(bot.clone(), chat_id));
        WizardDeps {
            transport,
            gateway: Arc::clone(&self.gateway),
            categories: Arc::clone(&self.categories),
            settings: Arc::clone(&self.settings),
        }
    }
}
