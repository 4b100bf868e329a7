//! Global inline-button router.
//!
//! User-management callbacks are tried first, then the config menu, then
//! the post-related actions. Category selection is not handled here: it
//! becomes a synthetic [`WizardUpdate::Callback`] fed through the engine's
//! normal dispatch path.

use super::{admin, App};
use crate::wizard::{WizardState, WizardUpdate, WorkflowKind};
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardMarkup, MaybeInaccessibleMessage};
use tracing::error;

/// Where the pressed keyboard lives, when Telegram still lets us touch it
pub(crate) fn message_anchor(q: &CallbackQuery) -> Option<(ChatId, teloxide::types::MessageId)> {
    q.message.as_ref().map(|m| (m.chat().id, m.id()))
}

/// Edit the message the button hung off, or send a new one when it is no
/// longer accessible.
pub(crate) async fn edit_or_send(bot: &Bot, q: &CallbackQuery, text: &str) -> Result<()> {
    match message_anchor(q) {
        Some((chat_id, message_id)) => {
            bot.edit_message_text(chat_id, message_id, text.to_string())
                .await?;
        }
        None => {
            bot.send_message(ChatId(q.from.id.0.cast_signed()), text.to_string())
                .await?;
        }
    }
    Ok(())
}

/// Same as [`edit_or_send`], keeping an inline keyboard attached.
pub(crate) async fn edit_or_send_markup(
    bot: &Bot,
    q: &CallbackQuery,
    text: &str,
    markup: InlineKeyboardMarkup,
) -> Result<()> {
    match message_anchor(q) {
        Some((chat_id, message_id)) => {
            bot.edit_message_text(chat_id, message_id, text.to_string())
                .reply_markup(markup)
                .await?;
        }
        None => {
            bot.send_message(ChatId(q.from.id.0.cast_signed()), text.to_string())
                .reply_markup(markup)
                .await?;
        }
    }
    Ok(())
}

/// Entry point for all callback queries.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, app: Arc<App>) -> Result<()> {
    let Some(data) = q.data.clone() else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };

    let user_id = q.from.id.0.cast_signed();
    let Some(role) = app.users.level_of(user_id) else {
        bot.answer_callback_query(q.id.clone())
            .text("Access denied.")
            .await?;
        return Ok(());
    };

    if admin::handle_admin_callback(&bot, &q, &app, role, &data).await? {
        return Ok(());
    }

    if let Some(action) = data.strip_prefix("cfg_") {
        return config_action(&bot, &q, &app, role, action).await;
    }

    let Some((chat_id, _)) = message_anchor(&q) else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };

    if let Some(raw) = data.strip_prefix("edit_") {
        if let Ok(post_id) = raw.parse::<u64>() {
            bot.answer_callback_query(q.id.clone())
                .text("Loading post for edit...")
                .await?;
            let seed = WizardState {
                post_id: Some(post_id),
                ..WizardState::default()
            };
            let deps = app.wizard_deps(&bot, chat_id);
            app.conversations
                .enter(chat_id.0, WorkflowKind::EditPost, seed, &deps)
                .await;
        } else {
            let _ = bot.answer_callback_query(q.id.clone()).await;
        }
        return Ok(());
    }

    if data.starts_with("cat_select_") {
        let message_text = q
            .message
            .as_ref()
            .and_then(MaybeInaccessibleMessage::regular_message)
            .and_then(|m| m.text())
            .map(ToString::to_string);
        let update = WizardUpdate::Callback {
            id: q.id.0.clone(),
            data,
            message_id: message_anchor(&q).map(|(_, mid)| mid.0),
            message_text,
        };

        let deps = app.wizard_deps(&bot, chat_id);
        app.conversations.dispatch(chat_id.0, update, &deps).await;

        // Harmless double-answer when the wizard already acked; stops the
        // button spinner when no conversation consumed the press
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    }

    bot.answer_callback_query(q.id.clone())
        .text("Unknown action")
        .await?;
    Ok(())
}

async fn config_action(
    bot: &Bot,
    q: &CallbackQuery,
    app: &App,
    role: crate::store::Role,
    action: &str,
) -> Result<()> {
    if !role.is_admin_or_super() {
        bot.answer_callback_query(q.id.clone())
            .text("Not authorized.")
            .await?;
        return Ok(());
    }

    match action {
        "newcode" => {
            let code = app.users.new_passcode().await?;
            edit_or_send(
                bot,
                q,
                &format!("New invite code: {code}\n\nSingle-use. Forward to the new user."),
            )
            .await?;
            bot.answer_callback_query(q.id.clone())
                .text("Code generated!")
                .await?;
        }
        "refreshcats" => {
            match app.categories.get(true).await {
                Ok(fresh) => {
                    edit_or_send(
                        bot,
                        q,
                        &format!("Categories refreshed! Now {} available.", fresh.len()),
                    )
                    .await?;
                }
                Err(e) => {
                    error!("Category refresh failed: {e}");
                    edit_or_send(bot, q, "Failed to refresh categories.").await?;
                }
            }
            bot.answer_callback_query(q.id.clone())
                .text("Refreshed!")
                .await?;
        }
        "cancel" => {
            edit_or_send(bot, q, "Config cancelled.").await?;
            bot.answer_callback_query(q.id.clone())
                .text("Cancelled")
                .await?;
        }
        _ => {
            bot.answer_callback_query(q.id.clone())
                .text("Unknown action")
                .await?;
        }
    }
    Ok(())
}
