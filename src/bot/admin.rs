//! User management: paginated listing, promote/demote/remove.
//!
//! Superuser-only. Every destructive action notifies the affected user and
//! the superuser.

use super::callbacks::{edit_or_send, edit_or_send_markup};
use super::App;
use crate::store::{Role, StoreError, UserRecord};
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{error, info};

const PAGE_SIZE: usize = 10;

fn is_admin_data(data: &str) -> bool {
    data == "cfg_manageusers"
        || data.starts_with("users_page_")
        || data.starts_with("manage_user_")
        || data.starts_with("confirm_promote_")
        || data.starts_with("confirm_demote_")
        || data.starts_with("confirm_remove_")
}

/// Handle a user-management callback. Returns `false` when the payload
/// belongs to someone else.
pub(crate) async fn handle_admin_callback(
    bot: &Bot,
    q: &CallbackQuery,
    app: &App,
    role: Role,
    data: &str,
) -> Result<bool> {
    if !is_admin_data(data) {
        return Ok(false);
    }
    if role != Role::Superuser {
        bot.answer_callback_query(q.id.clone())
            .text("Only the superuser can manage users.")
            .await?;
        return Ok(true);
    }

    let result = route(bot, q, app, data).await;
    if let Err(e) = result {
        error!("User management error: {e:#}");
        edit_or_send(bot, q, "Error processing request.").await?;
        bot.answer_callback_query(q.id.clone()).text("Error").await?;
    }
    Ok(true)
}

async fn route(bot: &Bot, q: &CallbackQuery, app: &App, data: &str) -> Result<()> {
    if data == "cfg_manageusers" {
        return open_user_list(bot, q, app, 0).await;
    }
    if let Some(raw) = data.strip_prefix("users_page_") {
        let page = raw.parse::<usize>().unwrap_or(0);
        return open_user_list(bot, q, app, page).await;
    }
    if let Some(raw) = data.strip_prefix("manage_user_") {
        if let Ok(target) = raw.parse::<i64>() {
            return manage_user_view(bot, q, app, target).await;
        }
    }
    if let Some(raw) = data.strip_prefix("confirm_promote_") {
        if let Ok(target) = raw.parse::<i64>() {
            return promote(bot, q, app, target).await;
        }
    }
    if let Some(raw) = data.strip_prefix("confirm_demote_") {
        if let Ok(target) = raw.parse::<i64>() {
            return demote(bot, q, app, target).await;
        }
    }
    if let Some(raw) = data.strip_prefix("confirm_remove_") {
        if let Ok(target) = raw.parse::<i64>() {
            return remove(bot, q, app, target).await;
        }
    }

    bot.answer_callback_query(q.id.clone())
        .text("Unknown action")
        .await?;
    Ok(())
}

fn user_list_view(users: &[UserRecord], page: usize) -> (String, InlineKeyboardMarkup) {
    let total = users.len();
    let start = page * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(total);
    let page_users = users.get(start..end).unwrap_or(&[]);

    let mut text = "Manage Users\n\n".to_string();
    if page_users.is_empty() {
        text.push_str("No users on this page.\n");
    } else {
        text.push_str(&format!("Showing {}–{end} of {total}\n\n", start + 1));
        for user in page_users {
            let level = user.role().map_or("?", Role::label);
            let username = user.username.as_deref().unwrap_or("no-username");
            text.push_str(&format!(
                "• {} (@{username}) – {level} (ID {})\n",
                user.name, user.id
            ));
        }
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = page_users
        .iter()
        .map(|user| {
            vec![InlineKeyboardButton::callback(
                format!("Manage {}", user.name),
                format!("manage_user_{}", user.id),
            )]
        })
        .collect();

    let mut pagination = Vec::new();
    if page > 0 {
        pagination.push(InlineKeyboardButton::callback(
            "← Prev",
            format!("users_page_{}", page - 1),
        ));
    }
    if end < total {
        pagination.push(InlineKeyboardButton::callback(
            "Next →",
            format!("users_page_{}", page + 1),
        ));
    }
    if !pagination.is_empty() {
        rows.push(pagination);
    }
    rows.push(vec![InlineKeyboardButton::callback("Cancel", "cfg_cancel")]);

    (text, InlineKeyboardMarkup::new(rows))
}

async fn open_user_list(bot: &Bot, q: &CallbackQuery, app: &App, page: usize) -> Result<()> {
    let users = app.users.all_users();
    if users.is_empty() {
        edit_or_send(bot, q, "No users to manage yet.").await?;
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }

    let (text, markup) = user_list_view(&users, page);
    edit_or_send_markup(bot, q, &text, markup).await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn manage_user_view(bot: &Bot, q: &CallbackQuery, app: &App, target: i64) -> Result<()> {
    let Some(user) = app.users.find_user(target) else {
        edit_or_send(bot, q, "User not found.").await?;
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    if user.role() == Some(Role::Superuser) {
        edit_or_send(bot, q, "Superuser cannot be managed.").await?;
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }

    let level = user.role().map_or("?", Role::label);
    let text = format!("Manage {} (ID {})\nLevel: {level}", user.name, user.id);

    let mut rows = Vec::new();
    if user.role() == Some(Role::Ordinary) {
        rows.push(vec![InlineKeyboardButton::callback(
            "Promote to Admin",
            format!("confirm_promote_{target}"),
        )]);
    }
    if user.role() == Some(Role::Admin) {
        rows.push(vec![InlineKeyboardButton::callback(
            "Demote to Ordinary",
            format!("confirm_demote_{target}"),
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "Remove User",
        format!("confirm_remove_{target}"),
    )]);
    rows.push(vec![InlineKeyboardButton::callback(
        "Back to List",
        "cfg_manageusers",
    )]);

    edit_or_send_markup(bot, q, &text, InlineKeyboardMarkup::new(rows)).await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn notify(bot: &Bot, user_id: i64, text: &str) {
    if let Err(e) = bot.send_message(ChatId(user_id), text.to_string()).await {
        error!("Failed to notify user {user_id}: {e}");
    }
}

async fn notify_superuser(bot: &Bot, app: &App, text: &str) {
    if let Some(superuser) = app.settings.superuser_id {
        notify(bot, superuser, text).await;
    }
}

async fn promote(bot: &Bot, q: &CallbackQuery, app: &App, target: i64) -> Result<()> {
    let user = app.users.find_user(target);
    let Some(user) = user.filter(|u| u.role() == Some(Role::Ordinary)) else {
        edit_or_send(bot, q, "Cannot promote this user.").await?;
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    app.users.set_level(target, Role::Admin).await?;
    info!("Promoted user {target} to admin");

    edit_or_send(bot, q, &format!("Promoted {} to admin!", user.name)).await?;
    notify(bot, target, "You are now an admin! You can generate invite codes.").await;
    notify_superuser(
        bot,
        app,
        &format!("Promoted {} (ID {target}) to admin.", user.name),
    )
    .await;
    bot.answer_callback_query(q.id.clone()).text("Promoted!").await?;
    Ok(())
}

async fn demote(bot: &Bot, q: &CallbackQuery, app: &App, target: i64) -> Result<()> {
    let user = app.users.find_user(target);
    let Some(user) = user.filter(|u| u.role() == Some(Role::Admin)) else {
        edit_or_send(bot, q, "Cannot demote this user.").await?;
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    app.users.set_level(target, Role::Ordinary).await?;
    info!("Demoted user {target} to ordinary");

    edit_or_send(bot, q, &format!("Demoted {} to ordinary user.", user.name)).await?;
    notify(bot, target, "You are now an ordinary user.").await;
    notify_superuser(
        bot,
        app,
        &format!("Demoted {} (ID {target}) to ordinary.", user.name),
    )
    .await;
    bot.answer_callback_query(q.id.clone()).text("Demoted!").await?;
    Ok(())
}

async fn remove(bot: &Bot, q: &CallbackQuery, app: &App, target: i64) -> Result<()> {
    let removed = match app.users.remove(target).await {
        Ok(user) => user,
        Err(StoreError::UserNotFound | StoreError::SuperuserImmutable) => {
            edit_or_send(bot, q, "Cannot remove this user.").await?;
            bot.answer_callback_query(q.id.clone()).await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    edit_or_send(bot, q, &format!("Removed {} from the bot.", removed.name)).await?;
    notify(bot, target, "Your access to the bot has been revoked.").await;
    notify_superuser(
        bot,
        app,
        &format!("Removed {} (ID {target}).", removed.name),
    )
    .await;
    bot.answer_callback_query(q.id.clone()).text("Removed!").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, name: &str, level: u8) -> UserRecord {
        UserRecord {
            id,
            name: name.to_string(),
            username: None,
            level,
        }
    }

    #[test]
    fn pagination_windows_are_correct() {
        let users: Vec<UserRecord> = (0..25)
            .map(|i| user(i, &format!("User {i}"), 2))
            .collect();

        let (text, _) = user_list_view(&users, 0);
        assert!(text.contains("Showing 1–10 of 25"));

        let (text, _) = user_list_view(&users, 2);
        assert!(text.contains("Showing 21–25 of 25"));

        let (text, _) = user_list_view(&users, 9);
        assert!(text.contains("No users on this page."));
    }

    #[test]
    fn admin_payloads_are_recognized() {
        assert!(is_admin_data("cfg_manageusers"));
        assert!(is_admin_data("users_page_3"));
        assert!(is_admin_data("confirm_remove_42"));
        assert!(!is_admin_data("cfg_newcode"));
        assert!(!is_admin_data("cat_select_3"));
        assert!(!is_admin_data("edit_7"));
    }
}
