//! Command handlers and non-command message routing.

use super::rate_limit::RateDecision;
use super::App;
use crate::config::{TELEGRAM_MESSAGE_LIMIT, VIEW_POSTS_DEFAULT, VIEW_POSTS_MAX};
use crate::messages;
use crate::store::{OnboardResult, Role};
use crate::utils::truncate_str;
use crate::wizard::{WizardState, WizardUpdate, WorkflowKind};
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, BotCommandScope, InlineKeyboardButton, InlineKeyboardMarkup, LinkPreviewOptions,
    ParseMode,
};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Safe extraction of the sender's user ID; 0 when absent.
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn get_user_name(msg: &Message) -> String {
    msg.from.as_ref().map_or_else(
        || "Unknown".to_string(),
        |u| {
            crate::utils::display_name(
                &u.first_name,
                u.last_name.as_deref(),
                u.username.as_deref(),
            )
        },
    )
}

/// Tail-of-message parser for commands whose single argument is optional
fn optional_rest(input: String) -> Result<(String,), teloxide::utils::command::ParseError> {
    Ok((input.trim().to_string(),))
}

/// Registered commands. `/skip` and `/confirm` are deliberately absent:
/// they are wizard tokens and reach the active conversation as text.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Welcome and menu refresh
    #[command(description = "Help & welcome.")]
    Start,
    /// Start the post-creation wizard
    #[command(description = "Create a new post.")]
    NewPost,
    /// List recent posts with edit buttons: /viewposts [n]
    #[command(description = "View recent posts: /viewposts [n]", parse_with = optional_rest)]
    ViewPosts(String),
    /// Leave the active conversation
    #[command(description = "Cancel the current action.")]
    Cancel,
    /// Admin tools menu
    #[command(description = "Admin tools & settings.")]
    Config,
    /// Generate a single-use invite code
    #[command(description = "Generate an invite code.")]
    NewUserCode,
    /// Redeem an invite passcode: `/addmetobot CODE`
    #[command(
        description = "Join with an invite passcode: /addmetobot <code>",
        parse_with = optional_rest
    )]
    AddMeToBot(String),
    /// List authorized users
    #[command(description = "List authorized users.")]
    ListUsers,
}

/// Route one parsed command. Onboarding is open to unknown users; every
/// other command requires a role.
pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, app: Arc<App>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);

    if let Command::AddMeToBot(code) = &cmd {
        return add_me_to_bot(&bot, &msg, &app, code).await;
    }

    let Some(role) = app.users.level_of(user_id) else {
        return deny_unknown(&bot, &msg, &app).await;
    };

    match cmd {
        Command::Start => start(&bot, &msg, role).await,
        Command::NewPost => new_post(&bot, &msg, &app).await,
        Command::ViewPosts(arg) => view_posts(&bot, &msg, &app, &arg).await,
        Command::Cancel => cancel(&bot, &msg, &app).await,
        Command::Config => config_menu(&bot, &msg, &app, role).await,
        Command::NewUserCode => new_user_code(&bot, &msg, &app, role).await,
        Command::ListUsers => list_users(&bot, &msg, &app, role).await,
        Command::AddMeToBot(_) => Ok(()),
    }
}

/// Non-command messages: feed the active conversation, or nudge about the
/// menu for unknown slash input.
pub async fn handle_message(bot: Bot, msg: Message, app: Arc<App>) -> Result<()> {
    let chat_id = msg.chat.id;
    let active = app.conversations.current(chat_id.0).await.is_some();

    if let Some(text) = msg.text() {
        if active {
            let deps = app.wizard_deps(&bot, chat_id);
            app.conversations
                .dispatch(chat_id.0, WizardUpdate::Text(text.to_string()), &deps)
                .await;
        } else if text.starts_with('/') {
            bot.send_message(chat_id, messages::UNKNOWN_COMMAND).await?;
        }
        return Ok(());
    }

    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        if !active {
            return Ok(());
        }
        let update = WizardUpdate::Photo {
            file_id: photo.file.id.0.clone(),
            file_size: photo.file.size,
        };
        let deps = app.wizard_deps(&bot, chat_id);
        app.conversations.dispatch(chat_id.0, update, &deps).await;
    }

    Ok(())
}

/// Denial path for unknown users, throttled by the cooldown cache.
pub async fn deny_unknown(bot: &Bot, msg: &Message, app: &App) -> Result<()> {
    let user_id = get_user_id_safe(msg);
    if app.denials.should_notify(user_id).await {
        warn!("Unauthorized access from {user_id} ({})", get_user_name(msg));
        bot.send_message(msg.chat.id, messages::ACCESS_DENIED).await?;
        app.denials.mark_notified(user_id).await;
    }
    Ok(())
}

async fn start(bot: &Bot, msg: &Message, role: Role) -> Result<()> {
    info!(
        "User {} ({}) initiated /start",
        get_user_id_safe(msg),
        get_user_name(msg)
    );
    bot.send_message(msg.chat.id, messages::WELCOME).await?;
    update_menu(bot, msg.chat.id, role).await;
    Ok(())
}

/// Per-chat command menu: ordinary users never see the admin entries.
async fn update_menu(bot: &Bot, chat_id: ChatId, role: Role) {
    let mut commands = vec![
        BotCommand::new("newpost", "Create a new post"),
        BotCommand::new("viewposts", "View recent posts"),
        BotCommand::new("cancel", "Cancel the current action"),
        BotCommand::new("start", "Help & welcome"),
    ];
    if role.is_admin_or_super() {
        commands.push(BotCommand::new("config", "Admin tools & settings"));
    }

    if let Err(e) = bot
        .set_my_commands(commands)
        .scope(BotCommandScope::Chat {
            chat_id: chat_id.into(),
        })
        .await
    {
        error!("Failed to set command menu for chat {chat_id}: {e}");
    }
}

async fn new_post(bot: &Bot, msg: &Message, app: &App) -> Result<()> {
    let deps = app.wizard_deps(bot, msg.chat.id);
    app.conversations
        .enter(
            msg.chat.id.0,
            WorkflowKind::NewPost,
            WizardState::default(),
            &deps,
        )
        .await;
    Ok(())
}

async fn cancel(bot: &Bot, msg: &Message, app: &App) -> Result<()> {
    let reply = if app.conversations.leave(msg.chat.id.0) {
        messages::CANCELLED
    } else {
        messages::NOTHING_TO_CANCEL
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn rate_limited(bot: &Bot, msg: &Message, app: &App, action: &str) -> Result<bool> {
    let user_id = get_user_id_safe(msg);
    match app.rate_limiter.check(user_id, action).await {
        RateDecision::Allowed => Ok(false),
        RateDecision::Blocked { retry_in_secs } => {
            bot.send_message(
                msg.chat.id,
                format!("You're doing that too fast. Wait {retry_in_secs} seconds and try again."),
            )
            .await?;
            Ok(true)
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

fn disabled_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

async fn view_posts(bot: &Bot, msg: &Message, app: &App, arg: &str) -> Result<()> {
    if rate_limited(bot, msg, app, "viewposts").await? {
        return Ok(());
    }

    let limit = arg
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map_or(VIEW_POSTS_DEFAULT, |n| n.min(VIEW_POSTS_MAX));

    bot.send_message(
        msg.chat.id,
        format!("Fetching last {limit} published posts..."),
    )
    .await?;

    let posts = match app.gateway.recent_posts(limit).await {
        Ok(posts) => posts,
        Err(e) => {
            error!("View posts error: {e}");
            bot.send_message(msg.chat.id, "Error fetching posts. Please try again later.")
                .await?;
            return Ok(());
        }
    };

    if posts.is_empty() {
        bot.send_message(msg.chat.id, "No posts found (published, draft or pending).")
            .await?;
        return Ok(());
    }

    let mut text = format!(
        "📋 <b>Last {} posts</b> (any status)\n\nTap an edit button below to change a post\n\n",
        posts.len()
    );
    let mut rows = Vec::new();
    for post in &posts {
        let full_title = if post.title.is_empty() {
            "(no title)"
        } else {
            post.title.as_str()
        };
        let mut title = truncate_str(full_title, 50);
        if title.len() < full_title.len() {
            title.push_str("...");
        }

        text.push_str(&format!(
            "• <a href=\"{}\">{}</a> – {}\n",
            post.link,
            html_escape::encode_text(&title),
            capitalize(&post.status)
        ));
        rows.push(vec![InlineKeyboardButton::callback(
            format!("Edit: {title}"),
            format!("edit_{}", post.id),
        )]);
    }

    // A long listing is split on line boundaries; the edit keyboard rides
    // on the final part
    let parts = crate::utils::split_long_message(&text, TELEGRAM_MESSAGE_LIMIT);
    let last = parts.len().saturating_sub(1);
    for (i, part) in parts.into_iter().enumerate() {
        let mut req = bot
            .send_message(msg.chat.id, part)
            .parse_mode(ParseMode::Html)
            .link_preview_options(disabled_preview());
        if i == last {
            req = req.reply_markup(InlineKeyboardMarkup::new(rows.clone()));
        }
        req.await?;
    }
    Ok(())
}

async fn config_menu(bot: &Bot, msg: &Message, app: &App, role: Role) -> Result<()> {
    if rate_limited(bot, msg, app, "config").await? {
        return Ok(());
    }
    if !role.is_admin_or_super() {
        bot.send_message(msg.chat.id, "You don't have access to config tools.")
            .await?;
        return Ok(());
    }

    let mut rows = vec![vec![InlineKeyboardButton::callback(
        "Generate Invite Code",
        "cfg_newcode",
    )]];
    if role == Role::Superuser {
        rows.push(vec![InlineKeyboardButton::callback(
            "Manage Users",
            "cfg_manageusers",
        )]);
        rows.push(vec![InlineKeyboardButton::callback(
            "Refresh Categories",
            "cfg_refreshcats",
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback("Cancel", "cfg_cancel")]);

    bot.send_message(msg.chat.id, "🛠 Config & Admin Tools\n\nChoose an action:")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

async fn new_user_code(bot: &Bot, msg: &Message, app: &App, role: Role) -> Result<()> {
    if !role.is_admin_or_super() {
        bot.send_message(
            msg.chat.id,
            "Only admins or superuser can generate invite codes.",
        )
        .await?;
        return Ok(());
    }

    match app.users.new_passcode().await {
        Ok(code) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "New invite code created: <b>{code}</b>\n\n\
                     Forward this to the person you want to add. It is single-use."
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            info!("New passcode generated by {}", get_user_id_safe(msg));
        }
        Err(e) => {
            error!("Passcode generation failed: {e}");
            bot.send_message(msg.chat.id, "Error generating code.").await?;
        }
    }
    Ok(())
}

async fn add_me_to_bot(bot: &Bot, msg: &Message, app: &App, code: &str) -> Result<()> {
    let code = code.trim();
    if code.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /addmetobot <passcode>")
            .await?;
        return Ok(());
    }
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    let outcome = app
        .users
        .try_add_user(
            get_user_id_safe(msg),
            from.username.as_deref(),
            &from.first_name,
            from.last_name.as_deref(),
            code,
        )
        .await?;

    match outcome {
        OnboardResult::Added { name } => {
            bot.send_message(
                msg.chat.id,
                format!("Success! You have been added as an ordinary user. Welcome, {name}!"),
            )
            .await?;
            notify_admins_of_join(bot, app, msg, &name).await;
        }
        OnboardResult::Rejected { reason } => {
            bot.send_message(msg.chat.id, reason).await?;
        }
    }
    Ok(())
}

async fn notify_admins_of_join(bot: &Bot, app: &App, msg: &Message, name: &str) {
    let user_id = get_user_id_safe(msg);
    let username = msg
        .from
        .as_ref()
        .and_then(|u| u.username.as_deref())
        .unwrap_or("none");
    let notification = format!(
        "New user added via passcode:\nID: {user_id}\nName: {name}\nUsername: @{username}"
    );

    let mut recipients: Vec<i64> = app
        .users
        .all_users()
        .into_iter()
        .filter(|u| u.role().is_some_and(Role::is_admin_or_super))
        .map(|u| u.id)
        .collect();
    if let Some(superuser) = app.settings.superuser_id {
        if !recipients.contains(&superuser) {
            recipients.push(superuser);
        }
    }

    for admin_id in recipients {
        if let Err(e) = bot.send_message(ChatId(admin_id), notification.clone()).await {
            error!("Failed to notify admin {admin_id}: {e}");
        }
    }
}

async fn list_users(bot: &Bot, msg: &Message, app: &App, role: Role) -> Result<()> {
    if !role.is_admin_or_super() {
        bot.send_message(msg.chat.id, "Not authorized.").await?;
        return Ok(());
    }

    let users = app.users.all_users();
    if users.is_empty() {
        bot.send_message(msg.chat.id, "No additional users added yet.")
            .await?;
        return Ok(());
    }

    let mut text = "Authorized users:\n\n".to_string();
    for user in users {
        text.push_str(&format!(
            "- ID: {} | Name: {} | Level: {}\n",
            user.id, user.name, user.level
        ));
    }
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_handles_empty_and_unicode() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("draft"), "Draft");
        assert_eq!(capitalize("публикация"), "Публикация");
    }

    #[test]
    fn command_parsing_accepts_optional_args() {
        assert!(matches!(
            Command::parse("/viewposts", "press_bot"),
            Ok(Command::ViewPosts(arg)) if arg.is_empty()
        ));
        assert!(matches!(
            Command::parse("/viewposts 12", "press_bot"),
            Ok(Command::ViewPosts(arg)) if arg == "12"
        ));
        assert!(matches!(
            Command::parse("/addmetobot ABCD2345", "press_bot"),
            Ok(Command::AddMeToBot(code)) if code == "ABCD2345"
        ));
        // Wizard tokens are not commands
        assert!(Command::parse("/skip", "press_bot").is_err());
        assert!(Command::parse("/confirm", "press_bot").is_err());
    }
}
