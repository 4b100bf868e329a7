//! Post-creation workflow (`new-post`).
//!
//! Nine steps; the cursor always points at the step that consumes the next
//! update. Two steps are auto-run: category presentation (right after the
//! content arrives) and preview generation. Jump targets come from the
//! [`Step`] enum so the skip paths read as destinations, not offsets.

use super::transport::Button;
use super::{invalid_cursor, StepAction, WizardDeps, WizardState, WizardUpdate, WorkflowKind};
use crate::config::{
    CONTENT_PREVIEW_CHARS, DEFAULT_CATEGORY_ID, MEDIA_JPEG_QUALITY, MEDIA_MAX_WIDTH,
};
use crate::utils::truncate_str;
use crate::{content, media, messages};
use anyhow::Result;
use tracing::{error, info};

/// Number of steps in this workflow
pub(crate) const STEP_COUNT: usize = 9;

/// Named steps of the creation wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Collect the title
    Title = 0,
    /// Collect the content
    Content = 1,
    /// Present the category keyboard (auto-run)
    Category = 2,
    /// Wait for a category button
    CategoryPick = 3,
    /// Early /skip fast path, otherwise echo the photo prompt
    PhotoPrompt = 4,
    /// Collect the photo
    Photo = 5,
    /// Collect the caption
    Caption = 6,
    /// Send the preview (auto-run)
    Preview = 7,
    /// Terminal confirmation
    Confirm = 8,
}

impl Step {
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    fn from_index(index: usize) -> Option<Self> {
        const ORDER: [Step; STEP_COUNT] = [
            Step::Title,
            Step::Content,
            Step::Category,
            Step::CategoryPick,
            Step::PhotoPrompt,
            Step::Photo,
            Step::Caption,
            Step::Preview,
            Step::Confirm,
        ];
        ORDER.get(index).copied()
    }
}

pub(crate) fn is_auto(cursor: usize) -> bool {
    cursor == Step::Category.index() || cursor == Step::Preview.index()
}

fn is_skip(update: &WizardUpdate) -> bool {
    update.text().is_some_and(|t| t.trim() == "/skip")
}

pub(crate) async fn handle(
    cursor: usize,
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    let Some(step) = Step::from_index(cursor) else {
        return Ok(invalid_cursor(WorkflowKind::NewPost, cursor));
    };
    match step {
        Step::Title => title(update, state, deps).await,
        Step::Content => content_step(update, state, deps).await,
        Step::Category => category(state, deps).await,
        Step::CategoryPick => category_pick(update, state, deps).await,
        Step::PhotoPrompt => photo_prompt(update, state, deps).await,
        Step::Photo => photo(update, state, deps).await,
        Step::Caption => caption(update, state, deps).await,
        Step::Preview => preview(state, deps).await,
        Step::Confirm => confirm(update, state, deps).await,
    }
}

async fn title(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    if matches!(update, WizardUpdate::Enter) {
        deps.transport.send_text(messages::TITLE_PROMPT).await?;
        return Ok(StepAction::Stay);
    }

    let Some(text) = update.text() else {
        deps.transport.send_text(messages::TITLE_REQUIRED).await?;
        return Ok(StepAction::Stay);
    };
    if text.trim().is_empty() {
        deps.transport.send_text(messages::TITLE_REQUIRED).await?;
        return Ok(StepAction::Stay);
    }

    // Stored verbatim; only the emptiness check trims
    state.title = Some(text.to_string());
    deps.transport.send_text(messages::CONTENT_PROMPT).await?;
    Ok(StepAction::Next)
}

async fn content_step(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    let Some(text) = update.text() else {
        deps.transport.send_text(messages::CONTENT_REQUIRED).await?;
        return Ok(StepAction::Stay);
    };

    state.content = Some(content::markdown_to_html(text));
    Ok(StepAction::Next)
}

/// Auto-run after the content lands. Skips straight through when a category
/// is already present from an earlier pass; degrades to the default
/// category when the list cannot be fetched.
async fn category(state: &mut WizardState, deps: &WizardDeps) -> Result<StepAction> {
    if state.category_id.is_some() {
        return Ok(StepAction::Jump(Step::PhotoPrompt.index()));
    }

    let categories = match deps.categories.get(false).await {
        Ok(list) => list,
        Err(e) => {
            error!("Failed to load categories: {e}");
            state.category_id = Some(DEFAULT_CATEGORY_ID);
            deps.transport
                .send_text(messages::CATEGORY_FETCH_FAILED)
                .await?;
            deps.transport.send_text(messages::PHOTO_PROMPT).await?;
            return Ok(StepAction::Jump(Step::Photo.index()));
        }
    };

    if categories.is_empty() {
        state.category_id = Some(DEFAULT_CATEGORY_ID);
        deps.transport.send_text(messages::CATEGORY_NONE).await?;
        deps.transport.send_text(messages::PHOTO_PROMPT).await?;
        return Ok(StepAction::Jump(Step::Photo.index()));
    }

    let buttons: Vec<Vec<Button>> = categories
        .iter()
        .map(|cat| vec![Button::new(&cat.name, format!("cat_select_{}", cat.id))])
        .collect();
    deps.transport
        .send_buttons(messages::CATEGORY_PROMPT, buttons)
        .await?;
    Ok(StepAction::Next)
}

async fn category_pick(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    if let WizardUpdate::Callback {
        id,
        data,
        message_id,
        message_text,
    } = update
    {
        if let Some(cat_id) = data
            .strip_prefix("cat_select_")
            .and_then(|raw| raw.parse::<u64>().ok())
        {
            state.category_id = Some(cat_id);
            deps.transport.ack_callback(id, "Category selected!").await?;

            if let Some(mid) = message_id {
                deps.transport.clear_buttons(*mid).await?;
                let base = message_text.as_deref().unwrap_or(messages::CATEGORY_PROMPT);
                deps.transport
                    .edit_text(*mid, &format!("{base}{}", messages::CATEGORY_SELECTED_SUFFIX))
                    .await?;
            }

            deps.transport.send_text(messages::PHOTO_PROMPT).await?;
            // Double jump: the photo-prompt echo step is redundant here
            return Ok(StepAction::Jump(Step::Photo.index()));
        }

        deps.transport.ack_callback(id, "").await?;
        return Ok(StepAction::Stay);
    }

    deps.transport.send_text(messages::CATEGORY_REQUIRED).await?;
    Ok(StepAction::Stay)
}

async fn photo_prompt(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    if is_skip(update) {
        state.photo_file_id = None;
        state.caption = String::new();
        let text = build_preview(state, deps).await;
        deps.transport.send_text(&text).await?;
        // Straight to the terminal prompt, bypassing photo, caption and the
        // preview step
        return Ok(StepAction::Jump(Step::Confirm.index()));
    }

    deps.transport.send_text(messages::PHOTO_PROMPT).await?;
    Ok(StepAction::Next)
}

async fn photo(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    if is_skip(update) {
        state.photo_file_id = None;
        state.caption = String::new();
        return Ok(StepAction::Jump(Step::Preview.index()));
    }

    let WizardUpdate::Photo { file_id, file_size } = update else {
        deps.transport.send_text(messages::PHOTO_OR_SKIP).await?;
        return Ok(StepAction::Stay);
    };

    let size_mb = f64::from(*file_size) / 1024.0 / 1024.0;
    if size_mb > f64::from(deps.settings.max_img_mb + 1) {
        deps.transport
            .send_text(&format!(
                "Image too large (> {} MB). Send smaller or /skip.",
                deps.settings.max_img_mb
            ))
            .await?;
        return Ok(StepAction::Stay);
    }

    state.photo_file_id = Some(file_id.clone());
    deps.transport.send_text(messages::CAPTION_PROMPT).await?;
    Ok(StepAction::Next)
}

async fn caption(
    update: &WizardUpdate,
    state: &mut WizardState,
    _deps: &WizardDeps,
) -> Result<StepAction> {
    match update.text() {
        Some(t) if t.trim() == "/skip" => state.caption = String::new(),
        Some(t) => state.caption = t.trim().to_string(),
        None => {}
    }
    Ok(StepAction::Next)
}

/// Auto-run once the caption step advances.
async fn preview(state: &mut WizardState, deps: &WizardDeps) -> Result<StepAction> {
    let text = build_preview(state, deps).await;
    deps.transport.send_text(&text).await?;
    Ok(StepAction::Next)
}

async fn confirm(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    if update.text().map(str::trim) != Some("/confirm") {
        deps.transport.send_text(messages::POST_CANCELLED).await?;
        return Ok(StepAction::Leave);
    }

    deps.transport.send_text(messages::POSTING).await?;

    match publish(state, deps).await {
        Ok((permalink, edit_link)) => {
            deps.transport
                .send_text(&format!(
                    "Posted successfully!\n\n{permalink}\n\nEdit: {edit_link}"
                ))
                .await?;
            info!("Posted: {permalink}");
        }
        Err(e) => {
            error!("Posting error: {e:#}");
            deps.transport.send_text(messages::POST_ERROR).await?;
        }
    }

    Ok(StepAction::Leave)
}

async fn publish(state: &WizardState, deps: &WizardDeps) -> Result<(String, String)> {
    let media_id = match &state.photo_file_id {
        Some(file_id) => {
            let bytes = deps.transport.fetch_photo(file_id).await?;
            let jpeg = media::recompress_jpeg(&bytes, MEDIA_MAX_WIDTH, MEDIA_JPEG_QUALITY)?;
            Some(deps.gateway.upload_media(jpeg, &state.caption).await?)
        }
        None => None,
    };

    let post = deps
        .gateway
        .create_post(
            state.title.as_deref().unwrap_or_default(),
            state.content.as_deref().unwrap_or_default(),
            media_id,
            state.category_id.unwrap_or(DEFAULT_CATEGORY_ID),
        )
        .await?;

    let edit_link = format!(
        "{}/wp-admin/post.php?post={}&action=edit",
        deps.settings.wp_base_url(),
        post.id
    );
    Ok((post.link, edit_link))
}

/// Formatted confirmation preview: title, truncated content, resolved
/// category name, photo/caption summary.
pub(crate) async fn build_preview(state: &WizardState, deps: &WizardDeps) -> String {
    let title = state.title.as_deref().unwrap_or("(untitled)");
    let content_preview = truncate_str(
        state.content.as_deref().unwrap_or("(empty)"),
        CONTENT_PREVIEW_CHARS,
    );

    let category_name = match state.category_id {
        None => "Uncategorized".to_string(),
        Some(DEFAULT_CATEGORY_ID) => "Uncategorized".to_string(),
        Some(id) => deps
            .categories
            .name_of(id)
            .await
            .unwrap_or_else(|| format!("ID {id}")),
    };

    let photo_line = if state.photo_file_id.is_some() {
        let caption = if state.caption.is_empty() {
            "none"
        } else {
            state.caption.as_str()
        };
        format!("Featured image: Yes (caption: {caption})")
    } else {
        "Featured image: No".to_string()
    };

    format!(
        "Ready to post?\n\n\
         Title: {title}\n\n\
         Content preview:\n{content_preview}...\n\n\
         Category: {category_name}\n\n\
         {photo_line}\n\n\
         /confirm   /cancel"
    )
}
