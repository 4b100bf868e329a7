//! Post-edit workflow (`edit-post`).
//!
//! Entered with a known post id (from a listing button). The snapshot is
//! fetched once at entry and held immutably; every later step replaces a
//! field or keeps the original via `/skip`.

use super::{invalid_cursor, StepAction, WizardDeps, WizardState, WizardUpdate, WorkflowKind};
use crate::config::CONTENT_PREVIEW_CHARS;
use crate::gateway::PostUpdate;
use crate::utils::truncate_str;
use crate::{content, messages};
use anyhow::Result;
use tracing::{error, info};

/// Number of steps in this workflow
pub(crate) const STEP_COUNT: usize = 5;

/// Named steps of the edit wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Fetch the snapshot and prompt for a title
    Load = 0,
    /// Collect the replacement title
    Title = 1,
    /// Collect the replacement content
    Content = 2,
    /// Collect and resolve the replacement status
    Status = 3,
    /// Terminal confirmation
    Confirm = 4,
}

impl Step {
    fn from_index(index: usize) -> Option<Self> {
        const ORDER: [Step; STEP_COUNT] =
            [Step::Load, Step::Title, Step::Content, Step::Status, Step::Confirm];
        ORDER.get(index).copied()
    }
}

pub(crate) fn is_auto(_cursor: usize) -> bool {
    false
}

/// Map the user's status reply onto a WordPress status, silently keeping
/// the original on `/skip` or anything unrecognized.
pub(crate) fn resolve_status(input: &str, original: &str) -> String {
    match input.trim().to_lowercase().as_str() {
        "1" | "publish" => "publish".to_string(),
        "2" | "draft" => "draft".to_string(),
        "3" | "pending" => "pending".to_string(),
        "4" | "private" => "private".to_string(),
        "5" | "trash" => "trash".to_string(),
        _ => original.to_string(),
    }
}

pub(crate) async fn handle(
    cursor: usize,
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    let Some(step) = Step::from_index(cursor) else {
        return Ok(invalid_cursor(WorkflowKind::EditPost, cursor));
    };
    match step {
        Step::Load => load(update, state, deps).await,
        Step::Title => title(update, state, deps).await,
        Step::Content => content_step(update, state, deps).await,
        Step::Status => status(update, state, deps).await,
        Step::Confirm => confirm(update, state, deps).await,
    }
}

async fn load(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    if !matches!(update, WizardUpdate::Enter) {
        return Ok(StepAction::Stay);
    }

    let Some(post_id) = state.post_id else {
        deps.transport.send_text(messages::EDIT_NO_POST_ID).await?;
        return Ok(StepAction::Leave);
    };

    let post = match deps.gateway.post_by_id(post_id).await {
        Ok(post) => post,
        Err(e) => {
            error!("Failed to load post {post_id} for edit: {e}");
            deps.transport.send_text(messages::EDIT_LOAD_ERROR).await?;
            return Ok(StepAction::Leave);
        }
    };

    let title_display = if post.title.is_empty() {
        "(no title)"
    } else {
        post.title.as_str()
    };
    deps.transport
        .send_text(&format!(
            "Editing post #{post_id}: {title_display}\n\n\
             Current title: {title_display}\n\
             Current status: {}\n\n\
             Send new title (or /skip to keep current):",
            post.status
        ))
        .await?;

    state.original = Some(post);
    Ok(StepAction::Next)
}

async fn title(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    let original = state.original.clone();
    let original_title = original.as_ref().map(|p| p.title.clone()).unwrap_or_default();
    let original_content = original.map(|p| p.content).unwrap_or_default();

    state.title = match update.text().map(str::trim) {
        Some(t) if !t.is_empty() && t != "/skip" => Some(t.to_string()),
        _ => Some(original_title),
    };

    deps.transport
        .send_text(&format!(
            "New content (Markdown supported, or /skip to keep current):\n\n\
             Current content preview: {}...",
            truncate_str(&original_content, CONTENT_PREVIEW_CHARS)
        ))
        .await?;
    Ok(StepAction::Next)
}

async fn content_step(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    let original_content = state
        .original
        .as_ref()
        .map(|p| p.content.clone())
        .unwrap_or_default();

    state.content = match update.text().map(str::trim) {
        Some(t) if !t.is_empty() && t != "/skip" => Some(content::markdown_to_html(t)),
        _ => Some(original_content),
    };

    deps.transport.send_text(messages::STATUS_PROMPT).await?;
    Ok(StepAction::Next)
}

async fn status(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    let Some(original) = state.original.clone() else {
        deps.transport.send_text(messages::EDIT_LOAD_ERROR).await?;
        return Ok(StepAction::Leave);
    };

    let resolved = match update.text() {
        Some(t) if t.trim() != "/skip" => resolve_status(t, &original.status),
        _ => original.status.clone(),
    };
    state.status = Some(resolved);

    let content_changed = state.content.as_deref() != Some(original.content.as_str());
    deps.transport
        .send_text(&format!(
            "Confirm update for post #{}:\n\n\
             Title: {}\n\
             Status: {}\n\
             Content changed: {}\n\n\
             /confirm   /cancel",
            original.id,
            state.title.as_deref().unwrap_or_default(),
            state.status.as_deref().unwrap_or_default(),
            if content_changed { "Yes" } else { "No" }
        ))
        .await?;
    Ok(StepAction::Next)
}

async fn confirm(
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    if update.text().map(str::trim) != Some("/confirm") {
        deps.transport.send_text(messages::EDIT_CANCELLED).await?;
        return Ok(StepAction::Leave);
    }

    let Some(original) = state.original.as_ref() else {
        deps.transport.send_text(messages::EDIT_ERROR).await?;
        return Ok(StepAction::Leave);
    };

    let update_payload = PostUpdate {
        title: state.title.clone(),
        content: state.content.clone(),
        status: state.status.clone(),
    };

    match deps.gateway.update_post(original.id, update_payload).await {
        Ok(()) => {
            deps.transport
                .send_text(&format!("Post #{} updated successfully!", original.id))
                .await?;
            info!("Post {} updated", original.id);
        }
        Err(e) => {
            error!("Update failed for post {}: {e}", original.id);
            deps.transport.send_text(messages::EDIT_ERROR).await?;
        }
    }

    Ok(StepAction::Leave)
}
