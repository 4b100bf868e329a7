//! Per-chat conversation engine.
//!
//! A [`Conversation`] is one in-progress multi-step interaction: a workflow
//! name, a cursor into that workflow's step table, and the state collected
//! so far. Every inbound event (text, photo, button press, or the
//! synthetic entry/resume events) funnels through [`Conversations::dispatch`];
//! the step handler at the cursor decides what happens and answers with a
//! [`StepAction`].
//!
//! Steps that run without user input (category presentation, preview
//! generation) are marked auto-run: after an advance lands on one, the
//! engine immediately dispatches it with [`WizardUpdate::Resume`]. Button
//! handlers outside the wizard feed synthetic [`WizardUpdate::Callback`]
//! events through the same `dispatch` entry point rather than poking the
//! cursor directly.

/// Post-edit workflow steps
pub mod edit_post;
/// Post-creation workflow steps
pub mod new_post;
/// Outbound chat seam
pub mod transport;

#[cfg(test)]
mod tests;

use crate::config::Settings;
use crate::gateway::categories::CategoryCache;
use crate::gateway::{PostSnapshot, PublishingGateway};
use crate::messages;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, warn};
use transport::ChatTransport;

/// Which step sequence an active conversation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    /// Post creation (`/newpost`)
    NewPost,
    /// Post editing (entered from a listing button)
    EditPost,
}

impl WorkflowKind {
    /// Stable workflow name, as shown in logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NewPost => "new-post",
            Self::EditPost => "edit-post",
        }
    }

    fn step_count(self) -> usize {
        match self {
            Self::NewPost => new_post::STEP_COUNT,
            Self::EditPost => edit_post::STEP_COUNT,
        }
    }

    fn is_auto(self, cursor: usize) -> bool {
        match self {
            Self::NewPost => new_post::is_auto(cursor),
            Self::EditPost => edit_post::is_auto(cursor),
        }
    }
}

/// Fields accumulated across wizard turns. Workflows use the subset they
/// care about; nothing is reset mid-flow except by explicit step logic.
#[derive(Debug, Default, Clone)]
pub struct WizardState {
    /// Post title (creation) or replacement title (edit)
    pub title: Option<String>,
    /// Sanitized HTML content
    pub content: Option<String>,
    /// Selected category
    pub category_id: Option<u64>,
    /// Telegram file id of the featured image, when one was supplied
    pub photo_file_id: Option<String>,
    /// Caption for the featured image (empty when skipped)
    pub caption: String,
    /// Post being edited
    pub post_id: Option<u64>,
    /// Pre-edit snapshot, fetched once at edit entry
    pub original: Option<PostSnapshot>,
    /// Resolved replacement status (edit)
    pub status: Option<String>,
}

/// One inbound event routed to a step handler
#[derive(Debug, Clone)]
pub enum WizardUpdate {
    /// Fired once when a workflow is entered
    Enter,
    /// Fired when the engine lands on an auto-run step
    Resume,
    /// Free text; `/skip` and `/confirm` arrive here too
    Text(String),
    /// Photo attachment (the largest variant Telegram offers)
    Photo {
        /// Platform file identifier
        file_id: String,
        /// Size in bytes
        file_size: u32,
    },
    /// Inline button press
    Callback {
        /// Callback query id, for the acknowledgement
        id: String,
        /// Opaque action token
        data: String,
        /// Message the keyboard was attached to, when still accessible
        message_id: Option<i32>,
        /// That message's text, for edit-in-place
        message_text: Option<String>,
    },
}

impl WizardUpdate {
    /// The text payload, if this is a text update.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// What a step handler wants the engine to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Keep the cursor where it is (re-prompted, or waiting)
    Stay,
    /// Move to the following step
    Next,
    /// Move to a specific step index; produced from the workflow's named
    /// step enum, never from raw arithmetic
    Jump(usize),
    /// Terminate the conversation
    Leave,
}

/// Collaborators handed to every step handler
#[derive(Clone)]
pub struct WizardDeps {
    /// Outbound chat operations, bound to the conversation's chat
    pub transport: Arc<dyn ChatTransport>,
    /// Remote content system
    pub gateway: Arc<dyn PublishingGateway>,
    /// Cached category list
    pub categories: Arc<CategoryCache>,
    /// Application settings
    pub settings: Arc<Settings>,
}

struct Conversation {
    workflow: WorkflowKind,
    cursor: usize,
    state: WizardState,
}

/// Keyed store of active conversations, one per chat.
///
/// The outer map lock is held only for lookup and insert/remove; each
/// conversation carries its own async lock, held across a step handler, so
/// a slow gateway call blocks only that chat.
#[derive(Default)]
pub struct Conversations {
    map: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<Conversation>>>>,
}

impl Conversations {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_map(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<i64, Arc<tokio::sync::Mutex<Conversation>>>> {
        self.map
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn get(&self, chat_id: i64) -> Option<Arc<tokio::sync::Mutex<Conversation>>> {
        self.lock_map().get(&chat_id).cloned()
    }

    /// Remove the conversation only if it is still the one we dispatched
    /// into; a workflow re-entered mid-step must not be torn down by the
    /// older conversation's exit.
    fn remove_if_current(&self, chat_id: i64, conv: &Arc<tokio::sync::Mutex<Conversation>>) {
        let mut map = self.lock_map();
        if map
            .get(&chat_id)
            .is_some_and(|current| Arc::ptr_eq(current, conv))
        {
            map.remove(&chat_id);
        }
    }

    /// Start a workflow for a chat, discarding any conversation already
    /// active there (last entry wins), then run the entry step.
    pub async fn enter(
        &self,
        chat_id: i64,
        workflow: WorkflowKind,
        seed: WizardState,
        deps: &WizardDeps,
    ) {
        let conv = Arc::new(tokio::sync::Mutex::new(Conversation {
            workflow,
            cursor: 0,
            state: seed,
        }));
        self.lock_map().insert(chat_id, conv);
        self.dispatch(chat_id, WizardUpdate::Enter, deps).await;
    }

    /// Route an update to the active conversation's current step. Silent
    /// no-op when the chat has no conversation.
    pub async fn dispatch(&self, chat_id: i64, update: WizardUpdate, deps: &WizardDeps) {
        let Some(conv) = self.get(chat_id) else {
            return;
        };
        let mut guard = conv.lock().await;
        let mut update = update;

        loop {
            let cursor = guard.cursor;
            let workflow = guard.workflow;

            let action =
                match run_step(workflow, cursor, &update, &mut guard.state, deps).await {
                    Ok(action) => action,
                    Err(e) => {
                        error!(
                            "Step {cursor} of {} failed for chat {chat_id}: {e:#}",
                            workflow.name()
                        );
                        let _ = deps.transport.send_text(messages::STEP_ERROR).await;
                        if cursor + 1 == workflow.step_count() {
                            StepAction::Leave
                        } else {
                            StepAction::Stay
                        }
                    }
                };

            let target = match action {
                StepAction::Stay => break,
                StepAction::Leave => {
                    drop(guard);
                    self.remove_if_current(chat_id, &conv);
                    break;
                }
                StepAction::Next => cursor + 1,
                StepAction::Jump(index) => index,
            };

            // Advancing past the last step is equivalent to leaving
            if target >= workflow.step_count() {
                drop(guard);
                self.remove_if_current(chat_id, &conv);
                break;
            }

            guard.cursor = target;
            if workflow.is_auto(target) {
                update = WizardUpdate::Resume;
                continue;
            }
            break;
        }
    }

    /// Drop the chat's conversation; no-op when none exists.
    pub fn leave(&self, chat_id: i64) -> bool {
        self.lock_map().remove(&chat_id).is_some()
    }

    /// Workflow and cursor of the active conversation, if any.
    pub async fn current(&self, chat_id: i64) -> Option<(WorkflowKind, usize)> {
        let conv = self.get(chat_id)?;
        let guard = conv.lock().await;
        Some((guard.workflow, guard.cursor))
    }
}

#[cfg(test)]
impl Conversations {
    pub(crate) async fn state_of(&self, chat_id: i64) -> Option<WizardState> {
        let conv = self.get(chat_id)?;
        let guard = conv.lock().await;
        Some(guard.state.clone())
    }
}

async fn run_step(
    workflow: WorkflowKind,
    cursor: usize,
    update: &WizardUpdate,
    state: &mut WizardState,
    deps: &WizardDeps,
) -> Result<StepAction> {
    match workflow {
        WorkflowKind::NewPost => new_post::handle(cursor, update, state, deps).await,
        WorkflowKind::EditPost => edit_post::handle(cursor, update, state, deps).await,
    }
}

pub(crate) fn invalid_cursor(workflow: WorkflowKind, cursor: usize) -> StepAction {
    warn!("Conversation cursor {cursor} out of range for {}", workflow.name());
    StepAction::Leave
}
