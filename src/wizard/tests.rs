//! End-to-end wizard tests against mocked transport and gateway.

use super::transport::MockChatTransport;
use super::*;
use crate::config::Settings;
use crate::content::markdown_to_html;
use crate::gateway::{Category, CreatedPost, GatewayError, MockPublishingGateway, PostSnapshot};
use mockall::Sequence;
use std::time::Duration;

const CHAT: i64 = 10;

fn settings() -> Settings {
    Settings {
        telegram_token: "dummy".to_string(),
        wp_site_url: "https://site.example".to_string(),
        wp_username: "bot".to_string(),
        wp_app_password: "pass".to_string(),
        wp_post_status: "publish".to_string(),
        superuser_id: Some(1),
        max_img_mb: 2,
        max_num_users: 10,
        users_file: "users.json".to_string(),
        passcodes_file: "passcodes.json".to_string(),
    }
}

/// Transport that accepts anything; for tests that assert on state and
/// cursor movement rather than on replies.
fn lenient_transport() -> MockChatTransport {
    let mut transport = MockChatTransport::new();
    add_lenient_fallbacks(&mut transport);
    transport
}

/// Add the catch-all fallbacks to an existing transport. Because mockall
/// matches expectations in FIFO order, any specific `.withf(...)` expectation
/// must be registered on the mock *before* calling this so it takes priority
/// over the generic fallback.
fn add_lenient_fallbacks(transport: &mut MockChatTransport) {
    transport.expect_send_text().returning(|_| Ok(()));
    transport.expect_send_buttons().returning(|_, _| Ok(()));
    transport.expect_edit_text().returning(|_, _| Ok(()));
    transport.expect_clear_buttons().returning(|_| Ok(()));
    transport.expect_ack_callback().returning(|_, _| Ok(()));
    transport
        .expect_fetch_photo()
        .returning(|_| Ok(Vec::new()));
}

fn sample_categories() -> Vec<Category> {
    vec![
        Category {
            id: 3,
            name: "News".to_string(),
            slug: "news".to_string(),
        },
        Category {
            id: 4,
            name: "Notes".to_string(),
            slug: "notes".to_string(),
        },
    ]
}

fn make_deps(transport: MockChatTransport, gateway: MockPublishingGateway) -> WizardDeps {
    let gateway: Arc<dyn PublishingGateway> = Arc::new(gateway);
    WizardDeps {
        transport: Arc::new(transport),
        gateway: Arc::clone(&gateway),
        categories: Arc::new(CategoryCache::new(gateway, Duration::from_secs(600))),
        settings: Arc::new(settings()),
    }
}

fn text(t: &str) -> WizardUpdate {
    WizardUpdate::Text(t.to_string())
}

fn category_button(id: u64) -> WizardUpdate {
    WizardUpdate::Callback {
        id: "cbq1".to_string(),
        data: format!("cat_select_{id}"),
        message_id: Some(77),
        message_text: Some("Select a category".to_string()),
    }
}

/// Drive a fresh new-post conversation up to the category keyboard.
async fn advance_to_category_pick(engine: &Conversations, deps: &WizardDeps) {
    engine
        .enter(CHAT, WorkflowKind::NewPost, WizardState::default(), deps)
        .await;
    engine.dispatch(CHAT, text("T"), deps).await;
    engine.dispatch(CHAT, text("C"), deps).await;
    assert_eq!(
        engine.current(CHAT).await,
        Some((WorkflowKind::NewPost, new_post::Step::CategoryPick.index()))
    );
}

#[tokio::test]
async fn dispatch_without_conversation_is_a_silent_noop() {
    // No expectations on either mock: any call would fail the test
    let deps = make_deps(MockChatTransport::new(), MockPublishingGateway::new());
    let engine = Conversations::new();
    engine.dispatch(CHAT, text("hello"), &deps).await;
    assert_eq!(engine.current(CHAT).await, None);
}

#[tokio::test]
async fn entering_twice_replaces_the_conversation() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_categories()
        .returning(|| Ok(sample_categories()));
    let deps = make_deps(lenient_transport(), gateway);
    let engine = Conversations::new();

    advance_to_category_pick(&engine, &deps).await;

    // Re-entering resets cursor and discards collected state
    engine
        .enter(CHAT, WorkflowKind::NewPost, WizardState::default(), &deps)
        .await;
    assert_eq!(engine.current(CHAT).await, Some((WorkflowKind::NewPost, 0)));
    let state = engine.state_of(CHAT).await.expect("state");
    assert_eq!(state.title, None);
}

#[tokio::test]
async fn leave_is_idempotent() {
    let deps = make_deps(lenient_transport(), MockPublishingGateway::new());
    let engine = Conversations::new();

    engine
        .enter(CHAT, WorkflowKind::NewPost, WizardState::default(), &deps)
        .await;
    assert!(engine.leave(CHAT));
    assert!(!engine.leave(CHAT));
    assert_eq!(engine.current(CHAT).await, None);
}

#[tokio::test]
async fn empty_title_does_not_advance() {
    let deps = make_deps(lenient_transport(), MockPublishingGateway::new());
    let engine = Conversations::new();

    engine
        .enter(CHAT, WorkflowKind::NewPost, WizardState::default(), &deps)
        .await;
    engine.dispatch(CHAT, text("   "), &deps).await;
    assert_eq!(engine.current(CHAT).await, Some((WorkflowKind::NewPost, 0)));

    engine.dispatch(CHAT, text("  My Title "), &deps).await;
    assert_eq!(
        engine.current(CHAT).await,
        Some((WorkflowKind::NewPost, new_post::Step::Content.index()))
    );
    // Stored verbatim, pre-trim
    let state = engine.state_of(CHAT).await.expect("state");
    assert_eq!(state.title.as_deref(), Some("  My Title "));
}

#[tokio::test]
async fn category_button_double_jumps_to_the_photo_step() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_categories()
        .returning(|| Ok(sample_categories()));

    let mut transport = MockChatTransport::new();
    transport
        .expect_clear_buttons()
        .withf(|mid| *mid == 77)
        .times(1)
        .returning(|_| Ok(()));
    add_lenient_fallbacks(&mut transport);

    let deps = make_deps(transport, gateway);
    let engine = Conversations::new();
    advance_to_category_pick(&engine, &deps).await;

    engine.dispatch(CHAT, category_button(3), &deps).await;

    assert_eq!(
        engine.current(CHAT).await,
        Some((WorkflowKind::NewPost, new_post::Step::Photo.index()))
    );
    let state = engine.state_of(CHAT).await.expect("state");
    assert_eq!(state.category_id, Some(3));
}

#[tokio::test]
async fn non_button_input_at_category_pick_changes_nothing() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_categories()
        .returning(|| Ok(sample_categories()));
    let deps = make_deps(lenient_transport(), gateway);
    let engine = Conversations::new();
    advance_to_category_pick(&engine, &deps).await;

    engine.dispatch(CHAT, text("3"), &deps).await;

    assert_eq!(
        engine.current(CHAT).await,
        Some((WorkflowKind::NewPost, new_post::Step::CategoryPick.index()))
    );
    let state = engine.state_of(CHAT).await.expect("state");
    assert_eq!(state.category_id, None);
}

#[tokio::test]
async fn category_fetch_failure_falls_back_to_default() {
    let mut gateway = MockPublishingGateway::new();
    gateway.expect_categories().returning(|| {
        Err(GatewayError::Status {
            status: 500,
            body: "boom".to_string(),
        })
    });
    let deps = make_deps(lenient_transport(), gateway);
    let engine = Conversations::new();

    engine
        .enter(CHAT, WorkflowKind::NewPost, WizardState::default(), &deps)
        .await;
    engine.dispatch(CHAT, text("T"), &deps).await;
    engine.dispatch(CHAT, text("C"), &deps).await;

    assert_eq!(
        engine.current(CHAT).await,
        Some((WorkflowKind::NewPost, new_post::Step::Photo.index()))
    );
    let state = engine.state_of(CHAT).await.expect("state");
    assert_eq!(state.category_id, Some(crate::config::DEFAULT_CATEGORY_ID));
}

#[tokio::test]
async fn oversized_photo_is_rejected_without_advancing() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_categories()
        .returning(|| Ok(sample_categories()));
    let deps = make_deps(lenient_transport(), gateway);
    let engine = Conversations::new();
    advance_to_category_pick(&engine, &deps).await;
    engine.dispatch(CHAT, category_button(3), &deps).await;

    // max_img_mb is 2, limit is 3 MiB; send 4 MiB
    let oversized = WizardUpdate::Photo {
        file_id: "photo-file".to_string(),
        file_size: 4 * 1024 * 1024,
    };
    engine.dispatch(CHAT, oversized, &deps).await;

    assert_eq!(
        engine.current(CHAT).await,
        Some((WorkflowKind::NewPost, new_post::Step::Photo.index()))
    );
    let state = engine.state_of(CHAT).await.expect("state");
    assert_eq!(state.photo_file_id, None);
}

#[tokio::test]
async fn photo_skip_jumps_to_the_confirmation_preview() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_categories()
        .returning(|| Ok(sample_categories()));

    let mut transport = MockChatTransport::new();
    transport
        .expect_send_text()
        .withf(|t| t.starts_with("Ready to post?"))
        .times(1)
        .returning(|_| Ok(()));
    add_lenient_fallbacks(&mut transport);

    let deps = make_deps(transport, gateway);
    let engine = Conversations::new();
    advance_to_category_pick(&engine, &deps).await;
    engine.dispatch(CHAT, category_button(3), &deps).await;

    engine.dispatch(CHAT, text("/skip"), &deps).await;

    assert_eq!(
        engine.current(CHAT).await,
        Some((WorkflowKind::NewPost, new_post::Step::Confirm.index()))
    );
    let state = engine.state_of(CHAT).await.expect("state");
    assert_eq!(state.photo_file_id, None);
    assert_eq!(state.caption, "");
}

#[tokio::test]
async fn preview_resolves_the_category_name() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_categories()
        .returning(|| Ok(sample_categories()));

    let mut transport = MockChatTransport::new();
    transport
        .expect_send_text()
        .withf(|t| t.starts_with("Ready to post?") && t.contains("Category: News"))
        .times(1)
        .returning(|_| Ok(()));
    add_lenient_fallbacks(&mut transport);

    let deps = make_deps(transport, gateway);
    let engine = Conversations::new();
    advance_to_category_pick(&engine, &deps).await;
    engine.dispatch(CHAT, category_button(3), &deps).await;
    engine.dispatch(CHAT, text("/skip"), &deps).await;
}

#[tokio::test]
async fn full_round_trip_creates_exactly_one_post() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_categories()
        .returning(|| Ok(sample_categories()));
    gateway
        .expect_create_post()
        .withf(|title, content, media_id, category_id| {
            title == "T"
                && content == markdown_to_html("C")
                && media_id.is_none()
                && *category_id == 3
        })
        .times(1)
        .returning(|_, _, _, _| {
            Ok(CreatedPost {
                id: 55,
                link: "https://site.example/?p=55".to_string(),
            })
        });

    let mut transport = MockChatTransport::new();
    transport
        .expect_send_text()
        .withf(|t| t.contains("Posted successfully!") && t.contains("post.php?post=55"))
        .times(1)
        .returning(|_| Ok(()));
    add_lenient_fallbacks(&mut transport);

    let deps = make_deps(transport, gateway);
    let engine = Conversations::new();
    advance_to_category_pick(&engine, &deps).await;
    engine.dispatch(CHAT, category_button(3), &deps).await;
    engine.dispatch(CHAT, text("/skip"), &deps).await;
    engine.dispatch(CHAT, text("/confirm"), &deps).await;

    // Terminal step always ends the conversation
    assert_eq!(engine.current(CHAT).await, None);
}

#[tokio::test]
async fn failed_publish_still_ends_the_conversation() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_categories()
        .returning(|| Ok(sample_categories()));
    gateway.expect_create_post().times(1).returning(|_, _, _, _| {
        Err(GatewayError::Status {
            status: 500,
            body: "boom".to_string(),
        })
    });

    let mut transport = MockChatTransport::new();
    transport
        .expect_send_text()
        .withf(|t| t == crate::messages::POST_ERROR)
        .times(1)
        .returning(|_| Ok(()));
    add_lenient_fallbacks(&mut transport);

    let deps = make_deps(transport, gateway);
    let engine = Conversations::new();
    advance_to_category_pick(&engine, &deps).await;
    engine.dispatch(CHAT, category_button(3), &deps).await;
    engine.dispatch(CHAT, text("/skip"), &deps).await;
    engine.dispatch(CHAT, text("/confirm"), &deps).await;

    assert_eq!(engine.current(CHAT).await, None);
}

#[tokio::test]
async fn anything_but_confirm_cancels_at_the_terminal_step() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_categories()
        .returning(|| Ok(sample_categories()));

    let mut transport = MockChatTransport::new();
    transport
        .expect_send_text()
        .withf(|t| t == crate::messages::POST_CANCELLED)
        .times(1)
        .returning(|_| Ok(()));
    add_lenient_fallbacks(&mut transport);

    let deps = make_deps(transport, gateway);
    let engine = Conversations::new();
    advance_to_category_pick(&engine, &deps).await;
    engine.dispatch(CHAT, category_button(3), &deps).await;
    engine.dispatch(CHAT, text("/skip"), &deps).await;
    engine.dispatch(CHAT, text("nah"), &deps).await;

    assert_eq!(engine.current(CHAT).await, None);
}

#[tokio::test]
async fn step_error_keeps_the_cursor_in_place() {
    let mut transport = MockChatTransport::new();
    let mut seq = Sequence::new();
    // The title prompt fails, the generic error notice succeeds
    transport
        .expect_send_text()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(anyhow::anyhow!("network down")));
    transport
        .expect_send_text()
        .withf(|t| t == crate::messages::STEP_ERROR)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let deps = make_deps(transport, MockPublishingGateway::new());
    let engine = Conversations::new();
    engine
        .enter(CHAT, WorkflowKind::NewPost, WizardState::default(), &deps)
        .await;

    // Conversation survives at the same cursor
    assert_eq!(engine.current(CHAT).await, Some((WorkflowKind::NewPost, 0)));
}

fn edit_snapshot() -> PostSnapshot {
    PostSnapshot {
        id: 7,
        title: "Old title".to_string(),
        content: "<p>Old content</p>".to_string(),
        status: "publish".to_string(),
        link: "https://site.example/?p=7".to_string(),
    }
}

fn edit_seed() -> WizardState {
    WizardState {
        post_id: Some(7),
        ..WizardState::default()
    }
}

#[tokio::test]
async fn edit_flow_skips_keep_the_original_values() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_post_by_id()
        .withf(|id| *id == 7)
        .times(1)
        .returning(|_| Ok(edit_snapshot()));
    gateway
        .expect_update_post()
        .withf(|id, update| {
            *id == 7
                && update.title.as_deref() == Some("Old title")
                && update.content.as_deref() == Some("<p>Old content</p>")
                && update.status.as_deref() == Some("draft")
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let deps = make_deps(lenient_transport(), gateway);
    let engine = Conversations::new();

    engine
        .enter(CHAT, WorkflowKind::EditPost, edit_seed(), &deps)
        .await;
    engine.dispatch(CHAT, text("/skip"), &deps).await; // keep title
    engine.dispatch(CHAT, text("/skip"), &deps).await; // keep content
    engine.dispatch(CHAT, text("2"), &deps).await; // -> draft
    engine.dispatch(CHAT, text("/confirm"), &deps).await;

    assert_eq!(engine.current(CHAT).await, None);
}

#[tokio::test]
async fn edit_flow_transforms_replacement_content() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_post_by_id()
        .times(1)
        .returning(|_| Ok(edit_snapshot()));
    gateway
        .expect_update_post()
        .withf(|_, update| {
            update.title.as_deref() == Some("New title")
                && update.content.as_deref() == Some(markdown_to_html("**New** body").as_str())
                && update.status.as_deref() == Some("publish")
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let deps = make_deps(lenient_transport(), gateway);
    let engine = Conversations::new();

    engine
        .enter(CHAT, WorkflowKind::EditPost, edit_seed(), &deps)
        .await;
    engine.dispatch(CHAT, text("New title"), &deps).await;
    engine.dispatch(CHAT, text("**New** body"), &deps).await;
    engine.dispatch(CHAT, text("junk status"), &deps).await; // keeps publish
    engine.dispatch(CHAT, text("/confirm"), &deps).await;

    assert_eq!(engine.current(CHAT).await, None);
}

#[tokio::test]
async fn edit_load_failure_terminates_immediately() {
    let mut gateway = MockPublishingGateway::new();
    gateway.expect_post_by_id().times(1).returning(|_| {
        Err(GatewayError::Status {
            status: 404,
            body: "not found".to_string(),
        })
    });

    let mut transport = MockChatTransport::new();
    transport
        .expect_send_text()
        .withf(|t| t == crate::messages::EDIT_LOAD_ERROR)
        .times(1)
        .returning(|_| Ok(()));
    add_lenient_fallbacks(&mut transport);

    let deps = make_deps(transport, gateway);
    let engine = Conversations::new();
    engine
        .enter(CHAT, WorkflowKind::EditPost, edit_seed(), &deps)
        .await;

    assert_eq!(engine.current(CHAT).await, None);
}

#[tokio::test]
async fn edit_without_post_id_terminates() {
    let deps = make_deps(lenient_transport(), MockPublishingGateway::new());
    let engine = Conversations::new();
    engine
        .enter(CHAT, WorkflowKind::EditPost, WizardState::default(), &deps)
        .await;
    assert_eq!(engine.current(CHAT).await, None);
}

#[tokio::test]
async fn conversations_are_independent_per_chat() {
    let mut gateway = MockPublishingGateway::new();
    gateway
        .expect_categories()
        .returning(|| Ok(sample_categories()));
    let deps = make_deps(lenient_transport(), gateway);
    let engine = Conversations::new();

    engine
        .enter(CHAT, WorkflowKind::NewPost, WizardState::default(), &deps)
        .await;
    engine
        .enter(CHAT + 1, WorkflowKind::NewPost, WizardState::default(), &deps)
        .await;
    engine.dispatch(CHAT, text("T"), &deps).await;

    assert_eq!(
        engine.current(CHAT).await,
        Some((WorkflowKind::NewPost, new_post::Step::Content.index()))
    );
    assert_eq!(
        engine.current(CHAT + 1).await,
        Some((WorkflowKind::NewPost, 0))
    );
}
