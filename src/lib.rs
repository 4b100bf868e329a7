//! Telegram front end for authoring and editing WordPress posts.
//!
//! The interesting part lives in [`wizard`]: a per-chat multi-step
//! conversation engine with two workflows (post creation, post editing).
//! Everything else is collaborator glue: the WordPress REST client, the
//! JSON-file user/passcode store, rate limiting and command routing.

/// Telegram-facing layer: commands, callback routing, admin tools
pub mod bot;
/// Settings and tunables
pub mod config;
/// Markdown to sanitized WordPress HTML
pub mod content;
/// WordPress REST client and category cache
pub mod gateway;
/// Featured-image recompression
pub mod media;
/// Canned user-facing texts
pub mod messages;
/// Users and invite passcodes, persisted as JSON files
pub mod store;
/// Text helpers and Telegram retry support
pub mod utils;
/// Conversation engine and the two wizards
pub mod wizard;
