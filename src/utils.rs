//! Text helpers and retry support for Telegram API operations.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Safely truncates a string to a maximum character length (not bytes).
///
/// UTF-8 safe: never panics on multi-byte characters.
///
/// # Examples
///
/// ```
/// use pressgate::utils::truncate_str;
/// assert_eq!(truncate_str("Привет, мир!", 6), "Привет");
/// assert_eq!(truncate_str("short", 10), "short");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Splits a message into parts that fit within Telegram's length limit,
/// breaking on line boundaries where possible.
///
/// A single line longer than `max_length` is split mid-line on a char
/// boundary rather than rejected.
#[must_use]
pub fn split_long_message(message: &str, max_length: usize) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }
    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();

    for line in message.lines() {
        if line.len() > max_length {
            if !current.is_empty() {
                parts.push(current.trim_end().to_string());
                current.clear();
            }
            let mut rest = line;
            while rest.len() > max_length {
                let cut = (1..=max_length)
                    .rev()
                    .find(|i| rest.is_char_boundary(*i))
                    .unwrap_or(rest.len());
                parts.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
            current.push_str(rest);
            current.push('\n');
            continue;
        }

        if current.len() + line.len() + 1 > max_length && !current.is_empty() {
            parts.push(current.trim_end().to_string());
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.trim_end().is_empty() {
        parts.push(current.trim_end().to_string());
    }

    parts
}

/// Retry a Telegram API operation with exponential backoff and jitter.
///
/// Intended for the calls that fail on transient network errors: sending
/// replies, `get_file` + `download_file`. Strategy is bounded by the
/// constants in [`crate::config`].
///
/// # Errors
///
/// Returns the last error once all attempts are exhausted.
pub async fn retry_telegram_operation<F, Fut, T>(mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    let mut attempt = 0usize;
    Retry::spawn(strategy, || {
        attempt += 1;
        if attempt > 1 {
            warn!("Retrying Telegram operation (attempt {attempt})");
        }
        operation()
    })
    .await
}

/// Display name for a Telegram user: "First Last", falling back to the
/// username, falling back to "Unknown".
#[must_use]
pub fn display_name(
    first_name: &str,
    last_name: Option<&str>,
    username: Option<&str>,
) -> String {
    let full = match last_name {
        Some(last) if !last.is_empty() => format!("{first_name} {last}"),
        _ => first_name.to_string(),
    };
    let full = full.trim().to_string();
    if !full.is_empty() {
        return full;
    }
    username
        .filter(|u| !u.is_empty())
        .map_or_else(|| "Unknown".to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_handles_multibyte() {
        assert_eq!(truncate_str("абвгд", 3), "абв");
    }

    #[test]
    fn split_keeps_short_messages_whole() {
        let parts = split_long_message("hello\nworld", 100);
        assert_eq!(parts, vec!["hello\nworld".to_string()]);
    }

    #[test]
    fn split_breaks_on_lines() {
        let msg = "aaaa\nbbbb\ncccc";
        let parts = split_long_message(msg, 10);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "aaaa\nbbbb");
        assert_eq!(parts[1], "cccc");
    }

    #[test]
    fn split_handles_oversized_line() {
        let msg = "x".repeat(25);
        let parts = split_long_message(&msg, 10);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.len() <= 10));
    }

    #[test]
    fn display_name_fallbacks() {
        assert_eq!(display_name("Ann", Some("Lee"), None), "Ann Lee");
        assert_eq!(display_name("", None, Some("ann_l")), "ann_l");
        assert_eq!(display_name("", None, None), "Unknown");
    }
}
