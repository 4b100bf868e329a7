//! Per-user throttles.
//!
//! [`RateLimiter`] counts command invocations per `(user, action)` inside a
//! reset window. [`DenialCache`] keeps "access denied" replies to unknown
//! users down to one per cooldown period so the bot cannot be baited into
//! flooding Telegram. Both are moka caches; entry expiry replaces the
//! periodic sweeper a hand-rolled map would need.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Result of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Within budget; the attempt was counted
    Allowed,
    /// Over budget for this window
    Blocked {
        /// Seconds until the window resets
        retry_in_secs: u64,
    },
}

#[derive(Clone)]
struct RateEntry {
    count: u32,
    reset_at: Instant,
}

/// Sliding-window-ish attempt counter per `(user, action)`
pub struct RateLimiter {
    cache: Cache<String, RateEntry>,
    max_attempts: u32,
    window: Duration,
}

impl RateLimiter {
    /// `max_attempts` tries are allowed inside each `window`.
    #[must_use]
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(window.max(Duration::from_secs(1)))
            .build();
        Self {
            cache,
            max_attempts,
            window,
        }
    }

    /// Count one attempt and decide whether it may proceed.
    pub async fn check(&self, user_id: i64, action: &str) -> RateDecision {
        let key = format!("{user_id}:{action}");
        let now = Instant::now();

        let entry = match self.cache.get(&key).await {
            Some(entry) if now < entry.reset_at => entry,
            _ => {
                // First attempt, or the window elapsed
                self.cache
                    .insert(
                        key,
                        RateEntry {
                            count: 1,
                            reset_at: now + self.window,
                        },
                    )
                    .await;
                return RateDecision::Allowed;
            }
        };

        if entry.count >= self.max_attempts {
            let remaining = entry.reset_at.saturating_duration_since(now);
            let mut secs = remaining.as_secs();
            if remaining.subsec_nanos() > 0 {
                secs += 1;
            }
            return RateDecision::Blocked {
                retry_in_secs: secs.max(1),
            };
        }

        self.cache
            .insert(
                key,
                RateEntry {
                    count: entry.count + 1,
                    reset_at: entry.reset_at,
                },
            )
            .await;
        RateDecision::Allowed
    }
}

/// Cooldown tracker for "access denied" replies to unknown users
pub struct DenialCache {
    cache: Cache<i64, ()>,
    silenced: AtomicU64,
}

impl DenialCache {
    /// One reply per `cooldown_secs` per user; at most `max_capacity`
    /// tracked users.
    #[must_use]
    pub fn new(cooldown_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(cooldown_secs))
            .build();
        Self {
            cache,
            silenced: AtomicU64::new(0),
        }
    }

    /// Whether this user should get a denial reply right now. Silenced
    /// attempts are counted, with log lines throttled to every 100th.
    pub async fn should_notify(&self, user_id: i64) -> bool {
        if self.cache.get(&user_id).await.is_none() {
            return true;
        }
        let count = self.silenced.fetch_add(1, Ordering::Relaxed) + 1;
        if count % 100 == 0 {
            debug!("Silenced {count} unauthorized attempts (recent: user {user_id})");
        }
        false
    }

    /// Start the cooldown after a denial reply went out.
    pub async fn mark_notified(&self, user_id: i64) {
        self.cache.insert(user_id, ()).await;
    }

    /// Total number of silenced attempts, for logs and diagnostics.
    #[must_use]
    pub fn silenced_total(&self) -> u64 {
        self.silenced.load(Ordering::Relaxed)
    }
}
