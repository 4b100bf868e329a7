//! Configuration and settings management
//!
//! Loads settings from environment variables / config files and defines
//! the fixed tunables of the bot.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Base URL of the WordPress site (trailing slash tolerated)
    pub wp_site_url: String,
    /// WordPress account used for REST calls
    pub wp_username: String,
    /// WordPress application password for that account
    pub wp_app_password: String,
    /// Status assigned to newly created posts
    #[serde(default = "default_post_status")]
    pub wp_post_status: String,

    /// Telegram ID of the superuser (level 0). Never stored in the user file.
    pub superuser_id: Option<i64>,

    /// Soft limit for featured images, in megabytes
    #[serde(default = "default_max_img_mb")]
    pub max_img_mb: u32,
    /// Maximum number of ordinary (level 2) users
    #[serde(default = "default_max_num_users")]
    pub max_num_users: usize,

    /// Path of the persisted user list
    #[serde(default = "default_users_file")]
    pub users_file: String,
    /// Path of the persisted passcode list
    #[serde(default = "default_passcodes_file")]
    pub passcodes_file: String,
}

fn default_post_status() -> String {
    "publish".to_string()
}

const fn default_max_img_mb() -> u32 {
    2
}

const fn default_max_num_users() -> usize {
    10
}

fn default_users_file() -> String {
    "users.json".to_string()
}

fn default_passcodes_file() -> String {
    "passcodes.json".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a required value is missing or malformed.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// WordPress base URL without a trailing slash.
    #[must_use]
    pub fn wp_base_url(&self) -> &str {
        self.wp_site_url.trim_end_matches('/')
    }
}

/// WordPress category ID used when no category was selected or the list
/// could not be fetched ("Uncategorized" on a stock install).
pub const DEFAULT_CATEGORY_ID: u64 = 1;

/// Characters of post content shown in wizard previews
pub const CONTENT_PREVIEW_CHARS: usize = 200;

/// Number of posts /viewposts shows by default
pub const VIEW_POSTS_DEFAULT: usize = 5;
/// Upper bound for the /viewposts argument
pub const VIEW_POSTS_MAX: usize = 20;

/// Telegram's message limit is 4096; leave headroom for HTML tags
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

// Rate limiting (per user, per command)
/// Attempts allowed inside one window
pub const RATE_LIMIT_MAX_ATTEMPTS: u32 = 5;
/// Window length in seconds
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

// Access-denied cooldown for unknown users
/// Seconds between "access denied" replies to the same user
pub const DENIAL_COOLDOWN_SECS: u64 = 1200;
/// Maximum tracked unknown users
pub const DENIAL_CACHE_MAX_SIZE: u64 = 10_000;

/// Category cache time-to-live in seconds
pub const CATEGORY_CACHE_TTL_SECS: u64 = 600;

// Featured image recompression
/// Images wider than this are downscaled before upload
pub const MEDIA_MAX_WIDTH: u32 = 1920;
/// JPEG quality for recompressed uploads
pub const MEDIA_JPEG_QUALITY: u8 = 82;

// Telegram API retry strategy
/// Initial backoff delay in milliseconds
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling in milliseconds
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum attempts per operation
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
