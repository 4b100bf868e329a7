//! Users and invite passcodes, persisted as two JSON files.
//!
//! The files are read once at startup and rewritten in full on every
//! mutation. The superuser is configured out of band and never appears in
//! the user file.

use crate::utils::display_name;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Target user is not in the store
    #[error("user not found")]
    UserNotFound,
    /// The superuser cannot be changed or removed
    #[error("the superuser cannot be modified")]
    SuperuserImmutable,
}

/// Authorization level of a known user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Level 0, configured out of band
    Superuser,
    /// Level 1, can generate invite codes
    Admin,
    /// Level 2, can author posts
    Ordinary,
}

impl Role {
    /// Numeric level as persisted in the user file
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Superuser => 0,
            Self::Admin => 1,
            Self::Ordinary => 2,
        }
    }

    #[must_use]
    pub const fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::Superuser),
            1 => Some(Self::Admin),
            2 => Some(Self::Ordinary),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Superuser => "Superuser",
            Self::Admin => "Admin",
            Self::Ordinary => "Ordinary",
        }
    }

    /// Admins and the superuser hold the privileged commands
    #[must_use]
    pub const fn is_admin_or_super(self) -> bool {
        matches!(self, Self::Superuser | Self::Admin)
    }
}

/// One authorized user as persisted on disk
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserRecord {
    /// Telegram user ID
    pub id: i64,
    /// Display name captured at onboarding
    pub name: String,
    /// Telegram username, when the account has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Numeric level (1 = admin, 2 = ordinary)
    pub level: u8,
}

impl UserRecord {
    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        Role::from_level(self.level)
    }
}

/// A single-use invite code
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Passcode {
    /// The code itself, uppercase
    pub code: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Outcome of a passcode redemption attempt
#[derive(Debug, PartialEq, Eq)]
pub enum OnboardResult {
    /// User was added as an ordinary user
    Added {
        /// Display name stored for the new user
        name: String,
    },
    /// Redemption refused with a user-facing reason
    Rejected {
        /// Why the redemption failed
        reason: String,
    },
}

const PASSCODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const PASSCODE_LEN: usize = 8;

fn generate_passcode() -> String {
    let mut rng = rand::thread_rng();
    (0..PASSCODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..PASSCODE_ALPHABET.len());
            PASSCODE_ALPHABET[idx] as char
        })
        .collect()
}

struct Inner {
    users: Vec<UserRecord>,
    passcodes: Vec<Passcode>,
}

/// Keyed store for authorized users and outstanding invite codes
pub struct UserStore {
    superuser_id: Option<i64>,
    max_ordinary: usize,
    users_path: PathBuf,
    passcodes_path: PathBuf,
    inner: Mutex<Inner>,
}

async fn read_or_init<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => Ok(serde_json::from_str(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::write(path, "[]").await?;
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

impl UserStore {
    /// Load both files, creating empty ones when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be read or parsed.
    pub async fn load(
        superuser_id: Option<i64>,
        max_ordinary: usize,
        users_path: impl Into<PathBuf>,
        passcodes_path: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let users_path = users_path.into();
        let passcodes_path = passcodes_path.into();

        let users: Vec<UserRecord> = read_or_init(&users_path).await?;
        let passcodes: Vec<Passcode> = read_or_init(&passcodes_path).await?;

        info!(
            "User store loaded: {} users, {} outstanding passcodes",
            users.len(),
            passcodes.len()
        );

        Ok(Self {
            superuser_id,
            max_ordinary,
            users_path,
            passcodes_path,
            inner: Mutex::new(Inner { users, passcodes }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-mutation; propagating the inner
        // state is still the best option for a read-mostly store.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn persist_users(&self) -> Result<(), StoreError> {
        let json = {
            let inner = self.lock();
            serde_json::to_string_pretty(&inner.users)?
        };
        tokio::fs::write(&self.users_path, json).await?;
        Ok(())
    }

    async fn persist_passcodes(&self) -> Result<(), StoreError> {
        let json = {
            let inner = self.lock();
            serde_json::to_string_pretty(&inner.passcodes)?
        };
        tokio::fs::write(&self.passcodes_path, json).await?;
        Ok(())
    }

    /// Role of the given Telegram ID, `None` when unauthorized.
    #[must_use]
    pub fn level_of(&self, user_id: i64) -> Option<Role> {
        if self.superuser_id == Some(user_id) {
            return Some(Role::Superuser);
        }
        self.lock()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .and_then(UserRecord::role)
    }

    /// Snapshot of all persisted users.
    #[must_use]
    pub fn all_users(&self) -> Vec<UserRecord> {
        self.lock().users.clone()
    }

    /// Look up one persisted user.
    #[must_use]
    pub fn find_user(&self, user_id: i64) -> Option<UserRecord> {
        self.lock().users.iter().find(|u| u.id == user_id).cloned()
    }

    /// Change a user's level. The superuser record does not exist and the
    /// configured superuser ID is rejected outright.
    ///
    /// # Errors
    ///
    /// [`StoreError::UserNotFound`] for unknown IDs,
    /// [`StoreError::SuperuserImmutable`] for the superuser.
    pub async fn set_level(&self, user_id: i64, role: Role) -> Result<(), StoreError> {
        if self.superuser_id == Some(user_id) {
            return Err(StoreError::SuperuserImmutable);
        }
        {
            let mut inner = self.lock();
            let user = inner
                .users
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or(StoreError::UserNotFound)?;
            if user.level == Role::Superuser.level() {
                return Err(StoreError::SuperuserImmutable);
            }
            let old = user.level;
            user.level = role.level();
            info!("User {user_id} level changed from {old} to {}", role.level());
        }
        self.persist_users().await
    }

    /// Remove a user entirely.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::set_level`].
    pub async fn remove(&self, user_id: i64) -> Result<UserRecord, StoreError> {
        if self.superuser_id == Some(user_id) {
            return Err(StoreError::SuperuserImmutable);
        }
        let removed = {
            let mut inner = self.lock();
            let idx = inner
                .users
                .iter()
                .position(|u| u.id == user_id)
                .ok_or(StoreError::UserNotFound)?;
            if inner.users[idx].level == Role::Superuser.level() {
                return Err(StoreError::SuperuserImmutable);
            }
            inner.users.remove(idx)
        };
        self.persist_users().await?;
        info!("Removed user {user_id} ({})", removed.name);
        Ok(removed)
    }

    /// Generate, persist and return a fresh single-use invite code.
    ///
    /// # Errors
    ///
    /// Returns an error if the passcode file cannot be written.
    pub async fn new_passcode(&self) -> Result<String, StoreError> {
        let code = generate_passcode();
        {
            let mut inner = self.lock();
            inner.passcodes.push(Passcode {
                code: code.clone(),
                created_at: Utc::now(),
            });
        }
        self.persist_passcodes().await?;
        Ok(code)
    }

    /// Redeem a passcode and add the caller as an ordinary user.
    ///
    /// The passcode is consumed before the user cap is checked, matching
    /// the persisted-store contract: a burned code stays burned.
    ///
    /// # Errors
    ///
    /// Returns an error only for persistence failures; business rejections
    /// come back as [`OnboardResult::Rejected`].
    pub async fn try_add_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: &str,
        last_name: Option<&str>,
        passcode: &str,
    ) -> Result<OnboardResult, StoreError> {
        if self.level_of(user_id).is_some() {
            return Ok(OnboardResult::Rejected {
                reason: "You are already authorized.".to_string(),
            });
        }

        let code = passcode.trim().to_ascii_uppercase();
        {
            let mut inner = self.lock();
            let Some(idx) = inner.passcodes.iter().position(|p| p.code == code) else {
                return Ok(OnboardResult::Rejected {
                    reason: "Invalid or expired passcode.".to_string(),
                });
            };
            inner.passcodes.remove(idx);
        }
        self.persist_passcodes().await?;

        let ordinary_count = {
            let inner = self.lock();
            inner
                .users
                .iter()
                .filter(|u| u.level == Role::Ordinary.level())
                .count()
        };
        if ordinary_count >= self.max_ordinary {
            return Ok(OnboardResult::Rejected {
                reason: format!("Maximum ordinary users reached ({}).", self.max_ordinary),
            });
        }

        let name = display_name(first_name, last_name, username);
        {
            let mut inner = self.lock();
            inner.users.push(UserRecord {
                id: user_id,
                name: name.clone(),
                username: username.map(ToString::to_string),
                level: Role::Ordinary.level(),
            });
        }
        self.persist_users().await?;

        info!("User {user_id} ({name}) onboarded via passcode");
        Ok(OnboardResult::Added { name })
    }
}
