use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Public view of an account. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i64,                    // server-assigned
    pub username: String,
    pub email: String,              // unique login key
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime, // set once by storage
}

/// Account row together with its Argon2 hash. Never leaves the repository.
#[derive(Clone, FromRow)]
pub struct StoredAccount {
    #[sqlx(flatten)]
    pub account: Account,
    pub password_hash: String,
}

impl fmt::Debug for StoredAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredAccount")
            .field("account", &self.account)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Row handed to storage on insert.
#[derive(Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub image_url: Option<String>,
}

/// Mutable columns written by a single update statement. The hash column is
/// only touched when a rotation supplies a new value.
#[derive(Clone)]
pub struct AccountUpdate {
    pub username: String,
    pub email: String,
    pub image_url: Option<String>,
    pub password_hash: Option<String>,
}

/// Old/new password pair. A rotation only happens when both are present.
#[derive(Clone)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl PasswordChange {
    /// Builds a change only from a complete, non-empty pair.
    pub fn from_pair(old_password: Option<String>, new_password: Option<String>) -> Option<Self> {
        match (old_password, new_password) {
            (Some(old_password), Some(new_password))
                if !old_password.is_empty() && !new_password.is_empty() =>
            {
                Some(Self {
                    old_password,
                    new_password,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordChange(<redacted>)")
    }
}

/// Partial update. `None` means "keep the stored value".
///
/// `image_url` is tri-state: `None` keeps it, `Some(None)` clears it,
/// `Some(Some(url))` sets it. Empty strings count as absent everywhere.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<Option<String>>,
    pub password: Option<PasswordChange>,
}
