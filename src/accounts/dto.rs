use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::accounts::repo_types::{Account, AccountPatch, PasswordChange};

/// Request body for account creation.
#[derive(Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl fmt::Debug for CreateAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateAccountRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("image_url", &self.image_url)
            .finish_non_exhaustive()
    }
}

/// Request body for login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Request body for a partial update. Empty strings mean "not supplied".
/// `image_url`: absent keeps the stored value, `null` clears it.
#[derive(Deserialize)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub old_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
}

impl fmt::Debug for UpdateAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateAccountRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("image_url", &self.image_url)
            .finish_non_exhaustive()
    }
}

// Only called when the field is present, so `null` becomes `Some(None)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl From<UpdateAccountRequest> for AccountPatch {
    fn from(req: UpdateAccountRequest) -> Self {
        let image_url = match req.image_url {
            Some(Some(url)) if url.is_empty() => None,
            other => other,
        };
        Self {
            username: req.username.filter(|v| !v.is_empty()),
            email: req.email.filter(|v| !v.is_empty()),
            image_url,
            password: PasswordChange::from_pair(req.old_password, req.new_password),
        }
    }
}

/// Response for create and update.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub message: &'static str,
    pub user: Account,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: Account,
    pub token: String,
}
