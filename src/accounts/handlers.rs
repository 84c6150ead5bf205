use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::{
    accounts::{
        dto::{
            AccountResponse, CreateAccountRequest, LoginRequest, LoginResponse,
            UpdateAccountRequest,
        },
        errors::AccountError,
        password::MAX_PASSWORD_BYTES,
        repo_types::{Account, AccountPatch},
    },
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Account(AccountError::NotFound) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Account(AccountError::InvalidCredentials) => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::Account(AccountError::DuplicateEmail) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ApiError::Account(AccountError::HashingFailure(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to process password".to_string(),
            ),
            ApiError::Account(AccountError::PersistenceFailure(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage unavailable".to_string(),
            ),
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    Ok(email)
}

fn check_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::BadRequest("Password too short".into()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        warn!("password too long");
        return Err(ApiError::BadRequest("Password too long".into()));
    }
    Ok(())
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_accounts).post(create_account))
        .route("/users/:id", get(get_account).put(update_account))
}

pub fn login_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[instrument(skip(state))]
pub async fn list_accounts(State(state): State<AppState>) -> Result<Json<Vec<Account>>, ApiError> {
    let accounts = state.accounts.list_all().await?;
    Ok(Json(accounts))
}

#[instrument(skip(state))]
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, ApiError> {
    let account = state.accounts.get_by_id(id).await?;
    Ok(Json(account))
}

#[instrument(skip(state, payload))]
pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".into()));
    }
    let email = normalize_email(&payload.email)?;
    check_password_len(&payload.password)?;

    let account = state
        .accounts
        .create(
            username,
            &email,
            &payload.password,
            payload.image_url.as_deref(),
        )
        .await?;

    info!(account_id = account.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            message: "User created successfully",
            user: account,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = normalize_email(&payload.email)?;
    let account = state.accounts.authenticate(&email, &payload.password).await?;
    let token = state.tokens.issue(&account)?;

    info!(account_id = account.id, "user logged in");
    Ok(Json(LoginResponse {
        message: "Login successful",
        user: account,
        token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let mut patch = AccountPatch::from(payload);
    patch.username = patch
        .username
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    if let Some(raw) = patch.email.take() {
        patch.email = Some(normalize_email(&raw)?);
    }
    if let Some(change) = &patch.password {
        check_password_len(&change.new_password)?;
    }

    let account = state.accounts.update(id, patch).await?;
    Ok(Json(AccountResponse {
        message: "User updated successfully",
        user: account,
    }))
}
