use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::auth::password;
use crate::auth::token::TokenService;
use crate::db::models::{UserRecord, UserResponse};
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// PBKDF2 is deliberately slow, so hashing runs on the blocking pool.
pub async fn hash_blocking(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {e}")))?
}

pub async fn verify_blocking(stored: String, candidate: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || password::verify_password(&stored, &candidate))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {e}")))
}

pub async fn register(
    users: &dyn UserRepository,
    tokens: &TokenService,
    request: RegisterRequest,
) -> Result<AuthResponse, AppError> {
    let full_name = request.full_name.trim().to_string();
    let email = normalize_email(&request.email);
    if full_name.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(AppError::BadRequest(
            "Full name, email and password are required".into(),
        ));
    }

    if users.find_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest("User already exists".into()));
    }

    let hash = hash_blocking(request.password).await?;
    let mut user = UserRecord::new(full_name, email, hash);
    let id = users.insert(&user).await?;
    user.id = Some(id);

    let token = tokens.issue(&id, user.role)?;
    tracing::info!("Registered user {id}");

    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

pub async fn login(
    users: &dyn UserRepository,
    tokens: &TokenService,
    request: LoginRequest,
) -> Result<AuthResponse, AppError> {
    let invalid = || AppError::Auth("Invalid credentials".into());

    let user = users
        .find_by_email(&normalize_email(&request.email))
        .await?
        .ok_or_else(invalid)?;

    if !verify_blocking(user.password_hash.clone(), request.password).await? {
        return Err(invalid());
    }

    let id = user
        .id
        .ok_or_else(|| AppError::Internal("Stored user has no identifier".into()))?;
    let token = tokens.issue(&id, user.role)?;

    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

/// Axum handler for `POST /api/auth/register`.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = register(state.user_repo.as_ref(), &state.tokens, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Axum handler for `POST /api/auth/login`.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = login(state.user_repo.as_ref(), &state.tokens, request).await?;
    Ok(Json(response))
}

/// Axum handler for `GET /api/auth/me`.
pub async fn me_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, AppError> {
    let record = state
        .user_repo
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(record.into()))
}
