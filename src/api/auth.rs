use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::extract::AppJson;
use crate::api::state::AppState;
use crate::db::{NewUser, UserRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub last_login_at: DateTime<Utc>,
}

/// Validate username shape
fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() || username.len() > 32 {
        return Err(AppError::InvalidInput("Username must be 1-32 characters".to_string()));
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::InvalidInput(
            "Username must be alphanumeric, underscore, or hyphen".to_string(),
        ));
    }

    Ok(())
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    validate_username(&req.username)?;
    require("password", &req.password)?;
    require("first_name", &req.first_name)?;
    require("last_name", &req.last_name)?;
    require("phone", &req.phone)?;

    // Sign before writing anything
    let token = state.sessions.issue(&req.username)?;

    let user = UserRepository::register_and_login(
        &state.db,
        NewUser {
            username: req.username,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
        },
        &state.config.hash_params,
    )
    .await?;

    tracing::info!("👤 Registered {}", user.username);
    Ok(Json(RegisterResponse { token }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput("Username and password required".to_string()));
    }

    if !UserRepository::authenticate(&state.db, &req.username, &req.password).await? {
        tracing::debug!("🔒 Failed login for {}", req.username);
        return Err(AppError::InvalidCredentials);
    }

    let last_login_at = UserRepository::touch_login(&state.db, &req.username).await?;
    let token = state.sessions.issue(&req.username)?;

    tracing::debug!("🔓 {} logged in", req.username);
    Ok(Json(LoginResponse { token, last_login_at }))
}
