use axum::{
    extract::State,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::extract::AppPath;
use crate::api::state::AppState;
use crate::db::{
    MessageRepository, ReceivedMessage, SentMessage, UserProfile, UserRepository, UserSummary,
};
use crate::error::AppError;
use crate::policy::{authorize, Access, Identity};

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserProfile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageListResponse<T> {
    pub messages: Vec<T>,
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UserListResponse>, AppError> {
    authorize(&identity, Access::ListUsers)?;
    let users = UserRepository::list_all(&state.db).await?;
    Ok(Json(UserListResponse { users }))
}

/// GET /api/users/:username
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppPath(username): AppPath<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    authorize(&identity, Access::OwnAccount { username: &username })?;
    let user = UserRepository::get_profile(&state.db, &username).await?;
    Ok(Json(ProfileResponse { user }))
}

/// GET /api/users/:username/to
pub async fn messages_to(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppPath(username): AppPath<String>,
) -> Result<Json<MessageListResponse<ReceivedMessage>>, AppError> {
    authorize(&identity, Access::OwnAccount { username: &username })?;
    let messages = MessageRepository::messages_to(&state.db, &username).await?;
    Ok(Json(MessageListResponse { messages }))
}

/// GET /api/users/:username/from
pub async fn messages_from(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppPath(username): AppPath<String>,
) -> Result<Json<MessageListResponse<SentMessage>>, AppError> {
    authorize(&identity, Access::OwnAccount { username: &username })?;
    let messages = MessageRepository::messages_from(&state.db, &username).await?;
    Ok(Json(MessageListResponse { messages }))
}
