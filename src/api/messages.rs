use axum::{
    extract::State,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::extract::{AppJson, AppPath};
use crate::api::state::AppState;
use crate::db::{MessageDetail, MessageRepository, NewMessage, ReadReceipt};
use crate::error::AppError;
use crate::policy::{authorize, Access, Identity};

const MAX_BODY_CHARS: usize = 4096;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub to_username: String,
    #[serde(default)]
    pub body: String,
    /// Optional; must match the caller when present.
    pub from_username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse<T> {
    pub message: T,
}

/// GET /api/messages/:id
pub async fn get_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<MessageResponse<MessageDetail>>, AppError> {
    let message = MessageRepository::get(&state.db, id).await?;
    authorize(
        &identity,
        Access::ViewMessage {
            from: &message.from_user.username,
            to: &message.to_user.username,
        },
    )?;

    Ok(Json(MessageResponse { message }))
}

/// POST /api/messages
pub async fn send_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppJson(req): AppJson<SendMessageRequest>,
) -> Result<Json<MessageResponse<NewMessage>>, AppError> {
    authorize(
        &identity,
        Access::SendMessage {
            claimed_sender: req.from_username.as_deref(),
        },
    )?;

    if req.to_username.is_empty() {
        return Err(AppError::InvalidInput("to_username is required".to_string()));
    }
    let chars = req.body.chars().count();
    if chars == 0 || chars > MAX_BODY_CHARS {
        return Err(AppError::InvalidInput(format!(
            "Message must be 1-{} characters",
            MAX_BODY_CHARS
        )));
    }

    let message = MessageRepository::create(
        &state.db,
        identity.username(),
        &req.to_username,
        &req.body,
    )
    .await?;

    tracing::debug!("✉️ {} -> {} (#{})", message.from_username, message.to_username, message.id);
    Ok(Json(MessageResponse { message }))
}

/// POST /api/messages/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<MessageResponse<ReadReceipt>>, AppError> {
    let message = MessageRepository::get(&state.db, id).await?;
    authorize(&identity, Access::MarkRead { to: &message.to_user.username })?;

    let receipt = MessageRepository::mark_read(&state.db, id).await?;

    tracing::debug!("📬 Message #{} read by {}", id, identity.username());
    Ok(Json(MessageResponse { message: receipt }))
}
