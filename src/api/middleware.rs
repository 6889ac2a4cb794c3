use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::state::AppState;
use crate::error::AppError;
use crate::policy::Identity;

/// Authentication middleware - verifies the bearer token and attaches the
/// caller's [`Identity`] to the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::InvalidToken("Missing Authorization header".to_string()))?;

    // Extract token from "Bearer <token>"
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::InvalidToken("Invalid Authorization format".to_string()))?;

    let username = state.sessions.verify(token)?;

    request.extensions_mut().insert(Identity::new(username));

    Ok(next.run(request).await)
}
