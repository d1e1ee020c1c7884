//! Bearer-token middleware for the admin surface.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

use super::session::SessionStage;

/// Authenticated identity injected into request extensions. The `username`
/// becomes the `actor` recorded on ledger rows.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub token: String,
    pub username: String,
}

/// Middleware that resolves the bearer token against the session store.
/// Temp sessions from the middle of the 2FA flow are rejected.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let session = state
        .sessions
        .get(&token)
        .await
        .ok_or(ApiError::Unauthorized)?;

    if session.is_expired() {
        state.sessions.remove(&token).await;
        return Err(ApiError::Unauthorized);
    }

    if session.stage != SessionStage::Authenticated {
        return Err(ApiError::Unauthorized);
    }

    request.extensions_mut().insert(AuthContext {
        token,
        username: session.username,
    });

    Ok(next.run(request).await)
}
