//! Admin login REST API.
//!
//! Two-step login: password first, then a TOTP code. A fresh account gets a
//! provisioning payload (secret + otpauth URL) and must verify one code before
//! the secret is persisted. Temp tokens from the middle of the flow never pass
//! the auth middleware.

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::auth::{
    AuthContext, Session, SessionStage, build_totp, generate_token, generate_totp_secret,
    verify_totp_code,
};
use crate::db::admin;
use crate::error::{ApiError, ApiResult as DomainResult};
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub requires_2fa: bool,
    pub requires_2fa_setup: bool,
    pub temp_token: String,
    /// Only present during first-time enrolment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otpauth_url: Option<String>,
}

/// POST /admin/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let account = require_account(&state, &req.username).await?;

    if !admin::verify_password(&req.password, &account.password_hash)? {
        return Err(ApiError::Unauthorized);
    }

    let temp_token = generate_token();

    if account.totp_enabled {
        state
            .sessions
            .insert(temp_token.clone(), Session::pending_verify(&account.username))
            .await;

        return Ok(Json(LoginResponse {
            success: true,
            requires_2fa: true,
            requires_2fa_setup: false,
            temp_token,
            totp_secret: None,
            otpauth_url: None,
        }));
    }

    // First login: hand out a provisional secret. It only becomes the
    // account's secret once a code verifies against it.
    let secret = generate_totp_secret();
    let otpauth_url = build_totp(&secret, &account.username)?.get_url();

    state
        .sessions
        .insert(
            temp_token.clone(),
            Session::pending_setup(&account.username, secret.clone()),
        )
        .await;

    Ok(Json(LoginResponse {
        success: true,
        requires_2fa: false,
        requires_2fa_setup: true,
        temp_token,
        totp_secret: Some(secret),
        otpauth_url: Some(otpauth_url),
    }))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub temp_token: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
    pub username: String,
}

/// POST /admin/verify-2fa-setup
pub async fn verify_2fa_setup(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<TokenResponse> {
    let session = require_live_session(&state, &req.temp_token).await?;

    let SessionStage::PendingSetup { temp_secret } = session.stage else {
        return Err(ApiError::Unauthorized);
    };

    if !verify_totp_code(&temp_secret, &session.username, &req.code)? {
        return Err(ApiError::Unauthorized);
    }

    admin::enable_totp(&state.pool, &session.username, &temp_secret).await?;

    Ok(Json(issue_token(&state, &req.temp_token, session.username).await))
}

/// POST /admin/verify-2fa
pub async fn verify_2fa(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<TokenResponse> {
    let session = require_live_session(&state, &req.temp_token).await?;

    if session.stage != SessionStage::PendingVerify {
        return Err(ApiError::Unauthorized);
    }

    let account = require_account(&state, &session.username).await?;
    let Some(secret) = account.totp_secret else {
        return Err(ApiError::Unauthorized);
    };

    if !verify_totp_code(&secret, &session.username, &req.code)? {
        return Err(ApiError::Unauthorized);
    }

    Ok(Json(issue_token(&state, &req.temp_token, session.username).await))
}

/// POST /admin/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<serde_json::Value> {
    state.sessions.remove(&auth.token).await;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /admin/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<serde_json::Value> {
    if req.new_password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "new password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let account = require_account(&state, &auth.username).await?;
    if !admin::verify_password(&req.current_password, &account.password_hash)? {
        return Err(ApiError::Unauthorized);
    }

    admin::update_password(&state.pool, &auth.username, &req.new_password).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn require_account(state: &AppState, username: &str) -> DomainResult<admin::AdminAccount> {
    admin::get_account(&state.pool, username)
        .await?
        .ok_or(ApiError::Unauthorized)
}

/// Resolve a temp token, dropping it if expired.
async fn require_live_session(state: &AppState, token: &str) -> DomainResult<Session> {
    let session = state
        .sessions
        .get(token)
        .await
        .ok_or(ApiError::Unauthorized)?;

    if session.is_expired() {
        state.sessions.remove(token).await;
        return Err(ApiError::Unauthorized);
    }

    Ok(session)
}

/// Swap the temp token for a full session token.
async fn issue_token(state: &AppState, temp_token: &str, username: String) -> TokenResponse {
    state.sessions.remove(temp_token).await;

    let token = generate_token();
    state
        .sessions
        .insert(token.clone(), Session::authenticated(&username))
        .await;

    TokenResponse {
        success: true,
        token,
        username,
    }
}
