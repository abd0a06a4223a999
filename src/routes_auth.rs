// --------------------------------------------------
// Login / logout endpoints.
//
// A successful login stores the identity in the session
// table and hands the token back as an HttpOnly cookie.
// --------------------------------------------------

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{self, AuthContext};
use crate::error::{ApiJson, AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

// -----------------------------
// POST /api/login
// -----------------------------
pub async fn login(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginInput>,
) -> AppResult<impl IntoResponse> {
    let db = state.store.load()?;

    let username = input.username.trim().to_string();
    let found = auth::authenticate_blocking(db.users, username, input.password)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let Some(ctx) = found else {
        warn!(username = %input.username, "login rejected");
        return Err(AppError::Unauthorized);
    };

    let token = state.sessions.create(ctx.clone());
    info!(username = %ctx.username, role = ?ctx.role, "login");

    let cookie = auth::session_cookie(&token, state.config.production, state.sessions.ttl());
    Ok(([(header::SET_COOKIE, cookie)], Json(ctx)))
}

// -----------------------------
// POST /api/logout
// Always succeeds, even without a session
// -----------------------------
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(ctx) = auth::session_token(&headers).and_then(|t| state.sessions.remove(&t)) {
        info!(username = %ctx.username, "logout");
    }
    let cookie = auth::clear_session_cookie(state.config.production);
    ([(header::SET_COOKIE, cookie)], Json(serde_json::json!({ "ok": true })))
}

// -----------------------------
// GET /api/me
// -----------------------------
pub async fn me(ctx: AuthContext) -> Json<AuthContext> {
    Json(ctx)
}
