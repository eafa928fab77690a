// src/api/http/auth.rs
// HTTP glue: POST /api/v1/auth/{register,login,logout}, GET
// /api/v1/auth/me, mapping AuthService results onto AppError responses.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::auth::{AuthResponse, LoginRequest, RegisterRequest};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::user::User;
use crate::ws::guard::extract_token;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let response = state.auth.register(req).await?;
    Ok(Json(response))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let response = state.auth.login(req).await?;
    Ok(Json(response))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<()> {
    let token = extract_token(&headers, None, &state.config.session.cookie_name)
        .ok_or(AppError::Unauthenticated)?;
    state.auth.logout(&token).await
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<User>> {
    let token = extract_token(&headers, None, &state.config.session.cookie_name)
        .ok_or(AppError::Unauthenticated)?;
    let session = state.sessions.get_by_token(&token).await?;
    let user = state.users.get_by_id(&session.user_id).await?;
    Ok(Json(user))
}
