// src/api/http/chatrooms.rs
// Chatroom CRUD and message history pagination, paging through the
// repositories directly.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::chatroom::Chatroom;
use crate::error::{AppError, AppResult};
use crate::message::Message;
use crate::state::AppState;
use crate::ws::guard::extract_token;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_chatrooms).post(create_chatroom))
        .route("/{id}/join", post(join_chatroom))
        .route("/{id}/messages", get(list_messages))
}

#[derive(Debug, Deserialize)]
struct CreateChatroomRequest {
    name: String,
}

async fn authenticated_user_id(state: &AppState, headers: &HeaderMap) -> AppResult<String> {
    let token = extract_token(headers, None, &state.config.session.cookie_name)
        .ok_or(AppError::Unauthenticated)?;
    let session = state.sessions.get_by_token(&token).await?;
    Ok(session.user_id)
}

#[derive(Debug, Deserialize)]
struct ListChatroomsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_chatrooms(
    State(state): State<AppState>,
    Query(query): Query<ListChatroomsQuery>,
) -> AppResult<Json<Vec<Chatroom>>> {
    let chatrooms = match (query.limit, query.offset) {
        (None, None) => state.chatrooms.list().await?,
        (limit, offset) => {
            state
                .chatrooms
                .list_paginated(limit.unwrap_or(DEFAULT_MESSAGE_LIMIT).clamp(1, MAX_MESSAGE_LIMIT), offset.unwrap_or(0).max(0))
                .await?
        }
    };
    Ok(Json(chatrooms))
}

async fn create_chatroom(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateChatroomRequest>,
) -> AppResult<Json<Chatroom>> {
    let user_id = authenticated_user_id(&state, &headers).await?;
    if req.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name must not be empty".to_string()));
    }
    let chatroom = state.chatrooms.create_with_member(req.name.trim(), &user_id).await?;
    Ok(Json(chatroom))
}

async fn join_chatroom(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chatroom_id): Path<String>,
) -> AppResult<()> {
    let user_id = authenticated_user_id(&state, &headers).await?;
    state.chatrooms.get_by_id(&chatroom_id).await?;
    state.chatrooms.add_member(&chatroom_id, &user_id).await
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    limit: Option<i64>,
    before: Option<i64>,
}

#[derive(Debug, Serialize)]
struct MessagesResponse {
    messages: Vec<Message>,
}

const DEFAULT_MESSAGE_LIMIT: i64 = 50;
const MAX_MESSAGE_LIMIT: i64 = 200;

/// GET /api/v1/chatrooms/{id}/messages?limit&before&cursor
async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chatroom_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> AppResult<Json<MessagesResponse>> {
    let user_id = authenticated_user_id(&state, &headers).await?;
    let is_member = state.chatrooms.is_member(&chatroom_id, &user_id).await?;
    if !is_member {
        return Err(AppError::Forbidden);
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_MESSAGE_LIMIT)
        .clamp(1, MAX_MESSAGE_LIMIT);

    let messages = match query.before {
        Some(before_id) => state.messages.get_by_chatroom_before(&chatroom_id, before_id, limit).await?,
        None => state.messages.get_by_chatroom(&chatroom_id, limit).await?,
    };

    Ok(Json(MessagesResponse { messages }))
}
