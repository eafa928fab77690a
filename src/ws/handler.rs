// src/ws/handler.rs
// Connection upgrade handler: runs the guard, then upgrades and installs
// the two pump tasks.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::client::Client;
use crate::ws::guard;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub async fn ws_chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(chatroom_id): Path<String>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Response {
    let origin = headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    if !state.config.cors.is_allowed(origin) {
        return (axum::http::StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    let authorized = match guard::authenticate_and_authorize(
        &state,
        &headers,
        query.token.as_deref(),
        &chatroom_id,
    )
    .await
    {
        Ok(authorized) => authorized,
        Err(e) => return e.into_response(),
    };

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| async move {
        Client::spawn(
            socket,
            hub,
            state,
            authorized.user_id,
            authorized.display_name,
            authorized.chatroom_id,
        )
        .await;
    })
}
