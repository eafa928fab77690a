// src/ws/guard.rs
// Session/membership guard: the only point on the connection path that
// touches the durable session and membership stores.

use axum::http::HeaderMap;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub struct Authorized {
    pub user_id: String,
    pub display_name: String,
    pub chatroom_id: String,
}

/// Extracts the bearer token in priority order: `session_id` cookie, then
/// `token` query parameter, then `Authorization: Bearer ...` header.
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>, cookie_name: &str) -> Option<String> {
    if let Some(cookie_header) = headers.get(axum::http::header::COOKIE).and_then(|v| v.to_str().ok()) {
        for pair in cookie_header.split(';') {
            let pair = pair.trim();
            if let Some((name, value)) = pair.split_once('=') {
                if name == cookie_name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    if let Some(token) = query_token {
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    if let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    None
}

pub async fn authenticate_and_authorize(
    state: &AppState,
    headers: &HeaderMap,
    query_token: Option<&str>,
    chatroom_id: &str,
) -> AppResult<Authorized> {
    let token = extract_token(headers, query_token, &state.config.session.cookie_name)
        .ok_or(AppError::Unauthenticated)?;

    let session = state.sessions.get_by_token(&token).await?;

    if chatroom_id.is_empty() {
        return Err(AppError::InvalidInput("missing chatroom id".to_string()));
    }

    let is_member = state
        .chatrooms
        .is_member(chatroom_id, &session.user_id)
        .await
        .map_err(|_| AppError::Forbidden)?;
    if !is_member {
        return Err(AppError::Forbidden);
    }

    let user = state
        .users
        .get_by_id(&session.user_id)
        .await
        .map_err(|_| AppError::Unauthenticated)?;

    Ok(Authorized {
        user_id: user.id,
        display_name: user.display_name,
        chatroom_id: chatroom_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_cookie_over_query_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, "session_id=from-cookie".parse().unwrap());
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer from-header".parse().unwrap());

        assert_eq!(
            extract_token(&headers, Some("from-query"), "session_id"),
            Some("from-cookie".to_string())
        );
    }

    #[test]
    fn falls_back_to_query_then_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, Some("from-query"), "session_id"), Some("from-query".to_string()));

        headers.insert(axum::http::header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(extract_token(&headers, None, "session_id"), Some("from-header".to_string()));
    }

    #[test]
    fn empty_token_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, None, "session_id"), None);
        assert_eq!(extract_token(&headers, Some(""), "session_id"), None);
    }
}
