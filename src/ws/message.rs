// src/ws/message.rs
// Wire types for the socket protocol, serialized as a tagged enum keyed on
// `type`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Inbound frame. `type` is currently informational; only `content` is
/// inspected by the core.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub content: String,
}

/// A `chat_message`'s id is a plain integer for persisted messages and a
/// synthetic string (`bot-<chatroom>-<symbol>`) for bot replies, which are
/// never persisted. `MessageAck::id` is always a persisted row id, so it
/// stays a plain `i64`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageId {
    Persisted(i64),
    Bot(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ChatMessage {
        id: MessageId,
        user_id: String,
        username: String,
        content: String,
        is_bot: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
        created_at: i64,
    },
    UserJoined {
        username: String,
    },
    UserLeft {
        username: String,
    },
    UserCountUpdate {
        user_counts: HashMap<String, usize>,
    },
    MessageAck {
        id: i64,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_serializes_with_tagged_type() {
        let msg = ServerMessage::ChatMessage {
            id: MessageId::Persisted(1),
            user_id: "u1".into(),
            username: "alice".into(),
            content: "hi".into(),
            is_bot: false,
            is_error: None,
            created_at: 1000,
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"chat_message\""));
        assert!(!json.contains("is_error"));
    }

    #[test]
    fn bot_message_id_serializes_as_string() {
        let msg = ServerMessage::ChatMessage {
            id: MessageId::Bot("bot-room1-AAPL.US".into()),
            user_id: "stockbot".into(),
            username: "StockBot".into(),
            content: "AAPL.US quote is $1.00".into(),
            is_bot: true,
            is_error: Some(false),
            created_at: 1000,
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""id":"bot-room1-AAPL.US""#));
    }

    #[test]
    fn client_message_defaults_kind_when_absent() {
        let msg: ClientMessage = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.kind, "");
    }
}
