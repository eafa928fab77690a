// tests/common/mod.rs
// Shared test utilities: config/state builders and socket-frame helpers
// used by the end-to-end test files.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use chatroom_server::config::server::{
    BrokerConfig, CorsConfig, DatabaseConfig, LoggingConfig, ServerConfig, SessionConfig,
};
use chatroom_server::config::ChatConfig;
use chatroom_server::hub::Hub;
use chatroom_server::state::AppState;

/// Builds an isolated config pointing at a fresh temp-file SQLite database
/// and the AMQP broker from `AMQP_URL` (defaulting to the standard local
/// RabbitMQ address).
pub fn test_config(db_path: &std::path::Path) -> ChatConfig {
    let amqp_url = std::env::var("AMQP_URL").unwrap_or_else(|_| "amqp://127.0.0.1:5672/%2f".to_string());

    ChatConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", db_path.display()),
            max_connections: 5,
        },
        broker: BrokerConfig {
            amqp_url,
            bot_user_id: "stockbot".to_string(),
        },
        session: SessionConfig {
            cookie_name: "session_id".to_string(),
            ttl_seconds: 3600,
            production: false,
        },
        cors: CorsConfig {
            allowed_origins: vec!["*".to_string()],
        },
        logging: LoggingConfig {
            level: "info".to_string(),
        },
    }
}

/// Attempts to build a full `AppState` against a real AMQP broker. Returns
/// `None` (and logs why) when no broker is reachable, so these tests skip
/// cleanly in a dev sandbox with no broker running.
pub async fn try_build_state(temp_dir: &tempfile::TempDir) -> Option<AppState> {
    let db_path = temp_dir.path().join("test.db");
    let config = Arc::new(test_config(&db_path));
    let (hub, _shutdown_tx) = Hub::spawn();

    match AppState::new(config, hub).await {
        Ok(state) => Some(state),
        Err(e) => {
            eprintln!("skipping: no broker reachable for integration test ({e})");
            None
        }
    }
}

/// Seeds a user, session, and chatroom membership directly against the
/// repositories, returning (session_token, user_id, chatroom_id).
pub async fn seed_member(state: &AppState, username: &str, chatroom_name: &str) -> (String, String, String) {
    let user = state
        .users
        .create(username, None, "test-hash", username)
        .await
        .expect("create user");
    let chatroom = state
        .chatrooms
        .create_with_member(chatroom_name, &user.id)
        .await
        .expect("create chatroom");
    let session = state
        .sessions
        .create(&user.id, 3600)
        .await
        .expect("create session");
    (session.token, user.id, chatroom.id)
}

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Reads the next text frame as JSON. `user_count_update` broadcasts are
/// periodic and best-effort, and may interleave with `user_joined`/
/// `chat_message` frames in either order; callers that care about a
/// specific frame type should use [`next_typed_json`] instead.
pub async fn next_json(stream: &mut WsStream) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("read error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("valid json frame");
        }
    }
}

/// Reads frames until one with `type == expected_type` arrives, skipping
/// any interleaved `user_count_update` frames along the way. Panics if a
/// frame of a different, unexpected type shows up first.
pub async fn next_typed_json(stream: &mut WsStream, expected_type: &str) -> Value {
    loop {
        let frame = next_json(stream).await;
        let kind = frame["type"].as_str().unwrap_or_default();
        if kind == expected_type {
            return frame;
        }
        assert_eq!(
            kind, "user_count_update",
            "expected a {expected_type} frame (or an interleaved user_count_update), got {frame}"
        );
    }
}
