// tests/ws_chat_test.rs
// End-to-end socket scenarios: solo echo, broadcast fan-out, chatroom
// isolation, and the non-member upgrade rejection, driving a real bound
// axum server with tokio-tungstenite as the client.

mod common;

use std::time::Duration;

use chatroom_server::api::create_router;
use common::next_typed_json;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

async fn spawn_server(state: chatroom_server::AppState) -> (String, tokio::task::JoinHandle<()>) {
    let router = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("ws://{addr}"), handle)
}

#[tokio::test]
async fn solo_echo_acks_and_broadcasts() {
    let temp_dir = tempfile::tempdir().unwrap();
    let Some(state) = common::try_build_state(&temp_dir).await else {
        return;
    };
    let (token, _user_id, chatroom_id) = common::seed_member(&state, "alice", "room-s1").await;
    let (base_url, _server) = spawn_server(state).await;

    let url = format!("{base_url}/ws/chat/{chatroom_id}?token={token}");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");

    // consume the user_joined presence frame (a user_count_update may
    // interleave; next_typed_json tolerates that)
    let _joined = next_typed_json(&mut ws, "user_joined").await;

    ws.send(Message::Text(json!({"type": "chat", "content": "hi"}).to_string().into()))
        .await
        .unwrap();

    let ack = next_typed_json(&mut ws, "message_ack").await;
    let msg_id = ack["id"].clone();

    let chat = next_typed_json(&mut ws, "chat_message").await;
    assert_eq!(chat["id"], msg_id);
    assert_eq!(chat["content"], "hi");
    assert_eq!(chat["is_bot"], false);
}

#[tokio::test]
async fn broadcast_reaches_other_member() {
    let temp_dir = tempfile::tempdir().unwrap();
    let Some(state) = common::try_build_state(&temp_dir).await else {
        return;
    };
    let (token_a, user_a, chatroom_id) = common::seed_member(&state, "a-user", "room-s2").await;
    state.chatrooms.add_member(&chatroom_id, &user_a).await.unwrap();
    let user_b = state.users.create("b-user", None, "hash", "b-user").await.unwrap();
    state.chatrooms.add_member(&chatroom_id, &user_b.id).await.unwrap();
    let session_b = state.sessions.create(&user_b.id, 3600).await.unwrap();

    let (base_url, _server) = spawn_server(state).await;

    let url_a = format!("{base_url}/ws/chat/{chatroom_id}?token={token_a}");
    let (mut ws_a, _) = tokio_tungstenite::connect_async(&url_a).await.expect("connect a");
    let _ = next_typed_json(&mut ws_a, "user_joined").await; // a's own user_joined

    let url_b = format!("{base_url}/ws/chat/{chatroom_id}?token={}", session_b.token);
    let (mut ws_b, _) = tokio_tungstenite::connect_async(&url_b).await.expect("connect b");
    let _ = next_typed_json(&mut ws_b, "user_joined").await; // b's own user_joined
    let _ = next_typed_json(&mut ws_a, "user_joined").await; // a observes b's user_joined

    ws_a.send(Message::Text(json!({"type": "chat", "content": "hello"}).to_string().into()))
        .await
        .unwrap();

    let _ack = next_typed_json(&mut ws_a, "message_ack").await;

    let chat_on_a = next_typed_json(&mut ws_a, "chat_message").await;
    assert_eq!(chat_on_a["content"], "hello");

    let chat_on_b = next_typed_json(&mut ws_b, "chat_message").await;
    assert_eq!(chat_on_b["content"], "hello");
    assert_eq!(chat_on_b["user_id"], user_a);
}

#[tokio::test]
async fn isolation_across_chatrooms() {
    let temp_dir = tempfile::tempdir().unwrap();
    let Some(state) = common::try_build_state(&temp_dir).await else {
        return;
    };
    let (token_a, _user_a, room1) = common::seed_member(&state, "r1-user", "room1").await;
    let (token_b, _user_b, room2) = common::seed_member(&state, "r2-user", "room2").await;

    let (base_url, _server) = spawn_server(state).await;

    let url_a = format!("{base_url}/ws/chat/{room1}?token={token_a}");
    let (mut ws_a, _) = tokio_tungstenite::connect_async(&url_a).await.expect("connect a");
    let _ = next_typed_json(&mut ws_a, "user_joined").await;

    let url_b = format!("{base_url}/ws/chat/{room2}?token={token_b}");
    let (mut ws_b, _) = tokio_tungstenite::connect_async(&url_b).await.expect("connect b");
    let _ = next_typed_json(&mut ws_b, "user_joined").await;

    ws_a.send(Message::Text(json!({"type": "chat", "content": "room1-only"}).to_string().into()))
        .await
        .unwrap();

    // drain a's own ack + broadcast
    let _ = next_typed_json(&mut ws_a, "message_ack").await;
    let _ = next_typed_json(&mut ws_a, "chat_message").await;

    // b may still see its own periodic user_count_update frames, but never
    // a's chat content: chatrooms stay isolated from each other.
    loop {
        let result = timeout(Duration::from_millis(500), ws_b.next()).await;
        match result {
            Ok(Some(Ok(Message::Text(text)))) => {
                let value: Value = serde_json::from_str(&text).unwrap();
                assert_ne!(value["content"], "room1-only");
                if value["type"] != "user_count_update" {
                    break;
                }
            }
            _ => break, // plain timeout (no frame at all) is also a pass
        }
    }
}

#[tokio::test]
async fn non_member_upgrade_is_forbidden() {
    let temp_dir = tempfile::tempdir().unwrap();
    let Some(state) = common::try_build_state(&temp_dir).await else {
        return;
    };

    let user = state.users.create("outsider", None, "hash", "outsider").await.unwrap();
    let session = state.sessions.create(&user.id, 3600).await.unwrap();
    let chatroom = state.chatrooms.create_with_member("members-only", "someone-else").await.unwrap();

    let (base_url, _server) = spawn_server(state).await;
    let url = format!("{base_url}/ws/chat/{}?token={}", chatroom.id, session.token);

    let err = tokio_tungstenite::connect_async(&url).await.unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status().as_u16(), 403);
        }
        other => panic!("expected HTTP 403 upgrade rejection, got {other:?}"),
    }
}

