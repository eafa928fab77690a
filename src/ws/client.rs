// src/ws/client.rs
// Per-connection state: one read pump, one write pump per socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex, Notify};
use uuid::Uuid;

use crate::commands::{self, Command};
use crate::hub::Hub;
use crate::message::repository::NewMessage;
use crate::state::AppState;
use crate::ws::message::{ClientMessage, MessageId, ServerMessage};

const MAX_FRAME_BYTES: usize = 1024;
const SEND_BUFFER: usize = 256;
const PONG_WAIT: Duration = Duration::from_secs(60);
const PING_PERIOD: Duration = Duration::from_secs(54);
const WRITE_WAIT: Duration = Duration::from_secs(10);
const REPOSITORY_TIMEOUT: Duration = Duration::from_secs(5);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// What the Hub holds per connected client: enough to enqueue bytes and to
/// close the send side exactly once. The Hub never writes to a socket
/// directly, only enqueues on `send`.
///
/// `send_closed`/`close_notify` are shared with the `Client`'s write pump
/// rather than relied on through `Sender` refcounting: the read pump and
/// the write pump both hold their own clone of the `mpsc::Sender` for the
/// lifetime of the connection, so dropping the Hub's clone alone never
/// closes the channel. `close_send_once` flips the flag and wakes the
/// write pump directly instead.
#[derive(Clone)]
pub struct ClientHandle {
    pub id: Uuid,
    pub chatroom_id: String,
    pub username: String,
    send: mpsc::Sender<String>,
    send_closed: Arc<AtomicBool>,
    close_notify: Arc<Notify>,
}

impl ClientHandle {
    pub fn new(
        chatroom_id: String,
        username: String,
        send: mpsc::Sender<String>,
        send_closed: Arc<AtomicBool>,
        close_notify: Arc<Notify>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            chatroom_id,
            username,
            send,
            send_closed,
            close_notify,
        }
    }

    /// Non-blocking enqueue used by the Hub's broadcast fan-out. A full
    /// buffer identifies a slow consumer to the caller.
    pub fn try_send(&self, payload: String) -> Result<(), ()> {
        if self.send_closed.load(Ordering::SeqCst) {
            return Err(());
        }
        self.send.try_send(payload).map_err(|_| ())
    }

    /// Idempotent: only the Hub calls this, on unregister or eviction.
    pub fn close_send_once(&self) {
        if self
            .send_closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // Wakes the write pump even if it's blocked in recv()/select on
            // a channel that still has other live Sender clones.
            self.close_notify.notify_one();
        }
    }
}

/// The connected client's full in-process state: owns the socket split
/// halves and runs the two pump tasks. Constructed with a hub/process
/// scoped lifetime, never the per-request context of the upgrade call.
pub struct Client {
    pub id: Uuid,
    pub user_id: String,
    pub username: String,
    pub chatroom_id: String,
    hub: Hub,
    state: AppState,
    send: mpsc::Sender<String>,
    send_closed: Arc<AtomicBool>,
    close_notify: Arc<Notify>,
    write_half: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    closed: Arc<AtomicBool>,
}

impl Client {
    /// Splits the socket and spawns the read pump and write pump as
    /// independent concurrent tasks. Returns immediately; the connection's
    /// lifetime ends when both pumps have exited.
    pub async fn spawn(
        socket: WebSocket,
        hub: Hub,
        state: AppState,
        user_id: String,
        username: String,
        chatroom_id: String,
    ) {
        let (sink, stream) = futures_util::StreamExt::split(socket);
        let (send_tx, send_rx) = mpsc::channel::<String>(SEND_BUFFER);
        let send_closed = Arc::new(AtomicBool::new(false));
        let close_notify = Arc::new(Notify::new());

        let handle = ClientHandle::new(
            chatroom_id.clone(),
            username.clone(),
            send_tx.clone(),
            send_closed.clone(),
            close_notify.clone(),
        );
        let client_id = handle.id;

        let client = Client {
            id: client_id,
            user_id,
            username,
            chatroom_id: chatroom_id.clone(),
            hub: hub.clone(),
            state,
            send: send_tx,
            send_closed,
            close_notify,
            write_half: Arc::new(Mutex::new(sink)),
            closed: Arc::new(AtomicBool::new(false)),
        };

        if hub.register(handle).await.is_err() {
            tracing::warn!("hub rejected registration, not starting pumps");
            return;
        }

        let write_client = client.clone_for_write_pump();
        tokio::spawn(async move {
            write_client.run_write_pump(send_rx).await;
        });

        tokio::spawn(async move {
            client.run_read_pump(stream).await;
        });
    }

    fn clone_for_write_pump(&self) -> Client {
        Client {
            id: self.id,
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            chatroom_id: self.chatroom_id.clone(),
            hub: self.hub.clone(),
            state: self.state.clone(),
            send: self.send.clone(),
            send_closed: self.send_closed.clone(),
            close_notify: self.close_notify.clone(),
            write_half: self.write_half.clone(),
            closed: self.closed.clone(),
        }
    }

    async fn run_read_pump(
        self,
        mut stream: futures_util::stream::SplitStream<WebSocket>,
    ) {
        self.broadcast_presence(true).await;

        loop {
            let next = tokio::time::timeout(PONG_WAIT, stream.next()).await;
            let frame = match next {
                Ok(Some(Ok(frame))) => frame,
                Ok(Some(Err(e))) => {
                    tracing::debug!(error = %e, "read error, closing");
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::debug!("pong wait elapsed, closing stale connection");
                    break;
                }
            };

            match frame {
                Message::Text(text) => {
                    if text.len() > MAX_FRAME_BYTES {
                        tracing::debug!("frame exceeds max size, skipping");
                        continue;
                    }
                    self.handle_text(text.to_string()).await;
                }
                Message::Pong(_) => {
                    // read deadline is re-armed by the next loop iteration
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        self.hub.unregister(self.chatroom_id.clone(), self.id).await;
        self.close_connection().await;
        self.broadcast_presence(false).await;
    }

    async fn handle_text(&self, text: String) {
        let parsed: ClientMessage = match serde_json::from_str(&text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "malformed client frame, skipping");
                return;
            }
        };

        match commands::parse(&parsed.content) {
            Some(Command::Stock { code }) => {
                self.dispatch_stock_command(code).await;
            }
            Some(Command::Hello) => {
                self.dispatch_hello_command().await;
            }
            None => {
                self.handle_chat_message(parsed.content).await;
            }
        }
    }

    async fn dispatch_stock_command(&self, code: String) {
        let result = tokio::time::timeout(
            COMMAND_TIMEOUT,
            self.state.broker.publish_stock_command(&self.chatroom_id, &code, &self.username),
        )
        .await;

        if !matches!(result, Ok(Ok(()))) {
            self.send_error("Failed to process command").await;
        }
    }

    async fn dispatch_hello_command(&self) {
        let result = tokio::time::timeout(
            COMMAND_TIMEOUT,
            self.state.broker.publish_hello_command(&self.chatroom_id, &self.username),
        )
        .await;

        if !matches!(result, Ok(Ok(()))) {
            self.send_error("Failed to process command").await;
        }
    }

    async fn handle_chat_message(&self, content: String) {
        if content.is_empty() || content.chars().count() > 1000 {
            tracing::debug!(
                client_id = %self.id,
                len = content.chars().count(),
                "message content out of bounds, dropping"
            );
            return;
        }

        let new_message = NewMessage {
            chatroom_id: self.chatroom_id.clone(),
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            content,
        };

        let result = tokio::time::timeout(
            REPOSITORY_TIMEOUT,
            self.state.messages.create(new_message),
        )
        .await;

        let message = match result {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, user_id = %self.user_id, chatroom_id = %self.chatroom_id, "failed to persist message, dropping");
                return;
            }
            Err(_) => {
                tracing::warn!(user_id = %self.user_id, chatroom_id = %self.chatroom_id, "persistence timed out, dropping message");
                return;
            }
        };

        crate::metrics::record_message_sent();

        // Optimistic ack before broadcast completes, so the sender's UI is
        // never blocked on fan-out.
        self.enqueue_send(ServerMessage::MessageAck { id: message.id }).await;

        let chat_payload = ServerMessage::ChatMessage {
            id: MessageId::Persisted(message.id),
            user_id: message.user_id.clone(),
            username: message.username.clone(),
            content: message.content.clone(),
            is_bot: false,
            is_error: None,
            created_at: message.created_at,
        };

        if let Ok(payload) = chat_payload.to_json() {
            self.hub.spawn_broadcast(self.chatroom_id.clone(), payload);
        }
    }

    async fn broadcast_presence(&self, joined: bool) {
        let message = if joined {
            ServerMessage::UserJoined {
                username: self.username.clone(),
            }
        } else {
            ServerMessage::UserLeft {
                username: self.username.clone(),
            }
        };

        if let Ok(payload) = message.to_json() {
            // Non-critical: failures are logged by spawn_broadcast, never
            // surfaced.
            self.hub.spawn_broadcast(self.chatroom_id.clone(), payload);
        }
    }

    async fn send_error(&self, message: &str) {
        self.enqueue_send(ServerMessage::Error {
            message: message.to_string(),
        })
        .await;
    }

    async fn enqueue_send(&self, message: ServerMessage) {
        if self.send_closed.load(Ordering::SeqCst) {
            return;
        }
        let Ok(payload) = message.to_json() else {
            return;
        };
        // Blocking enqueue is acceptable here: only the client's own read
        // pump enqueues message_ack/error frames, and the buffer is 256.
        if self.send.send(payload).await.is_err() {
            tracing::debug!(client_id = %self.id, "send channel closed, dropping ack/error frame");
        }
    }

    async fn close_connection(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let mut sink = self.write_half.lock().await;
            let _ = sink.close().await;
        }
    }

    async fn run_write_pump(self, mut send_rx: mpsc::Receiver<String>) {
        let mut ticker = tokio::time::interval(PING_PERIOD);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately; consume it

        loop {
            if self.send_closed.load(Ordering::SeqCst) {
                let _ = self.write_message(Message::Close(None)).await;
                break;
            }

            tokio::select! {
                _ = self.close_notify.notified() => {
                    let _ = self.write_message(Message::Close(None)).await;
                    break;
                }
                maybe_payload = send_rx.recv() => {
                    match maybe_payload {
                        Some(payload) => {
                            if self.write_message(Message::Text(Utf8Bytes::from(payload))).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            // Every Sender clone dropped without going
                            // through close_send_once (shouldn't happen in
                            // practice, but don't hang on it).
                            let _ = self.write_message(Message::Close(None)).await;
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if self.write_message(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }

        self.close_connection().await;
    }

    async fn write_message(&self, message: Message) -> Result<(), ()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(());
        }
        let mut sink = self.write_half.lock().await;
        tokio::time::timeout(WRITE_WAIT, sink.send(message))
            .await
            .map_err(|_| ())?
            .map_err(|_| ())
    }
}
