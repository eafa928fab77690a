// src/hub/mod.rs
// The single-writer actor holding the chatroom -> connections index. State
// transitions occur only inside the event loop spawned by Hub::spawn;
// external entry points are thin adapters over channels and a read lock
// for cheap count queries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Notify, RwLock};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ws::client::ClientHandle;
use crate::ws::message::ServerMessage;

const REGISTER_BUFFER: usize = 1024;
const UNREGISTER_BUFFER: usize = 1024;
const BROADCAST_BUFFER: usize = 256;
const USER_COUNT_BUFFER: usize = 10;
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

type ChatroomMap = HashMap<String, HashMap<Uuid, ClientHandle>>;

struct BroadcastEnvelope {
    chatroom_id: String,
    payload: String,
}

struct HubInner {
    state: RwLock<ChatroomMap>,
    register_tx: mpsc::Sender<ClientHandle>,
    unregister_tx: mpsc::Sender<(String, Uuid)>,
    broadcast_tx: mpsc::Sender<BroadcastEnvelope>,
    user_count_tx: mpsc::Sender<()>,
    shutting_down: AtomicBool,
    pending_broadcasts: Arc<PendingGroup>,
}

#[derive(Default)]
struct PendingGroup {
    count: AtomicUsize,
    notify: Notify,
}

impl PendingGroup {
    fn enter(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn exit(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    async fn wait_drained(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.count.load(Ordering::SeqCst) > 0 {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                tracing::warn!("pending broadcast drain timed out at shutdown");
                return;
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }
}

/// Cheap, cloneable handle to the Hub actor.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Spawns the event-loop task and returns a handle plus a shutdown
    /// watch sender the caller retains for the shutdown ritual.
    pub fn spawn() -> (Self, watch::Sender<bool>) {
        let (register_tx, register_rx) = mpsc::channel(REGISTER_BUFFER);
        let (unregister_tx, unregister_rx) = mpsc::channel(UNREGISTER_BUFFER);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_BUFFER);
        let (user_count_tx, user_count_rx) = mpsc::channel(USER_COUNT_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let inner = Arc::new(HubInner {
            state: RwLock::new(HashMap::new()),
            register_tx,
            unregister_tx,
            broadcast_tx,
            user_count_tx,
            shutting_down: AtomicBool::new(false),
            pending_broadcasts: Arc::new(PendingGroup::default()),
        });

        let hub = Hub { inner };
        let loop_hub = hub.clone();
        tokio::spawn(async move {
            loop_hub
                .run(register_rx, unregister_rx, broadcast_rx, user_count_rx, shutdown_rx)
                .await;
        });

        (hub, shutdown_tx)
    }

    async fn run(
        &self,
        mut register_rx: mpsc::Receiver<ClientHandle>,
        mut unregister_rx: mpsc::Receiver<(String, Uuid)>,
        mut broadcast_rx: mpsc::Receiver<BroadcastEnvelope>,
        mut user_count_rx: mpsc::Receiver<()>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        self.shutdown_ritual().await;
                        return;
                    }
                }

                Some(client) = register_rx.recv() => {
                    self.handle_register(client).await;
                }

                Some((chatroom_id, client_id)) = unregister_rx.recv() => {
                    self.handle_unregister(&chatroom_id, client_id).await;
                }

                Some(()) = user_count_rx.recv() => {
                    self.handle_user_count_update().await;
                }

                Some(envelope) = broadcast_rx.recv() => {
                    self.handle_broadcast(envelope).await;
                }
            }
        }
    }

    async fn handle_register(&self, client: ClientHandle) {
        let mut state = self.inner.state.write().await;
        state
            .entry(client.chatroom_id.clone())
            .or_default()
            .insert(client.id, client);
        drop(state);

        metrics::gauge!("chat_active_connections").increment(1.0);
        let _ = self.inner.user_count_tx.try_send(());
    }

    async fn handle_unregister(&self, chatroom_id: &str, client_id: Uuid) {
        let mut state = self.inner.state.write().await;
        let Some(room) = state.get_mut(chatroom_id) else {
            return; // double-unregister is a no-op
        };
        let Some(client) = room.remove(&client_id) else {
            return;
        };
        if room.is_empty() {
            state.remove(chatroom_id);
        }
        drop(state);

        client.close_send_once();
        metrics::gauge!("chat_active_connections").decrement(1.0);
        let _ = self.inner.user_count_tx.try_send(());
    }

    async fn handle_user_count_update(&self) {
        let counts: HashMap<String, usize> = {
            let state = self.inner.state.read().await;
            state
                .iter()
                .filter(|(_, clients)| !clients.is_empty())
                .map(|(room, clients)| (room.clone(), clients.len()))
                .collect()
        };

        let message = ServerMessage::UserCountUpdate {
            user_counts: counts,
        };
        let Ok(payload) = message.to_json() else {
            return;
        };

        let chatrooms: Vec<String> = {
            let state = self.inner.state.read().await;
            state
                .iter()
                .filter(|(_, clients)| !clients.is_empty())
                .map(|(room, _)| room.clone())
                .collect()
        };

        for chatroom_id in chatrooms {
            // Best-effort: periodic updates are lossy if the broadcast
            // channel is full.
            if self
                .inner
                .broadcast_tx
                .try_send(BroadcastEnvelope {
                    chatroom_id,
                    payload: payload.clone(),
                })
                .is_err()
            {
                crate::metrics::record_broadcast_dropped();
            }
        }
    }

    async fn handle_broadcast(&self, envelope: BroadcastEnvelope) {
        let snapshot: Vec<ClientHandle> = {
            let state = self.inner.state.read().await;
            state
                .get(&envelope.chatroom_id)
                .map(|clients| clients.values().cloned().collect())
                .unwrap_or_default()
        };

        let mut slow: Vec<Uuid> = Vec::new();
        for client in &snapshot {
            if client.try_send(envelope.payload.clone()).is_err() {
                slow.push(client.id);
            }
        }

        if slow.is_empty() {
            return;
        }

        let mut state = self.inner.state.write().await;
        if let Some(room) = state.get_mut(&envelope.chatroom_id) {
            for client_id in slow {
                if let Some(client) = room.remove(&client_id) {
                    client.close_send_once();
                    metrics::counter!("chat_slow_consumer_evictions").increment(1);
                }
            }
            if room.is_empty() {
                state.remove(&envelope.chatroom_id);
            }
        }
    }

    async fn shutdown_ritual(&self) {
        tracing::info!("hub shutting down, draining pending broadcasts");
        self.inner.pending_broadcasts.wait_drained(SHUTDOWN_DRAIN_TIMEOUT).await;

        let mut state = self.inner.state.write().await;
        for (chatroom_id, clients) in state.drain() {
            for (_, client) in clients {
                client.close_send_once();
                tracing::debug!(chatroom_id = %chatroom_id, client_id = %client.id, "closed on shutdown");
            }
        }
    }

    /// Registers a newly upgraded client. Takes exclusive ownership from the
    /// connection-upgrade handler; from this point the Hub owns the
    /// client's presence and the lifecycle of its send channel.
    pub async fn register(&self, client: ClientHandle) -> AppResult<()> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(AppError::ShuttingDown);
        }
        self.inner
            .register_tx
            .send(client)
            .await
            .map_err(|_| AppError::ShuttingDown)
    }

    pub async fn unregister(&self, chatroom_id: String, client_id: Uuid) {
        let _ = self.inner.unregister_tx.send((chatroom_id, client_id)).await;
    }

    /// Broadcasts are rejected synchronously once the hub has begun
    /// shutting down.
    pub async fn broadcast(&self, chatroom_id: String, payload: String) -> AppResult<()> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(AppError::ShuttingDown);
        }
        self.inner
            .broadcast_tx
            .send(BroadcastEnvelope {
                chatroom_id,
                payload,
            })
            .await
            .map_err(|_| AppError::ShuttingDown)
    }

    /// Spawns a broadcast on a background task, tracked in a pending-count
    /// wait group that shutdown drains before closing client sockets. Used
    /// by the read pump so the sender's own frame isn't blocked on fan-out
    /// completion.
    pub fn spawn_broadcast(&self, chatroom_id: String, payload: String) {
        let pending = self.inner.pending_broadcasts.clone();
        let hub = self.clone();
        pending.enter();
        tokio::spawn(async move {
            if let Err(e) = hub.broadcast(chatroom_id.clone(), payload).await {
                tracing::debug!(chatroom_id = %chatroom_id, error = %e, "background broadcast failed");
            }
            pending.exit();
        });
    }

    pub fn begin_shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
    }

    pub async fn connected_user_count(&self, chatroom_id: &str) -> usize {
        self.inner
            .state
            .read()
            .await
            .get(chatroom_id)
            .map(|clients| clients.len())
            .unwrap_or(0)
    }

    pub async fn all_connected_counts(&self) -> HashMap<String, usize> {
        self.inner
            .state
            .read()
            .await
            .iter()
            .map(|(room, clients)| (room.clone(), clients.len()))
            .collect()
    }
}

/// Drives the hub's shutdown ritual: flips the rejecting flag, then signals
/// the event loop to drain and close every client.
pub async fn shutdown(hub: &Hub, shutdown_tx: &watch::Sender<bool>) {
    hub.begin_shutdown();
    let _ = shutdown_tx.send(true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::client::ClientHandle;
    use tokio::sync::mpsc as tmpsc;

    fn make_client(chatroom_id: &str, buffer: usize) -> (ClientHandle, tmpsc::Receiver<String>) {
        let (tx, rx) = tmpsc::channel(buffer);
        (
            ClientHandle::new(
                chatroom_id.to_string(),
                "tester".to_string(),
                tx,
                Arc::new(AtomicBool::new(false)),
                Arc::new(tokio::sync::Notify::new()),
            ),
            rx,
        )
    }

    #[tokio::test]
    async fn register_then_broadcast_delivers_to_member() {
        let (hub, _shutdown_tx) = Hub::spawn();
        let (client, mut rx) = make_client("r1", 4);
        hub.register(client).await.unwrap();
        // allow the event loop to process the register message
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        hub.broadcast("r1".to_string(), "hello".to_string()).await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("broadcast should arrive")
            .expect("channel open");
        assert_eq!(received, "hello");
    }

    #[tokio::test]
    async fn isolation_across_chatrooms() {
        let (hub, _shutdown_tx) = Hub::spawn();
        let (client_a, _rx_a) = make_client("r1", 4);
        let (client_b, mut rx_b) = make_client("r2", 4);
        hub.register(client_a).await.unwrap();
        hub.register(client_b).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        hub.broadcast("r1".to_string(), "room1-only".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_consumer_is_evicted_others_still_receive() {
        let (hub, _shutdown_tx) = Hub::spawn();
        let (slow_client, slow_rx) = make_client("r1", 1);
        let (fine_client, mut fine_rx) = make_client("r1", 4);
        hub.register(slow_client).await.unwrap();
        hub.register(fine_client).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // fill the slow client's buffer without draining it
        hub.broadcast("r1".to_string(), "1".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        hub.broadcast("r1".to_string(), "2".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(hub.connected_user_count("r1").await, 1);
        assert!(fine_rx.try_recv().is_ok());
        drop(slow_rx);
    }

    #[tokio::test]
    async fn broadcast_rejected_after_shutdown() {
        let (hub, shutdown_tx) = Hub::spawn();
        shutdown(&hub, &shutdown_tx).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = hub.broadcast("r1".to_string(), "x".to_string()).await;
        assert!(matches!(result, Err(AppError::ShuttingDown)));
    }
}
