// src/broker/pool.rs
// Channel pool amortizing per-publish channel allocation. There is no
// deadpool-style pooling crate for lapin anywhere in the example pack, so
// this hand-rolls the get/put policy the spec describes directly.

use std::sync::Arc;

use lapin::{Channel, Connection};
use tokio::sync::Mutex;

pub struct ChannelPool {
    connection: Arc<Connection>,
    idle: Mutex<Vec<Channel>>,
}

impl ChannelPool {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Returns an open channel, creating a new one if none is available or
    /// the pooled one reports closed.
    pub async fn get(&self) -> Result<Channel, lapin::Error> {
        {
            let mut idle = self.idle.lock().await;
            while let Some(channel) = idle.pop() {
                if channel.status().connected() {
                    return Ok(channel);
                }
            }
        }
        self.connection.create_channel().await
    }

    /// Returns the channel to the pool only if it is still open.
    pub async fn put(&self, channel: Channel) {
        if channel.status().connected() {
            self.idle.lock().await.push(channel);
        }
    }
}
