// src/broker/mod.rs
// AMQP broker adapter: declares exchanges/queues, publishes commands,
// exposes a channel pool, and offers a response stream for the consumer
// fan-in task.

pub mod consumer;
pub mod models;
pub mod pool;

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use crate::error::{AppError, AppResult};

use self::models::{BotCommand, BotCommandType, StockResponse};
use self::pool::ChannelPool;

pub const COMMANDS_EXCHANGE: &str = "chat.commands";
pub const RESPONSES_EXCHANGE: &str = "chat.responses";
pub const STOCK_QUEUE: &str = "stock.commands";
pub const STOCK_ROUTING_KEY: &str = "stock.request";

pub struct BrokerAdapter {
    connection: Arc<Connection>,
    setup_channel: Channel,
    pool: ChannelPool,
}

impl BrokerAdapter {
    pub async fn connect(amqp_url: &str) -> AppResult<Self> {
        let connection = Connection::connect(amqp_url, ConnectionProperties::default())
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;
        let connection = Arc::new(connection);
        let setup_channel = connection
            .create_channel()
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;
        let pool = ChannelPool::new(connection.clone());

        let adapter = Self {
            connection,
            setup_channel,
            pool,
        };
        adapter.declare_topology().await?;
        Ok(adapter)
    }

    async fn declare_topology(&self) -> AppResult<()> {
        let durable = ExchangeDeclareOptions {
            durable: true,
            ..Default::default()
        };

        self.setup_channel
            .exchange_declare(
                COMMANDS_EXCHANGE,
                ExchangeKind::Topic,
                durable,
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        self.setup_channel
            .exchange_declare(
                RESPONSES_EXCHANGE,
                ExchangeKind::Fanout,
                durable,
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        self.setup_channel
            .queue_declare(
                STOCK_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        self.setup_channel
            .queue_bind(
                STOCK_QUEUE,
                COMMANDS_EXCHANGE,
                STOCK_ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        Ok(())
    }

    async fn publish_command(&self, command: &BotCommand) -> AppResult<()> {
        let body = serde_json::to_vec(command)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        let channel = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        let result = channel
            .basic_publish(
                COMMANDS_EXCHANGE,
                STOCK_ROUTING_KEY,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into()),
            )
            .await;

        self.pool.put(channel).await;
        result.map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;
        Ok(())
    }

    pub async fn publish_stock_command(&self, chatroom_id: &str, stock_code: &str, requested_by: &str) -> AppResult<()> {
        self.publish_command(&BotCommand {
            kind: BotCommandType::Stock,
            chatroom_id: chatroom_id.to_string(),
            stock_code: Some(stock_code.to_string()),
            requested_by: requested_by.to_string(),
            timestamp: Utc::now().timestamp(),
        })
        .await
    }

    pub async fn publish_hello_command(&self, chatroom_id: &str, requested_by: &str) -> AppResult<()> {
        self.publish_command(&BotCommand {
            kind: BotCommandType::Hello,
            chatroom_id: chatroom_id.to_string(),
            stock_code: None,
            requested_by: requested_by.to_string(),
            timestamp: Utc::now().timestamp(),
        })
        .await
    }

    /// Used by integration tests that simulate the external worker process.
    pub async fn publish_response(&self, response: &StockResponse) -> AppResult<()> {
        let body = serde_json::to_vec(response)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        let channel = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        let result = channel
            .basic_publish(
                RESPONSES_EXCHANGE,
                "",
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await;

        self.pool.put(channel).await;
        result.map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Opens an auto-delete, non-durable, non-exclusive queue bound to the
    /// responses fanout exchange and streams deliveries with auto-ack.
    pub async fn subscribe_responses(
        &self,
    ) -> AppResult<impl futures_util::Stream<Item = StockResponse> + Send> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        let queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    durable: false,
                    exclusive: false,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        channel
            .queue_bind(
                queue.name().as_str(),
                RESPONSES_EXCHANGE,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        let consumer = channel
            .basic_consume(
                queue.name().as_str(),
                "chat-response-fanin",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        Ok(consumer.filter_map(|delivery| async move {
            let delivery = delivery.ok()?;
            match serde_json::from_slice::<StockResponse>(&delivery.data) {
                Ok(response) => Some(response),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed stock response delivery, skipping");
                    None
                }
            }
        }))
    }

    pub fn is_closed(&self) -> bool {
        !self.setup_channel.status().connected()
    }
}
