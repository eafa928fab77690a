// src/broker/consumer.rs
// Response fan-in: consumes the broker response stream, synthesizes a bot
// ServerMessage, and hands it to the Hub for broadcast. Bot messages are
// never persisted.

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::watch;

use crate::broker::models::StockResponse;
use crate::broker::BrokerAdapter;
use crate::hub::Hub;
use crate::ws::message::{MessageId, ServerMessage};

pub async fn run(
    broker: &BrokerAdapter,
    hub: Hub,
    bot_user_id: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut stream = match broker.subscribe_responses().await {
        Ok(stream) => Box::pin(stream),
        Err(e) => {
            tracing::error!(error = %e, "failed to subscribe to stock responses, fan-in exiting");
            return;
        }
    };

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                tracing::info!("response fan-in shutting down");
                return;
            }
            delivery = stream.next() => {
                match delivery {
                    Some(response) => handle(&hub, &bot_user_id, response).await,
                    None => {
                        tracing::warn!("stock response stream ended");
                        return;
                    }
                }
            }
        }
    }
}

async fn handle(hub: &Hub, bot_user_id: &str, response: StockResponse) {
    let is_error = !response.error.is_empty();
    let content = if is_error {
        response.error.clone()
    } else {
        response.formatted_message.clone()
    };

    let message = ServerMessage::ChatMessage {
        id: MessageId::Bot(format!("bot-{}-{}", response.chatroom_id, response.symbol)),
        user_id: bot_user_id.to_string(),
        username: "StockBot".to_string(),
        content,
        is_bot: true,
        is_error: Some(is_error),
        created_at: Utc::now().timestamp(),
    };

    let Ok(payload) = message.to_json() else {
        tracing::error!("failed to marshal bot response, dropping");
        return;
    };

    if let Err(e) = hub.broadcast(response.chatroom_id, payload).await {
        tracing::debug!(error = %e, "dropping bot response broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_message_id_matches_chatroom_and_symbol() {
        let id = MessageId::Bot(format!("bot-{}-{}", "r1", "AAPL.US"));
        let MessageId::Bot(id) = id else {
            panic!("expected a Bot id");
        };
        assert_eq!(id, "bot-r1-AAPL.US");
    }
}
