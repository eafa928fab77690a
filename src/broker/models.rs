// src/broker/models.rs
// Broker payload shapes, fixed by the spec's wire contract with the
// external stock-quote worker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotCommandType {
    Stock,
    Hello,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotCommand {
    #[serde(rename = "type")]
    pub kind: BotCommandType,
    pub chatroom_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_code: Option<String>,
    pub requested_by: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockResponse {
    pub chatroom_id: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub formatted_message: String,
    #[serde(default)]
    pub error: String,
    pub timestamp: i64,
}
