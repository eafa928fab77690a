// src/message/repository.rs
// Persisted Message repository. Raw sqlx queries; unlike the other
// repositories, the message id is an autoincrement primary key assigned
// on insert rather than a Uuid generated up front.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::AppResult;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub chatroom_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub is_bot: bool,
    pub created_at: i64,
}

pub struct NewMessage {
    pub chatroom_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
}

#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a durably stored human message. `is_bot` is always false for
    /// messages written through this path; bot messages are never
    /// persisted (see broker::consumer).
    pub async fn create(&self, message: NewMessage) -> AppResult<Message> {
        let created_at = Utc::now().timestamp();
        let id = sqlx::query(
            "INSERT INTO messages (chatroom_id, user_id, username, content, is_bot, created_at) \
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(&message.chatroom_id)
        .bind(&message.user_id)
        .bind(&message.username)
        .bind(&message.content)
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Message {
            id,
            chatroom_id: message.chatroom_id,
            user_id: message.user_id,
            username: message.username,
            content: message.content,
            is_bot: false,
            created_at,
        })
    }

    pub async fn get_by_chatroom(&self, chatroom_id: &str, limit: i64) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, chatroom_id, user_id, username, content, is_bot, created_at \
             FROM messages WHERE chatroom_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(chatroom_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    pub async fn get_by_chatroom_before(
        &self,
        chatroom_id: &str,
        before_id: i64,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, chatroom_id, user_id, username, content, is_bot, created_at \
             FROM messages WHERE chatroom_id = ? AND id < ? ORDER BY id DESC LIMIT ?",
        )
        .bind(chatroom_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }
}
