// src/chatroom/repository.rs
// Chatroom rows and membership, backed directly by raw sqlx queries.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Chatroom {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct ChatroomRepository {
    pool: SqlitePool,
}

impl ChatroomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_with_member(&self, name: &str, creator_id: &str) -> AppResult<Chatroom> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO chatrooms (id, name, creator_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(creator_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO chatroom_members (chatroom_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(&id)
        .bind(creator_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Chatroom {
            id,
            name: name.to_string(),
            creator_id: creator_id.to_string(),
            created_at: now,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> AppResult<Chatroom> {
        let chatroom = sqlx::query_as::<_, Chatroom>(
            "SELECT id, name, creator_id, created_at FROM chatrooms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(chatroom)
    }

    pub async fn list(&self) -> AppResult<Vec<Chatroom>> {
        let chatrooms = sqlx::query_as::<_, Chatroom>(
            "SELECT id, name, creator_id, created_at FROM chatrooms ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(chatrooms)
    }

    pub async fn list_paginated(&self, limit: i64, offset: i64) -> AppResult<Vec<Chatroom>> {
        let chatrooms = sqlx::query_as::<_, Chatroom>(
            "SELECT id, name, creator_id, created_at FROM chatrooms \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(chatrooms)
    }

    pub async fn add_member(&self, chatroom_id: &str, user_id: &str) -> AppResult<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT OR IGNORE INTO chatroom_members (chatroom_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(chatroom_id)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Membership check used on the socket upgrade path.
    pub async fn is_member(&self, chatroom_id: &str, user_id: &str) -> AppResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM chatroom_members WHERE chatroom_id = ? AND user_id = ?",
        )
        .bind(chatroom_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }
}
