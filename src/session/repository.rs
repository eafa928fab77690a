// src/session/repository.rs
// Opaque bearer-credential sessions: a random URL-safe token mapped to a
// user id and an expiry, never a self-contained signed token.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: i64,
    pub created_at: i64,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now().timestamp()
    }
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: &str, ttl_seconds: i64) -> AppResult<Session> {
        let now = Utc::now().timestamp();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token: generate_token(),
            expires_at: now + ttl_seconds,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO sessions (id, user_id, token, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    /// Missing or expired sessions are reported to the caller as
    /// unauthenticated; the connection guard treats both identically.
    pub async fn get_by_token(&self, token: &str) -> AppResult<Session> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, token, expires_at, created_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::Unauthenticated)?;

        if session.is_expired() {
            return Err(AppError::Unauthenticated);
        }

        Ok(session)
    }

    pub async fn delete_by_token(&self, token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Lazy expiry sweep; not scheduled by this crate, available for
    /// periodic maintenance callers.
    pub async fn delete_expired(&self) -> AppResult<u64> {
        let now = Utc::now().timestamp();
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
