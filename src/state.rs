// src/state.rs
// Shared application state injected into every axum handler: the database
// pool, repositories, hub, and broker adapter, built once at startup.

use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::auth::AuthService;
use crate::broker::BrokerAdapter;
use crate::chatroom::ChatroomRepository;
use crate::config::ChatConfig;
use crate::error::AppResult;
use crate::hub::Hub;
use crate::message::MessageRepository;
use crate::session::SessionRepository;
use crate::user::UserRepository;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ChatConfig>,
    pub hub: Hub,
    pub broker: Arc<BrokerAdapter>,
    pub db: SqlitePool,
    pub users: UserRepository,
    pub sessions: SessionRepository,
    pub chatrooms: ChatroomRepository,
    pub messages: MessageRepository,
    pub auth: AuthService,
}

impl AppState {
    pub async fn new(config: Arc<ChatConfig>, hub: Hub) -> AppResult<Self> {
        tracing::info!("connecting to database at {}", config.database.url);
        let connect_options: SqliteConnectOptions = config
            .database
            .url
            .parse::<SqliteConnectOptions>()
            .map_err(|e| crate::error::AppError::Internal(anyhow::anyhow!(e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect_with(connect_options)
            .await?;

        create_schema(&pool).await?;

        tracing::info!("connecting to broker at {}", config.broker.amqp_url);
        let broker = Arc::new(BrokerAdapter::connect(&config.broker.amqp_url).await?);

        let users = UserRepository::new(pool.clone());
        let sessions = SessionRepository::new(pool.clone());
        let chatrooms = ChatroomRepository::new(pool.clone());
        let messages = MessageRepository::new(pool.clone());
        let auth = AuthService::new(users.clone(), sessions.clone(), config.session.ttl_seconds);

        tracing::info!("application state initialized");

        Ok(Self {
            config,
            hub,
            broker,
            db: pool,
            users,
            sessions,
            chatrooms,
            messages,
            auth,
        })
    }

    pub async fn db_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.db).await.is_ok()
    }
}

async fn create_schema(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT UNIQUE,
            password_hash TEXT NOT NULL,
            display_name TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            token TEXT NOT NULL UNIQUE,
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS chatrooms (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            creator_id TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS chatroom_members (
            chatroom_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            joined_at INTEGER NOT NULL,
            PRIMARY KEY (chatroom_id, user_id)
        );
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chatroom_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            username TEXT NOT NULL,
            content TEXT NOT NULL,
            is_bot BOOLEAN NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
