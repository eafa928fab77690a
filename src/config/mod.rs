// src/config/mod.rs
// Central configuration for the chatroom server.

pub mod helpers;
pub mod server;

use lazy_static::lazy_static;

lazy_static! {
    pub static ref CONFIG: ChatConfig = ChatConfig::from_env();
}

/// Composes every domain config from the process environment.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub server: server::ServerConfig,
    pub database: server::DatabaseConfig,
    pub broker: server::BrokerConfig,
    pub session: server::SessionConfig,
    pub cors: server::CorsConfig,
    pub logging: server::LoggingConfig,
}

impl ChatConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server: server::ServerConfig::from_env(),
            database: server::DatabaseConfig::from_env(),
            broker: server::BrokerConfig::from_env(),
            session: server::SessionConfig::from_env(),
            cors: server::CorsConfig::from_env(),
            logging: server::LoggingConfig::from_env(),
        }
    }

    pub fn bind_address(&self) -> String {
        self.server.bind_address()
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
