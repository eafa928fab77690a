// src/config/server.rs

use super::helpers::{env_or, env_parsed_or, require_env};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("CHAT_HOST", "0.0.0.0"),
            port: env_parsed_or("CHAT_PORT", 8080u16),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: require_env("DATABASE_URL"),
            max_connections: env_parsed_or("DATABASE_MAX_CONNECTIONS", 10u32),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub amqp_url: String,
    pub bot_user_id: String,
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        Self {
            amqp_url: require_env("AMQP_URL"),
            bot_user_id: env_or("CHAT_BOT_USER_ID", "stockbot"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_seconds: i64,
    pub production: bool,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let environment = env_or("CHAT_ENV", "development");
        Self {
            cookie_name: env_or("CHAT_SESSION_COOKIE_NAME", "session_id"),
            ttl_seconds: env_parsed_or("SESSION_TTL_SECONDS", 60 * 60 * 24 * 7i64),
            production: environment == "production",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn from_env() -> Self {
        let raw = env_or("CHAT_ALLOWED_ORIGINS", "*");
        Self {
            allowed_origins: raw.split(',').map(|s| s.trim().to_string()).collect(),
        }
    }

    /// Origin-check policy for the upgrade handler: empty Origin header is
    /// allowed (non-browser clients), `*` matches everything, otherwise an
    /// exact match is required.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some("") => true,
            Some(origin) => self
                .allowed_origins
                .iter()
                .any(|allowed| allowed == "*" || allowed == origin),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: env_or("RUST_LOG", "info"),
        }
    }
}
