//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Persistence configuration
    pub persistence: PersistenceConfig,
    /// Identity provider configuration
    pub auth: AuthConfig,
    /// Completion provider configuration
    pub upstream: UpstreamConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Path to the SQLite database file
    pub db_path: String,
}

/// Identity provider configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the identity service used to resolve bearer tokens
    pub base_url: String,
}

/// Completion provider configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the completion API
    pub base_url: String,
    /// API key sent as a bearer credential to the completion API
    pub api_key: String,
    /// Model id used for public-mode conversations
    pub public_model: String,
    /// Model id used for private-mode conversations
    pub private_model: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            persistence: PersistenceConfig {
                db_path: env::var("CHAT_DB_PATH").unwrap_or_else(|_| {
                    // Default to ~/.chatbot-backend or current directory
                    if let Some(home) = env::var_os("HOME") {
                        format!("{}/.chatbot-backend/chats.db", home.to_string_lossy())
                    } else {
                        ".chatbot-backend/chats.db".to_string()
                    }
                }),
            },
            auth: AuthConfig {
                base_url: env::var("AUTH_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:9999/auth/v1".to_string()),
            },
            upstream: UpstreamConfig {
                base_url: env::var("OPENROUTER_BASE_URL")
                    .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
                api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                public_model: env::var("PUBLIC_MODEL")
                    .unwrap_or_else(|_| "openai/gpt-3.5-turbo".to_string()),
                private_model: env::var("PRIVATE_MODEL")
                    .unwrap_or_else(|_| "anthropic/claude-3-sonnet".to_string()),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
