//! Chat data models
//!
//! Defines structures for conversations and messages.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user
    User,
    /// Message from the assistant/AI
    Assistant,
}

impl MessageRole {
    /// Convert the role to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}

/// Conversation mode, selecting the upstream model and system prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationMode {
    /// General-purpose model, no private-context framing
    Public,
    /// Higher-capability model with private-knowledge framing
    Private,
}

impl ConversationMode {
    /// Convert the mode to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationMode::Public => "public",
            ConversationMode::Private => "private",
        }
    }
}

impl From<&str> for ConversationMode {
    fn from(s: &str) -> Self {
        match s {
            "private" => ConversationMode::Private,
            _ => ConversationMode::Public,
        }
    }
}

/// A conversation thread owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    /// Unique identifier for the conversation
    pub id: String,
    /// Identity of the user who owns the conversation
    pub user_id: String,
    /// Title of the conversation
    pub title: String,
    /// Conversation mode ("public" or "private")
    pub mode: String,
    /// When the conversation was created (Unix timestamp)
    pub created_at: i64,
    /// When the conversation was last updated (Unix timestamp)
    pub updated_at: i64,
}

impl Conversation {
    /// Create a new conversation
    pub fn new(id: String, user_id: String, title: String, mode: ConversationMode) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id,
            user_id,
            title,
            mode: mode.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Get the conversation mode as enum
    pub fn mode_enum(&self) -> ConversationMode {
        ConversationMode::from(self.mode.as_str())
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    /// Unique identifier for the message
    pub id: String,
    /// ID of the conversation this message belongs to
    pub conversation_id: String,
    /// Role of the message sender
    pub role: String, // Stored as "user" or "assistant" in DB
    /// Content of the message
    pub content: String,
    /// Completion model that produced the message (assistant messages only)
    pub model: Option<String>,
    /// When the message was created (Unix timestamp)
    pub created_at: i64,
}

impl Message {
    /// Create a new user message
    pub fn user(id: String, conversation_id: String, content: String) -> Self {
        Self {
            id,
            conversation_id,
            role: MessageRole::User.as_str().to_string(),
            content,
            model: None,
            created_at: Utc::now().timestamp(),
        }
    }

    /// Create a new assistant message, recording the model that produced it
    pub fn assistant(id: String, conversation_id: String, content: String, model: String) -> Self {
        Self {
            id,
            conversation_id,
            role: MessageRole::Assistant.as_str().to_string(),
            content,
            model: Some(model),
            created_at: Utc::now().timestamp(),
        }
    }

    /// Get the message role as enum
    pub fn role_enum(&self) -> MessageRole {
        MessageRole::from(self.role.as_str())
    }
}
