//! Conversation store seam
//!
//! The relay service talks to persistence through this trait so tests can
//! substitute an in-memory double for the SQLite-backed [`ChatDb`].

use async_trait::async_trait;

use crate::chat::db::ChatDb;
use crate::chat::models::{Conversation, Message};
use crate::error::AppError;

/// Durable ordered record of messages per conversation
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch a conversation by id, only if owned by `user_id`
    async fn conversation_for_user(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Conversation>, AppError>;

    /// Append a message to its conversation
    async fn add_message(&self, message: &Message) -> Result<(), AppError>;

    /// All messages of a conversation, oldest first
    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, AppError>;

    /// Bump the conversation's updated_at timestamp
    async fn touch_conversation(&self, id: &str) -> Result<(), AppError>;
}

#[async_trait]
impl ConversationStore for ChatDb {
    async fn conversation_for_user(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Conversation>, AppError> {
        self.get_conversation(id, user_id).await
    }

    async fn add_message(&self, message: &Message) -> Result<(), AppError> {
        ChatDb::add_message(self, message).await
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, AppError> {
        self.get_messages(conversation_id).await
    }

    async fn touch_conversation(&self, id: &str) -> Result<(), AppError> {
        ChatDb::touch_conversation(self, id).await
    }
}
