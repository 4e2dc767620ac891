//! Chat module
//!
//! Handles chat conversations and messages storage using SQLite database.

pub mod db;
pub mod models;
pub mod store;

pub use db::ChatDb;
pub use models::{Conversation, ConversationMode, Message, MessageRole};
pub use store::ConversationStore;
