//! API module
//!
//! Contains HTTP request handlers for the chat relay and conversation
//! management endpoints.

pub mod chat;
pub mod conversations;

use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::chat::ChatDb;
use crate::relay::RelayService;

/// Shared state passed to all route handlers
pub type RouterState = (Arc<dyn IdentityProvider>, Arc<ChatDb>, Arc<RelayService>);
