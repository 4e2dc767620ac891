//! Conversation API endpoints
//!
//! Handles HTTP requests for conversations and their messages. Every
//! operation resolves the caller's identity first and only exposes
//! conversations that identity owns.

use crate::api::RouterState;
use crate::auth;
use crate::chat::{Conversation, ConversationMode};
use crate::error::AppError;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a new conversation
#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    /// Optional title (defaults to "New Conversation")
    pub title: Option<String>,
    /// Optional mode ("public" or "private", defaults to public)
    pub mode: Option<ConversationMode>,
}

/// Request to update conversation title
#[derive(Debug, Deserialize)]
pub struct UpdateTitleRequest {
    /// New title
    pub title: String,
}

/// Conversation response
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    /// Conversation unique identifier
    pub id: String,
    /// Conversation title
    pub title: String,
    /// Conversation mode ("public" or "private")
    pub mode: String,
    /// Unix timestamp when conversation was created
    pub created_at: i64,
    /// Unix timestamp when conversation was last updated
    pub updated_at: i64,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            title: c.title,
            mode: c.mode,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Message unique identifier
    pub id: String,
    /// ID of the conversation this message belongs to
    pub conversation_id: String,
    /// Message role ("user" or "assistant")
    pub role: String,
    /// Message content
    pub content: String,
    /// Completion model that produced the message (assistant messages only)
    pub model: Option<String>,
    /// Unix timestamp when message was created
    pub created_at: i64,
}

/// Conversation with messages response
#[derive(Debug, Serialize)]
pub struct ConversationWithMessagesResponse {
    /// The conversation
    pub conversation: ConversationResponse,
    /// List of messages in the conversation, oldest first
    pub messages: Vec<MessageResponse>,
}

/// GET /api/conversations - List the caller's conversations
pub async fn list_conversations(
    State((identity, chat_db, _)): State<RouterState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationResponse>>, AppError> {
    let user = identity.resolve(auth::bearer_token(&headers)?).await?;
    let conversations = chat_db.get_conversations(&user.id).await?;

    let responses: Vec<ConversationResponse> = conversations
        .into_iter()
        .map(ConversationResponse::from)
        .collect();

    Ok(Json(responses))
}

/// POST /api/conversations - Create a new conversation for the caller
pub async fn create_conversation(
    State((identity, chat_db, _)): State<RouterState>,
    headers: HeaderMap,
    Json(request): Json<CreateConversationRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let user = identity.resolve(auth::bearer_token(&headers)?).await?;

    let id = Uuid::new_v4().to_string();
    let title = request
        .title
        .unwrap_or_else(|| "New Conversation".to_string());
    let mode = request.mode.unwrap_or(ConversationMode::Public);

    let conversation = Conversation::new(id, user.id, title, mode);
    chat_db.create_conversation(&conversation).await?;

    Ok(Json(ConversationResponse::from(conversation)))
}

/// GET /api/conversations/:id - Get a conversation with its messages
pub async fn get_conversation(
    State((identity, chat_db, _)): State<RouterState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ConversationWithMessagesResponse>, AppError> {
    let user = identity.resolve(auth::bearer_token(&headers)?).await?;

    let conversation = chat_db
        .get_conversation(&id, &user.id)
        .await?
        .ok_or_else(|| AppError::ConversationNotFound(id.clone()))?;

    let messages = chat_db.get_messages(&id).await?;

    let message_responses: Vec<MessageResponse> = messages
        .into_iter()
        .map(|m| MessageResponse {
            id: m.id,
            conversation_id: m.conversation_id,
            role: m.role,
            content: m.content,
            model: m.model,
            created_at: m.created_at,
        })
        .collect();

    Ok(Json(ConversationWithMessagesResponse {
        conversation: ConversationResponse::from(conversation),
        messages: message_responses,
    }))
}

/// DELETE /api/conversations/:id - Delete a conversation
pub async fn delete_conversation(
    State((identity, chat_db, _)): State<RouterState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = identity.resolve(auth::bearer_token(&headers)?).await?;

    // Ownership check before the destructive write
    chat_db
        .get_conversation(&id, &user.id)
        .await?
        .ok_or_else(|| AppError::ConversationNotFound(id.clone()))?;

    chat_db.delete_conversation(&id).await?;

    Ok(Json(serde_json::json!({
        "message": "Conversation deleted successfully",
        "id": id
    })))
}

/// PUT /api/conversations/:id/title - Update conversation title
pub async fn update_conversation_title(
    State((identity, chat_db, _)): State<RouterState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<UpdateTitleRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let user = identity.resolve(auth::bearer_token(&headers)?).await?;

    if request.title.trim().is_empty() {
        return Err(AppError::InvalidRequest("Title cannot be empty".to_string()));
    }

    let conversation = chat_db
        .get_conversation(&id, &user.id)
        .await?
        .ok_or_else(|| AppError::ConversationNotFound(id.clone()))?;

    chat_db.update_conversation_title(&id, &request.title).await?;

    Ok(Json(ConversationResponse {
        id: conversation.id,
        title: request.title,
        mode: conversation.mode,
        created_at: conversation.created_at,
        updated_at: chrono::Utc::now().timestamp(),
    }))
}
