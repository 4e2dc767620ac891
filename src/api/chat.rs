//! Chat relay endpoint
//!
//! Forwards one user message through the relay service and returns the
//! assistant's reply.

use axum::{extract::State, http::HeaderMap, Json};

use crate::api::RouterState;
use crate::auth;
use crate::error::AppError;
use crate::relay::{ChatReply, ChatRequest};

/// POST /api/chat - Relay one message and return the assistant's reply
pub async fn chat(
    State((_, _, relay)): State<RouterState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let credential = auth::bearer_token(&headers)?;
    let reply = relay.handle(credential, request).await?;
    Ok(Json(reply))
}
