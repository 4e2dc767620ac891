//! Message Relay Service
//!
//! Mediates between the caller, the conversation store, and the completion
//! provider. One call carries one user message: the relay authenticates the
//! caller, verifies conversation ownership, persists the inbound turn,
//! rebuilds the ordered history, invokes the completion provider, persists
//! the reply, and returns it.
//!
//! All three collaborators are injected as trait objects, so the whole flow
//! is testable with in-process doubles.

pub mod locks;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::IdentityProvider;
use crate::chat::{ConversationStore, Message};
use crate::error::AppError;
use crate::provider::{ChatTurn, CompletionProvider, CompletionRequest};
use locks::ConversationLocks;

/// Sampling temperature sent with every completion request
const TEMPERATURE: f32 = 0.7;
/// Reply length cap sent with every completion request
const MAX_TOKENS: u32 = 1000;

/// System prompt for public-mode conversations
const PUBLIC_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide helpful and informative responses to user questions.";
/// System prompt for private-mode conversations
const PRIVATE_SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to the user's \
     private knowledge base. Provide detailed and personalized responses.";

/// Mode-to-model mapping for the relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Model id used when `is_private_mode` is false
    pub public_model: String,
    /// Model id used when `is_private_mode` is true
    pub private_model: String,
}

/// One inbound chat request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's message text
    pub message: String,
    /// Conversation the message belongs to
    pub conversation_id: String,
    /// Selects the private-mode model and system prompt
    #[serde(default)]
    pub is_private_mode: bool,
}

/// The assistant's reply, returned to the caller
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    /// Reply text produced by the completion provider
    pub message: String,
}

/// The relay service with its injected collaborators
pub struct RelayService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn ConversationStore>,
    provider: Arc<dyn CompletionProvider>,
    config: RelayConfig,
    locks: ConversationLocks,
}

impl RelayService {
    /// Create a relay service from its collaborators
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn ConversationStore>,
        provider: Arc<dyn CompletionProvider>,
        config: RelayConfig,
    ) -> Self {
        Self {
            identity,
            store,
            provider,
            config,
            locks: ConversationLocks::new(),
        }
    }

    fn model_for_mode(&self, is_private_mode: bool) -> &str {
        if is_private_mode {
            &self.config.private_model
        } else {
            &self.config.public_model
        }
    }

    fn system_prompt(is_private_mode: bool) -> &'static str {
        if is_private_mode {
            PRIVATE_SYSTEM_PROMPT
        } else {
            PUBLIC_SYSTEM_PROMPT
        }
    }

    /// Handle one chat message end to end
    ///
    /// `credential` is the caller's raw bearer token. On success the user turn
    /// and the assistant turn are persisted and the reply text is returned.
    ///
    /// # Errors
    /// * `AppError::Unauthorized` - credential rejected, no side effects
    /// * `AppError::ConversationNotFound` - conversation missing or not owned
    ///   by the caller, no side effects
    /// * `AppError::Storage` - inbound write failed, no upstream call made
    /// * `AppError::Upstream` - provider failed; the user turn stays persisted
    pub async fn handle(
        &self,
        credential: &str,
        request: ChatRequest,
    ) -> Result<ChatReply, AppError> {
        // Step 1: resolve the caller's identity before touching anything
        let user = self.identity.resolve(credential).await?;

        // Step 2: the conversation must exist and belong to the caller
        let conversation = self
            .store
            .conversation_for_user(&request.conversation_id, &user.id)
            .await?
            .ok_or_else(|| AppError::ConversationNotFound(request.conversation_id.clone()))?;

        // Step 3: serialize overlapping calls for this conversation so their
        // read-history/append interleavings cannot corrupt the dialogue order
        let _guard = self.locks.acquire(&conversation.id).await;

        info!(
            conversation_id = %conversation.id,
            user_id = %user.id,
            is_private_mode = request.is_private_mode,
            "Relaying chat message"
        );

        // Step 4: persist the inbound turn; without it no upstream call is made
        let user_message = Message::user(
            Uuid::new_v4().to_string(),
            conversation.id.clone(),
            request.message.clone(),
        );
        self.store.add_message(&user_message).await?;

        // Step 5: rebuild the full ordered history, reduced to {role, content}
        let history = self.store.messages(&conversation.id).await?;
        let context: Vec<ChatTurn> = history
            .iter()
            .map(|m| ChatTurn::new(m.role.as_str(), m.content.as_str()))
            .collect();

        // Step 6: mode selects the model and the system prompt; the system
        // message is synthesized per call and never persisted
        let model = self.model_for_mode(request.is_private_mode).to_string();
        let mut messages = Vec::with_capacity(context.len() + 1);
        messages.push(ChatTurn::new(
            "system",
            Self::system_prompt(request.is_private_mode),
        ));
        messages.extend(context);

        // Step 7: one blocking upstream call, no retries
        let completion_request = CompletionRequest {
            model: model.clone(),
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let reply_text = self.provider.complete(&completion_request).await?;

        // Step 8: persist the reply; the caller still gets the text if this
        // write fails
        let assistant_message = Message::assistant(
            Uuid::new_v4().to_string(),
            conversation.id.clone(),
            reply_text.clone(),
            model,
        );
        if let Err(e) = self.store.add_message(&assistant_message).await {
            warn!(
                conversation_id = %conversation.id,
                error = %e,
                "Failed to persist assistant message, returning reply anyway"
            );
        }

        // Step 9: freshness bump, best effort
        if let Err(e) = self.store.touch_conversation(&conversation.id).await {
            warn!(
                conversation_id = %conversation.id,
                error = %e,
                "Failed to touch conversation"
            );
        }

        Ok(ChatReply {
            message: reply_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserIdentity;
    use crate::chat::{Conversation, ConversationMode};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const PUBLIC_MODEL: &str = "openai/gpt-3.5-turbo";
    const PRIVATE_MODEL: &str = "anthropic/claude-3-sonnet";

    struct StubIdentity {
        accept: bool,
    }

    #[async_trait]
    impl IdentityProvider for StubIdentity {
        async fn resolve(&self, _credential: &str) -> Result<UserIdentity, AppError> {
            if self.accept {
                Ok(UserIdentity {
                    id: "user-1".to_string(),
                    email: None,
                })
            } else {
                Err(AppError::Unauthorized("bad token".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        conversations: Mutex<HashMap<String, Conversation>>,
        messages: Mutex<Vec<Message>>,
        fail_user_writes: AtomicBool,
        fail_assistant_writes: AtomicBool,
    }

    impl MemoryStore {
        fn with_conversation(id: &str, user_id: &str) -> Self {
            let store = Self::default();
            let conv = Conversation::new(
                id.to_string(),
                user_id.to_string(),
                "Test".to_string(),
                ConversationMode::Public,
            );
            store
                .conversations
                .lock()
                .unwrap()
                .insert(id.to_string(), conv);
            store
        }

        fn message_count(&self) -> usize {
            self.messages.lock().unwrap().len()
        }

        fn stored(&self) -> Vec<Message> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConversationStore for MemoryStore {
        async fn conversation_for_user(
            &self,
            id: &str,
            user_id: &str,
        ) -> Result<Option<Conversation>, AppError> {
            Ok(self
                .conversations
                .lock()
                .unwrap()
                .get(id)
                .filter(|c| c.user_id == user_id)
                .cloned())
        }

        async fn add_message(&self, message: &Message) -> Result<(), AppError> {
            let is_user = message.role == "user";
            if is_user && self.fail_user_writes.load(Ordering::SeqCst) {
                return Err(AppError::Storage("user write failed".to_string()));
            }
            if !is_user && self.fail_assistant_writes.load(Ordering::SeqCst) {
                return Err(AppError::Storage("assistant write failed".to_string()));
            }
            self.messages.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, AppError> {
            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .cloned()
                .collect())
        }

        async fn touch_conversation(&self, id: &str) -> Result<(), AppError> {
            if let Some(conv) = self.conversations.lock().unwrap().get_mut(id) {
                conv.updated_at += 1;
            }
            Ok(())
        }
    }

    struct RecordingProvider {
        reply: Result<String, String>,
        requests: Mutex<Vec<CompletionRequest>>,
        delay: Option<Duration>,
    }

    impl RecordingProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                requests: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err("provider down".to_string()),
                requests: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionProvider for RecordingProvider {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, AppError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply
                .clone()
                .map_err(AppError::Upstream)
        }
    }

    fn relay(
        identity: StubIdentity,
        store: Arc<MemoryStore>,
        provider: Arc<RecordingProvider>,
    ) -> RelayService {
        RelayService::new(
            Arc::new(identity),
            store,
            provider,
            RelayConfig {
                public_model: PUBLIC_MODEL.to_string(),
                private_model: PRIVATE_MODEL.to_string(),
            },
        )
    }

    fn request(message: &str, conversation_id: &str, is_private_mode: bool) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            conversation_id: conversation_id.to_string(),
            is_private_mode,
        }
    }

    #[tokio::test]
    async fn test_public_mode_hello_persists_two_messages() {
        let store = Arc::new(MemoryStore::with_conversation("conv-1", "user-1"));
        let provider = Arc::new(RecordingProvider::replying("Hi! How can I help?"));
        let service = relay(StubIdentity { accept: true }, store.clone(), provider.clone());

        let reply = service
            .handle("token", request("hello", "conv-1", false))
            .await
            .unwrap();

        assert_eq!(reply.message, "Hi! How can I help?");

        let stored = store.stored();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, "user");
        assert_eq!(stored[0].content, "hello");
        assert!(stored[0].model.is_none());
        assert_eq!(stored[1].role, "assistant");
        assert_eq!(stored[1].content, "Hi! How can I help?");
        assert_eq!(stored[1].model.as_deref(), Some(PUBLIC_MODEL));
    }

    #[tokio::test]
    async fn test_mode_selects_model_and_system_prompt() {
        let store = Arc::new(MemoryStore::with_conversation("conv-1", "user-1"));
        let provider = Arc::new(RecordingProvider::replying("ok"));
        let service = relay(StubIdentity { accept: true }, store.clone(), provider.clone());

        service
            .handle("token", request("first", "conv-1", false))
            .await
            .unwrap();
        service
            .handle("token", request("second", "conv-1", true))
            .await
            .unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);

        assert_eq!(requests[0].model, PUBLIC_MODEL);
        assert_eq!(requests[0].messages[0].role, "system");
        assert_eq!(requests[0].messages[0].content, PUBLIC_SYSTEM_PROMPT);

        assert_eq!(requests[1].model, PRIVATE_MODEL);
        assert_eq!(requests[1].messages[0].content, PRIVATE_SYSTEM_PROMPT);

        // Second call sees the first turn pair ahead of the new user turn
        let second_context: Vec<(&str, &str)> = requests[1]
            .messages
            .iter()
            .map(|t| (t.role.as_str(), t.content.as_str()))
            .collect();
        assert_eq!(
            second_context,
            vec![
                ("system", PRIVATE_SYSTEM_PROMPT),
                ("user", "first"),
                ("assistant", "ok"),
                ("user", "second"),
            ]
        );

        // Model recorded on the assistant message follows the mode mapping
        let stored = store.stored();
        assert_eq!(stored[1].model.as_deref(), Some(PUBLIC_MODEL));
        assert_eq!(stored[3].model.as_deref(), Some(PRIVATE_MODEL));
    }

    #[tokio::test]
    async fn test_system_prompt_never_persisted() {
        let store = Arc::new(MemoryStore::with_conversation("conv-1", "user-1"));
        let provider = Arc::new(RecordingProvider::replying("ok"));
        let service = relay(StubIdentity { accept: true }, store.clone(), provider);

        for i in 0..3 {
            service
                .handle("token", request(&format!("turn {}", i), "conv-1", i % 2 == 0))
                .await
                .unwrap();
        }

        // N turn pairs stored, never a system row
        let stored = store.stored();
        assert_eq!(stored.len(), 6);
        assert!(stored.iter().all(|m| m.role != "system"));
    }

    #[tokio::test]
    async fn test_upstream_payload_carries_fixed_parameters() {
        let store = Arc::new(MemoryStore::with_conversation("conv-1", "user-1"));
        let provider = Arc::new(RecordingProvider::replying("ok"));
        let service = relay(StubIdentity { accept: true }, store, provider.clone());

        service
            .handle("token", request("hello", "conv-1", false))
            .await
            .unwrap();

        let requests = provider.requests();
        assert_eq!(requests[0].temperature, 0.7);
        assert_eq!(requests[0].max_tokens, 1000);
    }

    #[tokio::test]
    async fn test_auth_failure_has_zero_side_effects() {
        let store = Arc::new(MemoryStore::with_conversation("conv-1", "user-1"));
        let provider = Arc::new(RecordingProvider::replying("ok"));
        let service = relay(StubIdentity { accept: false }, store.clone(), provider.clone());

        let result = service
            .handle("bad-token", request("hello", "conv-1", false))
            .await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
        assert_eq!(store.message_count(), 0);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_conversation_rejected_before_writes() {
        let store = Arc::new(MemoryStore::with_conversation("conv-1", "someone-else"));
        let provider = Arc::new(RecordingProvider::replying("ok"));
        let service = relay(StubIdentity { accept: true }, store.clone(), provider.clone());

        let result = service
            .handle("token", request("hello", "conv-1", false))
            .await;

        assert!(matches!(result, Err(AppError::ConversationNotFound(_))));
        assert_eq!(store.message_count(), 0);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_write_failure_skips_upstream() {
        let store = Arc::new(MemoryStore::with_conversation("conv-1", "user-1"));
        store.fail_user_writes.store(true, Ordering::SeqCst);
        let provider = Arc::new(RecordingProvider::replying("ok"));
        let service = relay(StubIdentity { accept: true }, store.clone(), provider.clone());

        let result = service
            .handle("token", request("hello", "conv-1", false))
            .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_user_turn() {
        let store = Arc::new(MemoryStore::with_conversation("conv-1", "user-1"));
        let provider = Arc::new(RecordingProvider::failing());
        let service = relay(StubIdentity { accept: true }, store.clone(), provider);

        let result = service
            .handle("token", request("hello", "conv-1", false))
            .await;

        assert!(matches!(result, Err(AppError::Upstream(_))));

        // No rollback: the user turn stays, with no assistant reply
        let stored = store.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role, "user");
        assert_eq!(stored[0].content, "hello");
    }

    #[tokio::test]
    async fn test_assistant_write_failure_still_returns_reply() {
        let store = Arc::new(MemoryStore::with_conversation("conv-1", "user-1"));
        store.fail_assistant_writes.store(true, Ordering::SeqCst);
        let provider = Arc::new(RecordingProvider::replying("best effort"));
        let service = relay(StubIdentity { accept: true }, store.clone(), provider);

        let reply = service
            .handle("token", request("hello", "conv-1", false))
            .await
            .unwrap();

        assert_eq!(reply.message, "best effort");
        assert_eq!(store.message_count(), 1); // only the user turn landed
    }

    #[tokio::test]
    async fn test_overlapping_calls_serialize_per_conversation() {
        let store = Arc::new(MemoryStore::with_conversation("conv-1", "user-1"));
        let provider = Arc::new(RecordingProvider {
            reply: Ok("ok".to_string()),
            requests: Mutex::new(Vec::new()),
            delay: Some(Duration::from_millis(20)),
        });
        let service = Arc::new(relay(
            StubIdentity { accept: true },
            store.clone(),
            provider.clone(),
        ));

        let a = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .handle("token", request("one", "conv-1", false))
                    .await
            })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .handle("token", request("two", "conv-1", false))
                    .await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(store.message_count(), 4);

        // The serialized second call saw the first turn pair in its context:
        // one request with 2 turns (system + user), one with 4
        let mut lens: Vec<usize> = provider
            .requests()
            .iter()
            .map(|r| r.messages.len())
            .collect();
        lens.sort_unstable();
        assert_eq!(lens, vec![2, 4]);
    }
}
