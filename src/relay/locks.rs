//! Per-conversation mutual exclusion
//!
//! One lock per conversation ID, created on demand. Overlapping relay calls
//! for the same conversation serialize their read-history/append-message
//! sequences; calls for different conversations proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Hands out one `Mutex` per conversation id
#[derive(Default)]
pub struct ConversationLocks {
    /// Map from conversation_id to its lock
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a conversation, waiting if another call holds it
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let existing = {
            let locks = self.locks.read().await;
            locks.get(conversation_id).cloned()
        };

        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut locks = self.locks.write().await;
                locks
                    .entry(conversation_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            }
        };

        lock.lock_owned().await
    }
}
