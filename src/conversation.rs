//! Conversation lifecycle on top of a [`ConversationStore`].
//!
//! Turns on the same conversation are serialized with a per-conversation
//! async lock ([`ConversationService::lock`]). The orchestrator holds the
//! guard for the whole turn and commits with a single [`save`](ConversationService::save).
//! [`delete`](ConversationService::delete) takes the same lock, so a running
//! turn finishes before its conversation is removed.
//!
//! A lock entry lives only while some caller holds or awaits it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use flight_harness_core::store::ConversationStore;
use flight_harness_core::{Conversation, Message};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Exclusive hold on one conversation. Dropping it releases the lock and
/// removes the map entry when nobody else is waiting.
pub struct TurnGuard {
    conversation_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl TurnGuard {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        let unused = locks
            .get(&self.conversation_id)
            .is_some_and(|l| Arc::strong_count(l) == 1);
        if unused {
            locks.remove(&self.conversation_id);
        }
    }
}

pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    locks: LockMap,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Acquire the turn lock for `conversation_id`.
    pub async fn lock(&self, conversation_id: &str) -> TurnGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks
                .entry(conversation_id.to_string())
                .or_default()
                .clone()
        };
        TurnGuard {
            conversation_id: conversation_id.to_string(),
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
        }
    }

    /// Number of conversations with a held or awaited turn lock.
    pub fn active_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Existing conversation, or a new persisted one bound to `file_id`.
    ///
    /// An existing conversation keeps its bound file even when `file_id`
    /// differs.
    pub async fn get_or_create(
        &self,
        conversation_id: Option<&str>,
        file_id: Option<&str>,
    ) -> Result<Conversation> {
        if let Some(id) = conversation_id {
            if let Some(existing) = self
                .store
                .get_by_id(id)
                .await
                .with_context(|| format!("Failed to load conversation {}", id))?
            {
                if file_id.is_some() && existing.file_id.as_deref() != file_id {
                    debug!(
                        conversation_id = id,
                        bound = ?existing.file_id,
                        requested = ?file_id,
                        "ignoring file id that differs from the bound flight log"
                    );
                }
                return Ok(existing);
            }
            debug!(conversation_id = id, "unknown conversation id, starting a new one");
        }

        let created = self
            .store
            .create_new(file_id)
            .await
            .context("Failed to create conversation")?;
        debug!(conversation_id = %created.conversation_id, file_id = ?file_id, "conversation created");
        Ok(created)
    }

    /// Append a message to a local copy. Call [`save`](Self::save) to persist.
    pub fn add_message(&self, conversation: &mut Conversation, message: Message) {
        conversation.add_message(message);
    }

    pub async fn save(&self, conversation: &Conversation) -> Result<()> {
        self.store
            .save(conversation)
            .await
            .with_context(|| format!("Failed to save conversation {}", conversation.conversation_id))
    }

    pub async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        self.store.get_by_id(conversation_id).await
    }

    /// Remove a conversation once any turn running on it has committed.
    pub async fn delete(&self, conversation_id: &str) -> Result<bool> {
        let _turn = self.lock(conversation_id).await;
        self.store.delete(conversation_id).await
    }
}
