//! In-memory store implementations.
//!
//! Uses `HashMap` behind `std::sync::RwLock`. Nothing survives the
//! process; lock poisoning surfaces as an error instead of a panic.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::conversation::Conversation;
use crate::models::{FlightLog, FlightLogInfo, TelemetryMessage};

use super::{ConversationStore, FlightLogStore};

fn poisoned(what: &str) -> anyhow::Error {
    anyhow!("{} lock poisoned", what)
}

/// In-memory flight log store.
pub struct InMemoryFlightLogStore {
    logs: RwLock<HashMap<String, FlightLog>>,
}

impl InMemoryFlightLogStore {
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.logs.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryFlightLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlightLogStore for InMemoryFlightLogStore {
    async fn save(&self, log: &FlightLog) -> Result<String> {
        let mut logs = self.logs.write().map_err(|_| poisoned("flight log store"))?;
        logs.insert(log.file_id.clone(), log.clone());
        Ok(log.file_id.clone())
    }

    async fn get_by_id(&self, file_id: &str) -> Result<Option<FlightLogInfo>> {
        let logs = self.logs.read().map_err(|_| poisoned("flight log store"))?;
        Ok(logs.get(file_id).map(FlightLog::info))
    }

    async fn get_telemetry_data(
        &self,
        file_id: &str,
        message_type: Option<&str>,
    ) -> Result<Vec<TelemetryMessage>> {
        let logs = self.logs.read().map_err(|_| poisoned("flight log store"))?;
        let Some(log) = logs.get(file_id) else {
            return Ok(Vec::new());
        };
        Ok(match message_type {
            Some(t) => log
                .messages
                .iter()
                .filter(|m| m.message_type == t)
                .cloned()
                .collect(),
            None => log.messages.clone(),
        })
    }

    async fn delete(&self, file_id: &str) -> Result<bool> {
        let mut logs = self.logs.write().map_err(|_| poisoned("flight log store"))?;
        Ok(logs.remove(file_id).is_some())
    }
}

/// In-memory conversation store.
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.conversations.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let mut map = self
            .conversations
            .write()
            .map_err(|_| poisoned("conversation store"))?;
        map.insert(conversation.conversation_id.clone(), conversation.clone());
        Ok(())
    }

    async fn get_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let map = self
            .conversations
            .read()
            .map_err(|_| poisoned("conversation store"))?;
        Ok(map.get(conversation_id).cloned())
    }

    async fn delete(&self, conversation_id: &str) -> Result<bool> {
        let mut map = self
            .conversations
            .write()
            .map_err(|_| poisoned("conversation store"))?;
        Ok(map.remove(conversation_id).is_some())
    }
}
