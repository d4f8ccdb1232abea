//! Storage abstraction for Flight Harness.
//!
//! Two collaborator traits cover everything the analysis pipeline needs
//! from storage:
//!
//! | Trait | Keyed by | Operations |
//! |-------|----------|------------|
//! | [`FlightLogStore`] | file id | `save`, `get_by_id`, `get_telemetry_data`, `delete` |
//! | [`ConversationStore`] | conversation id | `save`, `get_by_id`, `delete`, `create_new` |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Durable backends are out of scope here; [`memory`] provides the
//! process-local implementations.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::conversation::Conversation;
use crate::models::{FlightLog, FlightLogInfo, TelemetryMessage};

/// Abstract storage for decoded flight logs.
#[async_trait]
pub trait FlightLogStore: Send + Sync {
    /// Insert or replace a flight log. Returns its file id.
    async fn save(&self, log: &FlightLog) -> Result<String>;

    /// Metadata for a flight log, without its records.
    async fn get_by_id(&self, file_id: &str) -> Result<Option<FlightLogInfo>>;

    /// Records of a flight log in stored order, optionally restricted to
    /// one message type. Unknown file ids yield an empty vector.
    async fn get_telemetry_data(
        &self,
        file_id: &str,
        message_type: Option<&str>,
    ) -> Result<Vec<TelemetryMessage>>;

    /// Remove a flight log. Returns `false` if it did not exist.
    async fn delete(&self, file_id: &str) -> Result<bool>;
}

/// Abstract storage for conversations.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Insert or replace a conversation.
    async fn save(&self, conversation: &Conversation) -> Result<()>;

    async fn get_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// Remove a conversation. Returns `false` if it did not exist.
    async fn delete(&self, conversation_id: &str) -> Result<bool>;

    /// Create and persist an empty conversation with a fresh id.
    async fn create_new(&self, file_id: Option<&str>) -> Result<Conversation> {
        let conversation = Conversation::new(file_id.map(str::to_string));
        self.save(&conversation).await?;
        Ok(conversation)
    }
}
