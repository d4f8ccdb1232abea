//! Conversation state.
//!
//! A [`Conversation`] is an append-only sequence of user and assistant
//! messages, optionally bound to one flight log. Messages are never
//! reordered or removed here; deleting a whole conversation is a store
//! operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Multi-turn dialogue state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    /// Flight log this conversation is bound to, fixed at creation.
    pub file_id: Option<String>,
    pub messages: Vec<Message>,
    /// Free-form context carried with the conversation.
    #[serde(default)]
    pub context: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact description of a conversation for logs and API consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub file_id: Option<String>,
    pub message_count: usize,
    pub has_file: bool,
}

impl Conversation {
    /// New empty conversation with a fresh UUID.
    pub fn new(file_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            file_id,
            messages: Vec::new(),
            context: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and bump `updated_at`.
    ///
    /// `updated_at` never moves backwards, even if the wall clock does.
    pub fn add_message(&mut self, message: Message) {
        let stamp = message.timestamp.max(Utc::now());
        self.messages.push(message);
        if stamp > self.updated_at {
            self.updated_at = stamp;
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn context_summary(&self) -> ConversationSummary {
        ConversationSummary {
            conversation_id: self.conversation_id.clone(),
            file_id: self.file_id.clone(),
            message_count: self.messages.len(),
            has_file: self.file_id.is_some(),
        }
    }
}
