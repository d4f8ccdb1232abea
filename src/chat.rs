//! Query orchestration: one conversational turn end to end.
//!
//! ```text
//! Query ─▶ validate ─▶ get_or_create (locked) ─▶ append user message
//!                                                   │
//!        bound file? ─▶ build_prompt_context + retrieve_context
//!                                                   │
//!                   build_instructions ─▶ ReasoningEngine::answer
//!                                                   │
//!                    append assistant message ─▶ save (commit)
//!                                                   │
//!                  clarification detection ─▶ QueryResult
//! ```
//!
//! The turn is committed by one `save` after the answer exists. If the
//! engine fails, neither message of the turn is persisted.

use std::sync::Arc;

use flight_harness_core::{Message, Query, QueryResult, TelemetryMessage};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{ContextAssembler, PromptContext};
use crate::conversation::ConversationService;
use crate::prompt::build_instructions;
use crate::reasoning::ReasoningEngine;

pub const INVALID_QUESTION_ANSWER: &str = "Please enter a valid question.";

const CONFIDENCE_DEFAULT: f64 = 0.8;
const CONFIDENCE_CLARIFY: f64 = 0.5;
const CONFIDENCE_INVALID: f64 = 0.0;

const CLARIFICATION_PHRASES: &[&str] = &[
    "need more information",
    "please provide",
    "could you clarify",
    "not sure",
];

/// Failures that abort a turn. Nothing of the turn is persisted.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("reasoning engine failed: {0:#}")]
    Upstream(anyhow::Error),
    #[error("conversation storage failed: {0:#}")]
    Persistence(anyhow::Error),
}

pub struct ChatOrchestrator {
    conversations: Arc<ConversationService>,
    context: Arc<ContextAssembler>,
    engine: Arc<dyn ReasoningEngine>,
    prompt_sample_size: usize,
}

impl ChatOrchestrator {
    pub fn new(
        conversations: Arc<ConversationService>,
        context: Arc<ContextAssembler>,
        engine: Arc<dyn ReasoningEngine>,
        prompt_sample_size: usize,
    ) -> Self {
        Self {
            conversations,
            context,
            engine,
            prompt_sample_size,
        }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub async fn process_query(&self, query: Query) -> Result<QueryResult, ChatError> {
        if let Err(e) = query.validate() {
            debug!(error = %e, "rejecting query");
            return Ok(QueryResult {
                answer: INVALID_QUESTION_ANSWER.to_string(),
                conversation_id: Uuid::new_v4().to_string(),
                confidence: CONFIDENCE_INVALID,
                sources: Vec::new(),
                requires_clarification: false,
                clarification_question: None,
            });
        }

        let mut turn = match query.conversation_id.as_deref() {
            Some(id) => Some(self.conversations.lock(id).await),
            None => None,
        };

        let mut conversation = self
            .conversations
            .get_or_create(query.conversation_id.as_deref(), query.file_id.as_deref())
            .await
            .map_err(ChatError::Persistence)?;
        let resolved = conversation.conversation_id.as_str();
        if turn.as_ref().map(|t| t.conversation_id()) != Some(resolved) {
            drop(turn.take());
            turn = Some(self.conversations.lock(resolved).await);
        }
        let _turn = turn;
        self.conversations
            .add_message(&mut conversation, Message::user(query.text.as_str()));

        let (prompt_context, telemetry) = match conversation.file_id.as_deref() {
            Some(file_id) => self.gather_context(file_id, &query.text).await,
            None => (PromptContext::default(), Vec::new()),
        };

        let instructions = build_instructions(&telemetry, self.prompt_sample_size);
        let answer = self
            .engine
            .answer(conversation.history(), &prompt_context, Some(&instructions))
            .await
            .map_err(ChatError::Upstream)?;

        self.conversations
            .add_message(&mut conversation, Message::assistant(answer.as_str()));
        self.conversations
            .save(&conversation)
            .await
            .map_err(ChatError::Persistence)?;

        let requires_clarification = needs_clarification(&answer);
        let clarification_question = if requires_clarification {
            extract_clarification_question(&answer)
        } else {
            None
        };
        let sources = conversation
            .file_id
            .iter()
            .map(|id| format!("Flight log: {}", id))
            .collect();

        info!(
            conversation_id = %conversation.conversation_id,
            file_id = ?conversation.file_id,
            telemetry = telemetry.len(),
            requires_clarification,
            "turn answered"
        );

        Ok(QueryResult {
            answer,
            conversation_id: conversation.conversation_id,
            confidence: if requires_clarification {
                CONFIDENCE_CLARIFY
            } else {
                CONFIDENCE_DEFAULT
            },
            sources,
            requires_clarification,
            clarification_question,
        })
    }

    /// Advisory context for a bound file. Store failures degrade to empty.
    async fn gather_context(
        &self,
        file_id: &str,
        question: &str,
    ) -> (PromptContext, Vec<TelemetryMessage>) {
        let prompt_context = self
            .context
            .build_prompt_context(file_id)
            .await
            .unwrap_or_else(|e| {
                warn!(file_id, error = %e, "summary context unavailable");
                PromptContext::default()
            });
        let telemetry = self
            .context
            .retrieve_context(file_id, question)
            .await
            .unwrap_or_else(|e| {
                warn!(file_id, error = %e, "telemetry context unavailable");
                Vec::new()
            });
        (prompt_context, telemetry)
    }
}

/// Whether the answer asks the user for more input.
pub fn needs_clarification(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    CLARIFICATION_PHRASES.iter().any(|p| lower.contains(p))
}

/// First `.`-delimited segment containing a `?`, trimmed.
pub fn extract_clarification_question(answer: &str) -> Option<String> {
    answer
        .split('.')
        .find(|segment| segment.contains('?'))
        .map(|segment| segment.trim().to_string())
}
