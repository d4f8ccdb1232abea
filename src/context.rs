//! Context assembly for a conversational turn.
//!
//! Two kinds of context are attached to a turn on a bound flight log:
//!
//! 1. **Prompt context**: the cached [`Summary`] and [`AnomalySummary`]
//!    ([`ContextAssembler::build_prompt_context`]).
//! 2. **Telemetry slice**: the records relevant to the question, selected
//!    by keyword inference and capped at `retrieval.max_context_messages`
//!    ([`ContextAssembler::retrieve_context`]).
//!
//! ```text
//! question ──▶ infer_message_types ──▶ [types]
//!                                         │
//!            ┌────────── empty ───────────┤────────── non-empty ──────┐
//!            ▼                                                        ▼
//!     all records of the file                    per-type records, concatenated
//!            └───────────────▶ first N records ◀─────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Result;
use flight_harness_core::anomaly::AnomalySummary;
use flight_harness_core::{infer_message_types, Summary, TelemetryMessage};
use serde::Serialize;
use tracing::debug;

use crate::anomaly::AnomalyService;
use crate::telemetry::TelemetryService;

/// Cached aggregates handed to the reasoning engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromptContext {
    pub summary: Option<Summary>,
    pub anomaly_summary: Option<AnomalySummary>,
}

impl PromptContext {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.anomaly_summary.is_none()
    }
}

pub struct ContextAssembler {
    telemetry: Arc<TelemetryService>,
    anomalies: Arc<AnomalyService>,
    max_context_messages: usize,
}

impl ContextAssembler {
    pub fn new(
        telemetry: Arc<TelemetryService>,
        anomalies: Arc<AnomalyService>,
        max_context_messages: usize,
    ) -> Self {
        Self {
            telemetry,
            anomalies,
            max_context_messages,
        }
    }

    pub fn max_context_messages(&self) -> usize {
        self.max_context_messages
    }

    /// Summary and anomaly summary for a flight log, from cache when possible.
    ///
    /// An unknown file id yields an empty context; nothing is cached for it.
    pub async fn build_prompt_context(&self, file_id: &str) -> Result<PromptContext> {
        let Some(summary) = self.telemetry.get_summary(file_id).await? else {
            return Ok(PromptContext::default());
        };

        let telemetry = &self.telemetry;
        let anomaly_summary = self
            .anomalies
            .summarize_cached_with(file_id, || async move {
                telemetry.query_telemetry(file_id, None, None).await
            })
            .await?;

        Ok(PromptContext {
            summary: Some(summary),
            anomaly_summary: Some(anomaly_summary),
        })
    }

    /// Records relevant to `query_text`, earliest first, capped.
    ///
    /// Records matching several inferred types appear once per type.
    pub async fn retrieve_context(
        &self,
        file_id: &str,
        query_text: &str,
    ) -> Result<Vec<TelemetryMessage>> {
        let types = infer_message_types(query_text);
        let cap = self.max_context_messages;

        let mut records = if types.is_empty() {
            self.telemetry.query_telemetry(file_id, None, None).await?
        } else {
            let mut collected = Vec::new();
            for message_type in &types {
                if collected.len() >= cap {
                    break;
                }
                let mut part = self
                    .telemetry
                    .query_telemetry(file_id, Some(message_type), None)
                    .await?;
                collected.append(&mut part);
            }
            collected
        };

        records.truncate(cap);
        debug!(
            file_id,
            types = ?types,
            records = records.len(),
            "retrieved telemetry context"
        );
        Ok(records)
    }
}
