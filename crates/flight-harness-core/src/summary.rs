//! Descriptive flight summaries.
//!
//! A [`Summary`] is derived from one snapshot of a flight log's records in
//! a single pass: the distinct message types and the span of timestamps.
//! Caching lives in the application crate; this module is pure.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::TelemetryMessage;

/// Span of timestamps observed in a flight log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

/// Cached descriptive aggregate of a flight log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub total_messages: usize,
    /// Sorted, distinct message types.
    pub message_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

impl Summary {
    /// Compute a summary over `messages`.
    ///
    /// Records without a timestamp still count towards `total_messages`
    /// and `message_types` but do not affect the time range.
    pub fn compute(file_id: &str, filename: Option<&str>, messages: &[TelemetryMessage]) -> Self {
        let mut types = BTreeSet::new();
        let mut bounds: Option<(f64, f64)> = None;

        for msg in messages {
            types.insert(msg.message_type.as_str());
            if let Some(ts) = msg.timestamp {
                bounds = Some(match bounds {
                    None => (ts, ts),
                    Some((lo, hi)) => (lo.min(ts), hi.max(ts)),
                });
            }
        }

        Summary {
            file_id: file_id.to_string(),
            filename: filename.map(str::to_string),
            total_messages: messages.len(),
            message_types: types.into_iter().map(str::to_string).collect(),
            time_range: bounds.map(|(start, end)| TimeRange {
                start,
                end,
                duration: end - start,
            }),
        }
    }
}
