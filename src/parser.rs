//! Flight-log decoding.
//!
//! A [`LogParser`] turns raw bytes into ordered [`TelemetryMessage`]s.
//! Decoding may stop early; the decoded prefix is still a valid log and is
//! reported with `complete = false`.
//!
//! The shipped adapter, [`JsonLinesParser`], reads one JSON object per line:
//!
//! ```text
//! {"timestamp": 10.0, "message_type": "BATTERY_STATUS", "data": {"temperature": 65}}
//! {"timestamp": 10.2, "message_type": "GPS_RAW_INT", "data": {"fix_type": 3}}
//! ```

use flight_harness_core::TelemetryMessage;
use tracing::warn;

/// Output of a decode pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLog {
    pub messages: Vec<TelemetryMessage>,
    /// `false` when decoding stopped before the end of the input.
    pub complete: bool,
}

pub trait LogParser: Send + Sync {
    fn name(&self) -> &str;
    fn parse(&self, bytes: &[u8]) -> ParsedLog;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesParser;

impl LogParser for JsonLinesParser {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn parse(&self, bytes: &[u8]) -> ParsedLog {
        let mut messages = Vec::new();

        for (index, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = match std::str::from_utf8(raw) {
                Ok(s) => s.trim(),
                Err(e) => {
                    warn!(line = index + 1, error = %e, "invalid utf-8, stopping decode");
                    return ParsedLog {
                        messages,
                        complete: false,
                    };
                }
            };
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<TelemetryMessage>(line) {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    warn!(
                        line = index + 1,
                        decoded = messages.len(),
                        error = %e,
                        "malformed record, stopping decode"
                    );
                    return ParsedLog {
                        messages,
                        complete: false,
                    };
                }
            }
        }

        ParsedLog {
            messages,
            complete: true,
        }
    }
}
