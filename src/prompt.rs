//! Prompt text for the reasoning engine.
//!
//! [`build_instructions`] produces the per-turn instructions from the
//! retrieved telemetry slice. [`render_system_prompt`] combines those
//! instructions with the cached [`PromptContext`] into the system prompt
//! every provider sends.

use std::fmt::Write;

use flight_harness_core::TelemetryMessage;

use crate::context::PromptContext;

pub const LOG_MESSAGES_REFERENCE: &str = "https://ardupilot.org/plane/docs/logmessages.html";

const PREAMBLE: &str = "You are a professional MAVLink telemetry analysis assistant.
Your task is to help users analyze flight log data and answer questions about flight parameters, states, and events.

Guidelines:
1. Base answers on the provided telemetry data and keep them accurate.
2. If data is insufficient, proactively ask the user for more information.
3. Use professional terminology but keep answers easy to understand.
4. If anomalies or errors are detected, clearly call them out.

Reference: https://ardupilot.org/plane/docs/logmessages.html
";

const ANOMALY_GUIDANCE: &str = "
Use the provided telemetry summary and anomaly summary to:
- Look for sudden changes in altitude, battery temperature, or inconsistent GPS fix.
- Cross-check high-severity STATUSTEXT messages and RC signal quality issues.
- If evidence is insufficient, ask clarifying questions instead of guessing.
";

const CLOSING: &str = "\nAnswer based on telemetry data and retrieve relevant details. \
If information is insufficient, proactively ask the user for more context.";

/// Instructions for one turn, quoting the first `sample_size` records.
pub fn build_instructions(telemetry: &[TelemetryMessage], sample_size: usize) -> String {
    let mut prompt = String::from(PREAMBLE);

    if !telemetry.is_empty() {
        let _ = writeln!(
            prompt,
            "\nSample telemetry available (total {} messages):",
            telemetry.len()
        );
        for msg in telemetry.iter().take(sample_size) {
            let fields = serde_json::to_string(&msg.fields).unwrap_or_else(|_| "{}".to_string());
            let _ = writeln!(prompt, "- {}: {}", msg.message_type, fields);
        }
    }

    prompt.push_str(ANOMALY_GUIDANCE);
    prompt
}

/// System prompt sent to the provider.
pub fn render_system_prompt(instructions: Option<&str>, context: &PromptContext) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(base) = instructions {
        parts.push(base.to_string());
    }
    parts.push(format!("\nReference: {}", LOG_MESSAGES_REFERENCE));

    if let Some(summary) = &context.summary {
        parts.push("\nCurrent flight log info:".to_string());
        parts.push(format!(
            "- Filename: {}",
            summary.filename.as_deref().unwrap_or("N/A")
        ));
        parts.push(format!("- Total messages: {}", summary.total_messages));
        if !summary.message_types.is_empty() {
            parts.push(format!(
                "- Message types: {}",
                summary.message_types.join(", ")
            ));
        }
        if let Some(tr) = &summary.time_range {
            parts.push(format!("- Time range: {} - {}", tr.start, tr.end));
            parts.push(format!("- Duration: {} seconds", tr.duration));
        }
    }

    if let Some(a) = &context.anomaly_summary {
        parts.push("\nAnomaly summary (use as hints for flexible reasoning):".to_string());
        parts.push(format!("- Status: {}", a.status.as_str()));
        parts.push(format!(
            "- Counts: gps_loss={}, rc_loss={}, high_severity_errors={}, battery_temp_high={}",
            a.counts.gps_loss,
            a.counts.rc_loss,
            a.counts.high_severity_errors,
            a.counts.battery_temp_high
        ));
        if !a.altitude_range.is_empty() {
            parts.push(format!(
                "- Altitude range: min={}, max={}",
                opt(a.altitude_range.min),
                opt(a.altitude_range.max)
            ));
        }
        if let Some(t) = a.battery_temp_max {
            parts.push(format!("- Battery temp max: {}°C", t));
        }
        if !a.examples.is_empty() {
            let examples: Vec<String> = a
                .examples
                .iter()
                .map(|ex| format!("{} @ {}: {}", ex.kind.as_str(), ex.timestamp, ex.detail))
                .collect();
            parts.push(format!("- Examples: {}", examples.join("; ")));
        }
        if !a.notes.is_empty() {
            parts.push(format!("- Notes: {}", a.notes.join(" | ")));
        }
    }

    parts.push(CLOSING.to_string());
    parts.join("\n")
}

fn opt(v: Option<f64>) -> String {
    v.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}
