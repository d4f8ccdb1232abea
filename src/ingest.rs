//! Flight-log ingestion.
//!
//! Coordinates the upload flow: extension and size checks → decode →
//! storage → cache invalidation. Rejected uploads are reported in the
//! outcome message with an empty file id rather than as errors; only
//! storage failures surface as `Err`.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use flight_harness_core::store::FlightLogStore;
use flight_harness_core::{FlightLog, FlightLogMetadata};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::anomaly::AnomalyService;
use crate::config::UploadConfig;
use crate::parser::LogParser;
use crate::telemetry::TelemetryService;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    /// Empty when the upload was rejected.
    pub file_id: String,
    pub filename: String,
    pub message: String,
    pub parsed_messages: Option<usize>,
}

impl UploadOutcome {
    fn rejected(filename: &str, message: String) -> Self {
        Self {
            file_id: String::new(),
            filename: filename.to_string(),
            message,
            parsed_messages: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        !self.file_id.is_empty()
    }
}

pub struct FlightLogIngestor {
    store: Arc<dyn FlightLogStore>,
    telemetry: Arc<TelemetryService>,
    anomalies: Arc<AnomalyService>,
    parser: Arc<dyn LogParser>,
    config: UploadConfig,
}

impl FlightLogIngestor {
    pub fn new(
        store: Arc<dyn FlightLogStore>,
        telemetry: Arc<TelemetryService>,
        anomalies: Arc<AnomalyService>,
        parser: Arc<dyn LogParser>,
        config: UploadConfig,
    ) -> Self {
        Self {
            store,
            telemetry,
            anomalies,
            parser,
            config,
        }
    }

    /// Decode and store an uploaded flight log under a fresh file id.
    pub async fn upload(
        &self,
        filename: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<UploadOutcome> {
        if !self.config.accepts(filename) {
            warn!(filename, "upload rejected: unsupported extension");
            return Ok(UploadOutcome::rejected(
                filename,
                format!(
                    "Unsupported file type. Allowed extensions: {}",
                    self.config.allowed_extensions.join(", ")
                ),
            ));
        }
        if bytes.len() > self.config.max_bytes {
            warn!(filename, size = bytes.len(), "upload rejected: too large");
            return Ok(UploadOutcome::rejected(
                filename,
                format!(
                    "File too large: {} bytes exceeds the {} byte limit",
                    bytes.len(),
                    self.config.max_bytes
                ),
            ));
        }

        let parsed = self.parser.parse(bytes);
        if parsed.messages.is_empty() && !bytes.iter().all(u8::is_ascii_whitespace) {
            warn!(filename, parser = self.parser.name(), "upload rejected: nothing decoded");
            return Ok(UploadOutcome::rejected(
                filename,
                "File parsing failed: no telemetry records could be decoded".to_string(),
            ));
        }
        if !parsed.complete {
            warn!(
                filename,
                decoded = parsed.messages.len(),
                "partial decode, keeping the decoded prefix"
            );
        }

        let file_id = Uuid::new_v4().to_string();
        let parsed_messages = parsed.messages.len();
        let log = FlightLog {
            file_id: file_id.clone(),
            filename: filename.to_string(),
            upload_time: Utc::now(),
            metadata: FlightLogMetadata {
                file_size: bytes.len() as u64,
                content_type: content_type.map(str::to_string),
                sha256: hex::encode(Sha256::digest(bytes)),
                parsed_messages,
                complete: parsed.complete,
            },
            messages: parsed.messages,
        };

        self.store
            .save(&log)
            .await
            .with_context(|| format!("Failed to store flight log {}", filename))?;
        self.invalidate(&file_id);

        info!(file_id = %file_id, filename, parsed_messages, "flight log stored");

        Ok(UploadOutcome {
            file_id,
            filename: filename.to_string(),
            message: format!(
                "The file has been uploaded successfully and parsed {} messages",
                parsed_messages
            ),
            parsed_messages: Some(parsed_messages),
        })
    }

    /// Remove a flight log and its cached aggregates.
    pub async fn delete(&self, file_id: &str) -> Result<bool> {
        let removed = self.store.delete(file_id).await?;
        self.invalidate(file_id);
        if removed {
            info!(file_id, "flight log deleted");
        }
        Ok(removed)
    }

    fn invalidate(&self, file_id: &str) {
        self.telemetry.invalidate(file_id);
        self.anomalies.invalidate(file_id);
    }
}
