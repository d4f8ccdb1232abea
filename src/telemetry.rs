//! Telemetry queries and the summary cache.
//!
//! [`TelemetryService`] reads records through a [`FlightLogStore`] and keeps
//! one computed [`Summary`] per file id until it is invalidated. Callers that
//! replace or delete a flight log must invalidate this cache and the
//! anomaly cache ([`crate::anomaly::AnomalyService`]); neither invalidates
//! the other.

use std::sync::Arc;

use anyhow::Result;
use flight_harness_core::store::FlightLogStore;
use flight_harness_core::{Summary, TelemetryMessage};
use serde::Deserialize;
use tracing::debug;

use crate::cache::KeyedCache;

/// Inclusive timestamp bounds for [`TelemetryService::query_telemetry`].
///
/// Records without a timestamp compare as `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct TelemetryFilter {
    pub min_timestamp: Option<f64>,
    pub max_timestamp: Option<f64>,
}

impl TelemetryFilter {
    pub fn is_empty(&self) -> bool {
        self.min_timestamp.is_none() && self.max_timestamp.is_none()
    }

    fn matches(&self, msg: &TelemetryMessage) -> bool {
        let ts = msg.timestamp.unwrap_or(0.0);
        self.min_timestamp.map_or(true, |min| ts >= min)
            && self.max_timestamp.map_or(true, |max| ts <= max)
    }
}

pub struct TelemetryService {
    store: Arc<dyn FlightLogStore>,
    summaries: KeyedCache<Summary>,
}

impl TelemetryService {
    pub fn new(store: Arc<dyn FlightLogStore>) -> Self {
        Self {
            store,
            summaries: KeyedCache::new("summary"),
        }
    }

    /// Summary of a flight log, computed on first use and cached.
    ///
    /// Returns `Ok(None)` for an unknown file id; nothing is cached in
    /// that case.
    pub async fn get_summary(&self, file_id: &str) -> Result<Option<Summary>> {
        let store = &self.store;
        self.summaries
            .get_or_try_insert_with(file_id, || async move {
                let Some(info) = store.get_by_id(file_id).await? else {
                    debug!(file_id, "summary requested for unknown flight log");
                    return Ok(None);
                };
                let messages = store.get_telemetry_data(file_id, None).await?;
                Ok(Some(Summary::compute(
                    file_id,
                    Some(info.filename.as_str()),
                    &messages,
                )))
            })
            .await
    }

    /// Records of a flight log, optionally restricted to one message type
    /// and a timestamp window. Stored order is preserved.
    pub async fn query_telemetry(
        &self,
        file_id: &str,
        message_type: Option<&str>,
        filter: Option<&TelemetryFilter>,
    ) -> Result<Vec<TelemetryMessage>> {
        let mut data = self.store.get_telemetry_data(file_id, message_type).await?;
        if let Some(f) = filter.filter(|f| !f.is_empty()) {
            data.retain(|m| f.matches(m));
        }
        Ok(data)
    }

    pub fn invalidate(&self, file_id: &str) {
        self.summaries.invalidate(file_id);
    }

    pub fn invalidate_all(&self) {
        self.summaries.invalidate_all();
    }

    pub fn store(&self) -> &Arc<dyn FlightLogStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flight_harness_core::store::memory::InMemoryFlightLogStore;
    use flight_harness_core::{FlightLog, FlightLogMetadata};

    fn log(file_id: &str, messages: Vec<TelemetryMessage>) -> FlightLog {
        FlightLog {
            file_id: file_id.to_string(),
            filename: format!("{}.jsonl", file_id),
            upload_time: Utc::now(),
            metadata: FlightLogMetadata {
                file_size: 0,
                content_type: None,
                sha256: String::new(),
                parsed_messages: messages.len(),
                complete: true,
            },
            messages,
        }
    }

    fn msg(ts: f64, kind: &str) -> TelemetryMessage {
        TelemetryMessage::new(Some(ts), kind)
    }

    #[tokio::test]
    async fn test_summary_is_cached_until_invalidated() {
        let store = Arc::new(InMemoryFlightLogStore::new());
        store
            .save(&log("f1", vec![msg(1.0, "A"), msg(4.0, "B")]))
            .await
            .unwrap();
        let svc = TelemetryService::new(store.clone());

        let first = svc.get_summary("f1").await.unwrap().unwrap();
        assert_eq!(first.total_messages, 2);
        assert_eq!(first.filename.as_deref(), Some("f1.jsonl"));

        // Replace the data without invalidating: the cached summary stays.
        store
            .save(&log("f1", vec![msg(1.0, "A"), msg(4.0, "B"), msg(9.0, "C")]))
            .await
            .unwrap();
        let second = svc.get_summary("f1").await.unwrap().unwrap();
        assert_eq!(first, second);

        svc.invalidate("f1");
        let third = svc.get_summary("f1").await.unwrap().unwrap();
        assert_eq!(third.total_messages, 3);
        assert_eq!(third.time_range.unwrap().end, 9.0);
    }

    #[tokio::test]
    async fn test_unknown_file_is_not_cached() {
        let store = Arc::new(InMemoryFlightLogStore::new());
        let svc = TelemetryService::new(store.clone());
        assert!(svc.get_summary("late").await.unwrap().is_none());

        store.save(&log("late", vec![msg(1.0, "A")])).await.unwrap();
        let s = svc.get_summary("late").await.unwrap().unwrap();
        assert_eq!(s.total_messages, 1);
    }

    #[tokio::test]
    async fn test_empty_log_summary() {
        let store = Arc::new(InMemoryFlightLogStore::new());
        store.save(&log("empty", vec![])).await.unwrap();
        let svc = TelemetryService::new(store);
        let s = svc.get_summary("empty").await.unwrap().unwrap();
        assert!(s.message_types.is_empty());
        assert!(s.time_range.is_none());
    }

    #[tokio::test]
    async fn test_query_with_timestamp_filter() {
        let store = Arc::new(InMemoryFlightLogStore::new());
        store
            .save(&log(
                "f1",
                vec![msg(1.0, "A"), msg(2.0, "B"), msg(3.0, "A"), msg(4.0, "A")],
            ))
            .await
            .unwrap();
        let svc = TelemetryService::new(store);

        let filter = TelemetryFilter {
            min_timestamp: Some(2.0),
            max_timestamp: Some(3.0),
        };
        let data = svc
            .query_telemetry("f1", None, Some(&filter))
            .await
            .unwrap();
        assert_eq!(data.len(), 2);

        let only_a = svc
            .query_telemetry("f1", Some("A"), Some(&filter))
            .await
            .unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].timestamp, Some(3.0));
    }
}
