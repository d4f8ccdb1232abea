//! Cached anomaly summaries.
//!
//! Wraps the pure detector from `flight_harness_core::anomaly` with a
//! per-file cache. This cache is independent of the summary cache in
//! [`crate::telemetry`].

use std::future::Future;

use anyhow::Result;
use flight_harness_core::anomaly::{summarize, AnomalySummary, AnomalyThresholds};
use flight_harness_core::TelemetryMessage;

use crate::cache::KeyedCache;

pub struct AnomalyService {
    thresholds: AnomalyThresholds,
    summaries: KeyedCache<AnomalySummary>,
}

impl AnomalyService {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self {
            thresholds,
            summaries: KeyedCache::new("anomaly"),
        }
    }

    pub fn thresholds(&self) -> &AnomalyThresholds {
        &self.thresholds
    }

    /// Uncached scan with this service's thresholds.
    pub fn summarize(&self, messages: &[TelemetryMessage]) -> AnomalySummary {
        summarize(messages, &self.thresholds)
    }

    /// Cached scan of `messages` under `file_id`.
    ///
    /// On a hit, `messages` is ignored: the cached value reflects the
    /// records seen when it was computed.
    pub async fn summarize_cached(
        &self,
        file_id: &str,
        messages: &[TelemetryMessage],
    ) -> Result<AnomalySummary> {
        self.summaries
            .get_or_try_init(file_id, || async { Ok(self.summarize(messages)) })
            .await
    }

    /// Cached scan that only loads records on a miss.
    pub async fn summarize_cached_with<F, Fut>(&self, file_id: &str, load: F) -> Result<AnomalySummary>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<TelemetryMessage>>>,
    {
        self.summaries
            .get_or_try_init(file_id, || async {
                let messages = load().await?;
                Ok(self.summarize(&messages))
            })
            .await
    }

    pub fn invalidate(&self, file_id: &str) {
        self.summaries.invalidate(file_id);
    }

    pub fn invalidate_all(&self) {
        self.summaries.invalidate_all();
    }
}
