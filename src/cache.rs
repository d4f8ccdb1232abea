//! Per-key single-flight cache.
//!
//! [`KeyedCache`] backs both the summary cache and the anomaly cache. Each
//! key owns a `tokio::sync::OnceCell`:
//!
//! - Concurrent misses on the same key wait for one in-flight computation
//!   and share its result.
//! - A failed computation leaves the cell empty, so the next caller retries.
//! - A computation that reports "absent" caches nothing.
//! - [`invalidate`](KeyedCache::invalidate) drops the cell. A computation
//!   still running against the dropped cell finishes for its own waiters,
//!   but its result is never visible to later lookups.
//!
//! Keys are independent; nothing is ordered across keys.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use tokio::sync::OnceCell;
use tracing::debug;

type Cell<V> = Arc<OnceCell<V>>;

enum Miss {
    Absent,
    Failed(anyhow::Error),
}

pub struct KeyedCache<V> {
    name: &'static str,
    cells: Mutex<HashMap<String, Cell<V>>>,
}

impl<V: Clone> KeyedCache<V> {
    /// Create an empty cache. `name` only appears in log output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cells: Mutex::new(HashMap::new()),
        }
    }

    fn cells(&self) -> MutexGuard<'_, HashMap<String, Cell<V>>> {
        // The map is only mutated by short, non-panicking critical sections,
        // so a poisoned lock still guards a consistent map.
        self.cells.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn cell_for(&self, key: &str) -> Cell<V> {
        self.cells().entry(key.to_string()).or_default().clone()
    }

    /// Cached value for `key`, if one has been computed.
    pub fn get(&self, key: &str) -> Option<V> {
        self.cells().get(key).and_then(|c| c.get().cloned())
    }

    /// Return the cached value, or compute it once.
    ///
    /// `init` returns `Ok(None)` when the underlying entity does not exist;
    /// that outcome is passed through and not cached.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: &str, init: F) -> Result<Option<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>>>,
    {
        let cell = self.cell_for(key);
        let outcome = cell
            .get_or_try_init(|| async {
                debug!(cache = self.name, key, "cache miss, computing");
                match init().await {
                    Ok(Some(v)) => Ok(v),
                    Ok(None) => Err(Miss::Absent),
                    Err(e) => Err(Miss::Failed(e)),
                }
            })
            .await;

        match outcome {
            Ok(v) => Ok(Some(v.clone())),
            Err(miss) => {
                self.discard_empty(key, &cell);
                match miss {
                    Miss::Absent => Ok(None),
                    Miss::Failed(e) => Err(e),
                }
            }
        }
    }

    /// Like [`get_or_try_insert_with`](Self::get_or_try_insert_with) for
    /// computations that always produce a value.
    pub async fn get_or_try_init<F, Fut>(&self, key: &str, init: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let value = self
            .get_or_try_insert_with(key, || async { init().await.map(Some) })
            .await?;
        value.ok_or_else(|| anyhow::anyhow!("{} cache produced no value for {}", self.name, key))
    }

    /// Forget an empty cell so unknown keys do not accumulate.
    fn discard_empty(&self, key: &str, cell: &Cell<V>) {
        let mut cells = self.cells();
        if let Some(current) = cells.get(key) {
            if Arc::ptr_eq(current, cell) && !current.initialized() {
                cells.remove(key);
            }
        }
    }

    /// Remove one entry. Returns `true` if an entry existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.cells().remove(key).is_some();
        if removed {
            debug!(cache = self.name, key, "cache entry invalidated");
        }
        removed
    }

    pub fn invalidate_all(&self) {
        self.cells().clear();
        debug!(cache = self.name, "cache cleared");
    }

    /// Number of keys holding a computed value.
    pub fn len(&self) -> usize {
        self.cells().values().filter(|c| c.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
