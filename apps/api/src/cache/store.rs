//! In-process response cache with per-entry TTL and debounced persistence.
//!
//! Reads and writes are synchronous against a shared map. Every mutation
//! signals a background flusher, which waits for `debounce` of quiet before
//! writing one snapshot to the backend; each new signal restarts the wait.
//! Concurrent writers to the same key are last-write-wins: every cached value
//! is a pure recomputation of its key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{CacheBackend, PersistedEntry, PersistedMap};
use super::clock::Clock;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    created_at: i64,
    ttl_ms: i64,
}

impl CacheEntry {
    fn is_valid(&self, now: i64) -> bool {
        now - self.created_at < self.ttl_ms
    }
}

type EntryMap = Arc<RwLock<HashMap<String, CacheEntry>>>;

enum FlushSignal {
    Dirty,
    Shutdown(oneshot::Sender<()>),
}

/// Result of `get_or_compute`: the value plus whether it came from the cache.
#[derive(Debug, Clone, Serialize)]
pub struct Cached<T> {
    pub data: T,
    pub from_cache: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
}

/// Shared handle to the cache. Cheap to clone; all clones see the same entries.
#[derive(Clone)]
pub struct ResponseCache {
    entries: EntryMap,
    clock: Arc<dyn Clock>,
    flush_tx: mpsc::UnboundedSender<FlushSignal>,
    flusher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ResponseCache {
    /// Loads the backend (best effort) and starts the background flusher.
    /// An unreadable or malformed backend yields an empty cache.
    pub async fn init(
        backend: Arc<dyn CacheBackend>,
        clock: Arc<dyn Clock>,
        debounce: Duration,
    ) -> Self {
        let now = clock.now_ms();
        let loaded: HashMap<String, CacheEntry> = match backend.read_all().await {
            Ok(persisted) => persisted
                .into_iter()
                .map(|(key, p)| {
                    (
                        key,
                        CacheEntry {
                            payload: p.data,
                            created_at: p.timestamp,
                            ttl_ms: p.ttl,
                        },
                    )
                })
                .filter(|(_, entry)| entry.is_valid(now))
                .collect(),
            Err(e) => {
                warn!("Could not load AI cache, starting empty: {e}");
                HashMap::new()
            }
        };
        info!("AI cache loaded with {} active entries", loaded.len());

        let entries: EntryMap = Arc::new(RwLock::new(loaded));
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        let flusher = tokio::spawn(run_flusher(
            entries.clone(),
            backend,
            clock.clone(),
            debounce,
            flush_rx,
        ));

        Self {
            entries,
            clock,
            flush_tx,
            flusher: Arc::new(Mutex::new(Some(flusher))),
        }
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            payload: value,
            created_at: self.clock.now_ms(),
            ttl_ms: ttl.as_millis() as i64,
        };
        self.write().insert(key.to_string(), entry);
        self.mark_dirty();
    }

    /// Returns the value if present and unexpired. Expired entries are removed.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now_ms();
        {
            let entries = self.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.is_valid(now) => return Some(entry.payload.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.write();
        if entries.get(key).is_some_and(|e| !e.is_valid(now)) {
            entries.remove(key);
            drop(entries);
            debug!(key, "evicted expired cache entry");
            self.mark_dirty();
        }
        None
    }

    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.read().get(key).is_some_and(|e| e.is_valid(now))
    }

    /// Removes a single entry. Returns whether it existed.
    pub fn clear(&self, key: &str) -> bool {
        let removed = self.write().remove(key).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    /// Removes every entry whose key starts with `prefix`. Returns how many were removed.
    pub fn clear_by_prefix(&self, prefix: &str) -> usize {
        let removed = {
            let mut entries = self.write();
            let before = entries.len();
            entries.retain(|key, _| !key.starts_with(prefix));
            before - entries.len()
        };
        if removed > 0 {
            info!("Cleared {removed} cache entries with prefix '{prefix}'");
            self.mark_dirty();
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now_ms();
        let entries = self.read();
        let expired_entries = entries.values().filter(|e| !e.is_valid(now)).count();
        CacheStats {
            total_entries: entries.len(),
            expired_entries,
            active_entries: entries.len() - expired_entries,
        }
    }

    /// Purges every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let removed = {
            let mut entries = self.write();
            let before = entries.len();
            entries.retain(|_, entry| entry.is_valid(now));
            before - entries.len()
        };
        if removed > 0 {
            self.mark_dirty();
        }
        removed
    }

    /// Returns the cached value for `key`, or runs `compute`, caches its
    /// result for `ttl` and returns it. Errors from `compute` propagate
    /// unchanged and nothing is cached.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key) {
            match serde_json::from_value::<T>(value) {
                Ok(data) => {
                    debug!(key, "cache hit");
                    return Ok(Cached {
                        data,
                        from_cache: true,
                    });
                }
                Err(e) => warn!(key, "cached payload no longer decodes, recomputing: {e}"),
            }
        }

        debug!(key, "cache miss");
        let data = compute().await?;

        match serde_json::to_value(&data) {
            Ok(value) => self.set(key, value, ttl),
            Err(e) => warn!(key, "result not cacheable: {e}"),
        }

        Ok(Cached {
            data,
            from_cache: false,
        })
    }

    /// Runs `sweep` every `interval` until the returned task is aborted.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    info!("Cache sweep removed {removed} expired entries");
                }
            }
        })
    }

    /// Flushes pending writes and stops the flusher. Later mutations stay in memory only.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.flush_tx.send(FlushSignal::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        let handle = self
            .flusher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn mark_dirty(&self) {
        if self.flush_tx.send(FlushSignal::Dirty).is_err() {
            debug!("cache flusher stopped; change kept in memory only");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_flusher(
    entries: EntryMap,
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<FlushSignal>,
) {
    while let Some(signal) = rx.recv().await {
        if let FlushSignal::Shutdown(ack) = signal {
            let _ = ack.send(());
            return;
        }

        // Cancel-and-reschedule: each new Dirty restarts the quiet period.
        let ack = loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => break None,
                signal = rx.recv() => match signal {
                    Some(FlushSignal::Dirty) => continue,
                    Some(FlushSignal::Shutdown(ack)) => break Some(ack),
                    None => break None,
                },
            }
        };

        flush(&entries, backend.as_ref(), clock.as_ref()).await;

        if let Some(ack) = ack {
            let _ = ack.send(());
            return;
        }
    }
}

async fn flush(entries: &EntryMap, backend: &dyn CacheBackend, clock: &dyn Clock) {
    let now = clock.now_ms();
    let snapshot: PersistedMap = entries
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|(_, entry)| entry.is_valid(now))
        .map(|(key, entry)| {
            (
                key.clone(),
                PersistedEntry {
                    data: entry.payload.clone(),
                    timestamp: entry.created_at,
                    ttl: entry.ttl_ms,
                },
            )
        })
        .collect();

    match backend.write_all(&snapshot).await {
        Ok(()) => debug!("Persisted {} cache entries", snapshot.len()),
        Err(e) => warn!("Failed to persist AI cache: {e}"),
    }
}
