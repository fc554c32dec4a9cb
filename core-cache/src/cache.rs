//! # Ephemeral Cache
//!
//! Two-tier time-boxed cache for volatile lookups.
//!
//! ## Overview
//!
//! Reads check the in-memory tier first; a miss falls through to the shared
//! durable [`LocalStore`] and, on a hit, re-populates the memory tier with a
//! fresh expiry. Writes land in memory synchronously and persist to the
//! durable tier fire-and-forget; a persistence failure is logged, never
//! surfaced to the caller.
//!
//! Expiry is checked on every read, so an entry is never served stale even
//! when the background sweep has not run yet. The sweep is purely a memory
//! reclamation pass.

use bridge_traits::LocalStore;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

/// Key prefix separating cache entries from other durable-store keys.
const STORE_PREFIX: &str = "cache:";

/// Default interval of the expired-entry sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-call cache options.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Time-to-live applied on set and on durable-tier re-population
    pub ttl: Duration,
    /// Optional key namespace; namespaced keys are stored as `"<ns>:<key>"`
    pub namespace: Option<String>,
}

impl CacheOptions {
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn qualified_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{key}"),
            None => key.to_string(),
        }
    }
}

struct MemoryEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Durable-tier envelope; expiry travels with the value so a restarted
/// process cannot resurrect stale data.
#[derive(Serialize, Deserialize)]
struct DurableEntry {
    value: serde_json::Value,
    expires_at_ms: i64,
}

/// Two-tier TTL cache with a periodic memory sweep.
pub struct EphemeralCache {
    memory: Arc<RwLock<HashMap<String, MemoryEntry>>>,
    store: Arc<dyn LocalStore>,
    sweep_interval: Duration,
    cancel: CancellationToken,
    sweep_task: StdMutex<Option<JoinHandle<()>>>,
}

impl EphemeralCache {
    pub fn new(store: Arc<dyn LocalStore>, sweep_interval: Duration) -> Self {
        Self {
            memory: Arc::new(RwLock::new(HashMap::new())),
            store,
            sweep_interval,
            cancel: CancellationToken::new(),
            sweep_task: StdMutex::new(None),
        }
    }

    /// Starts the background sweep. Calling twice is a no-op.
    pub fn start_sweep(&self) {
        let mut guard = self.sweep_task.lock().expect("sweep task lock poisoned");
        if guard.is_some() {
            return;
        }

        let memory = Arc::clone(&self.memory);
        let cancel = self.cancel.clone();
        let interval = self.sweep_interval;

        *guard = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let now = Instant::now();
                        let mut map = memory.write().await;
                        let before = map.len();
                        map.retain(|_, entry| entry.expires_at > now);
                        let evicted = before - map.len();
                        if evicted > 0 {
                            debug!(evicted, "cache sweep evicted expired entries");
                        }
                    }
                }
            }
        }));
    }

    /// Looks up `key`, falling through to the durable tier on a memory miss.
    ///
    /// Returns `Ok(None)` for absent and expired entries alike. A durable
    /// tier read failure is treated as a miss and logged.
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        options: &CacheOptions,
    ) -> Result<Option<T>> {
        let qualified = options.qualified_key(key);

        {
            let mut map = self.memory.write().await;
            match map.get(&qualified) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    let value = serde_json::from_value(entry.value.clone())
                        .map_err(|e| CacheError::Serialize(e.to_string()))?;
                    return Ok(Some(value));
                }
                Some(_) => {
                    // Expired: evict and fall through to the durable tier.
                    map.remove(&qualified);
                }
                None => {}
            }
        }

        let store_key = format!("{STORE_PREFIX}{qualified}");
        let raw = match self.store.get(&store_key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %qualified, error = %e, "durable cache read failed, treating as miss");
                return Ok(None);
            }
        };
        let Some(raw) = raw else {
            return Ok(None);
        };

        let entry: DurableEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %qualified, error = %e, "corrupt durable cache entry, dropping");
                self.delete_durable(store_key);
                return Ok(None);
            }
        };

        if entry.expires_at_ms <= Utc::now().timestamp_millis() {
            self.delete_durable(store_key);
            return Ok(None);
        }

        let value: T = serde_json::from_value(entry.value.clone())
            .map_err(|e| CacheError::Serialize(e.to_string()))?;

        // Durable hit: re-populate the memory tier with a fresh expiry.
        self.memory.write().await.insert(
            qualified,
            MemoryEntry {
                value: entry.value,
                expires_at: Instant::now() + options.ttl,
            },
        );

        Ok(Some(value))
    }

    /// Writes the memory tier synchronously, then persists fire-and-forget.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        options: &CacheOptions,
    ) -> Result<()> {
        let qualified = options.qualified_key(key);
        let value =
            serde_json::to_value(value).map_err(|e| CacheError::Serialize(e.to_string()))?;

        self.memory.write().await.insert(
            qualified.clone(),
            MemoryEntry {
                value: value.clone(),
                expires_at: Instant::now() + options.ttl,
            },
        );

        let entry = DurableEntry {
            value,
            expires_at_ms: Utc::now().timestamp_millis() + options.ttl.as_millis() as i64,
        };
        let store = Arc::clone(&self.store);
        let store_key = format!("{STORE_PREFIX}{qualified}");
        tokio::spawn(async move {
            let payload = match serde_json::to_string(&entry) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(key = %store_key, error = %e, "durable cache serialization failed");
                    return;
                }
            };
            if let Err(e) = store.set(&store_key, &payload).await {
                warn!(key = %store_key, error = %e, "durable cache persistence failed");
            }
        });

        Ok(())
    }

    /// Removes one entry from both tiers.
    pub async fn delete(&self, key: &str, namespace: Option<&str>) {
        let qualified = match namespace {
            Some(ns) => format!("{ns}:{key}"),
            None => key.to_string(),
        };
        self.memory.write().await.remove(&qualified);
        self.delete_durable(format!("{STORE_PREFIX}{qualified}"));
    }

    /// Removes every entry, or only one namespace's entries when given.
    pub async fn clear(&self, namespace: Option<&str>) {
        let mut map = self.memory.write().await;
        match namespace {
            Some(ns) => {
                let prefix = format!("{ns}:");
                map.retain(|key, _| !key.starts_with(&prefix));
            }
            None => map.clear(),
        }
        drop(map);

        let store = Arc::clone(&self.store);
        let prefix = match namespace {
            Some(ns) => format!("{STORE_PREFIX}{ns}:"),
            None => STORE_PREFIX.to_string(),
        };
        tokio::spawn(async move {
            if let Err(e) = store.remove_prefix(&prefix).await {
                warn!(prefix = %prefix, error = %e, "durable cache clear failed");
            }
        });
    }

    /// Number of live (unexpired) memory entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.memory
            .read()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stops the sweep task. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self
            .sweep_task
            .lock()
            .expect("sweep task lock poisoned")
            .take()
        {
            handle.abort();
        }
    }

    fn delete_durable(&self, store_key: String) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.delete(&store_key).await {
                warn!(key = %store_key, error = %e, "durable cache delete failed");
            }
        });
    }
}

impl Drop for EphemeralCache {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
