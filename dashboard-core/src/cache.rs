use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::storage::Storage;

/// Cache validity window: five minutes, process-wide. There is no per-key
/// override and no capacity bound; the only eviction is lazy, on read.
pub const DEFAULT_TTL_MS: i64 = 5 * 60 * 1000;

/// Millisecond wall clock, injectable so tests can control expiry.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Persisted envelope: `{"data": <payload>, "storedAt": <epoch ms>}`.
/// This is the only on-disk format; `storedAt` is the wall-clock time of
/// the write and an entry is valid iff `now - storedAt < ttl`.
#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    data: Value,
    #[serde(rename = "storedAt")]
    stored_at: i64,
}

/// Time-boxed read-through cache over a durable string-keyed store.
///
/// Storage failures never reach callers: a failed write degrades the cache
/// to "always miss" for that key, a failed read is a miss. Keys are opaque;
/// callers build collision-free keys (`weather:<mode>:<normalized-id>`).
pub struct Cache {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
}

impl Cache {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>, ttl_ms: i64) -> Self {
        Self { storage, clock, ttl_ms }
    }

    /// Store `data` under `key`, overwriting any prior entry. Always
    /// succeeds from the caller's perspective.
    pub fn put(&self, key: &str, data: Value) {
        let entry = Entry { data, stored_at: self.clock.now_millis() };

        let encoded = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache entry");
                return;
            }
        };

        match self.storage.write(key, &encoded) {
            Ok(()) => debug!(key, "cache saved"),
            Err(e) => warn!(key, error = %e, "failed to save cache entry"),
        }
    }

    /// Return the stored payload if a live entry exists under `key`.
    ///
    /// Absent key, malformed entry and expired entry all come back as
    /// `None`; callers cannot (and must not try to) tell them apart. An
    /// expired entry is removed on the way out.
    pub fn get(&self, key: &str) -> Option<Value> {
        let raw = match self.storage.read(key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "failed to read cache entry");
                return None;
            }
        };

        let Some(raw) = raw else {
            debug!(key, "cache miss");
            return None;
        };

        // A malformed entry looks exactly like an absent one; it stays in
        // place until the next put overwrites it.
        let Ok(entry) = serde_json::from_str::<Entry>(&raw) else {
            debug!(key, "cache miss");
            return None;
        };

        let age_ms = self.clock.now_millis() - entry.stored_at;
        if age_ms < self.ttl_ms {
            debug!(key, age_ms, "cache hit");
            return Some(entry.data);
        }

        debug!(key, age_ms, "cache expired");
        if let Err(e) = self.storage.remove(key) {
            warn!(key, error = %e, "failed to evict expired cache entry");
        }
        None
    }
}
