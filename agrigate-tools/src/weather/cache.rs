//! TTL cache for weather snapshots.
//!
//! One process-wide map behind a `parking_lot::RwLock`. Expiry is checked
//! on read; there is no background sweeper. Critical sections never span
//! I/O.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::WeatherSnapshot;

type CacheKey = (String, u32);

struct CachedEntry {
    snapshot: WeatherSnapshot,
    stored_at: Instant,
}

/// `(canonical_name, days)` → snapshot, expiring `ttl` after storage.
pub struct SnapshotCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CachedEntry>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh snapshot for the key, if any. Expired entries are evicted
    /// here rather than by a sweeper.
    pub fn get(&self, name: &str, days: u32) -> Option<WeatherSnapshot> {
        let key = (name.to_string(), days);
        {
            let entries = self.entries.read();
            match entries.get(&key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(entry.snapshot.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Entry exists but expired: evict under the write lock.
        self.entries.write().remove(&key);
        None
    }

    pub fn insert(&self, name: &str, days: u32, snapshot: WeatherSnapshot) {
        self.entries
            .write()
            .insert((name.to_string(), days), CachedEntry {
                snapshot,
                stored_at: Instant::now(),
            });
    }

    /// Administrative flush. Returns how many entries were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let dropped = entries.len();
        entries.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
