//! Time-bounded result cache
//!
//! Entries are keyed by the normalized issue text. An entry older than the
//! TTL is a miss and is evicted when read. The map is capped at
//! `max_entries`; a full map purges expired entries first and then drops the
//! oldest entry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use triage_core::{ClassificationResult, Clock};

/// A cached classification
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub computed_at: Instant,
    pub result: ClassificationResult,
}

/// Thread-safe TTL cache for classification results
#[derive(Debug)]
pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    /// Create a new empty cache
    pub fn new(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            clock,
        }
    }

    /// Look up a fresh result
    pub fn get(&self, key: &str) -> Option<ClassificationResult> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if self.is_fresh(entry, now) => Some(entry.result.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a result, replacing any previous entry for the key
    pub fn put(&self, key: impl Into<String>, result: ClassificationResult) {
        let key = key.into();
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            entries.retain(|_, entry| now.saturating_duration_since(entry.computed_at) <= self.ttl);

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.computed_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                computed_at: now,
                result,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.computed_at) <= self.ttl);
        before - entries.len()
    }

    /// Number of stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove all entries
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.computed_at) <= self.ttl
    }
}
