//! Question aggregate cache.
//!
//! Advisory, process-local store of recently fetched question aggregates.
//! Coherence is driven entirely by callers: every mutation of a question
//! must be followed by [`QuestionCache::remove`]. There is no TTL.

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lru::LruCache;
use metrics::counter;
use tracing::{debug, warn};

use crate::domain::entities::QuestionAggregate;

use super::config::CacheConfig;
use super::{METRIC_CACHE_EVICT_TOTAL, METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL};

const SOURCE: &str = "cache::store";

/// Bounded LRU cache of question aggregates keyed by question id.
///
/// Every operation takes the single internal lock for its full duration, so
/// concurrent callers observe each call atomically and the last `set` for a
/// key wins. Aggregates are stored behind `Arc` and never mutated in place.
pub struct QuestionCache {
    entries: RwLock<Entries>,
}

type Entries = LruCache<i32, Arc<QuestionAggregate>>;

impl QuestionCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_capacity(config.question_limit_non_zero())
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Look up a cached aggregate. A hit marks the entry as most recently used.
    pub fn get(&self, question_id: i32) -> Option<Arc<QuestionAggregate>> {
        let cached = self.write_entries("get")
            .get(&question_id)
            .cloned();

        if cached.is_some() {
            counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
        } else {
            counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
        }
        cached
    }

    /// Insert or overwrite the entry for `aggregate.question_id`, evicting the
    /// least recently used entry when a new key arrives at capacity.
    pub fn set(&self, aggregate: impl Into<Arc<QuestionAggregate>>) {
        let aggregate = aggregate.into();
        let question_id = aggregate.question_id;

        let displaced = self.write_entries("set").push(question_id, aggregate);

        // `push` also hands back the previous value when the key was replaced
        if let Some((evicted_id, _)) = displaced.filter(|(key, _)| *key != question_id) {
            counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
            debug!(
                target = SOURCE,
                evicted_id, question_id, "Evicted question aggregate"
            );
        }
    }

    /// Drop the entry for `question_id`. Removing an absent key is a no-op.
    pub fn remove(&self, question_id: i32) {
        self.write_entries("remove").pop(&question_id);
    }

    pub fn clear(&self) {
        self.write_entries("clear").clear();
    }

    /// Get the number of cached aggregates.
    pub fn len(&self) -> usize {
        self.read_entries("len").len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.read_entries("capacity").cap()
    }

    fn read_entries(&self, op: &'static str) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!(
                target = SOURCE,
                op, "Reading question cache after a writer panicked"
            );
            poisoned.into_inner()
        })
    }

    /// A writer that panicked may have left an aggregate half replaced, so
    /// recovery drops every entry and lets reads repopulate from the store.
    fn write_entries(&self, op: &'static str) -> RwLockWriteGuard<'_, Entries> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                let dropped = guard.len();
                guard.clear();
                self.entries.clear_poison();
                warn!(
                    target = SOURCE,
                    op, dropped, "Question cache lock poisoned, entries dropped"
                );
                guard
            }
        }
    }
}
