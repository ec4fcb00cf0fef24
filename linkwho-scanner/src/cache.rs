//! Single-flight memoization of introduction lookups.

use crate::revisions::Introduction;
use lru::LruCache;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Default number of (site, page, link) results kept in memory
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntroductionKey {
    pub site: String,
    pub title: String,
    pub link: String,
}

impl IntroductionKey {
    pub fn new(site: &str, title: &str, link: &str) -> Self {
        Self {
            site: site.to_string(),
            title: title.to_string(),
            link: link.to_string(),
        }
    }
}

/// Bounded cache where each key is computed by exactly one caller.
///
/// A key being computed lives in an in-flight map as a shared `OnceCell`.
/// Callers that arrive meanwhile wait on the same cell. Once the value is
/// ready it moves into the LRU, so only finished results are ever evicted.
/// An evicted key is simply computed again by the next caller.
pub struct IntroductionCache {
    entries: Mutex<Entries>,
}

struct Entries {
    finished: LruCache<IntroductionKey, Introduction>,
    in_flight: HashMap<IntroductionKey, Arc<OnceCell<Introduction>>>,
}

impl IntroductionCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(Entries {
                finished: LruCache::new(capacity),
                in_flight: HashMap::new(),
            }),
        }
    }

    /// Like [`IntroductionCache::new`], treating 0 as 1
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    pub async fn get_or_compute<F, Fut>(&self, key: IntroductionKey, compute: F) -> Introduction
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Introduction>,
    {
        // Hold the map lock only long enough to find or create the cell
        let cell = {
            let mut entries = self.entries.lock().await;
            if let Some(value) = entries.finished.get(&key) {
                return value.clone();
            }
            entries
                .in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let value = cell.get_or_init(compute).await.clone();

        // The first caller back retires the cell; a newer cell for the key is left alone
        let mut entries = self.entries.lock().await;
        if entries.in_flight.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            entries.in_flight.remove(&key);
            entries.finished.put(key, value.clone());
        }

        value
    }

    /// Completed result for `key`, if one is cached
    pub async fn get(&self, key: &IntroductionKey) -> Option<Introduction> {
        let entries = self.entries.lock().await;
        entries.finished.peek(key).cloned()
    }

    /// Finished plus in-flight entries
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.finished.len() + entries.in_flight.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for IntroductionCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
