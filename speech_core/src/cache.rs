//! Bounded text → audio cache.
//!
//! Entries are only ever read with `peek`, so the LRU order of the
//! underlying [`LruCache`] is pure insertion order and eviction removes the
//! oldest inserted clip. The cache outlives interrupts and turns; it is only
//! emptied when the engine is destroyed.
use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use crate::clip::AudioClip;

pub struct AudioCache {
    entries: LruCache<String, AudioClip>,
}

impl AudioCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up a clip without disturbing eviction order.
    pub fn get(&self, text: &str) -> Option<AudioClip> {
        self.entries.peek(text).cloned()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains(text)
    }

    /// Store a clip, returning the evicted entry if the cache was full.
    ///
    /// Re-inserting a text that is already cached keeps the original entry
    /// and its position.
    pub fn insert(&mut self, text: &str, clip: AudioClip) -> Option<(String, AudioClip)> {
        if self.contains(text) {
            return None;
        }
        let evicted = self.entries.push(text.to_string(), clip);
        if let Some((key, old)) = &evicted {
            debug!(evicted = %key, bytes = old.len(), "Evicted oldest cached clip");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Drop every entry, releasing the cached buffers.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
