// Engine counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Shared counters updated by the engine driver and read by any handle.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    synthesis_requests: Arc<AtomicU64>,
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,
    cache_evictions: Arc<AtomicU64>,
    synthesis_failures: Arc<AtomicU64>,
    playback_failures: Arc<AtomicU64>,
    sentences_played: Arc<AtomicU64>,
    interrupts: Arc<AtomicU64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub synthesis_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
    pub cache_hit_rate: f64,
    pub synthesis_failures: u64,
    pub playback_failures: u64,
    pub sentences_played: u64,
    pub interrupts: u64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
            self.synthesis_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_eviction(&self) {
        self.cache_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_synthesis_failure(&self) {
        self.synthesis_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_playback_failure(&self) {
        self.playback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sentence_played(&self) {
        self.sentences_played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        (hits as f64 / total as f64) * 100.0
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            synthesis_requests: self.synthesis_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_evictions: self.cache_evictions.load(Ordering::Relaxed),
            cache_hit_rate: self.cache_hit_rate(),
            synthesis_failures: self.synthesis_failures.load(Ordering::Relaxed),
            playback_failures: self.playback_failures.load(Ordering::Relaxed),
            sentences_played: self.sentences_played.load(Ordering::Relaxed),
            interrupts: self.interrupts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_a_percentage() {
        let stats = EngineStats::new();
        assert_eq!(stats.cache_hit_rate(), 0.0);

        stats.record_lookup(true);
        stats.record_lookup(false);
        stats.record_lookup(false);
        stats.record_lookup(true);

        let snap = stats.snapshot();
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.cache_misses, 2);
        assert_eq!(snap.synthesis_requests, 2);
        assert!((snap.cache_hit_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn clones_share_counters() {
        let stats = EngineStats::new();
        let reader = stats.clone();
        stats.record_interrupt();
        stats.record_sentence_played();
        assert_eq!(reader.snapshot().interrupts, 1);
        assert_eq!(reader.snapshot().sentences_played, 1);
    }
}
