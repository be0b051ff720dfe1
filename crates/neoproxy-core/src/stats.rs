//! Session counters and the end-of-run summary.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by the pipeline hooks.
#[derive(Debug, Default)]
pub struct InterceptStats {
    injected: AtomicU64,
    cache_hits: AtomicU64,
    cache_stores: AtomicU64,
    rewrites: AtomicU64,
    names_resolved: AtomicU64,
}

/// Point-in-time copy of [`InterceptStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// SWF payloads served from the asset store.
    pub injected: u64,
    /// Play-flash requests answered from the response cache.
    pub cache_hits: u64,
    /// Play-flash responses written to the cache.
    pub cache_stores: u64,
    /// Requests redirected to the asset host.
    pub rewrites: u64,
    /// Game names scraped from pages.
    pub names_resolved: u64,
}

impl InterceptStats {
    pub(crate) fn record_injection(&self) {
        self.injected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_store(&self) {
        self.cache_stores.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rewrite(&self) {
        self.rewrites.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_name_resolved(&self) {
        self.names_resolved.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            injected: self.injected.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_stores: self.cache_stores.load(Ordering::Relaxed),
            rewrites: self.rewrites.load(Ordering::Relaxed),
            names_resolved: self.names_resolved.load(Ordering::Relaxed),
        }
    }
}

/// What the session discovered, for the shutdown report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSummary {
    /// Every game ID a page request was seen for, sorted.
    pub games_seen: Vec<String>,
    /// Resolved `(id, name)` pairs, sorted by ID.
    pub game_names: Vec<(String, String)>,
    /// Number of URLs in the response cache.
    pub cached_responses: usize,
    /// Counter values.
    pub stats: StatsSnapshot,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} games seen ({} named), {} cached responses, {} injected, {} cache hits, {} rewrites",
            self.games_seen.len(),
            self.game_names.len(),
            self.cached_responses,
            self.stats.injected,
            self.stats.cache_hits,
            self.stats.rewrites
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = InterceptStats::default();
        stats.record_injection();
        stats.record_cache_hit();
        stats.record_cache_hit();
        stats.record_rewrite();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.injected, 1);
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.rewrites, 1);
        assert_eq!(snapshot.cache_stores, 0);
    }

    #[test]
    fn summary_display() {
        let summary = SessionSummary {
            games_seen: vec!["500".into(), "772".into()],
            game_names: vec![("500".into(), "meerca_chase".into())],
            cached_responses: 3,
            stats: StatsSnapshot::default(),
        };
        let text = summary.to_string();
        assert!(text.starts_with("2 games seen (1 named), 3 cached responses"));
    }

    #[test]
    fn summary_serializes() {
        let summary = SessionSummary::default();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["cached_responses"], 0);
        assert!(json["games_seen"].as_array().unwrap().is_empty());
    }
}
