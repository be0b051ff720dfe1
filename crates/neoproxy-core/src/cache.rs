//! In-memory response cache for play-flash deduplication.
//!
//! Keyed by the exact request URL, query string included. Entries are only
//! written after a 200 response, are read back verbatim, and live for the
//! whole session; there is no eviction.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::flow::Headers;

/// A stored response body and its headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Response body as received.
    pub body: Bytes,
    /// Response headers as received.
    pub headers: Headers,
}

/// Exact-URL response cache.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CachedResponse>>,
}

impl ResponseCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry stored for this exact URL.
    pub fn lookup(&self, url: &str) -> Option<CachedResponse> {
        self.entries.read().get(url).cloned()
    }

    /// Stores an entry, replacing any previous one for the URL.
    pub fn store(&self, url: impl Into<String>, body: Bytes, headers: Headers) {
        self.entries
            .write()
            .insert(url.into(), CachedResponse { body, headers });
    }

    /// Number of cached URLs.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
