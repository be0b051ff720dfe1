//! Session registry of discovered games.
//!
//! Tracks every game ID a page request was seen for, and the canonical name
//! of each game once it has been scraped from its page. Names are
//! first-write-wins: the check and the insert happen under one write lock,
//! so concurrent extractions for the same ID cannot both succeed.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::RwLock;

use crate::classifier::ResourceId;

/// Canonical game name: trimmed, lowercase, spaces replaced by underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName(String);

impl ResourceName {
    /// Canonicalizes a human-readable title, e.g. `"Meerca Chase"` -> `meerca_chase`.
    ///
    /// Returns `None` for blank titles.
    pub fn from_title(title: &str) -> Option<Self> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_lowercase().replace(' ', "_")))
    }

    /// Placeholder used while a game's name is still unknown.
    pub fn placeholder(id: &ResourceId) -> Self {
        Self(format!("unknown_game_{}", id))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discovered games and their resolved names.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    seen: RwLock<HashSet<ResourceId>>,
    names: RwLock<HashMap<ResourceId, ResourceName>>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an ID as seen. Returns `true` if it had already been seen.
    pub fn record_seen(&self, id: &ResourceId) -> bool {
        !self.seen.write().insert(id.clone())
    }

    /// Returns whether an ID has been seen.
    pub fn is_seen(&self, id: &ResourceId) -> bool {
        self.seen.read().contains(id)
    }

    /// Returns the resolved name for an ID.
    pub fn name_for(&self, id: &ResourceId) -> Option<ResourceName> {
        self.names.read().get(id).cloned()
    }

    /// Returns the resolved name, or the `unknown_game_<id>` placeholder.
    pub fn display_name(&self, id: &ResourceId) -> ResourceName {
        self.name_for(id)
            .unwrap_or_else(|| ResourceName::placeholder(id))
    }

    /// Returns whether a name has been recorded for an ID.
    pub fn has_name(&self, id: &ResourceId) -> bool {
        self.names.read().contains_key(id)
    }

    /// Stores a name if the ID has none yet. Returns `true` if stored.
    pub fn record_name(&self, id: &ResourceId, name: ResourceName) -> bool {
        match self.names.write().entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(name);
                true
            }
        }
    }

    /// Number of distinct IDs seen.
    pub fn seen_count(&self) -> usize {
        self.seen.read().len()
    }

    /// All seen IDs, sorted.
    pub fn seen_ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<_> = self.seen.read().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// All resolved names, sorted by ID.
    pub fn names(&self) -> Vec<(ResourceId, ResourceName)> {
        let mut names: Vec<_> = self
            .names
            .read()
            .iter()
            .map(|(id, name)| (id.clone(), name.clone()))
            .collect();
        names.sort();
        names
    }
}
