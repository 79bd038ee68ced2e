//! In-memory watchlist store
//!
//! Single source of truth for current watchlist state. Reloads replace the
//! whole set and bump the generation; refresh write-back is applied per
//! completed batch and only against the generation it was read from.

use super::{Watchlist, WatchlistEntry};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

/// Point-in-time copy of the store
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub generation: u64,
    pub watchlists: Vec<Watchlist>,
}

impl StoreSnapshot {
    pub fn total_entries(&self) -> usize {
        self.watchlists.iter().map(|w| w.entries.len()).sum()
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    generation: u64,
    watchlists: Vec<Watchlist>,
}

/// Shared mapping from watchlist name to its entries
#[derive(Debug, Default)]
pub struct WatchlistStore {
    inner: RwLock<StoreInner>,
}

impl WatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every watchlist plus the current generation
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read();
        StoreSnapshot {
            generation: inner.generation,
            watchlists: inner.watchlists.clone(),
        }
    }

    /// Copy of one watchlist with the generation it belongs to
    pub fn get(&self, name: &str) -> Option<(u64, Watchlist)> {
        let inner = self.inner.read();
        inner
            .watchlists
            .iter()
            .find(|w| w.name == name)
            .map(|w| (inner.generation, w.clone()))
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.read().watchlists.iter().map(|w| w.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().watchlists.is_empty()
    }

    /// Replace the whole store; returns the new generation
    pub fn replace_all(&self, watchlists: Vec<Watchlist>) -> u64 {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.watchlists = watchlists;
        tracing::info!(
            "Watchlist store replaced: generation {}, {} watchlists",
            inner.generation,
            inner.watchlists.len()
        );
        inner.generation
    }

    /// Merge one completed batch of results into a watchlist.
    ///
    /// Only `current_price` and `status` are copied, matched by scrip name.
    /// Returns false (and applies nothing) when the store was reloaded since
    /// `generation` was read or the watchlist no longer exists.
    pub fn apply_batch(&self, name: &str, generation: u64, results: &[WatchlistEntry]) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            tracing::warn!(
                "Discarding stale results for '{}' (generation {} != {})",
                name,
                generation,
                inner.generation
            );
            return false;
        }

        let Some(watchlist) = inner.watchlists.iter_mut().find(|w| w.name == name) else {
            tracing::warn!("Discarding results for removed watchlist '{}'", name);
            return false;
        };

        let updates: HashMap<&str, &WatchlistEntry> =
            results.iter().map(|e| (e.scrip_name.as_str(), e)).collect();

        for entry in watchlist.entries.iter_mut() {
            if let Some(update) = updates.get(entry.scrip_name.as_str()) {
                entry.current_price = update.current_price;
                entry.status = update.status;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchlist::{Status, DEFAULT_SUFFIX};

    fn demo() -> Watchlist {
        Watchlist::new(
            "Demo",
            vec![
                WatchlistEntry::new("RELIANCE", 3000.0, DEFAULT_SUFFIX),
                WatchlistEntry::new("TCS", 4000.0, DEFAULT_SUFFIX),
            ],
        )
    }

    #[test]
    fn test_replace_bumps_generation() {
        let store = WatchlistStore::new();
        assert!(store.is_empty());
        assert_eq!(store.replace_all(vec![demo()]), 1);
        assert_eq!(store.names(), vec!["Demo".to_string()]);
        assert_eq!(store.replace_all(Vec::new()), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_apply_batch_updates_price_and_status_only() {
        let store = WatchlistStore::new();
        let generation = store.replace_all(vec![demo()]);

        let mut update = WatchlistEntry::new("TCS", 1.0, DEFAULT_SUFFIX);
        update.set_price(4100.0, Status::TargetHit);
        assert!(store.apply_batch("Demo", generation, &[update]));

        let (_, watchlist) = store.get("Demo").unwrap();
        assert_eq!(watchlist.entries[0].status, Status::NotFetched);
        assert_eq!(watchlist.entries[1].status, Status::TargetHit);
        assert_eq!(watchlist.entries[1].current_price, Some(4100.0));
        assert_eq!(watchlist.entries[1].target_price, 4000.0);
    }

    #[test]
    fn test_apply_batch_rejects_stale_generation() {
        let store = WatchlistStore::new();
        let stale = store.replace_all(vec![demo()]);
        store.replace_all(vec![demo()]);

        let mut update = WatchlistEntry::new("TCS", 4000.0, DEFAULT_SUFFIX);
        update.set_price(4100.0, Status::TargetHit);
        assert!(!store.apply_batch("Demo", stale, &[update]));

        let (_, watchlist) = store.get("Demo").unwrap();
        assert_eq!(watchlist.entries[1].status, Status::NotFetched);
    }
}
