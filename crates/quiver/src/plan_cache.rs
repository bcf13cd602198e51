//! The prepared-plan cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use quiver_core::SymbolTable;
use quiver_query::plan::PlanRef;

struct CacheEntry {
    plan: PlanRef,
    table: SymbolTable,
    created: Instant,
}

/// Caches prepared plans by query text, with a per-entry lifetime.
///
/// A zero TTL disables the cache. The cache must be flushed whenever a
/// query creates an index: cached plans were chosen without it.
pub struct PlanCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl PlanCache {
    /// Creates a cache with the given entry lifetime in seconds.
    #[must_use]
    pub fn new(ttl_sec: u64) -> Self {
        Self { ttl: Duration::from_secs(ttl_sec), entries: Mutex::new(HashMap::new()) }
    }

    /// Looks up a live cached plan.
    #[must_use]
    pub fn get(&self, query: &str) -> Option<(PlanRef, SymbolTable)> {
        if self.ttl.is_zero() {
            return None;
        }
        let mut entries = self.entries.lock();
        match entries.get(query) {
            Some(entry) if entry.created.elapsed() < self.ttl => {
                Some((PlanRef::clone(&entry.plan), entry.table.clone()))
            }
            Some(_) => {
                entries.remove(query);
                None
            }
            None => None,
        }
    }

    /// Caches a prepared plan.
    pub fn insert(&self, query: impl Into<String>, plan: PlanRef, table: SymbolTable) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries
            .lock()
            .insert(query.into(), CacheEntry { plan, table, created: Instant::now() });
    }

    /// Drops every cached plan.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        if !entries.is_empty() {
            debug!(entries = entries.len(), "flushing plan cache");
        }
        entries.clear();
    }

    /// Returns the number of cached plans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
