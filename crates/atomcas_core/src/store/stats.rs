//! Performance counters.
//!
//! # Responsibility
//! - Count loads, stores, value updates, fetches and removals monotonically.
//! - Offer one lifetime reset point shared with the write-back queue clock.
//!
//! # Invariants
//! - Counters are relaxed atomics; they order nothing and may lag a reader
//!   by in-flight operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

/// Monotonic backend counters.
pub struct Stats {
    pub(crate) load_count: AtomicU64,
    pub(crate) store_count: AtomicU64,
    pub(crate) valuation_stores: AtomicU64,
    pub(crate) value_stores: AtomicU64,
    pub(crate) num_get_nodes: AtomicU64,
    pub(crate) num_got_nodes: AtomicU64,
    pub(crate) num_get_links: AtomicU64,
    pub(crate) num_got_links: AtomicU64,
    pub(crate) num_get_insets: AtomicU64,
    pub(crate) num_get_inlinks: AtomicU64,
    pub(crate) num_atom_removes: AtomicU64,
    pub(crate) num_atom_deletes: AtomicU64,
    since: Mutex<Instant>,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub load_count: u64,
    pub store_count: u64,
    pub valuation_stores: u64,
    pub value_stores: u64,
    pub num_get_nodes: u64,
    pub num_got_nodes: u64,
    pub num_get_links: u64,
    pub num_got_links: u64,
    pub num_get_insets: u64,
    pub num_get_inlinks: u64,
    pub num_atom_removes: u64,
    pub num_atom_deletes: u64,
    pub seconds_since_reset: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self {
            load_count: AtomicU64::new(0),
            store_count: AtomicU64::new(0),
            valuation_stores: AtomicU64::new(0),
            value_stores: AtomicU64::new(0),
            num_get_nodes: AtomicU64::new(0),
            num_got_nodes: AtomicU64::new(0),
            num_get_links: AtomicU64::new(0),
            num_got_links: AtomicU64::new(0),
            num_get_insets: AtomicU64::new(0),
            num_get_inlinks: AtomicU64::new(0),
            num_atom_removes: AtomicU64::new(0),
            num_atom_deletes: AtomicU64::new(0),
            since: Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub(crate) fn clear(&self) {
        for counter in [
            &self.load_count,
            &self.store_count,
            &self.valuation_stores,
            &self.value_stores,
            &self.num_get_nodes,
            &self.num_got_nodes,
            &self.num_get_links,
            &self.num_got_links,
            &self.num_get_insets,
            &self.num_get_inlinks,
            &self.num_atom_removes,
            &self.num_atom_deletes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.since.lock() = Instant::now();
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            load_count: self.load_count.load(Ordering::Relaxed),
            store_count: self.store_count.load(Ordering::Relaxed),
            valuation_stores: self.valuation_stores.load(Ordering::Relaxed),
            value_stores: self.value_stores.load(Ordering::Relaxed),
            num_get_nodes: self.num_get_nodes.load(Ordering::Relaxed),
            num_got_nodes: self.num_got_nodes.load(Ordering::Relaxed),
            num_get_links: self.num_get_links.load(Ordering::Relaxed),
            num_got_links: self.num_got_links.load(Ordering::Relaxed),
            num_get_insets: self.num_get_insets.load(Ordering::Relaxed),
            num_get_inlinks: self.num_get_inlinks.load(Ordering::Relaxed),
            num_atom_removes: self.num_atom_removes.load(Ordering::Relaxed),
            num_atom_deletes: self.num_atom_deletes.load(Ordering::Relaxed),
            seconds_since_reset: self.since.lock().elapsed().as_secs(),
        }
    }
}
