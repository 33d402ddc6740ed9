//! Bulk store and typed-load surfaces.
//!
//! # Responsibility
//! - Push a whole collection of atoms through the write-back queue, nodes
//!   before links, with a rate line at the end.
//!
//! # Invariants
//! - Bulk storage ends with a full queue flush; accepted atoms are on the
//!   CAS when `store_bulk` returns.

use super::CasBackend;
use crate::error::{StoreError, StoreResult};
use crate::model::atom::Atom;
use crate::model::AtomSink;
use log::info;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

impl CasBackend {
    /// Stores every atom in `atoms`, nodes first so the link pass finds all
    /// child GUIDs warm.
    pub fn store_bulk(&self, atoms: &[Arc<Atom>]) -> StoreResult<()> {
        self.rethrow()?;
        let started = Instant::now();
        *self.core.bulk_started.lock() = Some(started);
        self.core.bulk_active.store(true, Ordering::Relaxed);

        for atom in atoms.iter().filter(|atom| atom.is_node()) {
            self.store_atom(atom, false)?;
        }
        for atom in atoms.iter().filter(|atom| atom.is_link()) {
            self.store_atom(atom, false)?;
        }
        let result = self.flush();

        self.core.bulk_active.store(false, Ordering::Relaxed);
        let secs = started.elapsed().as_secs_f64();
        let rate = if secs > 0.0 {
            atoms.len() as f64 / secs
        } else {
            0.0
        };
        info!(
            "event=bulk_store module=store status=done atoms={} secs={secs:.1} rate_per_sec={rate:.0}",
            atoms.len()
        );
        result
    }

    /// Loading all atoms of one type needs a type index the workspace object
    /// does not carry.
    pub fn load_type(&self, _sink: &dyn AtomSink, _type_name: &str) -> StoreResult<()> {
        self.rethrow()?;
        Err(StoreError::NotImplemented(
            "load by type: the workspace object has no type index",
        ))
    }
}
