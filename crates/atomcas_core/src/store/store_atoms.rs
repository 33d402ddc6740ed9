//! Writer body: recursive atom storage.
//!
//! # Responsibility
//! - Publish minimal atom objects children-first so every link encodes over
//!   existing child GUIDs.
//! - Attach each stored atom's extended object to the workspace and update
//!   the incoming sets of its children.
//!
//! # Invariants
//! - A GUID is assigned on first publication and never replaced.
//! - Within one writer the order child-publish → self-publish →
//!   incoming-update → value-publish is strict.
//! - Racing writers on the same atom both publish the same bytes and obtain
//!   the same GUID; the race is benign.

use super::stats::Stats;
use super::StoreCore;
use crate::cas::CasClient;
use crate::codec::AtomObject;
use crate::error::StoreResult;
use crate::model::atom::Atom;
use log::info;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const BULK_PROGRESS_EVERY: u64 = 100;

impl StoreCore {
    /// Full writer body: store the atom (and closure), then its values.
    pub(crate) fn store_with_values(
        &self,
        conn: &dyn CasClient,
        atom: &Arc<Atom>,
    ) -> StoreResult<()> {
        self.do_store_atom(conn, atom)?;
        self.store_atom_values(conn, atom)?;
        Ok(())
    }

    /// Stores one atom recursively and returns its GUID.
    pub(crate) fn do_store_atom(
        &self,
        conn: &dyn CasClient,
        atom: &Arc<Atom>,
    ) -> StoreResult<String> {
        let key = atom.to_string();

        let guid = match self.registry.guid_of(&key) {
            Some(existing) => existing,
            None => {
                if let Some(outgoing) = atom.link_outgoing() {
                    for child in outgoing {
                        self.do_store_atom(conn, child)?;
                    }
                }
                self.store_one(conn, atom, &key)?
            }
        };

        // The extended object of a fresh atom is the minimal object, so the
        // first ACID equals the GUID.
        let acid = self.registry.acid_of(&key).unwrap_or_else(|| guid.clone());
        self.root.attach(conn, &key, &acid)?;
        self.registry.record_acid(key, acid);

        if let Some(outgoing) = atom.link_outgoing() {
            for child in outgoing {
                self.store_incoming_of(conn, child, &guid)?;
            }
        }

        Ok(guid)
    }

    /// Publishes the minimal object of a single atom; children are not
    /// touched and must already have GUIDs.
    fn store_one(&self, conn: &dyn CasClient, atom: &Arc<Atom>, key: &str) -> StoreResult<String> {
        let object = AtomObject::minimal(atom, &mut |child| {
            self.registry.guid_of(&child.to_string())
        })?;
        let guid = conn.dag_put(&object.to_json()?)?;

        self.registry.record_guid(key.to_string(), guid.clone());
        self.registry.record_decoded(guid.clone(), Arc::clone(atom));
        self.registry.cache_object(key.to_string(), object);

        Stats::bump(&self.stats.store_count);
        self.log_bulk_progress();
        Ok(guid)
    }

    /// Computes the GUID of an atom without touching the workspace.
    ///
    /// Publishing the minimal object is idempotent, so this is safe on the
    /// read and delete paths when the cache is cold.
    pub(crate) fn guid_of_atom(
        &self,
        conn: &dyn CasClient,
        atom: &Arc<Atom>,
    ) -> StoreResult<String> {
        let key = atom.to_string();
        if let Some(guid) = self.registry.guid_of(&key) {
            return Ok(guid);
        }
        if let Some(outgoing) = atom.link_outgoing() {
            for child in outgoing {
                self.guid_of_atom(conn, child)?;
            }
        }
        let object = AtomObject::minimal(atom, &mut |child| {
            self.registry.guid_of(&child.to_string())
        })?;
        let guid = conn.dag_put(&object.to_json()?)?;
        self.registry.record_guid(key, guid.clone());
        Ok(guid)
    }

    fn log_bulk_progress(&self) {
        if !self.bulk_active.load(Ordering::Relaxed) {
            return;
        }
        let stored = self.stats.store_count.load(Ordering::Relaxed);
        if stored % BULK_PROGRESS_EVERY != 0 {
            return;
        }
        let elapsed = (*self.bulk_started.lock())
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let rate = if elapsed > 0.0 {
            stored as f64 / elapsed
        } else {
            0.0
        };
        info!(
            "event=bulk_store module=store status=progress stored={stored} rate_per_sec={rate:.0}"
        );
    }
}
