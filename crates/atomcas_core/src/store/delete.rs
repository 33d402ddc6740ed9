//! Recursive delete protocol.
//!
//! # Responsibility
//! - Remove an atom from the workspace, refusing while links still hold it
//!   unless the caller asked for the recursive variant.
//! - Keep the incoming-set index consistent: removal of a link strips its
//!   GUID from every child.
//!
//! # Invariants
//! - Incoming-closure removal is post-order: holders disappear before the
//!   atom they hold.
//! - The removes/deletes counters move once per top-level call, never under
//!   recursion.
//! - An atom the cache claims present but the workspace cannot detach is an
//!   invariant violation, not a silent no-op.

use super::stats::Stats;
use super::StoreCore;
use crate::cas::{CasClient, CasError};
use crate::codec::AtomObject;
use crate::error::{StoreError, StoreResult};
use crate::model::atom::Atom;
use log::debug;
use std::sync::Arc;

impl StoreCore {
    /// Top-level removal entry point. The caller has already fenced the
    /// write-back queue.
    pub(crate) fn remove_atom(
        &self,
        conn: &dyn CasClient,
        atom: &Arc<Atom>,
        recursive: bool,
    ) -> StoreResult<()> {
        Stats::bump(&self.stats.num_atom_removes);
        if self.do_remove_atom(conn, atom, recursive)? {
            Stats::bump(&self.stats.num_atom_deletes);
        }
        Ok(())
    }

    /// Returns whether the atom was actually detached from the workspace.
    fn do_remove_atom(
        &self,
        conn: &dyn CasClient,
        atom: &Arc<Atom>,
        recursive: bool,
    ) -> StoreResult<bool> {
        let key = atom.to_string();

        let object = match self.registry.cached_object(&key) {
            Some(object) => Some(object),
            None => {
                let root = self.root.require()?;
                match conn.dag_get(&format!("{root}/{key}")) {
                    Ok(json) => Some(AtomObject::from_json(json)?),
                    // Not stored; nothing to remove.
                    Err(CasError::NotFound(_)) => None,
                    Err(other) => return Err(other.into()),
                }
            }
        };
        let Some(object) = object else {
            debug!("event=remove_atom module=store status=skipped atom={key} reason=not_stored");
            return Ok(false);
        };

        let incoming = object.incoming.unwrap_or_default();
        if !incoming.is_empty() && !recursive {
            debug!(
                "event=remove_atom module=store status=refused atom={key} holders={}",
                incoming.len()
            );
            return Ok(false);
        }

        // Post-order: the holders must be gone before this atom goes.
        for holder_guid in &incoming {
            let holder = match self.registry.atom_for_guid(holder_guid) {
                Some(cached) => cached,
                None => self.fetch_atom(conn, holder_guid)?,
            };
            self.do_remove_atom(conn, &holder, true)?;
        }

        let guid = self.guid_of_atom(conn, atom)?;
        if let Some(outgoing) = atom.link_outgoing() {
            for child in outgoing {
                self.remove_incoming_of(conn, child, &guid)?;
            }
        }

        self.registry.forget(&key, &guid);

        match self.root.detach(conn, &key) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Err(StoreError::InvariantViolation(format!(
                "workspace claims to hold {key} but detach found no such link"
            ))),
            Err(other) => Err(other),
        }
    }
}
