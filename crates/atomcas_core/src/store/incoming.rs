//! Incoming-set index maintenance.
//!
//! # Responsibility
//! - Record, inside each child's extended object, the GUIDs of the links
//!   that hold it.
//! - Answer incoming-set queries from the workspace, optionally filtered by
//!   type.
//!
//! # Invariants
//! - Adding a holder twice is a no-op; a GUID occurs at most once in any
//!   incoming set.
//! - Every incoming edit republishes the child and reattaches its new ACID
//!   to the workspace.

use super::stats::Stats;
use super::StoreCore;
use crate::cas::{CasClient, CasError};
use crate::codec::AtomObject;
use crate::error::{StoreError, StoreResult};
use crate::model::atom::Atom;
use std::sync::Arc;

impl StoreCore {
    /// Adds `holder_guid` to the incoming set of `child`.
    pub(crate) fn store_incoming_of(
        &self,
        conn: &dyn CasClient,
        child: &Arc<Atom>,
        holder_guid: &str,
    ) -> StoreResult<()> {
        let key = child.to_string();
        let mut object = self.current_object(conn, &key)?;
        if object.incoming_contains(holder_guid) {
            return Ok(());
        }
        object.add_incoming(holder_guid);

        let acid = conn.dag_put(&object.to_json()?)?;
        self.registry.cache_object(key.clone(), object);
        self.registry.record_acid(key.clone(), acid.clone());
        self.root.attach(conn, &key, &acid)?;
        Ok(())
    }

    /// Strips `holder_guid` from the incoming set of `child`.
    ///
    /// When the cache is cold the child's current ACID is found by walking
    /// the workspace link list.
    pub(crate) fn remove_incoming_of(
        &self,
        conn: &dyn CasClient,
        child: &Arc<Atom>,
        holder_guid: &str,
    ) -> StoreResult<()> {
        let key = child.to_string();
        let mut object = match self.registry.cached_object(&key) {
            Some(object) => object,
            None => {
                let root = self.root.require()?;
                let entry = conn
                    .list_links(&root)?
                    .into_iter()
                    .find(|link| link.name == key)
                    .ok_or_else(|| {
                        StoreError::InvariantViolation(format!(
                            "incoming update: workspace does not hold {key}"
                        ))
                    })?;
                AtomObject::from_json(conn.dag_get(&entry.cid)?)?
            }
        };

        if !object.incoming_contains(holder_guid) {
            return Ok(());
        }
        object.remove_incoming(holder_guid);

        let acid = conn.dag_put(&object.to_json()?)?;
        self.registry.cache_object(key.clone(), object);
        self.registry.record_acid(key.clone(), acid.clone());
        self.root.attach(conn, &key, &acid)?;
        Ok(())
    }

    /// Fetches the atoms whose GUIDs appear in `atom`'s incoming set,
    /// optionally keeping only those of one type.
    pub(crate) fn incoming_set(
        &self,
        conn: &dyn CasClient,
        atom: &Arc<Atom>,
        type_filter: Option<&str>,
    ) -> StoreResult<Vec<Arc<Atom>>> {
        let key = atom.to_string();
        let root = self.resolved_root(conn)?;
        Stats::bump(&self.stats.num_get_insets);

        let object = match conn.dag_get(&format!("{root}/{key}")) {
            Ok(json) => AtomObject::from_json(json)?,
            Err(CasError::NotFound(_)) => return Ok(Vec::new()),
            Err(other) => return Err(other.into()),
        };

        let mut holders = Vec::new();
        for guid in object.incoming.unwrap_or_default() {
            let holder = match self.registry.atom_for_guid(&guid) {
                Some(cached) => cached,
                None => self.fetch_atom(conn, &guid)?,
            };
            if let Some(wanted) = type_filter {
                if holder.type_name() != wanted {
                    continue;
                }
            }
            holders.push(holder);
        }
        Stats::add(&self.stats.num_get_inlinks, holders.len() as u64);
        Ok(holders)
    }
}
