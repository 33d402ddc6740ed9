//! Value publication and installation.
//!
//! # Responsibility
//! - Merge an atom's value map into its extended object and republish.
//! - Install decoded values back onto atoms on the read paths.
//!
//! # Invariants
//! - The default truth pair under the truth key is never published.
//! - Republication preserves value entries that are not being overwritten:
//!   the CAS object is immutable, so one changed key rewrites the whole
//!   object.

use super::stats::Stats;
use super::StoreCore;
use crate::cas::{CasClient, CasError};
use crate::codec::{self, AtomObject};
use crate::error::{StoreError, StoreResult};
use crate::model::atom::Atom;
use std::collections::BTreeMap;
use std::sync::Arc;

impl StoreCore {
    /// Publishes all values of `atom`, skipping the suppressed default truth.
    pub(crate) fn store_atom_values(
        &self,
        conn: &dyn CasClient,
        atom: &Arc<Atom>,
    ) -> StoreResult<()> {
        let mut entries = BTreeMap::new();
        for (key_atom, value) in atom.value_entries() {
            if *key_atom == *self.truth_key && value.is_default_truth() {
                continue;
            }
            entries.insert(key_atom.to_string(), codec::value_text(&value));
            Stats::bump(&self.stats.valuation_stores);
        }
        if entries.is_empty() {
            return Ok(());
        }

        let key = atom.to_string();
        let mut object = self.current_object(conn, &key)?;
        object.merge_values(entries);

        let acid = conn.dag_put(&object.to_json()?)?;
        self.registry.cache_object(key.clone(), object);
        self.registry.record_acid(key.clone(), acid.clone());
        self.root.attach(conn, &key, &acid)?;

        Stats::bump(&self.stats.value_stores);
        Ok(())
    }

    /// Current extended object of an atom: the cache, or the workspace when
    /// the cache is cold.
    pub(crate) fn current_object(
        &self,
        conn: &dyn CasClient,
        text_key: &str,
    ) -> StoreResult<AtomObject> {
        if let Some(object) = self.registry.cached_object(text_key) {
            return Ok(object);
        }
        let root = self.root.require()?;
        match conn.dag_get(&format!("{root}/{text_key}")) {
            Ok(json) => AtomObject::from_json(json),
            Err(CasError::NotFound(_)) => Err(StoreError::NotFound(text_key.to_string())),
            Err(other) => Err(other.into()),
        }
    }

    /// Installs the `values` mapping of a decoded object onto `atom`.
    pub(crate) fn install_values(&self, atom: &Arc<Atom>, object: &AtomObject) -> StoreResult<()> {
        if let Some(values) = &object.values {
            for (key_text, value_text) in values {
                let key_atom = codec::parse_atom(key_text, &self.types)?;
                let value = codec::parse_value(value_text)?;
                atom.set_value(key_atom, value);
            }
        }
        Ok(())
    }
}
