//! Identity registry: the cache of the three identifier relationships.
//!
//! # Responsibility
//! - Cache atom→GUID, atom→cached extended object, GUID→atom and atom→ACID.
//! - Key atom-side maps by the canonical textual form, so the registry holds
//!   no strong backpointers into the live hypergraph.
//!
//! # Invariants
//! - Each map has its own lock; no method ever holds two registry locks at
//!   once.
//! - Locks are released before any CAS I/O; callers copy what they need.
//! - The registry is a cache: every query must stay answerable from the
//!   workspace when the cache is cold.

use crate::codec::AtomObject;
use crate::model::atom::Atom;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct IdentityRegistry {
    /// text key → GUID, populated on first store.
    guids: Mutex<HashMap<String, String>>,
    /// text key → current extended object, populated on every write.
    objects: Mutex<HashMap<String, AtomObject>>,
    /// GUID → decoded atom, populated after every decode.
    decoded: Mutex<HashMap<String, Arc<Atom>>>,
    /// text key → current ACID, populated on every write.
    acids: Mutex<HashMap<String, String>>,
}

impl IdentityRegistry {
    pub(crate) fn new() -> Self {
        Self {
            guids: Mutex::new(HashMap::new()),
            objects: Mutex::new(HashMap::new()),
            decoded: Mutex::new(HashMap::new()),
            acids: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn guid_of(&self, text_key: &str) -> Option<String> {
        self.guids.lock().get(text_key).cloned()
    }

    pub(crate) fn record_guid(&self, text_key: String, guid: String) {
        self.guids.lock().insert(text_key, guid);
    }

    pub(crate) fn cached_object(&self, text_key: &str) -> Option<AtomObject> {
        self.objects.lock().get(text_key).cloned()
    }

    pub(crate) fn cache_object(&self, text_key: String, object: AtomObject) {
        self.objects.lock().insert(text_key, object);
    }

    pub(crate) fn atom_for_guid(&self, guid: &str) -> Option<Arc<Atom>> {
        self.decoded.lock().get(guid).cloned()
    }

    pub(crate) fn record_decoded(&self, guid: String, atom: Arc<Atom>) {
        self.decoded.lock().insert(guid, atom);
    }

    pub(crate) fn acid_of(&self, text_key: &str) -> Option<String> {
        self.acids.lock().get(text_key).cloned()
    }

    pub(crate) fn record_acid(&self, text_key: String, acid: String) {
        self.acids.lock().insert(text_key, acid);
    }

    /// Drops one atom from all four maps, one lock at a time.
    pub(crate) fn forget(&self, text_key: &str, guid: &str) {
        self.guids.lock().remove(text_key);
        self.objects.lock().remove(text_key);
        self.acids.lock().remove(text_key);
        self.decoded.lock().remove(guid);
    }

    /// Empties every map. Used by `kill_data`.
    pub(crate) fn clear(&self) {
        self.guids.lock().clear();
        self.objects.lock().clear();
        self.acids.lock().clear();
        self.decoded.lock().clear();
    }
}
