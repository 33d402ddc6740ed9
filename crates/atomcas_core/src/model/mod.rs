//! Hypergraph domain model.
//!
//! # Responsibility
//! - Define the canonical atom and value shapes the codec and store consume.
//! - Keep the seam to the in-memory hypergraph narrow (`AtomSink`).
//!
//! # Invariants
//! - Atom identity is structural: type+name for nodes, type+outgoing for
//!   links. Value annotations never participate in identity.
//! - `AtomTable` holds at most one atom per canonical textual form.

pub mod atom;
pub mod types;
pub mod value;

use atom::Atom;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Receiver for atoms materialized out of a workspace.
///
/// The live hypergraph is an external collaborator; the backend only needs a
/// place to hand decoded atoms to, plus a flush point after a bulk load.
pub trait AtomSink: Send + Sync {
    /// Accepts one decoded atom. Duplicate admissions are allowed.
    fn admit(&self, atom: Arc<Atom>);
    /// Flushes any deferred insertion. Called once after a workspace load.
    fn barrier(&self);
}

/// Minimal in-memory atom container keyed by canonical textual form.
///
/// Stands in for the external hypergraph in tests and demos.
#[derive(Default)]
pub struct AtomTable {
    atoms: Mutex<HashMap<String, Arc<Atom>>>,
}

impl AtomTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.atoms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.lock().is_empty()
    }

    pub fn contains(&self, atom: &Atom) -> bool {
        self.atoms.lock().contains_key(&atom.to_string())
    }

    pub fn get(&self, text_key: &str) -> Option<Arc<Atom>> {
        self.atoms.lock().get(text_key).cloned()
    }

    pub fn snapshot(&self) -> Vec<Arc<Atom>> {
        self.atoms.lock().values().cloned().collect()
    }
}

impl AtomSink for AtomTable {
    fn admit(&self, atom: Arc<Atom>) {
        self.atoms.lock().insert(atom.to_string(), atom);
    }

    fn barrier(&self) {}
}
