//! Canonical atom model.
//!
//! # Responsibility
//! - Represent typed nodes and links with structural identity.
//! - Carry the mutable key→value annotation map without letting it leak into
//!   equality, hashing or the canonical textual form.
//!
//! # Invariants
//! - The canonical textual form (`Display`) is a pure function of
//!   type+name / type+outgoing and round-trips through the codec parser.
//! - Node names are escaped in the textual form; `"` and `\` never appear
//!   unescaped inside the quotes, and `/` and `%` never appear raw at all.
//!   The textual key is used as one segment of a `WCID/<key>` workspace
//!   path, so a raw `/` would read as a path separator.

use super::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Node payload (a name) or link payload (an ordered outgoing set).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AtomBody {
    Node { name: String },
    Link { outgoing: Vec<Arc<Atom>> },
}

/// A typed, immutable vertex of the hypergraph.
///
/// Atoms are shared through `Arc`; the value map is interior-mutable because
/// annotations change while the atom's identity does not.
#[derive(Debug)]
pub struct Atom {
    type_name: String,
    body: AtomBody,
    values: RwLock<HashMap<String, (Arc<Atom>, Value)>>,
}

impl Atom {
    /// Creates a node atom.
    pub fn node(type_name: impl Into<String>, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.into(),
            body: AtomBody::Node { name: name.into() },
            values: RwLock::new(HashMap::new()),
        })
    }

    /// Creates a link atom over an ordered outgoing set.
    pub fn link(type_name: impl Into<String>, outgoing: Vec<Arc<Self>>) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.into(),
            body: AtomBody::Link { outgoing },
            values: RwLock::new(HashMap::new()),
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn body(&self) -> &AtomBody {
        &self.body
    }

    pub fn is_node(&self) -> bool {
        matches!(self.body, AtomBody::Node { .. })
    }

    pub fn is_link(&self) -> bool {
        matches!(self.body, AtomBody::Link { .. })
    }

    /// Node name, `None` for links.
    pub fn name(&self) -> Option<&str> {
        match &self.body {
            AtomBody::Node { name } => Some(name),
            AtomBody::Link { .. } => None,
        }
    }

    /// Outgoing set, `None` for nodes.
    pub fn link_outgoing(&self) -> Option<&[Arc<Atom>]> {
        match &self.body {
            AtomBody::Node { .. } => None,
            AtomBody::Link { outgoing } => Some(outgoing),
        }
    }

    pub fn arity(&self) -> usize {
        self.link_outgoing().map_or(0, |outgoing| outgoing.len())
    }

    /// Sets or replaces the annotation under `key`.
    pub fn set_value(&self, key: Arc<Atom>, value: Value) {
        self.values
            .write()
            .insert(key.to_string(), (key, value));
    }

    /// Returns the annotation under `key`, if any.
    pub fn value(&self, key: &Atom) -> Option<Value> {
        self.values
            .read()
            .get(&key.to_string())
            .map(|(_, value)| value.clone())
    }

    /// Snapshot of all (key, value) annotations.
    pub fn value_entries(&self) -> Vec<(Arc<Atom>, Value)> {
        self.values.read().values().cloned().collect()
    }

    pub fn has_values(&self) -> bool {
        !self.values.read().is_empty()
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.body == other.body
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.hash(state);
        self.body.hash(state);
    }
}

impl Display for Atom {
    /// Writes the canonical textual form: `(Type "name")` for nodes,
    /// `(Type child…)` for links, recursively.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.body {
            AtomBody::Node { name } => {
                write!(f, "({} \"{}\")", self.type_name, escape_name(name))
            }
            AtomBody::Link { outgoing } => {
                write!(f, "({}", self.type_name)?;
                for child in outgoing {
                    write!(f, " {child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn escape_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '/' => escaped.push_str("%2F"),
            '%' => escaped.push_str("%25"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Undoes the percent escapes of [`escape_name`]; quote escapes are handled
/// by the codec's quoted-string parser.
pub(crate) fn unescape_name(escaped: &str) -> String {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match &bytes[i..] {
            [b'%', b'2', b'F', ..] | [b'%', b'2', b'f', ..] => {
                out.push(b'/');
                i += 3;
            }
            [b'%', b'2', b'5', ..] => {
                out.push(b'%');
                i += 3;
            }
            _ => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| escaped.to_string())
}

#[cfg(test)]
mod tests {
    use super::{Atom, Value};
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(atom: &Atom) -> u64 {
        let mut hasher = DefaultHasher::new();
        atom.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equality_is_structural_and_ignores_values() {
        let a = Atom::node("ConceptNode", "x");
        let b = Atom::node("ConceptNode", "x");
        b.set_value(Atom::node("PredicateNode", "k"), Value::Float(vec![1.0]));
        assert_eq!(*a, *b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(*a, *Atom::node("ConceptNode", "y"));
        assert_ne!(*a, *Atom::node("PredicateNode", "x"));
    }

    #[test]
    fn link_equality_respects_outgoing_order() {
        let x = Atom::node("ConceptNode", "x");
        let y = Atom::node("ConceptNode", "y");
        let xy = Atom::link("ListLink", vec![x.clone(), y.clone()]);
        let yx = Atom::link("ListLink", vec![y, x]);
        assert_ne!(*xy, *yx);
    }

    #[test]
    fn textual_form_is_recursive() {
        let inner = Atom::link(
            "ListLink",
            vec![Atom::node("ConceptNode", "a"), Atom::node("ConceptNode", "b")],
        );
        let outer = Atom::link("EvaluationLink", vec![Atom::node("PredicateNode", "p"), inner]);
        assert_eq!(
            outer.to_string(),
            "(EvaluationLink (PredicateNode \"p\") (ListLink (ConceptNode \"a\") (ConceptNode \"b\")))"
        );
    }

    #[test]
    fn textual_form_escapes_quotes_and_backslashes() {
        let tricky = Atom::node("ConceptNode", "say \"hi\" \\ there");
        assert_eq!(
            tricky.to_string(),
            "(ConceptNode \"say \\\"hi\\\" \\\\ there\")"
        );
    }

    #[test]
    fn textual_form_percent_encodes_path_separators() {
        let tricky = Atom::node("ConceptNode", "dir/entry 100%");
        assert_eq!(tricky.to_string(), "(ConceptNode \"dir%2Fentry 100%25\")");
        assert!(!tricky.to_string().contains('/'));
        assert_eq!(super::unescape_name("dir%2Fentry 100%25"), "dir/entry 100%");
        assert_eq!(super::unescape_name("%252F"), "%2F");
    }

    #[test]
    fn value_round_trip_on_atom() {
        let atom = Atom::node("ConceptNode", "x");
        let key = Atom::node("PredicateNode", "k");
        assert!(atom.value(&key).is_none());
        atom.set_value(key.clone(), Value::Str(vec!["hello".to_string()]));
        assert_eq!(
            atom.value(&key),
            Some(Value::Str(vec!["hello".to_string()]))
        );
        atom.set_value(key.clone(), Value::Float(vec![2.0]));
        assert_eq!(atom.value(&key), Some(Value::Float(vec![2.0])));
        assert_eq!(atom.value_entries().len(), 1);
    }
}
