//! Atom type registry.
//!
//! # Responsibility
//! - Classify type names into node kinds and link kinds.
//! - Allow embedders to register additional type names at runtime.
//!
//! # Invariants
//! - A type name maps to exactly one kind for the lifetime of the registry.
//! - Decoding an object whose type is absent from the registry is a codec
//!   error, never a silent default.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether a type names a named node or an ordered link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomKind {
    Node,
    Link,
}

/// Runtime mapping from type name to atom kind.
pub struct TypeRegistry {
    kinds: RwLock<HashMap<String, AtomKind>>,
}

const DEFAULT_NODE_TYPES: &[&str] = &[
    "Node",
    "Anchor",
    "AnchorNode",
    "Concept",
    "ConceptNode",
    "Number",
    "NumberNode",
    "Predicate",
    "PredicateNode",
    "Schema",
    "SchemaNode",
    "Type",
    "TypeNode",
    "Variable",
    "VariableNode",
];

const DEFAULT_LINK_TYPES: &[&str] = &[
    "Link",
    "And",
    "AndLink",
    "Evaluation",
    "EvaluationLink",
    "Execution",
    "ExecutionLink",
    "Implication",
    "ImplicationLink",
    "Inheritance",
    "InheritanceLink",
    "Lambda",
    "LambdaLink",
    "List",
    "ListLink",
    "Member",
    "MemberLink",
    "Not",
    "NotLink",
    "Or",
    "OrLink",
    "OrderedLink",
    "Set",
    "SetLink",
    "Similarity",
    "SimilarityLink",
    "State",
    "StateLink",
    "UnorderedLink",
];

impl TypeRegistry {
    /// Creates a registry seeded with the standard node and link types.
    pub fn with_defaults() -> Self {
        let mut kinds = HashMap::new();
        for name in DEFAULT_NODE_TYPES {
            kinds.insert((*name).to_string(), AtomKind::Node);
        }
        for name in DEFAULT_LINK_TYPES {
            kinds.insert((*name).to_string(), AtomKind::Link);
        }
        Self {
            kinds: RwLock::new(kinds),
        }
    }

    /// Registers one additional type name.
    pub fn register(&self, name: impl Into<String>, kind: AtomKind) {
        self.kinds.write().insert(name.into(), kind);
    }

    pub fn kind_of(&self, name: &str) -> Option<AtomKind> {
        self.kinds.read().get(name).copied()
    }

    pub fn is_node(&self, name: &str) -> bool {
        self.kind_of(name) == Some(AtomKind::Node)
    }

    pub fn is_link(&self, name: &str) -> bool {
        self.kind_of(name) == Some(AtomKind::Link)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
