//! Canonical encoding between atoms/values and CAS objects.
//!
//! # Responsibility
//! - Define the on-wire atom object (minimal and extended forms).
//! - Write and parse the canonical textual atom key and value forms.
//!
//! # Invariants
//! - The minimal atom object depends only on (type, name | child GUIDs) and
//!   serializes with sorted keys, so structurally equal atoms encode to
//!   byte-identical objects on any host.
//! - Floats use the shortest decimal that uniquely identifies the `f64`;
//!   textual round-trips are exact.
//! - Every parse failure is a `BadEncoding` error, never a panic.

use crate::error::{StoreError, StoreResult};
use crate::model::atom::{unescape_name, Atom, AtomBody};
use crate::model::types::{AtomKind, TypeRegistry};
use crate::model::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// On-wire atom object.
///
/// The minimal form (`type` + `name` or `outgoing`) publishes to the GUID;
/// the extended form adds `incoming` and `values` and publishes to an ACID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomObject {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<String, String>>,
}

impl AtomObject {
    /// Builds the minimal object for `atom`.
    ///
    /// `child_guid` must return the GUID of every child; children are stored
    /// before their parents, so a missing GUID is an invariant violation.
    pub fn minimal(
        atom: &Atom,
        child_guid: &mut dyn FnMut(&Arc<Atom>) -> Option<String>,
    ) -> StoreResult<Self> {
        let mut object = Self {
            type_name: atom.type_name().to_string(),
            name: None,
            outgoing: None,
            incoming: None,
            values: None,
        };
        match atom.body() {
            AtomBody::Node { name } => object.name = Some(name.clone()),
            AtomBody::Link { outgoing } => {
                let mut guids = Vec::with_capacity(outgoing.len());
                for child in outgoing {
                    let guid = child_guid(child).ok_or_else(|| {
                        StoreError::InvariantViolation(format!(
                            "child {child} has no GUID while encoding {atom}"
                        ))
                    })?;
                    guids.push(guid);
                }
                object.outgoing = Some(guids);
            }
        }
        Ok(object)
    }

    pub fn to_json(&self) -> StoreResult<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|err| StoreError::BadEncoding(format!("atom object encode failed: {err}")))
    }

    pub fn from_json(json: serde_json::Value) -> StoreResult<Self> {
        serde_json::from_value(json)
            .map_err(|err| StoreError::BadEncoding(format!("unparseable atom object: {err}")))
    }

    pub fn incoming_contains(&self, guid: &str) -> bool {
        self.incoming
            .as_ref()
            .is_some_and(|set| set.iter().any(|g| g == guid))
    }

    /// Adds `guid` to the incoming set, keeping the set sorted so repeated
    /// updates stay deterministic.
    pub fn add_incoming(&mut self, guid: &str) {
        let set = self.incoming.get_or_insert_with(Vec::new);
        if let Err(position) = set.binary_search_by(|g| g.as_str().cmp(guid)) {
            set.insert(position, guid.to_string());
        }
    }

    /// Removes `guid` from the incoming set; the field disappears entirely
    /// when the set empties.
    pub fn remove_incoming(&mut self, guid: &str) {
        if let Some(set) = self.incoming.as_mut() {
            set.retain(|g| g != guid);
            if set.is_empty() {
                self.incoming = None;
            }
        }
    }

    /// Merges new value entries over any existing ones, preserving entries
    /// not being overwritten.
    pub fn merge_values(&mut self, entries: BTreeMap<String, String>) {
        if entries.is_empty() {
            return;
        }
        self.values.get_or_insert_with(BTreeMap::new).extend(entries);
    }
}

/// Writes the textual form of a value: `(FloatValue …)`, `(StringValue …)`,
/// `(LinkValue …)` or `(SimpleTruthValue s c)`.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Float(items) => form("FloatValue", items.iter().map(|f| float_text(*f)).collect()),
        Value::Str(items) => form("StringValue", items.iter().map(|s| quote(s)).collect()),
        Value::List(items) => form("LinkValue", items.iter().map(value_text).collect()),
        Value::Truth {
            strength,
            confidence,
        } => format!(
            "(SimpleTruthValue {} {})",
            float_text(*strength),
            float_text(*confidence)
        ),
    }
}

/// Parses the textual form of a value.
pub fn parse_value(text: &str) -> StoreResult<Value> {
    let (group, rest) = split_group(text)?;
    if !rest.is_empty() {
        return Err(bad(text, "trailing input after value"));
    }
    parse_value_group(group)
}

/// Parses a canonical textual atom key back into an atom.
pub fn parse_atom(text: &str, types: &TypeRegistry) -> StoreResult<Arc<Atom>> {
    let (group, rest) = split_group(text)?;
    if !rest.is_empty() {
        return Err(bad(text, "trailing input after atom"));
    }
    parse_atom_group(group, types)
}

/// Shortest decimal form that uniquely identifies the `f64`.
pub fn float_text(value: f64) -> String {
    format!("{value}")
}

fn form(head: &str, items: Vec<String>) -> String {
    if items.is_empty() {
        format!("({head})")
    } else {
        format!("({head} {})", items.join(" "))
    }
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

fn parse_atom_group(group: &str, types: &TypeRegistry) -> StoreResult<Arc<Atom>> {
    let (head, tail) = open_form(group)?;
    match types.kind_of(head) {
        Some(AtomKind::Node) => {
            let (name, rest) = parse_quoted(tail)?;
            if !rest.is_empty() {
                return Err(bad(group, "trailing input after node name"));
            }
            Ok(Atom::node(head, unescape_name(&name)))
        }
        Some(AtomKind::Link) => {
            let mut outgoing = Vec::new();
            let mut remaining = tail;
            while !remaining.is_empty() {
                let (child, rest) = split_group(remaining)?;
                outgoing.push(parse_atom_group(child, types)?);
                remaining = rest;
            }
            Ok(Atom::link(head, outgoing))
        }
        None => Err(bad(group, &format!("unknown atom type `{head}`"))),
    }
}

fn parse_value_group(group: &str) -> StoreResult<Value> {
    let (head, tail) = open_form(group)?;
    match head {
        "FloatValue" => Ok(Value::Float(parse_floats(tail)?)),
        "StringValue" => {
            let mut items = Vec::new();
            let mut remaining = tail;
            while !remaining.is_empty() {
                let (item, rest) = parse_quoted(remaining)?;
                items.push(item);
                remaining = rest;
            }
            Ok(Value::Str(items))
        }
        "LinkValue" => {
            let mut items = Vec::new();
            let mut remaining = tail;
            while !remaining.is_empty() {
                let (nested, rest) = split_group(remaining)?;
                items.push(parse_value_group(nested)?);
                remaining = rest;
            }
            Ok(Value::List(items))
        }
        "SimpleTruthValue" => {
            let numbers = parse_floats(tail)?;
            match numbers.as_slice() {
                [strength, confidence] => Ok(Value::Truth {
                    strength: *strength,
                    confidence: *confidence,
                }),
                _ => Err(bad(group, "truth value needs exactly strength and confidence")),
            }
        }
        other => Err(bad(group, &format!("unknown value kind `{other}`"))),
    }
}

/// Splits off the first balanced parenthesized group, quote-aware.
fn split_group(text: &str) -> StoreResult<(&str, &str)> {
    let t = text.trim_start();
    if !t.starts_with('(') {
        return Err(bad(t, "expected `(`"));
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in t.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let end = i + c.len_utf8();
                    return Ok((&t[..end], t[end..].trim_start()));
                }
            }
            _ => {}
        }
    }
    Err(bad(t, "unbalanced parentheses"))
}

/// Splits a balanced `(Head tail)` group into head symbol and trimmed tail.
fn open_form(group: &str) -> StoreResult<(&str, &str)> {
    let inner = group
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| bad(group, "expected a parenthesized form"))?
        .trim();
    if inner.is_empty() {
        return Err(bad(group, "empty form"));
    }
    let head_end = inner
        .find(|c: char| c.is_whitespace())
        .unwrap_or(inner.len());
    let (head, tail) = inner.split_at(head_end);
    Ok((head, tail.trim_start()))
}

/// Parses one quoted string with `\"` and `\\` escapes; returns the rest.
fn parse_quoted(text: &str) -> StoreResult<(String, &str)> {
    let t = text.trim_start();
    let body = t
        .strip_prefix('"')
        .ok_or_else(|| bad(t, "expected a quoted string"))?;
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => {
                let rest = body[i + c.len_utf8()..].trim_start();
                return Ok((out, rest));
            }
            other => out.push(other),
        }
    }
    Err(bad(t, "unterminated quoted string"))
}

fn parse_floats(text: &str) -> StoreResult<Vec<f64>> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| bad(token, "invalid float literal"))
        })
        .collect()
}

fn bad(context: &str, message: &str) -> StoreError {
    let snippet: String = context.chars().take(80).collect();
    StoreError::BadEncoding(format!("{message} in `{snippet}`"))
}
