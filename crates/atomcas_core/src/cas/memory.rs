//! Process-local CAS used by tests and demos.
//!
//! # Responsibility
//! - Implement the full `CasClient` contract without a daemon: DAG objects,
//!   link patches, path traversal, keys and name publication.
//! - Derive CIDs from the canonical object bytes so content addressing
//!   behaves exactly like the real store.
//!
//! # Invariants
//! - Publishing equal objects yields equal CIDs on every connection sharing
//!   the state.
//! - All connections produced by one `MemoryConnector` observe one store.

use super::{CasClient, CasConnector, CasError, CasResult, ObjectLink};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct MemoryState {
    objects: Mutex<HashMap<String, Value>>,
    keys: Mutex<HashMap<String, String>>,
    names: Mutex<HashMap<String, String>>,
}

/// Connector whose connections all share one in-memory store.
#[derive(Default, Clone)]
pub struct MemoryConnector {
    state: Arc<MemoryState>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CasConnector for MemoryConnector {
    fn connect(&self) -> CasResult<Box<dyn CasClient>> {
        Ok(Box::new(MemoryCas {
            state: Arc::clone(&self.state),
        }))
    }
}

/// One connection into the shared in-memory store.
pub struct MemoryCas {
    state: Arc<MemoryState>,
}

impl MemoryCas {
    fn put_value(&self, object: Value) -> String {
        let bytes = serde_json::to_vec(&object).unwrap_or_default();
        let cid = content_cid(&bytes);
        self.state.objects.lock().entry(cid.clone()).or_insert(object);
        cid
    }

    fn get_value(&self, cid: &str) -> CasResult<Value> {
        self.state
            .objects
            .lock()
            .get(cid)
            .cloned()
            .ok_or_else(|| CasError::NotFound(cid.to_string()))
    }

    fn links_of(value: &Value) -> Vec<ObjectLink> {
        value["Links"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        Some(ObjectLink {
                            name: entry["Name"].as_str()?.to_string(),
                            cid: entry["Cid"].as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn with_links(links: Vec<ObjectLink>) -> Value {
        let entries: Vec<Value> = links
            .into_iter()
            .map(|link| json!({ "Name": link.name, "Cid": link.cid }))
            .collect();
        json!({ "Links": entries })
    }
}

/// Derives a CID from canonical object bytes.
fn content_cid(bytes: &[u8]) -> String {
    let digest = blake3::hash(bytes);
    let encoded = base32::encode(
        base32::Alphabet::Rfc4648Lower { padding: false },
        digest.as_bytes(),
    );
    format!("baf{encoded}")
}

impl CasClient for MemoryCas {
    fn dag_put(&self, object: &Value) -> CasResult<String> {
        Ok(self.put_value(object.clone()))
    }

    fn dag_get(&self, path: &str) -> CasResult<Value> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let cid = segments
            .next()
            .ok_or_else(|| CasError::NotFound(path.to_string()))?;
        let mut current = self.get_value(cid)?;
        for segment in segments {
            let links = Self::links_of(&current);
            let target = links
                .iter()
                .find(|link| link.name == segment)
                .map(|link| link.cid.clone())
                .ok_or_else(|| CasError::NotFound(format!("{path} (no link `{segment}`)")))?;
            current = self.get_value(&target)?;
        }
        Ok(current)
    }

    fn object_new(&self) -> CasResult<String> {
        Ok(self.put_value(json!({ "Links": [] })))
    }

    fn patch_add_link(&self, base: &str, name: &str, target: &str) -> CasResult<String> {
        let object = self.get_value(base)?;
        let mut links = Self::links_of(&object);
        links.retain(|link| link.name != name);
        links.push(ObjectLink {
            name: name.to_string(),
            cid: target.to_string(),
        });
        links.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(self.put_value(Self::with_links(links)))
    }

    fn patch_rm_link(&self, base: &str, name: &str) -> CasResult<String> {
        let object = self.get_value(base)?;
        let mut links = Self::links_of(&object);
        let before = links.len();
        links.retain(|link| link.name != name);
        if links.len() == before {
            return Err(CasError::NotFound(format!("link `{name}` under {base}")));
        }
        Ok(self.put_value(Self::with_links(links)))
    }

    fn list_links(&self, cid: &str) -> CasResult<Vec<ObjectLink>> {
        Ok(Self::links_of(&self.get_value(cid)?))
    }

    fn key_find(&self, name: &str) -> CasResult<Option<String>> {
        Ok(self.state.keys.lock().get(name).cloned())
    }

    fn key_create(&self, name: &str) -> CasResult<String> {
        let id = format!("k51-{name}");
        self.state.keys.lock().insert(name.to_string(), id.clone());
        Ok(id)
    }

    fn name_publish(&self, key: &str, cid: &str, _lifetime: &str, _ttl: &str) -> CasResult<()> {
        if !self.state.keys.lock().contains_key(key) {
            return Err(CasError::NotFound(format!("MNS key `{key}`")));
        }
        self.state
            .names
            .lock()
            .insert(key.to_string(), cid.to_string());
        Ok(())
    }

    fn name_resolve(&self, name: &str) -> CasResult<String> {
        self.state
            .names
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| CasError::NotFound(format!("MNS name `{name}`")))
    }
}
