//! Atom and workspace materialization.
//!
//! # Responsibility
//! - Decode CAS objects back into atoms, resolving child GUIDs recursively
//!   through the GUID→atom cache.
//! - Load whole workspaces into an `AtomSink` from a CID, `/cas/` or `/mns/`
//!   path.
//!
//! # Invariants
//! - A missing workspace path is not an error: the atom simply has no
//!   persisted state.
//! - Every decoded atom is recorded in the GUID→atom cache before it is
//!   returned.

use super::stats::Stats;
use super::StoreCore;
use crate::cas::{CasClient, CasError};
use crate::codec::{self, AtomObject};
use crate::error::{StoreError, StoreResult};
use crate::model::atom::Atom;
use crate::model::types::AtomKind;
use crate::model::AtomSink;
use crate::uri::WorkspaceRef;
use log::info;
use std::sync::Arc;

impl StoreCore {
    /// Fetches and decodes the atom stored under `cid`, values included.
    pub(crate) fn fetch_atom(&self, conn: &dyn CasClient, cid: &str) -> StoreResult<Arc<Atom>> {
        let json = conn.dag_get(cid)?;
        let object = AtomObject::from_json(json)?;
        let atom = self.decode_object(conn, &object)?;
        self.install_values(&atom, &object)?;
        self.registry.record_decoded(cid.to_string(), Arc::clone(&atom));
        self.registry.cache_object(atom.to_string(), object);
        Stats::bump(&self.stats.load_count);
        Ok(atom)
    }

    /// Decodes an atom object; link children resolve through the cache
    /// first, then recursively through the CAS.
    fn decode_object(&self, conn: &dyn CasClient, object: &AtomObject) -> StoreResult<Arc<Atom>> {
        match self.types.kind_of(&object.type_name) {
            Some(AtomKind::Node) => {
                let name = object.name.as_ref().ok_or_else(|| {
                    StoreError::BadEncoding(format!(
                        "node object of type `{}` has no name",
                        object.type_name
                    ))
                })?;
                Stats::bump(&self.stats.num_got_nodes);
                Ok(Atom::node(object.type_name.clone(), name.clone()))
            }
            Some(AtomKind::Link) => {
                let guids = object.outgoing.clone().unwrap_or_default();
                let mut outgoing = Vec::with_capacity(guids.len());
                for guid in guids {
                    let child = match self.registry.atom_for_guid(&guid) {
                        Some(cached) => cached,
                        None => self.fetch_atom(conn, &guid)?,
                    };
                    outgoing.push(child);
                }
                Stats::bump(&self.stats.num_got_links);
                Ok(Atom::link(object.type_name.clone(), outgoing))
            }
            None => Err(StoreError::BadEncoding(format!(
                "object type `{}` is neither node nor link",
                object.type_name
            ))),
        }
    }

    /// Fetches the workspace state of `atom` by path and installs its values.
    pub(crate) fn fetch_values_by_path(
        &self,
        conn: &dyn CasClient,
        atom: &Arc<Atom>,
    ) -> StoreResult<Arc<Atom>> {
        let key = atom.to_string();
        if atom.is_node() {
            Stats::bump(&self.stats.num_get_nodes);
        } else {
            Stats::bump(&self.stats.num_get_links);
        }

        let root = self.resolved_root(conn)?;
        match conn.dag_get(&format!("{root}/{key}")) {
            // Not recorded in this workspace; that is a normal situation.
            Err(CasError::NotFound(_)) => Ok(Arc::clone(atom)),
            Err(other) => Err(other.into()),
            Ok(json) => {
                let object = AtomObject::from_json(json)?;
                self.install_values(atom, &object)?;
                if atom.is_node() {
                    Stats::bump(&self.stats.num_got_nodes);
                } else {
                    Stats::bump(&self.stats.num_got_links);
                }
                self.registry.cache_object(key, object);
                Stats::bump(&self.stats.load_count);
                Ok(Arc::clone(atom))
            }
        }
    }

    /// Loads every atom of a workspace into `sink`, then flushes the sink.
    pub(crate) fn load_workspace(
        &self,
        conn: &dyn CasClient,
        path: &str,
        sink: &dyn AtomSink,
    ) -> StoreResult<usize> {
        let wcid = self.resolve_load_target(conn, path)?;
        let links = conn.list_links(&wcid)?;

        let mut count = 0usize;
        for link in links {
            let atom = codec::parse_atom(&link.name, &self.types)?;
            self.registry.record_acid(link.name, link.cid);
            sink.admit(atom);
            count += 1;
            Stats::bump(&self.stats.load_count);
        }
        sink.barrier();

        info!("event=load_workspace module=store status=ok wcid={wcid} atoms={count}");
        Ok(count)
    }

    /// The current root, resolving a deferred `/mns/` open on first use.
    pub(crate) fn resolved_root(&self, conn: &dyn CasClient) -> StoreResult<String> {
        if let Some(cid) = self.root.current() {
            return Ok(cid);
        }
        if let WorkspaceRef::Name(name) = &self.config.workspace {
            let cid = conn.name_resolve(name)?;
            self.root.install(cid.clone());
            return Ok(cid);
        }
        Err(StoreError::NotFound("workspace root".to_string()))
    }

    fn resolve_load_target(&self, conn: &dyn CasClient, path: &str) -> StoreResult<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return self.resolved_root(conn);
        }
        if let Some(cid) = trimmed.strip_prefix("/cas/") {
            return Ok(cid.trim_matches('/').to_string());
        }
        if let Some(name) = trimmed.strip_prefix("/mns/") {
            return Ok(conn.name_resolve(name.trim_matches('/'))?);
        }
        Ok(trimmed.to_string())
    }
}
