//! CAS client contracts.
//!
//! # Responsibility
//! - Name the store capabilities the backend requires: DAG put/get, link
//!   patches, link listing, and the mutable-name system.
//! - Keep transport errors classified so callers can tell absence apart from
//!   failure.
//!
//! # Invariants
//! - `dag_put` is content-addressed: publishing the same object twice returns
//!   the same CID.
//! - Every implementation must report a missing CID, path or name as
//!   `CasError::NotFound`, never as a generic failure.

pub mod http;
pub mod memory;
pub mod pool;

pub use http::{HttpCasClient, HttpConnector};
pub use memory::{MemoryCas, MemoryConnector};
pub use pool::{ConnectionPool, PooledConnection};

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CasResult<T> = Result<T, CasError>;

/// Transport-layer error reported by a CAS client.
#[derive(Debug)]
pub enum CasError {
    /// The addressed CID, path or name does not exist.
    NotFound(String),
    /// I/O or HTTP failure talking to the store.
    Transport(String),
    /// The store answered with something the client cannot interpret.
    Protocol(String),
}

impl Display for CasError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Transport(details) => write!(f, "transport error: {details}"),
            Self::Protocol(details) => write!(f, "protocol error: {details}"),
        }
    }
}

impl Error for CasError {}

/// One named link of a workspace object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLink {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Cid")]
    pub cid: String,
}

/// Client handle for one CAS connection.
///
/// Handles are pooled (`cas::pool`); every method may block for arbitrary
/// time, MNS calls for tens of seconds.
pub trait CasClient: Send {
    /// Publishes a structured object, returning its CID.
    fn dag_put(&self, object: &serde_json::Value) -> CasResult<String>;

    /// Fetches a structured object by CID or by `CID/name` path.
    fn dag_get(&self, path: &str) -> CasResult<serde_json::Value>;

    /// Creates an empty object (no data, no links) and returns its CID.
    fn object_new(&self) -> CasResult<String>;

    /// Applies an add-link patch; an existing link of the same name is
    /// replaced. Returns the patched object's new CID.
    fn patch_add_link(&self, base: &str, name: &str, target: &str) -> CasResult<String>;

    /// Applies a remove-link patch. `NotFound` when no such link exists.
    fn patch_rm_link(&self, base: &str, name: &str) -> CasResult<String>;

    /// Lists the named links of an object. Order is not meaningful.
    fn list_links(&self, cid: &str) -> CasResult<Vec<ObjectLink>>;

    /// Looks up an MNS key by name, returning its id when present.
    fn key_find(&self, name: &str) -> CasResult<Option<String>>;

    /// Creates an MNS key, returning its id.
    fn key_create(&self, name: &str) -> CasResult<String>;

    /// Publishes `cid` under the MNS key `key`.
    fn name_publish(&self, key: &str, cid: &str, lifetime: &str, ttl: &str) -> CasResult<()>;

    /// Resolves an MNS name to the currently published CID.
    fn name_resolve(&self, name: &str) -> CasResult<String>;
}

/// Factory for CAS connections; the pool and the publisher each draw from it.
pub trait CasConnector: Send + Sync {
    fn connect(&self) -> CasResult<Box<dyn CasClient>>;
}
