//! CAS-backed persistence for hypergraph knowledge bases.
//! This crate maps a live, mutating hypergraph onto an immutable
//! content-addressed DAG and keeps the two consistent under concurrent
//! mutation.

/// CAS client contracts, HTTP transport, in-memory store, connection pool.
pub mod cas;
/// Canonical object, key and value codecs.
pub mod codec;
/// Backend error kinds.
pub mod error;
/// Structured logging initialization and status APIs.
pub mod logging;
/// Atom, value and type-registry domain model.
pub mod model;
/// The storage backend: identity registry, workspace root, writers, queue,
/// publisher.
pub mod store;
/// Backend URI parsing.
pub mod uri;

/// Re-export CAS contracts and the bundled client implementations.
pub use cas::{
    CasClient, CasConnector, CasError, CasResult, ConnectionPool, HttpConnector, MemoryConnector,
    ObjectLink,
};
/// Re-export the on-wire atom object model.
pub use codec::AtomObject;
/// Re-export error kinds used across the public API.
pub use error::{StoreError, StoreResult};
/// Re-export logging entry points for embedding layers.
pub use logging::{init_logging, logging_status, LogConfig, LogTarget};
/// Re-export the domain model.
pub use model::atom::{Atom, AtomBody};
pub use model::types::{AtomKind, TypeRegistry};
pub use model::value::Value;
pub use model::{AtomSink, AtomTable};
/// Re-export the backend facade and its counters.
pub use store::{CasBackend, StatsSnapshot};
/// Re-export backend configuration.
pub use uri::{BackendConfig, WorkspaceRef};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
