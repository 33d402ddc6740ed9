//! CAS-backed atom storage.
//!
//! # Responsibility
//! - Assemble pool, identity registry, workspace root, write-back queue and
//!   MNS publisher into the public backend (`CasBackend`).
//! - Gate every public operation through the rethrow gate so asynchronous
//!   writer failures surface to the next caller.
//!
//! # Invariants
//! - Worker threads record only the first captured error; the gate consumes
//!   it exactly once.
//! - `close` is idempotent, drains accepted writes, and joins every
//!   background thread.

pub(crate) mod delete;
pub(crate) mod incoming;
pub(crate) mod load;
pub(crate) mod publisher;
pub(crate) mod queue;
pub(crate) mod registry;
pub(crate) mod stats;
pub(crate) mod store_atoms;
pub(crate) mod values;
pub(crate) mod workspace;

mod bulk;

use crate::cas::{CasClient, CasConnector, CasError, ConnectionPool, HttpConnector};
use crate::error::{StoreError, StoreResult};
use crate::model::atom::Atom;
use crate::model::types::TypeRegistry;
use crate::model::value::{TRUTH_KEY_NAME, TRUTH_KEY_TYPE};
use crate::model::AtomSink;
use crate::uri::{BackendConfig, WorkspaceRef};
use log::{error, info, warn};
use parking_lot::Mutex;
use publisher::MnsPublisher;
use queue::{WriteBackQueue, WriteFn, WRITE_BACK_THREADS};
use registry::IdentityRegistry;
use stats::Stats;
pub use stats::StatsSnapshot;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use workspace::WorkspaceRoot;

/// Shared state every writer thread and the facade operate on.
pub(crate) struct StoreCore {
    pub(crate) config: BackendConfig,
    pub(crate) pool: ConnectionPool,
    pub(crate) registry: IdentityRegistry,
    pub(crate) root: Arc<WorkspaceRoot>,
    pub(crate) stats: Stats,
    pub(crate) types: Arc<TypeRegistry>,
    /// The distinguished truth-value key; its default value is never stored.
    pub(crate) truth_key: Arc<Atom>,
    /// Single-slot register for the first asynchronous writer error.
    pub(crate) pending_error: Mutex<Option<StoreError>>,
    pub(crate) bulk_active: AtomicBool,
    pub(crate) bulk_started: Mutex<Option<Instant>>,
}

/// Persistence backend mapping a live hypergraph onto the CAS.
pub struct CasBackend {
    core: Arc<StoreCore>,
    queue: Arc<WriteBackQueue>,
    publisher: Option<MnsPublisher>,
    closed: AtomicBool,
}

impl CasBackend {
    /// Opens a backend from a `cas://` URI using the HTTP CAS client.
    pub fn open(uri: &str) -> StoreResult<Self> {
        let config = BackendConfig::parse(uri)?;
        let connector = HttpConnector::new(config.host.clone(), config.port);
        Self::build(&connector, config)
    }

    /// Opens a backend against an arbitrary connector (tests, demos).
    pub fn open_with_connector(connector: &dyn CasConnector, uri: &str) -> StoreResult<Self> {
        let config = BackendConfig::parse(uri)?;
        Self::build(connector, config)
    }

    fn build(connector: &dyn CasConnector, config: BackendConfig) -> StoreResult<Self> {
        let pool = ConnectionPool::connect(connector, WRITE_BACK_THREADS + 2)?;
        let initial_root = {
            let conn = pool.take();
            Self::resolve_initial_root(&*conn, &config)?
        };

        let core = Arc::new(StoreCore {
            truth_key: Atom::node(TRUTH_KEY_TYPE, TRUTH_KEY_NAME),
            config,
            pool,
            registry: IdentityRegistry::new(),
            root: Arc::new(WorkspaceRoot::new(initial_root)),
            stats: Stats::new(),
            types: Arc::new(TypeRegistry::with_defaults()),
            pending_error: Mutex::new(None),
            bulk_active: AtomicBool::new(false),
            bulk_started: Mutex::new(None),
        });

        // The publisher's dedicated connection is drawn before any worker
        // threads start, so a failed connect cannot strand them.
        let publisher_conn = match &core.config.workspace {
            WorkspaceRef::Key(_) => Some(connector.connect()?),
            WorkspaceRef::Cid(_) | WorkspaceRef::Name(_) => None,
        };

        let writer_core = Arc::clone(&core);
        let write: WriteFn = Arc::new(move |atom: Arc<Atom>| {
            let conn = writer_core.pool.take();
            if let Err(err) = writer_core.store_with_values(&*conn, &atom) {
                error!("event=async_store module=store status=error atom={atom} error={err}");
                let mut slot = writer_core.pending_error.lock();
                if slot.is_none() {
                    *slot = Some(err);
                }
            }
        });
        let queue = WriteBackQueue::start(write);

        let publisher = match (&core.config.workspace, publisher_conn) {
            (WorkspaceRef::Key(name), Some(conn)) => Some(MnsPublisher::start(
                conn,
                name.clone(),
                core.config.publish_lifetime.clone(),
                core.config.publish_ttl.clone(),
                Arc::clone(&core.root),
            )),
            _ => None,
        };

        info!(
            "event=backend_open module=store status=ok host={} port={} workspace={} read_only={}",
            core.config.host,
            core.config.port,
            core.config.workspace_name(),
            core.config.is_read_only()
        );

        Ok(Self {
            core,
            queue,
            publisher,
            closed: AtomicBool::new(false),
        })
    }

    fn resolve_initial_root(
        conn: &dyn CasClient,
        config: &BackendConfig,
    ) -> StoreResult<Option<String>> {
        match &config.workspace {
            WorkspaceRef::Key(name) => {
                if conn.key_find(name)?.is_none() {
                    let id = conn.key_create(name)?;
                    info!("event=key_create module=store status=ok name={name} id={id}");
                }
                match conn.name_resolve(name) {
                    Ok(cid) => Ok(Some(cid)),
                    // Fresh key with no published root yet: start empty.
                    Err(CasError::NotFound(_)) => Ok(Some(conn.object_new()?)),
                    Err(other) => Err(other.into()),
                }
            }
            WorkspaceRef::Cid(cid) => Ok(Some(cid.clone())),
            // MNS resolution can take tens of seconds; defer to first use.
            WorkspaceRef::Name(_) => Ok(None),
        }
    }

    /// Drains the queue and stops every background thread. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.stop_and_join();
        if let Some(publisher) = &self.publisher {
            publisher.stop();
        }
        info!(
            "event=backend_close module=store status=ok workspace={}",
            self.core.config.workspace_name()
        );
    }

    /// Consumes and returns the first error captured by a writer thread.
    fn rethrow(&self) -> StoreResult<()> {
        if let Some(err) = self.core.pending_error.lock().take() {
            return Err(err);
        }
        Ok(())
    }

    /// Stores an atom, its outgoing closure and its values.
    ///
    /// Asynchronous by default: the atom is queued and this call returns.
    /// With `synchronous` the whole writer body runs on this thread.
    pub fn store_atom(&self, atom: &Arc<Atom>, synchronous: bool) -> StoreResult<()> {
        self.rethrow()?;
        if synchronous {
            let conn = self.core.pool.take();
            self.core.store_with_values(&*conn, atom)
        } else {
            self.queue.insert(Arc::clone(atom));
            Ok(())
        }
    }

    /// Fetches the workspace state of `atom` (values and incoming set) onto
    /// it. An atom with no persisted state is returned unchanged.
    pub fn fetch_atom(&self, atom: &Arc<Atom>) -> StoreResult<Arc<Atom>> {
        self.rethrow()?;
        let conn = self.core.pool.take();
        self.core.fetch_values_by_path(&*conn, atom)
    }

    /// Fetches and decodes an atom from a raw CID (GUID or ACID).
    pub fn fetch_atom_by_id(&self, cid: &str) -> StoreResult<Arc<Atom>> {
        self.rethrow()?;
        let conn = self.core.pool.take();
        self.core.fetch_atom(&*conn, cid)
    }

    /// Loads a whole workspace into `sink`. `path` may be a raw CID, a
    /// `/cas/<cid>` path, a `/mns/<name>` path, or empty for the current
    /// workspace.
    pub fn load_workspace(&self, path: &str, sink: &dyn AtomSink) -> StoreResult<usize> {
        self.rethrow()?;
        let conn = self.core.pool.take();
        self.core.load_workspace(&*conn, path, sink)
    }

    /// Removes an atom from the workspace; with `recursive`, removes its
    /// entire incoming closure first.
    pub fn remove_atom(&self, atom: &Arc<Atom>, recursive: bool) -> StoreResult<()> {
        self.rethrow()?;
        // The atom may still be sitting in the store queue; fence first.
        self.queue.barrier();
        self.rethrow()?;
        let conn = self.core.pool.take();
        self.core.remove_atom(&*conn, atom, recursive)
    }

    /// Returns the atoms whose outgoing sets contain `atom`.
    pub fn get_incoming_set(&self, atom: &Arc<Atom>) -> StoreResult<Vec<Arc<Atom>>> {
        self.rethrow()?;
        let conn = self.core.pool.take();
        self.core.incoming_set(&*conn, atom, None)
    }

    /// Like [`Self::get_incoming_set`], filtered to one atom type.
    pub fn get_incoming_by_type(
        &self,
        atom: &Arc<Atom>,
        type_name: &str,
    ) -> StoreResult<Vec<Arc<Atom>>> {
        self.rethrow()?;
        let conn = self.core.pool.take();
        self.core.incoming_set(&*conn, atom, Some(type_name))
    }

    /// Drains the write-back queue; a fencing operation.
    pub fn flush(&self) -> StoreResult<()> {
        self.rethrow()?;
        self.queue.barrier();
        self.rethrow()
    }

    /// Fences the queue: all stores issued before the call are pushed to the
    /// CAS before it returns (modulo the documented last-item window).
    pub fn barrier(&self) -> StoreResult<()> {
        self.flush()
    }

    /// Current workspace CID, resolving a deferred MNS root if needed.
    pub fn get_workspace_cid(&self) -> StoreResult<String> {
        self.rethrow()?;
        if let Some(cid) = self.core.root.current() {
            return Ok(cid);
        }
        let conn = self.core.pool.take();
        self.core.resolved_root(&*conn)
    }

    /// Stable workspace name; empty for CID-pinned read workspaces.
    pub fn get_workspace_name(&self) -> StoreResult<String> {
        self.rethrow()?;
        Ok(self.core.config.workspace_name().to_string())
    }

    /// Wakes the MNS publisher to advertise the current workspace CID.
    pub fn publish_workspace(&self) -> StoreResult<()> {
        self.rethrow()?;
        match &self.publisher {
            Some(publisher) => {
                publisher.publish_now();
                Ok(())
            }
            None => Err(StoreError::NotImplemented(
                "publish on a read-only workspace",
            )),
        }
    }

    /// Synchronously resolves the workspace MNS name and installs the result
    /// as the current root. May take tens of seconds.
    pub fn resolve_workspace(&self) -> StoreResult<String> {
        self.rethrow()?;
        let name = self.core.config.workspace_name().to_string();
        if name.is_empty() {
            return Err(StoreError::NotImplemented(
                "resolve on a workspace without an MNS name",
            ));
        }
        let conn = self.core.pool.take();
        let cid = conn.name_resolve(&name)?;
        self.core.root.install(cid.clone());
        Ok(cid)
    }

    /// Resets the workspace to a single empty object. Destructive: every
    /// stored atom becomes unreachable from this workspace.
    pub fn kill_data(&self) -> StoreResult<()> {
        self.rethrow()?;
        if self.core.config.is_read_only() {
            return Err(StoreError::NotImplemented(
                "kill_data on a read-only workspace",
            ));
        }
        self.queue.barrier();
        let conn = self.core.pool.take();
        let empty = conn.object_new()?;
        self.core.root.install(empty.clone());
        self.core.registry.clear();
        warn!(
            "event=kill_data module=store status=ok workspace={} wcid={empty}",
            self.core.config.workspace_name()
        );
        if let Some(publisher) = &self.publisher {
            publisher.publish_now();
        }
        Ok(())
    }

    pub fn set_watermarks(&self, high: usize, low: usize) -> StoreResult<()> {
        self.rethrow()?;
        self.queue.set_watermarks(high, low);
        Ok(())
    }

    pub fn stall_writers(&self, stall: bool) -> StoreResult<()> {
        self.rethrow()?;
        self.queue.stall(stall);
        Ok(())
    }

    /// Number of atoms waiting in the write-back queue.
    pub fn queue_depth(&self) -> StoreResult<usize> {
        self.rethrow()?;
        Ok(self.queue.get_size())
    }

    /// Number of writer threads currently inside a store body.
    pub fn busy_writers(&self) -> StoreResult<usize> {
        self.rethrow()?;
        Ok(self.queue.get_busy_writers())
    }

    /// Point-in-time copy of the backend counters.
    pub fn stats_snapshot(&self) -> StoreResult<StatsSnapshot> {
        self.rethrow()?;
        Ok(self.core.stats.snapshot())
    }

    /// Formats the full statistics report.
    pub fn stats_report(&self) -> StoreResult<String> {
        self.rethrow()?;
        let stats = self.core.stats.snapshot();
        let queue = self.queue.snapshot();
        let mut report = String::new();

        let _ = writeln!(
            report,
            "cas-stats: workspace={} read_only={}",
            self.core.config.workspace_name(),
            self.core.config.is_read_only()
        );
        let _ = writeln!(
            report,
            "cas-stats: {} secs since stats reset",
            stats.seconds_since_reset
        );
        let _ = writeln!(
            report,
            "loads={} stores={} valuation_stores={} value_stores={}",
            stats.load_count, stats.store_count, stats.valuation_stores, stats.value_stores
        );
        let _ = writeln!(
            report,
            "atom_removes={} atom_deletes={}",
            stats.num_atom_removes, stats.num_atom_deletes
        );
        let _ = writeln!(
            report,
            "node_fetches={}/{} link_fetches={}/{}",
            stats.num_got_nodes, stats.num_get_nodes, stats.num_got_links, stats.num_get_links
        );
        let _ = writeln!(
            report,
            "incoming_fetches={} incoming_members={}",
            stats.num_get_insets, stats.num_get_inlinks
        );

        let serviced = queue.drain_count.max(1);
        let _ = writeln!(
            report,
            "queue: items={} duplicates={} flushes={} serviced={}",
            queue.item_count, queue.duplicate_count, queue.flush_count, queue.drain_count
        );
        let _ = writeln!(
            report,
            "queue: avg_write_msec={} slowest_write_msec={}",
            queue.drain_msec / serviced,
            queue.drain_slowest_msec
        );
        let _ = writeln!(
            report,
            "queue: pending={} busy_writers={} hi_watermark={} lo_watermark={} stalling={}",
            queue.pending,
            queue.busy_writers,
            queue.high_watermark,
            queue.low_watermark,
            queue.stalling
        );
        let _ = writeln!(
            report,
            "conn_pool: free={} of {}",
            self.core.pool.idle_count(),
            WRITE_BACK_THREADS + 2
        );
        Ok(report)
    }

    /// Prints the statistics report to stdout.
    pub fn print_stats(&self) -> StoreResult<()> {
        let report = self.stats_report()?;
        print!("{report}");
        Ok(())
    }

    /// Resets every counter, including the queue's, and the stats clock.
    pub fn clear_stats(&self) -> StoreResult<()> {
        self.rethrow()?;
        self.core.stats.clear();
        self.queue.clear_stats();
        Ok(())
    }
}

impl Drop for CasBackend {
    fn drop(&mut self) {
        self.close();
    }
}
