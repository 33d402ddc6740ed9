use atomcas_core::{
    Atom, AtomTable, CasBackend, CasClient, CasConnector, CasError, CasResult, MemoryConnector,
    ObjectLink, StoreError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const WRITER_THREADS: usize = 8;
const ATOMS_PER_THREAD: usize = 150;

#[test]
fn concurrent_stores_all_land_after_a_barrier() {
    let connector = MemoryConnector::new();
    let backend =
        Arc::new(CasBackend::open_with_connector(&connector, "cas:///kb-concurrent").unwrap());

    let mut producers = Vec::new();
    for thread_id in 0..WRITER_THREADS {
        let backend = Arc::clone(&backend);
        producers.push(std::thread::spawn(move || {
            for i in 0..ATOMS_PER_THREAD {
                let atom = Atom::node("ConceptNode", format!("atom-{thread_id}-{i}"));
                backend.store_atom(&atom, false).unwrap();
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    backend.barrier().unwrap();
    backend.barrier().unwrap();

    let table = AtomTable::new();
    let loaded = backend.load_workspace("", &table).unwrap();
    assert_eq!(loaded, WRITER_THREADS * ATOMS_PER_THREAD);
    assert_eq!(table.len(), WRITER_THREADS * ATOMS_PER_THREAD);

    // Distinct atoms, so every store published exactly one minimal object.
    let stats = backend.stats_snapshot().unwrap();
    assert_eq!(stats.store_count as usize, WRITER_THREADS * ATOMS_PER_THREAD);
    assert_eq!(backend.queue_depth().unwrap(), 0);
    assert_eq!(backend.busy_writers().unwrap(), 0);
}

#[test]
fn duplicate_async_stores_collapse_in_the_queue() {
    let connector = MemoryConnector::new();
    let backend = CasBackend::open_with_connector(&connector, "cas:///kb-dup").unwrap();

    backend.stall_writers(false).unwrap();
    for _ in 0..64 {
        backend.store_atom(&Atom::node("ConceptNode", "same"), false).unwrap();
    }
    backend.barrier().unwrap();
    backend.barrier().unwrap();

    let table = AtomTable::new();
    backend.load_workspace("", &table).unwrap();
    assert_eq!(table.len(), 1);
}

/// Connector that can be switched into a failing mode; used to drive the
/// rethrow gate the way a daemon outage would.
#[derive(Clone)]
struct FlakyConnector {
    inner: MemoryConnector,
    fail_puts: Arc<AtomicBool>,
}

impl FlakyConnector {
    fn new() -> Self {
        Self {
            inner: MemoryConnector::new(),
            fail_puts: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl CasConnector for FlakyConnector {
    fn connect(&self) -> CasResult<Box<dyn CasClient>> {
        Ok(Box::new(FlakyClient {
            inner: self.inner.connect()?,
            fail_puts: Arc::clone(&self.fail_puts),
        }))
    }
}

struct FlakyClient {
    inner: Box<dyn CasClient>,
    fail_puts: Arc<AtomicBool>,
}

impl CasClient for FlakyClient {
    fn dag_put(&self, object: &serde_json::Value) -> CasResult<String> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(CasError::Transport("injected daemon outage".to_string()));
        }
        self.inner.dag_put(object)
    }

    fn dag_get(&self, path: &str) -> CasResult<serde_json::Value> {
        self.inner.dag_get(path)
    }

    fn object_new(&self) -> CasResult<String> {
        self.inner.object_new()
    }

    fn patch_add_link(&self, base: &str, name: &str, target: &str) -> CasResult<String> {
        self.inner.patch_add_link(base, name, target)
    }

    fn patch_rm_link(&self, base: &str, name: &str) -> CasResult<String> {
        self.inner.patch_rm_link(base, name)
    }

    fn list_links(&self, cid: &str) -> CasResult<Vec<ObjectLink>> {
        self.inner.list_links(cid)
    }

    fn key_find(&self, name: &str) -> CasResult<Option<String>> {
        self.inner.key_find(name)
    }

    fn key_create(&self, name: &str) -> CasResult<String> {
        self.inner.key_create(name)
    }

    fn name_publish(&self, key: &str, cid: &str, lifetime: &str, ttl: &str) -> CasResult<()> {
        self.inner.name_publish(key, cid, lifetime, ttl)
    }

    fn name_resolve(&self, name: &str) -> CasResult<String> {
        self.inner.name_resolve(name)
    }
}

#[test]
fn worker_failures_surface_through_the_rethrow_gate_once() {
    let connector = FlakyConnector::new();
    let backend = CasBackend::open_with_connector(&connector, "cas:///kb-flaky").unwrap();

    backend.store_atom(&Atom::node("ConceptNode", "before"), false).unwrap();
    backend.barrier().unwrap();

    connector.fail_puts.store(true, Ordering::SeqCst);
    backend.store_atom(&Atom::node("ConceptNode", "doomed"), false).unwrap();

    let err = backend.barrier().unwrap_err();
    assert!(matches!(err, StoreError::Cas(_)), "got {err:?}");

    // The gate consumed the error; the backend is usable again.
    connector.fail_puts.store(false, Ordering::SeqCst);
    backend.barrier().unwrap();
    backend.store_atom(&Atom::node("ConceptNode", "after"), false).unwrap();
    backend.barrier().unwrap();

    let fetched = backend.fetch_atom(&Atom::node("ConceptNode", "after")).unwrap();
    assert_eq!(*fetched, *Atom::node("ConceptNode", "after"));
}

#[test]
fn synchronous_store_failures_surface_directly() {
    let connector = FlakyConnector::new();
    let backend = CasBackend::open_with_connector(&connector, "cas:///kb-flaky-sync").unwrap();

    connector.fail_puts.store(true, Ordering::SeqCst);
    let err = backend
        .store_atom(&Atom::node("ConceptNode", "doomed"), true)
        .unwrap_err();
    assert!(matches!(err, StoreError::Cas(_)));

    // A synchronous failure is not a deferred one: nothing to rethrow later.
    connector.fail_puts.store(false, Ordering::SeqCst);
    backend.barrier().unwrap();
}
