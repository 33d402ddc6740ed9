//! Background MNS publisher.
//!
//! # Responsibility
//! - Re-advertise the current workspace CID under the stable MNS name,
//!   off the caller's thread: MNS publication can take tens of seconds.
//! - Swallow publication failures; the MNS is best-effort and frequently
//!   rejects benign updates.
//!
//! # Invariants
//! - Exactly one worker, owning one dedicated CAS connection.
//! - `publish_now` never blocks on the MNS; it only wakes the worker.
//! - Clearing the keep-going flag plus one notify stops the worker.

use super::workspace::WorkspaceRoot;
use crate::cas::CasClient;
use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Cadence of unsolicited re-advertisement.
const REPUBLISH_INTERVAL: Duration = Duration::from_secs(240);

struct PublisherShared {
    state: Mutex<PublisherState>,
    wake: Condvar,
}

struct PublisherState {
    dirty: bool,
    keep_going: bool,
}

pub(crate) struct MnsPublisher {
    shared: Arc<PublisherShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MnsPublisher {
    /// Starts the worker for the MNS key `name`.
    pub(crate) fn start(
        conn: Box<dyn CasClient>,
        name: String,
        lifetime: String,
        ttl: String,
        root: Arc<WorkspaceRoot>,
    ) -> Self {
        let shared = Arc::new(PublisherShared {
            state: Mutex::new(PublisherState {
                dirty: false,
                keep_going: true,
            }),
            wake: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::spawn(move || {
            publisher_loop(&worker_shared, &*conn, &name, &lifetime, &ttl, &root);
        });

        Self {
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Wakes the worker for an immediate publish.
    pub(crate) fn publish_now(&self) {
        let mut state = self.shared.state.lock();
        state.dirty = true;
        self.shared.wake.notify_one();
    }

    /// Clears the keep-going flag and joins the worker.
    pub(crate) fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            state.keep_going = false;
        }
        self.shared.wake.notify_one();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

fn publisher_loop(
    shared: &PublisherShared,
    conn: &dyn CasClient,
    name: &str,
    lifetime: &str,
    ttl: &str,
    root: &WorkspaceRoot,
) {
    loop {
        {
            let mut state = shared.state.lock();
            if !state.keep_going {
                return;
            }
            if !state.dirty {
                // A timed wait doubles as the periodic re-advertisement tick.
                let _ = shared.wake.wait_for(&mut state, REPUBLISH_INTERVAL);
            }
            if !state.keep_going {
                return;
            }
            state.dirty = false;
        }

        let Some(wcid) = root.current() else {
            debug!("event=mns_publish module=publisher status=skipped reason=no_root");
            continue;
        };

        match conn.name_publish(name, &wcid, lifetime, ttl) {
            Ok(()) => {
                info!("event=mns_publish module=publisher status=ok name={name} wcid={wcid}");
            }
            Err(err) => {
                // Best-effort by contract; the MNS rejects benign updates.
                warn!("event=mns_publish module=publisher status=error name={name} error={err}");
            }
        }
    }
}
