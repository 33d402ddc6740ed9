//! Workspace root manager.
//!
//! # Responsibility
//! - Own the current workspace CID (WCID) and the serial right to patch it.
//! - Apply add-link and remove-link patches that produce the next WCID.
//!
//! # Invariants
//! - The root lock is held across the CAS patch call: the next WCID depends
//!   on the current one, so patch composition must be serialized. This is
//!   the backend's deliberate throughput bottleneck.
//! - A failed `detach` leaves the WCID unchanged.

use crate::cas::{CasClient, CasError};
use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;

pub(crate) struct WorkspaceRoot {
    cid: Mutex<Option<String>>,
}

impl WorkspaceRoot {
    pub(crate) fn new(initial: Option<String>) -> Self {
        Self {
            cid: Mutex::new(initial),
        }
    }

    /// The current WCID, if the root has been resolved.
    pub(crate) fn current(&self) -> Option<String> {
        self.cid.lock().clone()
    }

    /// Installs a WCID directly (open, resolve, kill_data).
    pub(crate) fn install(&self, cid: String) {
        *self.cid.lock() = Some(cid);
    }

    /// The current WCID, or `NotFound` when the root was never resolved.
    pub(crate) fn require(&self) -> StoreResult<String> {
        self.current()
            .ok_or_else(|| StoreError::NotFound("workspace root".to_string()))
    }

    /// Binds `key` to `acid` in the workspace, installing the new WCID.
    pub(crate) fn attach(
        &self,
        conn: &dyn CasClient,
        key: &str,
        acid: &str,
    ) -> StoreResult<String> {
        let mut guard = self.cid.lock();
        let base = guard
            .as_ref()
            .ok_or_else(|| StoreError::NotFound("workspace root".to_string()))?;
        let next = conn.patch_add_link(base, key, acid)?;
        *guard = Some(next.clone());
        Ok(next)
    }

    /// Unbinds `key` from the workspace, installing the new WCID.
    ///
    /// # Errors
    /// `NotFound` when the workspace holds no such key; the WCID stays as it
    /// was.
    pub(crate) fn detach(&self, conn: &dyn CasClient, key: &str) -> StoreResult<String> {
        let mut guard = self.cid.lock();
        let base = guard
            .as_ref()
            .ok_or_else(|| StoreError::NotFound("workspace root".to_string()))?;
        match conn.patch_rm_link(base, key) {
            Ok(next) => {
                *guard = Some(next.clone());
                Ok(next)
            }
            Err(CasError::NotFound(_)) => Err(StoreError::NotFound(key.to_string())),
            Err(other) => Err(other.into()),
        }
    }
}
