//! Connection pool for CAS client handles.
//!
//! # Responsibility
//! - Hold a bounded LIFO stack of reusable connections.
//! - Guarantee that every taken connection returns to the pool on every exit
//!   path, including failure.
//!
//! # Invariants
//! - `take` blocks until a connection is available; it never creates one.
//! - The pool's size never shrinks: the `PooledConnection` guard gives the
//!   handle back in `Drop`.

use super::{CasClient, CasConnector, CasResult};
use parking_lot::{Condvar, Mutex};
use std::ops::Deref;

/// Bounded LIFO pool of CAS connections.
pub struct ConnectionPool {
    idle: Mutex<Vec<Box<dyn CasClient>>>,
    available: Condvar,
}

impl ConnectionPool {
    /// Fills a new pool with `size` connections drawn from `connector`.
    pub fn connect(connector: &dyn CasConnector, size: usize) -> CasResult<Self> {
        let mut idle = Vec::with_capacity(size);
        for _ in 0..size {
            idle.push(connector.connect()?);
        }
        Ok(Self {
            idle: Mutex::new(idle),
            available: Condvar::new(),
        })
    }

    /// Takes a connection, blocking while the pool is empty.
    ///
    /// The returned guard releases the connection when dropped; hold it only
    /// for the duration of one writer body or one read operation.
    pub fn take(&self) -> PooledConnection<'_> {
        let mut idle = self.idle.lock();
        while idle.is_empty() {
            self.available.wait(&mut idle);
        }
        let conn = idle.pop().expect("non-empty pool yields a connection");
        PooledConnection {
            pool: self,
            conn: Some(conn),
        }
    }

    /// Number of connections currently resting in the pool.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn give_back(&self, conn: Box<dyn CasClient>) {
        self.idle.lock().push(conn);
        self.available.notify_one();
    }
}

/// Scoped borrow of one pooled connection.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Box<dyn CasClient>>,
}

impl Deref for PooledConnection<'_> {
    type Target = dyn CasClient;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_deref()
            .expect("guard holds its connection until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionPool;
    use crate::cas::memory::MemoryConnector;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn take_and_drop_restores_pool_size() {
        let pool = ConnectionPool::connect(&MemoryConnector::new(), 3).unwrap();
        assert_eq!(pool.idle_count(), 3);
        {
            let _a = pool.take();
            let _b = pool.take();
            assert_eq!(pool.idle_count(), 1);
        }
        assert_eq!(pool.idle_count(), 3);
    }

    #[test]
    fn connection_returns_even_when_the_user_errors_out() {
        let pool = ConnectionPool::connect(&MemoryConnector::new(), 1).unwrap();
        let attempt = || -> Result<(), &'static str> {
            let conn = pool.take();
            let _ = conn.dag_get("no-such-cid");
            Err("simulated failure after CAS call")
        };
        assert!(attempt().is_err());
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn take_blocks_until_a_connection_is_returned() {
        let pool = Arc::new(ConnectionPool::connect(&MemoryConnector::new(), 1).unwrap());
        let held = pool.take();

        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let conn = pool.take();
                drop(conn);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished(), "waiter should block on an empty pool");
        drop(held);
        waiter.join().unwrap();
        assert_eq!(pool.idle_count(), 1);
    }
}
