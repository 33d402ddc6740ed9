//! Asynchronous write-back queue.
//!
//! # Responsibility
//! - Buffer atoms awaiting storage, deduplicating repeated inserts.
//! - Fan work out to a fixed pool of writer threads.
//! - Provide the barrier and watermark-stall fencing semantics.
//!
//! # Invariants
//! - An atom occurs at most once among pending entries; duplicates are
//!   counted, not queued.
//! - `barrier()` returns only when everything inserted before the call has
//!   been handed to a worker and all running worker bodies finished. There
//!   remains a small window in which the very last handed-off item is still
//!   in flight; callers requiring strict durability invoke the barrier
//!   twice.
//! - Workers never panic out of their loop: the writer closure owns all
//!   error capture.

use crate::model::atom::Atom;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Number of writer threads servicing the queue.
pub(crate) const WRITE_BACK_THREADS: usize = 6;

const DEFAULT_HIGH_WATERMARK: usize = 1000;
const DEFAULT_LOW_WATERMARK: usize = 100;

/// Writer body invoked for each dequeued atom. Must not panic.
pub(crate) type WriteFn = Arc<dyn Fn(Arc<Atom>) + Send + Sync>;

struct QueueState {
    pending: VecDeque<Arc<Atom>>,
    keyed: HashSet<String>,
    busy: usize,
    stop: bool,
    high_watermark: usize,
    low_watermark: usize,
    stall: bool,
}

/// Counters the queue maintains for `print_stats`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueueSnapshot {
    pub item_count: u64,
    pub duplicate_count: u64,
    pub flush_count: u64,
    pub drain_count: u64,
    pub drain_msec: u64,
    pub drain_slowest_msec: u64,
    pub pending: usize,
    pub busy_writers: usize,
    pub high_watermark: usize,
    pub low_watermark: usize,
    pub stalling: bool,
}

pub(crate) struct WriteBackQueue {
    state: Mutex<QueueState>,
    /// Signals workers that work (or stop) is available.
    work_ready: Condvar,
    /// Signals barrier and stall waiters that the queue settled or shrank.
    settled: Condvar,
    workers: Mutex<Vec<JoinHandle<()>>>,
    item_count: AtomicU64,
    duplicate_count: AtomicU64,
    flush_count: AtomicU64,
    drain_count: AtomicU64,
    drain_msec: AtomicU64,
    drain_slowest_msec: AtomicU64,
}

impl WriteBackQueue {
    /// Starts the queue and its fixed worker pool.
    pub(crate) fn start(write: WriteFn) -> Arc<Self> {
        let queue = Arc::new(Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                keyed: HashSet::new(),
                busy: 0,
                stop: false,
                high_watermark: DEFAULT_HIGH_WATERMARK,
                low_watermark: DEFAULT_LOW_WATERMARK,
                stall: false,
            }),
            work_ready: Condvar::new(),
            settled: Condvar::new(),
            workers: Mutex::new(Vec::with_capacity(WRITE_BACK_THREADS)),
            item_count: AtomicU64::new(0),
            duplicate_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
            drain_count: AtomicU64::new(0),
            drain_msec: AtomicU64::new(0),
            drain_slowest_msec: AtomicU64::new(0),
        });

        let mut workers = queue.workers.lock();
        for _ in 0..WRITE_BACK_THREADS {
            let queue = Arc::clone(&queue);
            let write = Arc::clone(&write);
            workers.push(std::thread::spawn(move || queue.worker_loop(write)));
        }
        drop(workers);
        queue
    }

    /// Inserts an atom unless an equal atom is already pending.
    ///
    /// Blocks only when stalling is enabled and the queue sits above the high
    /// watermark; the caller is then held until the queue drains below the
    /// low watermark.
    pub(crate) fn insert(&self, atom: Arc<Atom>) {
        let key = atom.to_string();
        let mut state = self.state.lock();
        self.item_count.fetch_add(1, Ordering::Relaxed);
        if state.keyed.contains(&key) {
            self.duplicate_count.fetch_add(1, Ordering::Relaxed);
            return;
        }
        state.keyed.insert(key);
        state.pending.push_back(atom);
        self.work_ready.notify_one();

        if state.stall && state.pending.len() > state.high_watermark {
            while state.pending.len() > state.low_watermark && !state.stop {
                self.settled.wait(&mut state);
            }
        }
    }

    /// Waits until all pending items have been handed out and all running
    /// worker bodies completed. See the module invariant for the caveat.
    pub(crate) fn barrier(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        while !(state.pending.is_empty() && state.busy == 0) {
            self.settled.wait(&mut state);
        }
    }

    pub(crate) fn set_watermarks(&self, high: usize, low: usize) {
        let mut state = self.state.lock();
        state.high_watermark = high;
        state.low_watermark = low.min(high);
    }

    pub(crate) fn stall(&self, enable: bool) {
        let mut state = self.state.lock();
        state.stall = enable;
        if !enable {
            self.settled.notify_all();
        }
    }

    pub(crate) fn get_size(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub(crate) fn get_busy_writers(&self) -> usize {
        self.state.lock().busy
    }

    pub(crate) fn clear_stats(&self) {
        for counter in [
            &self.item_count,
            &self.duplicate_count,
            &self.flush_count,
            &self.drain_count,
            &self.drain_msec,
            &self.drain_slowest_msec,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot {
            item_count: self.item_count.load(Ordering::Relaxed),
            duplicate_count: self.duplicate_count.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
            drain_count: self.drain_count.load(Ordering::Relaxed),
            drain_msec: self.drain_msec.load(Ordering::Relaxed),
            drain_slowest_msec: self.drain_slowest_msec.load(Ordering::Relaxed),
            pending: state.pending.len(),
            busy_writers: state.busy,
            high_watermark: state.high_watermark,
            low_watermark: state.low_watermark,
            stalling: state.stall,
        }
    }

    /// Stops the workers and joins them. Pending items are drained first so
    /// shutdown never loses accepted writes.
    pub(crate) fn stop_and_join(&self) {
        self.barrier();
        {
            let mut state = self.state.lock();
            state.stop = true;
        }
        self.work_ready.notify_all();
        self.settled.notify_all();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.join();
        }
    }

    fn worker_loop(&self, write: WriteFn) {
        loop {
            let atom = {
                let mut state = self.state.lock();
                loop {
                    if let Some(atom) = state.pending.pop_front() {
                        state.keyed.remove(&atom.to_string());
                        state.busy += 1;
                        if state.pending.len() < state.low_watermark {
                            self.settled.notify_all();
                        }
                        break atom;
                    }
                    if state.stop {
                        return;
                    }
                    self.work_ready.wait(&mut state);
                }
            };

            let started = Instant::now();
            write(atom);
            let elapsed = started.elapsed().as_millis() as u64;
            self.drain_count.fetch_add(1, Ordering::Relaxed);
            self.drain_msec.fetch_add(elapsed, Ordering::Relaxed);
            self.drain_slowest_msec.fetch_max(elapsed, Ordering::Relaxed);

            let mut state = self.state.lock();
            state.busy -= 1;
            if state.pending.is_empty() && state.busy == 0 {
                self.settled.notify_all();
            }
        }
    }
}
