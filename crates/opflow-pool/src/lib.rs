//! # opflow-pool — fixed-size worker pool
//!
//! N OS threads, each with its own unbounded FIFO of operation bodies,
//! plus a lock-free global fallback queue for submissions arriving from
//! outside the pool. Submissions from a pool thread stay on that
//! thread's queue; external submissions go to the global queue and wake
//! one worker round-robin. There is no work stealing.
//!
//! Each worker is single-threaded cooperative for its continuations:
//! queued bodies run to completion, one after another. On shutdown,
//! workers finish what is already queued, and anything left after the
//! threads exit is delivered a *stopped* completion.

use crossbeam_queue::SegQueue;
use opflow_core::op::OpState;
use opflow_core::sched::Scheduler;
use opflow_core::{odebug, oinfo};

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// Default worker count when `OPFLOW_POOL_THREADS` is unset
pub const DEFAULT_POOL_THREADS: usize = 8;

thread_local! {
    /// (owning pool, worker index) for pool threads; empty elsewhere
    static POOL_WORKER: Cell<Option<(usize, usize)>> = const { Cell::new(None) };
}

struct WorkerQueue {
    queue: Mutex<VecDeque<Box<dyn OpState>>>,
    cv: Condvar,
}

impl WorkerQueue {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
        }
    }
}

struct PoolShared {
    workers: Vec<WorkerQueue>,
    fallback: SegQueue<Box<dyn OpState>>,
    shutdown: AtomicBool,
    round_robin: AtomicUsize,
}

/// Pool identity used by the thread-affine submit path
fn pool_id(shared: &Arc<PoolShared>) -> usize {
    Arc::as_ptr(shared) as usize
}

/// Fixed pool of worker threads
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn a pool with exactly `num_threads` workers
    pub fn new(num_threads: usize) -> WorkerPool {
        let shared = Arc::new(PoolShared {
            workers: (0..num_threads).map(|_| WorkerQueue::new()).collect(),
            fallback: SegQueue::new(),
            shutdown: AtomicBool::new(false),
            round_robin: AtomicUsize::new(0),
        });

        let handles = (0..num_threads)
            .map(|id| {
                let shared = shared.clone();
                thread::Builder::new()
                    .name(format!("opflow-pool-{}", id))
                    .spawn(move || worker_main(shared, id))
                    .expect("failed to spawn pool worker thread")
            })
            .collect();

        oinfo!("opflow-pool: started with {} workers", num_threads);
        WorkerPool { shared, handles }
    }

    /// Get a scheduler handle onto this pool
    pub fn scheduler(&self) -> PoolScheduler {
        PoolScheduler {
            shared: self.shared.clone(),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.shared.workers.len()
    }

    /// Stop the workers, run what is already queued, stop the rest
    ///
    /// Returns how many un-run bodies received a stopped completion.
    pub fn shutdown(&mut self) -> usize {
        self.shared.shutdown.store(true, Ordering::Release);
        for worker in &self.shared.workers {
            let _guard = worker.queue.lock().unwrap();
            worker.cv.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }

        // Anything that raced past the workers is cancelled
        let mut stopped = 0;
        while let Some(op) = self.shared.fallback.pop() {
            op.set_stopped();
            stopped += 1;
        }
        for worker in &self.shared.workers {
            let drained: Vec<_> = worker.queue.lock().unwrap().drain(..).collect();
            for op in drained {
                op.set_stopped();
                stopped += 1;
            }
        }
        oinfo!("opflow-pool: shutdown, {} queued ops stopped", stopped);
        stopped
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.shutdown();
        }
    }
}

fn worker_main(shared: Arc<PoolShared>, id: usize) {
    POOL_WORKER.with(|cell| cell.set(Some((pool_id(&shared), id))));
    let my_queue = &shared.workers[id];

    loop {
        let local = my_queue.queue.lock().unwrap().pop_front();
        if let Some(mut op) = local {
            op.try_run();
            continue;
        }
        if let Some(mut op) = shared.fallback.pop() {
            op.try_run();
            continue;
        }
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        let mut guard = my_queue.queue.lock().unwrap();
        while guard.is_empty()
            && shared.fallback.is_empty()
            && !shared.shutdown.load(Ordering::Acquire)
        {
            guard = my_queue.cv.wait(guard).unwrap();
        }
    }
    odebug!("opflow-pool: worker {} exiting", id);
}

/// Scheduler handle onto a [`WorkerPool`]
#[derive(Clone)]
pub struct PoolScheduler {
    shared: Arc<PoolShared>,
}

impl Scheduler for PoolScheduler {
    fn submit(&self, op: Box<dyn OpState>) {
        if self.shared.shutdown.load(Ordering::Acquire) {
            op.set_stopped();
            return;
        }

        // Thread-affine: a pool thread keeps its own work local
        let local = POOL_WORKER.with(|cell| cell.get());
        if let Some((owner, worker_id)) = local {
            if owner == pool_id(&self.shared) {
                let worker = &self.shared.workers[worker_id];
                worker.queue.lock().unwrap().push_back(op);
                return;
            }
        }

        // External submission: global queue, wake one worker round-robin
        self.shared.fallback.push(op);
        let target = self.shared.round_robin.fetch_add(1, Ordering::Relaxed)
            % self.shared.workers.len();
        let worker = &self.shared.workers[target];
        let _guard = worker.queue.lock().unwrap();
        worker.cv.notify_one();
    }
}
