//! The poll(2) readiness loop
//!
//! Single-threaded dispatcher for nonblocking descriptors. Other
//! threads submit operation bodies through [`ReactorShared`]; the loop
//! thread owns two parallel vectors (`pollfd`s and operation bodies,
//! kept index-aligned, slot 0 reserved for the wake fd) and retries
//! each I/O body on readiness until it reports completion. Non-I/O
//! bodies run exactly once, inline.
//!
//! For any (descriptor, interest) pair at most one registration is
//! pending at a time; registrations enter at submit and leave when the
//! body completes or the loop drains.

use crate::wake::WakeFd;
use opflow_core::error::OpResult;
use opflow_core::odebug;
use opflow_core::op::OpState;

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Readiness interest of an I/O registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

impl Interest {
    fn events(self) -> libc::c_short {
        match self {
            Interest::Read => libc::POLLIN,
            Interest::Write => libc::POLLOUT,
        }
    }
}

struct Submission {
    fd: RawFd,
    events: libc::c_short,
    body: Box<dyn OpState>,
}

/// Thread-safe submission side of a reactor
pub struct ReactorShared {
    wake: WakeFd,
    should_stop: AtomicBool,
    inbox: Mutex<Vec<Submission>>,
    cv: Condvar,
}

impl ReactorShared {
    /// Register an I/O operation; `body.try_run` fires on readiness
    /// until it returns true
    ///
    /// After a stop the body is immediately completed stopped.
    pub fn submit_io(&self, fd: RawFd, interest: Interest, body: Box<dyn OpState>) {
        if self.stop_requested() {
            body.set_stopped();
            return;
        }
        {
            let mut inbox = self.inbox.lock().unwrap();
            inbox.push(Submission {
                fd,
                events: interest.events(),
                body,
            });
            self.cv.notify_one();
        }
        self.wake.wake();
    }

    /// Enqueue a non-I/O continuation; `try_run` fires exactly once on
    /// the reactor thread
    pub fn submit_inline(&self, body: Box<dyn OpState>) {
        if self.stop_requested() {
            body.set_stopped();
            return;
        }
        {
            let mut inbox = self.inbox.lock().unwrap();
            inbox.push(Submission {
                fd: -1,
                events: 0,
                body,
            });
            self.cv.notify_one();
        }
        self.wake.wake();
    }

    /// Set the stop flag and wake the loop
    pub fn stop(&self) {
        self.should_stop.store(true, Ordering::Release);
        self.wake.wake();
        let _guard = self.inbox.lock().unwrap();
        self.cv.notify_all();
    }

    /// Async-signal-safe stop: atomic store plus one `write(2)`
    ///
    /// The loop's idle wait is time-bounded, so skipping the condvar
    /// notification here only delays shutdown by that bound.
    pub fn stop_from_signal(&self) {
        self.should_stop.store(true, Ordering::Release);
        self.wake.wake();
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.should_stop.load(Ordering::Acquire)
    }
}

/// The loop itself; lives on (and is driven by) one thread
pub struct Reactor {
    shared: Arc<ReactorShared>,
    // Index-aligned; slot 0 is the wake fd with no body.
    poll_set: Vec<libc::pollfd>,
    ops: Vec<Option<Box<dyn OpState>>>,
    scratch: Vec<Submission>,
    cursor: usize,
    completed: usize,
}

impl Reactor {
    pub fn new() -> OpResult<Reactor> {
        let shared = Arc::new(ReactorShared {
            wake: WakeFd::new()?,
            should_stop: AtomicBool::new(false),
            inbox: Mutex::new(Vec::with_capacity(128)),
            cv: Condvar::new(),
        });
        let poll_set = vec![libc::pollfd {
            fd: shared.wake.fd(),
            events: libc::POLLIN,
            revents: 0,
        }];
        Ok(Reactor {
            shared,
            poll_set,
            ops: vec![None],
            scratch: Vec::with_capacity(128),
            cursor: 1,
            completed: 0,
        })
    }

    /// Handle for submitting work from other threads
    pub fn shared(&self) -> Arc<ReactorShared> {
        self.shared.clone()
    }

    /// One unit of progress: run a non-I/O op, complete one ready I/O
    /// op, or return false if nothing is runnable without blocking
    pub fn run_one(&mut self) -> bool {
        loop {
            self.drain_inbox();
            if self.shared.stop_requested() {
                return false;
            }
            if self.poll_set.len() <= 1 {
                return false;
            }
            if self.complete_one_ready() {
                return true;
            }
            if !self.do_poll() {
                return false;
            }
        }
    }

    /// Drive the loop until stop; pending operations are then stopped
    ///
    /// Returns the number of operations completed during this run,
    /// stopped ones included.
    pub fn run(&mut self) -> usize {
        let baseline = self.completed;
        while !self.shared.stop_requested() {
            if self.run_one() {
                continue;
            }
            if self.shared.stop_requested() {
                break;
            }
            if self.poll_set.len() > 1 {
                // poll failed; re-enter after a beat
                std::thread::yield_now();
                continue;
            }
            // Idle: wait for submissions. Time-bounded so that a stop
            // from a signal handler (no condvar notify) is noticed.
            let guard = self.shared.inbox.lock().unwrap();
            if guard.is_empty() && !self.shared.stop_requested() {
                let _ = self
                    .shared
                    .cv
                    .wait_timeout(guard, Duration::from_millis(50))
                    .unwrap();
            }
        }
        self.drain_remaining();
        self.completed - baseline
    }

    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Move submitted operations into the loop's own vectors
    ///
    /// Non-I/O bodies run here; I/O bodies get one opportunistic
    /// attempt and are parked only if still incomplete.
    fn drain_inbox(&mut self) {
        loop {
            self.scratch.clear();
            {
                let mut inbox = self.shared.inbox.lock().unwrap();
                std::mem::swap(&mut *inbox, &mut self.scratch);
            }
            if self.scratch.is_empty() {
                return;
            }

            self.poll_set.reserve(self.scratch.len());
            self.ops.reserve(self.scratch.len());
            for sub in self.scratch.drain(..) {
                let Submission {
                    fd,
                    events,
                    mut body,
                } = sub;
                if fd < 0 {
                    body.try_run();
                    self.completed += 1;
                } else if body.try_run() {
                    self.completed += 1;
                } else {
                    self.poll_set.push(libc::pollfd {
                        fd,
                        events,
                        revents: 0,
                    });
                    self.ops.push(Some(body));
                }
            }
            // Running bodies may have submitted again; loop.
        }
    }

    /// Scan from the cursor for one ready registration and finish it
    fn complete_one_ready(&mut self) -> bool {
        self.shared.wake.drain();

        let mut i = self.cursor;
        while i < self.poll_set.len() {
            let p = self.poll_set[i];
            let ready = (p.events & p.revents) != 0
                || (p.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL)) != 0;
            if ready {
                if let Some(body) = self.ops[i].as_mut() {
                    if body.try_run() {
                        self.poll_set.remove(i);
                        self.ops.remove(i);
                        self.cursor = i;
                        self.completed += 1;
                        return true;
                    }
                }
            }
            i += 1;
        }
        self.cursor = self.poll_set.len();
        false
    }

    /// Block in poll(2) until something is ready
    fn do_poll(&mut self) -> bool {
        for p in &mut self.poll_set {
            p.revents = 0;
        }
        loop {
            // A stop or submission whose wake byte was already drained
            // must not be slept through; bounce back to the caller.
            if self.shared.stop_requested() || !self.shared.inbox.lock().unwrap().is_empty() {
                return true;
            }
            let rc = unsafe {
                libc::poll(
                    self.poll_set.as_mut_ptr(),
                    self.poll_set.len() as libc::nfds_t,
                    -1,
                )
            };
            if rc >= 0 {
                // Resume scanning past the wake slot
                self.cursor = 1;
                return true;
            }
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            if errno != libc::EINVAL {
                return false;
            }
        }
    }

    /// Deliver stopped to everything still registered or queued
    fn drain_remaining(&mut self) {
        loop {
            self.scratch.clear();
            {
                let mut inbox = self.shared.inbox.lock().unwrap();
                std::mem::swap(&mut *inbox, &mut self.scratch);
            }
            if self.scratch.is_empty() {
                break;
            }
            for sub in self.scratch.drain(..) {
                sub.body.set_stopped();
                self.completed += 1;
            }
        }

        let mut stopped = 0;
        for slot in self.ops.drain(1..) {
            if let Some(body) = slot {
                body.set_stopped();
                stopped += 1;
            }
        }
        self.completed += stopped;
        self.poll_set.truncate(1);
        self.cursor = 1;
        if stopped > 0 {
            odebug!("reactor: drained {} pending operations", stopped);
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        // A loop dropped without running to completion still owes every
        // parked body its stopped signal.
        self.drain_remaining();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opflow_core::adapt::{on, sync_wait, then};
    use opflow_core::error::OpError;
    use opflow_core::just;
    use opflow_core::sched::Scheduler;
    use std::thread;

    #[derive(Clone)]
    struct TestScheduler {
        shared: Arc<ReactorShared>,
    }

    impl Scheduler for TestScheduler {
        fn submit(&self, op: Box<dyn OpState>) {
            self.shared.submit_inline(op);
        }
    }

    fn spawn_reactor() -> (Arc<ReactorShared>, thread::JoinHandle<usize>) {
        let mut reactor = Reactor::new().unwrap();
        let shared = reactor.shared();
        let handle = thread::Builder::new()
            .name("reactor-test".into())
            .spawn(move || reactor.run())
            .unwrap();
        (shared, handle)
    }

    #[test]
    fn test_inline_op_runs_on_reactor_thread() {
        let (shared, handle) = spawn_reactor();
        let sched = TestScheduler {
            shared: shared.clone(),
        };

        let name = sync_wait(then(on(sched, just(())), |_| {
            thread::current().name().unwrap_or("").to_string()
        }))
        .unwrap()
        .unwrap();
        assert_eq!(name, "reactor-test");

        shared.stop();
        assert!(handle.join().unwrap() >= 1);
    }

    #[test]
    fn test_run_one_without_work() {
        let mut reactor = Reactor::new().unwrap();
        assert!(!reactor.run_one());
    }

    #[test]
    fn test_submit_after_stop_is_stopped() {
        let (shared, handle) = spawn_reactor();
        shared.stop();
        handle.join().unwrap();

        let sched = TestScheduler {
            shared: shared.clone(),
        };
        assert_eq!(sync_wait(on(sched, just(5))).unwrap(), None);
    }

    #[test]
    fn test_error_channel_reaches_consumer() {
        let (shared, handle) = spawn_reactor();
        let sched = TestScheduler {
            shared: shared.clone(),
        };

        let result = sync_wait(on(sched, opflow_core::just_error::<i32>(OpError::Parse)));
        assert_eq!(result, Err(OpError::Parse));

        shared.stop();
        handle.join().unwrap();
    }
}
