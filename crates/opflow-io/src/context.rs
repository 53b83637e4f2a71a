//! I/O context: one reactor plus its scheduler

use crate::reactor::{Reactor, ReactorShared};
use opflow_core::error::OpResult;
use opflow_core::op::OpState;
use opflow_core::sched::Scheduler;
use std::sync::Arc;

/// Owner of one reactor
///
/// `run` drives the loop on the calling thread; the scheduler hands
/// continuations to that thread from anywhere.
pub struct IoContext {
    reactor: Reactor,
}

impl IoContext {
    pub fn new() -> OpResult<IoContext> {
        Ok(IoContext {
            reactor: Reactor::new()?,
        })
    }

    /// Run the loop on the current thread until `stop`; returns the
    /// number of completed operations
    pub fn run(&mut self) -> usize {
        self.reactor.run()
    }

    /// At most one unit of progress; false when nothing is runnable
    pub fn run_one(&mut self) -> bool {
        self.reactor.run_one()
    }

    pub fn stop(&self) {
        self.reactor.stop();
    }

    /// Submission handle, shareable across threads
    pub fn shared(&self) -> Arc<ReactorShared> {
        self.reactor.shared()
    }

    /// Scheduler whose continuations run on the reactor thread
    pub fn scheduler(&self) -> IoScheduler {
        IoScheduler {
            shared: self.reactor.shared(),
        }
    }
}

/// Scheduler handle onto an [`IoContext`]
#[derive(Clone)]
pub struct IoScheduler {
    shared: Arc<ReactorShared>,
}

impl Scheduler for IoScheduler {
    fn submit(&self, op: Box<dyn OpState>) {
        self.shared.submit_inline(op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opflow_core::adapt::{sync_wait, then, transfer_just};
    use std::thread;

    #[test]
    fn test_scheduler_hops_to_reactor_thread() {
        let mut ctx = IoContext::new().unwrap();
        let sched = ctx.scheduler();
        let shared = ctx.shared();
        let handle = thread::Builder::new()
            .name("io-context-test".into())
            .spawn(move || ctx.run())
            .unwrap();

        let name = sync_wait(then(transfer_just(sched, ()), |_| {
            thread::current().name().unwrap_or("").to_string()
        }))
        .unwrap()
        .unwrap();
        assert_eq!(name, "io-context-test");

        shared.stop();
        assert!(handle.join().unwrap() >= 1);
    }
}
