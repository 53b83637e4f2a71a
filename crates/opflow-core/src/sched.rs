//! Scheduler contract
//!
//! A scheduler is a cheap handle onto an execution context. Submitting
//! an [`OpState`] transfers ownership to the context, which must either
//! run it (`try_run`) or, when draining at shutdown, deliver
//! `set_stopped`. The `on`/`transfer` adaptors are written purely in
//! terms of this trait, so reactor threads and pool threads compose the
//! same way.

use crate::op::OpState;

/// Handle used to resume continuations on a particular execution context
pub trait Scheduler: Clone + Send + Sync + 'static {
    /// Enqueue an operation body onto the context
    ///
    /// The context invokes `try_run` exactly once for scheduled
    /// continuations; on shutdown drain, un-run bodies receive
    /// `set_stopped` instead.
    fn submit(&self, op: Box<dyn OpState>);
}
