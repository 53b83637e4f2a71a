//! # opflow-core — lazy asynchronous operations
//!
//! A small compositional algebra for asynchronous work. An operation
//! is a lazy [`Sender`]; starting it with a [`Receiver`] begins the
//! work, and exactly one of three completion channels fires exactly
//! once: *value*, *error*, or *stopped*.
//!
//! Pipelines are built by chaining adaptors:
//!
//! ```
//! use opflow_core::adapt::{just, let_error, sync_wait, then};
//! use opflow_core::error::OpError;
//!
//! let pipeline = let_error(
//!     then(just(2), |x: i32| x * 21),
//!     |_e: OpError| just(0),
//! );
//! assert_eq!(sync_wait(pipeline).unwrap(), Some(42));
//! ```
//!
//! Execution contexts (a reactor thread, a worker pool) plug in via
//! the [`sched::Scheduler`] trait; the `on` and `transfer` adaptors
//! migrate continuations between contexts.

pub mod adapt;
pub mod env;
pub mod error;
pub mod olog;
pub mod op;
pub mod sched;
pub mod stop;

pub use adapt::{
    box_sender, just, just_error, just_stopped, let_error, let_stopped, let_value, on,
    start_detached, sync_wait, then, transfer, transfer_just, when_all, when_all3, BoxSender,
};
pub use error::{OpError, OpResult};
pub use op::{OpState, Outcome, Receiver, Sender};
pub use sched::Scheduler;
pub use stop::{StopSource, StopToken};
