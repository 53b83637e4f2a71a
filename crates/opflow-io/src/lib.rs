//! # opflow-io — readiness-driven socket I/O
//!
//! A single-threaded `poll(2)` reactor with thread-safe submission,
//! an eventfd/self-pipe wakeup and stop-with-drain semantics, plus the
//! asynchronous socket operations built on it: `async_accept`,
//! `async_read`, `async_write` and the composite `read_request` /
//! `write_response` used by the HTTP server.
//!
//! The reactor thread is an execution context in the opflow-core
//! sense: [`IoScheduler`] resumes continuations on it.

pub mod context;
pub mod ops;
pub mod reactor;
pub mod socket;
mod wake;

pub use context::{IoContext, IoScheduler};
pub use ops::{async_accept, async_read, async_write, read_request, write_response};
pub use reactor::{Interest, Reactor, ReactorShared};
pub use socket::{Connection, ListeningSocket};
