//! The three-channel completion protocol
//!
//! A [`Sender`] is a lazy description of asynchronous work. Nothing
//! happens at construction; work begins when a consumer calls
//! [`Sender::start`] with a [`Receiver`]. After that, the operation
//! must eventually invoke exactly one of the receiver's three channels,
//! exactly once:
//!
//! - `set_value(v)`: success;
//! - `set_error(e)`: failure, carrying an [`OpError`];
//! - `set_stopped()`: cancelled.
//!
//! Receivers are consumed by completion, so the at-most-once rule is
//! enforced by ownership. Operation bodies that need to be retried by
//! an execution context (readiness-driven I/O, scheduled hops)
//! implement [`OpState`] and are parked as boxed trait objects.

use crate::error::OpError;
use crate::stop::StopToken;

/// Continuation passed to an operation at start time
///
/// Exactly one of the three completion methods fires per started
/// operation. `stop_token` exposes the cancellation environment so
/// adaptors can thread it through a chain; leaf receivers keep the
/// default.
pub trait Receiver: Send + 'static {
    /// Payload of the value channel
    type Value: Send + 'static;

    /// Complete with a value
    fn set_value(self, value: Self::Value);

    /// Complete with an error
    fn set_error(self, error: OpError);

    /// Complete as cancelled
    fn set_stopped(self);

    /// The cancellation token observed at this point of the chain
    fn stop_token(&self) -> StopToken {
        StopToken::never()
    }
}

/// A lazy operation
///
/// `start` consumes the sender; operations are not restartable. The
/// connect/start split of classic sender/receiver designs collapses
/// into the single call: ownership guarantees the operation state
/// lives until its completion fires.
pub trait Sender: Send + Sized + 'static {
    /// Payload type of the value channel
    type Value: Send + 'static;

    /// Begin the work, eventually completing `recv` on exactly one channel
    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = Self::Value>;
}

/// An operation body parked in an execution context
///
/// The context calls `try_run` when the operation may be able to make
/// progress. For readiness-driven I/O it is called repeatedly until it
/// returns `true` (a value or error completion was delivered); for
/// scheduled continuations it is called exactly once and the result is
/// ignored. `set_stopped` delivers the cancelled channel when the
/// context drains without running the body.
pub trait OpState: Send {
    /// Attempt to make progress; `true` iff the operation completed
    fn try_run(&mut self) -> bool;

    /// Deliver the stopped channel instead of running
    fn set_stopped(self: Box<Self>);
}

/// Terminal state of a completed operation, as observed by a consumer
#[derive(Debug)]
pub enum Outcome<T> {
    Value(T),
    Error(OpError),
    Stopped,
}
