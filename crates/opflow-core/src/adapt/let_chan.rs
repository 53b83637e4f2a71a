//! Channel-selective continuation into a new sender
//!
//! `let_value` continues the pipeline with a sender produced from the
//! upstream value; `let_error` and `let_stopped` do the same for the
//! other two channels, which is how pipelines convert failures and
//! cancellation into fallback values.

use crate::adapt::panic_message;
use crate::error::OpError;
use crate::op::{Receiver, Sender};
use crate::stop::StopToken;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Sender returned by [`let_value`]
pub struct LetValue<S, F> {
    src: S,
    f: F,
}

/// On value, start the sender produced by `f`; its completion is final
pub fn let_value<S, F, S2>(src: S, f: F) -> LetValue<S, F>
where
    S: Sender,
    S2: Sender,
    F: FnOnce(S::Value) -> S2 + Send + 'static,
{
    LetValue { src, f }
}

impl<S, F, S2> Sender for LetValue<S, F>
where
    S: Sender,
    S2: Sender,
    F: FnOnce(S::Value) -> S2 + Send + 'static,
{
    type Value = S2::Value;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = S2::Value>,
    {
        self.src.start(LetValueReceiver {
            f: self.f,
            next: recv,
            _marker: PhantomData,
        });
    }
}

struct LetValueReceiver<T, F, R> {
    f: F,
    next: R,
    _marker: PhantomData<fn(T)>,
}

impl<T, F, S2, R> Receiver for LetValueReceiver<T, F, R>
where
    T: Send + 'static,
    S2: Sender,
    F: FnOnce(T) -> S2 + Send + 'static,
    R: Receiver<Value = S2::Value>,
{
    type Value = T;

    fn set_value(self, value: T) {
        let LetValueReceiver { f, next, .. } = self;
        match catch_unwind(AssertUnwindSafe(move || f(value))) {
            Ok(inner) => inner.start(next),
            Err(payload) => next.set_error(OpError::Panic(panic_message(payload))),
        }
    }

    fn set_error(self, error: OpError) {
        self.next.set_error(error);
    }

    fn set_stopped(self) {
        self.next.set_stopped();
    }

    fn stop_token(&self) -> StopToken {
        self.next.stop_token()
    }
}

/// Sender returned by [`let_error`]
pub struct LetError<S, F> {
    src: S,
    f: F,
}

/// On error, start the sender produced by `f`; value and stopped pass through
pub fn let_error<S, F, S2>(src: S, f: F) -> LetError<S, F>
where
    S: Sender,
    S2: Sender<Value = S::Value>,
    F: FnOnce(OpError) -> S2 + Send + 'static,
{
    LetError { src, f }
}

impl<S, F, S2> Sender for LetError<S, F>
where
    S: Sender,
    S2: Sender<Value = S::Value>,
    F: FnOnce(OpError) -> S2 + Send + 'static,
{
    type Value = S::Value;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = S::Value>,
    {
        self.src.start(LetErrorReceiver {
            f: self.f,
            next: recv,
        });
    }
}

struct LetErrorReceiver<F, R> {
    f: F,
    next: R,
}

impl<F, S2, R> Receiver for LetErrorReceiver<F, R>
where
    S2: Sender<Value = R::Value>,
    F: FnOnce(OpError) -> S2 + Send + 'static,
    R: Receiver,
{
    type Value = R::Value;

    fn set_value(self, value: R::Value) {
        self.next.set_value(value);
    }

    fn set_error(self, error: OpError) {
        let LetErrorReceiver { f, next } = self;
        match catch_unwind(AssertUnwindSafe(move || f(error))) {
            Ok(inner) => inner.start(next),
            Err(payload) => next.set_error(OpError::Panic(panic_message(payload))),
        }
    }

    fn set_stopped(self) {
        self.next.set_stopped();
    }

    fn stop_token(&self) -> StopToken {
        self.next.stop_token()
    }
}

/// Sender returned by [`let_stopped`]
pub struct LetStopped<S, F> {
    src: S,
    f: F,
}

/// On stopped, start the sender produced by `f`; value and error pass through
pub fn let_stopped<S, F, S2>(src: S, f: F) -> LetStopped<S, F>
where
    S: Sender,
    S2: Sender<Value = S::Value>,
    F: FnOnce() -> S2 + Send + 'static,
{
    LetStopped { src, f }
}

impl<S, F, S2> Sender for LetStopped<S, F>
where
    S: Sender,
    S2: Sender<Value = S::Value>,
    F: FnOnce() -> S2 + Send + 'static,
{
    type Value = S::Value;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = S::Value>,
    {
        self.src.start(LetStoppedReceiver {
            f: self.f,
            next: recv,
        });
    }
}

struct LetStoppedReceiver<F, R> {
    f: F,
    next: R,
}

impl<F, S2, R> Receiver for LetStoppedReceiver<F, R>
where
    S2: Sender<Value = R::Value>,
    F: FnOnce() -> S2 + Send + 'static,
    R: Receiver,
{
    type Value = R::Value;

    fn set_value(self, value: R::Value) {
        self.next.set_value(value);
    }

    fn set_error(self, error: OpError) {
        self.next.set_error(error);
    }

    fn set_stopped(self) {
        let LetStoppedReceiver { f, next } = self;
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(inner) => inner.start(next),
            Err(payload) => next.set_error(OpError::Panic(panic_message(payload))),
        }
    }

    fn stop_token(&self) -> StopToken {
        self.next.stop_token()
    }
}
