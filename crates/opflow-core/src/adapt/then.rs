//! Value-channel transformation

use crate::adapt::panic_message;
use crate::error::OpError;
use crate::op::{Receiver, Sender};
use crate::stop::StopToken;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Sender returned by [`then`]
pub struct Then<S, F> {
    src: S,
    f: F,
}

/// Map the value channel of `src` through `f`
///
/// Error and stopped completions pass through untouched. A panic in
/// `f` is captured and becomes an error completion.
pub fn then<S, F, U>(src: S, f: F) -> Then<S, F>
where
    S: Sender,
    F: FnOnce(S::Value) -> U + Send + 'static,
    U: Send + 'static,
{
    Then { src, f }
}

impl<S, F, U> Sender for Then<S, F>
where
    S: Sender,
    F: FnOnce(S::Value) -> U + Send + 'static,
    U: Send + 'static,
{
    type Value = U;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = U>,
    {
        self.src.start(ThenReceiver {
            f: self.f,
            next: recv,
            _marker: PhantomData,
        });
    }
}

struct ThenReceiver<T, F, R> {
    f: F,
    next: R,
    _marker: PhantomData<fn(T)>,
}

impl<T, U, F, R> Receiver for ThenReceiver<T, F, R>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnOnce(T) -> U + Send + 'static,
    R: Receiver<Value = U>,
{
    type Value = T;

    fn set_value(self, value: T) {
        let ThenReceiver { f, next, .. } = self;
        match catch_unwind(AssertUnwindSafe(move || f(value))) {
            Ok(out) => next.set_value(out),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::{just, just_error, sync_wait};

    #[test]
    fn test_then_composes() {
        // g(f(v)) for a two-step chain
        let chain = then(then(just(5), |x: i32| x * 2), |x: i32| x + 1);
        assert_eq!(sync_wait(chain).unwrap(), Some(11));
    }

    #[test]
    fn test_then_error_passthrough() {
        let chain = then(just_error::<i32>(OpError::BadRequest), |x: i32| x + 1);
        assert_eq!(sync_wait(chain), Err(OpError::BadRequest));
    }

    #[test]
    fn test_then_panic_becomes_error() {
        let chain = then(just(1), |_x: i32| -> i32 { panic!("boom") });
        match sync_wait(chain) {
            Err(OpError::Panic(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected panic error, got {:?}", other),
        }
    }
}
