//! Leaf senders that complete immediately

use crate::error::OpError;
use crate::op::{Receiver, Sender};
use std::marker::PhantomData;

/// Sender that value-completes with the given payload
pub struct Just<T> {
    value: T,
}

/// Create a sender that immediately value-completes
pub fn just<T: Send + 'static>(value: T) -> Just<T> {
    Just { value }
}

impl<T: Send + 'static> Sender for Just<T> {
    type Value = T;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = T>,
    {
        recv.set_value(self.value);
    }
}

/// Sender that error-completes with the given error
pub struct JustError<T> {
    error: OpError,
    _marker: PhantomData<fn() -> T>,
}

/// Create a sender that immediately error-completes
pub fn just_error<T: Send + 'static>(error: OpError) -> JustError<T> {
    JustError {
        error,
        _marker: PhantomData,
    }
}

impl<T: Send + 'static> Sender for JustError<T> {
    type Value = T;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = T>,
    {
        recv.set_error(self.error);
    }
}

/// Sender that completes stopped
pub struct JustStopped<T> {
    _marker: PhantomData<fn() -> T>,
}

/// Create a sender that immediately completes stopped
pub fn just_stopped<T: Send + 'static>() -> JustStopped<T> {
    JustStopped {
        _marker: PhantomData,
    }
}

impl<T: Send + 'static> Sender for JustStopped<T> {
    type Value = T;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = T>,
    {
        recv.set_stopped();
    }
}
