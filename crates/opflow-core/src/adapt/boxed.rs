//! Type-erased senders
//!
//! Routing code that produces differently shaped pipelines from one
//! decision point needs them unified under a single type; `box_sender`
//! erases the concrete sender behind one heap allocation.

use crate::error::OpError;
use crate::op::{Receiver, Sender};
use crate::stop::StopToken;

trait DynReceiver<T>: Send {
    fn set_value_boxed(self: Box<Self>, value: T);
    fn set_error_boxed(self: Box<Self>, error: OpError);
    fn set_stopped_boxed(self: Box<Self>);
    fn stop_token_ref(&self) -> StopToken;
}

impl<R: Receiver> DynReceiver<R::Value> for R {
    fn set_value_boxed(self: Box<Self>, value: R::Value) {
        (*self).set_value(value);
    }

    fn set_error_boxed(self: Box<Self>, error: OpError) {
        (*self).set_error(error);
    }

    fn set_stopped_boxed(self: Box<Self>) {
        (*self).set_stopped();
    }

    fn stop_token_ref(&self) -> StopToken {
        self.stop_token()
    }
}

struct BoxedReceiver<T> {
    inner: Box<dyn DynReceiver<T>>,
}

impl<T: Send + 'static> Receiver for BoxedReceiver<T> {
    type Value = T;

    fn set_value(self, value: T) {
        self.inner.set_value_boxed(value);
    }

    fn set_error(self, error: OpError) {
        self.inner.set_error_boxed(error);
    }

    fn set_stopped(self) {
        self.inner.set_stopped_boxed();
    }

    fn stop_token(&self) -> StopToken {
        self.inner.stop_token_ref()
    }
}

trait DynSender<T>: Send {
    fn start_boxed(self: Box<Self>, recv: BoxedReceiver<T>);
}

impl<S: Sender> DynSender<S::Value> for S {
    fn start_boxed(self: Box<Self>, recv: BoxedReceiver<S::Value>) {
        (*self).start(recv);
    }
}

/// A sender with its concrete type erased
pub struct BoxSender<T> {
    inner: Box<dyn DynSender<T>>,
}

/// Erase the concrete type of `src`
pub fn box_sender<S: Sender>(src: S) -> BoxSender<S::Value> {
    BoxSender {
        inner: Box::new(src),
    }
}

impl<T: Send + 'static> Sender for BoxSender<T> {
    type Value = T;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = T>,
    {
        self.inner.start_boxed(BoxedReceiver {
            inner: Box::new(recv),
        });
    }
}
