//! Concurrent join of independent senders

use crate::error::OpError;
use crate::op::{Receiver, Sender};
use crate::stop::{StopSource, StopToken};
use std::sync::{Arc, Mutex};

/// Sender returned by [`when_all`]
pub struct WhenAll<SA, SB> {
    a: SA,
    b: SB,
}

/// Start both senders concurrently and join their completions
///
/// Value-completes with the pair of values only if both children
/// value-complete; the tuple positions are fixed regardless of
/// completion order. On the first child error, stop is requested on the
/// sibling and the join error-completes once both children settle. If
/// any child completes stopped (and none errored), the join completes
/// stopped. No ordering between the children is implied.
pub fn when_all<SA, SB>(a: SA, b: SB) -> WhenAll<SA, SB>
where
    SA: Sender,
    SB: Sender,
{
    WhenAll { a, b }
}

/// Three-way [`when_all`]
pub fn when_all3<SA, SB, SC>(
    a: SA,
    b: SB,
    c: SC,
) -> impl Sender<Value = (SA::Value, SB::Value, SC::Value)>
where
    SA: Sender,
    SB: Sender,
    SC: Sender,
{
    crate::adapt::then(when_all(when_all(a, b), c), |((va, vb), vc)| (va, vb, vc))
}

impl<SA, SB> Sender for WhenAll<SA, SB>
where
    SA: Sender,
    SB: Sender,
{
    type Value = (SA::Value, SB::Value);

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = (SA::Value, SB::Value)>,
    {
        let shared = Arc::new(JoinShared {
            stop: StopSource::with_parent(recv.stop_token()),
            inner: Mutex::new(JoinInner {
                a: None,
                b: None,
                error: None,
                stopped: false,
                remaining: 2,
                recv: Some(recv),
            }),
        });
        self.a.start(ChildA {
            shared: shared.clone(),
        });
        self.b.start(ChildB { shared });
    }
}

struct JoinShared<VA, VB, R> {
    stop: StopSource,
    inner: Mutex<JoinInner<VA, VB, R>>,
}

struct JoinInner<VA, VB, R> {
    a: Option<VA>,
    b: Option<VB>,
    error: Option<OpError>,
    stopped: bool,
    remaining: u8,
    recv: Option<R>,
}

impl<VA, VB, R> JoinShared<VA, VB, R>
where
    VA: Send + 'static,
    VB: Send + 'static,
    R: Receiver<Value = (VA, VB)>,
{
    /// Record one child settling; fire the join completion on the last
    fn settle(&self, apply: impl FnOnce(&mut JoinInner<VA, VB, R>)) {
        let fire = {
            let mut inner = self.inner.lock().unwrap();
            apply(&mut inner);
            inner.remaining -= 1;
            if inner.remaining == 0 {
                inner.recv.take().map(|recv| {
                    (recv, inner.a.take(), inner.b.take(), inner.error.take(), inner.stopped)
                })
            } else {
                None
            }
        };
        if let Some((recv, a, b, error, stopped)) = fire {
            if let Some(e) = error {
                recv.set_error(e);
            } else if stopped {
                recv.set_stopped();
            } else {
                let (Some(va), Some(vb)) = (a, b) else {
                    recv.set_stopped();
                    return;
                };
                recv.set_value((va, vb));
            }
        }
    }
}

struct ChildA<VA, VB, R> {
    shared: Arc<JoinShared<VA, VB, R>>,
}

impl<VA, VB, R> Receiver for ChildA<VA, VB, R>
where
    VA: Send + 'static,
    VB: Send + 'static,
    R: Receiver<Value = (VA, VB)>,
{
    type Value = VA;

    fn set_value(self, value: VA) {
        self.shared.settle(|inner| inner.a = Some(value));
    }

    fn set_error(self, error: OpError) {
        self.shared.stop.request_stop();
        self.shared.settle(|inner| {
            inner.error.get_or_insert(error);
        });
    }

    fn set_stopped(self) {
        self.shared.settle(|inner| inner.stopped = true);
    }

    fn stop_token(&self) -> StopToken {
        self.shared.stop.token()
    }
}

struct ChildB<VA, VB, R> {
    shared: Arc<JoinShared<VA, VB, R>>,
}

impl<VA, VB, R> Receiver for ChildB<VA, VB, R>
where
    VA: Send + 'static,
    VB: Send + 'static,
    R: Receiver<Value = (VA, VB)>,
{
    type Value = VB;

    fn set_value(self, value: VB) {
        self.shared.settle(|inner| inner.b = Some(value));
    }

    fn set_error(self, error: OpError) {
        self.shared.stop.request_stop();
        self.shared.settle(|inner| {
            inner.error.get_or_insert(error);
        });
    }

    fn set_stopped(self) {
        self.shared.settle(|inner| inner.stopped = true);
    }

    fn stop_token(&self) -> StopToken {
        self.shared.stop.token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::{just, just_error, just_stopped, sync_wait};

    #[test]
    fn test_when_all_values() {
        // Tuple positions are fixed: (a, b)
        assert_eq!(sync_wait(when_all(just(1), just("x"))).unwrap(), Some((1, "x")));
        assert_eq!(sync_wait(when_all(just("x"), just(1))).unwrap(), Some(("x", 1)));
    }

    #[test]
    fn test_when_all_error_wins() {
        // when_all(just(1), fail(e)) completes with e, never with a value
        let joined = when_all(just(1), just_error::<i32>(OpError::Syscall(5)));
        assert_eq!(sync_wait(joined), Err(OpError::Syscall(5)));
    }

    #[test]
    fn test_when_all_stopped() {
        let joined = when_all(just(1), just_stopped::<i32>());
        assert_eq!(sync_wait(joined).unwrap(), None);
    }

    #[test]
    fn test_when_all_error_beats_stopped() {
        let joined = when_all(just_stopped::<i32>(), just_error::<i32>(OpError::Parse));
        assert_eq!(sync_wait(joined), Err(OpError::Parse));
    }

    #[test]
    fn test_when_all3() {
        assert_eq!(
            sync_wait(when_all3(just(1), just(2), just(3))).unwrap(),
            Some((1, 2, 3))
        );
    }

    #[test]
    fn test_error_requests_stop_on_sibling() {
        use std::sync::atomic::{AtomicBool, Ordering};

        // A child that records the stop token state it observes at start.
        struct Probe(Arc<AtomicBool>);
        impl Sender for Probe {
            type Value = i32;
            fn start<R: Receiver<Value = i32>>(self, recv: R) {
                self.0.store(recv.stop_token().stop_requested(), Ordering::SeqCst);
                recv.set_value(0);
            }
        }

        // The erroring child starts first, so by the time the probe
        // starts the join has already requested stop on its siblings.
        let observed = Arc::new(AtomicBool::new(false));
        let joined = when_all(just_error::<i32>(OpError::Parse), Probe(observed.clone()));
        assert_eq!(sync_wait(joined), Err(OpError::Parse));
        assert!(observed.load(Ordering::SeqCst));
    }
}
