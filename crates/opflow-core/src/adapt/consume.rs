//! Terminal consumers: fire-and-forget and blocking wait

use crate::error::OpResult;
use crate::op::{Outcome, Receiver, Sender};
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex};

/// Start `src` and discard its completion
///
/// Errors are logged; value and stopped completions vanish silently.
pub fn start_detached<S: Sender>(src: S) {
    src.start(DetachedReceiver {
        _marker: PhantomData,
    });
}

struct DetachedReceiver<T> {
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + 'static> Receiver for DetachedReceiver<T> {
    type Value = T;

    fn set_value(self, _value: T) {}

    fn set_error(self, error: crate::error::OpError) {
        crate::owarn!("detached operation failed: {}", error);
    }

    fn set_stopped(self) {}
}

/// Start `src` and block the calling thread until it completes
///
/// Returns `Ok(Some(value))` on value, `Err(error)` on error and
/// `Ok(None)` on stopped.
pub fn sync_wait<S: Sender>(src: S) -> OpResult<Option<S::Value>> {
    let state = Arc::new(SyncState {
        slot: Mutex::new(None),
        cv: Condvar::new(),
    });
    src.start(SyncReceiver {
        state: state.clone(),
    });

    let mut guard = state.slot.lock().unwrap();
    while guard.is_none() {
        guard = state.cv.wait(guard).unwrap();
    }
    match guard.take() {
        Some(Outcome::Value(value)) => Ok(Some(value)),
        Some(Outcome::Error(error)) => Err(error),
        _ => Ok(None),
    }
}

struct SyncState<T> {
    slot: Mutex<Option<Outcome<T>>>,
    cv: Condvar,
}

struct SyncReceiver<T> {
    state: Arc<SyncState<T>>,
}

impl<T: Send + 'static> SyncReceiver<T> {
    fn finish(self, outcome: Outcome<T>) {
        let mut slot = self.state.slot.lock().unwrap();
        *slot = Some(outcome);
        self.state.cv.notify_one();
    }
}

impl<T: Send + 'static> Receiver for SyncReceiver<T> {
    type Value = T;

    fn set_value(self, value: T) {
        self.finish(Outcome::Value(value));
    }

    fn set_error(self, error: crate::error::OpError) {
        self.finish(Outcome::Error(error));
    }

    fn set_stopped(self) {
        self.finish(Outcome::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::{just, just_error, just_stopped};
    use crate::error::OpError;

    #[test]
    fn test_sync_wait_channels() {
        assert_eq!(sync_wait(just(1)).unwrap(), Some(1));
        assert_eq!(sync_wait(just_error::<i32>(OpError::Cancelled)), Err(OpError::Cancelled));
        assert_eq!(sync_wait(just_stopped::<i32>()).unwrap(), None);
    }

    #[test]
    fn test_start_detached_runs() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        start_detached(crate::adapt::then(just(()), move |_| {
            flag.store(true, Ordering::SeqCst);
        }));
        assert!(ran.load(Ordering::SeqCst));
    }
}
