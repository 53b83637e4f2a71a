//! Stop tokens for cooperative cancellation
//!
//! A `StopSource` owns the request flag; any number of `StopToken`s
//! observe it. Sources can be chained to a parent token so that a stop
//! requested upstream is visible downstream without extra bookkeeping.
//! A token reaching a suspension point makes the next completion of
//! that chain *stopped*.

use crate::error::{OpError, OpResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct StopState {
    requested: AtomicBool,
    parent: Option<StopToken>,
}

/// Owner side of a cancellation request
#[derive(Clone)]
pub struct StopSource {
    state: Arc<StopState>,
}

impl StopSource {
    /// Create an independent stop source
    pub fn new() -> Self {
        Self {
            state: Arc::new(StopState {
                requested: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// Create a source whose tokens also observe `parent`
    ///
    /// A stop requested on the parent is seen by every token of this
    /// source; requesting stop here does not affect the parent.
    pub fn with_parent(parent: StopToken) -> Self {
        Self {
            state: Arc::new(StopState {
                requested: AtomicBool::new(false),
                parent: Some(parent),
            }),
        }
    }

    /// Request cancellation
    pub fn request_stop(&self) {
        self.state.requested.store(true, Ordering::Release);
    }

    /// Get an observer token
    pub fn token(&self) -> StopToken {
        StopToken {
            state: Some(self.state.clone()),
        }
    }
}

impl Default for StopSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a cancellation request
#[derive(Clone)]
pub struct StopToken {
    state: Option<Arc<StopState>>,
}

impl StopToken {
    /// A token that never reports a stop request
    pub fn never() -> Self {
        Self { state: None }
    }

    /// Check whether a stop was requested here or on any parent
    #[inline]
    pub fn stop_requested(&self) -> bool {
        let mut cur = self.state.as_deref();
        while let Some(state) = cur {
            if state.requested.load(Ordering::Acquire) {
                return true;
            }
            cur = state.parent.as_ref().and_then(|t| t.state.as_deref());
        }
        false
    }

    /// Error out of a long computation when a stop was requested
    ///
    /// The usual pattern inside CPU-bound continuations:
    /// ```ignore
    /// token.check()?; // Err(Cancelled) once stop is requested
    /// ```
    #[inline]
    pub fn check(&self) -> OpResult<()> {
        if self.stop_requested() {
            Err(OpError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for StopToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopToken")
            .field("stop_requested", &self.stop_requested())
            .finish()
    }
}
