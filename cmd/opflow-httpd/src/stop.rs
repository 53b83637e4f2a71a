//! Process-wide stop hook
//!
//! Signal handlers cannot carry context, so the reactor to stop is
//! registered once in a process-wide atomic pointer before the loop
//! starts. The handler itself only does an atomic load plus
//! `stop_from_signal` (atomic store + one `write(2)`), all
//! async-signal-safe.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use opflow_io::ReactorShared;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

static STOP_TARGET: AtomicPtr<ReactorShared> = AtomicPtr::new(std::ptr::null_mut());

extern "C" fn on_stop_signal(_signo: libc::c_int) {
    let target = STOP_TARGET.load(Ordering::Acquire);
    if !target.is_null() {
        unsafe { (*target).stop_from_signal() };
    }
}

/// Install SIGTERM/SIGINT handlers that stop `reactor`
///
/// Install-once: the first registered reactor stays the target for the
/// process lifetime, and its reference is never released.
pub fn install(reactor: &Arc<ReactorShared>) {
    let raw = Arc::into_raw(reactor.clone()) as *mut ReactorShared;
    if STOP_TARGET
        .compare_exchange(std::ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        // Already installed; drop the extra reference
        unsafe { drop(Arc::from_raw(raw)) };
        return;
    }

    let action = SigAction::new(
        SigHandler::Handler(on_stop_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe {
        let _ = sigaction(Signal::SIGTERM, &action);
        let _ = sigaction(Signal::SIGINT, &action);
    }
}
