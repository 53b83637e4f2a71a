//! Scheduler hops

use crate::adapt::{just, let_value, Just};
use crate::op::{OpState, Receiver, Sender};
use crate::sched::Scheduler;

/// Sender returned by [`on`]
pub struct On<Sch, S> {
    sched: Sch,
    src: S,
}

/// Start `src` so that its first step runs on `sched`
///
/// The hop is a suspension point: a stop already requested when the
/// hop runs makes the completion stopped without starting `src`.
pub fn on<Sch, S>(sched: Sch, src: S) -> On<Sch, S>
where
    Sch: Scheduler,
    S: Sender,
{
    On { sched, src }
}

/// Run downstream continuations of `src` on `sched`
pub fn transfer<S, Sch>(src: S, sched: Sch) -> impl Sender<Value = S::Value>
where
    S: Sender,
    Sch: Scheduler,
{
    let_value(src, move |value| on(sched, just(value)))
}

/// Shorthand for `on(sched, just(value))`
pub fn transfer_just<Sch, T>(sched: Sch, value: T) -> On<Sch, Just<T>>
where
    Sch: Scheduler,
    T: Send + 'static,
{
    on(sched, just(value))
}

impl<Sch, S> Sender for On<Sch, S>
where
    Sch: Scheduler,
    S: Sender,
{
    type Value = S::Value;

    fn start<R>(self, recv: R)
    where
        R: Receiver<Value = S::Value>,
    {
        self.sched.submit(Box::new(HopOp {
            state: Some((self.src, recv)),
        }));
    }
}

struct HopOp<S, R> {
    state: Option<(S, R)>,
}

impl<S, R> OpState for HopOp<S, R>
where
    S: Sender,
    R: Receiver<Value = S::Value>,
{
    fn try_run(&mut self) -> bool {
        if let Some((src, recv)) = self.state.take() {
            if recv.stop_token().stop_requested() {
                recv.set_stopped();
            } else {
                src.start(recv);
            }
        }
        true
    }

    fn set_stopped(mut self: Box<Self>) {
        if let Some((_src, recv)) = self.state.take() {
            recv.set_stopped();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::sync_wait;
    use crate::op::OpState;

    /// Scheduler that runs submissions inline on the calling thread
    #[derive(Clone)]
    struct InlineScheduler;

    impl Scheduler for InlineScheduler {
        fn submit(&self, mut op: Box<dyn OpState>) {
            op.try_run();
        }
    }

    /// Scheduler that drops submissions after delivering stopped
    #[derive(Clone)]
    struct DrainedScheduler;

    impl Scheduler for DrainedScheduler {
        fn submit(&self, op: Box<dyn OpState>) {
            op.set_stopped();
        }
    }

    /// Scheduler that hands submissions to a worker thread
    #[derive(Clone)]
    struct ThreadScheduler;

    impl Scheduler for ThreadScheduler {
        fn submit(&self, mut op: Box<dyn OpState>) {
            std::thread::spawn(move || {
                op.try_run();
            });
        }
    }

    #[test]
    fn test_on_inline() {
        assert_eq!(sync_wait(on(InlineScheduler, just(9))).unwrap(), Some(9));
    }

    #[test]
    fn test_on_drained_context_stops() {
        assert_eq!(sync_wait(on(DrainedScheduler, just(9))).unwrap(), None);
    }

    #[test]
    fn test_transfer_runs_downstream_elsewhere() {
        let sched = ThreadScheduler;
        let main_thread = std::thread::current().id();
        let chain = crate::adapt::then(transfer(just(3), sched), move |x: i32| {
            assert_ne!(std::thread::current().id(), main_thread);
            x * 2
        });
        assert_eq!(sync_wait(chain).unwrap(), Some(6));
    }

    #[test]
    fn test_transfer_just() {
        assert_eq!(sync_wait(transfer_just(InlineScheduler, 5)).unwrap(), Some(5));
    }
}
