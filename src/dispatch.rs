//! The dispatch loop.
//!
//! # One invocation
//!
//! Every `handle` call creates an [`Invocation`]: a snapshot of the steps,
//! the current arguments, a cursor and at most one pending resume request.
//! A [`Next`] does not call the following step itself. It records a request
//! and, if nobody is driving the invocation at that moment, starts driving
//! it:
//!
//! ```text
//! handle(args, cb)
//!        ↓ resume(None, None)          ← records the request, becomes driver
//! drive() loop
//!        ↓ select()                    ← skips normal steps while err is set
//! invoke(step)                         ← step runs outside the lock
//!        ↓ next.call()                 ← driver already running: just records
//! drive() loop picks the request up    ← no recursion, constant stack depth
//!        ↓ …
//! Finish → callback(err, args)         ← exactly once, or nothing
//! ```
//!
//! A step that keeps its `Next` for later simply leaves no request behind;
//! the loop stops, and whichever thread eventually continues becomes the
//! driver from there on. Steps of one invocation therefore never overlap.

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::error::Panic;
use crate::next::Next;
use crate::step::Step;

/// The terminal callback of one invocation.
pub(crate) type Callback<V, E> = Box<dyn FnOnce(Option<E>, Vec<V>) + Send + 'static>;

/// Starts a new invocation over `steps`.
pub(crate) fn start<V, E>(
    steps: Arc<Vec<Step<V, E>>>,
    args: Vec<V>,
    callback: Option<Callback<V, E>>,
) where
    V: Clone + Send + 'static,
    E: From<Panic> + Send + 'static,
{
    debug!(steps = steps.len(), args = args.len(), "starting chain");
    let invocation = Arc::new(Invocation {
        steps,
        state: Mutex::new(State {
            cursor: 0,
            args,
            pending: None,
            running: false,
            finished: false,
            callback,
        }),
    });
    invocation.resume(None, None);
}

// ── Invocation state ──────────────────────────────────────────────────────────

pub(crate) struct Invocation<V, E> {
    steps: Arc<Vec<Step<V, E>>>,
    state: Mutex<State<V, E>>,
}

struct State<V, E> {
    /// Index of the next step to look at. Only ever grows.
    cursor: usize,
    /// Base arguments; each step receives a clone.
    args: Vec<V>,
    /// A continuation request not yet acted on.
    pending: Option<Pending<E>>,
    /// Some thread is inside `drive`.
    running: bool,
    finished: bool,
    callback: Option<Callback<V, E>>,
}

struct Pending<E> {
    err: Option<E>,
}

/// What the driver does after releasing the lock.
enum Action<V, E> {
    Invoke {
        position: usize,
        step: Step<V, E>,
        err: Option<E>,
        args: Vec<V>,
    },
    Finish {
        callback: Option<Callback<V, E>>,
        err: Option<E>,
        args: Vec<V>,
    },
}

impl<V, E> Invocation<V, E>
where
    V: Clone + Send + 'static,
    E: From<Panic> + Send + 'static,
{
    /// Records a continuation request and drives the chain unless another
    /// caller is already doing so.
    pub(crate) fn resume(self: &Arc<Self>, err: Option<E>, args: Option<Vec<V>>) {
        {
            let mut state = self.lock();
            if state.finished {
                warn!("chain already finished, continuation ignored");
                return;
            }
            if let Some(args) = args {
                state.args = args;
            }
            debug_assert!(state.pending.is_none(), "two continuation requests in flight");
            state.pending = Some(Pending { err });
            if state.running {
                return;
            }
            state.running = true;
        }
        self.drive();
    }

    fn drive(self: &Arc<Self>) {
        loop {
            let action = {
                let mut state = self.lock();
                match state.pending.take() {
                    Some(Pending { err }) => self.select(&mut state, err),
                    None => {
                        // The current step kept its continuation for later.
                        state.running = false;
                        return;
                    }
                }
            };

            match action {
                Action::Invoke { position, step, err, args } => {
                    self.invoke(position, step, err, args);
                }
                Action::Finish { callback, err, args } => {
                    match callback {
                        Some(callback) => {
                            debug!(failed = err.is_some(), "chain finished");
                            callback(err, args);
                        }
                        None if err.is_some() => {
                            debug!("chain finished with an error and no callback, error dropped");
                        }
                        None => debug!("chain finished"),
                    }
                    return;
                }
            }
        }
    }

    /// Moves the cursor to the next step that may run with `err`, or to the
    /// end of the stack.
    fn select(&self, state: &mut State<V, E>, err: Option<E>) -> Action<V, E> {
        while let Some(step) = self.steps.get(state.cursor) {
            let position = state.cursor;
            state.cursor += 1;

            if err.is_some() && !step.accepts_error() {
                trace!(position, "error pending, skipping step");
                continue;
            }

            return Action::Invoke {
                position,
                step: step.clone(),
                err,
                args: state.args.clone(),
            };
        }

        state.finished = true;
        state.running = false;
        Action::Finish {
            callback: state.callback.take(),
            err,
            args: mem::take(&mut state.args),
        }
    }

    fn invoke(self: &Arc<Self>, position: usize, step: Step<V, E>, err: Option<E>, args: Vec<V>) {
        debug!(position, kind = step.kind(), "dispatching step");

        let settled = Arc::new(AtomicBool::new(false));
        let next = Next::new(Arc::clone(self), Arc::clone(&settled), position);

        let outcome = panic::catch_unwind(AssertUnwindSafe(move || match step {
            Step::Normal(f) => f(args, next),
            Step::ErrorAware(f) => f(err, args, next),
        }));

        if let Err(payload) = outcome {
            let panic = Panic::from_payload(payload);
            if settled.swap(true, Ordering::AcqRel) {
                warn!(position, error = %panic, "step panicked after continuing, panic dropped");
            } else {
                debug!(position, error = %panic, "step panicked, propagating as error");
                self.resume(Some(E::from(panic)), None);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<V, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::Error;

    type N = Next<&'static str, Error>;

    fn stack(steps: Vec<Step<&'static str, Error>>) -> Arc<Vec<Step<&'static str, Error>>> {
        Arc::new(steps)
    }

    fn callback<F>(f: F) -> Option<Callback<&'static str, Error>>
    where
        F: FnOnce(Option<Error>, Vec<&'static str>) + Send + 'static,
    {
        Some(Box::new(f))
    }

    #[test]
    fn empty_stack_finishes_immediately() {
        let seen: Arc<Mutex<Option<(bool, Vec<&str>)>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        start(
            stack(vec![]),
            vec!["x"],
            callback(move |err, args| {
                *sink.lock().unwrap() = Some((err.is_none(), args));
            }),
        );

        assert_eq!(*seen.lock().unwrap(), Some((true, vec!["x"])));
    }

    #[test]
    fn long_chain_does_not_grow_the_stack() {
        let steps: Vec<_> = (0..100_000).map(|_| Step::new(|_, next: N| next.call())).collect();
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);

        start(
            stack(steps),
            vec![],
            callback(move |err, _| {
                assert!(err.is_none());
                flag.store(true, Ordering::SeqCst);
            }),
        );

        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn long_skip_run_does_not_grow_the_stack() {
        let mut steps = vec![Step::new(|_, next: N| next.fail(Error::msg("early")))];
        steps.extend((0..100_000).map(|_| Step::new(|_, _: N| panic!("must be skipped"))));
        let message = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&message);

        start(
            stack(steps),
            vec![],
            callback(move |err, _| {
                *sink.lock().unwrap() = err.map(|e| e.to_string()).unwrap_or_default();
            }),
        );

        assert_eq!(*message.lock().unwrap(), "early");
    }

    #[test]
    fn continuation_after_panic_is_ignored() {
        let kept = Arc::new(Mutex::new(None));
        let stash = Arc::clone(&kept);
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);

        let steps = stack(vec![Step::new(move |_, next: N| {
            *stash.lock().unwrap() = Some(next);
            panic!("boom");
        })]);
        start(
            steps,
            vec![],
            callback(move |err, _| {
                assert!(err.is_some_and(|e| e.is::<Panic>()));
                *counter.lock().unwrap() += 1;
            }),
        );

        // The panic already settled the step; the stale continuation is a no-op.
        let next = kept.lock().unwrap().take().unwrap();
        next.call();
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn panic_after_continuing_is_dropped() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&hits);
        let reached = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reached);

        let steps = stack(vec![
            Step::new(|_, next: N| {
                next.call();
                panic!("late");
            }),
            Step::new(move |args, next: N| {
                assert_eq!(next.position(), 1);
                flag.store(true, Ordering::SeqCst);
                next.with(args.into_iter().chain(["after"]).collect());
            }),
        ]);
        start(
            steps,
            vec!["before"],
            callback(move |err, args| {
                sink.lock().unwrap().push((err.map(|e| e.to_string()), args));
            }),
        );

        assert!(reached.load(Ordering::SeqCst));
        assert_eq!(*hits.lock().unwrap(), [(None, vec!["before", "after"])]);
    }
}
