//! The continuation handed to every step.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::dispatch::Invocation;
use crate::error::{Error, Panic};

/// Lets the chain proceed past the current step.
///
/// Every method consumes `self`, so a step continues at most once. A step
/// that drops its `Next` without consuming it halts the chain: no later step
/// runs and the terminal callback never fires. That is how a step "ends the
/// response" on purpose.
///
/// `Next` is `Send`, so a step may move it into a task, timer or channel and
/// continue later. Continuing does not run the following step on the
/// current stack frame: when called from inside a step, the next step starts
/// once the current one returns.
///
/// ```rust
/// use tsu_stack::{Stack, Error};
///
/// let stack = Stack::<u32>::new()
///     .then(|args, next| next.with(args.iter().map(|n| n * 2).collect()))
///     .then(|args, next| {
///         if args[0] > 10 {
///             next.fail(Error::msg("too large"));
///         } else {
///             next.call();
///         }
///     });
///
/// stack.handle(vec![3], |err, args| {
///     assert!(err.is_none());
///     assert_eq!(args, [6]);
/// });
/// ```
pub struct Next<V, E = Error> {
    invocation: Arc<Invocation<V, E>>,
    settled: Arc<AtomicBool>,
    position: usize,
}

impl<V, E> Next<V, E> {
    pub(crate) fn new(
        invocation: Arc<Invocation<V, E>>,
        settled: Arc<AtomicBool>,
        position: usize,
    ) -> Self {
        Self { invocation, settled, position }
    }

    /// Zero-based index of the step this continuation belongs to.
    pub fn position(&self) -> usize { self.position }
}

impl<V, E> Next<V, E>
where
    V: Clone + Send + 'static,
    E: From<Panic> + Send + 'static,
{
    /// Continue with no error and the arguments unchanged.
    ///
    /// Inside an error-aware step this also clears the pending error.
    pub fn call(self) {
        self.resume(None, None);
    }

    /// Continue with `err`. Normal steps are skipped until an error-aware
    /// step or the terminal callback receives it.
    pub fn fail(self, err: E) {
        self.resume(Some(err), None);
    }

    /// Continue with no error, replacing the arguments every later step and
    /// the terminal callback will see.
    pub fn with(self, args: Vec<V>) {
        self.resume(None, Some(args));
    }

    /// General form of the other methods: `args` of `None` keeps the current
    /// arguments.
    pub fn resume(self, err: Option<E>, args: Option<Vec<V>>) {
        if self.settled.swap(true, Ordering::AcqRel) {
            warn!(position = self.position, "step already settled, continuation ignored");
            return;
        }
        self.invocation.resume(err, args);
    }
}

impl<V, E> Drop for Next<V, E> {
    fn drop(&mut self) {
        if std::thread::panicking() || self.settled.load(Ordering::Acquire) {
            return;
        }
        debug!(position = self.position, "continuation dropped, chain halted");
    }
}

impl<V, E> fmt::Debug for Next<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.position)
            .field("settled", &self.settled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
