//! The step registry.
//!
//! An ordered list of steps. Insertion order is execution order. You push
//! steps, you handle arguments. That is all.

use std::fmt;
use std::sync::Arc;

use crate::compose::{Composed, SharedCallback};
use crate::dispatch::{self, Callback};
use crate::error::{Error, Panic};
use crate::next::Next;
use crate::step::Step;

/// An ordered stack of steps.
///
/// Build it with [`Stack::then`] / [`Stack::recover`] chaining, or mutate it
/// in place with [`Stack::push`] and [`Stack::clear`].
///
/// Steps live behind an `Arc`: [`handle`](Stack::handle) and
/// [`compose`](Stack::compose) take a snapshot, so a dispatch still waiting
/// on a deferred continuation keeps running against the steps it started
/// with even if the stack is changed afterwards.
pub struct Stack<V, E = Error> {
    steps: Arc<Vec<Step<V, E>>>,
}

impl<V, E> Stack<V, E> {
    pub fn new() -> Self {
        Self { steps: Arc::new(Vec::new()) }
    }

    /// Appends `step`. Its kind is only looked at during dispatch.
    pub fn push(&mut self, step: Step<V, E>) {
        Arc::make_mut(&mut self.steps).push(step);
    }

    /// Appends a normal step. Returns `self` for chaining.
    ///
    /// ```rust
    /// use tsu_stack::Stack;
    ///
    /// let stack = Stack::<String>::new()
    ///     .then(|_args, next| next.call())
    ///     .recover(|err, _args, next| match err {
    ///         Some(err) => next.fail(err),
    ///         None => next.call(),
    ///     });
    /// assert_eq!(stack.len(), 2);
    /// ```
    pub fn then<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<V>, Next<V, E>) + Send + Sync + 'static,
    {
        self.push(Step::new(f));
        self
    }

    /// Appends an error-aware step. Returns `self` for chaining.
    pub fn recover<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<E>, Vec<V>, Next<V, E>) + Send + Sync + 'static,
    {
        self.push(Step::error_aware(f));
        self
    }

    /// Removes every step. Dispatches already in flight are unaffected.
    pub fn clear(&mut self) {
        self.steps = Arc::new(Vec::new());
    }

    pub fn len(&self) -> usize { self.steps.len() }
    pub fn is_empty(&self) -> bool { self.steps.is_empty() }

    pub fn steps(&self) -> &[Step<V, E>] { &self.steps }
}

impl<V, E> Stack<V, E>
where
    V: Clone + Send + 'static,
    E: From<Panic> + Send + 'static,
{
    /// Runs every step over `args`, then calls `callback` exactly once with
    /// the final error (if any) and the final arguments.
    ///
    /// If a step halts the chain by dropping its [`Next`], `callback` is
    /// never called.
    pub fn handle<F>(&self, args: Vec<V>, callback: F)
    where
        F: FnOnce(Option<E>, Vec<V>) + Send + 'static,
    {
        dispatch::start(Arc::clone(&self.steps), args, Some(Box::new(callback) as Callback<V, E>));
    }

    /// Runs every step over `args` with no terminal callback.
    ///
    /// An error that no error-aware step handles is dropped without a trace
    /// beyond a `debug` log line. Register a final [`Stack::recover`] step if
    /// failures matter.
    pub fn handle_silent(&self, args: Vec<V>) {
        dispatch::start(Arc::clone(&self.steps), args, None);
    }

    /// [`handle`](Stack::handle) with no arguments.
    pub fn run<F>(&self, callback: F)
    where
        F: FnOnce(Option<E>, Vec<V>) + Send + 'static,
    {
        self.handle(Vec::new(), callback);
    }

    /// Turns the current steps and `callback` into a reusable callable.
    ///
    /// ```rust
    /// use tsu_stack::Stack;
    ///
    /// let greet = Stack::<&str>::new()
    ///     .then(|args, next| {
    ///         assert_eq!(args, ["a", "b", "c"]);
    ///         next.call();
    ///     })
    ///     .compose(|err, _args| assert!(err.is_none()));
    ///
    /// greet.call(["a", "b", "c"]);
    /// ```
    pub fn compose<F>(&self, callback: F) -> Composed<V, E>
    where
        F: Fn(Option<E>, Vec<V>) + Send + Sync + 'static,
    {
        Composed::new(Arc::clone(&self.steps), Some(Arc::new(callback) as SharedCallback<V, E>))
    }

    /// Like [`compose`](Stack::compose), with no terminal callback.
    pub fn compose_silent(&self) -> Composed<V, E> {
        Composed::new(Arc::clone(&self.steps), None)
    }
}

impl<V, E> Default for Stack<V, E> {
    fn default() -> Self { Self::new() }
}

impl<V, E> Clone for Stack<V, E> {
    fn clone(&self) -> Self {
        Self { steps: Arc::clone(&self.steps) }
    }
}

impl<V, E> fmt::Debug for Stack<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack").field("steps", &self.steps).finish()
    }
}

impl<V, E> FromIterator<Step<V, E>> for Stack<V, E> {
    fn from_iter<I: IntoIterator<Item = Step<V, E>>>(iter: I) -> Self {
        Self { steps: Arc::new(iter.into_iter().collect()) }
    }
}

impl<V, E> Extend<Step<V, E>> for Stack<V, E> {
    fn extend<I: IntoIterator<Item = Step<V, E>>>(&mut self, iter: I) {
        Arc::make_mut(&mut self.steps).extend(iter);
    }
}
