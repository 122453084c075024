//! Turning a stack into a plain callable.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::{self, Callback};
use crate::error::{Error, Panic};
use crate::stack::Stack;
use crate::step::Step;

/// A terminal callback shared by every call of a [`Composed`].
pub(crate) type SharedCallback<V, E> = Arc<dyn Fn(Option<E>, Vec<V>) + Send + Sync + 'static>;

/// A stack frozen together with its terminal callback.
///
/// Created by [`Stack::compose`] or [`compose`]. Each [`call`](Composed::call)
/// is an independent dispatch; cloning is cheap and clones may be called
/// from any thread.
pub struct Composed<V, E = Error> {
    steps: Arc<Vec<Step<V, E>>>,
    callback: Option<SharedCallback<V, E>>,
}

impl<V, E> Composed<V, E> {
    pub(crate) fn new(steps: Arc<Vec<Step<V, E>>>, callback: Option<SharedCallback<V, E>>) -> Self {
        Self { steps, callback }
    }
}

impl<V, E> Composed<V, E>
where
    V: Clone + Send + 'static,
    E: From<Panic> + Send + 'static,
{
    /// Dispatches the call-time arguments, in order, through the steps.
    pub fn call<I>(&self, args: I)
    where
        I: IntoIterator<Item = V>,
    {
        let callback = self.callback.as_ref().map(|callback| {
            let callback = Arc::clone(callback);
            Box::new(move |err: Option<E>, args: Vec<V>| callback(err, args)) as Callback<V, E>
        });
        dispatch::start(Arc::clone(&self.steps), args.into_iter().collect(), callback);
    }
}

impl<V, E> Clone for Composed<V, E> {
    fn clone(&self) -> Self {
        Self {
            steps: Arc::clone(&self.steps),
            callback: self.callback.clone(),
        }
    }
}

impl<V, E> fmt::Debug for Composed<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composed")
            .field("steps", &self.steps)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Builds a fresh stack from `steps` and composes it with `callback`.
///
/// ```rust
/// use tsu_stack::{compose, Error, Step};
///
/// let check = |args: Vec<&'static str>, next: tsu_stack::Next<&'static str>| {
///     assert_eq!(args, ["foo"]);
///     next.call();
/// };
///
/// let pipeline = compose(
///     [Step::new(check), Step::new(check)],
///     |err: Option<Error>, args| {
///         assert!(err.is_none());
///         assert_eq!(args, ["foo"]);
///     },
/// );
/// pipeline.call(["foo"]);
/// ```
pub fn compose<V, E, I, F>(steps: I, callback: F) -> Composed<V, E>
where
    V: Clone + Send + 'static,
    E: From<Panic> + Send + 'static,
    I: IntoIterator<Item = Step<V, E>>,
    F: Fn(Option<E>, Vec<V>) + Send + Sync + 'static,
{
    steps.into_iter().collect::<Stack<V, E>>().compose(callback)
}

/// Builds a one-shot pipeline from `steps` and runs it right away with no
/// arguments.
pub fn run<V, E, I, F>(steps: I, callback: F)
where
    V: Clone + Send + 'static,
    E: From<Panic> + Send + 'static,
    I: IntoIterator<Item = Step<V, E>>,
    F: FnOnce(Option<E>, Vec<V>) + Send + 'static,
{
    steps.into_iter().collect::<Stack<V, E>>().run(callback);
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn each_call_is_independent() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let double = Stack::<u32>::new()
            .then(|args, next| next.with(args.into_iter().map(|n| n * 2).collect()))
            .compose(move |err, args| {
                assert!(err.is_none());
                sink.lock().unwrap().push(args);
            });

        double.call([1, 2]);
        double.clone().call([5]);
        double.call([]);

        assert_eq!(*seen.lock().unwrap(), [vec![2, 4], vec![10], vec![]]);
    }

    #[test]
    fn composed_ignores_later_pushes() {
        let mut stack = Stack::<u32>::new();
        let composed = stack.compose(|_, args| assert_eq!(args, [7]));

        stack.push(Step::new(|_, next| next.with(vec![0])));
        composed.call([7]);
    }

    #[test]
    fn run_starts_with_no_arguments() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        run(
            [Step::new(|args: Vec<&'static str>, next| {
                assert!(args.is_empty());
                next.with(vec!["made"]);
            })],
            move |err: Option<Error>, args| *sink.lock().unwrap() = Some((err.is_none(), args)),
        );

        assert_eq!(*seen.lock().unwrap(), Some((true, vec!["made"])));
    }
}
