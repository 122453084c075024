//! Steps and how they are stored.
//!
//! # Two kinds of step
//!
//! A stack holds closures of *different* types in a single `Vec`, so each one
//! is erased behind an `Arc<dyn Fn …>`. Whether a step wants to see the
//! in-flight error is decided by the caller when the step is built, not by
//! looking at its signature:
//!
//! ```text
//! Step::new(|args, next| …)               ← runs only while no error is pending
//! Step::error_aware(|err, args, next| …)  ← always runs, receives Option<E>
//! ```
//!
//! Cloning a step is one `Arc` clone, which is what lets a [`Stack`] hand out
//! cheap snapshots of itself to dispatches that are still in flight.
//!
//! [`Stack`]: crate::Stack

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::next::Next;

/// A type-erased step that ignores errors.
pub(crate) type NormalFn<V, E> = Arc<dyn Fn(Vec<V>, Next<V, E>) + Send + Sync + 'static>;

/// A type-erased step that receives the pending error as its first argument.
pub(crate) type ErrorAwareFn<V, E> =
    Arc<dyn Fn(Option<E>, Vec<V>, Next<V, E>) + Send + Sync + 'static>;

/// One unit of a [`Stack`](crate::Stack).
///
/// Every step gets an owned copy of the current arguments and a [`Next`]
/// continuation it must consume to let the chain proceed.
pub enum Step<V, E = Error> {
    /// Invoked as `(args, next)`. Skipped while an error is pending.
    Normal(NormalFn<V, E>),
    /// Invoked as `(err, args, next)`, with or without a pending error.
    ErrorAware(ErrorAwareFn<V, E>),
}

impl<V, E> Step<V, E> {
    /// Wraps a closure that never sees errors.
    ///
    /// ```rust
    /// use tsu_stack::Step;
    ///
    /// let step = Step::<String>::new(|args, next| {
    ///     let upper = args.iter().map(|s| s.to_uppercase()).collect();
    ///     next.with(upper);
    /// });
    /// assert!(!step.accepts_error());
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<V>, Next<V, E>) + Send + Sync + 'static,
    {
        Self::Normal(Arc::new(f))
    }

    /// Wraps a closure that is handed the pending error, if any.
    ///
    /// Continuing with [`Next::call`] clears the error; use [`Next::fail`] to
    /// keep propagating it.
    pub fn error_aware<F>(f: F) -> Self
    where
        F: Fn(Option<E>, Vec<V>, Next<V, E>) + Send + Sync + 'static,
    {
        Self::ErrorAware(Arc::new(f))
    }

    pub fn accepts_error(&self) -> bool {
        matches!(self, Self::ErrorAware(_))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Normal(_) => "normal",
            Self::ErrorAware(_) => "error-aware",
        }
    }
}

impl<V, E> Clone for Step<V, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Normal(f) => Self::Normal(Arc::clone(f)),
            Self::ErrorAware(f) => Self::ErrorAware(Arc::clone(f)),
        }
    }
}

impl<V, E> fmt::Debug for Step<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Step").field(&self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_decides_error_acceptance() {
        let normal: Step<u8, Error> = Step::new(|_, next| next.call());
        let aware: Step<u8, Error> = Step::error_aware(|_, _, next| next.call());

        assert!(!normal.accepts_error());
        assert!(aware.accepts_error());
        assert_eq!(format!("{aware:?}"), r#"Step("error-aware")"#);
    }

    #[test]
    fn clone_shares_the_closure() {
        let step: Step<u8, Error> = Step::new(|_, next| next.call());
        let copy = step.clone();

        match (&step, &copy) {
            (Step::Normal(a), Step::Normal(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("clone changed the variant"),
        }
    }
}
