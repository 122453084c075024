//! # tsu-stack
//!
//! An ordered middleware stack with continuation passing and error
//! short-circuiting. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! Every step receives a copy of the current arguments and a [`Next`]. It
//! either continues (optionally with new arguments), fails, or keeps the
//! `Next` and continues later. The stack walks the steps in registration
//! order, each at most once, and finally calls the terminal callback exactly
//! once with the outcome.
//!
//! Errors short-circuit: once a step fails, every following normal step is
//! skipped until an error-aware step picks the error up, or the terminal
//! callback receives it. A step that panics is treated as a step that
//! failed with [`Panic`].
//!
//! What the stack intentionally ignores:
//!
//! - **Parallelism** — steps of one dispatch never overlap
//! - **Timeouts / cancellation** — a step checks your flag before continuing
//! - **Persistence and scheduling** — a dispatch lives in memory only
//!
//! ## Quick start
//!
//! ```rust
//! use tsu_stack::{Error, Stack};
//!
//! let stack = Stack::<String>::new()
//!     .then(|args, next| {
//!         let upper = args.iter().map(|s| s.to_uppercase()).collect();
//!         next.with(upper);
//!     })
//!     .then(|args, next| {
//!         if args.iter().any(String::is_empty) {
//!             return next.fail(Error::msg("empty argument"));
//!         }
//!         next.call();
//!     })
//!     .recover(|err, args, next| match err {
//!         // Error-aware steps see every dispatch, failed or not.
//!         Some(err) => next.fail(err),
//!         None => next.with(args),
//!     });
//!
//! stack.handle(vec!["foo".into(), "bar".into()], |err, args| {
//!     assert!(err.is_none());
//!     assert_eq!(args, ["FOO", "BAR"]);
//! });
//! ```
//!
//! ## Deferred continuation
//!
//! `Next` is `Send + 'static`: move it into a task and continue when the
//! work is done. The following steps run wherever it is consumed.
//!
//! ```rust,no_run
//! use tsu_stack::Stack;
//!
//! # async fn lookup(id: u64) -> u64 { id }
//! #[tokio::main]
//! async fn main() {
//!     let stack = Stack::<u64>::new().then(|args, next| {
//!         tokio::spawn(async move {
//!             let found = lookup(args[0]).await;
//!             next.with(vec![found]);
//!         });
//!     });
//!
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!     stack.handle(vec![42], move |_err, args| { let _ = tx.send(args); });
//!     assert_eq!(rx.await.unwrap(), [42]);
//! }
//! ```

mod compose;
mod dispatch;
mod error;
mod next;
mod stack;
mod step;

pub use compose::{Composed, compose, run};
pub use error::{Error, Panic};
pub use next::Next;
pub use stack::Stack;
pub use step::Step;
