//! Error values threaded through a stack.
//!
//! The engine is generic over its error type and never inspects it. The one
//! thing it needs is a way to turn a caught panic into an error, so every
//! error type used with a [`Stack`](crate::Stack) implements `From<Panic>`.
//! [`Error`] is the ready-made default.

use std::any::Any;
use std::fmt;
use std::sync::{Mutex, PoisonError};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ── Panic ─────────────────────────────────────────────────────────────────────

/// A panic raised by a step while it was being invoked.
///
/// Keeps the panic payload, so a step that throws a typed value with
/// [`std::panic::panic_any`] can have it recovered through
/// [`Panic::downcast`] inside an `E: From<Panic>` conversion.
pub struct Panic {
    message: String,
    payload: Mutex<Option<Box<dyn Any + Send>>>,
}

impl Panic {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_owned()
        };
        Self { message, payload: Mutex::new(Some(payload)) }
    }

    pub fn message(&self) -> &str { &self.message }

    /// Takes the payload back out if it is a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let Self { message, payload } = self;
        match payload.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(payload) => match payload.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(payload) => Err(Self { message, payload: Mutex::new(Some(payload)) }),
            },
            None => Err(Self { message, payload: Mutex::new(None) }),
        }
    }

    /// The raw payload, as `std::panic::catch_unwind` returned it.
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        let Self { message, payload } = self;
        payload
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or_else(|| Box::new(message))
    }
}

impl fmt::Debug for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Panic").field("message", &self.message).finish_non_exhaustive()
    }
}

impl fmt::Display for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step panicked: {}", self.message)
    }
}

impl std::error::Error for Panic {}

// ── Error ─────────────────────────────────────────────────────────────────────

/// The default error type of a [`Stack`](crate::Stack).
///
/// Wraps any standard error. Conversion from [`Panic`] comes from the
/// blanket `From` impl, which is also why `Error` does not implement
/// `std::error::Error` itself: use [`Error::get_ref`] to reach the inner one.
pub struct Error(BoxError);

impl Error {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(err))
    }

    /// An error carrying only a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self(Box::new(Message(message.to_string())))
    }

    pub fn get_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }

    pub fn is<E: std::error::Error + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Takes the inner error back out if it is an `E`.
    pub fn downcast<E: std::error::Error + 'static>(self) -> Result<E, Self> {
        self.0.downcast::<E>().map(|e| *e).map_err(Self)
    }

    pub fn into_inner(self) -> BoxError { self.0 }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<E> From<E> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: E) -> Self {
        Self(Box::new(e))
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}
