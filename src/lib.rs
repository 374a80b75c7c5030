//! # faultline - Structured error chains
//!
//! Attach identity, classification, severity, key/value context, and a lazily
//! resolved call stack to failures, while staying an ordinary
//! [`std::error::Error`] that composes with `?`, `source()`, and foreign errors.
//!
//! ```text
//! Error: handler error: payment failed order_id=42
//!     at src/api.rs:89:5
//!        ╰─ handler error
//!     at src/billing.rs:142:9
//!        ╰─ payment failed
//!        ╰─ order_id = 42
//!
//! stack:
//!     myapp::billing::charge at src/billing.rs:142
//!     myapp::api::handle at src/api.rs:89
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use faultline::{Class, Error};
//!
//! fn charge(order_id: u64) -> Result<(), Error> {
//!     Err(Error::new("payment failed")
//!         .with_class(Class::Validation)
//!         .with_field("order_id", order_id))
//! }
//!
//! fn handle() -> Result<(), Error> {
//!     charge(42).map_err(|e| e.wrap("handler error"))
//! }
//!
//! let err = handle().unwrap_err();
//! assert_eq!(err.to_string(), "handler error: payment failed order_id=42");
//! assert_eq!(err.class(), Class::Validation); // inherited from the inner layer
//! ```
//!
//! ## Layers and Resolution
//!
//! A chain is a sequence of layers, outermost first. Each layer holds its own
//! message, fields, and metadata slots, plus a cause: another layer, a foreign
//! error, or nothing. Reading metadata walks outward to inward and returns the
//! first value a layer sets. A foreign cause ends the walk.
//!
//! | Accessor | Unset everywhere |
//! |----------|------------------|
//! | [`class()`](Error::class) | [`Class::Unknown`] |
//! | [`severity()`](Error::severity), [`category()`](Error::category), [`span()`](Error::span) | `None` |
//! | [`retryable()`](Error::retryable) | `None` (`is_retryable()` gives `false`) |
//! | [`id()`](Error::id) | generated correlation token |
//!
//! ## Representations
//!
//! | Constructor | Node | Stack | Use when |
//! |-------------|------|-------|----------|
//! | [`Error::new`] / [`faultline::new`](new()) | full | captured now | creating a root failure |
//! | [`Error::minimal`] | minimal | none | hot paths |
//! | [`Error::wrap`] / [`faultline::wrap`](wrap()) | delta (or full over a foreign error) | inherited | adding context |
//! | [`Builder`] | chosen by `build()` | optional | many slots at once |
//!
//! Every `with_*` call returns a new handle and leaves other handles to the
//! old value untouched.
//!
//! ## Equivalence
//!
//! [`is()`] and [`find()`] walk any `dyn Error` chain, structured or not:
//!
//! ```rust
//! use std::io;
//!
//! let err = faultline::wrap(io::Error::other("disk full"), "saving report");
//! assert!(faultline::find::<io::Error>(&err).is_some());
//!
//! let a = faultline::new("charge failed").with_id("PAY-001");
//! let b = faultline::new("card declined").with_id("PAY-001");
//! assert!(faultline::is(&a.wrap("checkout"), &b));
//! ```
//!
//! ## Stacks
//!
//! Root layers record raw instruction pointers. Symbols are resolved on first
//! read and presented under the global [`StackPolicy`]; see [`config()`] for the
//! process-wide settings and their `FAULTLINE_*` environment variables.
//!
//! ## Limits
//!
//! Construction never fails. Oversized messages, keys, and values are
//! truncated on a character boundary, surplus fields are dropped, and wrapping
//! past [`limits::MAX_WRAP_DEPTH`] substitutes a [`Limit::DepthExceeded`]
//! cause. See [`limits`].

#![deny(unsafe_code)]

mod builder;
mod class;
pub mod config;
mod equiv;
mod error;
mod ext;
pub mod limits;
mod memo;
mod node;
pub mod prelude;
mod snapshot;
pub mod stack;
pub mod truncate;
mod value;

use std::borrow::Cow;
use std::error::Error as StdError;

pub use builder::Builder;
pub use class::{Category, Class, Severity, Span};
pub use config::{Config, ConfigError, config, set_config, update_config};
pub use equiv::{Chain, find, is};
pub use error::{Error, Layers};
pub use ext::ResultExt;
pub use limits::Limit;
pub use node::{CauseRef, NodeKind};
pub use snapshot::{CauseSnapshot, FieldSnapshot, RemoteCause, Snapshot};
pub use stack::{Frame, Stack, StackPolicy};
pub use value::{DebugAny, DisplayAny, Field, UNPRINTABLE, Value};

/// Create a root error that captures a stack. Same as [`Error::new`].
#[track_caller]
#[inline]
pub fn new(message: impl Into<Cow<'static, str>>) -> Error {
    Builder::new(message).with_stack().build()
}

/// Wrap any error in a new layer with `message`.
///
/// A structured [`Error`] cause gets a delta layer that inherits its
/// metadata; any other error becomes the terminal cause of a new root.
///
/// ```rust
/// use std::io;
///
/// let err = faultline::wrap(io::Error::other("disk full"), "saving report");
/// assert_eq!(err.to_string(), "saving report: disk full");
/// assert_eq!(err.depth(), 1);
/// ```
#[track_caller]
#[inline]
pub fn wrap<E: StdError + Send + Sync + 'static>(cause: E, message: impl Into<Cow<'static, str>>) -> Error {
    Builder::new(message).cause(cause).with_stack().build()
}

/// Like [`wrap`], but a missing cause produces a plain root layer.
///
/// ```rust
/// let err = faultline::wrap_opt(None::<std::io::Error>, "nothing to wrap");
/// assert_eq!(err.to_string(), "nothing to wrap");
/// assert!(err.cause().is_none());
/// ```
#[track_caller]
#[inline]
pub fn wrap_opt<E: StdError + Send + Sync + 'static>(
    cause: Option<E>,
    message: impl Into<Cow<'static, str>>,
) -> Error {
    Builder::new(message).cause_opt(cause).with_stack().build()
}

/// Create a root [`Error`] from a format string.
///
/// ```rust
/// let user_id = 7;
/// let err = faultline::fault!("user {user_id} not found");
/// assert_eq!(err.to_string(), "user 7 not found");
/// ```
#[macro_export]
macro_rules! fault {
    ($msg:literal $(,)?) => {
        $crate::Error::new(::std::format!($msg))
    };
    ($fmt:literal, $($arg:tt)+) => {
        $crate::Error::new(::std::format!($fmt, $($arg)+))
    };
}

#[cfg(test)]
mod tests;
