//! Extension trait for wrapping errors directly on `Result`s.
//!
//! [`ResultExt`] turns any `Result<T, E>` whose error is a
//! `std::error::Error` into a `Result<T, faultline::Error>`, adding a layer
//! at the caller's location. It avoids `map_err` boilerplate around `?`.

use std::borrow::Cow;
use std::error::Error as StdError;

use crate::builder::Builder;
use crate::class::Class;
use crate::error::Error;

// ============================================================================
// ResultExt Trait
// ============================================================================

/// Extension trait for adding a structured layer to `Result<T, E>`.
///
/// ```rust
/// use std::io;
/// use faultline::{Class, ResultExt};
///
/// fn read_config() -> Result<String, io::Error> {
///     Err(io::Error::other("permission denied"))
/// }
///
/// fn load() -> Result<String, faultline::Error> {
///     let text = read_config()
///         .wrap_err("loading config")
///         .with_class(Class::Unavailable)?;
///     Ok(text)
/// }
///
/// let err = load().unwrap_err();
/// assert_eq!(err.to_string(), "loading config: permission denied");
/// assert_eq!(err.class(), Class::Unavailable);
/// ```
///
/// When `E` is already a [`faultline::Error`](Error), the new layer wraps it
/// and inherits its metadata. Any other error becomes the terminal cause.
pub trait ResultExt<T> {
    /// Wrap the error in a new layer with `message`.
    #[track_caller]
    fn wrap_err(self, message: impl Into<Cow<'static, str>>) -> Result<T, Error>;

    /// Like [`wrap_err`](Self::wrap_err), building the message only on failure.
    #[track_caller]
    fn wrap_err_with<M, F>(self, f: F) -> Result<T, Error>
    where
        M: Into<Cow<'static, str>>,
        F: FnOnce() -> M;

    /// Set the class on the error's outermost layer, converting a foreign
    /// error with [`Error::from_std`] first.
    #[track_caller]
    fn with_class(self, class: Class) -> Result<T, Error>;
}

impl<T, E: StdError + Send + Sync + 'static> ResultExt<T> for Result<T, E> {
    #[track_caller]
    #[inline]
    fn wrap_err(self, message: impl Into<Cow<'static, str>>) -> Result<T, Error> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(Builder::new(message).cause(e).with_stack().build()),
        }
    }

    #[track_caller]
    #[inline]
    fn wrap_err_with<M, F>(self, f: F) -> Result<T, Error>
    where
        M: Into<Cow<'static, str>>,
        F: FnOnce() -> M,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(Builder::new(f()).cause(e).with_stack().build()),
        }
    }

    #[track_caller]
    #[inline]
    fn with_class(self, class: Class) -> Result<T, Error> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(Error::from_std(e).with_class(class)),
        }
    }
}
