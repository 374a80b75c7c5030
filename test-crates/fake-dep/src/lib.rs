//! A fake dependency crate for testing errors that cross crate boundaries.
//!
//! It returns its own `thiserror` type, structured errors built here, and
//! structured errors wrapping its own type, so tests can check that layers
//! keep the location of the crate that built them and that classification
//! and identity survive the crossing.

use faultline::{Builder, Class, Error, ResultExt, Severity};

/// Identity attached to every connection failure from this crate.
pub const CONNECTION_FAILED: &str = "FAKE-CONN";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FakeDepError {
    #[error("key {key} not found")]
    NotFound { key: String },
    #[error("connection failed")]
    ConnectionFailed,
    #[error("timed out")]
    Timeout,
}

/// Returns this crate's own error type, unstructured.
pub fn fetch_raw(key: &str) -> Result<String, FakeDepError> {
    Err(FakeDepError::NotFound {
        key: key.to_string(),
    })
}

/// Returns a structured error whose root wraps [`FakeDepError`].
pub fn fetch_data(key: &str) -> Result<String, Error> {
    fetch_raw(key)
        .wrap_err("fetching from remote")
        .with_class(Class::NotFound)
}

/// Simulates a deeper call stack within this crate.
pub fn deep_operation() -> Result<(), Error> {
    level_one()?;
    Ok(())
}

fn level_one() -> Result<(), Error> {
    level_two().wrap_err("in level_one")
}

fn level_two() -> Result<(), Error> {
    Err(Builder::new("connect")
        .id(CONNECTION_FAILED)
        .class(Class::Unavailable)
        .severity(Severity::Error)
        .retryable(true)
        .cause(FakeDepError::ConnectionFailed)
        .with_stack()
        .build())
}

/// A root-only error with no stack, as a hot path would build it.
pub fn quick_timeout() -> Error {
    Error::minimal("upstream").with_class(Class::Timeout)
}
