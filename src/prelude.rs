//! Convenient re-exports for common usage.
//!
//! ## Usage
//!
//! ```rust
//! use faultline::prelude::*;
//!
//! fn parse_port(raw: &str) -> Result<u16, Error> {
//!     raw.parse::<u16>()
//!         .wrap_err("parsing port")
//!         .with_class(Class::Validation)
//! }
//!
//! let err = parse_port("http").unwrap_err();
//! assert_eq!(err.class(), Class::Validation);
//! ```

pub use crate::Error;
pub use crate::ResultExt;
pub use crate::{Class, Severity};
