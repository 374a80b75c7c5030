//! Classification metadata: class, category, severity, and trace span.
//!
//! Each of these is stored per layer as an `Option`, so "unset" is always
//! distinct from any defined value (including [`Class::Unknown`]).

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Class
// ============================================================================

/// Coarse failure class, suitable for mapping to transport status codes.
///
/// Resolving the class of a chain where no layer sets one yields
/// [`Class::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Class {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    RateLimited,
    Timeout,
    Unavailable,
    Internal,
    #[default]
    Unknown,
    /// Application-defined class.
    Custom(&'static str),
}

impl Class {
    pub fn as_str(&self) -> &'static str {
        match self {
            Class::Validation => "validation",
            Class::NotFound => "not_found",
            Class::Conflict => "conflict",
            Class::Unauthorized => "unauthorized",
            Class::Forbidden => "forbidden",
            Class::RateLimited => "rate_limited",
            Class::Timeout => "timeout",
            Class::Unavailable => "unavailable",
            Class::Internal => "internal",
            Class::Unknown => "unknown",
            Class::Custom(s) => *s,
        }
    }

    /// Parse a class name. Unrecognized names map to [`Class::Unknown`].
    pub fn from_name(name: &str) -> Class {
        match name {
            "validation" => Class::Validation,
            "not_found" => Class::NotFound,
            "conflict" => Class::Conflict,
            "unauthorized" => Class::Unauthorized,
            "forbidden" => Class::Forbidden,
            "rate_limited" => Class::RateLimited,
            "timeout" => Class::Timeout,
            "unavailable" => Class::Unavailable,
            "internal" => Class::Internal,
            _ => Class::Unknown,
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Custom(&'static str) can't be deserialized without leaking, so the wire form
// is the name and decoding goes through `from_name`.
impl Serialize for Class {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Class {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let name = String::deserialize(d)?;
        Ok(Class::from_name(&name))
    }
}

// ============================================================================
// Category
// ============================================================================

/// Free-form subsystem label, e.g. `"database"` or `"payments"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(Cow<'static, str>);

impl Category {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Category {
    fn from(s: &'static str) -> Self {
        Self(Cow::Borrowed(s))
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self(Cow::Owned(s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Severity
// ============================================================================

/// How bad a failure is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Upper-case label used by the severity prefix, e.g. `"ERROR"`.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Severity {
    type Err = crate::config::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            _ => Err(crate::config::ConfigError::InvalidValue {
                key: "severity",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Span
// ============================================================================

/// Distributed-tracing correlation pair attached to a failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: String,
    pub span_id: String,
}

impl Span {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
        }
    }
}
