//! Key/value fields attached to error layers.
//!
//! This module provides [`Field`] and [`Value`], plus the any-value-to-string
//! coercion used when fields are rendered. Rendering never propagates a panic
//! from user code: a `Display` or `Debug` impl that panics is replaced by a
//! fixed placeholder.

use std::any::Any;
use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::limits::{MAX_KEY_LEN, MAX_VALUE_LEN};
use crate::truncate::{truncate_cow, truncate_string};

/// Placeholder rendered when a value's formatting panics.
pub const UNPRINTABLE: &str = "<unprintable>";

// ============================================================================
// Type-erased payloads
// ============================================================================

/// Trait combining `Any` and `Display` for type-erased field values.
pub trait DisplayAny: Any + fmt::Display + Send + Sync {
    /// Get a reference to self as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Display + Send + Sync> DisplayAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Trait combining `Any` and `Debug` for type-erased field values.
pub trait DebugAny: Any + fmt::Debug + Send + Sync {
    /// Get a reference to self as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> DebugAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Value
// ============================================================================

/// A field value.
///
/// Scalars are stored inline; anything else is shared behind an `Arc` so that
/// copying a layer for a `with_*` call never deep-copies user data.
#[derive(Clone)]
#[non_exhaustive]
pub enum Value {
    Str(Cow<'static, str>),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    /// Formatted via `Display` at render time.
    Display(Arc<dyn DisplayAny>),
    /// Formatted via `Debug` at render time.
    Debug(Arc<dyn DebugAny>),
}

impl Value {
    /// Wrap any `Display` type. Formatting is deferred until the field is rendered.
    pub fn display<T: fmt::Display + Send + Sync + 'static>(v: T) -> Self {
        Value::Display(Arc::new(v))
    }

    /// Wrap any `Debug` type. Formatting is deferred until the field is rendered.
    pub fn debug<T: fmt::Debug + Send + Sync + 'static>(v: T) -> Self {
        Value::Debug(Arc::new(v))
    }

    /// Get as text, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as a signed integer, if this is an integer value that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I64(v) => Some(v),
            Value::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Downcast a `Display`/`Debug` payload back to its concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            // (**b) dispatches on the trait object, not the Arc
            Value::Display(b) => (**b).as_any().downcast_ref(),
            Value::Debug(b) => (**b).as_any().downcast_ref(),
            _ => None,
        }
    }

    /// Render to a string bounded by [`MAX_VALUE_LEN`].
    ///
    /// A panicking `Display`/`Debug` impl yields [`UNPRINTABLE`].
    pub fn render(&self) -> String {
        let rendered = match self {
            Value::Str(s) => return truncate_string(s.to_string(), MAX_VALUE_LEN),
            Value::I64(v) => return v.to_string(),
            Value::U64(v) => return v.to_string(),
            Value::F64(v) => return v.to_string(),
            Value::Bool(v) => return v.to_string(),
            Value::Display(d) => guarded(|out| write!(out, "{}", &**d)),
            Value::Debug(d) => guarded(|out| write!(out, "{:?}", &**d)),
        };
        truncate_string(rendered, MAX_VALUE_LEN)
    }
}

/// Run a formatting closure, recovering from panics and formatter errors.
pub(crate) fn guarded(f: impl FnOnce(&mut String) -> fmt::Result) -> String {
    let mut out = String::new();
    match catch_unwind(AssertUnwindSafe(|| f(&mut out))) {
        Ok(Ok(())) => out,
        Ok(Err(_)) => {
            tracing::warn!("field value formatter returned an error; substituting placeholder");
            UNPRINTABLE.to_string()
        }
        Err(_) => {
            tracing::warn!("field value formatter panicked; substituting placeholder");
            UNPRINTABLE.to_string()
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            _ => f.write_str(&self.render()),
        }
    }
}

impl PartialEq for Value {
    /// Scalars compare by value; `Display`/`Debug` payloads compare by rendering.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (a, b) => a.render() == b.render(),
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident as $as:ty),* $(,)?) => {
        $(impl From<$t> for Value {
            #[inline]
            fn from(v: $t) -> Self {
                Value::$variant(v as $as)
            }
        })*
    };
}

value_from! {
    i8 => I64 as i64, i16 => I64 as i64, i32 => I64 as i64, i64 => I64 as i64, isize => I64 as i64,
    u8 => U64 as u64, u16 => U64 as u64, u32 => U64 as u64, u64 => U64 as u64, usize => U64 as u64,
    f32 => F64 as f64, f64 => F64 as f64,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&'static str> for Value {
    fn from(v: &'static str) -> Self {
        Value::Str(Cow::Borrowed(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Cow::Owned(v))
    }
}

impl From<Cow<'static, str>> for Value {
    fn from(v: Cow<'static, str>) -> Self {
        Value::Str(v)
    }
}

// ============================================================================
// Field
// ============================================================================

/// One key/value pair contributed by a layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    key: Cow<'static, str>,
    value: Value,
}

impl Field {
    /// Create a field. The key is truncated to [`MAX_KEY_LEN`] bytes.
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self {
            key: truncate_cow(key.into(), MAX_KEY_LEN),
            value: value.into(),
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Append `key=value` to `out`.
    pub(crate) fn write_pair(&self, out: &mut String) {
        let _ = write!(out, "{}={}", self.key, self.value.render());
    }
}
