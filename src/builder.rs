//! Pooled construction staging for [`Error`].
//!
//! A [`Builder`] accumulates a layer's message, metadata, fields, and cause,
//! then [`build()`](Builder::build) picks the representation:
//!
//! | Stack requested | Cause | Result |
//! |-----------------|-------|--------|
//! | no | any | minimal node |
//! | yes | none or foreign | full node (captures a stack now) |
//! | yes | structured | delta node (records the wrap point only) |
//!
//! Staging storage is checked out of a process-wide pool and scrubbed before
//! it goes back, so a recycled builder never carries a field, flag, or cause
//! from a previous error.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::mem;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::class::{Category, Class, Severity, Span};
use crate::error::Error;
use crate::node::{Cause, Layer, Node, Repr, link};
use crate::value::{Field, Value};

/// Most staging objects kept for reuse.
const POOL_CAPACITY: usize = 64;

#[derive(Default)]
struct Scratch {
    layer: Layer,
    cause: Cause,
    stack: bool,
}

impl Scratch {
    fn reset(&mut self) {
        self.layer.reset();
        self.cause = Cause::None;
        self.stack = false;
    }
}

static POOL: Mutex<Vec<Box<Scratch>>> = parking_lot::const_mutex(Vec::new());

fn checkout() -> Box<Scratch> {
    POOL.lock().pop().unwrap_or_default()
}

fn checkin(mut scratch: Box<Scratch>) {
    scratch.reset();
    let mut pool = POOL.lock();
    if pool.len() < POOL_CAPACITY {
        pool.push(scratch);
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent constructor for one error layer.
///
/// ```rust
/// use faultline::{Builder, Class, NodeKind, Severity};
///
/// let err = Builder::new("payment failed")
///     .class(Class::Validation)
///     .severity(Severity::Error)
///     .field("order_id", 42)
///     .build();
/// assert_eq!(err.kind(), NodeKind::Minimal);
/// assert_eq!(err.to_string(), "payment failed order_id=42");
/// ```
///
/// `build()` consumes the builder; its staging storage returns to the pool.
/// Dropping a builder without building also returns it.
pub struct Builder {
    scratch: Option<Box<Scratch>>,
}

impl Builder {
    /// Start a layer with `message`, recording the caller as its location.
    #[track_caller]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        let mut scratch = checkout();
        scratch.layer.set_message(message);
        scratch.layer.location = Some(Location::caller());
        Self {
            scratch: Some(scratch),
        }
    }

    #[inline]
    fn scratch(&mut self) -> &mut Scratch {
        self.scratch.get_or_insert_with(checkout)
    }

    /// Assign an explicit identity.
    pub fn id(mut self, id: impl Into<Cow<'static, str>>) -> Self {
        self.scratch().layer.id = Some(id.into());
        self
    }

    /// Set the classification.
    pub fn class(mut self, class: Class) -> Self {
        self.scratch().layer.class = Some(class);
        self
    }

    /// Set the category.
    pub fn category(mut self, category: impl Into<Category>) -> Self {
        self.scratch().layer.category = Some(category.into());
        self
    }

    /// Set the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.scratch().layer.severity = Some(severity);
        self
    }

    /// Mark the failure as retryable or not.
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.scratch().layer.retryable = Some(retryable);
        self
    }

    /// Attach the trace span the failure happened in.
    pub fn span(mut self, span: Span) -> Self {
        self.scratch().layer.span = Some(span);
        self
    }

    /// Add a field. Fields past the per-layer cap are dropped.
    pub fn field(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        self.scratch().layer.push_field(Field::new(key, value));
        self
    }

    /// Add several fields in order.
    pub fn fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Cow<'static, str>>,
        V: Into<Value>,
    {
        let layer = &mut self.scratch().layer;
        for (k, v) in fields {
            layer.push_field(Field::new(k, v));
        }
        self
    }

    /// Set the cause. A structured [`Error`] is linked as a chain layer;
    /// anything else becomes a terminal foreign cause.
    pub fn cause<E: StdError + Send + Sync + 'static>(mut self, cause: E) -> Self {
        self.scratch().cause = Cause::from_error(cause);
        self
    }

    /// Set the cause if there is one. `None` leaves this layer as a root.
    pub fn cause_opt<E: StdError + Send + Sync + 'static>(self, cause: Option<E>) -> Self {
        match cause {
            Some(cause) => self.cause(cause),
            None => self,
        }
    }

    /// Set a shared foreign cause. Keeping a clone of the `Arc` lets callers
    /// test for this exact cause with [`Error::is`].
    pub fn cause_shared(mut self, cause: Arc<dyn StdError + Send + Sync + 'static>) -> Self {
        self.scratch().cause = Cause::from_shared(cause);
        self
    }

    /// Set a boxed cause. A boxed [`Error`] is unboxed and linked as a layer.
    pub fn cause_boxed(mut self, cause: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        self.scratch().cause = Cause::from_boxed(cause);
        self
    }

    pub(crate) fn cause_raw(mut self, cause: Cause) -> Self {
        self.scratch().cause = cause;
        self
    }

    /// Request stack tracking: a full node for roots, a delta node when wrapping.
    pub fn with_stack(self) -> Self {
        self.stack(true)
    }

    /// Turn stack tracking on or off.
    pub fn stack(mut self, stack: bool) -> Self {
        self.scratch().stack = stack;
        self
    }

    /// Materialize the layer in a single node allocation.
    pub fn build(mut self) -> Error {
        let mut scratch = self.scratch.take().unwrap_or_default();
        let layer = mem::take(&mut scratch.layer);
        let cause = mem::take(&mut scratch.cause);
        let stack = scratch.stack;
        checkin(scratch);

        let (cause, depth) = link(cause);
        let node = match (stack, cause) {
            (false, cause) => Node {
                layer,
                depth,
                repr: Repr::Minimal { cause },
            },
            (true, Cause::Chain(parent)) => Node {
                layer,
                depth,
                repr: Repr::Delta { cause: parent },
            },
            (true, cause) => Node::full(layer, cause, depth),
        };
        Error::from_node(node)
    }
}

impl Drop for Builder {
    fn drop(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            checkin(scratch);
        }
    }
}
