//! Chain node representations.
//!
//! Every [`Error`] points at one immutable [`Node`]: the layer's own data plus
//! one of three representations ([`Repr`]):
//!
//! | Repr | Owns | Cause | Used for |
//! |------|------|-------|----------|
//! | `Full` | stack, creation time | none or foreign | chain roots |
//! | `Minimal` | nothing extra | anything | throughput-sensitive call sites |
//! | `Delta` | nothing extra | always structured | wrapping an existing chain |
//!
//! Nodes are never mutated after being shared. The one exception is the
//! unshared full-node fast path in [`Error::amend`](crate::Error), which is
//! only reachable while `Arc::get_mut` proves no other handle exists.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use smallvec::SmallVec;

use crate::class::{Category, Class, Severity, Span};
use crate::config::config;
use crate::error::Error;
use crate::limits::{Limit, MAX_FIELDS, MAX_MESSAGE_LEN, MAX_WRAP_DEPTH};
use crate::memo::Memo;
use crate::stack::Stack;
use crate::truncate::truncate_cow;
use crate::value::Field;

/// Length of generated correlation tokens.
pub(crate) const TOKEN_LEN: usize = 12;

/// Per-layer field storage; most layers carry a handful of fields.
pub(crate) type Fields = SmallVec<[Field; 4]>;

/// A foreign (non-structured) error held as a terminal cause.
pub(crate) type Foreign = Arc<dyn StdError + Send + Sync + 'static>;

// ============================================================================
// Layer - what one node contributes
// ============================================================================

/// Data contributed by a single layer. `None` always means "not set here".
#[derive(Clone, Default)]
pub(crate) struct Layer {
    pub(crate) message: Cow<'static, str>,
    pub(crate) id: Option<Cow<'static, str>>,
    pub(crate) class: Option<Class>,
    pub(crate) category: Option<Category>,
    pub(crate) severity: Option<Severity>,
    pub(crate) retryable: Option<bool>,
    pub(crate) span: Option<Span>,
    pub(crate) fields: Fields,
    pub(crate) location: Option<&'static Location<'static>>,
    /// Cached rendering of this layer and everything beneath it.
    /// `Memo::clone` is empty, so a copied layer re-renders.
    pub(crate) rendered: Memo<String>,
    /// Correlation token, shared by copies of this layer.
    pub(crate) token: Arc<Memo<Box<str>>>,
}

impl Layer {
    pub(crate) fn set_message(&mut self, message: impl Into<Cow<'static, str>>) {
        self.message = truncate_cow(message.into(), MAX_MESSAGE_LEN);
    }

    /// Append a field unless this layer already holds [`MAX_FIELDS`].
    pub(crate) fn push_field(&mut self, field: Field) {
        if self.fields.len() >= MAX_FIELDS {
            tracing::trace!(key = field.key(), "field cap reached; dropping field");
            return;
        }
        self.fields.push(field);
    }

    /// Return every slot to its unset state, keeping field capacity.
    pub(crate) fn reset(&mut self) {
        self.message = Cow::Borrowed("");
        self.id = None;
        self.class = None;
        self.category = None;
        self.severity = None;
        self.retryable = None;
        self.span = None;
        self.fields.clear();
        self.location = None;
        self.rendered.clear();
        self.token = Arc::default();
    }

    pub(crate) fn token(&self) -> &str {
        self.token.get_or_compute(generate_token)
    }

    pub(crate) fn seed_token(&self, token: &str) {
        self.token.get_or_compute(|| token.into());
    }
}

fn generate_token() -> Box<str> {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect::<String>()
        .into_boxed_str()
}

// ============================================================================
// Cause
// ============================================================================

/// What a layer wraps.
#[derive(Clone, Default)]
pub(crate) enum Cause {
    #[default]
    None,
    Chain(Error),
    Foreign(Foreign),
}

impl Cause {
    /// Classify any error value, unpacking it if it is already a structured chain.
    pub(crate) fn from_error<E: StdError + Send + Sync + 'static>(err: E) -> Cause {
        let mut slot = Some(err);
        let any: &mut dyn std::any::Any = &mut slot;
        if let Some(chain) = any.downcast_mut::<Option<Error>>().and_then(Option::take) {
            return Cause::Chain(chain);
        }
        match slot {
            Some(err) => Cause::Foreign(Arc::new(err)),
            None => Cause::None,
        }
    }

    pub(crate) fn from_shared(err: Foreign) -> Cause {
        match (*err).downcast_ref::<Error>() {
            Some(chain) => Cause::Chain(chain.clone()),
            None => Cause::Foreign(err),
        }
    }

    pub(crate) fn from_boxed(err: Box<dyn StdError + Send + Sync + 'static>) -> Cause {
        match err.downcast::<Error>() {
            Ok(chain) => Cause::Chain(*chain),
            Err(other) => Cause::Foreign(Arc::from(other)),
        }
    }

    pub(crate) fn as_ref(&self) -> Option<CauseRef<'_>> {
        match self {
            Cause::None => None,
            Cause::Chain(e) => Some(CauseRef::Chain(e)),
            Cause::Foreign(f) => Some(CauseRef::Foreign(&**f)),
        }
    }
}

/// Borrowed view of a layer's cause.
#[derive(Clone, Copy)]
pub enum CauseRef<'a> {
    /// Another structured layer.
    Chain(&'a Error),
    /// A terminal foreign error.
    Foreign(&'a (dyn StdError + Send + Sync + 'static)),
}

impl<'a> CauseRef<'a> {
    /// The cause as a plain `dyn Error`.
    pub fn as_dyn(&self) -> &'a (dyn StdError + 'static) {
        match *self {
            CauseRef::Chain(e) => e,
            CauseRef::Foreign(f) => f,
        }
    }
}

impl fmt::Debug for CauseRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CauseRef::Chain(e) => write!(f, "Chain({})", e),
            CauseRef::Foreign(e) => write!(f, "Foreign({:?})", e),
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// Which representation a node uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Owns a stack, a creation time, and every metadata slot.
    Full,
    /// No stack and no creation time of its own.
    Minimal,
    /// Stores only what it adds to the chain it wraps.
    Delta,
}

pub(crate) enum Repr {
    Full {
        stack: Option<Arc<Stack>>,
        created: DateTime<Utc>,
        cause: Cause,
    },
    Minimal {
        cause: Cause,
    },
    Delta {
        cause: Error,
    },
}

pub(crate) struct Node {
    pub(crate) layer: Layer,
    /// Structured layers from here to the terminal cause, inclusive.
    pub(crate) depth: u16,
    pub(crate) repr: Repr,
}

impl Node {
    /// A root node that owns a stack (when capture is enabled) and a timestamp.
    pub(crate) fn full(layer: Layer, cause: Cause, depth: u16) -> Node {
        let stack = config().capture_stacks.then(|| Arc::new(Stack::capture()));
        Node {
            layer,
            depth,
            repr: Repr::Full {
                stack,
                created: Utc::now(),
                cause,
            },
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        match self.repr {
            Repr::Full { .. } => NodeKind::Full,
            Repr::Minimal { .. } => NodeKind::Minimal,
            Repr::Delta { .. } => NodeKind::Delta,
        }
    }

    pub(crate) fn cause(&self) -> Option<CauseRef<'_>> {
        match &self.repr {
            Repr::Full { cause, .. } | Repr::Minimal { cause } => cause.as_ref(),
            Repr::Delta { cause } => Some(CauseRef::Chain(cause)),
        }
    }

    /// The next structured layer inward, if any.
    pub(crate) fn parent(&self) -> Option<&Error> {
        match self.cause()? {
            CauseRef::Chain(e) => Some(e),
            CauseRef::Foreign(_) => None,
        }
    }
}

/// Attach `cause` beneath a new layer, enforcing [`MAX_WRAP_DEPTH`].
///
/// Returns the cause to store and the new layer's depth. A cause that is
/// already at the limit is replaced by a [`Limit::DepthExceeded`] sentinel.
pub(crate) fn link(cause: Cause) -> (Cause, u16) {
    match cause {
        Cause::Chain(parent) if parent.depth() >= MAX_WRAP_DEPTH => {
            tracing::debug!(
                limit = MAX_WRAP_DEPTH,
                "wrap depth exceeded; substituting sentinel cause"
            );
            let sentinel = Limit::DepthExceeded {
                limit: MAX_WRAP_DEPTH,
            };
            (Cause::Foreign(Arc::new(sentinel)), 1)
        }
        Cause::Chain(parent) => {
            let depth = parent.depth() as u16 + 1;
            (Cause::Chain(parent), depth)
        }
        other => (other, 1),
    }
}
