//! The [`Error`] handle: accessors, metadata resolution, copy-on-write
//! mutators, and rendering.
//!
//! An `Error` is an `Arc` to one immutable node. Cloning shares the node;
//! every `with_*` call returns a handle to a node that differs only where
//! the call says it does, so handles held elsewhere never observe a change.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Write as _};
use std::panic::Location;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::builder::Builder;
use crate::class::{Category, Class, Severity, Span};
use crate::config::config;
use crate::equiv::{self, Chain};
use crate::limits::{MAX_MESSAGE_LEN, MAX_TRAVERSAL_DEPTH, MAX_WRAP_DEPTH};
use crate::node::{Cause, CauseRef, Layer, Node, NodeKind, Repr, link};
use crate::stack::{Frame, Stack};
use crate::truncate::truncate_string;
use crate::value::{Field, Value, guarded};

// ============================================================================
// Error - Core handle type
// ============================================================================

/// A structured error: one layer of a chain plus a reference to its cause.
///
/// ## Metadata resolution
///
/// Every metadata accessor (`class`, `severity`, `explicit_id`, ...) walks the
/// chain outward to inward and returns the first layer's explicitly set
/// value. A foreign cause ends the walk.
///
/// ```rust
/// use faultline::{Class, Error};
///
/// let inner = Error::new("payment failed")
///     .with_class(Class::Validation)
///     .with_field("order_id", 42);
/// let outer = inner.wrap("handler error");
///
/// assert_eq!(outer.to_string(), "handler error: payment failed order_id=42");
/// assert_eq!(outer.class(), Class::Validation);
/// ```
///
/// ## Sharing
///
/// `Error` is `Send + Sync` and cheap to clone. Concurrent readers need no
/// locking: the only interior state is a write-once rendering cache per node.
#[derive(Clone)]
pub struct Error {
    node: Arc<Node>,
}

impl Error {
    pub(crate) fn from_node(node: Node) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    #[inline]
    pub(crate) fn layer(&self) -> &Layer {
        &self.node.layer
    }

    #[inline]
    pub(crate) fn node(&self) -> &Node {
        &self.node
    }

    /// Address of the shared node; stable for the lifetime of any handle.
    #[inline]
    pub(crate) fn node_addr(&self) -> usize {
        Arc::as_ptr(&self.node) as *const () as usize
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Create a root error that captures a stack (when enabled in [`Config`](crate::Config)).
    #[track_caller]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Builder::new(message).with_stack().build()
    }

    /// Create a root error without a stack or timestamp.
    ///
    /// The cheapest representation; use on hot paths.
    #[track_caller]
    pub fn minimal(message: impl Into<Cow<'static, str>>) -> Self {
        Builder::new(message).build()
    }

    /// Start a [`Builder`].
    #[track_caller]
    pub fn builder(message: impl Into<Cow<'static, str>>) -> Builder {
        Builder::new(message)
    }

    /// Wrap this error in a new layer with `message`.
    ///
    /// The new layer references this one as its cause and records only the
    /// wrap point; it does not capture another stack.
    #[track_caller]
    pub fn wrap(self, message: impl Into<Cow<'static, str>>) -> Self {
        Builder::new(message).cause(self).with_stack().build()
    }

    /// Structured view of any error.
    ///
    /// An [`Error`] is returned unchanged; anything else becomes the foreign
    /// cause of a new root layer with an empty message, which renders as the
    /// foreign error's own text.
    #[track_caller]
    pub fn from_std<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        match Cause::from_error(err) {
            Cause::Chain(e) => e,
            cause => Builder::new("").cause_raw(cause).with_stack().build(),
        }
    }

    // ========================================================================
    // Layer-local accessors
    // ========================================================================

    /// This layer's own message (may be empty).
    #[inline]
    pub fn message(&self) -> &str {
        &self.layer().message
    }

    /// Fields contributed by this layer only.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.layer().fields
    }

    /// Where this layer was constructed.
    #[inline]
    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.layer().location
    }

    /// Which representation this layer uses.
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    /// Structured layers from this one to the terminal cause, inclusive.
    #[inline]
    pub fn depth(&self) -> usize {
        self.node.depth as usize
    }

    /// The next link inward.
    #[inline]
    pub fn cause(&self) -> Option<CauseRef<'_>> {
        self.node.cause()
    }

    /// Whether two handles share one node.
    #[inline]
    pub fn ptr_eq(&self, other: &Error) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Structured layers, outermost first. Stops at a foreign cause.
    pub fn layers(&self) -> Layers<'_> {
        Layers {
            next: Some(self),
            remaining: MAX_TRAVERSAL_DEPTH,
        }
    }

    /// Every link including foreign causes and their own `source()` chains.
    ///
    /// Bounded by [`MAX_TRAVERSAL_DEPTH`] and stops on the first repeated link.
    pub fn chain(&self) -> Chain<'_> {
        Chain::new(self)
    }

    /// The innermost link.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut last: &(dyn StdError + 'static) = self;
        for link in self.chain() {
            last = link;
        }
        last
    }

    // ========================================================================
    // Resolved metadata
    // ========================================================================

    /// First value `pick` finds walking outward to inward.
    fn resolve<'a, T>(&'a self, pick: impl Fn(&'a Layer) -> Option<T>) -> Option<T> {
        self.layers().find_map(|e| pick(e.layer()))
    }

    /// Identity: the explicit one if any layer sets it, otherwise a generated
    /// correlation token shared by every layer above the innermost one.
    pub fn id(&self) -> &str {
        if let Some(id) = self.explicit_id() {
            return id;
        }
        match self.layers().last() {
            Some(innermost) => innermost.layer().token(),
            None => self.layer().token(),
        }
    }

    /// Explicitly assigned identity, if any layer sets one.
    pub fn explicit_id(&self) -> Option<&str> {
        self.resolve(|l| l.id.as_deref())
    }

    /// Resolved class, or [`Class::Unknown`] when no layer sets one.
    pub fn class(&self) -> Class {
        self.try_class().unwrap_or(Class::Unknown)
    }

    /// Resolved class, `None` when no layer sets one.
    pub fn try_class(&self) -> Option<Class> {
        self.resolve(|l| l.class)
    }

    pub fn category(&self) -> Option<&Category> {
        self.resolve(|l| l.category.as_ref())
    }

    pub fn severity(&self) -> Option<Severity> {
        self.resolve(|l| l.severity)
    }

    /// Tri-state retry verdict; outer layers override inner ones.
    pub fn retryable(&self) -> Option<bool> {
        self.resolve(|l| l.retryable)
    }

    /// `retryable()`, treating unset as `false`.
    pub fn is_retryable(&self) -> bool {
        self.retryable().unwrap_or(false)
    }

    pub fn span(&self) -> Option<&Span> {
        self.resolve(|l| l.span.as_ref())
    }

    /// Fields of every structured layer, outermost layer first.
    ///
    /// Returns a fresh vector; the chain itself is untouched.
    pub fn all_fields(&self) -> Vec<&Field> {
        self.layers().flat_map(|e| e.fields()).collect()
    }

    /// Look up a field by key, outermost layer first.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.layers()
            .flat_map(|e| e.fields())
            .find(|f| f.key() == key)
            .map(Field::value)
    }

    /// When the failure originated: the root's creation time.
    ///
    /// `None` for chains built only from minimal layers.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.layers().find_map(|e| match e.node.repr {
            Repr::Full { created, .. } => Some(created),
            _ => None,
        })
    }

    /// The captured stack of the nearest layer that owns one.
    pub fn stack(&self) -> Option<&Stack> {
        self.layers().find_map(|e| match &e.node.repr {
            Repr::Full { stack, .. } => stack.as_deref(),
            _ => None,
        })
    }

    /// Resolved frames presented under the global [`Config`](crate::Config).
    pub fn frames(&self) -> Vec<Frame> {
        match self.stack() {
            Some(stack) => stack.frames(&config()),
            None => Vec::new(),
        }
    }

    /// Key/value pairs for a log record: resolved metadata followed by
    /// [`all_fields`](Self::all_fields).
    pub fn log_fields(&self) -> Vec<(Cow<'_, str>, String)> {
        let mut pairs = Vec::with_capacity(4 + self.fields().len());
        pairs.push((Cow::Borrowed("error.id"), self.id().to_string()));
        pairs.push((Cow::Borrowed("error.class"), self.class().to_string()));
        if let Some(category) = self.category() {
            pairs.push((Cow::Borrowed("error.category"), category.to_string()));
        }
        if let Some(severity) = self.severity() {
            pairs.push((Cow::Borrowed("error.severity"), severity.to_string()));
        }
        if let Some(retryable) = self.retryable() {
            pairs.push((Cow::Borrowed("error.retryable"), retryable.to_string()));
        }
        for f in self.all_fields() {
            pairs.push((Cow::Borrowed(f.key()), f.value().render()));
        }
        pairs
    }

    // ========================================================================
    // Equivalence
    // ========================================================================

    /// Whether any link of this chain is equivalent to `target`.
    ///
    /// See [`faultline::is`](crate::is) for the matching rules.
    pub fn is(&self, target: &(dyn StdError + 'static)) -> bool {
        equiv::is(self, target)
    }

    /// First link of type `T`, outermost first.
    pub fn find<T: StdError + 'static>(&self) -> Option<&T> {
        equiv::find(self)
    }

    // ========================================================================
    // Copy-on-write mutators
    // ========================================================================

    /// Assign an explicit identity, replacing the generated token.
    pub fn with_id(self, id: impl Into<Cow<'static, str>>) -> Self {
        let id = id.into();
        self.amend(|l| l.id = Some(id))
    }

    /// Set the classification.
    pub fn with_class(self, class: Class) -> Self {
        self.amend(|l| l.class = Some(class))
    }

    /// Set the category.
    pub fn with_category(self, category: impl Into<Category>) -> Self {
        let category = category.into();
        self.amend(|l| l.category = Some(category))
    }

    /// Set the severity.
    pub fn with_severity(self, severity: Severity) -> Self {
        self.amend(|l| l.severity = Some(severity))
    }

    /// Mark the failure as retryable or not.
    pub fn with_retryable(self, retryable: bool) -> Self {
        self.amend(|l| l.retryable = Some(retryable))
    }

    /// Attach the trace span the failure happened in.
    pub fn with_span(self, span: Span) -> Self {
        self.amend(|l| l.span = Some(span))
    }

    /// Add one field. Fields past the per-layer cap are dropped.
    pub fn with_field(self, key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        let field = Field::new(key, value);
        self.amend(|l| l.push_field(field))
    }

    /// Add several fields in order.
    pub fn with_fields<K, V>(self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Cow<'static, str>>,
        V: Into<Value>,
    {
        let fields: Vec<Field> = fields.into_iter().map(|(k, v)| Field::new(k, v)).collect();
        self.amend(|l| fields.into_iter().for_each(|f| l.push_field(f)))
    }

    /// Apply `change` to a layer, producing the handle to return.
    ///
    /// - Full node, unshared: amended in place. `Arc::get_mut` proves no other
    ///   handle exists, so nobody can observe the mutation; the render cache
    ///   is cleared because it may hold the pre-change text.
    /// - Full or minimal node, shared: the layer is copied with an empty
    ///   cache and the copy shares the cause (and stack).
    /// - Delta node: a new delta carrying only the change wraps the receiver,
    ///   leaving every existing reference to the receiver valid. At the wrap
    ///   depth limit an overlay would evict the receiver, so the delta's layer
    ///   is copied instead.
    fn amend(mut self, change: impl FnOnce(&mut Layer)) -> Self {
        if let Some(node) = Arc::get_mut(&mut self.node) {
            if let Repr::Full { .. } = node.repr {
                change(&mut node.layer);
                node.layer.rendered.clear();
                return self;
            }
        }

        if self.kind() == NodeKind::Delta && self.depth() < MAX_WRAP_DEPTH {
            let mut layer = Layer::default();
            change(&mut layer);
            let (cause, depth) = link(Cause::Chain(self));
            let repr = match cause {
                Cause::Chain(parent) => Repr::Delta { cause: parent },
                other => Repr::Minimal { cause: other },
            };
            return Error::from_node(Node { layer, depth, repr });
        }

        let node = &*self.node;
        let repr = match &node.repr {
            Repr::Full {
                stack,
                created,
                cause,
            } => Repr::Full {
                stack: stack.clone(),
                created: *created,
                cause: cause.clone(),
            },
            Repr::Minimal { cause } => Repr::Minimal {
                cause: cause.clone(),
            },
            Repr::Delta { cause } => Repr::Delta {
                cause: cause.clone(),
            },
        };
        let mut layer = node.layer.clone();
        change(&mut layer);
        Error::from_node(Node {
            layer,
            depth: node.depth,
            repr,
        })
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// The rendered message of this layer and everything beneath it, without
    /// the severity prefix. Computed once per node.
    pub fn rendered(&self) -> &str {
        self.layer().rendered.get_or_compute(|| self.render())
    }

    fn render(&self) -> String {
        let layer = self.layer();
        let cause = self.cause();

        if layer.message.is_empty() {
            match cause {
                Some(CauseRef::Chain(e)) => return e.rendered().to_string(),
                Some(CauseRef::Foreign(f)) => return render_foreign(f),
                None => {}
            }
        }

        let mut out = String::with_capacity(layer.message.len() + 16 * layer.fields.len());
        out.push_str(&layer.message);
        for field in &layer.fields {
            if !out.is_empty() {
                out.push(' ');
            }
            field.write_pair(&mut out);
        }
        let mut out = truncate_string(out, MAX_MESSAGE_LEN);

        let cause_text = match cause {
            Some(CauseRef::Chain(e)) => Cow::Borrowed(e.rendered()),
            Some(CauseRef::Foreign(f)) => Cow::Owned(render_foreign(f)),
            None => Cow::Borrowed(""),
        };
        if !cause_text.is_empty() {
            if !out.is_empty() {
                out.push_str(": ");
            }
            out.push_str(&cause_text);
        }
        out
    }
}

/// `Display` of a foreign error, recovering from panics.
pub(crate) fn render_foreign(err: &(dyn StdError + Send + Sync + 'static)) -> String {
    guarded(|out| write!(out, "{}", err))
}

// ============================================================================
// Layers iterator
// ============================================================================

/// Iterator over the structured layers of a chain. See [`Error::layers`].
#[derive(Clone)]
pub struct Layers<'a> {
    next: Option<&'a Error>,
    remaining: usize,
}

impl<'a> Iterator for Layers<'a> {
    type Item = &'a Error;

    fn next(&mut self) -> Option<&'a Error> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next.take()?;
        self.remaining -= 1;
        self.next = current.node.parent();
        Some(current)
    }
}

// ============================================================================
// Trait impls
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if config().show_severity {
            if let Some(severity) = self.severity() {
                write!(f, "[{}] ", severity.label())?;
            }
        }
        f.write_str(self.rendered())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self)?;
        for layer in self.layers() {
            match layer.location() {
                Some(loc) => writeln!(f, "    at {}:{}:{}", loc.file(), loc.line(), loc.column())?,
                None => writeln!(f, "    at [...]")?,
            }
            if !layer.message().is_empty() {
                writeln!(f, "       ╰─ {}", layer.message())?;
            }
            for field in layer.fields() {
                writeln!(f, "       ╰─ {} = {:?}", field.key(), field.value())?;
            }
        }
        if let Some(CauseRef::Foreign(e)) = self.layers().last().and_then(|e| e.cause()) {
            writeln!(f, "    caused by: {}", render_foreign(e))?;
        }
        let frames = self.frames();
        if !frames.is_empty() {
            writeln!(f)?;
            writeln!(f, "stack:")?;
            for frame in frames {
                writeln!(f, "    {}", frame)?;
            }
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause().map(|c| c.as_dyn())
    }
}
