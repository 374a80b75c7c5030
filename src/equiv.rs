//! Equivalence (`is`) and typed extraction (`find`) over mixed chains.
//!
//! Both walk `source()` links outward to inward through structured layers
//! and foreign errors alike. Two independent guards bound every walk:
//!
//! - a visited set keyed by link address stops at the first repeated link,
//!   so a foreign error whose `source()` leads back to itself terminates;
//! - [`MAX_TRAVERSAL_DEPTH`] caps the number of links examined.
//!
//! The visited set is stored inline for typical chain lengths, so a walk
//! does not allocate.

use std::error::Error as StdError;

use smallvec::SmallVec;

use crate::class::{Category, Class, Severity};
use crate::error::Error;
use crate::limits::MAX_TRAVERSAL_DEPTH;

// ============================================================================
// Chain iterator
// ============================================================================

/// Iterator over every link of an error chain. See [`Error::chain`].
pub struct Chain<'a> {
    next: Option<&'a (dyn StdError + 'static)>,
    visited: SmallVec<[usize; 32]>,
}

impl<'a> Chain<'a> {
    pub fn new(err: &'a (dyn StdError + 'static)) -> Self {
        Self {
            next: Some(err),
            visited: SmallVec::new(),
        }
    }
}

/// Identity of a link: the shared node for structured layers, the object
/// address for anything else.
fn link_key(err: &(dyn StdError + 'static)) -> usize {
    match err.downcast_ref::<Error>() {
        Some(e) => e.node_addr(),
        None => err as *const dyn StdError as *const () as usize,
    }
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a (dyn StdError + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if self.visited.len() >= MAX_TRAVERSAL_DEPTH {
            tracing::debug!(limit = MAX_TRAVERSAL_DEPTH, "chain traversal depth limit reached");
            return None;
        }
        let key = link_key(current);
        if self.visited.contains(&key) {
            tracing::debug!("cycle detected in error chain");
            return None;
        }
        self.visited.push(key);
        self.next = current.source();
        Some(current)
    }
}

// ============================================================================
// is
// ============================================================================

/// What a structured target can be matched by.
enum Probe<'t> {
    /// Target carries an identity: match by identity only.
    Id(&'t str),
    /// Target has no identity: match on the classification it sets.
    Template(Template<'t>),
    /// Target is foreign, or structured with nothing to match on.
    RefOnly,
}

struct Template<'t> {
    class: Option<Class>,
    category: Option<&'t Category>,
    severity: Option<Severity>,
    retryable: Option<bool>,
}

impl<'t> Template<'t> {
    fn of(target: &'t Error) -> Option<Self> {
        let t = Template {
            class: target.try_class(),
            category: target.category(),
            severity: target.severity(),
            retryable: target.retryable(),
        };
        let any_set = t.class.is_some()
            || t.category.is_some()
            || t.severity.is_some()
            || t.retryable.is_some();
        any_set.then_some(t)
    }

    /// Every slot the target sets equals the layer's resolved value.
    fn matches(&self, layer: &Error) -> bool {
        self.class.is_none_or(|c| layer.try_class() == Some(c))
            && self.category.is_none_or(|c| layer.category() == Some(c))
            && self.severity.is_none_or(|s| layer.severity() == Some(s))
            && self.retryable.is_none_or(|r| layer.retryable() == Some(r))
    }
}

impl<'t> Probe<'t> {
    fn of(target: &'t (dyn StdError + 'static)) -> Self {
        let Some(target) = target.downcast_ref::<Error>() else {
            return Probe::RefOnly;
        };
        if let Some(id) = target.explicit_id() {
            return Probe::Id(id);
        }
        match Template::of(target) {
            Some(t) => Probe::Template(t),
            None => Probe::RefOnly,
        }
    }

    fn matches(&self, layer: &Error) -> bool {
        match self {
            // A mismatched identity here does not end the walk; an inner
            // layer may still carry the target identity.
            Probe::Id(id) => layer.explicit_id() == Some(*id),
            Probe::Template(t) => t.matches(layer),
            Probe::RefOnly => false,
        }
    }
}

/// Whether any link of `err` is equivalent to `target`.
///
/// At each link, outermost first:
///
/// 1. The same object (for structured layers, the same shared node) matches.
/// 2. If `target` is a structured [`Error`] with an explicit identity, a
///    structured link whose resolved identity is equal matches.
/// 3. If `target` is structured with no identity, a structured link matches
///    when every classification slot `target` sets (class, category,
///    severity, retryable) equals the link's resolved value. A target that
///    sets none of them matches by reference only.
///
/// Walks are bounded and cycle-safe; see the module docs.
///
/// ```rust
/// use faultline::Error;
///
/// let a = Error::new("charge failed").with_id("PAY-001");
/// let b = Error::new("different text").with_id("PAY-001");
/// assert!(faultline::is(&a.wrap("checkout"), &b));
///
/// let c = Error::new("one");
/// let d = Error::new("two");
/// assert!(!faultline::is(&c, &d));
/// ```
pub fn is(err: &(dyn StdError + 'static), target: &(dyn StdError + 'static)) -> bool {
    let target_key = link_key(target);
    let probe = Probe::of(target);
    Chain::new(err).any(|link| {
        if link_key(link) == target_key {
            return true;
        }
        match link.downcast_ref::<Error>() {
            Some(layer) => probe.matches(layer),
            None => false,
        }
    })
}

// ============================================================================
// find
// ============================================================================

/// First link of `err` whose concrete type is `T`, outermost first.
///
/// With `T = Error` this returns the outermost structured layer. Foreign
/// causes are matched by their own concrete type.
///
/// ```rust
/// use std::io;
///
/// let err = faultline::wrap(io::Error::other("disk full"), "saving report");
/// let io_err = faultline::find::<io::Error>(&err).unwrap();
/// assert_eq!(io_err.to_string(), "disk full");
/// ```
pub fn find<'a, T: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    Chain::new(err).find_map(|link| link.downcast_ref::<T>())
}
