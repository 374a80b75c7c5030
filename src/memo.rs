//! Write-once cache slot shared by concurrent readers.

use std::fmt;
use std::sync::OnceLock;

/// A lazily computed, never invalidated value.
///
/// Readers that race on an empty slot each run the computation; the first
/// store wins and later results are dropped. Callers only cache deterministic
/// values, so every racer would have stored the same thing.
pub(crate) struct Memo<T>(OnceLock<T>);

impl<T> Memo<T> {
    #[inline]
    pub(crate) const fn new() -> Self {
        Self(OnceLock::new())
    }

    #[inline]
    pub(crate) fn get(&self) -> Option<&T> {
        self.0.get()
    }

    pub(crate) fn get_or_compute(&self, f: impl FnOnce() -> T) -> &T {
        if let Some(v) = self.0.get() {
            return v;
        }
        let computed = f();
        self.0.get_or_init(|| computed)
    }

    /// Empty the slot. Requires exclusive access, so no reader can hold the old value.
    #[inline]
    pub(crate) fn clear(&mut self) {
        let _ = self.0.take();
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloning yields an empty slot; a copy is a new instance with its own cache.
impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            Some(v) => write!(f, "Memo({:?})", v),
            None => f.write_str("Memo(<empty>)"),
        }
    }
}
