//! Construction and traversal bounds.
//!
//! Exceeding any of these never fails construction: messages and keys are
//! truncated, surplus fields are dropped, and an over-deep wrap gets a
//! [`Limit::DepthExceeded`] sentinel as its cause.

/// Maximum bytes kept from a layer's own message.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Maximum bytes kept from a field key.
pub const MAX_KEY_LEN: usize = 128;

/// Maximum bytes of a rendered field value.
pub const MAX_VALUE_LEN: usize = 1024;

/// Maximum fields contributed by a single layer.
pub const MAX_FIELDS: usize = 32;

/// Maximum structured layers in one chain.
pub const MAX_WRAP_DEPTH: usize = 64;

/// Ceiling for any walk over `source()` links (`is`, `find`, `chain`).
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Program counters recorded per captured stack.
pub const MAX_RAW_FRAMES: usize = 64;

/// Sentinel causes substituted when a bound is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Limit {
    /// Wrapping would have exceeded [`MAX_WRAP_DEPTH`]; the deeper chain was dropped.
    #[error("maximum wrap depth exceeded ({limit} layers)")]
    DepthExceeded { limit: usize },
}
