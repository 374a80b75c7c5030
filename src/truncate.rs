//! Byte-bounded string truncation that never splits a UTF-8 sequence.

use std::borrow::Cow;

/// Largest prefix of `s` that fits in `max` bytes and ends on a char boundary.
///
/// ```rust
/// use faultline::truncate::truncate;
///
/// assert_eq!(truncate("héllo", 2), "h");
/// assert_eq!(truncate("héllo", 3), "hé");
/// ```
#[inline]
pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate an owned-or-borrowed string in place, reusing its storage.
pub(crate) fn truncate_cow(s: Cow<'static, str>, max: usize) -> Cow<'static, str> {
    if s.len() <= max {
        return s;
    }
    match s {
        Cow::Borrowed(b) => Cow::Borrowed(truncate(b, max)),
        Cow::Owned(mut o) => {
            let end = truncate(&o, max).len();
            o.truncate(end);
            Cow::Owned(o)
        }
    }
}

/// Truncate a freshly rendered `String` in place.
pub(crate) fn truncate_string(mut s: String, max: usize) -> String {
    let end = truncate(&s, max).len();
    s.truncate(end);
    s
}
