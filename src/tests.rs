//! Unit tests for faultline.
//!
//! These tests are in a separate file for organization but remain in the `src/`
//! directory to retain access to `pub(crate)` items like `Node` and `Repr`.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::thread;

use crate::limits::{MAX_TRAVERSAL_DEPTH, MAX_WRAP_DEPTH};
use crate::node::Repr;
use crate::{Builder, Class, Error, Limit, NodeKind, Severity, Span, is};

#[derive(Debug, PartialEq, Eq)]
enum TestError {
    NotFound,
    InvalidInput,
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::NotFound => write!(f, "not found"),
            TestError::InvalidInput => write!(f, "invalid input"),
        }
    }
}

impl StdError for TestError {}

fn payment_failure() -> Error {
    Builder::new("payment failed")
        .class(Class::Validation)
        .field("order_id", 42)
        .with_stack()
        .build()
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_wrap_renders_outer_then_inner() {
    let err = payment_failure().wrap("handler error");
    assert_eq!(err.to_string(), "handler error: payment failed order_id=42");
    assert_eq!(err.class(), Class::Validation);
}

#[test]
fn test_rendering_is_cached_per_node() {
    let err = payment_failure().wrap("handler error");
    let first = err.rendered();
    let second = err.rendered();
    assert_eq!(first, second);
    assert!(std::ptr::eq(first, second));
    assert_eq!(err.to_string(), err.to_string());
}

#[test]
fn test_empty_message_passes_cause_through() {
    let err = Builder::new("").cause(TestError::NotFound).build();
    assert_eq!(err.to_string(), "not found");

    let overlay = payment_failure().wrap("outer").with_severity(Severity::Critical);
    assert_eq!(overlay.message(), "");
    assert_eq!(overlay.to_string(), "outer: payment failed order_id=42");
}

#[test]
fn test_fields_without_message() {
    let err = Builder::new("").field("a", 1).field("b", "two").build();
    assert_eq!(err.to_string(), "a=1 b=two");
}

#[test]
fn test_foreign_cause_renders_its_display() {
    let err = crate::wrap(TestError::InvalidInput, "parsing request");
    assert_eq!(err.to_string(), "parsing request: invalid input");
}

// ============================================================================
// Metadata resolution
// ============================================================================

#[test]
fn test_outer_layers_override_inner_layers() {
    let inner = Error::new("inner")
        .with_class(Class::Timeout)
        .with_severity(Severity::Warning)
        .with_retryable(true);
    let outer = Builder::new("outer")
        .cause(inner)
        .severity(Severity::Critical)
        .retryable(false)
        .with_stack()
        .build();

    assert_eq!(outer.class(), Class::Timeout);
    assert_eq!(outer.severity(), Some(Severity::Critical));
    assert_eq!(outer.retryable(), Some(false));
    assert!(!outer.is_retryable());
}

#[test]
fn test_unset_metadata_resolves_to_sentinels() {
    let err = Error::new("plain").wrap("outer");
    assert_eq!(err.class(), Class::Unknown);
    assert_eq!(err.try_class(), None);
    assert_eq!(err.severity(), None);
    assert_eq!(err.category(), None);
    assert_eq!(err.span(), None);
    assert_eq!(err.retryable(), None);
    assert!(!err.is_retryable());
}

#[test]
fn test_foreign_cause_stops_resolution() {
    let err = crate::wrap(TestError::NotFound, "lookup");
    assert_eq!(err.layers().count(), 1);
    assert_eq!(err.class(), Class::Unknown);
}

#[test]
fn test_span_and_category_resolve() {
    let err = Error::new("db down")
        .with_category("database")
        .with_span(Span::new("trace-1", "span-9"))
        .wrap("request failed");
    assert_eq!(err.category().map(|c| c.as_str()), Some("database"));
    assert_eq!(err.span().map(|s| s.span_id.as_str()), Some("span-9"));
}

#[test]
fn test_all_fields_outermost_first() {
    let err = Error::new("inner")
        .with_field("a", 1)
        .wrap("middle")
        .with_field("b", 2)
        .wrap("outer");
    let keys: Vec<&str> = err.all_fields().iter().map(|f| f.key()).collect();
    assert_eq!(keys, ["b", "a"]);
    assert!(err.fields().is_empty());
    assert_eq!(err.field("a").and_then(|v| v.as_i64()), Some(1));
    assert!(err.field("missing").is_none());
}

#[test]
fn test_log_fields_lead_with_metadata() {
    let err = payment_failure().with_id("PAY-001").wrap("handler");
    let pairs = err.log_fields();
    let get = |k: &str| {
        pairs
            .iter()
            .find(|(key, _)| key == k)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(get("error.id"), Some("PAY-001"));
    assert_eq!(get("error.class"), Some("validation"));
    assert_eq!(get("order_id"), Some("42"));
    assert_eq!(pairs[0].0, "error.id");
}

#[test]
fn test_created_is_inherited_from_root() {
    let root = Error::new("root");
    let created = root.created();
    assert!(created.is_some());
    let outer = root.wrap("a").wrap("b");
    assert_eq!(outer.created(), created);
    assert!(Error::minimal("quick").created().is_none());
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_generated_id_is_shared_by_wrappers() {
    let root = Error::new("root");
    let id = root.id().to_string();
    let outer = root.clone().wrap("outer").wrap("outermost");
    assert_eq!(outer.id(), id);
    assert!(outer.explicit_id().is_none());
}

#[test]
fn test_generated_ids_differ_between_chains() {
    assert_ne!(Error::new("a").id(), Error::new("a").id());
}

#[test]
fn test_generated_ids_never_make_chains_equal() {
    let a = Error::new("same");
    let b = Error::new("same");
    assert!(!is(&a, &b));
    assert!(is(&a, &a.clone()));
}

#[test]
fn test_explicit_id_overrides_token() {
    let err = Error::new("x").wrap("y").with_id("E-7");
    assert_eq!(err.id(), "E-7");
    assert_eq!(err.explicit_id(), Some("E-7"));
}

// ============================================================================
// Copy-on-write
// ============================================================================

#[test]
fn test_unshared_full_node_is_amended_in_place() {
    let err = Error::new("root");
    let before = err.node_addr();
    let err = err.with_class(Class::Internal);
    assert_eq!(err.node_addr(), before);
    assert_eq!(err.class(), Class::Internal);
}

#[test]
fn test_amending_clears_the_render_cache() {
    let err = Error::new("root");
    assert_eq!(err.rendered(), "root");
    let err = err.with_field("k", "v");
    assert_eq!(err.to_string(), "root k=v");
}

#[test]
fn test_shared_full_node_is_copied() {
    let original = Error::new("root");
    let keep = original.clone();
    let amended = original.with_class(Class::Conflict);

    assert!(!amended.ptr_eq(&keep));
    assert_eq!(keep.try_class(), None);
    assert_eq!(amended.class(), Class::Conflict);
    assert_eq!(amended.kind(), NodeKind::Full);
    assert_eq!(amended.created(), keep.created());
    assert_eq!(amended.id(), keep.id());
    match (&amended.node().repr, &keep.node().repr) {
        (Repr::Full { stack: Some(a), .. }, Repr::Full { stack: Some(b), .. }) => {
            assert!(Arc::ptr_eq(a, b));
        }
        (Repr::Full { stack: None, .. }, Repr::Full { stack: None, .. }) => {}
        _ => panic!("copy changed representation"),
    }
}

#[test]
fn test_minimal_node_is_copied() {
    let original = Error::minimal("fast");
    let amended = original.clone().with_severity(Severity::Info);
    assert_eq!(amended.kind(), NodeKind::Minimal);
    assert!(!amended.ptr_eq(&original));
    assert_eq!(original.severity(), None);
    assert_eq!(amended.depth(), 1);
}

#[test]
fn test_delta_node_gets_an_overlay() {
    let wrapped = Error::new("root").wrap("outer");
    assert_eq!(wrapped.kind(), NodeKind::Delta);
    let keep = wrapped.clone();

    let amended = wrapped.with_class(Class::Forbidden);
    assert_eq!(amended.kind(), NodeKind::Delta);
    assert_eq!(amended.depth(), keep.depth() + 1);
    assert!(matches!(amended.cause(), Some(crate::CauseRef::Chain(e)) if e.ptr_eq(&keep)));
    assert_eq!(keep.try_class(), None);
    assert_eq!(amended.class(), Class::Forbidden);
    assert_eq!(amended.to_string(), keep.to_string());
}

#[test]
fn test_amending_at_depth_limit_copies_the_layer() {
    let mut err = Error::new("root cause").with_class(Class::Validation);
    for i in 1..MAX_WRAP_DEPTH {
        err = err.wrap(format!("w{i}"));
    }
    assert_eq!(err.depth(), MAX_WRAP_DEPTH);
    assert_eq!(err.kind(), NodeKind::Delta);
    let keep = err.clone();

    let amended = err.with_field("request_id", 7);
    assert_eq!(amended.depth(), MAX_WRAP_DEPTH);
    assert_eq!(amended.kind(), NodeKind::Delta);
    assert!(amended.find::<Limit>().is_none());
    assert_eq!(amended.class(), Class::Validation);
    assert_eq!(amended.message(), keep.message());
    assert_eq!(amended.field("request_id").and_then(|v| v.as_i64()), Some(7));
    let rendered = amended.to_string();
    assert!(rendered.starts_with(&format!("w{} request_id=7: ", MAX_WRAP_DEPTH - 1)));
    assert!(rendered.ends_with(": root cause"));

    let (Some(crate::CauseRef::Chain(a)), Some(crate::CauseRef::Chain(b))) =
        (amended.cause(), keep.cause())
    else {
        panic!("expected structured causes");
    };
    assert!(a.ptr_eq(b));
    assert!(keep.fields().is_empty());
    assert!(!keep.to_string().contains("request_id"));
}

// ============================================================================
// Bounds
// ============================================================================

#[test]
fn test_wrap_depth_is_bounded() {
    let mut err = Error::new("root");
    for i in 0..MAX_WRAP_DEPTH + 10 {
        err = err.wrap(format!("layer {i}"));
        assert!(err.depth() <= MAX_WRAP_DEPTH);
    }
    assert!(err.layers().count() <= MAX_WRAP_DEPTH);
    assert!(err.chain().count() <= MAX_WRAP_DEPTH + 1);
    assert!(err.find::<Limit>().is_some());
    assert!(err.to_string().contains("maximum wrap depth exceeded"));
}

#[test]
fn test_sentinel_layer_is_a_fresh_root() {
    let mut err = Error::minimal("root");
    for _ in 1..MAX_WRAP_DEPTH {
        err = err.wrap("w");
    }
    assert_eq!(err.depth(), MAX_WRAP_DEPTH);
    let next = err.wrap("over");
    assert_eq!(next.depth(), 1);
    assert_eq!(next.kind(), NodeKind::Full);
    assert_eq!(
        next.find::<Limit>(),
        Some(&Limit::DepthExceeded {
            limit: MAX_WRAP_DEPTH
        })
    );
}

#[test]
fn test_layers_iterator_is_capped() {
    let err = Error::new("root");
    let mut layers = err.layers();
    assert!(layers.next().is_some());
    assert!(layers.next().is_none());
    assert!(MAX_TRAVERSAL_DEPTH > MAX_WRAP_DEPTH);
}

#[test]
fn test_root_cause_is_the_innermost_link() {
    let err = crate::wrap(TestError::NotFound, "inner").wrap("outer");
    let root = err.root_cause();
    assert_eq!(root.downcast_ref::<TestError>(), Some(&TestError::NotFound));

    let structured = Error::new("only");
    assert!(structured.root_cause().downcast_ref::<Error>().is_some());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_shared_chain_reads_are_consistent() {
    let err = payment_failure()
        .with_field("user", "alice")
        .wrap("handler error")
        .with_severity(Severity::Error);
    let expected = "handler error: payment failed order_id=42 user=alice";

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let err = err.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    assert_eq!(err.rendered(), expected);
                    assert_eq!(err.class(), Class::Validation);
                    assert_eq!(err.all_fields().len(), 2);
                    assert_eq!(err.fields().len(), 0);
                }
                err.id().to_string()
            })
        })
        .collect();

    let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(err.rendered(), expected);
}

// ============================================================================
// Debug report
// ============================================================================

#[test]
fn test_debug_lists_every_layer() {
    let err = payment_failure().wrap("handler error");
    let report = format!("{:?}", err);
    assert!(report.starts_with("Error: handler error: payment failed order_id=42\n"));
    assert_eq!(report.matches("    at ").count(), 2);
    assert!(report.contains("╰─ order_id = 42"));
    assert!(report.contains(file!()));
}

#[test]
fn test_debug_shows_foreign_cause() {
    let err = crate::wrap(TestError::NotFound, "lookup");
    let report = format!("{:?}", err);
    assert!(report.contains("caused by: not found"));
}
