//! Public-API behavior of error chains: rendering, inheritance, equivalence,
//! and typed lookup across structured and foreign links.

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use faultline::{Builder, CauseRef, Class, Error, NodeKind, Severity, find, is};
use static_assertions::assert_impl_all;

assert_impl_all!(Error: Send, Sync, Clone, StdError);
assert_impl_all!(faultline::Snapshot: Send, Sync);
assert_impl_all!(Builder: Send);

// ============================================================================
// Rendering and inheritance
// ============================================================================

#[test]
fn wrap_renders_outer_first_and_inherits_class() {
    let inner = Builder::new("payment failed")
        .class(Class::Validation)
        .field("order_id", 42)
        .with_stack()
        .build();
    let outer = inner.wrap("handler error");

    assert_eq!(outer.to_string(), "handler error: payment failed order_id=42");
    assert_eq!(outer.class(), Class::Validation);
    assert_eq!(outer.message(), "handler error");
    assert!(outer.fields().is_empty());
    assert_eq!(outer.all_fields().len(), 1);
}

#[test]
fn minimal_wrap_keeps_no_stack_of_its_own() {
    let root = Error::new("root");
    let outer = Builder::new("outer").cause(root.clone()).build();
    assert_eq!(outer.kind(), NodeKind::Minimal);
    assert_eq!(outer.depth(), 2);
    assert_eq!(outer.created(), root.created());
}

#[test]
fn source_walks_the_whole_chain() {
    let err = faultline::wrap(io::Error::other("disk full"), "saving").wrap("request");
    let texts: Vec<String> = err.chain().map(|e| e.to_string()).collect();
    assert_eq!(texts, ["request: saving: disk full", "saving: disk full", "disk full"]);

    let source = err.source().expect("has a source");
    assert_eq!(source.to_string(), "saving: disk full");
}

#[test]
fn cause_distinguishes_structured_and_foreign() {
    let err = faultline::wrap(io::Error::other("disk full"), "saving");
    assert!(matches!(err.cause(), Some(CauseRef::Foreign(_))));
    let outer = err.wrap("outer");
    assert!(matches!(outer.cause(), Some(CauseRef::Chain(_))));
    assert!(Error::new("alone").cause().is_none());
}

// ============================================================================
// Equivalence
// ============================================================================

#[test]
fn wrapped_foreign_error_is_found_by_reference() {
    let disk_full: Arc<dyn StdError + Send + Sync> = Arc::new(io::Error::other("disk full"));
    let err = Builder::new("saving report")
        .cause_shared(disk_full.clone())
        .with_stack()
        .build()
        .wrap("handling upload");

    assert!(is(&err, &*disk_full));
    assert!(err.chain().any(|e| e.to_string() == "disk full"));
}

#[test]
fn equal_identities_match_despite_messages() {
    let a = Error::new("charge failed").with_id("PAY-001");
    let b = Error::new("card declined").with_id("PAY-001");
    assert!(is(&a, &b));
    assert!(is(&a.wrap("checkout"), &b));
}

#[test]
fn identity_less_chains_do_not_match() {
    let a = Error::new("first");
    let b = Error::new("second");
    assert!(!is(&a, &b));
}

#[test]
fn identity_target_ignores_classification() {
    let err = Error::new("x").with_class(Class::Timeout);
    let target = Error::minimal("t").with_class(Class::Timeout).with_id("T-1");
    assert!(!err.is(&target));
}

#[test]
fn template_matches_on_every_set_slot() {
    let err = Error::new("db down")
        .with_class(Class::Unavailable)
        .with_category("database")
        .with_severity(Severity::Critical)
        .wrap("request failed");

    let by_class = Error::minimal("").with_class(Class::Unavailable);
    let by_both = Error::minimal("")
        .with_class(Class::Unavailable)
        .with_category("database");
    let wrong_severity = Error::minimal("")
        .with_class(Class::Unavailable)
        .with_severity(Severity::Info);

    assert!(err.is(&by_class));
    assert!(err.is(&by_both));
    assert!(!err.is(&wrong_severity));
}

#[test]
fn foreign_targets_match_by_reference_only() {
    let err = faultline::wrap(io::Error::other("disk full"), "saving");
    let lookalike = io::Error::other("disk full");
    assert!(!err.is(&lookalike));
}

// ============================================================================
// Typed lookup
// ============================================================================

#[test]
fn find_returns_first_match_outermost_first() {
    let err = faultline::wrap(io::Error::new(io::ErrorKind::NotFound, "gone"), "inner").wrap("outer");
    assert_eq!(find::<io::Error>(&err).map(io::Error::kind), Some(io::ErrorKind::NotFound));
    assert_eq!(find::<Error>(&err).map(Error::message), Some("outer"));
    assert!(find::<std::fmt::Error>(&err).is_none());
}

#[test]
fn find_works_on_plain_foreign_errors() {
    let plain = io::Error::other("alone");
    assert!(find::<io::Error>(&plain).is_some());
    assert!(find::<Error>(&plain).is_none());
}
