//! Serializable view of a chain's observable state.
//!
//! A [`Snapshot`] is built from accessors only, so it looks the same whichever
//! node representation each layer uses. Decoding with
//! [`Snapshot::into_error`] rebuilds a chain whose rendered message, identity,
//! classification, and fields match the original.
//!
//! ```json
//! {
//!   "id": "PAY-001",
//!   "assigned_id": "PAY-001",
//!   "message": "handler error",
//!   "cause": {
//!     "id": "PAY-001",
//!     "message": "payment failed",
//!     "class": "validation",
//!     "fields": [{ "key": "order_id", "value": "42" }],
//!     "created": "2026-01-01T00:00:00Z",
//!     "cause": "connection reset"
//!   }
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::class::{Category, Class, Severity, Span};
use crate::config::config;
use crate::error::{Error, render_foreign};
use crate::node::{Cause, CauseRef, Layer, Node, Repr, link};
use crate::stack::{Frame, Stack};
use crate::value::Field;

/// One structured layer and, nested, everything beneath it.
///
/// Metadata slots hold what this layer sets itself; `id` is the identity the
/// layer resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Resolved identity: explicit or generated.
    pub id: String,
    /// Identity assigned on this layer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<Class>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSnapshot>,
    /// Set on layers that own a creation time (chain roots).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Resolved frames, presented under the global policy at snapshot time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<Frame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<CauseSnapshot>,
}

/// A field with its value rendered to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub key: String,
    pub value: String,
}

/// What a snapshotted layer wraps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CauseSnapshot {
    /// A foreign cause, kept as its rendered text.
    Message(String),
    /// Another structured layer.
    Chain(Box<Snapshot>),
}

/// A foreign cause restored from a [`Snapshot`]; displays the original text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RemoteCause(pub String);

impl Snapshot {
    fn of_layer(err: &Error, cause: Option<CauseSnapshot>) -> Self {
        let layer = err.layer();
        let (created, stack) = match &err.node().repr {
            Repr::Full { stack, created, .. } => (
                Some(*created),
                stack.as_deref().map(|s| s.frames(&config())).unwrap_or_default(),
            ),
            _ => (None, Vec::new()),
        };
        Snapshot {
            id: err.id().to_string(),
            assigned_id: layer.id.as_deref().map(str::to_string),
            message: layer.message.to_string(),
            class: layer.class,
            category: layer.category.clone(),
            severity: layer.severity,
            retryable: layer.retryable,
            span: layer.span.clone(),
            fields: layer
                .fields
                .iter()
                .map(|f| FieldSnapshot {
                    key: f.key().to_string(),
                    value: f.value().render(),
                })
                .collect(),
            created,
            stack,
            cause,
        }
    }

    /// Rebuild a chain from this snapshot.
    ///
    /// Layers with a creation time become full nodes holding the recorded
    /// frames; the rest become minimal nodes. A textual cause becomes a
    /// [`RemoteCause`]. Wrap depth limits apply as for any other chain.
    pub fn into_error(self) -> Error {
        // Flatten outermost-first so rebuilding needs no recursion.
        let mut flat = Vec::new();
        let mut terminal = None;
        let mut next = Some(self);
        while let Some(mut snap) = next.take() {
            match snap.cause.take() {
                Some(CauseSnapshot::Chain(inner)) => next = Some(*inner),
                Some(CauseSnapshot::Message(text)) => terminal = Some(text),
                None => {}
            }
            flat.push(snap);
        }

        let mut cause = match terminal {
            Some(text) => Cause::Foreign(Arc::new(RemoteCause(text))),
            None => Cause::None,
        };
        let innermost = flat.len().saturating_sub(1);
        for (i, snap) in flat.into_iter().enumerate().rev() {
            let seed = (i == innermost && snap.assigned_id.is_none()).then(|| snap.id.clone());
            let err = snap.rebuild(cause);
            if let Some(token) = seed {
                err.layer().seed_token(&token);
            }
            cause = Cause::Chain(err);
        }
        match cause {
            Cause::Chain(err) => err,
            // Unreachable: the loop runs at least once.
            other => Error::from_node(Node {
                layer: Layer::default(),
                depth: 1,
                repr: Repr::Minimal { cause: other },
            }),
        }
    }

    fn rebuild(self, cause: Cause) -> Error {
        let mut layer = Layer::default();
        layer.set_message(self.message);
        layer.id = self.assigned_id.map(Into::into);
        layer.class = self.class;
        layer.category = self.category;
        layer.severity = self.severity;
        layer.retryable = self.retryable;
        layer.span = self.span;
        for f in self.fields {
            layer.push_field(Field::new(f.key, f.value));
        }

        let (cause, depth) = link(cause);
        let repr = match self.created {
            Some(created) => Repr::Full {
                stack: (!self.stack.is_empty()).then(|| Arc::new(Stack::from_frames(self.stack))),
                created,
                cause,
            },
            None => Repr::Minimal { cause },
        };
        Error::from_node(Node { layer, depth, repr })
    }
}

impl Error {
    /// Capture this chain's observable state for encoding.
    ///
    /// Structured layers nest through `cause`; a foreign terminal cause is
    /// kept as its rendered text.
    pub fn snapshot(&self) -> Snapshot {
        let layers: Vec<&Error> = self.layers().collect();
        let mut current: Option<Snapshot> = None;
        for err in layers.into_iter().rev() {
            let cause = match current.take() {
                Some(inner) => Some(CauseSnapshot::Chain(Box::new(inner))),
                None => match err.cause() {
                    Some(CauseRef::Foreign(f)) => Some(CauseSnapshot::Message(render_foreign(f))),
                    _ => None,
                },
            };
            current = Some(Snapshot::of_layer(err, cause));
        }
        current.unwrap_or_else(|| Snapshot::of_layer(self, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;

    #[test]
    fn nested_layers_and_foreign_text() {
        let root = crate::wrap(std::io::Error::other("connection reset"), "payment failed")
            .with_class(Class::Validation)
            .with_field("order_id", 42);
        let err = crate::Builder::new("handler error")
            .id("PAY-001")
            .cause(root)
            .with_stack()
            .build();

        let snap = err.snapshot();
        assert_eq!(snap.id, "PAY-001");
        assert_eq!(snap.assigned_id.as_deref(), Some("PAY-001"));
        assert_eq!(snap.message, "handler error");
        assert!(snap.created.is_none());

        let Some(CauseSnapshot::Chain(inner)) = &snap.cause else {
            panic!("expected nested layer");
        };
        assert_eq!(inner.class, Some(Class::Validation));
        assert_eq!(
            inner.fields,
            vec![FieldSnapshot {
                key: "order_id".into(),
                value: "42".into()
            }]
        );
        assert!(inner.created.is_some());
        assert_eq!(
            inner.cause,
            Some(CauseSnapshot::Message("connection reset".into()))
        );
    }

    #[test]
    fn rebuilt_chain_renders_the_same() {
        let original = crate::wrap(std::io::Error::other("connection reset"), "payment failed")
            .with_class(Class::Validation)
            .with_severity(Severity::Error)
            .with_field("order_id", 42)
            .wrap("handler error")
            .with_retryable(true);

        let rebuilt = original.snapshot().into_error();
        assert_eq!(rebuilt.to_string(), original.to_string());
        assert_eq!(rebuilt.id(), original.id());
        assert_eq!(rebuilt.explicit_id(), None);
        assert_eq!(rebuilt.class(), Class::Validation);
        assert_eq!(rebuilt.severity(), Some(Severity::Error));
        assert_eq!(rebuilt.retryable(), Some(true));
        assert_eq!(rebuilt.created(), original.created());
        assert_eq!(rebuilt.depth(), original.depth());
        assert_eq!(
            crate::find::<RemoteCause>(&rebuilt).map(|c| c.0.as_str()),
            Some("connection reset")
        );
    }

    #[test]
    fn layers_without_creation_time_rebuild_minimal() {
        let snap = Snapshot {
            id: "abc".into(),
            assigned_id: None,
            message: "remote".into(),
            class: None,
            category: None,
            severity: None,
            retryable: None,
            span: None,
            fields: Vec::new(),
            created: None,
            stack: Vec::new(),
            cause: None,
        };
        let err = snap.into_error();
        assert_eq!(err.kind(), NodeKind::Minimal);
        assert_eq!(err.id(), "abc");
        assert!(err.stack().is_none());
    }

    #[test]
    fn recorded_frames_survive_the_trip() {
        let frame = Frame {
            function: "myapp::db::query".into(),
            package: "myapp::db".into(),
            file: "db.rs".into(),
            line: 142,
        };
        let snap = Snapshot {
            id: "abc".into(),
            assigned_id: Some("abc".into()),
            message: "query failed".into(),
            class: None,
            category: None,
            severity: None,
            retryable: None,
            span: None,
            fields: Vec::new(),
            created: Some(Utc::now()),
            stack: vec![frame.clone()],
            cause: None,
        };
        let err = snap.into_error();
        assert_eq!(err.kind(), NodeKind::Full);
        let stack = err.stack().expect("stack restored");
        assert_eq!(stack.raw_len(), 0);
        assert_eq!(stack.resolved(), &[frame]);
    }
}
