//! Error types for structural graph violations and document import.
//!
//! `Display` strings double as the user-facing notification text.

use crate::id::{EdgeId, GateId, NodeId};
use thiserror::Error;

/// A structural violation rejected before any mutation took place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("state `{0}` does not exist")]
    UnknownNode(NodeId),

    #[error("transition `{0}` does not exist")]
    UnknownEdge(EdgeId),

    #[error("gate `{0}` does not exist")]
    UnknownGate(GateId),

    #[error("a state cannot transition to itself")]
    SelfLoop(NodeId),

    #[error("a transition from `{from}` to `{to}` already exists")]
    DuplicateEdge { from: NodeId, to: NodeId },

    #[error("state `{node}` is used by {count} transition(s); delete those first")]
    NodeReferenced { node: NodeId, count: usize },

    #[error("state `{0}` is locked against this change")]
    NodeLocked(NodeId),

    #[error("an item with id `{0}` already exists")]
    DuplicateId(String),
}

/// Failure to read an export document. Per-transition problems are not
/// errors; they are reported as warnings on the import outcome.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("document field `{field}` is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },
}
