//! Undo/redo history.
//!
//! Each committed action is stored as a [`HistoryEntry`]: plain data that
//! knows how to build its own inverse and the mutations that perform it.
//! Undo applies the inverse of the newest entry; redo re-applies it.
//! Entries serialize with serde, so a history can be inspected or replayed.
//!
//! Drag gestures apply their changes live and are recorded once, on commit,
//! with the before/after values captured by the gesture.

use crate::error::EditError;
use crate::sync::{GraphMutation, SyncEngine};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use wf_core::{EdgeId, EdgeVisual, Endpoint, Gate, NodeId, StateNode, Transition};

/// Endpoints and cosmetic state of a transition at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeShape {
    pub from: NodeId,
    pub to: NodeId,
    pub visual: EdgeVisual,
}

impl EdgeShape {
    pub fn endpoint(&self, end: Endpoint) -> NodeId {
        match end {
            Endpoint::Start => self.from,
            Endpoint::End => self.to,
        }
    }
}

/// A committed, reversible action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    NodeAdd {
        node: StateNode,
    },
    NodeDelete {
        node: StateNode,
    },
    NodeMove {
        id: NodeId,
        from: Point,
        to: Point,
    },
    NodeResize {
        id: NodeId,
        from: Rect,
        to: Rect,
    },
    EdgeAdd {
        edge: Transition,
        gates: Vec<Gate>,
        visual: EdgeVisual,
    },
    EdgeDelete {
        edge: Transition,
        gates: Vec<Gate>,
        visual: EdgeVisual,
    },
    /// Reconnected endpoint, moved waypoints or label, or new anchors.
    EdgeReshape {
        id: EdgeId,
        before: EdgeShape,
        after: EdgeShape,
    },
}

impl HistoryEntry {
    pub fn description(&self) -> &'static str {
        match self {
            HistoryEntry::NodeAdd { .. } => "Add state",
            HistoryEntry::NodeDelete { .. } => "Delete state",
            HistoryEntry::NodeMove { .. } => "Move state",
            HistoryEntry::NodeResize { .. } => "Resize state",
            HistoryEntry::EdgeAdd { .. } => "Add transition",
            HistoryEntry::EdgeDelete { .. } => "Delete transition",
            HistoryEntry::EdgeReshape { .. } => "Edit transition",
        }
    }

    /// The entry that undoes this one.
    pub fn inverse(&self) -> HistoryEntry {
        match self.clone() {
            HistoryEntry::NodeAdd { node } => HistoryEntry::NodeDelete { node },
            HistoryEntry::NodeDelete { node } => HistoryEntry::NodeAdd { node },
            HistoryEntry::NodeMove { id, from, to } => HistoryEntry::NodeMove {
                id,
                from: to,
                to: from,
            },
            HistoryEntry::NodeResize { id, from, to } => HistoryEntry::NodeResize {
                id,
                from: to,
                to: from,
            },
            HistoryEntry::EdgeAdd {
                edge,
                gates,
                visual,
            } => HistoryEntry::EdgeDelete {
                edge,
                gates,
                visual,
            },
            HistoryEntry::EdgeDelete {
                edge,
                gates,
                visual,
            } => HistoryEntry::EdgeAdd {
                edge,
                gates,
                visual,
            },
            HistoryEntry::EdgeReshape { id, before, after } => HistoryEntry::EdgeReshape {
                id,
                before: after,
                after: before,
            },
        }
    }

    /// Mutations that carry this entry out.
    pub fn mutations(&self) -> Vec<GraphMutation> {
        match self.clone() {
            HistoryEntry::NodeAdd { node } => vec![GraphMutation::AddNode(Box::new(node))],
            HistoryEntry::NodeDelete { node } => vec![GraphMutation::RemoveNode(node.id)],
            HistoryEntry::NodeMove { id, to, .. } => vec![GraphMutation::MoveNode { id, to }],
            HistoryEntry::NodeResize { id, to, .. } => vec![GraphMutation::ResizeNode {
                id,
                position: to.center(),
                size: to.size(),
            }],
            HistoryEntry::EdgeAdd {
                edge,
                gates,
                visual,
            } => vec![GraphMutation::AddEdge {
                edge: Box::new(edge),
                gates,
                visual,
            }],
            HistoryEntry::EdgeDelete { edge, .. } => vec![GraphMutation::RemoveEdge(edge.id)],
            HistoryEntry::EdgeReshape { id, before, after } => {
                let mut out = Vec::new();
                if before.from != after.from {
                    out.push(GraphMutation::RebindEdge {
                        id,
                        end: Endpoint::Start,
                        node: after.from,
                    });
                }
                if before.to != after.to {
                    out.push(GraphMutation::RebindEdge {
                        id,
                        end: Endpoint::End,
                        node: after.to,
                    });
                }
                out.push(GraphMutation::RestoreEdgeVisual {
                    edge: id,
                    visual: after.visual,
                });
                out
            }
        }
    }
}

/// Apply every mutation of `entry`; stops at the first rejection.
fn perform(engine: &mut SyncEngine, entry: &HistoryEntry) -> Result<(), EditError> {
    for m in entry.mutations() {
        engine.apply_mutation(m)?;
    }
    Ok(())
}

/// Bounded undo/redo stacks.
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Maximum undo depth.
    max_depth: usize,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// Apply `entry` through the engine, then record it.
    pub fn execute(&mut self, engine: &mut SyncEngine, entry: HistoryEntry) -> Result<(), EditError> {
        perform(engine, &entry)?;
        self.record(entry);
        Ok(())
    }

    /// Record an entry whose effect is already applied (a finished drag).
    pub fn record(&mut self, entry: HistoryEntry) {
        log::debug!("history: {}", entry.description());
        self.undo_stack.push(entry);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        // Clear redo stack on new action
        self.redo_stack.clear();
    }

    /// Undo the newest entry. On failure the entry stays on the undo stack.
    pub fn undo(&mut self, engine: &mut SyncEngine) -> Result<&'static str, EditError> {
        let entry = self.undo_stack.pop().ok_or(EditError::NothingToUndo)?;
        if let Err(e) = perform(engine, &entry.inverse()) {
            log::warn!("undo of `{}` failed: {e}", entry.description());
            self.undo_stack.push(entry);
            return Err(e);
        }
        let desc = entry.description();
        log::debug!("undo: {desc}");
        self.redo_stack.push(entry);
        Ok(desc)
    }

    /// Redo the newest undone entry.
    pub fn redo(&mut self, engine: &mut SyncEngine) -> Result<&'static str, EditError> {
        let entry = self.redo_stack.pop().ok_or(EditError::NothingToRedo)?;
        if let Err(e) = perform(engine, &entry) {
            log::warn!("redo of `{}` failed: {e}", entry.description());
            self.redo_stack.push(entry);
            return Err(e);
        }
        let desc = entry.description();
        log::debug!("redo: {desc}");
        self.undo_stack.push(entry);
        Ok(desc)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
