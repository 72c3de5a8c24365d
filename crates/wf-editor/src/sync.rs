//! Sync engine: in-memory document ↔ external stores.
//!
//! The engine owns the authoritative [`WorkflowGraph`] and [`VisualLayout`]
//! for one workflow. Every edit arrives as a [`GraphMutation`]:
//!
//! - **Apply**: the mutation is validated and applied to memory right away
//!   (optimistic), and the touched entities are marked dirty. Drag frames go
//!   through here too, so the canvas always shows live state.
//!
//! - **Flush**: when a gesture or command commits, [`SyncEngine::flush`]
//!   turns the dirty set into [`PersistOp`]s queued in the outbox. The host
//!   drains the outbox into [`crate::persist::write_through`] without
//!   blocking pointer handling.

use kurbo::{Point, Size};
use std::collections::HashSet;
use wf_core::routing::{EdgeRoute, route_transition};
use wf_core::{
    Anchor, EdgeId, EdgeVisual, Endpoint, Gate, GateId, GraphError, LabelPlacement, NodeId,
    SnapSettings, StateNode, Transition, VisualLayout, WorkflowGraph,
};

/// A single edit to the document.
#[derive(Debug, Clone)]
pub enum GraphMutation {
    AddNode(Box<StateNode>),
    RemoveNode(NodeId),
    MoveNode {
        id: NodeId,
        to: Point,
    },
    /// Resizing keeps the opposite side fixed, so the center moves too.
    ResizeNode {
        id: NodeId,
        position: Point,
        size: Size,
    },
    /// Add a transition together with its gates and cosmetic state.
    AddEdge {
        edge: Box<Transition>,
        gates: Vec<Gate>,
        visual: EdgeVisual,
    },
    /// Remove a transition; its gates and cosmetic state go with it.
    RemoveEdge(EdgeId),
    RebindEdge {
        id: EdgeId,
        end: Endpoint,
        node: NodeId,
    },
    SetWaypoints {
        edge: EdgeId,
        waypoints: Vec<Point>,
    },
    SetLabel {
        edge: EdgeId,
        placement: Option<LabelPlacement>,
    },
    SetAnchor {
        edge: EdgeId,
        end: Endpoint,
        anchor: Option<Anchor>,
    },
    /// Replace every cosmetic entry of a transition at once.
    RestoreEdgeVisual {
        edge: EdgeId,
        visual: EdgeVisual,
    },
    AddGate(Box<Gate>),
    RemoveGate(GateId),
    SetSnap(SnapSettings),
    /// Swap in a whole new graph (import). Cosmetic per-edge state is
    /// cleared.
    ReplaceGraph(Box<WorkflowGraph>),
}

/// One write to an external store, produced by [`SyncEngine::flush`].
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    UpsertNode(StateNode),
    DeleteNode(NodeId),
    UpsertEdge(Transition),
    DeleteEdge(EdgeId),
    UpsertGate(Gate),
    DeleteGate(GateId),
    ReplaceGraph {
        nodes: Vec<StateNode>,
        edges: Vec<Transition>,
        gates: Vec<Gate>,
    },
    /// Serialized cosmetic record.
    SaveVisual(String),
}

#[derive(Debug, Default)]
struct Dirty {
    nodes: HashSet<NodeId>,
    removed_nodes: HashSet<NodeId>,
    edges: HashSet<EdgeId>,
    removed_edges: HashSet<EdgeId>,
    gates: HashSet<GateId>,
    removed_gates: HashSet<GateId>,
    visual: bool,
    replaced: bool,
}

impl Dirty {
    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.edges.is_empty()
            && self.removed_edges.is_empty()
            && self.gates.is_empty()
            && self.removed_gates.is_empty()
            && !self.visual
            && !self.replaced
    }

    fn touch_node(&mut self, id: NodeId) {
        self.removed_nodes.remove(&id);
        self.nodes.insert(id);
    }

    fn drop_node(&mut self, id: NodeId) {
        self.nodes.remove(&id);
        self.removed_nodes.insert(id);
    }

    fn touch_edge(&mut self, id: EdgeId) {
        self.removed_edges.remove(&id);
        self.edges.insert(id);
    }

    fn drop_edge(&mut self, id: EdgeId) {
        self.edges.remove(&id);
        self.removed_edges.insert(id);
    }

    fn touch_gate(&mut self, id: GateId) {
        self.removed_gates.remove(&id);
        self.gates.insert(id);
    }

    fn drop_gate(&mut self, id: GateId) {
        self.gates.remove(&id);
        self.removed_gates.insert(id);
    }
}

fn sorted<T: Copy + std::fmt::Display>(set: &HashSet<T>) -> Vec<T> {
    let mut v: Vec<T> = set.iter().copied().collect();
    v.sort_by_key(|id| id.to_string());
    v
}

/// Holds the document for one workflow and tracks what must be persisted.
pub struct SyncEngine {
    /// Workflow id the stores key everything by.
    pub workflow: String,
    graph: WorkflowGraph,
    visual: VisualLayout,
    dirty: Dirty,
    outbox: Vec<PersistOp>,
}

impl SyncEngine {
    pub fn new(workflow: impl Into<String>) -> Self {
        Self::with_document(workflow, WorkflowGraph::new(), VisualLayout::new())
    }

    /// Start from an already-persisted document. Nothing is dirty.
    pub fn with_document(
        workflow: impl Into<String>,
        graph: WorkflowGraph,
        visual: VisualLayout,
    ) -> Self {
        Self {
            workflow: workflow.into(),
            graph,
            visual,
            dirty: Dirty::default(),
            outbox: Vec::new(),
        }
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn visual(&self) -> &VisualLayout {
        &self.visual
    }

    pub fn route(&self, edge: EdgeId) -> Option<EdgeRoute> {
        route_transition(&self.graph, &self.visual, edge)
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    // ─── Mutation ───────────────────────────────────────────────────────

    /// Validate and apply one mutation. Rejected mutations leave the
    /// document untouched.
    pub fn apply_mutation(&mut self, mutation: GraphMutation) -> Result<(), GraphError> {
        log::trace!("apply {mutation:?}");
        match mutation {
            GraphMutation::AddNode(node) => {
                let id = self.graph.add_node(*node)?;
                self.dirty.touch_node(id);
            }
            GraphMutation::RemoveNode(id) => {
                self.graph.remove_node(id)?;
                self.dirty.drop_node(id);
            }
            GraphMutation::MoveNode { id, to } => {
                let node = self.graph.node_mut(id).ok_or(GraphError::UnknownNode(id))?;
                node.position = to;
                self.dirty.touch_node(id);
            }
            GraphMutation::ResizeNode { id, position, size } => {
                let node = self.graph.node_mut(id).ok_or(GraphError::UnknownNode(id))?;
                node.position = position;
                node.set_size(size);
                self.dirty.touch_node(id);
            }
            GraphMutation::AddEdge {
                edge,
                gates,
                visual,
            } => {
                let id = edge.id;
                // Gates are checked up front so a bad gate cannot leave a
                // half-added transition behind.
                if let Some(g) = gates.iter().find(|g| g.edge != id) {
                    return Err(GraphError::UnknownEdge(g.edge));
                }
                if let Some(g) = gates.iter().find(|g| self.graph.gate(g.id).is_some()) {
                    return Err(GraphError::DuplicateId(g.id.to_string()));
                }
                self.graph.add_edge(*edge)?;
                self.dirty.touch_edge(id);
                for gate in gates {
                    let gid = self.graph.add_gate(gate)?;
                    self.dirty.touch_gate(gid);
                }
                if !visual.is_empty() {
                    self.visual.restore_edge(id, visual);
                    self.dirty.visual = true;
                }
            }
            GraphMutation::RemoveEdge(id) => {
                let (_, gates) = self.graph.remove_edge(id)?;
                for g in gates {
                    self.dirty.drop_gate(g.id);
                }
                self.dirty.drop_edge(id);
                if !self.visual.remove_edge(id).is_empty() {
                    self.dirty.visual = true;
                }
            }
            GraphMutation::RebindEdge { id, end, node } => {
                self.graph.rebind_edge(id, end, node)?;
                self.dirty.touch_edge(id);
            }
            GraphMutation::SetWaypoints { edge, waypoints } => {
                self.require_edge(edge)?;
                self.visual.set_waypoints(edge, waypoints);
                self.dirty.visual = true;
            }
            GraphMutation::SetLabel { edge, placement } => {
                self.require_edge(edge)?;
                self.visual.set_label(edge, placement);
                self.dirty.visual = true;
            }
            GraphMutation::SetAnchor { edge, end, anchor } => {
                self.require_edge(edge)?;
                self.visual.set_anchor(edge, end, anchor);
                self.dirty.visual = true;
            }
            GraphMutation::RestoreEdgeVisual { edge, visual } => {
                self.require_edge(edge)?;
                self.visual.restore_edge(edge, visual);
                self.dirty.visual = true;
            }
            GraphMutation::AddGate(gate) => {
                let id = self.graph.add_gate(*gate)?;
                self.dirty.touch_gate(id);
            }
            GraphMutation::RemoveGate(id) => {
                self.graph.remove_gate(id)?;
                self.dirty.drop_gate(id);
            }
            GraphMutation::SetSnap(settings) => {
                self.visual.snap = settings;
                self.dirty.visual = true;
            }
            GraphMutation::ReplaceGraph(graph) => {
                self.graph = *graph;
                self.visual.clear_edges();
                self.dirty = Dirty {
                    visual: true,
                    replaced: true,
                    ..Dirty::default()
                };
            }
        }
        Ok(())
    }

    fn require_edge(&self, edge: EdgeId) -> Result<(), GraphError> {
        if self.graph.edge(edge).is_some() {
            Ok(())
        } else {
            Err(GraphError::UnknownEdge(edge))
        }
    }

    // ─── Persistence ────────────────────────────────────────────────────

    /// Forget pending changes without persisting them (a cancelled drag
    /// that has already been reverted in memory).
    pub fn discard_dirty(&mut self) {
        self.dirty = Dirty::default();
    }

    /// Turn dirty state into persistence ops appended to the outbox.
    /// Deletes run children-first, upserts parents-first.
    pub fn flush(&mut self) {
        let dirty = std::mem::take(&mut self.dirty);
        let before = self.outbox.len();

        if dirty.replaced {
            self.outbox.push(PersistOp::ReplaceGraph {
                nodes: self.graph.nodes().cloned().collect(),
                edges: self.graph.edges().cloned().collect(),
                gates: self.graph.gates().cloned().collect(),
            });
        } else {
            for id in sorted(&dirty.removed_gates) {
                self.outbox.push(PersistOp::DeleteGate(id));
            }
            for id in sorted(&dirty.removed_edges) {
                self.outbox.push(PersistOp::DeleteEdge(id));
            }
            for id in sorted(&dirty.removed_nodes) {
                self.outbox.push(PersistOp::DeleteNode(id));
            }
            for id in sorted(&dirty.nodes) {
                if let Some(n) = self.graph.node(id) {
                    self.outbox.push(PersistOp::UpsertNode(n.clone()));
                }
            }
            for id in sorted(&dirty.edges) {
                if let Some(e) = self.graph.edge(id) {
                    self.outbox.push(PersistOp::UpsertEdge(e.clone()));
                }
            }
            for id in sorted(&dirty.gates) {
                if let Some(g) = self.graph.gate(id) {
                    self.outbox.push(PersistOp::UpsertGate(g.clone()));
                }
            }
        }

        if dirty.visual {
            match self.visual.to_json() {
                Ok(json) => self.outbox.push(PersistOp::SaveVisual(json)),
                Err(e) => log::warn!("could not serialize visual record: {e}"),
            }
        }

        let queued = self.outbox.len() - before;
        if queued > 0 {
            log::debug!("flush queued {queued} op(s) for workflow `{}`", self.workflow);
        }
    }

    pub fn outbox(&self) -> &[PersistOp] {
        &self.outbox
    }

    pub fn drain_outbox(&mut self) -> Vec<PersistOp> {
        std::mem::take(&mut self.outbox)
    }
}
