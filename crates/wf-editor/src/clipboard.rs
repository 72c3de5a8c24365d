//! Copy/cut/paste of a single state or transition.

use crate::commands::HistoryEntry;
use crate::error::EditError;
use crate::interaction::Selection;
use kurbo::Vec2;
use wf_core::{EdgeId, EdgeVisual, Gate, GateId, GraphError, NodeId, StateNode, Transition};
use wf_core::{VisualLayout, WorkflowGraph};

/// Snapshot of what was copied.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardItem {
    Node(StateNode),
    Edge {
        edge: Transition,
        gates: Vec<Gate>,
        visual: EdgeVisual,
    },
}

impl ClipboardItem {
    /// Snapshot the current selection.
    pub fn capture(
        graph: &WorkflowGraph,
        visual: &VisualLayout,
        selection: Selection,
    ) -> Result<Self, EditError> {
        match selection {
            Selection::None => Err(EditError::NothingSelected),
            Selection::Node(id) => graph
                .node(id)
                .cloned()
                .map(ClipboardItem::Node)
                .ok_or(GraphError::UnknownNode(id).into()),
            Selection::Edge(id) => {
                let edge = graph.edge(id).ok_or(GraphError::UnknownEdge(id))?;
                Ok(ClipboardItem::Edge {
                    edge: edge.clone(),
                    gates: graph.gates_for(id).into_iter().cloned().collect(),
                    visual: visual.edge_visual(id),
                })
            }
        }
    }

    /// Build the history entry that pastes this item with fresh ids.
    ///
    /// States are offset by `offset`. Transitions are refused if an
    /// endpoint is gone or the ordered pair is already connected.
    pub fn paste_entry(&self, graph: &WorkflowGraph, offset: Vec2) -> Result<HistoryEntry, EditError> {
        match self {
            ClipboardItem::Node(node) => {
                let mut node = node.clone();
                node.id = NodeId::generate();
                node.position += offset;
                Ok(HistoryEntry::NodeAdd { node })
            }
            ClipboardItem::Edge {
                edge,
                gates,
                visual,
            } => {
                for end in [edge.from, edge.to] {
                    if !graph.contains_node(end) {
                        return Err(EditError::MissingEndpoint(end));
                    }
                }
                graph.validate_edge(edge.from, edge.to, None)?;
                let mut edge = edge.clone();
                edge.id = EdgeId::generate();
                let gates = gates
                    .iter()
                    .map(|g| {
                        let mut g = g.clone();
                        g.id = GateId::generate();
                        g.edge = edge.id;
                        g
                    })
                    .collect();
                Ok(HistoryEntry::EdgeAdd {
                    edge,
                    gates,
                    visual: visual.clone(),
                })
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Clipboard {
    item: Option<ClipboardItem>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy(
        &mut self,
        graph: &WorkflowGraph,
        visual: &VisualLayout,
        selection: Selection,
    ) -> Result<(), EditError> {
        self.item = Some(ClipboardItem::capture(graph, visual, selection)?);
        Ok(())
    }

    pub fn item(&self) -> Option<&ClipboardItem> {
        self.item.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.item.is_none()
    }

    /// Entry for pasting the clipboard. A pasted state shifts the stored
    /// copy too, so repeated pastes cascade instead of stacking.
    pub fn paste(&mut self, graph: &WorkflowGraph, offset: Vec2) -> Result<HistoryEntry, EditError> {
        let item = self.item.as_mut().ok_or(EditError::ClipboardEmpty)?;
        let entry = item.paste_entry(graph, offset)?;
        if let ClipboardItem::Node(node) = item {
            node.position += offset;
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use wf_core::GateKind;

    fn setup() -> (WorkflowGraph, VisualLayout, NodeId, NodeId, EdgeId) {
        let mut g = WorkflowGraph::new();
        let a = g
            .add_node(StateNode::new(NodeId::generate(), "A", Point::new(100.0, 100.0)))
            .unwrap();
        let b = g
            .add_node(StateNode::new(NodeId::generate(), "B", Point::new(400.0, 100.0)))
            .unwrap();
        let e = g.add_edge(Transition::new(EdgeId::generate(), a, b)).unwrap();
        g.add_gate(Gate::new(GateId::generate(), e, "QA", GateKind::Checklist))
            .unwrap();
        (g, VisualLayout::new(), a, b, e)
    }

    #[test]
    fn pasted_nodes_cascade() {
        let (g, v, a, _, _) = setup();
        let mut clip = Clipboard::new();
        clip.copy(&g, &v, Selection::Node(a)).unwrap();
        let offset = Vec2::new(20.0, 20.0);

        let first = clip.paste(&g, offset).unwrap();
        let second = clip.paste(&g, offset).unwrap();
        match (first, second) {
            (HistoryEntry::NodeAdd { node: n1 }, HistoryEntry::NodeAdd { node: n2 }) => {
                assert_ne!(n1.id, a);
                assert_ne!(n1.id, n2.id);
                assert_eq!(n1.position, Point::new(120.0, 100.0 + 20.0));
                assert_eq!(n2.position, Point::new(140.0, 140.0));
            }
            other => panic!("expected two NodeAdd entries, got {other:?}"),
        }
    }

    #[test]
    fn edge_paste_rejects_duplicate_pair() {
        let (g, v, _, _, e) = setup();
        let mut clip = Clipboard::new();
        clip.copy(&g, &v, Selection::Edge(e)).unwrap();
        let err = clip.paste(&g, Vec2::ZERO).unwrap_err();
        assert!(matches!(err, EditError::Graph(GraphError::DuplicateEdge { .. })));
    }

    #[test]
    fn edge_paste_rejects_missing_endpoint() {
        let (mut g, v, _, b, e) = setup();
        let mut clip = Clipboard::new();
        clip.copy(&g, &v, Selection::Edge(e)).unwrap();
        g.remove_edge(e).unwrap();
        g.remove_node(b).unwrap();
        let err = clip.paste(&g, Vec2::ZERO).unwrap_err();
        assert!(matches!(err, EditError::MissingEndpoint(n) if n == b));
    }

    #[test]
    fn edge_paste_regenerates_gate_ids() {
        let (mut g, v, _, _, e) = setup();
        let mut clip = Clipboard::new();
        clip.copy(&g, &v, Selection::Edge(e)).unwrap();
        g.remove_edge(e).unwrap();
        match clip.paste(&g, Vec2::ZERO).unwrap() {
            HistoryEntry::EdgeAdd { edge, gates, .. } => {
                assert_ne!(edge.id, e);
                assert_eq!(gates.len(), 1);
                assert_eq!(gates[0].edge, edge.id);
            }
            other => panic!("expected EdgeAdd, got {other:?}"),
        }
    }

    #[test]
    fn copy_requires_selection() {
        let (g, v, _, _, _) = setup();
        let mut clip = Clipboard::new();
        assert!(matches!(
            clip.copy(&g, &v, Selection::None),
            Err(EditError::NothingSelected)
        ));
        assert!(matches!(clip.paste(&g, Vec2::ZERO), Err(EditError::ClipboardEmpty)));
    }
}
