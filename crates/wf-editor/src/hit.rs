//! Hit testing: canvas point → the thing under the pointer.
//!
//! Handles of the selected item win over connectors, connectors over
//! labels, labels over state boxes, and boxes over transition lines. Among
//! states the topmost (latest in arena order) wins.

use crate::config::EditorConfig;
use crate::interaction::Selection;
use kurbo::{Point, Rect, Size};
use wf_core::geometry::distance_to_polyline;
use wf_core::routing::{EdgeRoute, WaypointHandle, route_transition};
use wf_core::{EdgeId, Endpoint, NodeId, Side, StateNode, VisualLayout, WorkflowGraph};

/// One of the eight resize grips of a state box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeHandle {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::NorthWest,
        ResizeHandle::North,
        ResizeHandle::NorthEast,
        ResizeHandle::East,
        ResizeHandle::SouthEast,
        ResizeHandle::South,
        ResizeHandle::SouthWest,
        ResizeHandle::West,
    ];

    /// Sign of the width/height change per unit of pointer travel:
    /// `+1` grows toward the pointer on that axis, `-1` grows away, `0`
    /// leaves the axis alone.
    pub fn signs(self) -> (f64, f64) {
        match self {
            ResizeHandle::North => (0.0, -1.0),
            ResizeHandle::South => (0.0, 1.0),
            ResizeHandle::East => (1.0, 0.0),
            ResizeHandle::West => (-1.0, 0.0),
            ResizeHandle::NorthEast => (1.0, -1.0),
            ResizeHandle::NorthWest => (-1.0, -1.0),
            ResizeHandle::SouthEast => (1.0, 1.0),
            ResizeHandle::SouthWest => (-1.0, 1.0),
        }
    }

    pub fn position(self, rect: Rect) -> Point {
        let (sx, sy) = self.signs();
        let c = rect.center();
        Point::new(
            c.x + sx * rect.width() / 2.0,
            c.y + sy * rect.height() / 2.0,
        )
    }

    /// Resize `start` by pointer travel `(dx, dy)`, holding the opposite
    /// side fixed and clamping to the minimum state size.
    pub fn apply(self, start: Rect, dx: f64, dy: f64) -> Rect {
        let (sx, sy) = self.signs();
        let size = wf_core::clamp_size(Size::new(
            start.width() + sx * dx,
            start.height() + sy * dy,
        ));
        let (x0, x1) = match sx {
            s if s > 0.0 => (start.x0, start.x0 + size.width),
            s if s < 0.0 => (start.x1 - size.width, start.x1),
            _ => (start.x0, start.x1),
        };
        let (y0, y1) = match sy {
            s if s > 0.0 => (start.y0, start.y0 + size.height),
            s if s < 0.0 => (start.y1 - size.height, start.y1),
            _ => (start.y0, start.y1),
        };
        Rect::new(x0, y0, x1, y1)
    }
}

/// What lies under the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitTarget {
    Resize { node: NodeId, handle: ResizeHandle },
    EdgeEndpoint { edge: EdgeId, end: Endpoint },
    Waypoint { edge: EdgeId, handle: WaypointHandle },
    Connector { node: NodeId, side: Side },
    Label { edge: EdgeId },
    Node(NodeId),
    Edge(EdgeId),
}

impl HitTarget {
    /// The state this target belongs to, if any.
    pub fn node(&self) -> Option<NodeId> {
        match *self {
            HitTarget::Resize { node, .. }
            | HitTarget::Connector { node, .. }
            | HitTarget::Node(node) => Some(node),
            _ => None,
        }
    }
}

/// Canvas position of a state's directional connector.
pub fn connector_position(node: &StateNode, side: Side, offset: f64) -> Point {
    let r = node.bounds();
    let c = r.center();
    let mid = match side {
        Side::Left => Point::new(r.x0, c.y),
        Side::Right => Point::new(r.x1, c.y),
        Side::Top => Point::new(c.x, r.y0),
        Side::Bottom => Point::new(c.x, r.y1),
    };
    mid + side.normal() * offset
}

/// Rough label box: labels are painted by the host, so width is estimated
/// from the character count.
pub fn label_bounds(center: Point, text: &str) -> Rect {
    let width = (text.chars().count() as f64 * 7.0 + 12.0).max(40.0);
    Rect::from_center_size(center, Size::new(width, 22.0))
}

/// Current label position of a transition.
pub fn label_position(visual: &VisualLayout, edge: EdgeId, route: &EdgeRoute) -> Point {
    let default = route.midpoint();
    visual
        .label(edge)
        .map_or(default, |placement| placement.resolve(default))
}

/// Topmost state whose box, inflated by `padding`, contains `p`. A state
/// that contains `p` outright beats one that only matches via padding.
pub fn node_at_padded(graph: &WorkflowGraph, p: Point, padding: f64) -> Option<NodeId> {
    let nodes: Vec<&StateNode> = graph.nodes().collect();
    nodes
        .iter()
        .rev()
        .find(|n| n.bounds().contains(p))
        .or_else(|| {
            nodes
                .iter()
                .rev()
                .find(|n| n.bounds().inflate(padding, padding).contains(p))
        })
        .map(|n| n.id)
}

/// Everything hit testing looks at.
pub struct HitScene<'a> {
    pub graph: &'a WorkflowGraph,
    pub visual: &'a VisualLayout,
    pub selection: Selection,
    pub hovered: Option<NodeId>,
    pub config: &'a EditorConfig,
    pub zoom: f64,
}

impl HitScene<'_> {
    fn px(&self, px: f64) -> f64 {
        px / self.zoom
    }

    pub fn hit_test(&self, p: Point) -> Option<HitTarget> {
        let grip = self.px(self.config.handle_radius);

        match self.selection {
            Selection::Node(id) => {
                if let Some(node) = self.graph.node(id)
                    && node.flags.resizable
                {
                    let rect = node.bounds();
                    if let Some(handle) = ResizeHandle::ALL
                        .into_iter()
                        .find(|h| h.position(rect).distance(p) <= grip)
                    {
                        return Some(HitTarget::Resize { node: id, handle });
                    }
                }
            }
            Selection::Edge(id) => {
                if let Some(route) = route_transition(self.graph, self.visual, id) {
                    for end in [Endpoint::Start, Endpoint::End] {
                        if route.endpoint(end).point.distance(p) <= grip {
                            return Some(HitTarget::EdgeEndpoint { edge: id, end });
                        }
                    }
                    if let Some(handle) = route
                        .handles
                        .iter()
                        .find(|h| h.position.distance(p) <= grip)
                    {
                        return Some(HitTarget::Waypoint {
                            edge: id,
                            handle: *handle,
                        });
                    }
                }
            }
            Selection::None => {}
        }

        let selected_node = match self.selection {
            Selection::Node(id) => Some(id),
            _ => None,
        };
        for id in [self.hovered, selected_node].into_iter().flatten() {
            let Some(node) = self.graph.node(id) else {
                continue;
            };
            for side in Side::ALL {
                if connector_position(node, side, self.config.connector_offset).distance(p) <= grip {
                    return Some(HitTarget::Connector { node: id, side });
                }
            }
        }

        let routes: Vec<(EdgeId, EdgeRoute)> = self
            .graph
            .edges()
            .filter_map(|t| route_transition(self.graph, self.visual, t.id).map(|r| (t.id, r)))
            .collect();

        for (id, route) in &routes {
            let Some(t) = self.graph.edge(*id) else {
                continue;
            };
            if t.label.is_empty() {
                continue;
            }
            let at = label_position(self.visual, *id, route);
            if label_bounds(at, &t.label).contains(p) {
                return Some(HitTarget::Label { edge: *id });
            }
        }

        if let Some(id) = node_at_padded(self.graph, p, 0.0) {
            return Some(HitTarget::Node(id));
        }

        let tolerance = self.px(self.config.edge_hit_tolerance);
        routes
            .iter()
            .map(|(id, route)| (*id, distance_to_polyline(p, &route.polyline)))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| HitTarget::Edge(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wf_core::Transition;

    struct Fixture {
        graph: WorkflowGraph,
        visual: VisualLayout,
        config: EditorConfig,
        a: NodeId,
        b: NodeId,
        e: EdgeId,
    }

    fn fixture() -> Fixture {
        let mut graph = WorkflowGraph::new();
        let a = graph
            .add_node(StateNode::new(NodeId::generate(), "A", Point::new(100.0, 100.0)))
            .unwrap();
        let b = graph
            .add_node(StateNode::new(NodeId::generate(), "B", Point::new(400.0, 100.0)))
            .unwrap();
        let mut t = Transition::new(EdgeId::generate(), a, b);
        t.label = "approve".into();
        let e = graph.add_edge(t).unwrap();
        Fixture {
            graph,
            visual: VisualLayout::new(),
            config: EditorConfig::default(),
            a,
            b,
            e,
        }
    }

    fn scene(f: &Fixture, selection: Selection, hovered: Option<NodeId>) -> HitScene<'_> {
        HitScene {
            graph: &f.graph,
            visual: &f.visual,
            selection,
            hovered,
            config: &f.config,
            zoom: 1.0,
        }
    }

    #[test]
    fn boxes_lines_and_labels() {
        let f = fixture();
        let s = scene(&f, Selection::None, None);
        assert_eq!(s.hit_test(Point::new(90.0, 110.0)), Some(HitTarget::Node(f.a)));
        assert_eq!(s.hit_test(Point::new(250.0, 100.0)), Some(HitTarget::Label { edge: f.e }));
        assert_eq!(s.hit_test(Point::new(200.0, 103.0)), Some(HitTarget::Edge(f.e)));
        assert_eq!(s.hit_test(Point::new(200.0, 160.0)), None);
    }

    #[test]
    fn connectors_only_on_hovered_or_selected() {
        let f = fixture();
        let right = Point::new(172.0, 100.0);
        assert_eq!(scene(&f, Selection::None, None).hit_test(right), Some(HitTarget::Edge(f.e)));
        assert_eq!(
            scene(&f, Selection::None, Some(f.a)).hit_test(right),
            Some(HitTarget::Connector {
                node: f.a,
                side: Side::Right
            })
        );
    }

    #[test]
    fn selected_node_exposes_resize_handles() {
        let f = fixture();
        let s = scene(&f, Selection::Node(f.b), None);
        assert_eq!(
            s.hit_test(Point::new(461.0, 131.0)),
            Some(HitTarget::Resize {
                node: f.b,
                handle: ResizeHandle::SouthEast
            })
        );
    }

    #[test]
    fn selected_edge_exposes_endpoints() {
        let f = fixture();
        let s = scene(&f, Selection::Edge(f.e), None);
        assert_eq!(
            s.hit_test(Point::new(341.0, 100.0)),
            Some(HitTarget::EdgeEndpoint {
                edge: f.e,
                end: Endpoint::End
            })
        );
    }

    #[test]
    fn padded_lookup_prefers_real_containment() {
        let f = fixture();
        assert_eq!(node_at_padded(&f.graph, Point::new(170.0, 100.0), 15.0), Some(f.a));
        assert_eq!(node_at_padded(&f.graph, Point::new(180.0, 100.0), 15.0), None);
        assert_eq!(node_at_padded(&f.graph, Point::new(330.0, 60.0), 15.0), Some(f.b));
    }

    #[test]
    fn resize_holds_opposite_side() {
        let start = Rect::new(0.0, 0.0, 120.0, 60.0);
        assert_eq!(ResizeHandle::East.apply(start, 30.0, 99.0), Rect::new(0.0, 0.0, 150.0, 60.0));
        assert_eq!(ResizeHandle::NorthWest.apply(start, -10.0, -20.0), Rect::new(-10.0, -20.0, 120.0, 60.0));
        // Clamped to the minimum, anchored at the fixed corner.
        assert_eq!(ResizeHandle::SouthWest.apply(start, 100.0, -100.0), Rect::new(40.0, 0.0, 120.0, 40.0));
    }
}
