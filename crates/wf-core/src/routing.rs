//! Transition path generation for the three path kinds.
//!
//! [`route_edge`] turns two state boxes, optional endpoint anchors and the
//! stored waypoints into an [`EdgeRoute`]: the ordered vertex list used for
//! label placement, a `BezPath` for painting, a sampled polyline for hit
//! testing, and the draggable waypoint handles.

use crate::geometry::{
    Anchor, Axis, BoundaryHit, Side, box_edge_intersection, decode_anchor, point_at_parameter,
};
use crate::id::EdgeId;
use crate::model::{Endpoint, PathKind, WorkflowGraph};
use crate::visual::VisualLayout;
use kurbo::{BezPath, CubicBez, ParamCurve, Point, Rect, Vec2};

/// Length of the perpendicular stub a spline leaves each box with.
pub const SPLINE_STUB: f64 = 20.0;

/// Distance an elbow route travels out of a box before its first turn.
pub const ELBOW_TURN_OFFSET: f64 = 30.0;

/// Samples per cubic segment in the hit-test polyline.
const CURVE_SAMPLES: usize = 16;

/// A draggable control on a route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaypointHandle {
    /// Index into the stored waypoint list; `None` for an elbow default
    /// connector that has no waypoint yet.
    pub waypoint: Option<usize>,
    /// Axis the segment runs along; the handle moves only across it.
    /// `None` means free 2-D movement.
    pub axis: Option<Axis>,
    pub position: Point,
}

impl WaypointHandle {
    /// Apply a drag to the handle's stored waypoint, honoring its axis.
    pub fn constrain(&self, original: Point, pointer: Point) -> Point {
        match self.axis {
            // Vertical segment: only its x moves.
            Some(Axis::Vertical) => Point::new(pointer.x, original.y),
            Some(Axis::Horizontal) => Point::new(original.x, pointer.y),
            None => pointer,
        }
    }
}

/// Computed geometry of one transition.
#[derive(Debug, Clone)]
pub struct EdgeRoute {
    pub kind: PathKind,
    pub start: BoundaryHit,
    pub end: BoundaryHit,
    /// Ordered vertices including stubs and waypoints.
    pub vertices: Vec<Point>,
    pub path: BezPath,
    pub polyline: Vec<Point>,
    pub handles: Vec<WaypointHandle>,
}

impl EdgeRoute {
    /// Default label position: halfway along the vertex list.
    pub fn midpoint(&self) -> Point {
        point_at_parameter(&self.vertices, 0.5).unwrap_or(self.start.point)
    }

    /// Marker positions for `count` gates, spread at `(i+1)/(count+1)`.
    pub fn gate_positions(&self, count: usize) -> Vec<Point> {
        (0..count)
            .map(|i| {
                let t = (i + 1) as f64 / (count + 1) as f64;
                point_at_parameter(&self.vertices, t).unwrap_or(self.start.point)
            })
            .collect()
    }

    pub fn endpoint(&self, end: Endpoint) -> BoundaryHit {
        match end {
            Endpoint::Start => self.start,
            Endpoint::End => self.end,
        }
    }
}

/// Everything a route depends on.
#[derive(Debug, Clone, Copy)]
pub struct RouteInput<'a> {
    pub kind: PathKind,
    pub from: Rect,
    pub to: Rect,
    pub waypoints: &'a [Point],
    pub start_anchor: Option<Anchor>,
    pub end_anchor: Option<Anchor>,
}

/// Route a transition from the graph and its cosmetic record.
///
/// Returns `None` if the transition or one of its states is unknown.
pub fn route_transition(
    graph: &WorkflowGraph,
    visual: &VisualLayout,
    edge: EdgeId,
) -> Option<EdgeRoute> {
    let t = graph.edge(edge)?;
    let from = graph.node(t.from)?.bounds();
    let to = graph.node(t.to)?.bounds();
    Some(route_edge(&RouteInput {
        kind: t.path,
        from,
        to,
        waypoints: visual.waypoints(edge),
        start_anchor: visual.anchor(edge, Endpoint::Start),
        end_anchor: visual.anchor(edge, Endpoint::End),
    }))
}

pub fn route_edge(input: &RouteInput<'_>) -> EdgeRoute {
    match input.kind {
        PathKind::Straight => route_straight(input),
        PathKind::Spline => route_spline(input),
        PathKind::Elbow => route_elbow(input),
    }
}

fn anchored(rect: Rect, anchor: Anchor) -> BoundaryHit {
    BoundaryHit {
        point: decode_anchor(rect.center(), rect.size(), anchor),
        side: anchor.side,
    }
}

/// Anchor override if present, else the ray from the box center toward
/// `toward`.
fn endpoint_hit(rect: Rect, anchor: Option<Anchor>, toward: Point) -> BoundaryHit {
    match anchor {
        Some(a) => anchored(rect, a),
        None => box_edge_intersection(rect.center(), toward, rect.size()),
    }
}

fn polyline_path(vertices: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    if let Some((first, rest)) = vertices.split_first() {
        path.move_to(*first);
        for p in rest {
            path.line_to(*p);
        }
    }
    path
}

// ─── Straight ────────────────────────────────────────────────────────────

fn route_straight(input: &RouteInput<'_>) -> EdgeRoute {
    let start = endpoint_hit(input.from, input.start_anchor, input.to.center());
    let end = endpoint_hit(input.to, input.end_anchor, input.from.center());
    let vertices = vec![start.point, end.point];
    EdgeRoute {
        kind: PathKind::Straight,
        start,
        end,
        path: polyline_path(&vertices),
        polyline: vertices.clone(),
        vertices,
        handles: Vec::new(),
    }
}

// ─── Spline ──────────────────────────────────────────────────────────────

fn route_spline(input: &RouteInput<'_>) -> EdgeRoute {
    let wps = input.waypoints;
    let start_aim = wps.first().copied().unwrap_or(input.to.center());
    let end_aim = wps.last().copied().unwrap_or(input.from.center());
    let start = endpoint_hit(input.from, input.start_anchor, start_aim);
    let end = endpoint_hit(input.to, input.end_anchor, end_aim);

    let n_start = start.side.normal();
    let n_end = end.side.normal();
    let stub_start = start.point + n_start * SPLINE_STUB;
    let stub_end = end.point + n_end * SPLINE_STUB;

    // Knots the cubic threads through.
    let mut knots = Vec::with_capacity(wps.len() + 2);
    knots.push(stub_start);
    knots.extend_from_slice(wps);
    knots.push(stub_end);

    let last = knots.len() - 1;
    let tangents: Vec<Vec2> = (0..knots.len())
        .map(|i| {
            if i == 0 {
                n_start * knots[0].distance(knots[1])
            } else if i == last {
                -n_end * knots[last].distance(knots[last - 1])
            } else {
                (knots[i + 1] - knots[i - 1]) * 0.5
            }
        })
        .collect();

    let mut path = BezPath::new();
    path.move_to(start.point);
    path.line_to(stub_start);
    let mut polyline = vec![start.point, stub_start];
    for i in 0..last {
        let seg = CubicBez::new(
            knots[i],
            knots[i] + tangents[i] / 3.0,
            knots[i + 1] - tangents[i + 1] / 3.0,
            knots[i + 1],
        );
        path.curve_to(seg.p1, seg.p2, seg.p3);
        polyline.extend((1..=CURVE_SAMPLES).map(|k| seg.eval(k as f64 / CURVE_SAMPLES as f64)));
    }
    path.line_to(end.point);
    polyline.push(end.point);

    let mut vertices = Vec::with_capacity(knots.len() + 2);
    vertices.push(start.point);
    vertices.extend_from_slice(&knots);
    vertices.push(end.point);

    let handles = wps
        .iter()
        .enumerate()
        .map(|(i, p)| WaypointHandle {
            waypoint: Some(i),
            axis: None,
            position: *p,
        })
        .collect();

    EdgeRoute {
        kind: PathKind::Spline,
        start,
        end,
        vertices,
        path,
        polyline,
        handles,
    }
}

// ─── Elbow ───────────────────────────────────────────────────────────────

/// Facing sides on the dominant axis between the two centers.
fn default_elbow_sides(from: Point, to: Point) -> (Side, Side) {
    let d = to - from;
    if d.x.abs() >= d.y.abs() {
        if d.x >= 0.0 {
            (Side::Right, Side::Left)
        } else {
            (Side::Left, Side::Right)
        }
    } else if d.y >= 0.0 {
        (Side::Bottom, Side::Top)
    } else {
        (Side::Top, Side::Bottom)
    }
}

fn route_elbow(input: &RouteInput<'_>) -> EdgeRoute {
    let (side_a, side_b) = default_elbow_sides(input.from.center(), input.to.center());
    let start = anchored(
        input.from,
        input.start_anchor.unwrap_or(Anchor::center_of(side_a)),
    );
    let end = anchored(input.to, input.end_anchor.unwrap_or(Anchor::center_of(side_b)));

    let s = start.point + start.side.normal() * ELBOW_TURN_OFFSET;
    let e = end.point + end.side.normal() * ELBOW_TURN_OFFSET;
    let wps = input.waypoints;

    let mut inner = Vec::new();
    let mut handles = Vec::new();
    match (start.side.is_horizontal(), end.side.is_horizontal()) {
        (true, true) => {
            parallel_connectors(s, e, wps, Axis::Vertical, &mut inner, &mut handles);
        }
        (false, false) => {
            parallel_connectors(s, e, wps, Axis::Horizontal, &mut inner, &mut handles);
        }
        (start_horizontal, _) => {
            let corner = wps.first().copied().unwrap_or(if start_horizontal {
                Point::new(e.x, s.y)
            } else {
                Point::new(s.x, e.y)
            });
            if start_horizontal {
                inner.extend([Point::new(corner.x, s.y), corner, Point::new(e.x, corner.y)]);
            } else {
                inner.extend([Point::new(s.x, corner.y), corner, Point::new(corner.x, e.y)]);
            }
            handles.push(WaypointHandle {
                waypoint: (!wps.is_empty()).then_some(0),
                axis: None,
                position: corner,
            });
        }
    }

    let mut vertices = Vec::with_capacity(inner.len() + 4);
    vertices.extend([start.point, s]);
    vertices.extend(inner);
    vertices.extend([e, end.point]);
    vertices.dedup_by(|a, b| a.distance(*b) < 1e-9);

    EdgeRoute {
        kind: PathKind::Elbow,
        start,
        end,
        path: polyline_path(&vertices),
        polyline: vertices.clone(),
        vertices,
        handles,
    }
}

/// Both exits share an orientation: insert one connector per waypoint
/// running along `connector` (a vertical connector for horizontal exits),
/// positioned by the waypoint's coordinate across it. Waypoints are ordered
/// along the direction of travel; intermediate runs are evenly spaced
/// between the two stub levels.
fn parallel_connectors(
    s: Point,
    e: Point,
    wps: &[Point],
    connector: Axis,
    out: &mut Vec<Point>,
    handles: &mut Vec<WaypointHandle>,
) {
    let vertical = connector == Axis::Vertical;
    // (along, level) in the exit-axis frame.
    let along = |p: Point| if vertical { p.x } else { p.y };
    let level = |p: Point| if vertical { p.y } else { p.x };
    let point = |a: f64, l: f64| {
        if vertical {
            Point::new(a, l)
        } else {
            Point::new(l, a)
        }
    };

    let mut positions: Vec<(Option<usize>, f64)> = if wps.is_empty() {
        vec![(None, (along(s) + along(e)) / 2.0)]
    } else {
        wps.iter()
            .enumerate()
            .map(|(i, p)| (Some(i), along(*p)))
            .collect()
    };
    if along(e) >= along(s) {
        positions.sort_by(|a, b| a.1.total_cmp(&b.1));
    } else {
        positions.sort_by(|a, b| b.1.total_cmp(&a.1));
    }

    let k = positions.len();
    let (l0, l1) = (level(s), level(e));
    let level_at = |i: usize| l0 + (l1 - l0) * i as f64 / k as f64;
    for (i, (waypoint, a)) in positions.into_iter().enumerate() {
        let (from, to) = (level_at(i), level_at(i + 1));
        out.push(point(a, from));
        out.push(point(a, to));
        handles.push(WaypointHandle {
            waypoint,
            axis: Some(connector),
            position: point(a, (from + to) / 2.0),
        });
    }
}
