//! Box/ray geometry, boundary anchors, and path utilities.
//!
//! Everything here is pure and total: degenerate input (zero-length
//! directions, exact diagonals, empty point lists) falls back to a defined
//! answer instead of failing. Boxes are given as center + size; the y axis
//! points down.

use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Tolerance used for on-boundary checks and degenerate vectors.
pub const EPSILON: f64 = 1e-9;

/// A side of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Right, Side::Left, Side::Bottom, Side::Top];

    /// Unit vector pointing out of the box through this side.
    pub fn normal(self) -> Vec2 {
        match self {
            Side::Left => Vec2::new(-1.0, 0.0),
            Side::Right => Vec2::new(1.0, 0.0),
            Side::Top => Vec2::new(0.0, -1.0),
            Side::Bottom => Vec2::new(0.0, 1.0),
        }
    }

    /// Left/right sides are left horizontally.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
        }
    }
}

/// Orientation of a straight path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// A point where a ray leaves a box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryHit {
    pub point: Point,
    pub side: Side,
}

/// A point on a box boundary with its position along the side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryPoint {
    pub point: Point,
    pub side: Side,
    /// 0 at the top/left end of the side, 1 at the bottom/right end.
    pub fraction: f64,
}

/// Edge endpoint stored relative to the node box so it survives moves and
/// resizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub side: Side,
    pub fraction: f64,
}

impl Anchor {
    pub fn new(side: Side, fraction: f64) -> Self {
        Self {
            side,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }

    /// Middle of a side.
    pub fn center_of(side: Side) -> Self {
        Self::new(side, 0.5)
    }
}

/// Where the ray from `center` toward `target` crosses the boundary of the
/// box `size` centered on `center`.
///
/// `target == center` resolves to the middle of the right side. Otherwise
/// every side with an in-bounds crossing is a candidate and the one closest
/// to `target` wins (this settles exact-corner ties); if no side qualifies
/// the coarse angle quadrant decides.
pub fn box_edge_intersection(center: Point, target: Point, size: Size) -> BoundaryHit {
    let (hw, hh) = (size.width / 2.0, size.height / 2.0);
    let d = target - center;
    if d.hypot() < EPSILON {
        return BoundaryHit {
            point: Point::new(center.x + hw, center.y),
            side: Side::Right,
        };
    }

    let mut best: Option<(f64, BoundaryHit)> = None;
    for side in Side::ALL {
        let t = match side {
            Side::Right if d.x > EPSILON => hw / d.x,
            Side::Left if d.x < -EPSILON => -hw / d.x,
            Side::Bottom if d.y > EPSILON => hh / d.y,
            Side::Top if d.y < -EPSILON => -hh / d.y,
            _ => continue,
        };
        let point = center + d * t;
        let in_bounds = match side {
            Side::Left | Side::Right => (point.y - center.y).abs() <= hh + EPSILON,
            Side::Top | Side::Bottom => (point.x - center.x).abs() <= hw + EPSILON,
        };
        if !in_bounds {
            continue;
        }
        let dist = point.distance(target);
        if best.is_none_or(|(b, _)| dist < b) {
            best = Some((dist, BoundaryHit { point, side }));
        }
    }

    match best {
        Some((_, hit)) => hit,
        None => quadrant_fallback(center, d, hw, hh),
    }
}

fn quadrant_fallback(center: Point, d: Vec2, hw: f64, hh: f64) -> BoundaryHit {
    use std::f64::consts::FRAC_PI_4;
    let angle = d.y.atan2(d.x);
    let side = if angle.abs() <= FRAC_PI_4 {
        Side::Right
    } else if angle.abs() >= 3.0 * FRAC_PI_4 {
        Side::Left
    } else if angle > 0.0 {
        Side::Bottom
    } else {
        Side::Top
    };
    let point = match side {
        Side::Right => Point::new(center.x + hw, center.y + d.y.clamp(-hh, hh)),
        Side::Left => Point::new(center.x - hw, center.y + d.y.clamp(-hh, hh)),
        Side::Bottom => Point::new(center.x + d.x.clamp(-hw, hw), center.y + hh),
        Side::Top => Point::new(center.x + d.x.clamp(-hw, hw), center.y - hh),
    };
    BoundaryHit { point, side }
}

/// Clamp `point` onto the nearest side of the box, independent of any ray.
pub fn nearest_point_on_boundary(center: Point, point: Point, size: Size) -> BoundaryPoint {
    let (hw, hh) = (size.width / 2.0, size.height / 2.0);
    let (left, right) = (center.x - hw, center.x + hw);
    let (top, bottom) = (center.y - hh, center.y + hh);
    let cy = point.y.clamp(top, bottom);
    let cx = point.x.clamp(left, right);

    let candidates = [
        (Side::Right, Point::new(right, cy)),
        (Side::Left, Point::new(left, cy)),
        (Side::Bottom, Point::new(cx, bottom)),
        (Side::Top, Point::new(cx, top)),
    ];
    let (side, snapped) = candidates
        .into_iter()
        .min_by(|a, b| a.1.distance(point).total_cmp(&b.1.distance(point)))
        .unwrap_or((Side::Right, Point::new(right, center.y)));

    BoundaryPoint {
        point: snapped,
        side,
        fraction: side_fraction(side, snapped, center, size),
    }
}

fn side_fraction(side: Side, p: Point, center: Point, size: Size) -> f64 {
    let f = if side.is_horizontal() {
        if size.height <= EPSILON {
            0.5
        } else {
            (p.y - (center.y - size.height / 2.0)) / size.height
        }
    } else if size.width <= EPSILON {
        0.5
    } else {
        (p.x - (center.x - size.width / 2.0)) / size.width
    };
    f.clamp(0.0, 1.0)
}

/// Express a boundary point as a side-relative anchor.
pub fn encode_anchor(center: Point, size: Size, point: Point) -> Anchor {
    let bp = nearest_point_on_boundary(center, point, size);
    Anchor {
        side: bp.side,
        fraction: bp.fraction,
    }
}

/// Absolute boundary point of an anchor for the box's current geometry.
pub fn decode_anchor(center: Point, size: Size, anchor: Anchor) -> Point {
    let (hw, hh) = (size.width / 2.0, size.height / 2.0);
    let f = anchor.fraction.clamp(0.0, 1.0);
    match anchor.side {
        Side::Left => Point::new(center.x - hw, center.y - hh + f * size.height),
        Side::Right => Point::new(center.x + hw, center.y - hh + f * size.height),
        Side::Top => Point::new(center.x - hw + f * size.width, center.y - hh),
        Side::Bottom => Point::new(center.x - hw + f * size.width, center.y + hh),
    }
}

/// Point at normalized arc length `t` along the polyline `vertices`.
///
/// `t` is clamped to [0, 1]. Returns `None` only for an empty list; a
/// zero-length polyline yields its first vertex.
pub fn point_at_parameter(vertices: &[Point], t: f64) -> Option<Point> {
    let first = *vertices.first()?;
    let total: f64 = vertices.windows(2).map(|w| w[0].distance(w[1])).sum();
    if total <= EPSILON {
        return Some(first);
    }
    let target = t.clamp(0.0, 1.0) * total;
    let mut walked = 0.0;
    for w in vertices.windows(2) {
        let len = w[0].distance(w[1]);
        if len > EPSILON && walked + len >= target {
            return Some(w[0].lerp(w[1], (target - walked) / len));
        }
        walked += len;
    }
    vertices.last().copied()
}

/// Closest point to `p` on the segment `a`–`b`.
pub fn project_onto_segment(p: Point, a: Point, b: Point) -> Point {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 <= EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

/// Distance from `p` to the segment `a`–`b`.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    p.distance(project_onto_segment(p, a, b))
}

/// Distance from `p` to the nearest segment of a polyline.
pub fn distance_to_polyline(p: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => p.distance(*only),
        _ => points
            .windows(2)
            .map(|w| distance_to_segment(p, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Where a new waypoint clicked at `click` belongs in `waypoints`.
///
/// The path runs `start → waypoints… → end`; segment `i` joins point `i`
/// and point `i + 1` of that chain. The segment whose clamped projection
/// lies closest wins and its index (in `0..=waypoints.len()`) is returned.
pub fn insertion_index(waypoints: &[Point], start: Point, end: Point, click: Point) -> usize {
    let chain: Vec<Point> = std::iter::once(start)
        .chain(waypoints.iter().copied())
        .chain(std::iter::once(end))
        .collect();
    let mut best = (0, f64::INFINITY);
    for (i, w) in chain.windows(2).enumerate() {
        let d = distance_to_segment(click, w[0], w[1]);
        if d < best.1 {
            best = (i, d);
        }
    }
    best.0
}

/// Point at `t = 0.5` of the quadratic Bézier `p0, p1, p2`.
pub fn bezier_midpoint(p0: Point, p1: Point, p2: Point) -> Point {
    Point::new(
        0.25 * p0.x + 0.5 * p1.x + 0.25 * p2.x,
        0.25 * p0.y + 0.5 * p1.y + 0.25 * p2.y,
    )
}

/// Control point that makes the quadratic Bézier `p0, ?, p2` pass through
/// `mid` at `t = 0.5`. Inverse of [`bezier_midpoint`].
pub fn control_point_from_midpoint(p0: Point, mid: Point, p2: Point) -> Point {
    Point::new(
        2.0 * mid.x - 0.5 * (p0.x + p2.x),
        2.0 * mid.y - 0.5 * (p0.y + p2.y),
    )
}

/// Round each coordinate to the nearest multiple of `grid`.
pub fn snap_to_grid(p: Point, grid: f64) -> Point {
    if grid <= EPSILON {
        return p;
    }
    Point::new((p.x / grid).round() * grid, (p.y / grid).round() * grid)
}
