//! Grid and alignment snapping for state moves.
//!
//! Grid snapping runs first, then alignment against other state centers;
//! an alignment match overrides the grid on its axis.

use kurbo::Point;
use wf_core::geometry::snap_to_grid;
use wf_core::{Axis, NodeId, SnapSettings, WorkflowGraph};

/// An alignment guide line. A `Vertical` guide is the line `x = value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guide {
    pub axis: Axis,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapped {
    pub position: Point,
    pub guides: Vec<Guide>,
}

/// Snap a candidate center for `moving`. `threshold` is in canvas units.
pub fn snap_position(
    graph: &WorkflowGraph,
    moving: NodeId,
    candidate: Point,
    settings: &SnapSettings,
    threshold: f64,
) -> Snapped {
    let mut position = candidate;
    if settings.grid_enabled {
        position = snap_to_grid(position, settings.grid_size);
    }

    let mut guides = Vec::new();
    if settings.alignment_enabled {
        let mut best_x: Option<(f64, f64)> = None;
        let mut best_y: Option<(f64, f64)> = None;
        for other in graph.nodes().filter(|n| n.id != moving) {
            let c = other.position;
            let dx = (c.x - candidate.x).abs();
            if dx <= threshold && best_x.is_none_or(|(d, _)| dx < d) {
                best_x = Some((dx, c.x));
            }
            let dy = (c.y - candidate.y).abs();
            if dy <= threshold && best_y.is_none_or(|(d, _)| dy < d) {
                best_y = Some((dy, c.y));
            }
        }
        if let Some((_, x)) = best_x {
            position.x = x;
            guides.push(Guide {
                axis: Axis::Vertical,
                value: x,
            });
        }
        if let Some((_, y)) = best_y {
            position.y = y;
            guides.push(Guide {
                axis: Axis::Horizontal,
                value: y,
            });
        }
    }

    Snapped { position, guides }
}
