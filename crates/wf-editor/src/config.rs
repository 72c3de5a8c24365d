//! Editor tuning knobs. Pixel values are screen pixels unless noted.

use kurbo::Vec2;
use serde::{Deserialize, Serialize};
use wf_core::PathKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Cumulative pointer travel before a press becomes a drag.
    pub drag_threshold: f64,
    /// Padding around a state box when it is a drop target.
    pub hit_padding: f64,
    /// Distance (canvas units) of a directional connector from its side.
    pub connector_offset: f64,
    /// Pick radius of handles and connectors.
    pub handle_radius: f64,
    /// Pick distance of a transition line.
    pub edge_hit_tolerance: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom factor per wheel notch.
    pub wheel_zoom_step: f64,
    pub history_depth: usize,
    /// Offset (canvas units) applied to pasted states.
    pub paste_offset: Vec2,
    /// Offset (canvas units) between successively added states.
    pub cascade_offset: Vec2,
    /// Path kind of transitions drawn on the canvas.
    pub default_path: PathKind,
    /// Perpendicular offset of the waypoint seeded on a new transition.
    pub curve_offset: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 5.0,
            hit_padding: 15.0,
            connector_offset: 12.0,
            handle_radius: 6.0,
            edge_hit_tolerance: 6.0,
            min_zoom: 0.25,
            max_zoom: 2.0,
            wheel_zoom_step: 1.1,
            history_depth: 50,
            paste_offset: Vec2::new(20.0, 20.0),
            cascade_offset: Vec2::new(40.0, 40.0),
            default_path: PathKind::Spline,
            curve_offset: 40.0,
        }
    }
}

impl EditorConfig {
    /// Parse a (possibly partial) JSON config; missing keys keep defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
