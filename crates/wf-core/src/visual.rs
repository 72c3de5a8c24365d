//! Cosmetic per-workflow state: waypoints, label placement, endpoint anchors
//! and snap settings.
//!
//! Stored apart from the structural graph as one opaque JSON document per
//! workflow. [`VisualLayout`] is the typed in-memory form; [`VisualDocument`]
//! is the wire shape, including the legacy single-midpoint layout.

use crate::error::ImportError;
use crate::geometry::Anchor;
use crate::id::EdgeId;
use crate::model::Endpoint;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ─── Snap settings ───────────────────────────────────────────────────────

/// Grid and alignment snapping applied while moving states.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapSettings {
    pub grid_enabled: bool,
    pub grid_size: f64,
    pub alignment_enabled: bool,
    /// Max center distance at which an axis locks, in screen pixels. The
    /// editor converts it to canvas units at the current zoom.
    pub alignment_threshold: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            grid_enabled: false,
            grid_size: 20.0,
            alignment_enabled: true,
            alignment_threshold: 10.0,
        }
    }
}

// ─── Label placement ─────────────────────────────────────────────────────

/// Where a transition label sits relative to its route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPlacement {
    /// Offset from the computed default position (path midpoint).
    Offset(Vec2),
    /// Absolute canvas position, independent of the route.
    Pinned(Point),
}

impl LabelPlacement {
    /// Resolve against the route's default label position.
    pub fn resolve(self, default: Point) -> Point {
        match self {
            LabelPlacement::Offset(v) => default + v,
            LabelPlacement::Pinned(p) => p,
        }
    }
}

/// Everything cosmetic about one transition, detached from the layout so it
/// can travel through history and the clipboard.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeVisual {
    pub waypoints: Vec<Point>,
    pub label: Option<LabelPlacement>,
    pub start_anchor: Option<Anchor>,
    pub end_anchor: Option<Anchor>,
}

impl EdgeVisual {
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
            && self.label.is_none()
            && self.start_anchor.is_none()
            && self.end_anchor.is_none()
    }
}

// ─── Layout ──────────────────────────────────────────────────────────────

/// Typed cosmetic record for one workflow.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisualLayout {
    waypoints: HashMap<EdgeId, Vec<Point>>,
    labels: HashMap<EdgeId, LabelPlacement>,
    anchors: HashMap<(EdgeId, Endpoint), Anchor>,
    pub snap: SnapSettings,
}

impl VisualLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waypoints of `edge`, empty if none are stored.
    pub fn waypoints(&self, edge: EdgeId) -> &[Point] {
        self.waypoints.get(&edge).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the waypoint list. An empty list removes the entry.
    pub fn set_waypoints(&mut self, edge: EdgeId, waypoints: Vec<Point>) {
        if waypoints.is_empty() {
            self.waypoints.remove(&edge);
        } else {
            self.waypoints.insert(edge, waypoints);
        }
    }

    pub fn label(&self, edge: EdgeId) -> Option<LabelPlacement> {
        self.labels.get(&edge).copied()
    }

    pub fn set_label(&mut self, edge: EdgeId, placement: Option<LabelPlacement>) {
        match placement {
            Some(p) => {
                self.labels.insert(edge, p);
            }
            None => {
                self.labels.remove(&edge);
            }
        }
    }

    pub fn anchor(&self, edge: EdgeId, end: Endpoint) -> Option<Anchor> {
        self.anchors.get(&(edge, end)).copied()
    }

    pub fn set_anchor(&mut self, edge: EdgeId, end: Endpoint, anchor: Option<Anchor>) {
        match anchor {
            Some(a) => {
                self.anchors.insert((edge, end), a);
            }
            None => {
                self.anchors.remove(&(edge, end));
            }
        }
    }

    /// Snapshot of all cosmetic entries for `edge`.
    pub fn edge_visual(&self, edge: EdgeId) -> EdgeVisual {
        EdgeVisual {
            waypoints: self.waypoints(edge).to_vec(),
            label: self.label(edge),
            start_anchor: self.anchor(edge, Endpoint::Start),
            end_anchor: self.anchor(edge, Endpoint::End),
        }
    }

    /// Install a snapshot under `edge`, replacing whatever was there.
    pub fn restore_edge(&mut self, edge: EdgeId, visual: EdgeVisual) {
        self.set_waypoints(edge, visual.waypoints);
        self.set_label(edge, visual.label);
        self.set_anchor(edge, Endpoint::Start, visual.start_anchor);
        self.set_anchor(edge, Endpoint::End, visual.end_anchor);
    }

    /// Drop every entry for `edge`, returning what was removed.
    pub fn remove_edge(&mut self, edge: EdgeId) -> EdgeVisual {
        EdgeVisual {
            waypoints: self.waypoints.remove(&edge).unwrap_or_default(),
            label: self.labels.remove(&edge),
            start_anchor: self.anchors.remove(&(edge, Endpoint::Start)),
            end_anchor: self.anchors.remove(&(edge, Endpoint::End)),
        }
    }

    /// Drop all per-edge entries but keep snap settings.
    pub fn clear_edges(&mut self) {
        self.waypoints.clear();
        self.labels.clear();
        self.anchors.clear();
    }

    pub fn to_document(&self) -> VisualDocument {
        let mut doc = VisualDocument {
            snap_settings: self.snap,
            ..Default::default()
        };
        for (edge, wps) in &self.waypoints {
            doc.waypoints
                .insert(edge.to_string(), WaypointEntry::List(wps.clone()));
        }
        for (edge, placement) in &self.labels {
            match *placement {
                LabelPlacement::Offset(v) => {
                    doc.label_offsets
                        .insert(edge.to_string(), Point::new(v.x, v.y));
                }
                LabelPlacement::Pinned(p) => {
                    doc.pinned_label_positions.insert(edge.to_string(), p);
                }
            }
        }
        for ((edge, end), anchor) in &self.anchors {
            doc.edge_positions
                .insert(format!("{edge}-{}", end.as_str()), *anchor);
        }
        doc
    }

    /// Build the typed layout from a wire document, migrating legacy
    /// single-point entries and dropping unparseable keys.
    pub fn from_document(doc: VisualDocument) -> Self {
        let mut layout = VisualLayout {
            snap: doc.snap_settings,
            ..Default::default()
        };
        for (key, entry) in doc.waypoints {
            let list = match entry {
                WaypointEntry::List(list) => list,
                WaypointEntry::Single(p) => vec![p],
            };
            layout.set_waypoints(EdgeId::intern(&key), list);
        }
        for (key, p) in doc.midpoints {
            let edge = EdgeId::intern(&key);
            if !layout.waypoints.contains_key(&edge) {
                layout.set_waypoints(edge, vec![p]);
            }
        }
        for (key, p) in doc.label_offsets {
            layout.set_label(
                EdgeId::intern(&key),
                Some(LabelPlacement::Offset(Vec2::new(p.x, p.y))),
            );
        }
        // Pinned wins over an offset for the same edge.
        for (key, p) in doc.pinned_label_positions {
            layout.set_label(EdgeId::intern(&key), Some(LabelPlacement::Pinned(p)));
        }
        for (key, anchor) in doc.edge_positions {
            let parsed = if let Some(id) = key.strip_suffix("-start") {
                Some((id, Endpoint::Start))
            } else {
                key.strip_suffix("-end").map(|id| (id, Endpoint::End))
            };
            match parsed {
                Some((id, end)) => {
                    let anchor = Anchor::new(anchor.side, anchor.fraction);
                    layout.set_anchor(EdgeId::intern(id), end, Some(anchor));
                }
                None => log::warn!("ignoring edge position with malformed key `{key}`"),
            }
        }
        layout
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_document())
    }

    pub fn from_json(json: &str) -> Result<Self, ImportError> {
        let doc: VisualDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(doc))
    }
}

// ─── Wire document ───────────────────────────────────────────────────────

/// A waypoint entry: current layout is a list, legacy layout a single point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WaypointEntry {
    List(Vec<Point>),
    Single(Point),
}

/// JSON shape of the cosmetic record as stored in the key-value store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualDocument {
    pub waypoints: BTreeMap<String, WaypointEntry>,
    pub label_offsets: BTreeMap<String, Point>,
    pub pinned_label_positions: BTreeMap<String, Point>,
    pub edge_positions: BTreeMap<String, Anchor>,
    pub snap_settings: SnapSettings,
    /// Legacy: one midpoint per edge.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub midpoints: BTreeMap<String, Point>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Side;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_waypoint_list_removes_key() {
        let e = EdgeId::intern("t-empty");
        let mut layout = VisualLayout::new();
        layout.set_waypoints(e, vec![Point::new(1.0, 2.0)]);
        assert_eq!(layout.waypoints(e).len(), 1);
        layout.set_waypoints(e, Vec::new());
        assert!(layout.waypoints(e).is_empty());
        assert!(layout.to_document().waypoints.is_empty());
    }

    #[test]
    fn remove_edge_drops_everything() {
        let e = EdgeId::intern("t-gone");
        let mut layout = VisualLayout::new();
        layout.set_waypoints(e, vec![Point::new(5.0, 5.0)]);
        layout.set_label(e, Some(LabelPlacement::Offset(Vec2::new(0.0, -10.0))));
        layout.set_anchor(e, Endpoint::End, Some(Anchor::new(Side::Top, 0.3)));

        let removed = layout.remove_edge(e);
        assert_eq!(removed.waypoints, vec![Point::new(5.0, 5.0)]);
        assert!(layout.edge_visual(e).is_empty());
        assert_eq!(layout, VisualLayout::new());
    }

    #[test]
    fn document_roundtrip_preserves_layout() {
        let a = EdgeId::intern("edge-a");
        let b = EdgeId::intern("edge-b");
        let mut layout = VisualLayout::new();
        layout.snap.grid_enabled = true;
        layout.set_waypoints(a, vec![Point::new(10.0, 20.0), Point::new(30.0, 40.0)]);
        layout.set_label(a, Some(LabelPlacement::Offset(Vec2::new(4.0, -6.0))));
        layout.set_label(b, Some(LabelPlacement::Pinned(Point::new(300.0, 120.0))));
        layout.set_anchor(a, Endpoint::Start, Some(Anchor::new(Side::Right, 0.25)));
        layout.set_anchor(b, Endpoint::End, Some(Anchor::new(Side::Left, 1.0)));

        let json = layout.to_json().unwrap();
        let back = VisualLayout::from_json(&json).unwrap();
        assert_eq!(back, layout);
    }

    #[test]
    fn wire_keys_follow_document_layout() {
        let e = EdgeId::intern("e1");
        let mut layout = VisualLayout::new();
        layout.set_anchor(e, Endpoint::Start, Some(Anchor::new(Side::Bottom, 0.5)));
        let value: serde_json::Value = serde_json::from_str(&layout.to_json().unwrap()).unwrap();
        assert_eq!(value["edgePositions"]["e1-start"]["side"], "bottom");
        assert_eq!(value["snapSettings"]["gridSize"], 20.0);
        assert!(value.get("midpoints").is_none());
    }

    #[test]
    fn legacy_single_point_entries_migrate() {
        let json = r#"{
            "waypoints": { "old": {"x": 1.0, "y": 2.0}, "new": [{"x": 3.0, "y": 4.0}] },
            "midpoints": { "older": {"x": 7.0, "y": 8.0}, "new": {"x": 0.0, "y": 0.0} }
        }"#;
        let layout = VisualLayout::from_json(json).unwrap();
        assert_eq!(layout.waypoints(EdgeId::intern("old")), &[Point::new(1.0, 2.0)]);
        assert_eq!(layout.waypoints(EdgeId::intern("older")), &[Point::new(7.0, 8.0)]);
        // An existing list is not overwritten by a legacy midpoint.
        assert_eq!(layout.waypoints(EdgeId::intern("new")), &[Point::new(3.0, 4.0)]);
        assert_eq!(layout.snap, SnapSettings::default());
    }

    #[test]
    fn pinned_label_wins_over_offset() {
        let json = r#"{
            "labelOffsets": { "t": {"x": 5.0, "y": 5.0} },
            "pinnedLabelPositions": { "t": {"x": 50.0, "y": 60.0} }
        }"#;
        let layout = VisualLayout::from_json(json).unwrap();
        assert_eq!(
            layout.label(EdgeId::intern("t")),
            Some(LabelPlacement::Pinned(Point::new(50.0, 60.0)))
        );
    }

    #[test]
    fn malformed_anchor_keys_are_ignored() {
        let json = r#"{ "edgePositions": { "nosuffix": {"side": "top", "fraction": 0.5} } }"#;
        let layout = VisualLayout::from_json(json).unwrap();
        assert_eq!(layout, VisualLayout::new());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(VisualLayout::from_json("{ not json").is_err());
    }
}
