//! Workflow graph data model.
//!
//! Nodes are workflow states, edges are directed transitions between them,
//! and gates are approval/condition checks hanging off a transition. The
//! graph is an arena (`StableDiGraph`) addressed by generated ids; id → index
//! maps make the structural invariants cheap lookups:
//!
//! - no transition from a state to itself,
//! - at most one transition per ordered `(from, to)` pair,
//! - a state referenced by any transition cannot be deleted,
//! - deleting a transition deletes its gates.
//!
//! Cosmetic edge state (waypoints, anchors, label placement) lives in
//! [`crate::visual::VisualLayout`], not here.

use crate::error::GraphError;
use crate::id::{EdgeId, GateId, NodeId, RoleId};
use kurbo::{Point, Rect, Size, Vec2};
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Size given to freshly created states.
pub const DEFAULT_NODE_SIZE: Size = Size::new(120.0, 60.0);

/// States can never be resized below this.
pub const MIN_NODE_SIZE: Size = Size::new(80.0, 40.0);

/// Cascade step used when the requested one would not move off the base.
pub const DEFAULT_CASCADE_OFFSET: Vec2 = Vec2::new(40.0, 40.0);

/// Where the very first state of an empty workflow is placed.
pub const FIRST_NODE_POSITION: Point = Point::new(100.0, 100.0);

// ─── Colors ──────────────────────────────────────────────────────────────

/// Opaque RGB color; opacity is carried separately by the owning field.
/// Serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RGB` or `#RRGGBB`. The leading `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        match bytes.len() {
            3 => Some(Self::rgb(
                hex_val(bytes[0])? * 17,
                hex_val(bytes[1])? * 17,
                hex_val(bytes[2])? * 17,
            )),
            6 => Some(Self::rgb(
                hex_val(bytes[0])? << 4 | hex_val(bytes[1])?,
                hex_val(bytes[2])? << 4 | hex_val(bytes[3])?,
                hex_val(bytes[4])? << 4 | hex_val(bytes[5])?,
            )),
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color `{s}`")))
    }
}

/// Default fill for new states.
pub const DEFAULT_FILL: Color = Color::rgb(0x4A, 0x90, 0xE2);

/// Default stroke for new transitions.
pub const DEFAULT_LINE: Color = Color::rgb(0x55, 0x5F, 0x6D);

// ─── States ──────────────────────────────────────────────────────────────

/// Outline of a state box. Geometry always treats the box as its bounding
/// rectangle; the shape only affects painting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeShape {
    Rectangle { corner_radius: f64 },
    Diamond,
    Hexagon,
    Ellipse,
}

impl Default for NodeShape {
    fn default() -> Self {
        NodeShape::Rectangle { corner_radius: 8.0 }
    }
}

/// Which interactive edits a state accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditFlags {
    pub movable: bool,
    pub resizable: bool,
    pub deletable: bool,
}

impl Default for EditFlags {
    fn default() -> Self {
        Self {
            movable: true,
            resizable: true,
            deletable: true,
        }
    }
}

/// A workflow state (diagram node). `position` is the box center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateNode {
    pub id: NodeId,
    pub position: Point,
    pub size: Size,
    pub shape: NodeShape,
    pub fill: Color,
    pub fill_opacity: f32,
    /// `None` means "same as fill".
    pub border: Option<Color>,
    pub border_opacity: f32,
    pub border_width: f32,
    pub label: String,
    pub icon: Option<String>,
    pub flags: EditFlags,
    pub required_roles: SmallVec<[RoleId; 2]>,
    /// Marks the state itself as a gate of the given kind.
    pub gate_kind: Option<GateKind>,
}

impl StateNode {
    pub fn new(id: NodeId, label: impl Into<String>, position: Point) -> Self {
        Self {
            id,
            position,
            size: DEFAULT_NODE_SIZE,
            shape: NodeShape::default(),
            fill: DEFAULT_FILL,
            fill_opacity: 1.0,
            border: None,
            border_opacity: 1.0,
            border_width: 1.0,
            label: label.into(),
            icon: None,
            flags: EditFlags::default(),
            required_roles: SmallVec::new(),
            gate_kind: None,
        }
    }

    /// Axis-aligned box in canvas units.
    pub fn bounds(&self) -> Rect {
        Rect::from_center_size(self.position, self.size)
    }

    pub fn border_color(&self) -> Color {
        self.border.unwrap_or(self.fill)
    }

    /// Set the size, clamped to [`MIN_NODE_SIZE`].
    pub fn set_size(&mut self, size: Size) {
        self.size = clamp_size(size);
    }
}

/// Clamp both dimensions to [`MIN_NODE_SIZE`].
pub fn clamp_size(size: Size) -> Size {
    Size::new(
        size.width.max(MIN_NODE_SIZE.width),
        size.height.max(MIN_NODE_SIZE.height),
    )
}

// ─── Transitions ─────────────────────────────────────────────────────────

/// How a transition's path is routed between its two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    #[default]
    Straight,
    Spline,
    Elbow,
}

/// Stroke pattern of a transition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// Arrow head placement on a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowKind {
    None,
    Start,
    #[default]
    End,
    Both,
}

/// One end of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Start,
    End,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Start => "start",
            Endpoint::End => "end",
        }
    }
}

/// A directed transition between two distinct states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub path: PathKind,
    pub line: LineStyle,
    pub color: Color,
    pub thickness: f32,
    pub arrow: ArrowKind,
    pub label: String,
    pub allowed_roles: SmallVec<[RoleId; 2]>,
}

impl Transition {
    pub fn new(id: EdgeId, from: NodeId, to: NodeId) -> Self {
        Self {
            id,
            from,
            to,
            path: PathKind::default(),
            line: LineStyle::default(),
            color: DEFAULT_LINE,
            thickness: 2.0,
            arrow: ArrowKind::default(),
            label: String::new(),
            allowed_roles: SmallVec::new(),
        }
    }

    pub fn endpoint(&self, end: Endpoint) -> NodeId {
        match end {
            Endpoint::Start => self.from,
            Endpoint::End => self.to,
        }
    }
}

// ─── Gates ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    #[default]
    Approval,
    Checklist,
    Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    #[default]
    Any,
    All,
}

/// An approval/condition check attached to a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub id: GateId,
    pub edge: EdgeId,
    pub name: String,
    pub kind: GateKind,
    pub required_approvals: u32,
    pub approval_mode: ApprovalMode,
    pub blocking: bool,
    pub skip_roles: SmallVec<[RoleId; 2]>,
    pub checklist: Vec<String>,
    pub sort_order: i32,
}

impl Gate {
    pub fn new(id: GateId, edge: EdgeId, name: impl Into<String>, kind: GateKind) -> Self {
        Self {
            id,
            edge,
            name: name.into(),
            kind,
            required_approvals: 1,
            approval_mode: ApprovalMode::default(),
            blocking: true,
            skip_roles: SmallVec::new(),
            checklist: Vec::new(),
            sort_order: 0,
        }
    }
}

// ─── Graph arena ─────────────────────────────────────────────────────────

/// The structural workflow graph.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    /// States as nodes, transitions as edge weights.
    pub graph: StableDiGraph<StateNode, Transition>,
    node_index: HashMap<NodeId, NodeIndex>,
    edge_index: HashMap<EdgeId, EdgeIndex>,
    gates: HashMap<GateId, Gate>,
    /// Most recently added state, used to cascade default placement.
    last_added: Option<NodeId>,
}

impl WorkflowGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── States ──

    /// Insert a state. Its id must not already be present.
    pub fn add_node(&mut self, node: StateNode) -> Result<NodeId, GraphError> {
        let id = node.id;
        if self.node_index.contains_key(&id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        self.last_added = Some(id);
        Ok(id)
    }

    /// Delete a state. Rejected while any transition references it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<StateNode, GraphError> {
        let idx = self.index_of(id).ok_or(GraphError::UnknownNode(id))?;
        if !self.graph[idx].flags.deletable {
            return Err(GraphError::NodeLocked(id));
        }
        let count = self.degree(idx);
        if count > 0 {
            return Err(GraphError::NodeReferenced { node: id, count });
        }
        let node = self
            .graph
            .remove_node(idx)
            .ok_or(GraphError::UnknownNode(id))?;
        self.node_index.remove(&id);
        if self.last_added == Some(id) {
            self.last_added = None;
        }
        Ok(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&StateNode> {
        self.node_index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut StateNode> {
        self.node_index
            .get(&id)
            .copied()
            .map(|idx| &mut self.graph[idx])
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    /// States in arena order (later entries paint on top).
    pub fn nodes(&self) -> impl Iterator<Item = &StateNode> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.node_index.get(&id).copied()
    }

    fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Outgoing).count()
            + self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    /// Transitions touching a state, in either direction.
    pub fn incident_edges(&self, id: NodeId) -> Vec<EdgeId> {
        let Some(idx) = self.index_of(id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| e.weight().id)
            .collect()
    }

    /// Default position for a new state: cascade from the most recently
    /// added one, stepping past occupied centers.
    pub fn next_node_position(&self, offset: Vec2) -> Point {
        let base = self
            .last_added
            .and_then(|id| self.node(id))
            .or_else(|| self.nodes().last())
            .map(|n| n.position);
        let Some(base) = base else {
            return FIRST_NODE_POSITION;
        };
        let offset = if offset.hypot() < 1.0 {
            DEFAULT_CASCADE_OFFSET
        } else {
            offset
        };
        let mut candidate = base + offset;
        while self
            .nodes()
            .any(|n| (n.position - candidate).hypot() < 1.0)
        {
            candidate += offset;
        }
        candidate
    }

    // ── Transitions ──

    /// Check that `from → to` may exist, ignoring `except` (an edge being
    /// rebound).
    pub fn validate_edge(
        &self,
        from: NodeId,
        to: NodeId,
        except: Option<EdgeId>,
    ) -> Result<(), GraphError> {
        if !self.contains_node(from) {
            return Err(GraphError::UnknownNode(from));
        }
        if !self.contains_node(to) {
            return Err(GraphError::UnknownNode(to));
        }
        if from == to {
            return Err(GraphError::SelfLoop(from));
        }
        match self.find_edge(from, to) {
            Some(existing) if Some(existing) != except => {
                Err(GraphError::DuplicateEdge { from, to })
            }
            _ => Ok(()),
        }
    }

    /// Insert a transition after validating both invariants.
    pub fn add_edge(&mut self, edge: Transition) -> Result<EdgeId, GraphError> {
        let id = edge.id;
        if self.edge_index.contains_key(&id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }
        self.validate_edge(edge.from, edge.to, None)?;
        let (a, b) = self.endpoints_index(edge.from, edge.to)?;
        let eidx = self.graph.add_edge(a, b, edge);
        self.edge_index.insert(id, eidx);
        Ok(id)
    }

    /// Delete a transition, cascading to its gates (returned sorted).
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<(Transition, Vec<Gate>), GraphError> {
        let eidx = self.edge_index.remove(&id).ok_or(GraphError::UnknownEdge(id))?;
        let edge = self
            .graph
            .remove_edge(eidx)
            .ok_or(GraphError::UnknownEdge(id))?;
        let gate_ids: Vec<GateId> = self
            .gates
            .values()
            .filter(|g| g.edge == id)
            .map(|g| g.id)
            .collect();
        let mut gates: Vec<Gate> = gate_ids
            .into_iter()
            .filter_map(|gid| self.gates.remove(&gid))
            .collect();
        gates.sort_by_key(|g| g.sort_order);
        Ok((edge, gates))
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Transition> {
        self.edge_index
            .get(&id)
            .and_then(|idx| self.graph.edge_weight(*idx))
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Transition> {
        let idx = self.edge_index.get(&id).copied()?;
        self.graph.edge_weight_mut(idx)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Transition> {
        self.graph.edge_indices().filter_map(|idx| self.graph.edge_weight(idx))
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The transition for an ordered pair, if any.
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        let (a, b) = (self.index_of(from)?, self.index_of(to)?);
        self.graph
            .find_edge(a, b)
            .and_then(|e| self.graph.edge_weight(e))
            .map(|t| t.id)
    }

    /// Move one end of a transition onto another state. Returns the state it
    /// was previously bound to.
    pub fn rebind_edge(
        &mut self,
        id: EdgeId,
        end: Endpoint,
        node: NodeId,
    ) -> Result<NodeId, GraphError> {
        let current = self.edge(id).ok_or(GraphError::UnknownEdge(id))?;
        let previous = current.endpoint(end);
        if previous == node {
            return Ok(previous);
        }
        let (from, to) = match end {
            Endpoint::Start => (node, current.to),
            Endpoint::End => (current.from, node),
        };
        self.validate_edge(from, to, Some(id))?;

        let eidx = self.edge_index[&id];
        let mut edge = self
            .graph
            .remove_edge(eidx)
            .ok_or(GraphError::UnknownEdge(id))?;
        edge.from = from;
        edge.to = to;
        let (a, b) = self.endpoints_index(from, to)?;
        let new_idx = self.graph.add_edge(a, b, edge);
        self.edge_index.insert(id, new_idx);
        Ok(previous)
    }

    fn endpoints_index(&self, from: NodeId, to: NodeId) -> Result<(NodeIndex, NodeIndex), GraphError> {
        let a = self.index_of(from).ok_or(GraphError::UnknownNode(from))?;
        let b = self.index_of(to).ok_or(GraphError::UnknownNode(to))?;
        Ok((a, b))
    }

    // ── Gates ──

    pub fn add_gate(&mut self, gate: Gate) -> Result<GateId, GraphError> {
        if !self.edge_index.contains_key(&gate.edge) {
            return Err(GraphError::UnknownEdge(gate.edge));
        }
        if self.gates.contains_key(&gate.id) {
            return Err(GraphError::DuplicateId(gate.id.to_string()));
        }
        let id = gate.id;
        self.gates.insert(id, gate);
        Ok(id)
    }

    pub fn remove_gate(&mut self, id: GateId) -> Result<Gate, GraphError> {
        self.gates.remove(&id).ok_or(GraphError::UnknownGate(id))
    }

    pub fn gate(&self, id: GateId) -> Option<&Gate> {
        self.gates.get(&id)
    }

    pub fn gate_mut(&mut self, id: GateId) -> Option<&mut Gate> {
        self.gates.get_mut(&id)
    }

    /// Gates of a transition ordered by `sort_order`.
    pub fn gates_for(&self, edge: EdgeId) -> Vec<&Gate> {
        let mut gates: Vec<&Gate> = self.gates.values().filter(|g| g.edge == edge).collect();
        gates.sort_by_key(|g| (g.sort_order, g.name.clone()));
        gates
    }

    pub fn gates(&self) -> impl Iterator<Item = &Gate> {
        self.gates.values()
    }
}
