//! Portable export/import document for a whole workflow.
//!
//! States are keyed by a synthetic `_key` (the state name) instead of their
//! ids, and transitions reference states through that key. Importing always
//! mints fresh ids, so a document can be imported into any workflow.

use crate::error::{GraphError, ImportError};
use crate::id::{EdgeId, GateId, NodeId, RoleId};
use crate::model::{
    ApprovalMode, ArrowKind, Color, DEFAULT_LINE, EditFlags, Gate, GateKind, LineStyle,
    NodeShape, PathKind, StateNode, Transition, WorkflowGraph, clamp_size,
};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Format version written by [`export`].
pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowMeta {
    pub name: String,
    pub description: String,
    /// Opaque host configuration, carried through untouched.
    pub canvas_config: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: String,
    #[serde(default)]
    pub workflow: WorkflowMeta,
    pub states: Vec<ExportedState>,
    #[serde(default)]
    pub transitions: Vec<ExportedTransition>,
}

fn default_opacity() -> f32 {
    1.0
}

fn default_width() -> f32 {
    1.0
}

fn default_thickness() -> f32 {
    2.0
}

fn default_line_color() -> Color {
    DEFAULT_LINE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedState {
    #[serde(rename = "_key")]
    pub key: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub shape: NodeShape,
    #[serde(default = "default_fill")]
    pub fill: Color,
    #[serde(default = "default_opacity")]
    pub fill_opacity: f32,
    #[serde(default)]
    pub border: Option<Color>,
    #[serde(default = "default_opacity")]
    pub border_opacity: f32,
    #[serde(default = "default_width")]
    pub border_width: f32,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub flags: EditFlags,
    #[serde(default)]
    pub required_roles: Vec<RoleId>,
    #[serde(default)]
    pub gate_kind: Option<GateKind>,
}

fn default_fill() -> Color {
    crate::model::DEFAULT_FILL
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedTransition {
    pub from_state: String,
    pub to_state: String,
    #[serde(default)]
    pub path: PathKind,
    #[serde(default)]
    pub line: LineStyle,
    #[serde(default = "default_line_color")]
    pub color: Color,
    #[serde(default = "default_thickness")]
    pub thickness: f32,
    #[serde(default)]
    pub arrow: ArrowKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub allowed_roles: Vec<RoleId>,
    #[serde(default)]
    pub gates: Vec<ExportedGate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedGate {
    pub name: String,
    #[serde(default)]
    pub kind: GateKind,
    #[serde(default = "one")]
    pub required_approvals: u32,
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    #[serde(default = "yes")]
    pub blocking: bool,
    #[serde(default)]
    pub skip_roles: Vec<RoleId>,
    #[serde(default)]
    pub checklist: Vec<String>,
    #[serde(default)]
    pub sort_order: i32,
}

fn one() -> u32 {
    1
}

fn yes() -> bool {
    true
}

// ─── Export ──────────────────────────────────────────────────────────────

/// Unique `_key` for every state: its name, suffixed ` (2)`, ` (3)`, … when
/// several states share a name.
fn state_keys(graph: &WorkflowGraph) -> HashMap<NodeId, String> {
    let mut used = HashSet::new();
    let mut keys = HashMap::new();
    for node in graph.nodes() {
        let mut key = node.label.clone();
        let mut n = 2;
        while used.contains(&key) {
            key = format!("{} ({n})", node.label);
            n += 1;
        }
        used.insert(key.clone());
        keys.insert(node.id, key);
    }
    keys
}

/// Build the export document. `exported_at` is supplied by the caller
/// (usually an RFC 3339 timestamp).
pub fn export(graph: &WorkflowGraph, meta: &WorkflowMeta, exported_at: &str) -> ExportDocument {
    let keys = state_keys(graph);
    let states = graph
        .nodes()
        .map(|n| ExportedState {
            key: keys[&n.id].clone(),
            name: n.label.clone(),
            x: n.position.x,
            y: n.position.y,
            width: Some(n.size.width),
            height: Some(n.size.height),
            shape: n.shape,
            fill: n.fill,
            fill_opacity: n.fill_opacity,
            border: n.border,
            border_opacity: n.border_opacity,
            border_width: n.border_width,
            icon: n.icon.clone(),
            flags: n.flags,
            required_roles: n.required_roles.to_vec(),
            gate_kind: n.gate_kind,
        })
        .collect();

    let transitions = graph
        .edges()
        .map(|t| ExportedTransition {
            from_state: keys[&t.from].clone(),
            to_state: keys[&t.to].clone(),
            path: t.path,
            line: t.line,
            color: t.color,
            thickness: t.thickness,
            arrow: t.arrow,
            label: t.label.clone(),
            allowed_roles: t.allowed_roles.to_vec(),
            gates: graph
                .gates_for(t.id)
                .into_iter()
                .map(|g| ExportedGate {
                    name: g.name.clone(),
                    kind: g.kind,
                    required_approvals: g.required_approvals,
                    approval_mode: g.approval_mode,
                    blocking: g.blocking,
                    skip_roles: g.skip_roles.to_vec(),
                    checklist: g.checklist.clone(),
                    sort_order: g.sort_order,
                })
                .collect(),
        })
        .collect();

    log::debug!(
        "exported workflow `{}`: {} states, {} transitions",
        meta.name,
        graph.node_count(),
        graph.edge_count()
    );

    ExportDocument {
        version: EXPORT_VERSION.to_string(),
        exported_at: exported_at.to_string(),
        workflow: meta.clone(),
        states,
        transitions,
    }
}

pub fn export_json(
    graph: &WorkflowGraph,
    meta: &WorkflowMeta,
    exported_at: &str,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&export(graph, meta, exported_at))
}

// ─── Import ──────────────────────────────────────────────────────────────

/// A document item that was skipped during import.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportWarning {
    #[error("state #{index}: key `{key}` is already used; skipped")]
    DuplicateStateKey { index: usize, key: String },

    #[error("transition #{index}: unknown state `{key}`; skipped")]
    UnresolvedState { index: usize, key: String },

    #[error("transition #{index}: {source}; skipped")]
    Rejected { index: usize, source: GraphError },

    #[error("transition #{index}: {reason}; skipped")]
    Malformed { index: usize, reason: String },
}

/// Result of a successful import: a complete replacement graph.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub meta: WorkflowMeta,
    pub graph: WorkflowGraph,
    pub warnings: Vec<ImportWarning>,
}

fn malformed(field: &'static str) -> impl Fn(serde_json::Error) -> ImportError {
    move |e| ImportError::Malformed {
        field,
        reason: e.to_string(),
    }
}

/// Parse and rebuild a workflow from an export document.
///
/// The top level must be an object with `version` and `states`; anything
/// wrong there aborts. Individual transitions that are malformed, reference
/// an unknown key, or break an edge invariant are skipped with a warning.
pub fn import(json: &str) -> Result<ImportOutcome, ImportError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let Some(obj) = value.as_object() else {
        return Err(ImportError::Malformed {
            field: "document",
            reason: "expected a JSON object".to_string(),
        });
    };
    if obj.get("version").is_none_or(serde_json::Value::is_null) {
        return Err(ImportError::MissingField("version"));
    }
    let states = obj.get("states").ok_or(ImportError::MissingField("states"))?;
    let states: Vec<ExportedState> =
        serde_json::from_value(states.clone()).map_err(malformed("states"))?;
    let meta: WorkflowMeta = match obj.get("workflow") {
        Some(w) => serde_json::from_value(w.clone()).map_err(malformed("workflow"))?,
        None => WorkflowMeta::default(),
    };
    let transitions: Vec<serde_json::Value> = match obj.get("transitions") {
        Some(t) => serde_json::from_value(t.clone()).map_err(malformed("transitions"))?,
        None => Vec::new(),
    };

    let mut graph = WorkflowGraph::new();
    let mut warnings = Vec::new();
    let mut by_key: HashMap<String, NodeId> = HashMap::new();

    for (index, s) in states.into_iter().enumerate() {
        if by_key.contains_key(&s.key) {
            warnings.push(ImportWarning::DuplicateStateKey { index, key: s.key });
            continue;
        }
        let id = NodeId::generate();
        let mut node = StateNode::new(id, s.name, Point::new(s.x, s.y));
        let default = node.size;
        node.size = clamp_size(Size::new(
            s.width.unwrap_or(default.width),
            s.height.unwrap_or(default.height),
        ));
        node.shape = s.shape;
        node.fill = s.fill;
        node.fill_opacity = s.fill_opacity.clamp(0.0, 1.0);
        node.border = s.border;
        node.border_opacity = s.border_opacity.clamp(0.0, 1.0);
        node.border_width = s.border_width;
        node.icon = s.icon;
        node.flags = s.flags;
        node.required_roles = SmallVec::from_vec(s.required_roles);
        node.gate_kind = s.gate_kind;
        // Fresh ids cannot collide.
        graph.add_node(node).map_err(|e| ImportError::Malformed {
            field: "states",
            reason: e.to_string(),
        })?;
        by_key.insert(s.key, id);
    }

    for (index, raw) in transitions.into_iter().enumerate() {
        let t: ExportedTransition = match serde_json::from_value(raw) {
            Ok(t) => t,
            Err(e) => {
                warnings.push(ImportWarning::Malformed {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let Some(&from) = by_key.get(&t.from_state) else {
            warnings.push(ImportWarning::UnresolvedState {
                index,
                key: t.from_state,
            });
            continue;
        };
        let Some(&to) = by_key.get(&t.to_state) else {
            warnings.push(ImportWarning::UnresolvedState {
                index,
                key: t.to_state,
            });
            continue;
        };

        let id = EdgeId::generate();
        let mut edge = Transition::new(id, from, to);
        edge.path = t.path;
        edge.line = t.line;
        edge.color = t.color;
        edge.thickness = t.thickness;
        edge.arrow = t.arrow;
        edge.label = t.label;
        edge.allowed_roles = SmallVec::from_vec(t.allowed_roles);
        if let Err(source) = graph.add_edge(edge) {
            warnings.push(ImportWarning::Rejected { index, source });
            continue;
        }

        for g in t.gates {
            let mut gate = Gate::new(GateId::generate(), id, g.name, g.kind);
            gate.required_approvals = g.required_approvals;
            gate.approval_mode = g.approval_mode;
            gate.blocking = g.blocking;
            gate.skip_roles = SmallVec::from_vec(g.skip_roles);
            gate.checklist = g.checklist;
            gate.sort_order = g.sort_order;
            if let Err(source) = graph.add_gate(gate) {
                warnings.push(ImportWarning::Rejected { index, source });
            }
        }
    }

    for w in &warnings {
        log::warn!("import: {w}");
    }
    log::debug!(
        "imported workflow `{}`: {} states, {} transitions, {} skipped",
        meta.name,
        graph.node_count(),
        graph.edge_count(),
        warnings.len()
    );

    Ok(ImportOutcome {
        meta,
        graph,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> WorkflowGraph {
        let mut g = WorkflowGraph::new();
        let a = g
            .add_node(StateNode::new(NodeId::generate(), "Draft", Point::new(100.0, 100.0)))
            .unwrap();
        let b = g
            .add_node(StateNode::new(NodeId::generate(), "Review", Point::new(400.0, 100.0)))
            .unwrap();
        let c = g
            .add_node(StateNode::new(NodeId::generate(), "Review", Point::new(400.0, 300.0)))
            .unwrap();
        let ab = g.add_edge(Transition::new(EdgeId::generate(), a, b)).unwrap();
        g.add_edge(Transition::new(EdgeId::generate(), b, c)).unwrap();
        let mut gate = Gate::new(GateId::generate(), ab, "Manager sign-off", GateKind::Approval);
        gate.required_approvals = 2;
        g.add_gate(gate).unwrap();
        g
    }

    #[test]
    fn duplicate_names_get_unique_keys() {
        let doc = export(&sample(), &WorkflowMeta::default(), "2026-01-01T00:00:00Z");
        let keys: Vec<&str> = doc.states.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["Draft", "Review", "Review (2)"]);
        assert_eq!(doc.transitions[1].from_state, "Review");
        assert_eq!(doc.transitions[1].to_state, "Review (2)");
    }

    #[test]
    fn export_then_import_rebuilds_fresh_graph() {
        let original = sample();
        let meta = WorkflowMeta {
            name: "Release".into(),
            description: "Doc release flow".into(),
            canvas_config: serde_json::json!({ "zoom": 1.0 }),
        };
        let json = export_json(&original, &meta, "2026-01-01T00:00:00Z").unwrap();
        let outcome = import(&json).unwrap();

        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.meta, meta);
        assert_eq!(outcome.graph.node_count(), 3);
        assert_eq!(outcome.graph.edge_count(), 2);
        assert_eq!(outcome.graph.gates().count(), 1);
        for n in outcome.graph.nodes() {
            assert!(!original.contains_node(n.id), "id {} was reused", n.id);
        }
        let gate = outcome.graph.gates().next().unwrap();
        assert_eq!(gate.required_approvals, 2);
    }

    #[test]
    fn rejects_missing_version_or_states() {
        assert!(matches!(
            import(r#"{ "states": [] }"#),
            Err(ImportError::MissingField("version"))
        ));
        assert!(matches!(
            import(r#"{ "version": "1.0" }"#),
            Err(ImportError::MissingField("states"))
        ));
        assert!(matches!(import("[1, 2]"), Err(ImportError::Malformed { .. })));
        assert!(matches!(import("{"), Err(ImportError::Json(_))));
        assert!(matches!(
            import(r#"{ "version": "1.0", "states": 5 }"#),
            Err(ImportError::Malformed { field: "states", .. })
        ));
    }

    #[test]
    fn invalid_transitions_are_skipped_individually() {
        let json = r#"{
            "version": "1.0",
            "exportedAt": "now",
            "states": [
                { "_key": "a", "name": "A", "x": 0, "y": 0 },
                { "_key": "b", "name": "B", "x": 300, "y": 0 }
            ],
            "transitions": [
                { "from_state": "a", "to_state": "b" },
                { "from_state": "a", "to_state": "b" },
                { "from_state": "b", "to_state": "b" },
                { "from_state": "a" },
                { "from_state": "b", "to_state": "a" }
            ]
        }"#;
        let outcome = import(json).unwrap();
        assert_eq!(outcome.graph.edge_count(), 2);
        assert_eq!(outcome.warnings.len(), 3);
        assert!(matches!(
            outcome.warnings[0],
            ImportWarning::Rejected { index: 1, source: GraphError::DuplicateEdge { .. } }
        ));
        assert!(matches!(
            outcome.warnings[1],
            ImportWarning::Rejected { index: 2, source: GraphError::SelfLoop(_) }
        ));
        assert!(matches!(outcome.warnings[2], ImportWarning::Malformed { index: 3, .. }));
    }

    #[test]
    fn undersized_states_are_clamped() {
        let json = r#"{ "version": "1", "states": [
            { "_key": "a", "name": "A", "x": 0, "y": 0, "width": 10, "height": 500 }
        ] }"#;
        let outcome = import(json).unwrap();
        let n = outcome.graph.nodes().next().unwrap();
        assert_eq!(n.size, Size::new(80.0, 500.0));
    }
}
