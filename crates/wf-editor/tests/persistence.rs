//! Write-through of the sync outbox to external stores.

use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::Mutex;
use wf_core::kurbo::Point;
use wf_core::{EdgeId, Gate, GateId, NodeId, StateNode, Transition};
use wf_editor::persist::load_visual;
use wf_editor::{
    CosmeticStore, EditorConfig, GraphStore, InputEvent, NotificationSink, PersistOp, StoreError,
    WorkflowEditor, write_through,
};

/// In-memory graph store. Writes touching `poisoned` ids fail.
#[derive(Default)]
struct MemoryGraph {
    nodes: Mutex<BTreeMap<String, StateNode>>,
    edges: Mutex<BTreeMap<String, Transition>>,
    gates: Mutex<BTreeMap<String, Gate>>,
    log: Mutex<Vec<String>>,
    poisoned: Mutex<Vec<String>>,
}

impl MemoryGraph {
    fn check(&self, what: &str, id: &str) -> Result<(), StoreError> {
        self.log.lock().unwrap().push(format!("{what} {id}"));
        if self.poisoned.lock().unwrap().iter().any(|p| p == id) {
            return Err(StoreError::Rejected(format!("{id} is read-only")));
        }
        Ok(())
    }
}

impl GraphStore for MemoryGraph {
    async fn upsert_node(&self, _workflow: &str, node: &StateNode) -> Result<(), StoreError> {
        self.check("upsert_node", node.id.as_str())?;
        self.nodes
            .lock()
            .unwrap()
            .insert(node.id.to_string(), node.clone());
        Ok(())
    }

    async fn delete_node(&self, _workflow: &str, id: NodeId) -> Result<(), StoreError> {
        self.check("delete_node", id.as_str())?;
        self.nodes.lock().unwrap().remove(id.as_str());
        Ok(())
    }

    async fn upsert_edge(&self, _workflow: &str, edge: &Transition) -> Result<(), StoreError> {
        self.check("upsert_edge", edge.id.as_str())?;
        self.edges
            .lock()
            .unwrap()
            .insert(edge.id.to_string(), edge.clone());
        Ok(())
    }

    async fn delete_edge(&self, _workflow: &str, id: EdgeId) -> Result<(), StoreError> {
        self.check("delete_edge", id.as_str())?;
        self.edges.lock().unwrap().remove(id.as_str());
        Ok(())
    }

    async fn upsert_gate(&self, _workflow: &str, gate: &Gate) -> Result<(), StoreError> {
        self.check("upsert_gate", gate.id.as_str())?;
        self.gates
            .lock()
            .unwrap()
            .insert(gate.id.to_string(), gate.clone());
        Ok(())
    }

    async fn delete_gate(&self, _workflow: &str, id: GateId) -> Result<(), StoreError> {
        self.check("delete_gate", id.as_str())?;
        self.gates.lock().unwrap().remove(id.as_str());
        Ok(())
    }

    async fn replace_graph(
        &self,
        workflow: &str,
        nodes: &[StateNode],
        edges: &[Transition],
        gates: &[Gate],
    ) -> Result<(), StoreError> {
        self.check("replace_graph", workflow)?;
        *self.nodes.lock().unwrap() = nodes.iter().map(|n| (n.id.to_string(), n.clone())).collect();
        *self.edges.lock().unwrap() = edges.iter().map(|e| (e.id.to_string(), e.clone())).collect();
        *self.gates.lock().unwrap() = gates.iter().map(|g| (g.id.to_string(), g.clone())).collect();
        Ok(())
    }
}

#[derive(Default)]
struct MemoryCosmetic {
    docs: Mutex<BTreeMap<String, String>>,
    offline: bool,
}

impl CosmeticStore for MemoryCosmetic {
    async fn load(&self, workflow: &str) -> Result<Option<String>, StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("cosmetic store offline".into()));
        }
        Ok(self.docs.lock().unwrap().get(workflow).cloned())
    }

    async fn save(&self, workflow: &str, json: &str) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("cosmetic store offline".into()));
        }
        self.docs
            .lock()
            .unwrap()
            .insert(workflow.to_string(), json.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct Toasts(Mutex<Vec<String>>);

impl NotificationSink for Toasts {
    fn notify(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

fn editor() -> WorkflowEditor {
    WorkflowEditor::new("wf-persist", EditorConfig::default())
}

#[tokio::test]
async fn committed_edits_reach_both_stores() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ed = editor();
    let a = ed.add_state("Draft").unwrap();
    let b = ed.add_state("Review").unwrap();
    ed.enter_connect_mode();
    let pa = ed.graph().node(a).unwrap().position;
    let pb = ed.graph().node(b).unwrap().position;
    for p in [pa, pb] {
        ed.handle_input(InputEvent::down(p.x, p.y));
        ed.handle_input(InputEvent::up(p.x, p.y));
    }
    assert_eq!(ed.graph().edge_count(), 1);

    let (graph, cosmetic, sink) = (MemoryGraph::default(), MemoryCosmetic::default(), Toasts::default());
    let ops = ed.drain_outbox();
    let report = write_through("wf-persist", &ops, &graph, &cosmetic, &sink).await;

    assert!(report.is_clean());
    assert_eq!(report.applied, ops.len());
    assert_eq!(graph.nodes.lock().unwrap().len(), 2);
    assert_eq!(graph.edges.lock().unwrap().len(), 1);
    assert!(cosmetic.docs.lock().unwrap().contains_key("wf-persist"));
    assert!(sink.0.lock().unwrap().is_empty());

    // The saved record restores the same waypoints.
    let restored = load_visual("wf-persist", &cosmetic).await.unwrap();
    let e = ed.graph().edges().next().unwrap().id;
    assert_eq!(restored.waypoints(e), ed.visual().waypoints(e));
}

#[tokio::test]
async fn failures_are_reported_without_rollback() {
    let mut ed = editor();
    let a = ed.add_state("Draft").unwrap();
    let b = ed.add_state("Review").unwrap();
    ed.drain_outbox();

    let start = ed.graph().node(a).unwrap().position;
    let target = Point::new(start.x + 200.0, start.y + 300.0);
    ed.handle_input(InputEvent::down(start.x, start.y));
    ed.handle_input(InputEvent::moved(target.x, target.y));
    ed.handle_input(InputEvent::up(target.x, target.y));
    ed.select(wf_editor::Selection::Node(b));
    ed.delete_selection().unwrap();
    let ops = ed.drain_outbox();
    assert_eq!(ops.len(), 2);

    let graph = MemoryGraph::default();
    graph.poisoned.lock().unwrap().push(a.to_string());
    let sink = Toasts::default();
    let report = write_through("wf-persist", &ops, &graph, &MemoryCosmetic::default(), &sink).await;

    assert_eq!(report.applied, 1);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0], StoreError::Rejected(_)));
    assert_eq!(sink.0.lock().unwrap().len(), 1);
    // The op after the failure still ran.
    assert_eq!(
        graph.log.lock().unwrap().as_slice(),
        &[format!("upsert_node {a}"), format!("delete_node {b}")]
    );
    // Memory keeps the optimistic move.
    assert_eq!(ed.graph().node(a).unwrap().position, target);
    assert!(ed.graph().node(b).is_none());
}

#[tokio::test]
async fn import_is_one_replace_op() {
    let mut ed = editor();
    ed.add_state("Old").unwrap();
    ed.drain_outbox();
    let json = r#"{
        "version": "1.0",
        "states": [
            { "_key": "a", "name": "Open", "x": 100, "y": 100 },
            { "_key": "b", "name": "Closed", "x": 400, "y": 100 }
        ],
        "transitions": [ { "from_state": "a", "to_state": "b" } ]
    }"#;
    let warnings = ed.import_json(json).unwrap();
    assert!(warnings.is_empty());
    assert!(!ed.history().can_undo());

    let ops = ed.drain_outbox();
    assert!(matches!(ops[0], PersistOp::ReplaceGraph { .. }));

    let graph = MemoryGraph::default();
    let cosmetic = MemoryCosmetic::default();
    let report = write_through("wf-persist", &ops, &graph, &cosmetic, &Toasts::default()).await;
    assert!(report.is_clean());
    let names: Vec<String> = graph
        .nodes
        .lock()
        .unwrap()
        .values()
        .map(|n| n.label.clone())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Open".to_string()) && names.contains(&"Closed".to_string()));
    assert_eq!(graph.edges.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_or_unreachable_visual_record() {
    let empty = MemoryCosmetic::default();
    let layout = load_visual("never-saved", &empty).await.unwrap();
    assert!(layout.to_document().waypoints.is_empty());

    let offline = MemoryCosmetic {
        offline: true,
        ..Default::default()
    };
    assert!(load_visual("wf", &offline).await.is_err());
}

#[tokio::test]
async fn cosmetic_outage_does_not_block_graph_writes() {
    let mut ed = editor();
    let a = ed.add_state("Draft").unwrap();
    ed.set_snap_settings(wf_core::SnapSettings {
        grid_enabled: true,
        ..Default::default()
    });
    let ops = ed.drain_outbox();

    let graph = MemoryGraph::default();
    let cosmetic = MemoryCosmetic {
        offline: true,
        ..Default::default()
    };
    let sink = Toasts::default();
    let report = write_through("wf-persist", &ops, &graph, &cosmetic, &sink).await;
    assert!(graph.nodes.lock().unwrap().contains_key(a.as_str()));
    assert_eq!(report.failed, vec![StoreError::Unavailable("cosmetic store offline".into())]);
    assert!(sink.0.lock().unwrap()[0].contains("save layout"));
}
