//! Undo/redo laws for every history entry kind.
//!
//! For each entry: undo after do restores the exact prior document, and redo
//! after undo reproduces the state right after do.

use pretty_assertions::assert_eq;
use wf_core::kurbo::{Point, Rect, Vec2};
use wf_core::{
    Anchor, EdgeId, EdgeVisual, Gate, GateId, GateKind, LabelPlacement, NodeId, Side, StateNode,
    Transition, VisualLayout, WorkflowGraph,
};
use wf_editor::{EdgeShape, History, HistoryEntry, SyncEngine};

#[derive(Debug, PartialEq)]
struct Snapshot {
    nodes: Vec<StateNode>,
    edges: Vec<Transition>,
    gates: Vec<Gate>,
    visual: String,
}

fn snapshot(engine: &SyncEngine) -> Snapshot {
    let g = engine.graph();
    let mut nodes: Vec<StateNode> = g.nodes().cloned().collect();
    nodes.sort_by_key(|n| n.id.to_string());
    let mut edges: Vec<Transition> = g.edges().cloned().collect();
    edges.sort_by_key(|e| e.id.to_string());
    let mut gates: Vec<Gate> = g.gates().cloned().collect();
    gates.sort_by_key(|g| g.id.to_string());
    Snapshot {
        nodes,
        edges,
        gates,
        visual: engine.visual().to_json().unwrap(),
    }
}

struct Fixture {
    engine: SyncEngine,
    a: NodeId,
    b: NodeId,
    d: NodeId,
    e: EdgeId,
}

/// A → B with a gate and full cosmetic state, plus a free state D.
fn fixture() -> Fixture {
    let mut g = WorkflowGraph::new();
    let a = g
        .add_node(StateNode::new(NodeId::generate(), "A", Point::new(100.0, 100.0)))
        .unwrap();
    let b = g
        .add_node(StateNode::new(NodeId::generate(), "B", Point::new(400.0, 100.0)))
        .unwrap();
    let d = g
        .add_node(StateNode::new(NodeId::generate(), "D", Point::new(100.0, 400.0)))
        .unwrap();
    let mut t = Transition::new(EdgeId::generate(), a, b);
    t.label = "submit".into();
    let e = g.add_edge(t).unwrap();
    g.add_gate(Gate::new(GateId::generate(), e, "Review", GateKind::Approval))
        .unwrap();

    let mut v = VisualLayout::new();
    v.set_waypoints(e, vec![Point::new(250.0, 60.0)]);
    v.set_label(e, Some(LabelPlacement::Offset(Vec2::new(0.0, -20.0))));
    v.set_anchor(e, wf_core::Endpoint::Start, Some(Anchor::new(Side::Right, 0.25)));

    Fixture {
        engine: SyncEngine::with_document("wf-laws", g, v),
        a,
        b,
        d,
        e,
    }
}

fn check_laws(mut fx: Fixture, entry: HistoryEntry) {
    let mut history = History::new(50);
    let before = snapshot(&fx.engine);

    history.execute(&mut fx.engine, entry.clone()).unwrap();
    let after = snapshot(&fx.engine);
    assert_ne!(before, after, "{} changed nothing", entry.description());

    history.undo(&mut fx.engine).unwrap();
    assert_eq!(snapshot(&fx.engine), before, "undo of {}", entry.description());

    history.redo(&mut fx.engine).unwrap();
    assert_eq!(snapshot(&fx.engine), after, "redo of {}", entry.description());
}

#[test]
fn node_add() {
    let fx = fixture();
    let node = StateNode::new(NodeId::generate(), "C", Point::new(700.0, 100.0));
    check_laws(fx, HistoryEntry::NodeAdd { node });
}

#[test]
fn node_delete() {
    let fx = fixture();
    let node = fx.engine.graph().node(fx.d).unwrap().clone();
    check_laws(fx, HistoryEntry::NodeDelete { node });
}

#[test]
fn node_move() {
    let fx = fixture();
    let id = fx.a;
    check_laws(
        fx,
        HistoryEntry::NodeMove {
            id,
            from: Point::new(100.0, 100.0),
            to: Point::new(160.0, 220.0),
        },
    );
}

#[test]
fn node_resize() {
    let fx = fixture();
    let id = fx.a;
    let from = fx.engine.graph().node(id).unwrap().bounds();
    check_laws(
        fx,
        HistoryEntry::NodeResize {
            id,
            from,
            to: Rect::new(40.0, 70.0, 240.0, 150.0),
        },
    );
}

#[test]
fn edge_add() {
    let fx = fixture();
    let t = Transition::new(EdgeId::generate(), fx.b, fx.a);
    let gate = Gate::new(GateId::generate(), t.id, "Rework reason", GateKind::Condition);
    check_laws(
        fx,
        HistoryEntry::EdgeAdd {
            gates: vec![gate],
            visual: EdgeVisual {
                waypoints: vec![Point::new(250.0, 160.0)],
                ..Default::default()
            },
            edge: t,
        },
    );
}

#[test]
fn edge_delete() {
    let fx = fixture();
    let g = fx.engine.graph();
    let edge = g.edge(fx.e).unwrap().clone();
    let gates = g.gates_for(fx.e).into_iter().cloned().collect();
    let visual = fx.engine.visual().edge_visual(fx.e);
    assert!(!visual.is_empty());
    check_laws(
        fx,
        HistoryEntry::EdgeDelete {
            edge,
            gates,
            visual,
        },
    );
}

#[test]
fn edge_reshape() {
    let fx = fixture();
    let before = EdgeShape {
        from: fx.a,
        to: fx.b,
        visual: fx.engine.visual().edge_visual(fx.e),
    };
    let after = EdgeShape {
        from: fx.a,
        to: fx.d,
        visual: EdgeVisual {
            end_anchor: Some(Anchor::new(Side::Top, 0.5)),
            ..Default::default()
        },
    };
    let id = fx.e;
    check_laws(fx, HistoryEntry::EdgeReshape { id, before, after });
}

#[test]
fn undo_of_edge_delete_restores_gates_in_order() {
    let mut fx = fixture();
    let e = fx.e;
    fx.engine
        .apply_mutation(wf_editor::GraphMutation::AddGate(Box::new({
            let mut g = Gate::new(GateId::generate(), e, "Checklist", GateKind::Checklist);
            g.sort_order = -1;
            g
        })))
        .unwrap();
    let names = |engine: &SyncEngine| -> Vec<String> {
        engine
            .graph()
            .gates_for(e)
            .into_iter()
            .map(|g| g.name.clone())
            .collect()
    };
    let original = names(&fx.engine);

    let g = fx.engine.graph();
    let entry = HistoryEntry::EdgeDelete {
        edge: g.edge(e).unwrap().clone(),
        gates: g.gates_for(e).into_iter().cloned().collect(),
        visual: fx.engine.visual().edge_visual(e),
    };
    let mut history = History::new(50);
    history.execute(&mut fx.engine, entry).unwrap();
    assert!(fx.engine.graph().gates_for(e).is_empty());

    history.undo(&mut fx.engine).unwrap();
    assert_eq!(names(&fx.engine), original);
    assert_eq!(original, vec!["Checklist".to_string(), "Review".to_string()]);
}

#[test]
fn undo_flush_persists_the_restored_state() {
    let mut fx = fixture();
    let mut history = History::new(50);
    let a = fx.a;
    history
        .execute(
            &mut fx.engine,
            HistoryEntry::NodeMove {
                id: a,
                from: Point::new(100.0, 100.0),
                to: Point::new(300.0, 300.0),
            },
        )
        .unwrap();
    fx.engine.flush();
    fx.engine.drain_outbox();

    history.undo(&mut fx.engine).unwrap();
    fx.engine.flush();
    let ops = fx.engine.drain_outbox();
    assert_eq!(ops.len(), 1);
    match &ops[0] {
        wf_editor::PersistOp::UpsertNode(n) => assert_eq!(n.position, Point::new(100.0, 100.0)),
        other => panic!("expected UpsertNode, got {other:?}"),
    }
}
