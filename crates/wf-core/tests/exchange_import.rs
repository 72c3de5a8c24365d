//! Integration tests: export/import document handling.

use pretty_assertions::assert_eq;
use wf_core::exchange::{export, import};
use wf_core::*;

fn find<'a>(g: &'a WorkflowGraph, label: &str) -> &'a StateNode {
    g.nodes()
        .find(|n| n.label == label)
        .unwrap_or_else(|| panic!("no state labelled {label}"))
}

#[test]
fn unresolved_transition_is_skipped_others_import() {
    let _ = env_logger::builder().is_test(true).try_init();
    let outcome = import(include_str!("fixtures/release_flow.json")).unwrap();

    assert_eq!(outcome.graph.node_count(), 3);
    assert_eq!(outcome.graph.edge_count(), 3);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(
        outcome.warnings[0],
        ImportWarning::UnresolvedState {
            index: 2,
            key: "Archived".to_string()
        }
    );
    assert_eq!(
        outcome.warnings[0].to_string(),
        "transition #2: unknown state `Archived`; skipped"
    );
}

#[test]
fn imported_fields_survive() {
    let outcome = import(include_str!("fixtures/release_flow.json")).unwrap();
    let g = &outcome.graph;

    assert_eq!(outcome.meta.name, "Drawing release");
    assert_eq!(outcome.meta.canvas_config["gridSize"], 20);

    let checked = find(g, "Checked");
    assert_eq!(checked.fill, Color::from_hex("#27AE60").unwrap());
    let released = find(g, "Released");
    assert_eq!(released.shape, NodeShape::Ellipse);
    assert_eq!(released.size, kurbo::Size::new(140.0, 70.0));

    let e = g.find_edge(checked.id, released.id).unwrap();
    assert_eq!(g.edge(e).unwrap().path, PathKind::Elbow);
    let gates: Vec<&str> = g.gates_for(e).iter().map(|gate| gate.name.as_str()).collect();
    assert_eq!(gates, vec!["Checklist", "Lead approval"]);

    // Opposite directions are distinct transitions.
    let draft = find(g, "Draft");
    assert!(g.find_edge(draft.id, checked.id).is_some());
    assert!(g.find_edge(checked.id, draft.id).is_some());
}

#[test]
fn reexport_preserves_keys_and_gates() {
    let outcome = import(include_str!("fixtures/release_flow.json")).unwrap();
    let doc = export(&outcome.graph, &outcome.meta, "2026-03-03T00:00:00Z");

    let keys: Vec<&str> = doc.states.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, vec!["Draft", "Checked", "Released"]);
    let gated = doc
        .transitions
        .iter()
        .find(|t| t.to_state == "Released")
        .unwrap();
    assert_eq!(gated.gates.len(), 2);
    assert_eq!(gated.gates[1].required_approvals, 2);
    assert_eq!(gated.gates[1].approval_mode, ApprovalMode::All);
}
