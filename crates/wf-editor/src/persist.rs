//! External store boundary.
//!
//! The editor never talks to a database directly. The host implements
//! [`GraphStore`] for states, transitions and gates, [`CosmeticStore`] for
//! the serialized visual record, and [`NotificationSink`] for user-facing
//! failure messages, then feeds the sync outbox through [`write_through`].
//!
//! Writes are fire-and-forget from the editor's point of view: a failed op
//! is logged and reported, the in-memory document keeps the optimistic
//! change, and the remaining ops still run.

use crate::sync::PersistOp;
use thiserror::Error;
use wf_core::{EdgeId, Gate, GateId, ImportError, NodeId, StateNode, Transition, VisualLayout};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// Graph persistence, keyed by workflow id.
#[allow(async_fn_in_trait)]
pub trait GraphStore {
    async fn upsert_node(&self, workflow: &str, node: &StateNode) -> Result<(), StoreError>;
    async fn delete_node(&self, workflow: &str, id: NodeId) -> Result<(), StoreError>;
    async fn upsert_edge(&self, workflow: &str, edge: &Transition) -> Result<(), StoreError>;
    async fn delete_edge(&self, workflow: &str, id: EdgeId) -> Result<(), StoreError>;
    async fn upsert_gate(&self, workflow: &str, gate: &Gate) -> Result<(), StoreError>;
    async fn delete_gate(&self, workflow: &str, id: GateId) -> Result<(), StoreError>;
    /// Swap the whole stored graph of `workflow` (import).
    async fn replace_graph(
        &self,
        workflow: &str,
        nodes: &[StateNode],
        edges: &[Transition],
        gates: &[Gate],
    ) -> Result<(), StoreError>;
}

/// Storage for the serialized visual record, one JSON document per workflow.
#[allow(async_fn_in_trait)]
pub trait CosmeticStore {
    async fn load(&self, workflow: &str) -> Result<Option<String>, StoreError>;
    async fn save(&self, workflow: &str, json: &str) -> Result<(), StoreError>;
}

pub trait NotificationSink {
    fn notify(&self, message: &str);
}

/// Outcome of one [`write_through`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub applied: usize,
    pub failed: Vec<StoreError>,
}

impl WriteReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

async fn run_op<G: GraphStore, C: CosmeticStore>(
    workflow: &str,
    op: &PersistOp,
    graph: &G,
    cosmetic: &C,
) -> Result<(), StoreError> {
    match op {
        PersistOp::UpsertNode(n) => graph.upsert_node(workflow, n).await,
        PersistOp::DeleteNode(id) => graph.delete_node(workflow, *id).await,
        PersistOp::UpsertEdge(e) => graph.upsert_edge(workflow, e).await,
        PersistOp::DeleteEdge(id) => graph.delete_edge(workflow, *id).await,
        PersistOp::UpsertGate(g) => graph.upsert_gate(workflow, g).await,
        PersistOp::DeleteGate(id) => graph.delete_gate(workflow, *id).await,
        PersistOp::ReplaceGraph {
            nodes,
            edges,
            gates,
        } => graph.replace_graph(workflow, nodes, edges, gates).await,
        PersistOp::SaveVisual(json) => cosmetic.save(workflow, json).await,
    }
}

fn op_name(op: &PersistOp) -> &'static str {
    match op {
        PersistOp::UpsertNode(_) => "save state",
        PersistOp::DeleteNode(_) => "delete state",
        PersistOp::UpsertEdge(_) => "save transition",
        PersistOp::DeleteEdge(_) => "delete transition",
        PersistOp::UpsertGate(_) => "save gate",
        PersistOp::DeleteGate(_) => "delete gate",
        PersistOp::ReplaceGraph { .. } => "replace workflow",
        PersistOp::SaveVisual(_) => "save layout",
    }
}

/// Execute `ops` in order against the stores. Failures are logged and
/// reported through `sink`; nothing is rolled back.
pub async fn write_through<G, C, N>(
    workflow: &str,
    ops: &[PersistOp],
    graph: &G,
    cosmetic: &C,
    sink: &N,
) -> WriteReport
where
    G: GraphStore,
    C: CosmeticStore,
    N: NotificationSink,
{
    let mut report = WriteReport::default();
    for op in ops {
        match run_op(workflow, op, graph, cosmetic).await {
            Ok(()) => report.applied += 1,
            Err(e) => {
                log::warn!("{} failed for workflow `{workflow}`: {e}", op_name(op));
                sink.notify(&format!("Could not {}: {e}", op_name(op)));
                report.failed.push(e);
            }
        }
    }
    log::debug!(
        "write-through for `{workflow}`: {} applied, {} failed",
        report.applied,
        report.failed.len()
    );
    report
}

/// Errors from restoring the visual record.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decode(#[from] ImportError),
}

/// Load the stored visual record of `workflow`. A workflow with nothing
/// saved yet gets an empty record.
pub async fn load_visual<C: CosmeticStore>(
    workflow: &str,
    store: &C,
) -> Result<VisualLayout, LoadError> {
    match store.load(workflow).await? {
        Some(json) => Ok(VisualLayout::from_json(&json)?),
        None => Ok(VisualLayout::new()),
    }
}
