//! Editor facade.
//!
//! [`WorkflowEditor`] owns one workflow's document and every piece of
//! transient editor state. Hosts feed it [`InputEvent`]s or call commands
//! directly, render from the read accessors, and drain three queues after
//! each call: persistence ops, user notices, and editor requests (open the
//! label or state editor).

use crate::clipboard::{Clipboard, ClipboardItem};
use crate::commands::{History, HistoryEntry};
use crate::config::EditorConfig;
use crate::error::EditError;
use crate::hit::HitTarget;
use crate::input::{InputEvent, PointerButton};
use crate::interaction::{EditContext, Interaction, Selection, Signal};
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use crate::snap::Guide;
use crate::sync::{GraphMutation, PersistOp, SyncEngine};
use crate::viewport::Viewport;
use kurbo::{Point, Size};
use wf_core::exchange::{self, ImportWarning, WorkflowMeta};
use wf_core::routing::EdgeRoute;
use wf_core::{EdgeId, GraphError, NodeId, SnapSettings, StateNode, VisualLayout, WorkflowGraph};

/// Something the host UI must open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRequest {
    Label(EdgeId),
    State(NodeId),
}

pub struct WorkflowEditor {
    sync: SyncEngine,
    history: History,
    interaction: Interaction,
    viewport: Viewport,
    clipboard: Clipboard,
    config: EditorConfig,
    meta: WorkflowMeta,
    /// Screen point keyboard zoom pivots around.
    screen_center: Point,
    notices: Vec<String>,
    requests: Vec<EditRequest>,
}

impl WorkflowEditor {
    pub fn new(workflow: impl Into<String>, config: EditorConfig) -> Self {
        Self::with_document(workflow, WorkflowGraph::new(), VisualLayout::new(), config)
    }

    /// Open an already-persisted document.
    pub fn with_document(
        workflow: impl Into<String>,
        graph: WorkflowGraph,
        visual: VisualLayout,
        config: EditorConfig,
    ) -> Self {
        Self {
            sync: SyncEngine::with_document(workflow, graph, visual),
            history: History::new(config.history_depth),
            interaction: Interaction::new(),
            viewport: Viewport::new(config.min_zoom, config.max_zoom),
            clipboard: Clipboard::new(),
            meta: WorkflowMeta::default(),
            screen_center: Point::ZERO,
            notices: Vec::new(),
            requests: Vec::new(),
            config,
        }
    }

    // ─── Read access ────────────────────────────────────────────────────

    pub fn graph(&self) -> &WorkflowGraph {
        self.sync.graph()
    }

    pub fn visual(&self) -> &VisualLayout {
        self.sync.visual()
    }

    pub fn route(&self, edge: EdgeId) -> Option<EdgeRoute> {
        self.sync.route(edge)
    }

    pub fn selection(&self) -> Selection {
        self.interaction.selection
    }

    pub fn select(&mut self, selection: Selection) {
        self.interaction.selection = selection;
        self.interaction.toolbar = None;
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn hover(&self) -> Option<HitTarget> {
        self.interaction.hover
    }

    pub fn guides(&self) -> &[Guide] {
        &self.interaction.guides
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn meta(&self) -> &WorkflowMeta {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: WorkflowMeta) {
        self.meta = meta;
    }

    /// Canvas element size in screen pixels; keyboard zoom pivots on its
    /// center.
    pub fn set_screen_size(&mut self, size: Size) {
        self.screen_center = Point::new(size.width / 2.0, size.height / 2.0);
    }

    // ─── Queues ─────────────────────────────────────────────────────────

    pub fn drain_outbox(&mut self) -> Vec<PersistOp> {
        self.sync.drain_outbox()
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn take_requests(&mut self) -> Vec<EditRequest> {
        std::mem::take(&mut self.requests)
    }

    // ─── Input ──────────────────────────────────────────────────────────

    /// Process one input event.
    pub fn handle_input(&mut self, event: InputEvent) {
        match &event {
            &InputEvent::Wheel { x, y, delta } => {
                let step = self.config.wheel_zoom_step;
                let factor = if delta < 0.0 { step } else { 1.0 / step };
                self.viewport.zoom_by(Point::new(x, y), factor);
                return;
            }
            InputEvent::Key { key, modifiers } => {
                if let Some(action) = ShortcutMap::resolve(
                    key,
                    modifiers.ctrl,
                    modifiers.shift,
                    modifiers.alt,
                    modifiers.meta,
                ) {
                    self.run_action(action);
                }
                return;
            }
            _ => {}
        }

        let mut ctx = EditContext {
            sync: &mut self.sync,
            viewport: &mut self.viewport,
            config: &self.config,
        };
        let signals = match event {
            InputEvent::PointerDown { x, y, button, .. } => {
                let pan_only = button != PointerButton::Primary;
                self.interaction
                    .pointer_down(&mut ctx, Point::new(x, y), pan_only);
                Vec::new()
            }
            InputEvent::PointerMove { x, y, modifiers } => {
                self.interaction
                    .pointer_move(&mut ctx, Point::new(x, y), modifiers.shift);
                Vec::new()
            }
            InputEvent::PointerUp { x, y, .. } => {
                self.interaction.pointer_up(&mut ctx, Point::new(x, y))
            }
            InputEvent::DoubleClick { x, y } => {
                self.interaction.double_click(&mut ctx, Point::new(x, y))
            }
            InputEvent::Cancel => {
                self.interaction.cancel(&mut ctx);
                Vec::new()
            }
            InputEvent::Wheel { .. } | InputEvent::Key { .. } => Vec::new(),
        };
        self.dispatch(signals);
    }

    /// Run a shortcut action. Refusals become notices.
    pub fn run_action(&mut self, action: ShortcutAction) {
        log::debug!("shortcut {action:?}");
        let result = match action {
            ShortcutAction::Undo => self.undo().map(drop),
            ShortcutAction::Redo => self.redo().map(drop),
            ShortcutAction::Copy => self.copy(),
            ShortcutAction::Cut => self.cut(),
            ShortcutAction::Paste => self.paste().map(drop),
            ShortcutAction::Duplicate => self.duplicate().map(drop),
            ShortcutAction::Delete => self.delete_selection(),
            ShortcutAction::Cancel => {
                self.cancel();
                Ok(())
            }
            ShortcutAction::ConnectMode => {
                self.enter_connect_mode();
                Ok(())
            }
            ShortcutAction::AddState => self.add_state("New state").map(drop),
            ShortcutAction::ZoomIn => {
                self.viewport
                    .zoom_by(self.screen_center, self.config.wheel_zoom_step);
                Ok(())
            }
            ShortcutAction::ZoomOut => {
                self.viewport
                    .zoom_by(self.screen_center, 1.0 / self.config.wheel_zoom_step);
                Ok(())
            }
            ShortcutAction::ZoomReset => {
                self.viewport.reset();
                Ok(())
            }
        };
        if let Err(e) = result {
            self.notice(e.to_string());
        }
    }

    fn dispatch(&mut self, signals: Vec<Signal>) {
        for signal in signals {
            match signal {
                Signal::Record(entry) => {
                    self.history.record(entry);
                    self.sync.flush();
                }
                Signal::Execute(entry) => {
                    if let Err(e) = self.execute(entry) {
                        self.notice(e.to_string());
                    }
                }
                Signal::Notice(message) => self.notice(message),
                Signal::EditLabel(edge) => self.requests.push(EditRequest::Label(edge)),
                Signal::EditState(node) => self.requests.push(EditRequest::State(node)),
            }
        }
    }

    fn notice(&mut self, message: String) {
        log::info!("notice: {message}");
        self.notices.push(message);
    }

    /// Apply, record and flush one entry. A refused entry leaves nothing
    /// dirty.
    fn execute(&mut self, entry: HistoryEntry) -> Result<(), EditError> {
        self.abort_drag();
        match self.history.execute(&mut self.sync, entry) {
            Ok(()) => {
                self.sync.flush();
                Ok(())
            }
            Err(e) => {
                self.sync.discard_dirty();
                Err(e)
            }
        }
    }

    /// Drop a selection whose target no longer exists.
    fn prune_selection(&mut self) {
        let graph = self.sync.graph();
        let alive = match self.interaction.selection {
            Selection::None => true,
            Selection::Node(id) => graph.contains_node(id),
            Selection::Edge(id) => graph.edge(id).is_some(),
        };
        if !alive {
            self.select(Selection::None);
        }
    }

    // ─── Commands ───────────────────────────────────────────────────────

    /// Add a state at the next cascade position and select it.
    pub fn add_state(&mut self, label: &str) -> Result<NodeId, EditError> {
        self.abort_drag();
        let position = self
            .sync
            .graph()
            .next_node_position(self.config.cascade_offset);
        let node = StateNode::new(NodeId::generate(), label, position);
        let id = node.id;
        self.execute(HistoryEntry::NodeAdd { node })?;
        self.select(Selection::Node(id));
        Ok(id)
    }

    pub fn delete_selection(&mut self) -> Result<(), EditError> {
        match self.interaction.selection {
            Selection::None => Err(EditError::NothingSelected),
            Selection::Node(id) => self.delete_node(id),
            Selection::Edge(id) => self.delete_edge(id),
        }
    }

    /// Delete a state. Refused while transitions still reference it or the
    /// state is locked.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), EditError> {
        self.abort_drag();
        let node = self
            .sync
            .graph()
            .node(id)
            .cloned()
            .ok_or(GraphError::UnknownNode(id))?;
        self.execute(HistoryEntry::NodeDelete { node })?;
        self.prune_selection();
        Ok(())
    }

    /// Delete a transition with its gates and cosmetic state.
    pub fn delete_edge(&mut self, id: EdgeId) -> Result<(), EditError> {
        self.abort_drag();
        let graph = self.sync.graph();
        let edge = graph.edge(id).cloned().ok_or(GraphError::UnknownEdge(id))?;
        let gates = graph.gates_for(id).into_iter().cloned().collect();
        let visual = self.sync.visual().edge_visual(id);
        self.execute(HistoryEntry::EdgeDelete {
            edge,
            gates,
            visual,
        })?;
        self.prune_selection();
        Ok(())
    }

    pub fn undo(&mut self) -> Result<&'static str, EditError> {
        self.cancel();
        let result = self.history.undo(&mut self.sync);
        self.settle(result)
    }

    pub fn redo(&mut self) -> Result<&'static str, EditError> {
        self.cancel();
        let result = self.history.redo(&mut self.sync);
        self.settle(result)
    }

    fn settle(
        &mut self,
        result: Result<&'static str, EditError>,
    ) -> Result<&'static str, EditError> {
        match result {
            Ok(_) => self.sync.flush(),
            Err(_) => self.sync.discard_dirty(),
        }
        self.prune_selection();
        result
    }

    pub fn copy(&mut self) -> Result<(), EditError> {
        self.abort_drag();
        self.clipboard
            .copy(self.sync.graph(), self.sync.visual(), self.interaction.selection)
    }

    pub fn cut(&mut self) -> Result<(), EditError> {
        self.copy()?;
        self.delete_selection()
    }

    /// Paste the clipboard and select the pasted item.
    pub fn paste(&mut self) -> Result<Selection, EditError> {
        self.abort_drag();
        let entry = self
            .clipboard
            .paste(self.sync.graph(), self.config.paste_offset)?;
        self.insert(entry)
    }

    /// Copy + paste of the selection without touching the clipboard.
    pub fn duplicate(&mut self) -> Result<Selection, EditError> {
        self.abort_drag();
        let item = ClipboardItem::capture(
            self.sync.graph(),
            self.sync.visual(),
            self.interaction.selection,
        )?;
        let entry = item.paste_entry(self.sync.graph(), self.config.paste_offset)?;
        self.insert(entry)
    }

    fn insert(&mut self, entry: HistoryEntry) -> Result<Selection, EditError> {
        let selection = match &entry {
            HistoryEntry::NodeAdd { node } => Selection::Node(node.id),
            HistoryEntry::EdgeAdd { edge, .. } => Selection::Edge(edge.id),
            _ => Selection::None,
        };
        self.execute(entry)?;
        self.select(selection);
        Ok(selection)
    }

    pub fn enter_connect_mode(&mut self) {
        self.interaction.start_connect();
    }

    /// Abort any drag, restoring live changes, and leave connect mode.
    pub fn cancel(&mut self) {
        let mut ctx = EditContext {
            sync: &mut self.sync,
            viewport: &mut self.viewport,
            config: &self.config,
        };
        self.interaction.cancel(&mut ctx);
    }

    /// Revert a drag still in flight so its live frames never reach a
    /// flush. Connect mode is left alone.
    fn abort_drag(&mut self) {
        if !self.interaction.drag.is_active() {
            return;
        }
        let connect = self.interaction.connect;
        self.cancel();
        self.interaction.connect = connect;
    }

    pub fn set_snap_settings(&mut self, settings: SnapSettings) {
        self.abort_drag();
        if let Err(e) = self.sync.apply_mutation(GraphMutation::SetSnap(settings)) {
            self.notice(e.to_string());
            return;
        }
        self.sync.flush();
    }

    // ─── Exchange ───────────────────────────────────────────────────────

    /// Replace the whole workflow from an export document. History and
    /// cosmetic state are cleared; skipped items are returned as warnings.
    pub fn import_json(&mut self, json: &str) -> Result<Vec<ImportWarning>, EditError> {
        let outcome = exchange::import(json)?;
        self.cancel();
        self.sync
            .apply_mutation(GraphMutation::ReplaceGraph(Box::new(outcome.graph)))?;
        self.sync.flush();
        self.history.clear();
        self.interaction.reset();
        self.meta = outcome.meta;
        for w in &outcome.warnings {
            log::warn!("import: {w}");
        }
        log::debug!(
            "imported {} state(s), {} transition(s)",
            self.sync.graph().node_count(),
            self.sync.graph().edge_count()
        );
        Ok(outcome.warnings)
    }

    pub fn export_json(&self, exported_at: &str) -> Result<String, serde_json::Error> {
        exchange::export_json(self.sync.graph(), &self.meta, exported_at)
    }
}
