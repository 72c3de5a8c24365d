//! Pointer interaction state machine.
//!
//! Exactly one [`DragMode`] is active at a time; each variant carries the
//! data its gesture needs, including the values to restore on cancel.
//! A press starts a [`Gesture`]; nothing moves until the pointer has
//! travelled past the drag threshold, and the release then either commits
//! the drag or is treated as a click.
//!
//! Live drag frames are applied straight to the [`SyncEngine`] so the canvas
//! shows them, but only the release produces a [`Signal`] that the editor
//! records in history and flushes to the stores.

use crate::commands::{EdgeShape, HistoryEntry};
use crate::config::EditorConfig;
use crate::hit::{HitScene, HitTarget, ResizeHandle, label_position, node_at_padded};
use crate::snap::{Guide, snap_position};
use crate::sync::{GraphMutation, SyncEngine};
use crate::viewport::Viewport;
use kurbo::{Point, Rect, Vec2};
use wf_core::geometry::{encode_anchor, insertion_index};
use wf_core::routing::WaypointHandle;
use wf_core::{
    Anchor, EdgeId, EdgeVisual, Endpoint, LabelPlacement, NodeId, PathKind, Side, Transition,
};

/// What is selected on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Node(NodeId),
    Edge(EdgeId),
}

/// Click-to-connect mode: pick a source state, then a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectMode {
    #[default]
    Idle,
    PickSource,
    PickTarget(NodeId),
}

/// The active drag and its payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragMode {
    #[default]
    None,
    Pan {
        last: Point,
    },
    MoveNode {
        node: NodeId,
        start: Point,
        grab: Point,
    },
    ResizeNode {
        node: NodeId,
        handle: ResizeHandle,
        start: Rect,
        grab: Point,
    },
    ReconnectEdge {
        edge: EdgeId,
        end: Endpoint,
        before: EdgeShape,
        pointer: Point,
        target: Option<NodeId>,
    },
    DragWaypoint {
        edge: EdgeId,
        handle: WaypointHandle,
        /// `None` until an elbow default connector is materialised.
        index: Option<usize>,
        before: EdgeShape,
        /// Waypoint list the drag offsets from.
        base: Vec<Point>,
        grab: Point,
    },
    DragLabel {
        edge: EdgeId,
        before: EdgeShape,
        /// Label position when the drag started.
        origin: Point,
        /// Route midpoint the offset is measured from.
        default: Point,
        grab: Point,
    },
    CreateEdge {
        from: NodeId,
        side: Side,
        pointer: Point,
        target: Option<NodeId>,
    },
}

impl DragMode {
    pub fn is_active(&self) -> bool {
        !matches!(self, DragMode::None)
    }
}

/// Pointer travel since the press, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gesture {
    pub origin: Point,
    last: Point,
    pub travelled: f64,
    pub crossed: bool,
}

impl Gesture {
    pub fn new(origin: Point) -> Self {
        Self {
            origin,
            last: origin,
            travelled: 0.0,
            crossed: false,
        }
    }

    /// Accumulate travel; returns `true` on the move that crosses
    /// `threshold`.
    pub fn advance(&mut self, p: Point, threshold: f64) -> bool {
        self.travelled += self.last.distance(p);
        self.last = p;
        if !self.crossed && self.travelled > threshold {
            self.crossed = true;
            return true;
        }
        false
    }
}

/// Something the editor must act on after an input event.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// A drag finished; its effect is already applied. Record and flush.
    Record(HistoryEntry),
    /// Apply, record and flush.
    Execute(HistoryEntry),
    /// User-facing message (rejected action).
    Notice(String),
    /// Open the label editor for a transition.
    EditLabel(EdgeId),
    /// Open the property editor for a state.
    EditState(NodeId),
}

/// Borrowed editor state the state machine works against.
pub struct EditContext<'a> {
    pub sync: &'a mut SyncEngine,
    pub viewport: &'a mut Viewport,
    pub config: &'a EditorConfig,
}

/// Transient interaction state. Never persisted.
#[derive(Debug, Default)]
pub struct Interaction {
    pub drag: DragMode,
    gesture: Option<Gesture>,
    pub connect: ConnectMode,
    pub selection: Selection,
    /// State under the pointer; its connectors are shown.
    pub hovered: Option<NodeId>,
    pub hover: Option<HitTarget>,
    /// Item the floating toolbar is attached to.
    pub toolbar: Option<Selection>,
    pub guides: Vec<Guide>,
    /// Screen point of a release that committed a gesture. Swallows the
    /// double-click the same physical clicks produce; cleared once the
    /// pointer wanders off.
    release_consumed: Option<Point>,
    /// Whether the last press turned into a drag.
    last_press_dragged: bool,
}

fn edge_shape(sync: &SyncEngine, edge: EdgeId) -> Option<EdgeShape> {
    let t = sync.graph().edge(edge)?;
    Some(EdgeShape {
        from: t.from,
        to: t.to,
        visual: sync.visual().edge_visual(edge),
    })
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gesture(&self) -> Option<&Gesture> {
        self.gesture.as_ref()
    }

    fn scene<'a>(&self, ctx: &'a EditContext<'_>) -> HitScene<'a> {
        HitScene {
            graph: ctx.sync.graph(),
            visual: ctx.sync.visual(),
            selection: self.selection,
            hovered: self.hovered,
            config: ctx.config,
            zoom: ctx.viewport.zoom,
        }
    }

    /// Hit test at a screen position.
    pub fn hit(&self, ctx: &EditContext<'_>, screen: Point) -> Option<HitTarget> {
        let canvas = ctx.viewport.screen_to_canvas(screen);
        self.scene(ctx).hit_test(canvas)
    }

    // ─── Press ──────────────────────────────────────────────────────────

    pub fn pointer_down(&mut self, ctx: &mut EditContext<'_>, screen: Point, pan_only: bool) {
        self.guides.clear();
        let canvas = ctx.viewport.screen_to_canvas(screen);
        self.gesture = Some(Gesture::new(screen));
        if let Some(p) = self.release_consumed
            && p.distance(screen) > ctx.config.drag_threshold
        {
            self.release_consumed = None;
        }

        if pan_only {
            self.drag = DragMode::Pan { last: screen };
            return;
        }
        if self.connect != ConnectMode::Idle {
            // Connect mode resolves on release.
            self.drag = DragMode::None;
            return;
        }

        let hit = self.hit(ctx, screen);
        self.drag = match hit {
            Some(HitTarget::Resize { node, handle }) => match ctx.sync.graph().node(node) {
                Some(n) => DragMode::ResizeNode {
                    node,
                    handle,
                    start: n.bounds(),
                    grab: canvas,
                },
                None => DragMode::None,
            },
            Some(HitTarget::EdgeEndpoint { edge, end }) => match edge_shape(ctx.sync, edge) {
                Some(before) => DragMode::ReconnectEdge {
                    edge,
                    end,
                    before,
                    pointer: canvas,
                    target: None,
                },
                None => DragMode::None,
            },
            Some(HitTarget::Waypoint { edge, handle }) => match edge_shape(ctx.sync, edge) {
                Some(before) => DragMode::DragWaypoint {
                    edge,
                    handle,
                    index: handle.waypoint,
                    base: before.visual.waypoints.clone(),
                    before,
                    grab: canvas,
                },
                None => DragMode::None,
            },
            Some(HitTarget::Connector { node, side }) => DragMode::CreateEdge {
                from: node,
                side,
                pointer: canvas,
                target: None,
            },
            Some(HitTarget::Label { edge }) => {
                self.selection = Selection::Edge(edge);
                match (edge_shape(ctx.sync, edge), ctx.sync.route(edge)) {
                    (Some(before), Some(route)) => DragMode::DragLabel {
                        edge,
                        before,
                        origin: label_position(ctx.sync.visual(), edge, &route),
                        default: route.midpoint(),
                        grab: canvas,
                    },
                    _ => DragMode::None,
                }
            }
            Some(HitTarget::Node(node)) => {
                self.selection = Selection::Node(node);
                match ctx.sync.graph().node(node) {
                    Some(n) if n.flags.movable => DragMode::MoveNode {
                        node,
                        start: n.position,
                        grab: canvas,
                    },
                    _ => DragMode::None,
                }
            }
            Some(HitTarget::Edge(edge)) => {
                self.selection = Selection::Edge(edge);
                DragMode::None
            }
            None => DragMode::Pan { last: screen },
        };
        log::trace!("pointer down at {screen:?}: {:?}", self.drag);
    }

    // ─── Move ───────────────────────────────────────────────────────────

    pub fn pointer_move(&mut self, ctx: &mut EditContext<'_>, screen: Point, shift: bool) {
        let canvas = ctx.viewport.screen_to_canvas(screen);
        let Some(gesture) = self.gesture.as_mut() else {
            self.update_hover(ctx, screen);
            return;
        };
        let just_crossed = gesture.advance(screen, ctx.config.drag_threshold);
        if !gesture.crossed {
            return;
        }
        if just_crossed {
            self.toolbar = None;
            self.materialise_waypoint(ctx);
        }

        match &mut self.drag {
            DragMode::None => {}
            DragMode::Pan { last } => {
                ctx.viewport.pan_by(screen - *last);
                *last = screen;
            }
            DragMode::MoveNode { node, start, grab } => {
                let candidate = *start + (canvas - *grab);
                let threshold = ctx
                    .viewport
                    .to_canvas_len(ctx.sync.visual().snap.alignment_threshold);
                let snap = ctx.sync.visual().snap;
                let snapped = snap_position(ctx.sync.graph(), *node, candidate, &snap, threshold);
                self.guides = snapped.guides;
                live(ctx, GraphMutation::MoveNode {
                    id: *node,
                    to: snapped.position,
                });
            }
            DragMode::ResizeNode {
                node,
                handle,
                start,
                grab,
            } => {
                let d = canvas - *grab;
                let rect = handle.apply(*start, d.x, d.y);
                live(ctx, GraphMutation::ResizeNode {
                    id: *node,
                    position: rect.center(),
                    size: rect.size(),
                });
            }
            DragMode::ReconnectEdge {
                pointer, target, ..
            }
            | DragMode::CreateEdge {
                pointer, target, ..
            } => {
                *pointer = canvas;
                *target = node_at_padded(ctx.sync.graph(), canvas, ctx.config.hit_padding);
            }
            DragMode::DragWaypoint {
                edge,
                handle,
                index: Some(i),
                base,
                grab,
                ..
            } => {
                let mut waypoints = base.clone();
                let Some(original) = waypoints.get(*i).copied() else {
                    return;
                };
                let moved = original + (canvas - *grab);
                waypoints[*i] = handle.constrain(original, moved);
                live(ctx, GraphMutation::SetWaypoints {
                    edge: *edge,
                    waypoints,
                });
            }
            DragMode::DragWaypoint { index: None, .. } => {}
            DragMode::DragLabel {
                edge,
                origin,
                default,
                grab,
                ..
            } => {
                let at = *origin + (canvas - *grab);
                let placement = if shift {
                    LabelPlacement::Pinned(at)
                } else {
                    LabelPlacement::Offset(at - *default)
                };
                live(ctx, GraphMutation::SetLabel {
                    edge: *edge,
                    placement: Some(placement),
                });
            }
        }
    }

    /// First real movement of an elbow default connector: store its
    /// position as the edge's first waypoint so it can be dragged.
    fn materialise_waypoint(&mut self, ctx: &mut EditContext<'_>) {
        let DragMode::DragWaypoint {
            edge,
            handle,
            index,
            base,
            ..
        } = &mut self.drag
        else {
            return;
        };
        if index.is_some() {
            return;
        }
        *base = vec![handle.position];
        *index = Some(0);
        handle.waypoint = Some(0);
        live(ctx, GraphMutation::SetWaypoints {
            edge: *edge,
            waypoints: base.clone(),
        });
    }

    fn update_hover(&mut self, ctx: &EditContext<'_>, screen: Point) {
        if let Some(p) = self.release_consumed
            && p.distance(screen) > ctx.config.drag_threshold
        {
            self.release_consumed = None;
        }
        let hit = self.hit(ctx, screen);
        self.hover = hit;
        self.hovered = hit.and_then(|h| h.node());
    }

    // ─── Release ────────────────────────────────────────────────────────

    pub fn pointer_up(&mut self, ctx: &mut EditContext<'_>, screen: Point) -> Vec<Signal> {
        let canvas = ctx.viewport.screen_to_canvas(screen);
        let gesture = self.gesture.take();
        let drag = std::mem::take(&mut self.drag);
        self.guides.clear();
        let dragged = gesture.is_some_and(|g| g.crossed);
        self.last_press_dragged = dragged;

        if !dragged {
            return self.click(ctx, screen, drag);
        }

        let mut signals = Vec::new();
        match drag {
            DragMode::None | DragMode::Pan { .. } => {}
            DragMode::MoveNode { node, start, .. } => {
                if let Some(n) = ctx.sync.graph().node(node)
                    && n.position != start
                {
                    signals.push(Signal::Record(HistoryEntry::NodeMove {
                        id: node,
                        from: start,
                        to: n.position,
                    }));
                }
            }
            DragMode::ResizeNode { node, start, .. } => {
                if let Some(n) = ctx.sync.graph().node(node)
                    && n.bounds() != start
                {
                    signals.push(Signal::Record(HistoryEntry::NodeResize {
                        id: node,
                        from: start,
                        to: n.bounds(),
                    }));
                }
            }
            DragMode::ReconnectEdge {
                edge, end, before, ..
            } => {
                signals.extend(self.drop_endpoint(ctx, edge, end, before, canvas));
            }
            DragMode::DragWaypoint { edge, before, .. } | DragMode::DragLabel { edge, before, .. } => {
                if let Some(after) = edge_shape(ctx.sync, edge)
                    && after != before
                {
                    signals.push(Signal::Record(HistoryEntry::EdgeReshape {
                        id: edge,
                        before,
                        after,
                    }));
                }
            }
            DragMode::CreateEdge { from, .. } => {
                let target = node_at_padded(ctx.sync.graph(), canvas, ctx.config.hit_padding);
                match target {
                    Some(to) if to != from => {
                        signals.push(self.connect_states(ctx, from, to));
                    }
                    _ => log::debug!("edge creation cancelled"),
                }
            }
        }

        if signals
            .iter()
            .any(|s| matches!(s, Signal::Record(_) | Signal::Execute(_)))
        {
            self.release_consumed = Some(screen);
        } else {
            // Nothing committed: drop whatever the live frames dirtied.
            ctx.sync.discard_dirty();
        }
        signals
    }

    /// Drop a dragged endpoint. Empty space aborts; a valid state rebinds
    /// and stores the drop point as an anchor.
    fn drop_endpoint(
        &mut self,
        ctx: &mut EditContext<'_>,
        edge: EdgeId,
        end: Endpoint,
        before: EdgeShape,
        canvas: Point,
    ) -> Option<Signal> {
        let Some(node) = node_at_padded(ctx.sync.graph(), canvas, ctx.config.hit_padding) else {
            log::debug!("reconnect of {edge} aborted over empty space");
            return None;
        };
        let (from, to) = match end {
            Endpoint::Start => (node, before.to),
            Endpoint::End => (before.from, node),
        };
        if let Err(e) = ctx.sync.graph().validate_edge(from, to, Some(edge)) {
            return Some(Signal::Notice(e.to_string()));
        }
        let anchor: Anchor = {
            let n = ctx.sync.graph().node(node)?;
            encode_anchor(n.position, n.size, canvas)
        };
        if node != before.endpoint(end) {
            live(ctx, GraphMutation::RebindEdge { id: edge, end, node });
        }
        live(ctx, GraphMutation::SetAnchor {
            edge,
            end,
            anchor: Some(anchor),
        });
        let after = edge_shape(ctx.sync, edge)?;
        (after != before).then_some(Signal::Record(HistoryEntry::EdgeReshape {
            id: edge,
            before,
            after,
        }))
    }

    /// Build the new transition `from → to` with one seeded waypoint
    /// offset perpendicular from the midpoint.
    fn connect_states(&mut self, ctx: &EditContext<'_>, from: NodeId, to: NodeId) -> Signal {
        let graph = ctx.sync.graph();
        if let Err(e) = graph.validate_edge(from, to, None) {
            return Signal::Notice(e.to_string());
        }
        let (Some(a), Some(b)) = (graph.node(from), graph.node(to)) else {
            return Signal::Notice(format!("state `{from}` or `{to}` no longer exists"));
        };
        let mut edge = Transition::new(EdgeId::generate(), from, to);
        edge.path = ctx.config.default_path;
        let visual = EdgeVisual {
            waypoints: match edge.path {
                PathKind::Straight => Vec::new(),
                _ => vec![seed_waypoint(a.position, b.position, ctx.config.curve_offset)],
            },
            ..Default::default()
        };
        self.selection = Selection::Edge(edge.id);
        self.connect = ConnectMode::Idle;
        Signal::Execute(HistoryEntry::EdgeAdd {
            edge,
            gates: Vec::new(),
            visual,
        })
    }

    /// A press/release without crossing the threshold.
    fn click(&mut self, ctx: &mut EditContext<'_>, screen: Point, drag: DragMode) -> Vec<Signal> {
        ctx.sync.discard_dirty();

        if self.connect != ConnectMode::Idle {
            let node = self.hit(ctx, screen).and_then(|h| match h {
                HitTarget::Node(n) => Some(n),
                _ => None,
            });
            return match (self.connect, node) {
                (_, None) => {
                    log::debug!("connect mode left by clicking empty canvas");
                    self.connect = ConnectMode::Idle;
                    Vec::new()
                }
                (ConnectMode::PickSource, Some(n)) => {
                    self.connect = ConnectMode::PickTarget(n);
                    self.selection = Selection::Node(n);
                    Vec::new()
                }
                (ConnectMode::PickTarget(src), Some(n)) if n != src => {
                    let signal = self.connect_states(ctx, src, n);
                    if matches!(signal, Signal::Execute(_)) {
                        self.release_consumed = Some(screen);
                    }
                    vec![signal]
                }
                _ => Vec::new(),
            };
        }

        match drag {
            DragMode::Pan { .. } => {
                self.selection = Selection::None;
                self.toolbar = None;
            }
            DragMode::CreateEdge { from, .. } => {
                self.selection = Selection::Node(from);
                self.toolbar = Some(self.selection);
            }
            _ => {
                self.toolbar = match self.selection {
                    Selection::None => None,
                    s => Some(s),
                };
            }
        }
        Vec::new()
    }

    // ─── Double click ───────────────────────────────────────────────────

    pub fn double_click(&mut self, ctx: &mut EditContext<'_>, screen: Point) -> Vec<Signal> {
        if self.release_consumed.take().is_some() {
            log::trace!("double click swallowed by committed gesture");
            return Vec::new();
        }
        let canvas = ctx.viewport.screen_to_canvas(screen);
        match self.hit(ctx, screen) {
            Some(HitTarget::Waypoint { edge, handle }) => {
                let Some(i) = handle.waypoint else {
                    return Vec::new();
                };
                if self.last_press_dragged {
                    return Vec::new();
                }
                let Some(before) = edge_shape(ctx.sync, edge) else {
                    return Vec::new();
                };
                let mut waypoints = before.visual.waypoints.clone();
                if i < waypoints.len() {
                    waypoints.remove(i);
                }
                self.reshape(ctx, edge, before, waypoints)
            }
            Some(HitTarget::Label { edge }) => vec![Signal::EditLabel(edge)],
            Some(HitTarget::Node(node)) => vec![Signal::EditState(node)],
            Some(HitTarget::Edge(edge)) => {
                let (Some(t), Some(route), Some(before)) = (
                    ctx.sync.graph().edge(edge),
                    ctx.sync.route(edge),
                    edge_shape(ctx.sync, edge),
                ) else {
                    return Vec::new();
                };
                let mut waypoints = before.visual.waypoints.clone();
                match t.path {
                    PathKind::Straight => return vec![Signal::EditLabel(edge)],
                    PathKind::Spline => {
                        let i = insertion_index(
                            &waypoints,
                            route.start.point,
                            route.end.point,
                            canvas,
                        );
                        waypoints.insert(i, canvas);
                    }
                    PathKind::Elbow => {
                        let mixed = route.start.side.is_horizontal() != route.end.side.is_horizontal();
                        if mixed {
                            // One corner only.
                            waypoints = vec![canvas];
                        } else {
                            waypoints.push(canvas);
                        }
                    }
                }
                self.selection = Selection::Edge(edge);
                self.reshape(ctx, edge, before, waypoints)
            }
            _ => Vec::new(),
        }
    }

    fn reshape(
        &mut self,
        ctx: &mut EditContext<'_>,
        edge: EdgeId,
        before: EdgeShape,
        waypoints: Vec<Point>,
    ) -> Vec<Signal> {
        live(ctx, GraphMutation::SetWaypoints { edge, waypoints });
        match edge_shape(ctx.sync, edge) {
            Some(after) if after != before => vec![Signal::Record(HistoryEntry::EdgeReshape {
                id: edge,
                before,
                after,
            })],
            _ => Vec::new(),
        }
    }

    // ─── Connect mode & cancel ──────────────────────────────────────────

    pub fn start_connect(&mut self) {
        self.cancel_drag_state();
        self.connect = ConnectMode::PickSource;
        self.selection = Selection::None;
        self.toolbar = None;
    }

    /// Abort any drag (restoring live changes) and leave connect mode.
    pub fn cancel(&mut self, ctx: &mut EditContext<'_>) {
        let drag = std::mem::take(&mut self.drag);
        match drag {
            DragMode::MoveNode { node, start, .. } => {
                live(ctx, GraphMutation::MoveNode { id: node, to: start });
            }
            DragMode::ResizeNode { node, start, .. } => {
                live(ctx, GraphMutation::ResizeNode {
                    id: node,
                    position: start.center(),
                    size: start.size(),
                });
            }
            DragMode::DragWaypoint { edge, before, .. }
            | DragMode::DragLabel { edge, before, .. } => {
                live(ctx, GraphMutation::RestoreEdgeVisual {
                    edge,
                    visual: before.visual,
                });
            }
            DragMode::ReconnectEdge { .. }
            | DragMode::CreateEdge { .. }
            | DragMode::Pan { .. }
            | DragMode::None => {}
        }
        ctx.sync.discard_dirty();
        self.cancel_drag_state();
        self.connect = ConnectMode::Idle;
        log::debug!("interaction cancelled");
    }

    fn cancel_drag_state(&mut self) {
        self.drag = DragMode::None;
        self.gesture = None;
        self.guides.clear();
    }

    /// Forget everything that refers to the current document.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Line to draw for a pending reconnect or new transition: from the
    /// fixed end to the pointer.
    pub fn preview_line(&self, sync: &SyncEngine) -> Option<(Point, Point)> {
        match &self.drag {
            DragMode::CreateEdge {
                from,
                side,
                pointer,
                ..
            } => {
                let n = sync.graph().node(*from)?;
                let start = wf_core::geometry::decode_anchor(n.position, n.size, Anchor::center_of(*side));
                Some((start, *pointer))
            }
            DragMode::ReconnectEdge {
                edge, end, pointer, ..
            } => {
                let route = sync.route(*edge)?;
                let fixed = match end {
                    Endpoint::Start => route.end.point,
                    Endpoint::End => route.start.point,
                };
                Some((fixed, *pointer))
            }
            _ => None,
        }
    }
}

/// Apply a live frame. A rejected frame is logged and skipped; the gesture
/// goes on.
fn live(ctx: &mut EditContext<'_>, mutation: GraphMutation) {
    if let Err(e) = ctx.sync.apply_mutation(mutation) {
        log::warn!("live update rejected: {e}");
    }
}

/// Waypoint for a new transition: the midpoint of the two centers pushed
/// `offset` to the left of the travel direction.
pub fn seed_waypoint(from: Point, to: Point, offset: f64) -> Point {
    let mid = from.midpoint(to);
    let d = to - from;
    let len = d.hypot();
    if len < 1e-9 {
        return mid;
    }
    mid + Vec2::new(d.y, -d.x) / len * offset
}
