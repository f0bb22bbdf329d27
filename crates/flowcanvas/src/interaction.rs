//! Gesture state machine.
//!
//! Exactly one [`InteractionMode`] is active at a time. Each mode carries the
//! payload of its gesture, and every transition goes through one of the
//! pointer or keyboard entry points on [`CanvasEngine`]:
//!
//! | From | Event | To |
//! |------|-------|----|
//! | `Idle` | down on canvas | `Panning` |
//! | `Idle` | shift + down on canvas | `RegionSelecting` |
//! | `Idle` | down on a node or comment | `DraggingObjects` |
//! | `Idle` | down on a resize handle | `ResizingNode` / `ResizingComment` |
//! | `Idle` | down on an output port, halo or comment connector | `DrawingNewLink` |
//! | `Idle` | double click on a comment | `EditingCommentText` |
//! | any gesture | up | `Idle` |
//! | `EditingCommentText` | blur, commit key or pointer down | `Idle` |
//!
//! A completed gesture emits at most one edit command. Keyboard shortcuts
//! are only honored in `Idle`.

use std::f64::consts::TAU;

use log::debug;

use flowcanvas_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
    model::LinkKind,
    routing::{halo_anchor, source_port_anchor},
    text::wrap_lines,
};

use crate::{
    controller::{CanvasController, EditCommand, TipType},
    engine::{CanvasEngine, Redraw},
    renderer::{HitContext, HitTarget, comment_connector, hit_test},
    resize::{ResizeDirection, proportional_position, resized_bounds},
    viewport::Transform,
};

// ====================================================================
// Modes
// ====================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PanState {
    pub start_screen: Point,
    pub start_translation: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub pipeline_id: Id,
    pub ids: Vec<Id>,
    /// Pointer position at gesture start, in content coordinates.
    pub start: Point,
    /// Offset applied so far.
    pub offset: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResizeState {
    pub pipeline_id: Id,
    pub object_id: Id,
    pub direction: ResizeDirection,
    pub start_pointer: Point,
    pub start_bounds: Bounds,
    pub current: Bounds,
    /// Sibling nodes inside the resized supernode, with their start bounds.
    pub contained: Vec<(Id, Bounds)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionState {
    pub pipeline_id: Id,
    pub start: Point,
    pub current: Point,
    /// Viewport transform restored when the gesture ends.
    pub saved_transform: Transform,
}

/// Where a new link starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkSource {
    Port { node_id: Id, port_id: Id },
    Halo { node_id: Id },
    Comment { comment_id: Id },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLinkState {
    pub pipeline_id: Id,
    pub source: LinkSource,
    pub start: Point,
    pub pointer: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextEditState {
    pub pipeline_id: Id,
    pub comment_id: Id,
    pub original: String,
    pub text: String,
    pub original_bounds: Bounds,
    /// Comment bounds, grown to fit the text.
    pub bounds: Bounds,
    pub pending: bool,
}

/// The active gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    Panning(PanState),
    DraggingObjects(DragState),
    ResizingNode(ResizeState),
    ResizingComment(ResizeState),
    RegionSelecting(RegionState),
    DrawingNewLink(NewLinkState),
    EditingCommentText(TextEditState),
}

/// Discriminant of [`InteractionMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Idle,
    Panning,
    DraggingObjects,
    ResizingNode,
    ResizingComment,
    RegionSelecting,
    DrawingNewLink,
    EditingCommentText,
}

impl ModeKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Panning => "panning",
            Self::DraggingObjects => "draggingObjects",
            Self::ResizingNode => "resizingNode",
            Self::ResizingComment => "resizingComment",
            Self::RegionSelecting => "regionSelecting",
            Self::DrawingNewLink => "drawingNewLink",
            Self::EditingCommentText => "editingCommentText",
        }
    }
}

impl InteractionMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Idle => ModeKind::Idle,
            Self::Panning(_) => ModeKind::Panning,
            Self::DraggingObjects(_) => ModeKind::DraggingObjects,
            Self::ResizingNode(_) => ModeKind::ResizingNode,
            Self::ResizingComment(_) => ModeKind::ResizingComment,
            Self::RegionSelecting(_) => ModeKind::RegionSelecting,
            Self::DrawingNewLink(_) => ModeKind::DrawingNewLink,
            Self::EditingCommentText(_) => ModeKind::EditingCommentText,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

// ====================================================================
// Snap-back animation
// ====================================================================

/// Elastic return of an abandoned rubber band to its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapBack {
    pipeline_id: Id,
    origin: Point,
    from: Point,
    duration_ms: f64,
    started_at: Option<f64>,
    progress: f64,
}

impl SnapBack {
    pub fn new(pipeline_id: Id, origin: Point, from: Point, duration_ms: f64) -> Self {
        Self {
            pipeline_id,
            origin,
            from,
            duration_ms,
            started_at: None,
            progress: 0.0,
        }
    }

    pub fn pipeline_id(&self) -> Id {
        self.pipeline_id
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Current rubber band end point.
    pub fn pointer(&self) -> Point {
        let eased = elastic_out(self.progress) as f32;
        self.from.add_point(self.origin.sub_point(self.from).scale(eased))
    }

    /// Moves the animation to `now_ms`. The first call starts the clock.
    /// Returns `true` once finished.
    pub fn advance(&mut self, now_ms: f64) -> bool {
        let started = *self.started_at.get_or_insert(now_ms);
        self.progress = if self.duration_ms <= 0.0 {
            1.0
        } else {
            ((now_ms - started) / self.duration_ms).clamp(0.0, 1.0)
        };
        self.progress >= 1.0
    }
}

/// Elastic ease-out with amplitude 1 and period 0.3.
fn elastic_out(t: f64) -> f64 {
    const PERIOD: f64 = 0.3;
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let shift = PERIOD / 4.0;
    2f64.powf(-10.0 * t) * ((t - shift) * TAU / PERIOD).sin() + 1.0
}

// ====================================================================
// Events
// ====================================================================

/// Pointer event in screen pixels relative to the canvas surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerEvent {
    pub position: Point,
    pub shift: bool,
    pub ctrl: bool,
}

impl PointerEvent {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Point::new(x, y),
            ..Self::default()
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    Enter,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            shift: false,
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// Result of locating a screen point.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Located {
    pipeline_id: Id,
    point: Point,
    target: HitTarget,
}

// ====================================================================
// Transitions
// ====================================================================

impl<C: CanvasController> CanvasEngine<C> {
    /// Finds the target under a screen point, searching the deepest nested
    /// pipeline first. Empty space inside a nested area belongs to the
    /// parent.
    fn locate(&self, screen: Point) -> Option<Located> {
        let mut pipeline_id = self.arena.pipeline_at(screen)?;
        loop {
            let record = self.arena.record(pipeline_id)?;
            let pipeline = self.canvas.pipeline(pipeline_id)?;
            let transform = record.screen_transform();
            let point = transform.invert(screen);
            let ctx = HitContext {
                pipeline,
                layout: self.config.layout(),
                scene: record.renderer().scene(),
                scale: transform.k(),
                link_tolerance: self.config.interaction().link_hit_tolerance(),
                comment_links: self.config.interaction().comment_links(),
            };
            let target = hit_test(&ctx, point);
            match (target, record.parent()) {
                (HitTarget::Canvas, Some(parent)) => pipeline_id = parent,
                _ => {
                    return Some(Located {
                        pipeline_id,
                        point,
                        target,
                    });
                }
            }
        }
    }

    fn set_mode(&mut self, mode: InteractionMode) {
        if self.mode.kind() != mode.kind() {
            debug!(from = self.mode.kind().name(), to = mode.kind().name(); "Gesture mode changed");
        }
        self.mode = mode;
    }

    fn selected_in(&self, pipeline_id: Id) -> Vec<Id> {
        self.controller
            .selection()
            .filter(|s| s.pipeline_id() == pipeline_id)
            .map(|s| s.ids().to_vec())
            .unwrap_or_default()
    }

    fn select(&mut self, ids: Vec<Id>, pipeline_id: Id) {
        debug!(pipeline_id:%, count = ids.len(); "Selection changed");
        self.controller.set_selections(ids, pipeline_id);
        self.redraw(Redraw::Selection);
    }

    /// Handles a pointer press.
    pub fn pointer_down(&mut self, event: PointerEvent) {
        if self.snap_back.take().is_some() {
            debug!("Snap-back cancelled by new gesture");
            self.update_overlays();
        }
        if matches!(self.mode, InteractionMode::EditingCommentText(_)) {
            self.finish_text_edit();
        }
        if !self.mode.is_idle() {
            return;
        }
        self.viewport.reset_move_gate();

        let screen = event.position;
        if self.is_full_page() && self.back_to_parent_bounds().contains_point(screen) {
            self.display_parent();
            return;
        }
        let Some(located) = self.locate(screen) else {
            return;
        };
        let Located {
            pipeline_id,
            point,
            target,
        } = located;

        match target {
            HitTarget::ResizeHandle {
                object_id,
                direction,
                is_comment,
            } => self.begin_resize(pipeline_id, object_id, direction, is_comment, point),
            HitTarget::OutputPort { node_id, port_id } => {
                let start = self
                    .canvas
                    .pipeline(pipeline_id)
                    .and_then(|p| p.node(node_id))
                    .map(|node| source_port_anchor(node, Some(port_id), self.config.layout()));
                if let Some(start) = start {
                    self.begin_new_link(pipeline_id, LinkSource::Port { node_id, port_id }, start, point);
                }
            }
            HitTarget::Halo { node_id } => {
                let start = self
                    .canvas
                    .pipeline(pipeline_id)
                    .and_then(|p| p.node(node_id))
                    .map(|node| halo_anchor(node.bounds(), point, self.config.layout()));
                if let Some(start) = start {
                    self.begin_new_link(pipeline_id, LinkSource::Halo { node_id }, start, point);
                }
            }
            HitTarget::CommentConnector { comment_id } => {
                let start = self
                    .canvas
                    .pipeline(pipeline_id)
                    .and_then(|p| p.comment(comment_id))
                    .map(|comment| comment_connector(comment, self.config.layout()).center());
                if let Some(start) = start {
                    self.begin_new_link(pipeline_id, LinkSource::Comment { comment_id }, start, point);
                }
            }
            HitTarget::Node { node_id } | HitTarget::InputPort { node_id, .. } => {
                self.press_object(pipeline_id, node_id, point, event.ctrl);
            }
            HitTarget::Comment { comment_id } => self.press_object(pipeline_id, comment_id, point, event.ctrl),
            HitTarget::Link { link_id } => {
                let ids = self.toggled_selection(pipeline_id, link_id, event.ctrl);
                self.select(ids, pipeline_id);
            }
            HitTarget::Canvas if event.shift => {
                self.set_mode(InteractionMode::RegionSelecting(RegionState {
                    pipeline_id,
                    start: point,
                    current: point,
                    saved_transform: self.viewport.transform(),
                }));
                self.update_overlays();
            }
            HitTarget::Canvas => {
                if !event.ctrl && !self.selected_in(pipeline_id).is_empty() {
                    self.select(Vec::new(), pipeline_id);
                }
                self.set_mode(InteractionMode::Panning(PanState {
                    start_screen: screen,
                    start_translation: self.viewport.transform().translation(),
                }));
            }
        }
    }

    fn toggled_selection(&self, pipeline_id: Id, id: Id, ctrl: bool) -> Vec<Id> {
        let mut ids = self.selected_in(pipeline_id);
        if !ctrl {
            return vec![id];
        }
        match ids.iter().position(|s| *s == id) {
            Some(idx) => {
                ids.remove(idx);
            }
            None => ids.push(id),
        }
        ids
    }

    fn press_object(&mut self, pipeline_id: Id, id: Id, point: Point, ctrl: bool) {
        let already_selected = self.selected_in(pipeline_id).contains(&id);
        if ctrl || !already_selected {
            let ids = self.toggled_selection(pipeline_id, id, ctrl);
            self.select(ids, pipeline_id);
        }
        if !self.selected_in(pipeline_id).contains(&id) {
            return;
        }

        let Some(pipeline) = self.canvas.pipeline(pipeline_id) else {
            return;
        };
        let ids: Vec<Id> = self
            .selected_in(pipeline_id)
            .into_iter()
            .filter(|id| {
                pipeline.node(*id).is_some_and(|n| !n.is_binding()) || pipeline.comment(*id).is_some()
            })
            .collect();
        if ids.is_empty() {
            return;
        }
        self.set_mode(InteractionMode::DraggingObjects(DragState {
            pipeline_id,
            ids,
            start: point,
            offset: Point::default(),
        }));
    }

    fn begin_resize(
        &mut self,
        pipeline_id: Id,
        object_id: Id,
        direction: ResizeDirection,
        is_comment: bool,
        point: Point,
    ) {
        let Some(pipeline) = self.canvas.pipeline(pipeline_id) else {
            return;
        };
        let Some(start_bounds) = pipeline.object_bounds(object_id) else {
            return;
        };
        let contained = if is_comment {
            Vec::new()
        } else {
            pipeline
                .nodes
                .iter()
                .filter(|n| n.id != object_id && start_bounds.contains(&n.bounds()))
                .map(|n| (n.id, n.bounds()))
                .collect()
        };
        let state = ResizeState {
            pipeline_id,
            object_id,
            direction,
            start_pointer: point,
            start_bounds,
            current: start_bounds,
            contained,
        };
        self.set_mode(if is_comment {
            InteractionMode::ResizingComment(state)
        } else {
            InteractionMode::ResizingNode(state)
        });
    }

    fn begin_new_link(&mut self, pipeline_id: Id, source: LinkSource, start: Point, pointer: Point) {
        self.set_mode(InteractionMode::DrawingNewLink(NewLinkState {
            pipeline_id,
            source,
            start,
            pointer,
        }));
        self.update_overlays();
    }

    /// Handles pointer movement.
    pub fn pointer_move(&mut self, event: PointerEvent) {
        let screen = event.position;
        match self.mode.kind() {
            ModeKind::Idle => self.track_hover(screen),
            ModeKind::Panning => {
                if !self.viewport.accept_move(screen) {
                    return;
                }
                let InteractionMode::Panning(state) = &self.mode else {
                    return;
                };
                let translation = state.start_translation.add_point(screen.sub_point(state.start_screen));
                let content = self.root_content_bounds();
                self.viewport.pan_to(translation, content);
                self.refresh_transforms();
            }
            ModeKind::DraggingObjects => {
                if self.viewport.accept_move(screen) {
                    self.drag_to(screen);
                }
            }
            ModeKind::ResizingNode | ModeKind::ResizingComment => self.resize_to(screen),
            ModeKind::RegionSelecting => {
                let InteractionMode::RegionSelecting(state) = &self.mode else {
                    return;
                };
                let Some(point) = self.content_point(state.pipeline_id, screen) else {
                    return;
                };
                if let InteractionMode::RegionSelecting(state) = &mut self.mode {
                    state.current = point;
                }
                self.update_overlays();
            }
            ModeKind::DrawingNewLink => {
                let InteractionMode::DrawingNewLink(state) = &self.mode else {
                    return;
                };
                let Some(point) = self.content_point(state.pipeline_id, screen) else {
                    return;
                };
                if let InteractionMode::DrawingNewLink(state) = &mut self.mode {
                    state.pointer = point;
                }
                self.update_overlays();
            }
            ModeKind::EditingCommentText => {}
        }
    }

    fn track_hover(&mut self, screen: Point) {
        if self.controller.is_tip_showing() {
            return;
        }
        let hovered = self.locate(screen).and_then(|located| match located.target {
            HitTarget::Node { node_id } => Some((node_id, TipType::Node)),
            HitTarget::OutputPort { port_id, .. } | HitTarget::InputPort { port_id, .. } => {
                Some((port_id, TipType::Port))
            }
            HitTarget::Comment { comment_id } => Some((comment_id, TipType::Comment)),
            HitTarget::Link { link_id } => Some((link_id, TipType::Link)),
            _ => None,
        });
        if hovered != self.hovered {
            self.hovered = hovered;
            self.redraw(Redraw::Selection);
        }
    }

    fn drag_to(&mut self, screen: Point) {
        let InteractionMode::DraggingObjects(state) = &self.mode else {
            return;
        };
        let Some(point) = self.content_point(state.pipeline_id, screen) else {
            return;
        };
        let offset = point.sub_point(state.start);
        let step = offset.sub_point(state.offset);
        if step.is_zero() {
            return;
        }
        let pipeline_id = state.pipeline_id;
        let ids = state.ids.clone();
        if let Some(pipeline) = self.canvas.pipeline_mut(pipeline_id) {
            pipeline.move_objects(&ids, step);
        }
        if let InteractionMode::DraggingObjects(state) = &mut self.mode {
            state.offset = offset;
        }
        self.redraw(Redraw::Moved(pipeline_id, ids));
    }

    fn resize_to(&mut self, screen: Point) {
        let (state, is_comment) = match &self.mode {
            InteractionMode::ResizingNode(state) => (state, false),
            InteractionMode::ResizingComment(state) => (state, true),
            _ => return,
        };
        let Some(point) = self.content_point(state.pipeline_id, screen) else {
            return;
        };
        let layout = self.config.layout();
        let min = if is_comment {
            layout.min_comment_size()
        } else {
            layout.min_supernode_size()
        };
        let delta = point.sub_point(state.start_pointer);
        let Some(bounds) = resized_bounds(state.start_bounds, state.direction, delta, min) else {
            debug!(object_id:% = state.object_id, direction:% = state.direction; "Resize below minimum rejected");
            return;
        };
        if bounds == state.current {
            return;
        }

        let pipeline_id = state.pipeline_id;
        let object_id = state.object_id;
        let moved: Vec<(Id, Point)> = state
            .contained
            .iter()
            .map(|(id, child)| (*id, proportional_position(state.start_bounds, bounds, *child)))
            .collect();
        if let Some(pipeline) = self.canvas.pipeline_mut(pipeline_id) {
            pipeline.set_object_bounds(object_id, bounds);
            for (id, position) in moved {
                if let Some(node) = pipeline.node_mut(id) {
                    node.x_pos = position.x();
                    node.y_pos = position.y();
                }
            }
        }
        if let InteractionMode::ResizingNode(state) | InteractionMode::ResizingComment(state) = &mut self.mode {
            state.current = bounds;
        }
        self.redraw(Redraw::Full);
    }

    /// Handles a pointer release, completing the active gesture.
    pub fn pointer_up(&mut self, event: PointerEvent) {
        let screen = event.position;
        match self.mode.kind() {
            ModeKind::Idle | ModeKind::EditingCommentText => {}
            ModeKind::Panning => self.set_mode(InteractionMode::Idle),
            ModeKind::DraggingObjects => {
                self.drag_to(screen);
                if let InteractionMode::DraggingObjects(state) = std::mem::take(&mut self.mode) {
                    debug!(from = ModeKind::DraggingObjects.name(), to = ModeKind::Idle.name(); "Gesture mode changed");
                    if state.offset.is_zero() {
                        self.redraw(Redraw::Full);
                    } else {
                        self.emit(EditCommand::MoveObjects {
                            pipeline_id: state.pipeline_id,
                            ids: state.ids,
                            offset: state.offset,
                        });
                    }
                }
            }
            ModeKind::ResizingNode | ModeKind::ResizingComment => {
                self.resize_to(screen);
                self.finish_resize();
            }
            ModeKind::RegionSelecting => self.finish_region_select(screen),
            ModeKind::DrawingNewLink => self.finish_new_link(screen),
        }
    }

    fn finish_resize(&mut self) {
        let (state, is_comment) = match std::mem::take(&mut self.mode) {
            InteractionMode::ResizingNode(state) => (state, false),
            InteractionMode::ResizingComment(state) => (state, true),
            other => {
                self.mode = other;
                return;
            }
        };
        debug!(object_id:% = state.object_id; "Resize finished");
        if state.current == state.start_bounds {
            self.redraw(Redraw::Full);
            return;
        }

        if is_comment {
            let content = self
                .canvas
                .pipeline(state.pipeline_id)
                .and_then(|p| p.comment(state.object_id))
                .map(|c| c.content.clone())
                .unwrap_or_default();
            self.emit(EditCommand::EditComment {
                pipeline_id: state.pipeline_id,
                id: state.object_id,
                content,
                bounds: Some(state.current),
            });
            return;
        }

        let mut objects = vec![(state.object_id, state.current)];
        if let Some(pipeline) = self.canvas.pipeline(state.pipeline_id) {
            for (id, start) in &state.contained {
                if let Some(node) = pipeline.node(*id) {
                    let bounds = node.bounds();
                    if bounds != *start {
                        objects.push((*id, bounds));
                    }
                }
            }
        }
        self.emit(EditCommand::ResizeObjects {
            pipeline_id: state.pipeline_id,
            objects,
        });
    }

    fn finish_region_select(&mut self, screen: Point) {
        let InteractionMode::RegionSelecting(mut state) = std::mem::take(&mut self.mode) else {
            return;
        };
        if let Some(point) = self.content_point(state.pipeline_id, screen) {
            state.current = point;
        }
        let region = Bounds::from_corners(state.start, state.current);
        let ids = self
            .canvas
            .pipeline(state.pipeline_id)
            .map(|pipeline| {
                let mut ids: Vec<Id> = pipeline
                    .nodes
                    .iter()
                    .filter(|n| !n.is_binding() && n.bounds().intersects(&region))
                    .map(|n| n.id)
                    .chain(
                        pipeline
                            .comments
                            .iter()
                            .filter(|c| c.bounds().intersects(&region))
                            .map(|c| c.id),
                    )
                    .collect();
                let links: Vec<Id> = pipeline
                    .links
                    .iter()
                    .filter(|l| ids.contains(&l.src_node_id) && ids.contains(&l.trg_node_id))
                    .map(|l| l.id)
                    .collect();
                ids.extend(links);
                ids
            })
            .unwrap_or_default();

        debug!(count = ids.len(); "Region select finished");
        self.viewport.set_transform(state.saved_transform);
        self.arena.update_transforms(self.viewport.transform());
        self.select(ids, state.pipeline_id);
    }

    fn finish_new_link(&mut self, screen: Point) {
        let InteractionMode::DrawingNewLink(state) = std::mem::take(&mut self.mode) else {
            return;
        };
        let command = self.link_command(&state, screen);
        match command {
            Some(command) => self.emit(command),
            None => {
                let pointer = self.content_point(state.pipeline_id, screen).unwrap_or(state.pointer);
                debug!(pipeline_id:% = state.pipeline_id; "New link released on no target, snapping back");
                self.snap_back = Some(SnapBack::new(
                    state.pipeline_id,
                    state.start,
                    pointer,
                    self.config.interaction().snap_back_duration_ms(),
                ));
                self.update_overlays();
            }
        }
    }

    /// Command completing a new link released at `screen`, if the target is
    /// valid.
    fn link_command(&self, state: &NewLinkState, screen: Point) -> Option<EditCommand> {
        let located = self.locate(screen)?;
        if located.pipeline_id != state.pipeline_id {
            return None;
        }
        let (trg_node_id, trg_port_id) = match located.target {
            HitTarget::Node { node_id } | HitTarget::Halo { node_id } => (node_id, None),
            HitTarget::InputPort { node_id, port_id } => (node_id, Some(port_id)),
            _ => return None,
        };
        let pipeline = self.canvas.pipeline(state.pipeline_id)?;
        let target = pipeline.node(trg_node_id)?;

        match state.source {
            LinkSource::Comment { comment_id } => Some(EditCommand::LinkComment {
                pipeline_id: state.pipeline_id,
                comment_id,
                node_id: trg_node_id,
            }),
            LinkSource::Port { node_id, port_id } => {
                if node_id == trg_node_id && !self.config.interaction().self_referencing_links() {
                    return None;
                }
                let trg_port_id = trg_port_id.or_else(|| target.input_ports.first().map(|p| p.id))?;
                Some(EditCommand::LinkNodes {
                    pipeline_id: state.pipeline_id,
                    kind: LinkKind::NodeLink,
                    src_node_id: node_id,
                    src_port_id: Some(port_id),
                    trg_node_id,
                    trg_port_id: Some(trg_port_id),
                })
            }
            LinkSource::Halo { node_id } => {
                if node_id == trg_node_id && !self.config.interaction().self_referencing_links() {
                    return None;
                }
                Some(EditCommand::LinkNodes {
                    pipeline_id: state.pipeline_id,
                    kind: LinkKind::NodeLink,
                    src_node_id: node_id,
                    src_port_id: None,
                    trg_node_id,
                    trg_port_id: None,
                })
            }
        }
    }

    /// Handles a double click: edits a comment, or shows a supernode's
    /// pipeline full page.
    pub fn double_click(&mut self, event: PointerEvent) {
        if !self.mode.is_idle() {
            return;
        }
        let Some(located) = self.locate(event.position) else {
            return;
        };
        match located.target {
            HitTarget::Comment { comment_id } => {
                if located.pipeline_id != self.root {
                    debug!(comment_id:%; "Comment editing suppressed inside a nested pipeline");
                    return;
                }
                let Some(comment) = self.canvas.pipeline(located.pipeline_id).and_then(|p| p.comment(comment_id))
                else {
                    return;
                };
                let bounds = comment.bounds();
                let state = TextEditState {
                    pipeline_id: located.pipeline_id,
                    comment_id,
                    original: comment.content.clone(),
                    text: comment.content.clone(),
                    original_bounds: bounds,
                    bounds,
                    pending: false,
                };
                self.set_mode(InteractionMode::EditingCommentText(state));
                self.update_overlays();
            }
            HitTarget::Node { node_id } => {
                let is_supernode = self
                    .canvas
                    .pipeline(located.pipeline_id)
                    .and_then(|p| p.node(node_id))
                    .is_some_and(|n| n.is_supernode());
                if is_supernode {
                    self.display_full_page(node_id);
                }
            }
            _ => {}
        }
    }

    // ====================================================================
    // Keyboard and text editing
    // ====================================================================

    /// Handles a key press. Returns `true` when the engine consumed it.
    pub fn key_down(&mut self, event: KeyEvent) -> bool {
        if matches!(self.mode, InteractionMode::EditingCommentText(_)) {
            return self.edit_key(event);
        }
        if !self.mode.is_idle() {
            debug!(mode = self.mode.kind().name(); "Shortcut ignored during gesture");
            return false;
        }

        let pipeline_id = self.active_pipeline();
        let command = match (event.key, event.ctrl) {
            (Key::Delete | Key::Backspace, false) => EditCommand::DeleteSelectedObjects,
            (Key::Char('z'), true) if event.shift => EditCommand::Redo,
            (Key::Char('z'), true) => EditCommand::Undo,
            (Key::Char('y'), true) => EditCommand::Redo,
            (Key::Char('a'), true) => EditCommand::SelectAll { pipeline_id },
            (Key::Char('x'), true) => EditCommand::Cut,
            (Key::Char('c'), true) => EditCommand::Copy,
            (Key::Char('v'), true) => EditCommand::Paste {
                pipeline_id,
                position: None,
            },
            (Key::Escape, _) => {
                self.select(Vec::new(), pipeline_id);
                return true;
            }
            _ => return false,
        };
        self.emit(command);
        true
    }

    /// Pipeline targeted by keyboard shortcuts: the one holding the current
    /// selection when it is displayed, the root pipeline otherwise.
    fn active_pipeline(&self) -> Id {
        self.controller
            .selection()
            .map(|selection| selection.pipeline_id())
            .filter(|pipeline_id| self.arena.record(*pipeline_id).is_some_and(|r| r.is_visible()))
            .unwrap_or(self.root)
    }

    /// Inserts text into the comment being edited.
    pub fn text_input(&mut self, text: &str) {
        if let InteractionMode::EditingCommentText(state) = &mut self.mode {
            state.text.push_str(text);
            state.pending = true;
            self.apply_text_edit();
        }
    }

    /// Commits the comment being edited, as when the editor loses focus.
    pub fn blur(&mut self) {
        self.finish_text_edit();
    }

    fn edit_key(&mut self, event: KeyEvent) -> bool {
        let InteractionMode::EditingCommentText(state) = &mut self.mode else {
            return false;
        };
        match (event.key, event.ctrl) {
            (Key::Escape, _) => {
                self.cancel_text_edit();
                return true;
            }
            (Key::Enter, true) => {
                self.finish_text_edit();
                return true;
            }
            (Key::Enter, false) => state.text.push('\n'),
            (Key::Backspace, _) => {
                state.text.pop();
            }
            (Key::Char(c), false) => state.text.push(c),
            // Editor shortcuts belong to the text widget.
            _ => return true,
        }
        state.pending = true;
        self.apply_text_edit();
        true
    }

    /// Grows the edited comment to fit its text and mirrors it into the
    /// working clone.
    fn apply_text_edit(&mut self) {
        let layout = self.config.layout();
        let InteractionMode::EditingCommentText(state) = &mut self.mode else {
            return;
        };
        let padding = layout.comment_padding;
        let lines = wrap_lines(&state.text, state.bounds.width() - 2.0 * padding, self.measure.as_ref());
        let needed = lines.len() as f32 * layout.comment_line_height + 2.0 * padding;
        if needed > state.bounds.height() {
            state.bounds = Bounds::new_from_top_left(state.bounds.min_point(), Size::new(state.bounds.width(), needed));
        }

        let (pipeline_id, comment_id, bounds) = (state.pipeline_id, state.comment_id, state.bounds);
        let text = state.text.clone();
        if let Some(pipeline) = self.canvas.pipeline_mut(pipeline_id) {
            if let Some(comment) = pipeline.comment_mut(comment_id) {
                comment.content = text;
            }
            pipeline.set_object_bounds(comment_id, bounds);
        }
        self.redraw(Redraw::Full);
    }

    fn cancel_text_edit(&mut self) {
        if let InteractionMode::EditingCommentText(state) = std::mem::take(&mut self.mode) {
            debug!(comment_id:% = state.comment_id; "Comment edit cancelled");
            self.refresh_from_controller();
        }
    }

    /// Ends comment editing, emitting one edit command when the text or size
    /// changed.
    pub(crate) fn finish_text_edit(&mut self) {
        let InteractionMode::EditingCommentText(state) = std::mem::take(&mut self.mode) else {
            return;
        };
        let changed = state.text != state.original || state.bounds != state.original_bounds;
        if !(state.pending && changed) {
            self.update_overlays();
            return;
        }
        let grown = state.bounds != state.original_bounds;
        self.emit(EditCommand::EditComment {
            pipeline_id: state.pipeline_id,
            id: state.comment_id,
            content: state.text,
            bounds: grown.then_some(state.bounds),
        });
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    #[test]
    fn test_elastic_out_endpoints() {
        assert_eq!(elastic_out(0.0), 0.0);
        assert_eq!(elastic_out(1.0), 1.0);
        // Overshoots before settling.
        assert!((0..100).map(|i| elastic_out(f64::from(i) / 100.0)).any(|v| v > 1.0));
    }

    #[test]
    fn test_snap_back_runs_to_origin() {
        let mut snap = SnapBack::new(Id::new("p"), Point::new(0.0, 0.0), Point::new(100.0, 0.0), 500.0);
        assert_eq!(snap.pointer(), Point::new(100.0, 0.0));
        assert!(!snap.advance(1000.0));
        assert!(!snap.advance(1250.0));
        assert!(snap.advance(1500.0));
        assert_approx_eq!(f32, snap.pointer().x(), 0.0, epsilon = 0.0001);
    }

    #[test]
    fn test_mode_kinds() {
        assert_eq!(InteractionMode::default().kind(), ModeKind::Idle);
        let mode = InteractionMode::Panning(PanState {
            start_screen: Point::default(),
            start_translation: Point::default(),
        });
        assert_eq!(mode.kind().name(), "panning");
        assert!(!mode.is_idle());
    }
}
