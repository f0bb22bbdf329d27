//! The host-facing engine.
//!
//! [`CanvasEngine`] owns a working clone of the controller's pipeline tree,
//! the viewport, the renderer arena and the current gesture. Live gesture
//! feedback (dragging, resizing, comment auto-grow) mutates only the clone;
//! when a gesture completes the engine dispatches one edit command and takes
//! a fresh clone from the controller.
//!
//! Pointer and keyboard entry points live in [`crate::interaction`].

use std::collections::HashSet;

use log::{LevelFilter, debug, info, warn};

use flowcanvas_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
    model::CanvasInfo,
    ports::layout_canvas,
    routing::rubber_band_path,
    text::{TextMeasure, wrap_lines},
};

use crate::{
    CanvasError,
    config::AppConfig,
    controller::{CanvasController, EditCommand, TipType},
    drop::parse_drop,
    export::svg::{Svg, SvgBuilder},
    interaction::{InteractionMode, SnapBack},
    renderer::{RenderContext, RenderScope},
    scene::{BackToParentItem, EditorItem, RegionItem, RubberBandItem, Scene, SceneDiff, SceneItem},
    supernode::RendererArena,
    viewport::{Transform, Viewport},
};

const DEFAULT_VIEWPORT_WIDTH: f32 = 800.0;
const DEFAULT_VIEWPORT_HEIGHT: f32 = 600.0;
const BACK_TO_PARENT_WIDTH: f32 = 130.0;
const BACK_TO_PARENT_MARGIN: f32 = 10.0;
const BACK_TO_PARENT_LABEL: &str = "Back to parent";

/// How much of the arena a redraw touches.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Redraw {
    Full,
    /// Only `ids` of `pipeline_id` moved.
    Moved(Id, Vec<Id>),
    Selection,
}

/// A pipeline displayed full page before drilling into a supernode.
#[derive(Debug, Clone, Copy)]
struct Breadcrumb {
    pipeline_id: Id,
    transform: Transform,
}

/// Inline comment editor as the host should display it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEditorView {
    pub comment_id: Id,
    /// Editor rectangle in screen pixels.
    pub bounds: Bounds,
    /// Font scale matching the current zoom.
    pub scale: f32,
    pub text: String,
    pub pending: bool,
}

/// Rendering and direct-manipulation engine for one canvas.
pub struct CanvasEngine<C: CanvasController> {
    pub(crate) controller: C,
    pub(crate) config: AppConfig,
    pub(crate) canvas: CanvasInfo,
    pub(crate) root: Id,
    pub(crate) viewport: Viewport,
    pub(crate) arena: RendererArena,
    pub(crate) mode: InteractionMode,
    pub(crate) snap_back: Option<SnapBack>,
    pub(crate) hovered: Option<(Id, TipType)>,
    pub(crate) measure: Box<dyn TextMeasure>,
    breadcrumbs: Vec<Breadcrumb>,
}

impl<C: CanvasController> CanvasEngine<C> {
    /// Creates an engine over the controller's pipeline tree and renders the
    /// primary pipeline.
    pub fn new(controller: C, config: AppConfig) -> Result<Self, CanvasError> {
        config.validate()?;
        let canvas = controller.canvas_info().clone();
        let root = canvas.primary_pipeline;
        if canvas.pipeline(root).is_none() {
            return Err(CanvasError::Config(format!("Primary pipeline `{root}` is missing")));
        }
        info!(pipeline_id:% = root, pipelines = canvas.pipelines.len(); "Creating canvas engine");

        let measure = config.style().text_measure().map_err(CanvasError::Config)?;
        let viewport = Viewport::new(
            config.viewport().clone(),
            Size::new(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT),
        );
        let mut engine = Self {
            controller,
            config,
            canvas,
            root,
            viewport,
            arena: RendererArena::new(),
            mode: InteractionMode::Idle,
            snap_back: None,
            hovered: None,
            measure,
            breadcrumbs: Vec::new(),
        };
        engine.redraw(Redraw::Full);
        Ok(engine)
    }

    /// Replaces the text measurer used for label truncation and wrapping,
    /// until the next [`set_config`](Self::set_config).
    pub fn with_measure(mut self, measure: Box<dyn TextMeasure>) -> Self {
        self.measure = measure;
        self.redraw(Redraw::Full);
        self
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Applies a new configuration and redraws from the controller.
    pub fn set_config(&mut self, config: AppConfig) -> Result<(), CanvasError> {
        config.validate()?;
        self.measure = config.style().text_measure().map_err(CanvasError::Config)?;
        self.viewport.set_config(config.viewport().clone());
        self.config = config;
        info!("Configuration updated");
        self.refresh_from_controller();
        Ok(())
    }

    /// Sets the process-wide log level.
    pub fn set_log_level(&self, level: LevelFilter) {
        log::set_max_level(level);
        info!(level:%; "Log level changed");
    }

    /// The working clone of the pipeline tree.
    pub fn canvas(&self) -> &CanvasInfo {
        &self.canvas
    }

    /// Pipeline displayed at the top level.
    pub fn root_pipeline(&self) -> Id {
        self.root
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn arena(&self) -> &RendererArena {
        &self.arena
    }

    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    pub fn scene(&self, pipeline_id: Id) -> Option<&Scene> {
        self.arena.record(pipeline_id).map(|r| r.renderer().scene())
    }

    /// Scene changes made by the last frame of `pipeline_id`.
    pub fn last_diff(&self, pipeline_id: Id) -> Option<&SceneDiff> {
        self.arena.record(pipeline_id).map(|r| r.renderer().last_diff())
    }

    /// The hovered object and its tip type, when tips of that type are
    /// enabled.
    pub fn hover_tip(&self) -> Option<(Id, TipType)> {
        self.hovered
            .filter(|(_, tip)| !self.controller.is_tip_showing() && self.controller.is_tip_enabled(*tip))
    }

    pub fn text_editor(&self) -> Option<TextEditorView> {
        let InteractionMode::EditingCommentText(state) = &self.mode else {
            return None;
        };
        let transform = self.arena.record(state.pipeline_id)?.screen_transform();
        Some(TextEditorView {
            comment_id: state.comment_id,
            bounds: transform.apply_bounds(state.bounds),
            scale: transform.k(),
            text: state.text.clone(),
            pending: state.pending,
        })
    }

    // ====================================================================
    // Viewport
    // ====================================================================

    /// Updates the viewport after the host container was resized.
    pub fn refresh_on_size_change(&mut self, size: Size) {
        self.viewport.set_size(size);
        if let Some(content) = self.root_content_bounds() {
            self.viewport.clamp_translation(content);
        }
        self.refresh_transforms();
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.refresh_transforms();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.refresh_transforms();
    }

    /// Scales and centers the displayed pipeline's non-binding nodes and
    /// comments in the viewport.
    pub fn zoom_to_fit(&mut self) {
        self.viewport.zoom_to_fit(self.root_content_bounds());
        debug!(k = self.viewport.transform().k(); "Zoomed to fit");
        self.refresh_transforms();
    }

    /// Zooms around a screen point for a wheel gesture. Negative `delta_y`
    /// zooms in.
    pub fn wheel(&mut self, position: Point, delta_y: f32) {
        if delta_y == 0.0 {
            return;
        }
        let ratio = self.config.viewport().zoom_ratio();
        let ratio = if delta_y < 0.0 { ratio } else { 1.0 / ratio };
        self.viewport.zoom_at(position, ratio);
        self.refresh_transforms();
    }

    /// Content coordinates of the visible area's top-left corner.
    pub fn svg_viewport_offset(&self) -> Point {
        self.viewport.svg_viewport_offset()
    }

    pub(crate) fn root_content_bounds(&self) -> Option<Bounds> {
        self.canvas.pipeline(self.root).and_then(|p| p.content_bounds())
    }

    pub(crate) fn refresh_transforms(&mut self) {
        self.arena.update_transforms(self.viewport.transform());
        self.update_overlays();
    }

    // ====================================================================
    // Host commands
    // ====================================================================

    /// Handles a drop of external data at a screen position.
    pub fn node_dropped(&mut self, raw: &str, x: f32, y: f32) {
        let screen = Point::new(x, y);
        let pipeline_id = self.arena.pipeline_at(screen).unwrap_or(self.root);
        let position = self
            .content_point(pipeline_id, screen)
            .unwrap_or_else(|| self.viewport.to_content(screen));
        let parsed = parse_drop(raw);
        info!(operation:% = parsed.operation(), pipeline_id:%; "Object dropped on canvas");
        self.emit(parsed.into_command(pipeline_id, position));
    }

    /// Expands or collapses a supernode in place.
    pub fn set_supernode_expanded(&mut self, pipeline_id: Id, node_id: Id, expanded: bool) {
        self.emit(EditCommand::SetSupernodeExpanded {
            pipeline_id,
            node_id,
            expanded,
        });
    }

    /// Advances the snap-back animation. Returns `true` while it runs.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        let Some(snap_back) = self.snap_back.as_mut() else {
            return false;
        };
        if snap_back.advance(now_ms) {
            debug!("Snap-back finished");
            self.snap_back = None;
        }
        self.update_overlays();
        self.snap_back.is_some()
    }

    /// Displays the pipeline of `supernode_id` full page, fitted to the
    /// viewport. Returns `false` when the supernode or its pipeline is
    /// missing.
    pub fn display_full_page(&mut self, supernode_id: Id) -> bool {
        self.finish_text_edit();
        let target = self.arena.display_order().iter().find_map(|pid| {
            self.canvas
                .pipeline(*pid)?
                .node(supernode_id)
                .filter(|n| n.is_supernode())?
                .subflow_pipeline()
        });
        let Some(target) = target else {
            warn!(supernode_id:%; "Cannot display a missing supernode full page");
            return false;
        };
        if self.canvas.pipeline(target).is_none() {
            warn!(supernode_id:%, pipeline_id:% = target; "Supernode references a missing pipeline");
            return false;
        }

        info!(pipeline_id:% = target; "Displaying pipeline full page");
        self.breadcrumbs.push(Breadcrumb {
            pipeline_id: self.root,
            transform: self.viewport.transform(),
        });
        self.root = target;
        self.mode = InteractionMode::Idle;
        self.snap_back = None;
        self.redraw(Redraw::Full);
        self.zoom_to_fit();
        true
    }

    /// Returns from full-page display to the previous pipeline. Returns
    /// `false` at the top level.
    pub fn display_parent(&mut self) -> bool {
        self.finish_text_edit();
        let Some(crumb) = self.breadcrumbs.pop() else {
            return false;
        };
        info!(pipeline_id:% = crumb.pipeline_id; "Returning to parent pipeline");
        self.root = crumb.pipeline_id;
        self.mode = InteractionMode::Idle;
        self.snap_back = None;
        self.viewport.set_transform(crumb.transform);
        self.redraw(Redraw::Full);
        true
    }

    pub fn is_full_page(&self) -> bool {
        !self.breadcrumbs.is_empty()
    }

    /// Discards the working clone and redraws from the controller's tree.
    pub fn refresh_from_controller(&mut self) {
        self.canvas = self.controller.canvas_info().clone();
        if self.canvas.pipeline(self.root).is_none() {
            warn!(pipeline_id:% = self.root; "Displayed pipeline disappeared, showing the primary pipeline");
            self.root = self.canvas.primary_pipeline;
            self.breadcrumbs.clear();
        }
        self.breadcrumbs.retain(|c| self.canvas.pipeline(c.pipeline_id).is_some());
        if let Some((id, _)) = self.hovered {
            if !self.canvas.pipelines.iter().any(|p| p.contains_object(id)) {
                self.hovered = None;
            }
        }
        self.redraw(Redraw::Full);
    }

    /// Renders the current frame as an SVG document.
    pub fn render_svg(&self) -> Result<String, CanvasError> {
        let doc = SvgBuilder::new(&self.arena, &self.viewport)
            .with_style(self.config.style())?
            .build()?;
        Ok(doc.to_string())
    }

    /// Renders the current frame and writes it to `file_name`.
    pub fn export_svg(&self, file_name: &str) -> Result<(), CanvasError> {
        let doc = SvgBuilder::new(&self.arena, &self.viewport)
            .with_style(self.config.style())?
            .build()?;
        Svg::new(file_name).write_document(&doc)?;
        Ok(())
    }

    // ====================================================================
    // Frame
    // ====================================================================

    pub(crate) fn emit(&mut self, command: EditCommand) {
        debug!(command = command.name(); "Dispatching edit command");
        self.controller.dispatch(command);
        self.refresh_from_controller();
    }

    /// Maps a screen point into the content coordinates of `pipeline_id`.
    pub(crate) fn content_point(&self, pipeline_id: Id, screen: Point) -> Option<Point> {
        self.arena
            .record(pipeline_id)
            .map(|r| r.screen_transform().invert(screen))
    }

    pub(crate) fn back_to_parent_bounds(&self) -> Bounds {
        Bounds::new_from_top_left(
            Point::new(BACK_TO_PARENT_MARGIN, BACK_TO_PARENT_MARGIN),
            Size::new(BACK_TO_PARENT_WIDTH, self.config.layout().back_to_parent_height),
        )
    }

    pub(crate) fn redraw(&mut self, redraw: Redraw) {
        let layout = self.config.layout();
        // Selection and hover frames leave geometry untouched.
        if !matches!(redraw, Redraw::Selection) {
            layout_canvas(&mut self.canvas, layout);
            self.arena.sync(&mut self.canvas, self.root, layout);
        }
        self.arena.update_transforms(self.viewport.transform());

        let selection = self.controller.selection();
        let selected: HashSet<Id> = selection.map(|s| s.ids().iter().copied().collect()).unwrap_or_default();
        let selection_pipeline = selection.map(|s| s.pipeline_id());
        let none = HashSet::new();
        let hovered = self.hovered.map(|(id, _)| id);
        let comment_links = self.config.interaction().comment_links();

        let order = self.arena.display_order().to_vec();
        for pipeline_id in order {
            let ctx = RenderContext {
                canvas: &self.canvas,
                layout,
                measure: self.measure.as_ref(),
                selected: if selection_pipeline == Some(pipeline_id) {
                    &selected
                } else {
                    &none
                },
                hovered,
                comment_links,
            };
            let Some(record) = self.arena.record_mut(pipeline_id) else {
                continue;
            };
            let renderer = record.renderer_mut();
            match &redraw {
                Redraw::Full => {
                    renderer.display_canvas(&ctx, RenderScope::Full);
                }
                Redraw::Moved(moved_pipeline, ids) if *moved_pipeline == pipeline_id => {
                    renderer.display_canvas(&ctx, RenderScope::Transforms(ids));
                }
                Redraw::Moved(..) => renderer.skip_frame(),
                Redraw::Selection => {
                    renderer.display_canvas(&ctx, RenderScope::Selection);
                }
            }
        }
        self.update_overlays();
    }

    /// Rebuilds gesture overlays: rubber band, region, editor and the
    /// back-to-parent affordance.
    pub(crate) fn update_overlays(&mut self) {
        let layout = self.config.layout();
        let mut overlays: Vec<(Id, Id, SceneItem)> = Vec::new();

        match &self.mode {
            InteractionMode::RegionSelecting(state) => overlays.push((
                state.pipeline_id,
                Id::new("region"),
                SceneItem::Region(RegionItem {
                    bounds: Bounds::from_corners(state.start, state.current),
                }),
            )),
            InteractionMode::DrawingNewLink(state) => overlays.push((
                state.pipeline_id,
                Id::new("rubber-band"),
                SceneItem::RubberBand(RubberBandItem {
                    path: rubber_band_path(state.start, state.pointer, layout),
                }),
            )),
            InteractionMode::EditingCommentText(state) => {
                if let Some(record) = self.arena.record(state.pipeline_id) {
                    let transform = record.screen_transform();
                    let padding = layout.comment_padding;
                    overlays.push((
                        state.pipeline_id,
                        Id::new("comment-editor"),
                        SceneItem::EditorBox(EditorItem {
                            bounds: transform.apply_bounds(state.bounds),
                            lines: wrap_lines(&state.text, state.bounds.width() - 2.0 * padding, self.measure.as_ref()),
                            scale: transform.k(),
                        }),
                    ));
                }
            }
            _ => {}
        }

        if let Some(snap_back) = &self.snap_back {
            overlays.push((
                snap_back.pipeline_id(),
                Id::new("rubber-band"),
                SceneItem::RubberBand(RubberBandItem {
                    path: rubber_band_path(snap_back.origin(), snap_back.pointer(), layout),
                }),
            ));
        }

        if !self.breadcrumbs.is_empty() {
            overlays.push((
                self.root,
                Id::new("back-to-parent"),
                SceneItem::BackToParent(BackToParentItem {
                    bounds: self.back_to_parent_bounds(),
                    label: BACK_TO_PARENT_LABEL.to_string(),
                }),
            ));
        }

        let order = self.arena.display_order().to_vec();
        for pipeline_id in order {
            let items: Vec<(Id, SceneItem)> = overlays
                .iter()
                .filter(|(pid, _, _)| *pid == pipeline_id)
                .map(|(_, id, item)| (*id, item.clone()))
                .collect();
            if let Some(record) = self.arena.record_mut(pipeline_id) {
                record.renderer_mut().set_overlays(items);
            }
        }
    }
}
