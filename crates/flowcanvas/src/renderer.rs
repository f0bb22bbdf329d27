//! Per-pipeline scene renderer and hit testing.
//!
//! A [`SceneRenderer`] turns one pipeline of the (cloned) canvas into scene
//! items and reconciles them against its previous frame. The
//! [`RenderScope`] chosen by the engine from the gesture state decides how
//! much work a frame does:
//!
//! - [`RenderScope::Full`] rebuilds comments, then nodes, then links
//! - [`RenderScope::Transforms`] only moves the given objects and rebuilds
//!   the links touching them
//! - [`RenderScope::Selection`] only toggles selection and hover flags
//!
//! Links whose endpoints do not resolve are logged and left out of the scene.

use std::collections::HashSet;

use log::{trace, warn};

use flowcanvas_core::{
    geometry::{Bounds, Insets, Point, Size},
    identifier::Id,
    layout::CanvasLayout,
    model::{CanvasInfo, Comment, DecorationPosition, Link, Node, Pipeline, Port},
    ports::port_offset,
    routing::route_link,
    text::{TextMeasure, truncate_label, wrap_lines},
};

use crate::{
    resize::ResizeDirection,
    scene::{
        CommentItem, DecorationShape, ImageShape, ItemKind, LinkItem, MessageIndicator, NestedArea, NodeItem,
        PortDirection, PortShape, Scene, SceneDiff, SceneItem, SceneKey,
    },
};

/// Inputs shared by every renderer in one frame.
pub struct RenderContext<'a> {
    pub canvas: &'a CanvasInfo,
    pub layout: &'a CanvasLayout,
    pub measure: &'a dyn TextMeasure,
    pub selected: &'a HashSet<Id>,
    pub hovered: Option<Id>,
    pub comment_links: bool,
}

impl RenderContext<'_> {
    fn is_selected(&self, id: Id) -> bool {
        self.selected.contains(&id)
    }

    fn is_hovered(&self, id: Id) -> bool {
        self.hovered == Some(id)
    }
}

/// How much of the scene a frame rebuilds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderScope<'a> {
    Full,
    Transforms(&'a [Id]),
    Selection,
}

/// Area of an expanded supernode in which its pipeline is displayed, in the
/// coordinates of the pipeline holding the supernode.
pub fn supernode_content_area(node: &Node, layout: &CanvasLayout) -> Bounds {
    let size = node.size();
    let width = (size.width() - 2.0 * layout.supernode_side_area_width).max(0.0);
    let height =
        (size.height() - layout.supernode_top_area_height - layout.supernode_bottom_area_height).max(0.0);
    Bounds::new_from_top_left(
        Point::new(
            node.x_pos + layout.supernode_side_area_width,
            node.y_pos + layout.supernode_top_area_height,
        ),
        Size::new(width, height),
    )
}

/// Connection handle of a comment, centered on its right edge.
pub fn comment_connector(comment: &Comment, layout: &CanvasLayout) -> Bounds {
    let bounds = comment.bounds();
    let size = layout.comment_connection_handle_size;
    Bounds::new_from_center(
        Point::new(bounds.max_x(), bounds.center().y()),
        Size::new(size, size),
    )
}

/// Center of a port relative to its node's top-left corner.
fn port_center(node_size: Size, offset: f32, direction: PortDirection, layout: &CanvasLayout) -> Point {
    match (layout.is_vertical(), direction) {
        (false, PortDirection::Input) => Point::new(0.0, offset),
        (false, PortDirection::Output) => Point::new(node_size.width(), offset),
        (true, PortDirection::Input) => Point::new(offset, 0.0),
        (true, PortDirection::Output) => Point::new(offset, node_size.height()),
    }
}

fn decoration_bounds(position: DecorationPosition, size: Size, layout: &CanvasLayout) -> Bounds {
    let d = layout.decoration_size;
    let p = layout.decoration_padding;
    let origin = match position {
        DecorationPosition::TopLeft => Point::new(p, p),
        DecorationPosition::TopRight => Point::new(size.width() - p - d, p),
        DecorationPosition::BottomLeft => Point::new(p, size.height() - p - d),
        DecorationPosition::BottomRight => Point::new(size.width() - p - d, size.height() - p - d),
    };
    Bounds::new_from_top_left(origin, Size::new(d, d))
}

/// Renders one pipeline into its scene.
#[derive(Debug)]
pub struct SceneRenderer {
    pipeline_id: Id,
    scene: Scene,
    last_diff: SceneDiff,
}

impl SceneRenderer {
    pub fn new(pipeline_id: Id) -> Self {
        Self {
            pipeline_id,
            scene: Scene::new(),
            last_diff: SceneDiff::default(),
        }
    }

    pub fn pipeline_id(&self) -> Id {
        self.pipeline_id
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Changes made by the most recent frame.
    pub fn last_diff(&self) -> &SceneDiff {
        &self.last_diff
    }

    fn key(&self, kind: ItemKind, id: Id) -> SceneKey {
        SceneKey::new(self.pipeline_id, kind, id)
    }

    /// Draws the pipeline for one frame.
    pub fn display_canvas(&mut self, ctx: &RenderContext<'_>, scope: RenderScope<'_>) -> &SceneDiff {
        let diff = match ctx.canvas.pipeline(self.pipeline_id) {
            Some(pipeline) => match scope {
                RenderScope::Full => self.display_full(ctx, pipeline),
                RenderScope::Transforms(moved) => self.display_transforms(ctx, pipeline, moved),
                RenderScope::Selection => self.display_selection(ctx),
            },
            None => {
                warn!(pipeline_id:% = self.pipeline_id; "Pipeline to display is missing");
                self.scene.reconcile(Vec::new(), |_| true)
            }
        };
        trace!(
            pipeline_id:% = self.pipeline_id,
            entered = diff.entered.len(),
            updated = diff.updated.len(),
            exited = diff.exited.len();
            "Scene reconciled"
        );
        self.last_diff = diff;
        &self.last_diff
    }

    /// Marks a frame in which this renderer had nothing to redraw.
    pub fn skip_frame(&mut self) {
        self.last_diff = SceneDiff::default();
    }

    /// Replaces the overlay items, merging the changes into the last diff.
    pub fn set_overlays(&mut self, overlays: Vec<(Id, SceneItem)>) {
        let items = overlays
            .into_iter()
            .map(|(id, item)| (self.key(ItemKind::Overlay, id), item))
            .collect();
        let diff = self
            .scene
            .reconcile(items, |key| key.kind() == ItemKind::Overlay);
        self.last_diff.merge(diff);
    }

    fn display_full(&mut self, ctx: &RenderContext<'_>, pipeline: &Pipeline) -> SceneDiff {
        let mut items = Vec::with_capacity(pipeline.comments.len() + pipeline.nodes.len() + pipeline.links.len());
        for comment in &pipeline.comments {
            items.push((
                self.key(ItemKind::Comment, comment.id),
                SceneItem::Comment(self.comment_item(ctx, comment)),
            ));
        }
        for node in &pipeline.nodes {
            items.push((self.key(ItemKind::Node, node.id), SceneItem::Node(self.node_item(ctx, node))));
        }
        for link in &pipeline.links {
            if let Some(item) = self.link_item(ctx, pipeline, link) {
                items.push((self.key(ItemKind::Link, link.id), SceneItem::Link(item)));
            }
        }
        self.scene
            .reconcile(items, |key| key.kind() != ItemKind::Overlay)
    }

    fn display_transforms(&mut self, ctx: &RenderContext<'_>, pipeline: &Pipeline, moved: &[Id]) -> SceneDiff {
        let mut diff = SceneDiff::default();
        for &id in moved {
            let (key, position) = if let Some(node) = pipeline.node(id) {
                (self.key(ItemKind::Node, id), node.position())
            } else if let Some(comment) = pipeline.comment(id) {
                (self.key(ItemKind::Comment, id), comment.position())
            } else {
                continue;
            };
            if self.scene.set_position(&key, position) {
                diff.updated.push(key);
            }
        }

        for link in pipeline
            .links
            .iter()
            .filter(|l| moved.iter().any(|&id| l.touches(id)))
        {
            let key = self.key(ItemKind::Link, link.id);
            match self.link_item(ctx, pipeline, link) {
                Some(item) => self.scene.upsert(key, SceneItem::Link(item), &mut diff),
                None => self.scene.remove(&key, &mut diff),
            }
        }
        diff
    }

    fn display_selection(&mut self, ctx: &RenderContext<'_>) -> SceneDiff {
        let updated = self
            .scene
            .update_highlights(|id| ctx.is_selected(id), |id| ctx.is_hovered(id));
        SceneDiff {
            updated,
            ..SceneDiff::default()
        }
    }

    // ====================================================================
    // Item builders
    // ====================================================================

    fn node_item(&self, ctx: &RenderContext<'_>, node: &Node) -> NodeItem {
        let layout = ctx.layout;
        let size = node.size();
        let expanded = node.is_expanded_supernode();

        let (label_origin, label_width, icon_bounds) = if expanded {
            let icon = layout.supernode_icon_size;
            let top = layout.supernode_top_area_height;
            let side = layout.supernode_side_area_width;
            let icon_bounds = Bounds::new_from_top_left(Point::new(side, (top - icon) / 2.0), Size::new(icon, icon));
            let label_width = (size.width() - 2.0 * icon - 2.0 * side).max(0.0);
            (Point::new(side + icon, (top - layout.node_label_height) / 2.0), label_width, icon_bounds)
        } else {
            let image = layout.node_image_size;
            let icon_bounds = Bounds::new_from_top_left(
                Point::new((size.width() - image) / 2.0, layout.node_image_pos_y),
                Size::new(image, image),
            );
            (
                Point::new(layout.node_label_padding, layout.node_label_pos_y),
                layout.node_label_width(size.width()),
                icon_bounds,
            )
        };

        let ports = node
            .input_ports
            .iter()
            .map(|p| (p, PortDirection::Input))
            .chain(node.output_ports.iter().map(|p| (p, PortDirection::Output)))
            .filter_map(|(port, direction)| {
                let offset = port_offset(port, layout)?;
                Some(PortShape {
                    id: port.id,
                    direction,
                    center: port_center(size, offset, direction, layout),
                    radius: layout.port_radius,
                    class_name: port.class_name.clone(),
                })
            })
            .collect();

        let local = Bounds::new_from_top_left(Point::default(), size);
        let halo = layout
            .is_halo()
            .then(|| local.add_padding(Insets::uniform(layout.halo_gap)));

        let decorations = node
            .decorations
            .iter()
            .map(|d| DecorationShape {
                id: d.id,
                position: d.position,
                bounds: decoration_bounds(d.position, size, layout),
                label: d.label.clone(),
                class_name: d.class_name.clone(),
            })
            .collect();

        let message = node.max_message_kind().map(|kind| {
            let s = layout.message_indicator_size;
            MessageIndicator {
                kind,
                bounds: Bounds::new_from_center(Point::new(icon_bounds.max_x(), icon_bounds.min_y()), Size::new(s, s)),
            }
        });

        let nested = node
            .subflow_pipeline()
            .filter(|id| expanded && ctx.canvas.pipeline(*id).is_some())
            .map(|pipeline_id| NestedArea {
                pipeline_id,
                area: supernode_content_area(node, layout).inverse_translate(node.position()),
            });

        NodeItem {
            position: node.position(),
            size,
            node_type: node.node_type,
            label: truncate_label(&node.label, label_width, ctx.measure),
            label_origin,
            image: node.image.as_ref().map(|href| ImageShape {
                href: href.clone(),
                bounds: icon_bounds,
            }),
            ports,
            halo,
            decorations,
            message,
            nested,
            resizable: expanded,
            selected: ctx.is_selected(node.id),
            hovered: ctx.is_hovered(node.id),
        }
    }

    fn comment_item(&self, ctx: &RenderContext<'_>, comment: &Comment) -> CommentItem {
        let layout = ctx.layout;
        let padding = layout.comment_padding;
        let lines = wrap_lines(&comment.content, comment.width - 2.0 * padding, ctx.measure);
        let connector = ctx
            .comment_links
            .then(|| comment_connector(comment, layout).inverse_translate(comment.position()));
        CommentItem {
            position: comment.position(),
            size: comment.size(),
            lines,
            padding,
            line_height: layout.comment_line_height,
            class_name: comment.class_name.clone(),
            connector,
            selected: ctx.is_selected(comment.id),
            hovered: ctx.is_hovered(comment.id),
        }
    }

    fn link_item(&self, ctx: &RenderContext<'_>, pipeline: &Pipeline, link: &Link) -> Option<LinkItem> {
        match route_link(pipeline, link, ctx.layout) {
            Ok(Some(route)) => Some(LinkItem {
                kind: link.kind,
                src_id: link.src_node_id,
                trg_id: link.trg_node_id,
                route,
                selected: ctx.is_selected(link.id),
            }),
            Ok(None) => None,
            Err(err) => {
                warn!(pipeline_id:% = pipeline.id, err:%; "Skipping unroutable link");
                None
            }
        }
    }
}

// ====================================================================
// Hit testing
// ====================================================================

/// What lies under the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitTarget {
    ResizeHandle {
        object_id: Id,
        direction: ResizeDirection,
        is_comment: bool,
    },
    OutputPort {
        node_id: Id,
        port_id: Id,
    },
    InputPort {
        node_id: Id,
        port_id: Id,
    },
    Halo {
        node_id: Id,
    },
    CommentConnector {
        comment_id: Id,
    },
    Node {
        node_id: Id,
    },
    Comment {
        comment_id: Id,
    },
    Link {
        link_id: Id,
    },
    Canvas,
}

/// Inputs for [`hit_test`].
pub struct HitContext<'a> {
    pub pipeline: &'a Pipeline,
    pub layout: &'a CanvasLayout,
    pub scene: &'a Scene,
    /// Screen pixels per content unit.
    pub scale: f32,
    /// Link hit tolerance in screen pixels.
    pub link_tolerance: f32,
    pub comment_links: bool,
}

fn resize_direction(bounds: Bounds, point: Point, handle: f32) -> Option<ResizeDirection> {
    let half = handle / 2.0;
    if !bounds.add_padding(Insets::uniform(half)).contains_point(point) {
        return None;
    }
    ResizeDirection::from_edges(
        (point.y() - bounds.min_y()).abs() <= half,
        (point.y() - bounds.max_y()).abs() <= half,
        (point.x() - bounds.min_x()).abs() <= half,
        (point.x() - bounds.max_x()).abs() <= half,
    )
}

fn port_hit(pipeline: &Pipeline, layout: &CanvasLayout, point: Point) -> Option<HitTarget> {
    let reach = layout.port_radius + 2.0;
    for node in pipeline.nodes.iter().rev() {
        let origin = node.bounds().min_point();
        let size = node.size();
        let near = |port: &Port, direction| {
            port_offset(port, layout).is_some_and(|offset| {
                origin
                    .add_point(port_center(size, offset, direction, layout))
                    .distance(point)
                    <= reach
            })
        };
        if let Some(port) = node.output_ports.iter().find(|p| near(p, PortDirection::Output)) {
            return Some(HitTarget::OutputPort {
                node_id: node.id,
                port_id: port.id,
            });
        }
        if let Some(port) = node.input_ports.iter().find(|p| near(p, PortDirection::Input)) {
            return Some(HitTarget::InputPort {
                node_id: node.id,
                port_id: port.id,
            });
        }
    }
    None
}

/// Finds the topmost target at `point`, in the pipeline's content
/// coordinates. Targets are tried in order: ports, comment connectors,
/// resize handles, halos, nodes, comments, links, and finally the canvas.
///
/// Ports and comment connectors overlap the resize bands of their objects
/// and take precedence over them.
pub fn hit_test(ctx: &HitContext<'_>, point: Point) -> HitTarget {
    let layout = ctx.layout;
    let pipeline = ctx.pipeline;
    let handle = layout.resize_handle_size / ctx.scale;

    if !layout.is_halo() {
        if let Some(target) = port_hit(pipeline, layout, point) {
            return target;
        }
    }

    if ctx.comment_links {
        if let Some(comment) = pipeline
            .comments
            .iter()
            .rev()
            .find(|c| comment_connector(c, layout).contains_point(point))
        {
            return HitTarget::CommentConnector { comment_id: comment.id };
        }
    }

    for node in pipeline.nodes.iter().rev().filter(|n| n.is_expanded_supernode()) {
        if let Some(direction) = resize_direction(node.bounds(), point, handle) {
            return HitTarget::ResizeHandle {
                object_id: node.id,
                direction,
                is_comment: false,
            };
        }
    }
    for comment in pipeline.comments.iter().rev() {
        if let Some(direction) = resize_direction(comment.bounds(), point, handle) {
            return HitTarget::ResizeHandle {
                object_id: comment.id,
                direction,
                is_comment: true,
            };
        }
    }

    if layout.is_halo() {
        for node in pipeline.nodes.iter().rev() {
            let bounds = node.bounds();
            let ring = bounds.add_padding(Insets::uniform(2.0 * layout.halo_gap));
            if ring.contains_point(point) && !bounds.contains_point(point) {
                return HitTarget::Halo { node_id: node.id };
            }
        }
    }

    if let Some(node) = pipeline.nodes.iter().rev().find(|n| n.bounds().contains_point(point)) {
        return HitTarget::Node { node_id: node.id };
    }
    if let Some(comment) = pipeline.comments.iter().rev().find(|c| c.bounds().contains_point(point)) {
        return HitTarget::Comment { comment_id: comment.id };
    }

    let tolerance = ctx.link_tolerance / ctx.scale;
    let closest = ctx
        .scene
        .iter()
        .filter_map(|(key, item)| match item {
            SceneItem::Link(link) => Some((key.id(), link.route.distance_to(point))),
            _ => None,
        })
        .filter(|(_, distance)| *distance <= tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((link_id, _)) = closest {
        return HitTarget::Link { link_id };
    }

    HitTarget::Canvas
}
