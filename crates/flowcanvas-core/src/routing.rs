//! Link routing engine.
//!
//! Turns a link's two endpoints into an SVG path string. Path generation is a
//! pure function of the anchor coordinates, the [`LinkType`] and the
//! [`CanvasLayout`] constants, so identical inputs always produce identical
//! strings.
//!
//! # Overview
//!
//! - [`straight_path`], [`lightning_path`], [`curve_path`], [`elbow_path`] -
//!   The four path algorithms, over anchors in canvas coordinates
//! - [`link_path`] - Dispatches on [`LinkType`]
//! - [`route_link`] - Resolves a [`Link`] against its pipeline: computes the
//!   anchors (ports or halo perimeter), applies overlap suppression and the
//!   self-link detour, and returns a [`RoutedLink`]
//!
//! # Example
//!
//! ```
//! # use flowcanvas_core::{geometry::Point, layout::CanvasLayout, routing::{curve_path, elbow_path}};
//! let layout = CanvasLayout::default();
//! let start = Point::new(159.0, 128.5);
//! let end = Point::new(297.0, 167.5);
//!
//! assert_eq!(
//!     curve_path(start, end, &layout, None),
//!     "M 159 128.5 C 228 128.5 228 167.5 297 167.5",
//! );
//! assert_eq!(
//!     elbow_path(start, end, &layout, None),
//!     "M 159 128.5 L 179 128.5 Q 189 128.5 189 138.5 L 189 157.5 Q 189 167.5 199 167.5 L 297 167.5",
//! );
//! ```
//!
//! # Vertical format
//!
//! With vertically formatted nodes links flow top to bottom. Anchors are
//! transposed, routed with the horizontal algorithms and transposed back as
//! the path is written.

use std::fmt::Write;

use thiserror::Error;

use crate::{
    geometry::{Bounds, Insets, Point, arrow_head_path, outer_coord},
    identifier::Id,
    layout::{CanvasLayout, LinkType},
    model::{Comment, Link, LinkKind, Node, Pipeline, Port},
    ports::port_offset,
};

/// A link could not be routed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("link `{link_id}` references missing object `{object_id}`")]
    MissingEndpoint { link_id: Id, object_id: Id },
}

// ====================================================================
// Path builder
// ====================================================================

/// Writes SVG path commands, optionally swapping x and y on output.
struct PathBuilder {
    path: String,
    points: Vec<Point>,
    transpose: bool,
}

impl PathBuilder {
    fn new(transpose: bool) -> Self {
        Self {
            path: String::new(),
            points: Vec::new(),
            transpose,
        }
    }

    fn command(&mut self, cmd: char, coords: &[Point]) {
        if !self.path.is_empty() {
            self.path.push(' ');
        }
        self.path.push(cmd);
        for point in coords {
            let point = if self.transpose { point.transpose() } else { *point };
            // Writing to a String cannot fail.
            let _ = write!(self.path, " {} {}", point.x(), point.y());
        }
        if let Some(last) = coords.last() {
            self.points
                .push(if self.transpose { last.transpose() } else { *last });
        }
    }

    fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.command('M', &[Point::new(x, y)]);
        self
    }

    fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.command('L', &[Point::new(x, y)]);
        self
    }

    fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) -> &mut Self {
        self.command('Q', &[Point::new(cx, cy), Point::new(x, y)]);
        self
    }

    fn smooth_quad_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.command('T', &[Point::new(x, y)]);
        self
    }

    fn cubic_to(&mut self, c1: Point, c2: Point, end: Point) -> &mut Self {
        self.command('C', &[c1, c2, end]);
        self
    }

    fn finish(self) -> (String, Vec<Point>) {
        (self.path, self.points)
    }
}

fn sign(value: f32) -> f32 {
    if value < 0.0 { -1.0 } else { 1.0 }
}

/// Offset of a rounded corner over a jog of length `delta`: the elbow size,
/// shrunk to half the jog when the jog is shorter than two elbows.
fn half_jog_offset(delta: f32, elbow: f32) -> f32 {
    sign(delta) * elbow.min(delta.abs() / 2.0)
}

// ====================================================================
// Path algorithms
// ====================================================================

fn build_straight(start: Point, end: Point, transpose: bool) -> (String, Vec<Point>) {
    let mut path = PathBuilder::new(transpose);
    path.move_to(start.x(), start.y()).line_to(end.x(), end.y());
    path.finish()
}

fn build_lightning(start: Point, end: Point, layout: &CanvasLayout, transpose: bool) -> (String, Vec<Point>) {
    let (x1, y1, x2, y2) = (start.x(), start.y(), end.x(), end.y());
    let corner1_x = x1 + layout.min_initial_line;
    let corner2_x = x2 - layout.min_initial_line;

    let backward_gap = corner1_x - corner2_x;
    if backward_gap > layout.lightning_backward_threshold
        || (y2 - y1).abs() < layout.lightning_min_vertical_gap
    {
        return build_straight(start, end, transpose);
    }

    let mut path = PathBuilder::new(transpose);
    path.move_to(x1, y1)
        .line_to(corner1_x, y1)
        .line_to(corner2_x, y2)
        .line_to(x2, y2);
    path.finish()
}

fn build_curve(
    start: Point,
    end: Point,
    layout: &CanvasLayout,
    detour: Option<f32>,
    transpose: bool,
) -> (String, Vec<Point>) {
    let (x1, y1, x2, y2) = (start.x(), start.y(), end.x(), end.y());
    let x_diff = x2 - x1;
    let mut path = PathBuilder::new(transpose);
    path.move_to(x1, y1);

    if detour.is_none() && x_diff >= 2.0 * layout.min_initial_line {
        let control_x = x1 + x_diff / 2.0;
        path.cubic_to(
            Point::new(control_x, y1),
            Point::new(control_x, y2),
            Point::new(x2, y2),
        );
        return path.finish();
    }

    // Endpoints too close horizontally: loop out of the source and back
    // into the target.
    let corner1_x = x1 + layout.min_initial_line;
    let corner2_x = x2 - layout.min_initial_line;
    let mid_x = (corner1_x + corner2_x) / 2.0;
    let mid_y = detour.unwrap_or(y1 + (y2 - y1) / 2.0);

    path.quad_to(corner1_x, y1, corner1_x, (y1 + mid_y) / 2.0)
        .smooth_quad_to(mid_x, mid_y)
        .smooth_quad_to(corner2_x, (mid_y + y2) / 2.0)
        .smooth_quad_to(x2, y2);
    path.finish()
}

fn build_elbow(
    start: Point,
    end: Point,
    layout: &CanvasLayout,
    detour: Option<f32>,
    transpose: bool,
) -> (String, Vec<Point>) {
    let (x1, y1, x2, y2) = (start.x(), start.y(), end.x(), end.y());
    let elbow = layout.elbow_size;
    let min_line = layout.min_initial_line;
    let x_diff = x2 - x1;
    let y_diff = y2 - y1;

    let corner1_x = x1 + min_line;
    let extra_segments = detour.is_some() || x_diff < 2.0 * min_line;

    let mut elbow_y_offset = if y_diff.abs() > 2.0 * elbow {
        sign(y_diff) * elbow
    } else {
        y_diff / 2.0
    };
    if x_diff < 2.0 * min_line && y_diff.abs() < 4.0 * elbow {
        elbow_y_offset = y_diff / 4.0;
    }

    let mut path = PathBuilder::new(transpose);

    if !extra_segments {
        path.move_to(x1, y1)
            .line_to(corner1_x - elbow, y1)
            .quad_to(corner1_x, y1, corner1_x, y1 + elbow_y_offset)
            .line_to(corner1_x, y2 - elbow_y_offset)
            .quad_to(corner1_x, y2, corner1_x + elbow, y2)
            .line_to(x2, y2);
        return path.finish();
    }

    let corner2_x = x2 - min_line;
    let elbow_x_offset = elbow.min((corner1_x - corner2_x) / 2.0);
    let center_y = detour.unwrap_or(y1 + y_diff / 2.0);
    let (first_offset, second_offset) = match detour {
        Some(detour_y) => (
            half_jog_offset(detour_y - y1, elbow),
            half_jog_offset(y2 - detour_y, elbow),
        ),
        None => (elbow_y_offset, elbow_y_offset),
    };

    path.move_to(x1, y1)
        .line_to(corner1_x - elbow, y1)
        .quad_to(corner1_x, y1, corner1_x, y1 + first_offset)
        .line_to(corner1_x, center_y - first_offset)
        .quad_to(corner1_x, center_y, corner1_x - elbow_x_offset, center_y)
        .line_to(corner2_x + elbow_x_offset, center_y)
        .quad_to(corner2_x, center_y, corner2_x, center_y + second_offset)
        .line_to(corner2_x, y2 - second_offset)
        .quad_to(corner2_x, y2, corner2_x + elbow, y2)
        .line_to(x2, y2);
    path.finish()
}

/// Direct line between the two anchors.
pub fn straight_path(start: Point, end: Point) -> String {
    build_straight(start, end, false).0
}

/// Horizontal stubs out of both anchors joined by one diagonal; straight
/// when the stubs would run backwards past each other or the vertical gap is
/// too small.
pub fn lightning_path(start: Point, end: Point, layout: &CanvasLayout) -> String {
    build_lightning(start, end, layout, false).0
}

/// Cubic curve with both control points at the horizontal midpoint, or a
/// looping `Q`/`T` family when the endpoints are horizontally close or a
/// detour is requested.
pub fn curve_path(start: Point, end: Point, layout: &CanvasLayout, detour: Option<f32>) -> String {
    build_curve(start, end, layout, detour, false).0
}

/// Orthogonal route with rounded corners.
///
/// The first jog leaves the source after `min_initial_line`. When the
/// anchors are closer than two minimum lines (or `detour` names a y to pass
/// through) a center waist jog is inserted so the line clears both ends.
pub fn elbow_path(start: Point, end: Point, layout: &CanvasLayout, detour: Option<f32>) -> String {
    build_elbow(start, end, layout, detour, false).0
}

fn build_path(
    link_type: LinkType,
    start: Point,
    end: Point,
    layout: &CanvasLayout,
    detour: Option<f32>,
    transpose: bool,
) -> (String, Vec<Point>) {
    let (start, end) = if transpose {
        (start.transpose(), end.transpose())
    } else {
        (start, end)
    };
    match link_type {
        LinkType::Straight => build_straight(start, end, transpose),
        LinkType::Lightning if detour.is_some() => build_elbow(start, end, layout, detour, transpose),
        LinkType::Lightning => build_lightning(start, end, layout, transpose),
        LinkType::Curve => build_curve(start, end, layout, detour, transpose),
        LinkType::Elbow => build_elbow(start, end, layout, detour, transpose),
    }
}

/// Path string for `link_type` between two anchors in canvas coordinates.
///
/// `detour` only affects the looping algorithms; a straight link ignores it.
pub fn link_path(
    link_type: LinkType,
    start: Point,
    end: Point,
    layout: &CanvasLayout,
    detour: Option<f32>,
) -> String {
    build_path(link_type, start, end, layout, detour, layout.is_vertical()).0
}

// ====================================================================
// Anchors
// ====================================================================

/// A node or comment at one end of a link.
#[derive(Debug, Clone, Copy)]
pub enum Endpoint<'a> {
    Node(&'a Node),
    Comment(&'a Comment),
}

impl<'a> Endpoint<'a> {
    /// Looks up `id` among the nodes, then the comments, of `pipeline`.
    pub fn resolve(pipeline: &'a Pipeline, id: Id) -> Option<Self> {
        pipeline
            .node(id)
            .map(Endpoint::Node)
            .or_else(|| pipeline.comment(id).map(Endpoint::Comment))
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            Endpoint::Node(node) => node.bounds(),
            Endpoint::Comment(comment) => comment.bounds(),
        }
    }
}

fn port_or_first(ports: &[Port], port_id: Option<Id>) -> Option<&Port> {
    match port_id {
        Some(id) => ports.iter().find(|p| p.id == id).or_else(|| ports.first()),
        None => ports.first(),
    }
}

fn port_anchor(node: &Node, port: Option<&Port>, is_source: bool, layout: &CanvasLayout) -> Point {
    let bounds = node.bounds();
    if layout.is_vertical() {
        let offset = port
            .and_then(|p| port_offset(p, layout))
            .unwrap_or(bounds.width() / 2.0);
        let y = if is_source { bounds.max_y() } else { bounds.min_y() };
        Point::new(bounds.min_x() + offset, y)
    } else {
        let offset = port
            .and_then(|p| port_offset(p, layout))
            .unwrap_or(bounds.height() / 2.0);
        let x = if is_source { bounds.max_x() } else { bounds.min_x() };
        Point::new(x, bounds.min_y() + offset)
    }
}

/// Anchor on the source node's output side for the given output port.
pub fn source_port_anchor(node: &Node, port_id: Option<Id>, layout: &CanvasLayout) -> Point {
    port_anchor(node, port_or_first(&node.output_ports, port_id), true, layout)
}

/// Anchor on the target node's input side for the given input port.
pub fn target_port_anchor(node: &Node, port_id: Option<Id>, layout: &CanvasLayout) -> Point {
    port_anchor(node, port_or_first(&node.input_ports, port_id), false, layout)
}

/// Where a halo-mode link leaves `bounds` heading towards `toward`.
pub fn halo_anchor(bounds: Bounds, toward: Point, layout: &CanvasLayout) -> Point {
    outer_coord(toward, bounds.add_padding(Insets::uniform(layout.link_gap)))
}

/// Returns `true` when the two endpoint boxes, padded by the highlight gap,
/// overlap.
pub fn endpoints_overlap(src: Bounds, trg: Bounds, layout: &CanvasLayout) -> bool {
    let pad = Insets::uniform(layout.highlight_gap);
    src.add_padding(pad).intersects(&trg.add_padding(pad))
}

/// y (x in vertical format) that a self-referencing link passes through,
/// below (right of) the node.
pub fn self_link_detour(node_bounds: Bounds, layout: &CanvasLayout) -> f32 {
    if layout.is_vertical() {
        node_bounds.max_x() + layout.self_link_margin
    } else {
        node_bounds.max_y() + layout.self_link_margin
    }
}

// ====================================================================
// Routed links
// ====================================================================

/// A link ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedLink {
    path: String,
    start: Point,
    end: Point,
    vertices: Vec<Point>,
    arrow_head: Option<String>,
}

impl RoutedLink {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    /// Closed path of the arrow head at the target end, if drawn.
    pub fn arrow_head(&self) -> Option<&str> {
        self.arrow_head.as_deref()
    }

    /// Shortest distance from `point` to the polyline through the path's
    /// start and command end points.
    pub fn distance_to(&self, point: Point) -> f32 {
        std::iter::once(self.start)
            .chain(self.vertices.iter().copied())
            .collect::<Vec<_>>()
            .windows(2)
            .map(|seg| distance_to_segment(point, seg[0], seg[1]))
            .fold(f32::INFINITY, f32::min)
    }
}

fn distance_to_segment(point: Point, a: Point, b: Point) -> f32 {
    let ab = b.sub_point(a);
    let len_sq = ab.x() * ab.x() + ab.y() * ab.y();
    if len_sq == 0.0 {
        return point.distance(a);
    }
    let ap = point.sub_point(a);
    let t = ((ap.x() * ab.x() + ap.y() * ab.y()) / len_sq).clamp(0.0, 1.0);
    point.distance(a.add_point(ab.scale(t)))
}

fn routed(
    link_type: LinkType,
    start: Point,
    end: Point,
    layout: &CanvasLayout,
    detour: Option<f32>,
) -> RoutedLink {
    let (path, vertices) = build_path(link_type, start, end, layout, detour, layout.is_vertical());
    RoutedLink {
        path,
        start,
        end,
        vertices,
        arrow_head: None,
    }
}

/// Routes `link` within `pipeline`.
///
/// Node links in ports mode attach to the link's ports and follow the
/// configured [`LinkType`]; a self-referencing node link detours below its
/// node. Port links carry no arrow head. Node links in halo mode, comment
/// links and association links attach to the perimeter facing the other end
/// and are drawn straight, with an arrow head on halo node links only.
///
/// Returns `Ok(None)` when overlap suppression is enabled and the padded
/// endpoint boxes overlap.
///
/// # Errors
///
/// Returns [`RouteError::MissingEndpoint`] when either end does not name a
/// node or comment of `pipeline`.
pub fn route_link(
    pipeline: &Pipeline,
    link: &Link,
    layout: &CanvasLayout,
) -> Result<Option<RoutedLink>, RouteError> {
    let resolve = |object_id| {
        Endpoint::resolve(pipeline, object_id).ok_or(RouteError::MissingEndpoint {
            link_id: link.id,
            object_id,
        })
    };
    let src = resolve(link.src_node_id)?;
    let trg = resolve(link.trg_node_id)?;

    if link.is_self_referencing() {
        let Endpoint::Node(node) = src else {
            return Ok(None);
        };
        let start = source_port_anchor(node, link.src_node_port_id, layout);
        let end = target_port_anchor(node, link.trg_node_port_id, layout);
        let detour = self_link_detour(node.bounds(), layout);
        let link_type = match layout.link_type {
            LinkType::Straight | LinkType::Lightning => LinkType::Elbow,
            other => other,
        };
        return Ok(Some(routed(link_type, start, end, layout, Some(detour))));
    }

    let src_bounds = src.bounds();
    let trg_bounds = trg.bounds();
    if layout.suppress_overlapping_links && endpoints_overlap(src_bounds, trg_bounds, layout) {
        return Ok(None);
    }

    match (link.kind, src, trg) {
        (LinkKind::NodeLink, Endpoint::Node(src_node), Endpoint::Node(trg_node)) if !layout.is_halo() => {
            let start = source_port_anchor(src_node, link.src_node_port_id, layout);
            let end = target_port_anchor(trg_node, link.trg_node_port_id, layout);
            Ok(Some(routed(layout.link_type, start, end, layout, None)))
        }
        (kind, _, _) => {
            let start = halo_anchor(src_bounds, trg_bounds.center(), layout);
            let end = halo_anchor(trg_bounds, src_bounds.center(), layout);
            let with_arrow = kind == LinkKind::NodeLink;
            Ok(Some(RoutedLink {
                path: straight_path(start, end),
                start,
                end,
                vertices: vec![end],
                arrow_head: with_arrow.then(|| {
                    arrow_head_path(start, end, layout.arrow_head_length, layout.arrow_head_half_width)
                }),
            }))
        }
    }
}

/// Path of the rubber band drawn while a new link is being dragged from
/// `start` to the pointer.
pub fn rubber_band_path(start: Point, pointer: Point, layout: &CanvasLayout) -> String {
    if layout.is_halo() {
        straight_path(start, pointer)
    } else {
        link_path(layout.link_type, start, pointer, layout, None)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;
    use crate::{
        layout::{ConnectionType, NodeFormatType},
        ports::layout_pipeline,
    };

    fn fixture_layout(link_type: LinkType) -> CanvasLayout {
        CanvasLayout {
            link_type,
            ..CanvasLayout::default()
        }
    }

    /// Source at (89, 91) and target at (297, 130), each 70x75 with one port.
    fn fixture_pipeline(layout: &CanvasLayout) -> Pipeline {
        let mut pipeline = Pipeline::new("routing");
        pipeline
            .nodes
            .push(Node::new("src", "Source", 89.0, 91.0).with_ports(&[], &["out"]));
        pipeline
            .nodes
            .push(Node::new("trg", "Target", 297.0, 130.0).with_ports(&["in"], &[]));
        pipeline.links.push(
            Link::new("link", LinkKind::NodeLink, "src", "trg").with_ports("out", "in"),
        );
        layout_pipeline(&mut pipeline, layout);
        pipeline
    }

    fn route_fixture(layout: &CanvasLayout) -> RoutedLink {
        let pipeline = fixture_pipeline(layout);
        route_link(&pipeline, &pipeline.links[0], layout)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_fixture_anchors() {
        let routed = route_fixture(&fixture_layout(LinkType::Curve));
        assert_eq!(routed.start(), Point::new(159.0, 128.5));
        assert_eq!(routed.end(), Point::new(297.0, 167.5));
    }

    #[test]
    fn test_curve_ports_fixture() {
        let routed = route_fixture(&fixture_layout(LinkType::Curve));
        assert_eq!(routed.path(), "M 159 128.5 C 228 128.5 228 167.5 297 167.5");
    }

    #[test]
    fn test_elbow_ports_fixture() {
        let routed = route_fixture(&fixture_layout(LinkType::Elbow));
        assert_eq!(
            routed.path(),
            "M 159 128.5 L 179 128.5 Q 189 128.5 189 138.5 L 189 157.5 Q 189 167.5 199 167.5 L 297 167.5"
        );
    }

    #[test]
    fn test_straight_fixture() {
        let routed = route_fixture(&fixture_layout(LinkType::Straight));
        assert_eq!(routed.path(), "M 159 128.5 L 297 167.5");
        assert!(routed.arrow_head().is_none());
    }

    #[test]
    fn test_lightning_fixture() {
        let routed = route_fixture(&fixture_layout(LinkType::Lightning));
        assert_eq!(routed.path(), "M 159 128.5 L 189 128.5 L 267 167.5 L 297 167.5");
    }

    #[test]
    fn test_lightning_falls_back_when_backwards() {
        let layout = fixture_layout(LinkType::Lightning);
        let path = lightning_path(Point::new(200.0, 0.0), Point::new(150.0, 100.0), &layout);
        assert_eq!(path, "M 200 0 L 150 100");
    }

    #[test]
    fn test_lightning_falls_back_when_level() {
        let layout = fixture_layout(LinkType::Lightning);
        let path = lightning_path(Point::new(0.0, 50.0), Point::new(200.0, 52.0), &layout);
        assert_eq!(path, "M 0 50 L 200 52");
    }

    #[test]
    fn test_curve_loops_when_close() {
        let layout = fixture_layout(LinkType::Curve);
        let path = curve_path(Point::new(100.0, 0.0), Point::new(120.0, 100.0), &layout, None);
        assert_eq!(path, "M 100 0 Q 130 0 130 25 T 110 50 T 90 75 T 120 100");
    }

    #[test]
    fn test_elbow_close_endpoints_small_vertical_gap() {
        // x gap 40 < 60 and y gap 20 < 40: quarter-height jogs with a waist.
        let layout = fixture_layout(LinkType::Elbow);
        let path = elbow_path(Point::new(0.0, 0.0), Point::new(40.0, 20.0), &layout, None);
        assert_eq!(
            path,
            "M 0 0 L 20 0 Q 30 0 30 5 L 30 5 Q 30 10 20 10 L 20 10 Q 10 10 10 15 L 10 15 Q 10 20 20 20 L 40 20"
        );
    }

    #[test]
    fn test_elbow_small_vertical_gap_halves_offset() {
        let layout = fixture_layout(LinkType::Elbow);
        let path = elbow_path(Point::new(0.0, 0.0), Point::new(200.0, 16.0), &layout, None);
        assert_eq!(
            path,
            "M 0 0 L 20 0 Q 30 0 30 8 L 30 8 Q 30 16 40 16 L 200 16"
        );
    }

    #[test]
    fn test_self_link_elbow_clears_node() {
        let layout = fixture_layout(LinkType::Elbow);
        let mut pipeline = Pipeline::new("self");
        pipeline
            .nodes
            .push(Node::new("n", "Loop", 100.0, 100.0).with_ports(&["in"], &["out"]));
        pipeline
            .links
            .push(Link::new("l", LinkKind::NodeLink, "n", "n").with_ports("out", "in"));
        layout_pipeline(&mut pipeline, &layout);

        let routed = route_link(&pipeline, &pipeline.links[0], &layout)
            .unwrap()
            .unwrap();
        assert_eq!(
            routed.path(),
            "M 170 137.5 L 190 137.5 Q 200 137.5 200 147.5 L 200 185 Q 200 195 190 195 \
             L 80 195 Q 70 195 70 185 L 70 147.5 Q 70 137.5 80 137.5 L 100 137.5"
        );

        // The detour leg runs below the node body.
        let node_bounds = pipeline.nodes[0].bounds();
        assert!(routed.start() != routed.end());
        for vertex in &routed.vertices {
            let inside = vertex.x() > node_bounds.min_x()
                && vertex.x() < node_bounds.max_x()
                && vertex.y() > node_bounds.min_y()
                && vertex.y() < node_bounds.max_y();
            assert!(!inside, "vertex {vertex:?} is inside the node");
        }
    }

    #[test]
    fn test_missing_endpoint_is_reported() {
        let layout = CanvasLayout::default();
        let mut pipeline = fixture_pipeline(&layout);
        pipeline
            .links
            .push(Link::new("dangling", LinkKind::NodeLink, "src", "ghost"));
        let err = route_link(&pipeline, &pipeline.links[1], &layout).unwrap_err();
        assert_eq!(
            err,
            RouteError::MissingEndpoint {
                link_id: Id::new("dangling"),
                object_id: Id::new("ghost"),
            }
        );
    }

    #[test]
    fn test_overlap_suppression() {
        let layout = CanvasLayout {
            suppress_overlapping_links: true,
            ..CanvasLayout::default()
        };
        let mut pipeline = Pipeline::new("overlap");
        pipeline.nodes.push(Node::new("a", "A", 0.0, 0.0));
        pipeline.nodes.push(Node::new("b", "B", 70.5, 0.0));
        pipeline
            .links
            .push(Link::new("l", LinkKind::NodeLink, "a", "b"));
        assert_eq!(route_link(&pipeline, &pipeline.links[0], &layout), Ok(None));

        let layout = CanvasLayout::default();
        assert!(
            route_link(&pipeline, &pipeline.links[0], &layout)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_halo_link_uses_perimeter() {
        let layout = CanvasLayout {
            connection_type: ConnectionType::Halo,
            ..CanvasLayout::default()
        };
        let mut pipeline = Pipeline::new("halo");
        pipeline.nodes.push(Node::new("a", "A", 0.0, 0.0));
        pipeline.nodes.push(Node::new("b", "B", 300.0, 0.0));
        pipeline
            .links
            .push(Link::new("l", LinkKind::NodeLink, "a", "b"));

        let routed = route_link(&pipeline, &pipeline.links[0], &layout)
            .unwrap()
            .unwrap();
        assert_eq!(routed.start(), Point::new(77.0, 37.5));
        assert_eq!(routed.end(), Point::new(293.0, 37.5));
        assert_eq!(routed.path(), "M 77 37.5 L 293 37.5");
        assert!(routed.arrow_head().is_some());
    }

    #[test]
    fn test_comment_link_is_straight_in_ports_mode() {
        let layout = fixture_layout(LinkType::Elbow);
        let mut pipeline = Pipeline::new("comments");
        pipeline
            .comments
            .push(Comment::new("c", 0.0, 0.0, 100.0, 50.0, "note"));
        pipeline.nodes.push(Node::new("n", "N", 15.0, 200.0));
        pipeline
            .links
            .push(Link::new("l", LinkKind::CommentLink, "c", "n"));

        let routed = route_link(&pipeline, &pipeline.links[0], &layout)
            .unwrap()
            .unwrap();
        assert_eq!(routed.path(), "M 50 57 L 50 193");
        assert!(routed.arrow_head().is_none());
    }

    #[test]
    fn test_vertical_format_routes_top_to_bottom() {
        let layout = CanvasLayout {
            node_format_type: NodeFormatType::Vertical,
            link_type: LinkType::Straight,
            ..CanvasLayout::default()
        };
        let mut pipeline = Pipeline::new("vertical");
        pipeline
            .nodes
            .push(Node::new("a", "A", 0.0, 0.0).with_ports(&[], &["out"]));
        pipeline
            .nodes
            .push(Node::new("b", "B", 0.0, 200.0).with_ports(&["in"], &[]));
        pipeline
            .links
            .push(Link::new("l", LinkKind::NodeLink, "a", "b").with_ports("out", "in"));
        layout_pipeline(&mut pipeline, &layout);

        let routed = route_link(&pipeline, &pipeline.links[0], &layout)
            .unwrap()
            .unwrap();
        assert_eq!(routed.start(), Point::new(35.0, 75.0));
        assert_eq!(routed.end(), Point::new(35.0, 200.0));
        assert_eq!(routed.path(), "M 35 75 L 35 200");
    }

    #[test]
    fn test_vertical_elbow_is_transposed() {
        let layout = CanvasLayout {
            node_format_type: NodeFormatType::Vertical,
            link_type: LinkType::Elbow,
            ..CanvasLayout::default()
        };
        let horizontal = elbow_path(Point::new(128.5, 159.0), Point::new(167.5, 297.0), &layout, None);
        let vertical = link_path(
            LinkType::Elbow,
            Point::new(159.0, 128.5),
            Point::new(297.0, 167.5),
            &layout,
            None,
        );
        assert_ne!(horizontal, vertical);
        assert!(vertical.starts_with("M 159 128.5 L 159 148.5"));
        assert!(vertical.ends_with("L 297 167.5"));
    }

    #[test]
    fn test_distance_to_path() {
        let routed = route_fixture(&fixture_layout(LinkType::Elbow));
        assert_approx_eq!(f32, routed.distance_to(Point::new(170.0, 130.5)), 2.0);
        assert!(routed.distance_to(Point::new(0.0, 0.0)) > 100.0);
    }

    #[test]
    fn test_rubber_band_follows_link_type() {
        let layout = fixture_layout(LinkType::Straight);
        assert_eq!(
            rubber_band_path(Point::new(0.0, 0.0), Point::new(10.0, 10.0), &layout),
            "M 0 0 L 10 10"
        );
    }
}

#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;

    use super::*;

    // ===================
    // Strategies
    // ===================

    fn point_strategy() -> impl Strategy<Value = Point> {
        (-1000i32..1000, -1000i32..1000).prop_map(|(x, y)| Point::new(x as f32 / 2.0, y as f32 / 2.0))
    }

    fn link_type_strategy() -> impl Strategy<Value = LinkType> {
        prop_oneof![
            Just(LinkType::Curve),
            Just(LinkType::Elbow),
            Just(LinkType::Straight),
            Just(LinkType::Lightning),
        ]
    }

    // ===================
    // Property Test Functions
    // ===================

    /// Path generation is a pure function of its inputs.
    fn check_path_deterministic(link_type: LinkType, start: Point, end: Point) -> Result<(), TestCaseError> {
        let layout = CanvasLayout::default();
        let first = link_path(link_type, start, end, &layout, None);
        let second = link_path(link_type, start, end, &layout, None);
        prop_assert_eq!(first, second);
        Ok(())
    }

    /// Every path starts at the start anchor and ends at the end anchor.
    fn check_path_endpoints(link_type: LinkType, start: Point, end: Point) -> Result<(), TestCaseError> {
        let layout = CanvasLayout::default();
        let path = link_path(link_type, start, end, &layout, None);
        let start_text = format!("M {} {}", start.x(), start.y());
        let end_text = format!("{} {}", end.x(), end.y());
        prop_assert!(path.starts_with(&start_text));
        prop_assert!(path.ends_with(&end_text));
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn path_deterministic(link_type in link_type_strategy(), start in point_strategy(), end in point_strategy()) {
            check_path_deterministic(link_type, start, end)?;
        }

        #[test]
        fn path_endpoints(link_type in link_type_strategy(), start in point_strategy(), end in point_strategy()) {
            check_path_endpoints(link_type, start, end)?;
        }
    }
}
