//! SVG export of the current frame.
//!
//! [`SvgBuilder`] walks the renderer arena from the root pipeline and emits
//! one `<g>` per layer. Expanded supernodes embed their nested pipeline as a
//! clipped inner `<svg>` element whose group carries the nested transform,
//! so the document has the same structure as a live surface. Screen-space
//! overlays (the inline editor, the back-to-parent button) are emitted last,
//! outside the viewport transform.

use std::{collections::HashSet, fs::File, io::Write};

use log::{debug, error, info};
use svg::{
    Document,
    node::{Text as SvgText, element as svg_element},
};

use flowcanvas_core::{color::Color, geometry::Bounds, identifier::Id, model::NodeType};

use crate::{
    config::StyleConfig,
    export,
    scene::{CommentItem, LinkItem, NodeItem, PortDirection, SceneItem},
    supernode::{RendererArena, RendererRecord},
    viewport::{Transform, Viewport},
};

const DEFAULT_SELECTION_COLOR: &str = "#3d70b2";

/// Writes rendered documents to disk.
pub struct Svg {
    pub file_name: String,
}

impl Svg {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
        }
    }

    /// Writes an SVG document to the configured file.
    pub fn write_document(&self, doc: &Document) -> Result<(), export::Error> {
        info!(file_name = self.file_name; "Creating SVG file");
        let f = match File::create(&self.file_name) {
            Ok(file) => file,
            Err(err) => {
                error!(file_name = self.file_name, err:err; "Failed to create SVG file");
                return Err(export::Error::Io(err));
            }
        };

        if let Err(err) = write!(&f, "{doc}") {
            error!(file_name = self.file_name, err:err; "Failed to write SVG content");
            return Err(export::Error::Io(err));
        }

        Ok(())
    }
}

/// Builds an SVG [`Document`] from the scenes held by a [`RendererArena`].
pub struct SvgBuilder<'a> {
    arena: &'a RendererArena,
    viewport: &'a Viewport,
    background: Option<Color>,
    selection: Option<Color>,
}

impl<'a> SvgBuilder<'a> {
    pub fn new(arena: &'a RendererArena, viewport: &'a Viewport) -> Self {
        Self {
            arena,
            viewport,
            background: None,
            selection: None,
        }
    }

    /// Applies background and selection colors.
    pub fn with_style(mut self, style: &StyleConfig) -> Result<Self, export::Error> {
        self.background = style.background_color().map_err(export::Error::Render)?;
        self.selection = style.selection_color().map_err(export::Error::Render)?;
        Ok(self)
    }

    pub fn build(&self) -> Result<Document, export::Error> {
        let root_id = self
            .arena
            .root()
            .ok_or_else(|| export::Error::Render("No pipeline has been rendered".to_string()))?;
        let root = self
            .arena
            .record(root_id)
            .ok_or_else(|| export::Error::Render(format!("Renderer for pipeline `{root_id}` is missing")))?;

        let size = self.viewport.size();
        let mut doc = Document::new()
            .set("viewBox", (0.0, 0.0, size.width(), size.height()))
            .set("width", size.width())
            .set("height", size.height());

        if let Some(background) = &self.background {
            doc = doc.add(
                svg_element::Rectangle::new()
                    .set("width", "100%")
                    .set("height", "100%")
                    .set("fill", background)
                    .set("fill-opacity", background.alpha()),
            );
        }

        let mut visited = HashSet::new();
        let content = self.render_record(root, &mut visited);
        doc = doc.add(
            svg_element::Group::new()
                .set("class", "flowcanvas-viewport")
                .set("transform", transform_attr(root.screen_transform()))
                .add(content),
        );

        for record in self.arena.visible() {
            for (_, item) in record.renderer().scene().iter().filter(|(_, item)| item.is_screen_space()) {
                if let Some(element) = self.render_screen_item(item) {
                    doc = doc.add(element);
                }
            }
        }

        debug!(pipelines = visited.len(); "SVG document rendered");
        Ok(doc)
    }

    fn selection_stroke(&self) -> String {
        self.selection
            .as_ref()
            .map(Color::to_string)
            .unwrap_or_else(|| DEFAULT_SELECTION_COLOR.to_string())
    }

    fn render_record(&self, record: &RendererRecord, visited: &mut HashSet<Id>) -> svg_element::Group {
        let pipeline_id = record.pipeline_id();
        let mut group = svg_element::Group::new().set("data-pipeline-id", pipeline_id.to_string());
        if !visited.insert(pipeline_id) {
            return group;
        }

        for (layer, items) in record.renderer().scene().layered() {
            let mut layer_group = svg_element::Group::new().set("data-layer", layer.name());
            for (key, item) in items {
                let element: Option<Box<dyn svg::Node>> = match item {
                    SceneItem::Node(node) => Some(Box::new(self.render_node(record, key.id(), node, visited))),
                    SceneItem::Comment(comment) => Some(Box::new(self.render_comment(key.id(), comment))),
                    SceneItem::Link(link) => Some(Box::new(self.render_link(key.id(), link))),
                    SceneItem::RubberBand(band) => Some(Box::new(
                        svg_element::Path::new()
                            .set("class", "rubber-band")
                            .set("d", band.path.as_str())
                            .set("fill", "none")
                            .set("stroke", self.selection_stroke())
                            .set("stroke-dasharray", "4 2"),
                    )),
                    SceneItem::Region(region) => Some(Box::new(
                        rect(region.bounds)
                            .set("class", "region-select")
                            .set("fill", "none")
                            .set("stroke", self.selection_stroke())
                            .set("stroke-dasharray", "2 2"),
                    )),
                    SceneItem::EditorBox(_) | SceneItem::BackToParent(_) => None,
                };
                if let Some(element) = element {
                    layer_group = layer_group.add(element);
                }
            }
            group = group.add(layer_group);
        }
        group
    }

    fn render_node(
        &self,
        record: &RendererRecord,
        id: Id,
        node: &NodeItem,
        visited: &mut HashSet<Id>,
    ) -> svg_element::Group {
        let class = match node.node_type {
            NodeType::Ordinary => "node",
            NodeType::SuperNode => "supernode",
            NodeType::Binding => "binding",
        };
        let mut group = svg_element::Group::new()
            .set("class", class)
            .set("data-id", id.to_string())
            .set("transform", format!("translate({}, {})", node.position.x(), node.position.y()));

        if let Some(halo) = node.halo {
            group = group.add(rect(halo).set("class", "halo").set("fill", "none"));
        }

        let mut body = svg_element::Rectangle::new()
            .set("class", "node-body")
            .set("width", node.size.width())
            .set("height", node.size.height());
        if node.selected {
            body = body.set("stroke", self.selection_stroke()).set("stroke-width", 2);
        }
        if node.hovered {
            body = body.set("data-hover", "true");
        }
        group = group.add(body);

        if let Some(image) = &node.image {
            group = group.add(
                svg_element::Image::new()
                    .set("href", image.href.as_str())
                    .set("x", image.bounds.min_x())
                    .set("y", image.bounds.min_y())
                    .set("width", image.bounds.width())
                    .set("height", image.bounds.height()),
            );
        }

        if !node.label.is_empty() {
            group = group.add(
                svg_element::Text::new("")
                    .set("class", "node-label")
                    .set("x", node.label_origin.x())
                    .set("y", node.label_origin.y())
                    .set("dominant-baseline", "hanging")
                    .add(SvgText::new(node.label.as_str())),
            );
        }

        for port in &node.ports {
            let class = match port.direction {
                PortDirection::Input => "port-input",
                PortDirection::Output => "port-output",
            };
            let class = match &port.class_name {
                Some(extra) => format!("{class} {extra}"),
                None => class.to_string(),
            };
            group = group.add(
                svg_element::Circle::new()
                    .set("class", class)
                    .set("data-port-id", port.id.to_string())
                    .set("cx", port.center.x())
                    .set("cy", port.center.y())
                    .set("r", port.radius),
            );
        }

        for decoration in &node.decorations {
            let mut deco = svg_element::Group::new().set("data-decoration-id", decoration.id.to_string());
            deco = deco.add(
                rect(decoration.bounds).set("class", decoration.class_name.as_deref().unwrap_or("decoration")),
            );
            if let Some(label) = &decoration.label {
                deco = deco.add(
                    svg_element::Text::new("")
                        .set("x", decoration.bounds.center().x())
                        .set("y", decoration.bounds.center().y())
                        .set("text-anchor", "middle")
                        .set("dominant-baseline", "central")
                        .add(SvgText::new(label.as_str())),
                );
            }
            group = group.add(deco);
        }

        if let Some(message) = &node.message {
            let bounds = message.bounds;
            group = group.add(
                svg_element::Circle::new()
                    .set("class", format!("message-{}", message.kind.as_str()))
                    .set("cx", bounds.center().x())
                    .set("cy", bounds.center().y())
                    .set("r", bounds.width() / 2.0),
            );
        }

        if let Some(nested) = &node.nested {
            if let Some(child) = self.arena.child_of(record.pipeline_id(), id) {
                let area = nested.area;
                let inner = self.render_record(child, visited).set("transform", transform_attr(child.local_transform()));
                group = group.add(
                    svg_element::SVG::new()
                        .set("class", "nested-pipeline")
                        .set("x", area.min_x())
                        .set("y", area.min_y())
                        .set("width", area.width())
                        .set("height", area.height())
                        .set("overflow", "hidden")
                        .add(inner),
                );
            }
        }

        group
    }

    fn render_comment(&self, id: Id, comment: &CommentItem) -> svg_element::Group {
        let mut group = svg_element::Group::new()
            .set("class", comment.class_name.as_deref().unwrap_or("comment"))
            .set("data-id", id.to_string())
            .set("transform", format!("translate({}, {})", comment.position.x(), comment.position.y()));

        let mut body = svg_element::Rectangle::new()
            .set("class", "comment-body")
            .set("width", comment.size.width())
            .set("height", comment.size.height());
        if comment.selected {
            body = body.set("stroke", self.selection_stroke()).set("stroke-width", 2);
        }
        group = group.add(body);

        let mut text = svg_element::Text::new("")
            .set("class", "comment-text")
            .set("x", comment.padding)
            .set("y", comment.padding)
            .set("dominant-baseline", "hanging");
        for (idx, line) in comment.lines.iter().enumerate() {
            let tspan = svg_element::TSpan::new("")
                .set("x", comment.padding)
                .set("y", comment.padding + idx as f32 * comment.line_height)
                .add(SvgText::new(line.as_str()));
            text = text.add(tspan);
        }
        group = group.add(text);

        if let Some(connector) = comment.connector {
            group = group.add(rect(connector).set("class", "comment-connector"));
        }
        group
    }

    fn render_link(&self, id: Id, link: &LinkItem) -> svg_element::Group {
        let stroke = if link.selected {
            self.selection_stroke()
        } else {
            "currentColor".to_string()
        };
        let mut group = svg_element::Group::new()
            .set("class", link.kind.as_str())
            .set("data-id", id.to_string())
            .set("data-src", link.src_id.to_string())
            .set("data-trg", link.trg_id.to_string());
        group = group.add(
            svg_element::Path::new()
                .set("d", link.route.path())
                .set("fill", "none")
                .set("stroke", stroke.as_str()),
        );
        if let Some(head) = link.route.arrow_head() {
            group = group.add(
                svg_element::Path::new()
                    .set("class", "arrow-head")
                    .set("d", head)
                    .set("fill", stroke.as_str()),
            );
        }
        group
    }

    fn render_screen_item(&self, item: &SceneItem) -> Option<svg_element::Group> {
        match item {
            SceneItem::EditorBox(editor) => {
                let mut text = svg_element::Text::new("")
                    .set("x", editor.bounds.min_x())
                    .set("y", editor.bounds.min_y())
                    .set("font-size", format!("{}em", editor.scale))
                    .set("dominant-baseline", "hanging");
                for line in &editor.lines {
                    text = text.add(
                        svg_element::TSpan::new("")
                            .set("x", editor.bounds.min_x())
                            .set("dy", "1.2em")
                            .add(SvgText::new(line.as_str())),
                    );
                }
                Some(
                    svg_element::Group::new()
                        .set("class", "comment-editor")
                        .add(rect(editor.bounds).set("fill", "white").set("stroke", self.selection_stroke()))
                        .add(text),
                )
            }
            SceneItem::BackToParent(button) => Some(
                svg_element::Group::new()
                    .set("class", "back-to-parent")
                    .add(rect(button.bounds))
                    .add(
                        svg_element::Text::new("")
                            .set("x", button.bounds.center().x())
                            .set("y", button.bounds.center().y())
                            .set("text-anchor", "middle")
                            .set("dominant-baseline", "central")
                            .add(SvgText::new(button.label.as_str())),
                    ),
            ),
            _ => None,
        }
    }
}

fn rect(bounds: Bounds) -> svg_element::Rectangle {
    svg_element::Rectangle::new()
        .set("x", bounds.min_x())
        .set("y", bounds.min_y())
        .set("width", bounds.width())
        .set("height", bounds.height())
}

fn transform_attr(transform: Transform) -> String {
    format!("translate({}, {}) scale({})", transform.x(), transform.y(), transform.k())
}

#[cfg(test)]
mod tests {
    use flowcanvas_core::{
        geometry::Size,
        layout::{CanvasLayout, ConnectionType},
        model::{CanvasInfo, Comment, Link, LinkKind, Node, Pipeline},
        ports::layout_canvas,
        text::CharWidthMeasure,
    };

    use super::*;
    use crate::{
        config::ViewportConfig,
        renderer::{RenderContext, RenderScope},
    };

    fn rendered_arena(canvas: &mut CanvasInfo) -> RendererArena {
        rendered_arena_with(canvas, CanvasLayout::default())
    }

    fn rendered_arena_with(canvas: &mut CanvasInfo, layout: CanvasLayout) -> RendererArena {
        layout_canvas(canvas, &layout);
        let mut arena = RendererArena::new();
        let root = canvas.primary_pipeline;
        arena.sync(canvas, root, &layout);
        arena.update_transforms(Transform::new(5.0, 5.0, 1.0));

        let measure = CharWidthMeasure::default();
        let selected = HashSet::from([Id::new("a")]);
        let ids: Vec<Id> = arena.display_order().to_vec();
        for id in ids {
            let ctx = RenderContext {
                canvas: &*canvas,
                layout: &layout,
                measure: &measure,
                selected: &selected,
                hovered: None,
                comment_links: true,
            };
            if let Some(record) = arena.record_mut(id) {
                record.renderer_mut().display_canvas(&ctx, RenderScope::Full);
            }
        }
        arena
    }

    #[test]
    fn test_document_contains_layers() {
        let mut pipeline = Pipeline::new("p");
        pipeline.nodes.push(Node::new("a", "Alpha", 0.0, 0.0).with_ports(&[], &["out"]));
        pipeline.nodes.push(Node::new("b", "Beta", 200.0, 0.0).with_ports(&["in"], &[]));
        pipeline
            .links
            .push(Link::new("l", LinkKind::NodeLink, "a", "b").with_ports("out", "in"));
        pipeline.comments.push(Comment::new("c", 0.0, 200.0, 100.0, 40.0, "hello there"));
        let mut canvas = CanvasInfo::new(pipeline);

        let arena = rendered_arena(&mut canvas);
        let viewport = Viewport::new(ViewportConfig::default(), Size::new(400.0, 300.0));
        let style = StyleConfig::new(Some("white".to_string()), Some("red".to_string()));
        let doc = SvgBuilder::new(&arena, &viewport)
            .with_style(&style)
            .unwrap()
            .build()
            .unwrap()
            .to_string();

        assert!(doc.contains(r#"data-layer="comments""#));
        assert!(doc.contains(r#"data-layer="nodes""#));
        assert!(doc.contains(r#"data-layer="links""#));
        assert!(doc.contains("Alpha"));
        assert!(doc.contains("hello there"));
        assert!(doc.contains("translate(5, 5) scale(1)"));
        // Port links show direction through their ports.
        assert!(!doc.contains("arrow-head"));
    }

    #[test]
    fn test_halo_links_have_arrow_heads() {
        let mut pipeline = Pipeline::new("p");
        pipeline.nodes.push(Node::new("a", "Alpha", 0.0, 0.0));
        pipeline.nodes.push(Node::new("b", "Beta", 200.0, 0.0));
        pipeline.links.push(Link::new("l", LinkKind::NodeLink, "a", "b"));
        let mut canvas = CanvasInfo::new(pipeline);

        let layout = CanvasLayout {
            connection_type: ConnectionType::Halo,
            ..CanvasLayout::default()
        };
        let arena = rendered_arena_with(&mut canvas, layout);
        let viewport = Viewport::new(ViewportConfig::default(), Size::new(400.0, 300.0));
        let doc = SvgBuilder::new(&arena, &viewport).build().unwrap().to_string();

        assert!(doc.contains(r#"class="arrow-head""#));
    }

    #[test]
    fn test_nested_pipeline_embedded() {
        let mut root = Pipeline::new("root");
        root.nodes.push(Node::new("s", "Super", 0.0, 0.0).with_subflow("child", true));
        let mut child = Pipeline::new("child");
        child.nodes.push(Node::new("inner", "Inner", 50.0, 50.0));
        let mut canvas = CanvasInfo::new(root).with_pipeline(child);

        let arena = rendered_arena(&mut canvas);
        let viewport = Viewport::new(ViewportConfig::default(), Size::new(400.0, 300.0));
        let doc = SvgBuilder::new(&arena, &viewport).build().unwrap().to_string();

        assert!(doc.contains("nested-pipeline"));
        assert!(doc.contains(r#"data-pipeline-id="child""#));
        assert!(doc.contains("Inner"));
    }

    #[test]
    fn test_empty_arena_is_error() {
        let arena = RendererArena::new();
        let viewport = Viewport::new(ViewportConfig::default(), Size::new(400.0, 300.0));
        assert!(matches!(
            SvgBuilder::new(&arena, &viewport).build(),
            Err(export::Error::Render(_))
        ));
    }

    #[test]
    fn test_invalid_style_rejected() {
        let arena = RendererArena::new();
        let viewport = Viewport::new(ViewportConfig::default(), Size::new(400.0, 300.0));
        let style = StyleConfig::new(Some("not-a-color".to_string()), None);
        assert!(SvgBuilder::new(&arena, &viewport).with_style(&style).is_err());
    }

    #[test]
    fn test_write_document() {
        let dir = std::env::temp_dir().join(format!("flowcanvas-svg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.svg");
        let svg = Svg::new(path.to_str().unwrap());
        svg.write_document(&Document::new()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
