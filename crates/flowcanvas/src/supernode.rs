//! Recursive rendering of expanded supernodes.
//!
//! The [`RendererArena`] holds one [`RendererRecord`] per displayed pipeline,
//! keyed by pipeline id. Records refer to their parent by id, so the tree of
//! nested renderers is plain data:
//!
//! - A record is created the first time its supernode is seen expanded
//! - Collapsing a supernode hides its record instead of dropping it
//! - Records whose supernode no longer exists (after a delete or an undo)
//!   are removed by set difference on the next sync
//! - A pipeline already displayed is never displayed twice, so cyclic
//!   supernode references terminate
//!
//! Each nested pipeline is scaled down to fit its supernode's content area.
//! Its binding nodes are then moved to the edge of that area, level with the
//! supernode port they stand for, so links appear to pass through the
//! supernode's border.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use log::{debug, info, warn};

use flowcanvas_core::{
    geometry::{Bounds, Point},
    identifier::Id,
    layout::CanvasLayout,
    model::{CanvasInfo, Node, Pipeline},
    ports::port_offset,
};

use crate::{renderer::SceneRenderer, renderer::supernode_content_area, viewport::Transform};

/// Smallest scale a nested pipeline is drawn at.
const MIN_NESTED_SCALE: f32 = 0.01;

/// A displayed pipeline and where it is drawn.
#[derive(Debug)]
pub struct RendererRecord {
    pipeline_id: Id,
    parent: Option<Id>,
    supernode_id: Option<Id>,
    renderer: SceneRenderer,
    visible: bool,
    area: Bounds,
    local_transform: Transform,
    screen_transform: Transform,
}

impl RendererRecord {
    fn new(pipeline_id: Id) -> Self {
        Self {
            pipeline_id,
            parent: None,
            supernode_id: None,
            renderer: SceneRenderer::new(pipeline_id),
            visible: true,
            area: Bounds::default(),
            local_transform: Transform::IDENTITY,
            screen_transform: Transform::IDENTITY,
        }
    }

    pub fn pipeline_id(&self) -> Id {
        self.pipeline_id
    }

    /// Pipeline holding the supernode this record is nested in.
    pub fn parent(&self) -> Option<Id> {
        self.parent
    }

    pub fn supernode_id(&self) -> Option<Id> {
        self.supernode_id
    }

    pub fn renderer(&self) -> &SceneRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut SceneRenderer {
        &mut self.renderer
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_nested(&self) -> bool {
        self.parent.is_some()
    }

    /// Supernode content area, in the parent pipeline's coordinates.
    pub fn area(&self) -> Bounds {
        self.area
    }

    /// Maps this pipeline's content into its area.
    pub fn local_transform(&self) -> Transform {
        self.local_transform
    }

    /// Maps this pipeline's content to the screen.
    pub fn screen_transform(&self) -> Transform {
        self.screen_transform
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingSide {
    Entry,
    Exit,
}

#[derive(Debug)]
struct BindingSlot {
    binding_id: Id,
    side: BindingSide,
    offset: f32,
}

#[derive(Debug)]
struct Placement {
    pipeline_id: Id,
    parent: Id,
    supernode_id: Id,
    area: Bounds,
    bindings: Vec<BindingSlot>,
}

/// Arena of renderer records keyed by pipeline id.
#[derive(Debug, Default)]
pub struct RendererArena {
    records: IndexMap<Id, RendererRecord>,
    order: Vec<Id>,
}

impl RendererArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, pipeline_id: Id) -> bool {
        self.records.contains_key(&pipeline_id)
    }

    pub fn record(&self, pipeline_id: Id) -> Option<&RendererRecord> {
        self.records.get(&pipeline_id)
    }

    pub fn record_mut(&mut self, pipeline_id: Id) -> Option<&mut RendererRecord> {
        self.records.get_mut(&pipeline_id)
    }

    /// The pipeline drawn at the top level, if synced.
    pub fn root(&self) -> Option<Id> {
        self.order.first().copied()
    }

    /// Visible records, parents before children.
    pub fn visible(&self) -> impl Iterator<Item = &RendererRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// Ids of visible records, parents before children.
    pub fn display_order(&self) -> &[Id] {
        &self.order
    }

    /// Nested records drawn inside `supernode_id` of `parent`.
    pub fn child_of(&self, parent: Id, supernode_id: Id) -> Option<&RendererRecord> {
        self.visible()
            .find(|r| r.parent == Some(parent) && r.supernode_id == Some(supernode_id))
    }

    /// Brings the arena in line with `canvas` displayed from `root`, and
    /// moves binding nodes of every nested pipeline to their supernode's
    /// edge.
    pub fn sync(&mut self, canvas: &mut CanvasInfo, root: Id, layout: &CanvasLayout) {
        let placements = plan(canvas, root, layout);

        let root_record = self.records.entry(root).or_insert_with(|| {
            info!(pipeline_id:% = root; "Creating pipeline renderer");
            RendererRecord::new(root)
        });
        root_record.parent = None;
        root_record.supernode_id = None;
        root_record.visible = true;
        root_record.local_transform = Transform::IDENTITY;

        let mut order = vec![root];
        for placement in &placements {
            let local = nested_transform(canvas.pipeline(placement.pipeline_id), placement.area, layout);
            if let Some(pipeline) = canvas.pipeline_mut(placement.pipeline_id) {
                place_bindings(pipeline, placement, local, layout);
            }

            let mut fresh = false;
            let record = self.records.entry(placement.pipeline_id).or_insert_with(|| {
                info!(
                    pipeline_id:% = placement.pipeline_id,
                    supernode_id:% = placement.supernode_id;
                    "Creating nested renderer"
                );
                fresh = true;
                RendererRecord::new(placement.pipeline_id)
            });
            let reshown = !record.visible;
            record.parent = Some(placement.parent);
            record.supernode_id = Some(placement.supernode_id);
            record.visible = true;
            record.area = placement.area;
            record.local_transform = local;
            order.push(placement.pipeline_id);

            if fresh || reshown {
                validate_bindings(canvas, placement);
            }
        }

        let displayed: HashSet<Id> = order.iter().copied().collect();
        let mut stale = Vec::new();
        for (id, record) in self.records.iter_mut() {
            if displayed.contains(id) {
                continue;
            }
            let still_referenced = canvas.pipeline(*id).is_some() && canvas.parent_of(*id).is_some();
            if still_referenced {
                if record.visible {
                    debug!(pipeline_id:% = id; "Hiding nested renderer");
                }
                record.visible = false;
            } else {
                stale.push(*id);
            }
        }
        for id in stale {
            info!(pipeline_id:% = id; "Removing stale nested renderer");
            self.records.shift_remove(&id);
        }

        self.order = order;
    }

    /// Recomputes screen transforms from the viewport transform.
    pub fn update_transforms(&mut self, viewport: Transform) {
        for idx in 0..self.order.len() {
            let id = self.order[idx];
            let parent_screen = self
                .records
                .get(&id)
                .and_then(|r| r.parent)
                .and_then(|parent| self.records.get(&parent))
                .map(|parent| parent.screen_transform);
            if let Some(record) = self.records.get_mut(&id) {
                record.screen_transform = match parent_screen {
                    Some(parent) => record.local_transform.nested_in(parent, record.area.min_point()),
                    None => viewport,
                };
            }
        }
    }

    /// Screen rectangle of a nested record's area.
    pub fn screen_area(&self, pipeline_id: Id) -> Option<Bounds> {
        let record = self.records.get(&pipeline_id)?;
        let parent = self.records.get(&record.parent?)?;
        Some(parent.screen_transform.apply_bounds(record.area))
    }

    /// Deepest visible pipeline whose area contains the screen point, or the
    /// root.
    pub fn pipeline_at(&self, screen: Point) -> Option<Id> {
        self.order
            .iter()
            .rev()
            .find(|&&id| match self.screen_area(id) {
                Some(area) => area.contains_point(screen),
                None => true,
            })
            .copied()
    }
}

/// Walks expanded supernodes breadth first from `root`.
fn plan(canvas: &CanvasInfo, root: Id, layout: &CanvasLayout) -> Vec<Placement> {
    let mut placements = Vec::new();
    let mut visited = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);

    while let Some(current) = queue.pop_front() {
        let Some(pipeline) = canvas.pipeline(current) else {
            continue;
        };
        for node in pipeline.nodes.iter().filter(|n| n.is_expanded_supernode()) {
            let Some(child) = node.subflow_pipeline() else {
                continue;
            };
            if canvas.pipeline(child).is_none() {
                warn!(supernode_id:% = node.id, pipeline_id:% = child; "Supernode references a missing pipeline");
                continue;
            }
            if !visited.insert(child) {
                warn!(supernode_id:% = node.id, pipeline_id:% = child; "Pipeline already displayed, not nesting it again");
                continue;
            }
            placements.push(Placement {
                pipeline_id: child,
                parent: current,
                supernode_id: node.id,
                area: supernode_content_area(node, layout),
                bindings: binding_slots(node, layout),
            });
            queue.push_back(child);
        }
    }
    placements
}

fn binding_slots(node: &Node, layout: &CanvasLayout) -> Vec<BindingSlot> {
    let inset = if layout.is_vertical() {
        layout.supernode_side_area_width
    } else {
        layout.supernode_top_area_height
    };
    let entries = node.input_ports.iter().map(|p| (p, BindingSide::Entry));
    let exits = node.output_ports.iter().map(|p| (p, BindingSide::Exit));
    entries
        .chain(exits)
        .filter_map(|(port, side)| {
            Some(BindingSlot {
                binding_id: port.subflow_node_ref?,
                side,
                offset: port_offset(port, layout)? - inset,
            })
        })
        .collect()
}

fn nested_transform(pipeline: Option<&Pipeline>, area: Bounds, layout: &CanvasLayout) -> Transform {
    match pipeline.and_then(Pipeline::content_bounds) {
        Some(content) => Transform::fit(
            content,
            area.to_size(),
            layout.supernode_side_area_width,
            MIN_NESTED_SCALE,
            1.0,
        ),
        None => Transform::IDENTITY,
    }
}

/// Moves binding nodes to the edge of the nested surface, level with the
/// supernode port each stands for.
fn place_bindings(pipeline: &mut Pipeline, placement: &Placement, local: Transform, layout: &CanvasLayout) {
    let area = placement.area;
    for slot in &placement.bindings {
        let Some(node) = pipeline.node_mut(slot.binding_id) else {
            continue;
        };
        let size = node.size();
        if layout.is_vertical() {
            let (edge_y, y_pos) = match slot.side {
                BindingSide::Entry => {
                    let edge = local.invert(Point::new(slot.offset, 0.0));
                    (edge, edge.y())
                }
                BindingSide::Exit => {
                    let edge = local.invert(Point::new(slot.offset, area.height()));
                    (edge, edge.y() - size.height())
                }
            };
            node.x_pos = edge_y.x() - size.width() / 2.0;
            node.y_pos = y_pos;
        } else {
            let (edge, x_pos) = match slot.side {
                BindingSide::Entry => {
                    let edge = local.invert(Point::new(0.0, slot.offset));
                    (edge, edge.x())
                }
                BindingSide::Exit => {
                    let edge = local.invert(Point::new(area.width(), slot.offset));
                    (edge, edge.x() - size.width())
                }
            };
            node.x_pos = x_pos;
            node.y_pos = edge.y() - size.height() / 2.0;
        }
    }
}

/// Warns when binding nodes and supernode ports do not pair up one to one.
fn validate_bindings(canvas: &CanvasInfo, placement: &Placement) {
    let (Some(parent), Some(child)) = (canvas.pipeline(placement.parent), canvas.pipeline(placement.pipeline_id))
    else {
        return;
    };
    let Some(supernode) = parent.node(placement.supernode_id) else {
        return;
    };

    let bindings: HashSet<Id> = child.nodes.iter().filter(|n| n.is_binding()).map(|n| n.id).collect();
    let mut referenced = HashSet::new();
    for port in supernode.input_ports.iter().chain(&supernode.output_ports) {
        match port.subflow_node_ref {
            Some(binding) if bindings.contains(&binding) => {
                if !referenced.insert(binding) {
                    warn!(port_id:% = port.id, binding_id:% = binding; "Binding node shared by several ports");
                }
            }
            Some(binding) => {
                warn!(port_id:% = port.id, binding_id:% = binding; "Supernode port references a missing binding node");
            }
            None => {
                warn!(supernode_id:% = supernode.id, port_id:% = port.id; "Supernode port has no binding node");
            }
        }
    }
    for binding in bindings.difference(&referenced) {
        warn!(pipeline_id:% = child.id, binding_id:% = binding; "Binding node has no supernode port");
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use flowcanvas_core::{model::NodeType, ports::layout_canvas};

    use super::*;

    fn nested_canvas(expanded: bool) -> CanvasInfo {
        let mut root = Pipeline::new("root");
        let mut supernode = Node::new("s", "Super", 0.0, 0.0).with_subflow("child", expanded);
        supernode.input_ports.push(flowcanvas_core::model::Port::new("in").with_subflow_node_ref("entry"));
        supernode.output_ports.push(flowcanvas_core::model::Port::new("out").with_subflow_node_ref("exit"));
        root.nodes.push(supernode);

        let mut child = Pipeline::new("child");
        child.nodes.push(Node::new("work", "Work", 100.0, 100.0).with_ports(&["in"], &["out"]));
        child
            .nodes
            .push(Node::new("entry", "", 0.0, 0.0).with_type(NodeType::Binding).with_ports(&[], &["out"]));
        child
            .nodes
            .push(Node::new("exit", "", 0.0, 0.0).with_type(NodeType::Binding).with_ports(&["in"], &[]));

        let mut canvas = CanvasInfo::new(root).with_pipeline(child);
        layout_canvas(&mut canvas, &CanvasLayout::default());
        canvas
    }

    #[test]
    fn test_lazy_creation_and_hide() {
        let layout = CanvasLayout::default();
        let mut canvas = nested_canvas(false);
        let mut arena = RendererArena::new();
        arena.sync(&mut canvas, Id::new("root"), &layout);
        assert_eq!(arena.len(), 1);

        canvas.pipeline_mut(Id::new("root")).unwrap().nodes[0].is_expanded = true;
        layout_canvas(&mut canvas, &layout);
        arena.sync(&mut canvas, Id::new("root"), &layout);
        assert_eq!(arena.len(), 2);
        assert!(arena.record(Id::new("child")).unwrap().is_visible());

        canvas.pipeline_mut(Id::new("root")).unwrap().nodes[0].is_expanded = false;
        arena.sync(&mut canvas, Id::new("root"), &layout);
        assert_eq!(arena.len(), 2);
        assert!(!arena.record(Id::new("child")).unwrap().is_visible());
        assert_eq!(arena.display_order(), &[Id::new("root")]);
    }

    #[test]
    fn test_stale_record_removed() {
        let layout = CanvasLayout::default();
        let mut canvas = nested_canvas(true);
        let mut arena = RendererArena::new();
        arena.sync(&mut canvas, Id::new("root"), &layout);
        assert!(arena.contains(Id::new("child")));

        canvas.pipeline_mut(Id::new("root")).unwrap().nodes.clear();
        arena.sync(&mut canvas, Id::new("root"), &layout);
        assert!(!arena.contains(Id::new("child")));
    }

    #[test]
    fn test_cycle_terminates() {
        let layout = CanvasLayout::default();
        let mut canvas = nested_canvas(true);
        canvas
            .pipeline_mut(Id::new("child"))
            .unwrap()
            .nodes
            .push(Node::new("back", "Back", 300.0, 0.0).with_subflow("root", true));
        layout_canvas(&mut canvas, &layout);

        let mut arena = RendererArena::new();
        arena.sync(&mut canvas, Id::new("root"), &layout);
        assert_eq!(arena.display_order(), &[Id::new("root"), Id::new("child")]);
    }

    #[test]
    fn test_bindings_sit_on_area_edges() {
        let layout = CanvasLayout::default();
        let mut canvas = nested_canvas(true);
        let mut arena = RendererArena::new();
        arena.sync(&mut canvas, Id::new("root"), &layout);

        let record = arena.record(Id::new("child")).unwrap();
        let local = record.local_transform();
        let child = canvas.pipeline(Id::new("child")).unwrap();
        let entry = child.node(Id::new("entry")).unwrap();
        let exit = child.node(Id::new("exit")).unwrap();

        // Entry binding's left edge maps to the area's left edge.
        assert_approx_eq!(f32, local.apply(entry.position()).x(), 0.0, epsilon = 0.001);
        // Exit binding's right edge maps to the area's right edge.
        let exit_right = Point::new(exit.bounds().max_x(), exit.y_pos);
        assert_approx_eq!(f32, local.apply(exit_right).x(), record.area().width(), epsilon = 0.001);
        // Level with the supernode port: port at 100 on a 200 tall node, area starts at 20.
        assert_approx_eq!(f32, local.apply(entry.bounds().center()).y(), 80.0, epsilon = 0.001);
    }

    #[test]
    fn test_screen_transforms_and_pipeline_at() {
        let layout = CanvasLayout::default();
        let mut canvas = nested_canvas(true);
        let mut arena = RendererArena::new();
        arena.sync(&mut canvas, Id::new("root"), &layout);
        arena.update_transforms(Transform::new(50.0, 50.0, 2.0));

        assert_eq!(arena.record(Id::new("root")).unwrap().screen_transform(), Transform::new(50.0, 50.0, 2.0));
        // Area (10, 20) 180x170 lands at (70, 90) on screen.
        let area = arena.screen_area(Id::new("child")).unwrap();
        assert_eq!(area.min_point(), Point::new(70.0, 90.0));
        assert_eq!(arena.pipeline_at(Point::new(100.0, 120.0)), Some(Id::new("child")));
        assert_eq!(arena.pipeline_at(Point::new(60.0, 60.0)), Some(Id::new("root")));
    }
}
