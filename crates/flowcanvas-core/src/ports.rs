//! Derived port offsets.
//!
//! Port offsets are never read from input: they are recomputed from the node
//! size and port count by [`layout_node_ports`] every time a pipeline is
//! prepared for display. In horizontal format the offset is `cy`, measured
//! down from the node's top edge; in vertical format it is `cx`, measured
//! right from the node's left edge.
//!
//! A lone port on a node of default extent sits at the layout's fixed
//! position (`port_pos_y` / `port_pos_x`). Otherwise ports are spaced by
//! twice the arc radius plus the arc spacing, starting at `port_arc_offset`,
//! or centered when the node is larger than the default. A node too small for
//! its ports grows to fit them.

use log::debug;

use crate::{
    geometry::Size,
    layout::CanvasLayout,
    model::{CanvasInfo, Node, Pipeline, Port},
};

/// Extent along the port axis occupied by `count` ports.
fn occupied_extent(count: usize, layout: &CanvasLayout) -> f32 {
    if count == 0 {
        return 0.0;
    }
    count as f32 * 2.0 * layout.port_arc_radius + (count - 1) as f32 * layout.port_arc_spacing
}

/// Minimum node extent along the port axis needed to hold the node's ports.
pub fn required_port_extent(node: &Node, layout: &CanvasLayout) -> f32 {
    let count = node.input_ports.len().max(node.output_ports.len());
    if count <= 1 {
        return 0.0;
    }
    occupied_extent(count, layout) + 2.0 * layout.port_arc_offset
}

fn port_offsets(count: usize, extent: f32, default_extent: f32, lone_pos: f32, layout: &CanvasLayout) -> Vec<f32> {
    if count == 1 && extent <= default_extent {
        return vec![lone_pos];
    }

    let start = if extent > default_extent {
        (extent - occupied_extent(count, layout)) / 2.0
    } else {
        layout.port_arc_offset
    };

    (0..count)
        .map(|idx| start + layout.port_arc_radius + idx as f32 * layout.port_pitch())
        .collect()
}

fn assign_offsets(ports: &mut [Port], extent: f32, layout: &CanvasLayout) {
    let vertical = layout.is_vertical();
    let (default_extent, lone_pos) = if vertical {
        (layout.default_node_width, layout.port_pos_x)
    } else {
        (layout.default_node_height, layout.port_pos_y)
    };

    let offsets = port_offsets(ports.len(), extent, default_extent, lone_pos, layout);
    for (port, offset) in ports.iter_mut().zip(offsets) {
        if vertical {
            port.cx = Some(offset);
            port.cy = None;
        } else {
            port.cy = Some(offset);
            port.cx = None;
        }
    }
}

/// Recomputes the offsets of every port on `node`, growing the node first
/// when it is too small to hold them.
///
/// Returns `true` when the node was resized.
pub fn layout_node_ports(node: &mut Node, layout: &CanvasLayout) -> bool {
    let vertical = layout.is_vertical();
    let size = node.size();
    let extent = if vertical { size.width() } else { size.height() };
    let required = required_port_extent(node, layout);

    let grown = required > extent;
    let extent = if grown {
        let new_size = if vertical {
            Size::new(required, size.height())
        } else {
            Size::new(size.width(), required)
        };
        debug!(node_id:% = node.id, extent = required; "Growing node to fit its ports");
        node.set_size(new_size);
        required
    } else {
        extent
    };

    assign_offsets(&mut node.input_ports, extent, layout);
    assign_offsets(&mut node.output_ports, extent, layout);
    grown
}

/// Reads the derived offset of `port` for the configured node format.
pub fn port_offset(port: &Port, layout: &CanvasLayout) -> Option<f32> {
    if layout.is_vertical() { port.cx } else { port.cy }
}

/// Prepares every node of `pipeline` for display: fills in default expanded
/// dimensions of expanded supernodes, then recomputes port offsets.
pub fn layout_pipeline(pipeline: &mut Pipeline, layout: &CanvasLayout) {
    for node in &mut pipeline.nodes {
        if node.is_expanded_supernode() {
            node.expanded_width
                .get_or_insert(layout.supernode_default_width.max(node.width));
            node.expanded_height
                .get_or_insert(layout.supernode_default_height.max(node.height));
        }
        layout_node_ports(node, layout);
    }
}

/// Runs [`layout_pipeline`] over every pipeline of the tree.
pub fn layout_canvas(info: &mut CanvasInfo, layout: &CanvasLayout) {
    for pipeline in &mut info.pipelines {
        layout_pipeline(pipeline, layout);
    }
}
