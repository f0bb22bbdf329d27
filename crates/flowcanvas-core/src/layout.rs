//! Layout constants and mode flags for the canvas.
//!
//! [`CanvasLayout`] is a flat record of pixel constants and mode flags shared
//! by port layout, routing, hit testing and rendering. Every field has a
//! default, so partial TOML/JSON documents deserialize cleanly.
//!
//! # Example
//!
//! ```
//! # use flowcanvas_core::layout::{CanvasLayout, LinkType};
//! let layout = CanvasLayout::default();
//! assert_eq!(layout.link_type, LinkType::Curve);
//! assert_eq!(layout.min_initial_line, 30.0);
//! assert_eq!(layout.elbow_size, 10.0);
//! ```

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::geometry::Size;

/// How links attach to nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Links attach to the node perimeter; new links start from a halo ring.
    Halo,
    /// Links attach to discrete input and output ports.
    #[default]
    Ports,
}

impl FromStr for ConnectionType {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "halo" => Ok(Self::Halo),
            "ports" => Ok(Self::Ports),
            _ => Err("Unsupported connection type"),
        }
    }
}

impl From<ConnectionType> for &'static str {
    fn from(val: ConnectionType) -> Self {
        match val {
            ConnectionType::Halo => "halo",
            ConnectionType::Ports => "ports",
        }
    }
}

impl Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &'static str = (*self).into();
        write!(f, "{s}")
    }
}

/// The link path-drawing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum LinkType {
    #[default]
    Curve,
    Elbow,
    Straight,
    #[serde(alias = "Parallax")]
    Lightning,
}

impl FromStr for LinkType {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "curve" => Ok(Self::Curve),
            "elbow" => Ok(Self::Elbow),
            "straight" => Ok(Self::Straight),
            "lightning" | "parallax" => Ok(Self::Lightning),
            _ => Err("Unsupported link type"),
        }
    }
}

impl From<LinkType> for &'static str {
    fn from(val: LinkType) -> Self {
        match val {
            LinkType::Curve => "Curve",
            LinkType::Elbow => "Elbow",
            LinkType::Straight => "Straight",
            LinkType::Lightning => "Lightning",
        }
    }
}

impl Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &'static str = (*self).into();
        write!(f, "{s}")
    }
}

/// Orientation of node ports and link flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeFormatType {
    /// Inputs on the left edge, outputs on the right edge.
    #[default]
    Horizontal,
    /// Inputs on the top edge, outputs on the bottom edge.
    Vertical,
}

impl FromStr for NodeFormatType {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "horizontal" => Ok(Self::Horizontal),
            "vertical" => Ok(Self::Vertical),
            _ => Err("Unsupported node format type"),
        }
    }
}

impl From<NodeFormatType> for &'static str {
    fn from(val: NodeFormatType) -> Self {
        match val {
            NodeFormatType::Horizontal => "horizontal",
            NodeFormatType::Vertical => "vertical",
        }
    }
}

impl Display for NodeFormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &'static str = (*self).into();
        write!(f, "{s}")
    }
}

/// Flat record of pixel constants and mode flags.
///
/// All lengths are in canvas (content) units, before the viewport transform.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CanvasLayout {
    pub connection_type: ConnectionType,
    pub link_type: LinkType,
    pub node_format_type: NodeFormatType,

    // Nodes
    pub default_node_width: f32,
    pub default_node_height: f32,
    pub node_image_pos_y: f32,
    pub node_image_size: f32,
    pub node_label_pos_y: f32,
    pub node_label_height: f32,
    /// Horizontal padding on each side of the node label.
    pub node_label_padding: f32,
    pub node_bottom_padding: f32,
    pub decoration_size: f32,
    pub decoration_padding: f32,
    pub message_indicator_size: f32,

    // Ports
    pub port_radius: f32,
    pub port_arc_radius: f32,
    pub port_arc_spacing: f32,
    /// Offset of the first port from the node's leading edge.
    pub port_arc_offset: f32,
    /// Offset of a lone port on a default-height node (horizontal format).
    pub port_pos_y: f32,
    /// Offset of a lone port on a default-width node (vertical format).
    pub port_pos_x: f32,

    // Links
    pub min_initial_line: f32,
    pub elbow_size: f32,
    /// Distance of the halo ring from the node outline.
    pub halo_gap: f32,
    /// Distance between a halo-mode link end and the object outline.
    pub link_gap: f32,
    /// Padding added around endpoints when testing for overlap.
    pub highlight_gap: f32,
    /// Lightning links fall back to straight when the target sits further
    /// behind the source than this.
    pub lightning_backward_threshold: f32,
    /// Lightning links fall back to straight when the vertical gap is
    /// smaller than this.
    pub lightning_min_vertical_gap: f32,
    /// Self-referencing links detour this far below the node.
    pub self_link_margin: f32,
    pub arrow_head_length: f32,
    pub arrow_head_half_width: f32,
    /// Skip links whose padded endpoint boxes overlap.
    pub suppress_overlapping_links: bool,

    // Comments
    pub comment_padding: f32,
    pub comment_line_height: f32,
    pub comment_min_width: f32,
    pub comment_min_height: f32,
    pub comment_connection_handle_size: f32,

    // Supernodes
    pub supernode_default_width: f32,
    pub supernode_default_height: f32,
    pub supernode_top_area_height: f32,
    pub supernode_side_area_width: f32,
    pub supernode_bottom_area_height: f32,
    pub supernode_icon_size: f32,
    pub supernode_label_min_width: f32,
    pub binding_node_width: f32,
    pub binding_node_height: f32,
    pub back_to_parent_height: f32,

    // Interaction affordances
    pub resize_handle_size: f32,
}

impl Default for CanvasLayout {
    fn default() -> Self {
        Self {
            connection_type: ConnectionType::default(),
            link_type: LinkType::default(),
            node_format_type: NodeFormatType::default(),

            default_node_width: 70.0,
            default_node_height: 75.0,
            node_image_pos_y: 8.0,
            node_image_size: 40.0,
            node_label_pos_y: 53.0,
            node_label_height: 15.0,
            node_label_padding: 9.0,
            node_bottom_padding: 4.0,
            decoration_size: 12.0,
            decoration_padding: 2.0,
            message_indicator_size: 10.0,

            port_radius: 6.0,
            port_arc_radius: 6.0,
            port_arc_spacing: 3.0,
            port_arc_offset: 20.0,
            port_pos_y: 37.5,
            port_pos_x: 35.0,

            min_initial_line: 30.0,
            elbow_size: 10.0,
            halo_gap: 4.0,
            link_gap: 7.0,
            highlight_gap: 1.0,
            lightning_backward_threshold: 10.0,
            lightning_min_vertical_gap: 5.0,
            self_link_margin: 20.0,
            arrow_head_length: 8.0,
            arrow_head_half_width: 4.0,
            suppress_overlapping_links: false,

            comment_padding: 5.0,
            comment_line_height: 16.0,
            comment_min_width: 20.0,
            comment_min_height: 20.0,
            comment_connection_handle_size: 8.0,

            supernode_default_width: 200.0,
            supernode_default_height: 200.0,
            supernode_top_area_height: 20.0,
            supernode_side_area_width: 10.0,
            supernode_bottom_area_height: 10.0,
            supernode_icon_size: 16.0,
            supernode_label_min_width: 40.0,
            binding_node_width: 70.0,
            binding_node_height: 75.0,
            back_to_parent_height: 30.0,

            resize_handle_size: 10.0,
        }
    }
}

impl CanvasLayout {
    /// Smallest size a collapsed node may take: room for the image above the
    /// label with label padding on both sides.
    pub fn min_node_size(&self) -> Size {
        Size::new(
            self.node_image_size + 2.0 * self.node_label_padding,
            self.node_label_pos_y + self.node_label_height + self.node_bottom_padding,
        )
    }

    /// Smallest size an expanded supernode may take: the header icons and a
    /// minimal label, plus the nested area's side and bottom margins.
    pub fn min_supernode_size(&self) -> Size {
        Size::new(
            2.0 * self.supernode_icon_size
                + self.supernode_label_min_width
                + 2.0 * self.supernode_side_area_width,
            self.supernode_top_area_height + self.supernode_bottom_area_height + 2.0 * self.port_arc_offset,
        )
    }

    /// Smallest size a comment may take.
    pub fn min_comment_size(&self) -> Size {
        Size::new(self.comment_min_width, self.comment_min_height)
    }

    /// Available width for a node label on a node of the given width.
    pub fn node_label_width(&self, node_width: f32) -> f32 {
        (node_width - 2.0 * self.node_label_padding).max(0.0)
    }

    /// Distance from the port center to the next port's center.
    pub fn port_pitch(&self) -> f32 {
        2.0 * self.port_arc_radius + self.port_arc_spacing
    }

    pub fn is_vertical(&self) -> bool {
        self.node_format_type == NodeFormatType::Vertical
    }

    pub fn is_halo(&self) -> bool {
        self.connection_type == ConnectionType::Halo
    }
}
