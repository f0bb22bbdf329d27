//! In-memory pipeline tree.
//!
//! A [`CanvasInfo`] holds every [`Pipeline`] the canvas may display. One
//! pipeline is primary; a node whose [`SubflowRef`] names another pipeline is
//! a supernode and displays that pipeline nested inside its body.
//!
//! The records here are plain data. The engine clones the tree it receives
//! from the controller and mutates only the clone while a gesture is in
//! flight.
//!
//! # Overview
//!
//! - [`CanvasInfo`] - The pipeline tree and its primary pipeline id
//! - [`Pipeline`] - Nodes, comments and links of one diagram
//! - [`Node`], [`Port`], [`Decoration`], [`Message`] - Node records
//! - [`Comment`] - Free-text annotations
//! - [`Link`] - Node, comment and association links

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
};

// ====================================================================
// Nodes
// ====================================================================

/// Kind of node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Ordinary,
    /// Displays a nested pipeline.
    SuperNode,
    /// Proxy inside a nested pipeline for one port of the containing supernode.
    Binding,
}

/// Reference from a supernode to the pipeline it contains.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubflowRef {
    pub pipeline_id_ref: Id,
}

/// A connection point on a node.
///
/// `cy` (and `cx` in vertical format) are derived by
/// [`crate::ports::layout_node_ports`]; they are `None` until computed and are
/// never read from input documents.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Port {
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// On a supernode port: the binding node inside the nested pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subflow_node_ref: Option<Id>,
    #[serde(skip)]
    pub cy: Option<f32>,
    #[serde(skip)]
    pub cx: Option<f32>,
}

impl Port {
    pub fn new(id: &str) -> Self {
        Self {
            id: Id::new(id),
            label: None,
            class_name: None,
            subflow_node_ref: None,
            cy: None,
            cx: None,
        }
    }

    /// Links this supernode port to a binding node of the nested pipeline.
    pub fn with_subflow_node_ref(mut self, binding_node: &str) -> Self {
        self.subflow_node_ref = Some(Id::new(binding_node));
        self
    }
}

/// Fixed positions for node decorations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DecorationPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// A small marker drawn in one corner of a node.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Decoration {
    pub id: Id,
    pub position: DecorationPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// Severity of a node message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Warning,
    Error,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Warning => "warning",
            MessageKind::Error => "error",
        }
    }
}

/// A validation message attached to a node.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    pub id: Id,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub text: String,
}

/// A node in a pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Node {
    pub id: Id,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub x_pos: f32,
    pub y_pos: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_height: Option<f32>,
    #[serde(default)]
    pub input_ports: Vec<Port>,
    #[serde(default)]
    pub output_ports: Vec<Port>,
    #[serde(default)]
    pub decorations: Vec<Decoration>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub is_expanded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subflow_ref: Option<SubflowRef>,
}

impl Node {
    /// Creates an ordinary node with the default 70x75 footprint.
    pub fn new(id: &str, label: &str, x_pos: f32, y_pos: f32) -> Self {
        Self {
            id: Id::new(id),
            node_type: NodeType::Ordinary,
            label: label.to_string(),
            image: None,
            x_pos,
            y_pos,
            width: 70.0,
            height: 75.0,
            expanded_width: None,
            expanded_height: None,
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            decorations: Vec::new(),
            messages: Vec::new(),
            is_expanded: false,
            subflow_ref: None,
        }
    }

    pub fn with_ports(mut self, inputs: &[&str], outputs: &[&str]) -> Self {
        self.input_ports = inputs.iter().map(|id| Port::new(id)).collect();
        self.output_ports = outputs.iter().map(|id| Port::new(id)).collect();
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.node_type = node_type;
        self
    }

    /// Turns the node into a supernode displaying `pipeline_id`.
    pub fn with_subflow(mut self, pipeline_id: &str, expanded: bool) -> Self {
        self.node_type = NodeType::SuperNode;
        self.subflow_ref = Some(SubflowRef {
            pipeline_id_ref: Id::new(pipeline_id),
        });
        self.is_expanded = expanded;
        self
    }

    pub fn is_supernode(&self) -> bool {
        self.node_type == NodeType::SuperNode
    }

    pub fn is_binding(&self) -> bool {
        self.node_type == NodeType::Binding
    }

    pub fn is_expanded_supernode(&self) -> bool {
        self.is_supernode() && self.is_expanded
    }

    /// Pipeline displayed inside this node, if any.
    pub fn subflow_pipeline(&self) -> Option<Id> {
        self.subflow_ref.as_ref().map(|r| r.pipeline_id_ref)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x_pos, self.y_pos)
    }

    /// Displayed size: the expanded dimensions for an expanded supernode,
    /// otherwise `width`/`height`.
    pub fn size(&self) -> Size {
        if self.is_expanded_supernode() {
            Size::new(
                self.expanded_width.unwrap_or(self.width),
                self.expanded_height.unwrap_or(self.height),
            )
        } else {
            Size::new(self.width, self.height)
        }
    }

    /// Sets the displayed size, writing the expanded dimensions for an
    /// expanded supernode.
    pub fn set_size(&mut self, size: Size) {
        if self.is_expanded_supernode() {
            self.expanded_width = Some(size.width());
            self.expanded_height = Some(size.height());
        } else {
            self.width = size.width();
            self.height = size.height();
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new_from_top_left(self.position(), self.size())
    }

    pub fn input_port(&self, port_id: Id) -> Option<&Port> {
        self.input_ports.iter().find(|p| p.id == port_id)
    }

    pub fn output_port(&self, port_id: Id) -> Option<&Port> {
        self.output_ports.iter().find(|p| p.id == port_id)
    }

    /// Highest message severity on the node.
    pub fn max_message_kind(&self) -> Option<MessageKind> {
        self.messages.iter().map(|m| m.kind).max()
    }
}

// ====================================================================
// Comments and links
// ====================================================================

/// A free-text annotation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id,
    pub x_pos: f32,
    pub y_pos: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_attrs: BTreeMap<String, String>,
}

impl Comment {
    pub fn new(id: &str, x_pos: f32, y_pos: f32, width: f32, height: f32, content: &str) -> Self {
        Self {
            id: Id::new(id),
            x_pos,
            y_pos,
            width,
            height,
            content: content.to_string(),
            class_name: None,
            custom_attrs: BTreeMap::new(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x_pos, self.y_pos)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new_from_top_left(self.position(), self.size())
    }
}

/// Kind of link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkKind {
    /// Data flow between two nodes.
    #[default]
    NodeLink,
    /// From a comment to a node.
    CommentLink,
    /// Undirected association between two nodes.
    AssociationLink,
}

impl LinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::NodeLink => "nodeLink",
            LinkKind::CommentLink => "commentLink",
            LinkKind::AssociationLink => "associationLink",
        }
    }
}

/// A link between two objects of the same pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Link {
    pub id: Id,
    #[serde(rename = "type", default)]
    pub kind: LinkKind,
    pub src_node_id: Id,
    pub trg_node_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_node_port_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trg_node_port_id: Option<Id>,
}

impl Link {
    pub fn new(id: &str, kind: LinkKind, src: &str, trg: &str) -> Self {
        Self {
            id: Id::new(id),
            kind,
            src_node_id: Id::new(src),
            trg_node_id: Id::new(trg),
            src_node_port_id: None,
            trg_node_port_id: None,
        }
    }

    pub fn with_ports(mut self, src_port: &str, trg_port: &str) -> Self {
        self.src_node_port_id = Some(Id::new(src_port));
        self.trg_node_port_id = Some(Id::new(trg_port));
        self
    }

    pub fn touches(&self, object_id: Id) -> bool {
        self.src_node_id == object_id || self.trg_node_id == object_id
    }

    pub fn is_self_referencing(&self) -> bool {
        self.src_node_id == self.trg_node_id
    }
}

// ====================================================================
// Pipelines
// ====================================================================

/// One diagram.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Pipeline {
    pub id: Id,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Pipeline {
    pub fn new(id: &str) -> Self {
        Self {
            id: Id::new(id),
            nodes: Vec::new(),
            comments: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn node(&self, id: Id) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: Id) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn comment(&self, id: Id) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn comment_mut(&mut self, id: Id) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }

    pub fn link(&self, id: Id) -> Option<&Link> {
        self.links.iter().find(|l| l.id == id)
    }

    /// Bounds of the node or comment with the given id.
    pub fn object_bounds(&self, id: Id) -> Option<Bounds> {
        self.node(id)
            .map(Node::bounds)
            .or_else(|| self.comment(id).map(Comment::bounds))
    }

    pub fn contains_object(&self, id: Id) -> bool {
        self.node(id).is_some() || self.comment(id).is_some() || self.link(id).is_some()
    }

    /// Ids of every node, comment and link, in that order.
    pub fn all_object_ids(&self) -> Vec<Id> {
        self.nodes
            .iter()
            .map(|n| n.id)
            .chain(self.comments.iter().map(|c| c.id))
            .chain(self.links.iter().map(|l| l.id))
            .collect()
    }

    /// Returns `true` when both endpoints of `link` exist in this pipeline.
    pub fn link_resolves(&self, link: &Link) -> bool {
        let exists = |id| self.node(id).is_some() || self.comment(id).is_some();
        exists(link.src_node_id) && exists(link.trg_node_id)
    }

    /// Moves the given nodes and comments by `offset`.
    pub fn move_objects(&mut self, ids: &[Id], offset: Point) {
        for node in self.nodes.iter_mut().filter(|n| ids.contains(&n.id)) {
            node.x_pos += offset.x();
            node.y_pos += offset.y();
        }
        for comment in self.comments.iter_mut().filter(|c| ids.contains(&c.id)) {
            comment.x_pos += offset.x();
            comment.y_pos += offset.y();
        }
    }

    /// Moves and resizes the node or comment with the given id.
    pub fn set_object_bounds(&mut self, id: Id, bounds: Bounds) {
        if let Some(node) = self.node_mut(id) {
            node.x_pos = bounds.min_x();
            node.y_pos = bounds.min_y();
            node.set_size(bounds.to_size());
        } else if let Some(comment) = self.comment_mut(id) {
            comment.x_pos = bounds.min_x();
            comment.y_pos = bounds.min_y();
            comment.width = bounds.width();
            comment.height = bounds.height();
        }
    }

    /// Removes the given objects together with every link attached to a
    /// removed node or comment.
    pub fn remove_objects(&mut self, ids: &[Id]) {
        self.nodes.retain(|n| !ids.contains(&n.id));
        self.comments.retain(|c| !ids.contains(&c.id));
        self.links
            .retain(|l| !ids.contains(&l.id) && !ids.contains(&l.src_node_id) && !ids.contains(&l.trg_node_id));
    }

    /// Bounds around every non-binding node and every comment.
    pub fn content_bounds(&self) -> Option<Bounds> {
        self.nodes
            .iter()
            .filter(|n| !n.is_binding())
            .map(Node::bounds)
            .chain(self.comments.iter().map(Comment::bounds))
            .reduce(|acc, b| acc.merge(&b))
    }
}

/// The pipeline tree.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CanvasInfo {
    pub primary_pipeline: Id,
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,
}

impl CanvasInfo {
    /// Creates a tree holding only the given primary pipeline.
    pub fn new(primary: Pipeline) -> Self {
        Self {
            primary_pipeline: primary.id,
            pipelines: vec![primary],
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    pub fn pipeline(&self, id: Id) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.id == id)
    }

    pub fn pipeline_mut(&mut self, id: Id) -> Option<&mut Pipeline> {
        self.pipelines.iter_mut().find(|p| p.id == id)
    }

    pub fn primary(&self) -> Option<&Pipeline> {
        self.pipeline(self.primary_pipeline)
    }

    /// Finds the supernode displaying `pipeline_id`, returning the id of the
    /// pipeline holding it and the supernode itself.
    pub fn parent_of(&self, pipeline_id: Id) -> Option<(Id, &Node)> {
        self.pipelines.iter().find_map(|p| {
            p.nodes
                .iter()
                .find(|n| n.is_supernode() && n.subflow_pipeline() == Some(pipeline_id))
                .map(|n| (p.id, n))
        })
    }

    /// Pipelines displayed in place below `root` through expanded
    /// supernodes, excluding `root` itself.
    ///
    /// References to missing pipelines are skipped and a pipeline already on
    /// the result is never visited twice, so cyclic references terminate.
    pub fn expanded_descendants(&self, root: Id) -> Vec<Id> {
        let mut visited = HashSet::from([root]);
        let mut result = Vec::new();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            let Some(pipeline) = self.pipeline(current) else {
                continue;
            };
            for node in pipeline.nodes.iter().filter(|n| n.is_expanded_supernode()) {
                let Some(child) = node.subflow_pipeline() else {
                    continue;
                };
                if self.pipeline(child).is_some() && visited.insert(child) {
                    result.push(child);
                    stack.push(child);
                }
            }
        }
        result
    }
}
