//! Declarative scene description.
//!
//! Each pipeline renderer owns a [`Scene`]: an ordered map from a stable
//! [`SceneKey`] to the [`SceneItem`] to draw. Renderers rebuild the items they
//! own and reconcile them against the previous frame, producing a
//! [`SceneDiff`] of entered, updated and exited keys. Drawing back ends (the
//! SVG exporter, or a host's retained surface) consume the scene, and may use
//! the diff to patch only what changed.
//!
//! # Overview
//!
//! - [`Layer`] - Z-order: comments, then nodes, then links, then overlays
//! - [`SceneItem`] - Node, comment, link and overlay shapes
//! - [`Scene`] - Keyed item storage with reconciliation
//!
//! Node and comment items keep their internal geometry relative to their
//! `position`, so a drag only touches the position of moved items.

use indexmap::IndexMap;

use flowcanvas_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
    model::{DecorationPosition, LinkKind, MessageKind, NodeType},
    routing::RoutedLink,
};

/// Kind of object a scene item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Node,
    Comment,
    Link,
    Overlay,
}

impl ItemKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Comment => "comment",
            Self::Link => "link",
            Self::Overlay => "overlay",
        }
    }
}

/// Stable identity of a scene item across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneKey {
    pipeline_id: Id,
    kind: ItemKind,
    id: Id,
}

impl SceneKey {
    pub fn new(pipeline_id: Id, kind: ItemKind, id: Id) -> Self {
        Self { pipeline_id, kind, id }
    }

    pub fn pipeline_id(&self) -> Id {
        self.pipeline_id
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn id(&self) -> Id {
        self.id
    }
}

/// Drawing layers. Declaration order is bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Comments,
    Nodes,
    Links,
    Overlay,
}

impl Layer {
    pub const ALL: [Layer; 4] = [Layer::Comments, Layer::Nodes, Layer::Links, Layer::Overlay];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Comments => "comments",
            Self::Nodes => "nodes",
            Self::Links => "links",
            Self::Overlay => "overlay",
        }
    }
}

// ====================================================================
// Items
// ====================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Port circle, centered relative to the node's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct PortShape {
    pub id: Id,
    pub direction: PortDirection,
    pub center: Point,
    pub radius: f32,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecorationShape {
    pub id: Id,
    pub position: DecorationPosition,
    pub bounds: Bounds,
    pub label: Option<String>,
    pub class_name: Option<String>,
}

/// Severity marker for the node's worst message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageIndicator {
    pub kind: MessageKind,
    pub bounds: Bounds,
}

/// Area of an expanded supernode in which its pipeline is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedArea {
    pub pipeline_id: Id,
    pub area: Bounds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageShape {
    pub href: String,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeItem {
    pub position: Point,
    pub size: Size,
    pub node_type: NodeType,
    pub label: String,
    pub label_origin: Point,
    pub image: Option<ImageShape>,
    pub ports: Vec<PortShape>,
    pub halo: Option<Bounds>,
    pub decorations: Vec<DecorationShape>,
    pub message: Option<MessageIndicator>,
    pub nested: Option<NestedArea>,
    pub resizable: bool,
    pub selected: bool,
    pub hovered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentItem {
    pub position: Point,
    pub size: Size,
    pub lines: Vec<String>,
    pub padding: f32,
    pub line_height: f32,
    pub class_name: Option<String>,
    pub connector: Option<Bounds>,
    pub selected: bool,
    pub hovered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkItem {
    pub kind: LinkKind,
    pub src_id: Id,
    pub trg_id: Id,
    pub route: RoutedLink,
    pub selected: bool,
}

/// Line from a new link's origin to the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct RubberBandItem {
    pub path: String,
}

/// Region-select rectangle in content coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionItem {
    pub bounds: Bounds,
}

/// Inline comment editor, in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorItem {
    pub bounds: Bounds,
    pub lines: Vec<String>,
    pub scale: f32,
}

/// "Back to parent" button shown in full-page mode, in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct BackToParentItem {
    pub bounds: Bounds,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneItem {
    Node(NodeItem),
    Comment(CommentItem),
    Link(LinkItem),
    RubberBand(RubberBandItem),
    Region(RegionItem),
    EditorBox(EditorItem),
    BackToParent(BackToParentItem),
}

impl SceneItem {
    pub fn layer(&self) -> Layer {
        match self {
            Self::Comment(_) => Layer::Comments,
            Self::Node(_) => Layer::Nodes,
            Self::Link(_) => Layer::Links,
            Self::RubberBand(_) | Self::Region(_) | Self::EditorBox(_) | Self::BackToParent(_) => Layer::Overlay,
        }
    }

    /// Items positioned in screen pixels rather than pipeline content
    /// coordinates.
    pub fn is_screen_space(&self) -> bool {
        matches!(self, Self::EditorBox(_) | Self::BackToParent(_))
    }

    fn set_selected(&mut self, value: bool) -> bool {
        let slot = match self {
            Self::Node(node) => &mut node.selected,
            Self::Comment(comment) => &mut comment.selected,
            Self::Link(link) => &mut link.selected,
            _ => return false,
        };
        let changed = *slot != value;
        *slot = value;
        changed
    }

    fn set_hovered(&mut self, value: bool) -> bool {
        let slot = match self {
            Self::Node(node) => &mut node.hovered,
            Self::Comment(comment) => &mut comment.hovered,
            _ => return false,
        };
        let changed = *slot != value;
        *slot = value;
        changed
    }

    fn set_position(&mut self, position: Point) -> bool {
        let slot = match self {
            Self::Node(node) => &mut node.position,
            Self::Comment(comment) => &mut comment.position,
            _ => return false,
        };
        let changed = *slot != position;
        *slot = position;
        changed
    }
}

// ====================================================================
// Scene and diffs
// ====================================================================

/// Keys touched by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDiff {
    pub entered: Vec<SceneKey>,
    pub updated: Vec<SceneKey>,
    pub exited: Vec<SceneKey>,
}

impl SceneDiff {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.updated.is_empty() && self.exited.is_empty()
    }

    /// Every key in the diff.
    pub fn touched(&self) -> impl Iterator<Item = &SceneKey> {
        self.entered.iter().chain(&self.updated).chain(&self.exited)
    }

    pub fn merge(&mut self, other: SceneDiff) {
        self.entered.extend(other.entered);
        self.updated.extend(other.updated);
        self.exited.extend(other.exited);
    }
}

/// Keyed scene items of one pipeline.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    items: IndexMap<SceneKey, SceneItem>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &SceneKey) -> Option<&SceneItem> {
        self.items.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SceneKey, &SceneItem)> {
        self.items.iter()
    }

    /// Finds the item of `kind` with `id`, whatever its pipeline.
    pub fn find(&self, kind: ItemKind, id: Id) -> Option<&SceneItem> {
        self.items
            .iter()
            .find(|(key, _)| key.kind == kind && key.id == id)
            .map(|(_, item)| item)
    }

    /// Replaces every item whose key satisfies `in_scope` with `items`.
    ///
    /// Keys only in `items` are entered, keys in both whose item changed are
    /// updated, in-scope keys missing from `items` are exited. Items outside
    /// the scope are kept untouched.
    pub fn reconcile<F>(&mut self, items: Vec<(SceneKey, SceneItem)>, in_scope: F) -> SceneDiff
    where
        F: Fn(&SceneKey) -> bool,
    {
        let mut diff = SceneDiff::default();
        let mut previous = std::mem::take(&mut self.items);
        let mut next = IndexMap::with_capacity(previous.len().max(items.len()));

        for (key, item) in items {
            match previous.swap_remove(&key) {
                Some(old) if old == item => {}
                Some(_) => diff.updated.push(key),
                None => diff.entered.push(key),
            }
            next.insert(key, item);
        }
        for (key, item) in previous {
            if in_scope(&key) {
                diff.exited.push(key);
            } else {
                next.insert(key, item);
            }
        }

        self.items = next;
        diff
    }

    /// Inserts or replaces a single item.
    pub fn upsert(&mut self, key: SceneKey, item: SceneItem, diff: &mut SceneDiff) {
        match self.items.insert(key, item.clone()) {
            Some(old) if old == item => {}
            Some(_) => diff.updated.push(key),
            None => diff.entered.push(key),
        }
    }

    pub fn remove(&mut self, key: &SceneKey, diff: &mut SceneDiff) {
        if self.items.shift_remove(key).is_some() {
            diff.exited.push(*key);
        }
    }

    /// Moves a node or comment item. Returns `true` when it changed.
    pub fn set_position(&mut self, key: &SceneKey, position: Point) -> bool {
        self.items
            .get_mut(key)
            .is_some_and(|item| item.set_position(position))
    }

    /// Updates the selection and hover flags of every item. Returns the keys
    /// of items whose flags changed.
    pub fn update_highlights<S, H>(&mut self, is_selected: S, is_hovered: H) -> Vec<SceneKey>
    where
        S: Fn(Id) -> bool,
        H: Fn(Id) -> bool,
    {
        let mut changed = Vec::new();
        for (key, item) in self.items.iter_mut() {
            let selected = item.set_selected(is_selected(key.id));
            let hovered = item.set_hovered(is_hovered(key.id));
            if selected || hovered {
                changed.push(*key);
            }
        }
        changed
    }

    /// Items grouped by layer, bottom to top, each group in insertion order.
    /// Empty layers are skipped.
    pub fn layered(&self) -> Vec<(Layer, Vec<(&SceneKey, &SceneItem)>)> {
        Layer::ALL
            .into_iter()
            .map(|layer| {
                let items: Vec<_> = self.items.iter().filter(|(_, item)| item.layer() == layer).collect();
                (layer, items)
            })
            .filter(|(_, items)| !items.is_empty())
            .collect()
    }
}
