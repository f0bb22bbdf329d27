//! Boundary between the engine and the authoritative pipeline store.
//!
//! The engine reads the pipeline tree and the selection through
//! [`CanvasController`] and never writes to the store directly: every edit is
//! an [`EditCommand`] handed to [`CanvasController::dispatch`] once a gesture
//! completes.
//!
//! [`InMemoryController`] is a complete reference implementation with a
//! snapshot undo/redo stack, id minting and a clipboard behind
//! [`ClipboardStorage`].

use std::collections::HashMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use flowcanvas_core::{
    geometry::{Bounds, Point},
    identifier::Id,
    layout::CanvasLayout,
    model::{CanvasInfo, Comment, Link, LinkKind, Node, Pipeline},
};

use crate::drop::{DropData, NodeTemplate};

/// Selected objects, all in one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pipeline_id: Id,
    ids: Vec<Id>,
}

impl Selection {
    pub fn new(pipeline_id: Id, ids: Vec<Id>) -> Self {
        Self { pipeline_id, ids }
    }

    pub fn pipeline_id(&self) -> Id {
        self.pipeline_id
    }

    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    pub fn contains(&self, id: Id) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Hover affordances that may show a tooltip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipType {
    Node,
    Port,
    Link,
    Comment,
}

/// Edit intents emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    MoveObjects {
        pipeline_id: Id,
        ids: Vec<Id>,
        offset: Point,
    },
    /// Final bounds of a resized object and of any sibling it carried along.
    ResizeObjects {
        pipeline_id: Id,
        objects: Vec<(Id, Bounds)>,
    },
    EditComment {
        pipeline_id: Id,
        id: Id,
        content: String,
        bounds: Option<Bounds>,
    },
    LinkNodes {
        pipeline_id: Id,
        kind: LinkKind,
        src_node_id: Id,
        src_port_id: Option<Id>,
        trg_node_id: Id,
        trg_port_id: Option<Id>,
    },
    LinkComment {
        pipeline_id: Id,
        comment_id: Id,
        node_id: Id,
    },
    DeleteSelectedObjects,
    Undo,
    Redo,
    SelectAll {
        pipeline_id: Id,
    },
    Cut,
    Copy,
    Paste {
        pipeline_id: Id,
        position: Option<Point>,
    },
    CreateFromTemplate {
        pipeline_id: Id,
        template: NodeTemplate,
        position: Point,
    },
    CreateFromObject {
        pipeline_id: Id,
        data: DropData,
        position: Point,
    },
    AddToCanvas {
        pipeline_id: Id,
        data: DropData,
        position: Point,
    },
    SetSupernodeExpanded {
        pipeline_id: Id,
        node_id: Id,
        expanded: bool,
    },
}

impl EditCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveObjects { .. } => "moveObjects",
            Self::ResizeObjects { .. } => "resizeObjects",
            Self::EditComment { .. } => "editComment",
            Self::LinkNodes { .. } => "linkNodes",
            Self::LinkComment { .. } => "linkComment",
            Self::DeleteSelectedObjects => "deleteSelectedObjects",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::SelectAll { .. } => "selectAll",
            Self::Cut => "cut",
            Self::Copy => "copy",
            Self::Paste { .. } => "paste",
            Self::CreateFromTemplate { .. } => "createFromTemplate",
            Self::CreateFromObject { .. } => "createFromObject",
            Self::AddToCanvas { .. } => "addToCanvas",
            Self::SetSupernodeExpanded { .. } => "setSupernodeExpanded",
        }
    }
}

/// Read accessors and the command dispatcher of the external store.
pub trait CanvasController {
    fn canvas_info(&self) -> &CanvasInfo;

    fn selection(&self) -> Option<&Selection>;

    fn set_selections(&mut self, ids: Vec<Id>, pipeline_id: Id);

    fn dispatch(&mut self, command: EditCommand);

    fn is_selected(&self, id: Id, pipeline_id: Id) -> bool {
        self.selection()
            .is_some_and(|s| s.pipeline_id() == pipeline_id && s.contains(id))
    }

    /// Whether a tooltip-like overlay is open; hover affordances are
    /// suppressed while it is.
    fn is_tip_showing(&self) -> bool {
        false
    }

    fn is_tip_enabled(&self, _tip: TipType) -> bool {
        true
    }
}

// ====================================================================
// Clipboard storage
// ====================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Persisted clipboard used by cut, copy and paste.
pub trait ClipboardStorage {
    fn store(&mut self, content: &str) -> Result<(), StorageError>;

    fn load(&self) -> Result<Option<String>, StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryClipboard {
    content: Option<String>,
}

impl ClipboardStorage for MemoryClipboard {
    fn store(&mut self, content: &str) -> Result<(), StorageError> {
        self.content = Some(content.to_string());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.content.clone())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ClipboardContent {
    nodes: Vec<Node>,
    comments: Vec<Comment>,
    links: Vec<Link>,
}

// ====================================================================
// In-memory controller
// ====================================================================

#[derive(Debug, Clone)]
struct Snapshot {
    canvas: CanvasInfo,
    selection: Option<Selection>,
}

/// Distance pasted objects are shifted when no position is given.
const PASTE_OFFSET: f32 = 10.0;

/// Reference controller holding the pipeline tree in memory.
pub struct InMemoryController {
    canvas: CanvasInfo,
    selection: Option<Selection>,
    layout: CanvasLayout,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    clipboard: Box<dyn ClipboardStorage>,
    next_id: usize,
    tip_showing: bool,
    dispatched: Vec<EditCommand>,
}

impl InMemoryController {
    pub fn new(canvas: CanvasInfo) -> Self {
        Self {
            canvas,
            selection: None,
            layout: CanvasLayout::default(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            clipboard: Box::new(MemoryClipboard::default()),
            next_id: 1,
            tip_showing: false,
            dispatched: Vec::new(),
        }
    }

    pub fn with_clipboard(mut self, clipboard: Box<dyn ClipboardStorage>) -> Self {
        self.clipboard = clipboard;
        self
    }

    /// Layout used to size nodes created from drops.
    pub fn with_layout(mut self, layout: CanvasLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Every command received, in order.
    pub fn dispatched_commands(&self) -> &[EditCommand] {
        &self.dispatched
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn set_tip_showing(&mut self, showing: bool) {
        self.tip_showing = showing;
    }

    fn mint_id(&mut self, prefix: &str) -> Id {
        loop {
            let id = Id::generated(prefix, self.next_id);
            self.next_id += 1;
            let taken = self.canvas.pipelines.iter().any(|p| p.contains_object(id));
            if !taken {
                return id;
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            canvas: self.canvas.clone(),
            selection: self.selection.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.canvas = snapshot.canvas;
        self.selection = snapshot.selection;
    }

    /// Records the current state for undo and clears the redo history.
    fn checkpoint(&mut self) {
        let snapshot = self.snapshot();
        self.undo_stack.push(snapshot);
        self.redo_stack.clear();
    }

    fn pipeline_mut(&mut self, pipeline_id: Id) -> Option<&mut Pipeline> {
        let pipeline = self.canvas.pipeline_mut(pipeline_id);
        if pipeline.is_none() {
            warn!(pipeline_id:%; "Command targets unknown pipeline");
        }
        pipeline
    }

    fn apply(&mut self, command: EditCommand) {
        match command {
            EditCommand::MoveObjects {
                pipeline_id,
                ids,
                offset,
            } => {
                if self.canvas.pipeline(pipeline_id).is_none() || offset.is_zero() {
                    return;
                }
                self.checkpoint();
                if let Some(pipeline) = self.pipeline_mut(pipeline_id) {
                    pipeline.move_objects(&ids, offset);
                }
            }
            EditCommand::ResizeObjects { pipeline_id, objects } => {
                if self.canvas.pipeline(pipeline_id).is_none() {
                    return;
                }
                self.checkpoint();
                if let Some(pipeline) = self.pipeline_mut(pipeline_id) {
                    for (id, bounds) in objects {
                        pipeline.set_object_bounds(id, bounds);
                    }
                }
            }
            EditCommand::EditComment {
                pipeline_id,
                id,
                content,
                bounds,
            } => {
                if self.canvas.pipeline(pipeline_id).and_then(|p| p.comment(id)).is_none() {
                    warn!(comment_id:% = id; "Edit targets unknown comment");
                    return;
                }
                self.checkpoint();
                if let Some(pipeline) = self.pipeline_mut(pipeline_id) {
                    if let Some(comment) = pipeline.comment_mut(id) {
                        comment.content = content;
                    }
                    if let Some(bounds) = bounds {
                        pipeline.set_object_bounds(id, bounds);
                    }
                }
            }
            EditCommand::LinkNodes {
                pipeline_id,
                kind,
                src_node_id,
                src_port_id,
                trg_node_id,
                trg_port_id,
            } => {
                let id = self.mint_id("link");
                let link = Link {
                    id,
                    kind,
                    src_node_id,
                    trg_node_id,
                    src_node_port_id: src_port_id,
                    trg_node_port_id: trg_port_id,
                };
                self.add_link(pipeline_id, link);
            }
            EditCommand::LinkComment {
                pipeline_id,
                comment_id,
                node_id,
            } => {
                let id = self.mint_id("link");
                let link = Link {
                    id,
                    kind: LinkKind::CommentLink,
                    src_node_id: comment_id,
                    trg_node_id: node_id,
                    src_node_port_id: None,
                    trg_node_port_id: None,
                };
                self.add_link(pipeline_id, link);
            }
            EditCommand::DeleteSelectedObjects => self.delete_selection(),
            EditCommand::Undo => match self.undo_stack.pop() {
                Some(snapshot) => {
                    let current = self.snapshot();
                    self.redo_stack.push(current);
                    self.restore(snapshot);
                }
                None => debug!("Nothing to undo"),
            },
            EditCommand::Redo => match self.redo_stack.pop() {
                Some(snapshot) => {
                    let current = self.snapshot();
                    self.undo_stack.push(current);
                    self.restore(snapshot);
                }
                None => debug!("Nothing to redo"),
            },
            EditCommand::SelectAll { pipeline_id } => {
                if let Some(pipeline) = self.canvas.pipeline(pipeline_id) {
                    let ids = pipeline.all_object_ids();
                    self.selection = Some(Selection::new(pipeline_id, ids));
                }
            }
            EditCommand::Copy => self.copy_selection(),
            EditCommand::Cut => {
                self.copy_selection();
                self.delete_selection();
            }
            EditCommand::Paste { pipeline_id, position } => self.paste(pipeline_id, position),
            EditCommand::CreateFromTemplate {
                pipeline_id,
                template,
                position,
            } => {
                let id = self.mint_id("node");
                let node = template.to_node(id, position, &self.layout);
                self.add_node(pipeline_id, node);
            }
            EditCommand::CreateFromObject {
                pipeline_id,
                data,
                position,
            } => {
                let id = self.mint_id("node");
                let node = Node::new(&id.to_text(), &data.label(), position.x(), position.y())
                    .with_size(self.layout.default_node_width, self.layout.default_node_height)
                    .with_ports(&["inPort"], &["outPort"]);
                self.add_node(pipeline_id, node);
            }
            EditCommand::AddToCanvas {
                pipeline_id,
                data,
                position,
            } => {
                let template = match &data {
                    DropData::Template(template) => Some(template.clone()),
                    DropData::Object(value) => serde_json::from_value::<NodeTemplate>(value.clone()).ok(),
                    DropData::Raw(_) => None,
                };
                let id = self.mint_id("node");
                let node = match template {
                    Some(template) => template.to_node(id, position, &self.layout),
                    None => Node::new(&id.to_text(), &data.label(), position.x(), position.y())
                        .with_size(self.layout.default_node_width, self.layout.default_node_height),
                };
                self.add_node(pipeline_id, node);
            }
            EditCommand::SetSupernodeExpanded {
                pipeline_id,
                node_id,
                expanded,
            } => {
                let is_supernode = self
                    .canvas
                    .pipeline(pipeline_id)
                    .and_then(|p| p.node(node_id))
                    .is_some_and(Node::is_supernode);
                if !is_supernode {
                    warn!(node_id:%; "Expansion targets a node that is not a supernode");
                    return;
                }
                self.checkpoint();
                if let Some(node) = self.pipeline_mut(pipeline_id).and_then(|p| p.node_mut(node_id)) {
                    node.is_expanded = expanded;
                }
            }
        }
    }

    fn add_link(&mut self, pipeline_id: Id, link: Link) {
        let resolves = self
            .canvas
            .pipeline(pipeline_id)
            .is_some_and(|p| p.link_resolves(&link));
        if !resolves {
            warn!(link_id:% = link.id; "New link endpoints do not resolve");
            return;
        }
        self.checkpoint();
        if let Some(pipeline) = self.pipeline_mut(pipeline_id) {
            pipeline.links.push(link);
        }
    }

    fn add_node(&mut self, pipeline_id: Id, node: Node) {
        if self.canvas.pipeline(pipeline_id).is_none() {
            warn!(pipeline_id:%; "Drop targets unknown pipeline");
            return;
        }
        self.checkpoint();
        let id = node.id;
        if let Some(pipeline) = self.pipeline_mut(pipeline_id) {
            pipeline.nodes.push(node);
        }
        self.selection = Some(Selection::new(pipeline_id, vec![id]));
    }

    fn delete_selection(&mut self) {
        let Some(selection) = self.selection.clone() else {
            return;
        };
        if selection.is_empty() {
            return;
        }
        self.checkpoint();
        if let Some(pipeline) = self.pipeline_mut(selection.pipeline_id()) {
            pipeline.remove_objects(selection.ids());
        }
        self.selection = None;
    }

    fn copy_selection(&mut self) {
        let Some(selection) = &self.selection else {
            return;
        };
        let Some(pipeline) = self.canvas.pipeline(selection.pipeline_id()) else {
            return;
        };
        let ids = selection.ids();
        let content = ClipboardContent {
            nodes: pipeline.nodes.iter().filter(|n| ids.contains(&n.id)).cloned().collect(),
            comments: pipeline.comments.iter().filter(|c| ids.contains(&c.id)).cloned().collect(),
            links: pipeline
                .links
                .iter()
                .filter(|l| ids.contains(&l.src_node_id) && ids.contains(&l.trg_node_id))
                .cloned()
                .collect(),
        };
        let json = match serde_json::to_string(&content) {
            Ok(json) => json,
            Err(err) => {
                warn!(err:%; "Failed to serialize clipboard content");
                return;
            }
        };
        if let Err(err) = self.clipboard.store(&json) {
            warn!(err:%; "Clipboard storage failed, copy skipped");
        }
    }

    fn paste(&mut self, pipeline_id: Id, position: Option<Point>) {
        let json = match self.clipboard.load() {
            Ok(Some(json)) => json,
            Ok(None) => return,
            Err(err) => {
                warn!(err:%; "Clipboard storage failed, paste skipped");
                return;
            }
        };
        let mut content: ClipboardContent = match serde_json::from_str(&json) {
            Ok(content) => content,
            Err(err) => {
                warn!(err:%; "Clipboard holds invalid content");
                return;
            }
        };
        if self.canvas.pipeline(pipeline_id).is_none() {
            warn!(pipeline_id:%; "Paste targets unknown pipeline");
            return;
        }

        let origin = content
            .nodes
            .iter()
            .map(Node::bounds)
            .chain(content.comments.iter().map(Comment::bounds))
            .reduce(|acc, b| acc.merge(&b))
            .map(|b| b.min_point())
            .unwrap_or_default();
        let offset = match position {
            Some(target) => target.sub_point(origin),
            None => Point::new(PASTE_OFFSET, PASTE_OFFSET),
        };

        let mut renamed = HashMap::new();
        for node in &mut content.nodes {
            let id = self.mint_id("node");
            renamed.insert(node.id, id);
            node.id = id;
            node.x_pos += offset.x();
            node.y_pos += offset.y();
        }
        for comment in &mut content.comments {
            let id = self.mint_id("comment");
            renamed.insert(comment.id, id);
            comment.id = id;
            comment.x_pos += offset.x();
            comment.y_pos += offset.y();
        }
        for link in &mut content.links {
            link.id = self.mint_id("link");
            link.src_node_id = renamed.get(&link.src_node_id).copied().unwrap_or(link.src_node_id);
            link.trg_node_id = renamed.get(&link.trg_node_id).copied().unwrap_or(link.trg_node_id);
        }

        self.checkpoint();
        let pasted: Vec<Id> = renamed.values().copied().collect();
        if let Some(pipeline) = self.pipeline_mut(pipeline_id) {
            pipeline.nodes.extend(content.nodes);
            pipeline.comments.extend(content.comments);
            pipeline.links.extend(content.links);
        }
        info!(count = pasted.len(); "Pasted objects");
        self.selection = Some(Selection::new(pipeline_id, pasted));
    }
}

impl CanvasController for InMemoryController {
    fn canvas_info(&self) -> &CanvasInfo {
        &self.canvas
    }

    fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    fn set_selections(&mut self, ids: Vec<Id>, pipeline_id: Id) {
        debug!(pipeline_id:%, count = ids.len(); "Selection changed");
        self.selection = if ids.is_empty() {
            None
        } else {
            Some(Selection::new(pipeline_id, ids))
        };
    }

    fn dispatch(&mut self, command: EditCommand) {
        debug!(command = command.name(); "Dispatching edit command");
        self.dispatched.push(command.clone());
        self.apply(command);
    }

    fn is_tip_showing(&self) -> bool {
        self.tip_showing
    }
}

#[cfg(test)]
mod tests {
    use flowcanvas_core::geometry::Size;

    use super::*;

    fn controller() -> InMemoryController {
        let mut pipeline = Pipeline::new("p");
        pipeline
            .nodes
            .push(Node::new("a", "A", 0.0, 0.0).with_ports(&["in"], &["out"]));
        pipeline
            .nodes
            .push(Node::new("b", "B", 200.0, 0.0).with_ports(&["in"], &["out"]));
        pipeline
            .comments
            .push(Comment::new("c", 0.0, 150.0, 100.0, 40.0, "note"));
        pipeline
            .links
            .push(Link::new("l", LinkKind::NodeLink, "a", "b").with_ports("out", "in"));
        InMemoryController::new(CanvasInfo::new(pipeline))
    }

    fn primary(controller: &InMemoryController) -> &Pipeline {
        controller.canvas_info().primary().unwrap()
    }

    struct BrokenClipboard;

    impl ClipboardStorage for BrokenClipboard {
        fn store(&mut self, _content: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }

        fn load(&self) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
    }

    #[test]
    fn test_move_and_undo() {
        let mut controller = controller();
        controller.dispatch(EditCommand::MoveObjects {
            pipeline_id: Id::new("p"),
            ids: vec![Id::new("a")],
            offset: Point::new(5.0, 5.0),
        });
        assert_eq!(primary(&controller).node(Id::new("a")).unwrap().position(), Point::new(5.0, 5.0));

        controller.dispatch(EditCommand::Undo);
        assert_eq!(primary(&controller).node(Id::new("a")).unwrap().position(), Point::new(0.0, 0.0));
        assert!(controller.can_redo());
    }

    #[test]
    fn test_delete_undo_redo_round_trip() {
        let mut controller = controller();
        let p = Id::new("p");
        controller.set_selections(vec![Id::new("a"), Id::new("c"), Id::new("l")], p);
        let before = primary(&controller).clone();

        controller.dispatch(EditCommand::DeleteSelectedObjects);
        let after = primary(&controller).clone();
        assert!(after.node(Id::new("a")).is_none());
        assert!(after.comment(Id::new("c")).is_none());
        assert!(after.links.is_empty());

        controller.dispatch(EditCommand::Undo);
        assert_eq!(primary(&controller), &before);

        controller.dispatch(EditCommand::Redo);
        assert_eq!(primary(&controller), &after);
    }

    #[test]
    fn test_link_nodes_mints_id() {
        let mut controller = controller();
        controller.dispatch(EditCommand::LinkNodes {
            pipeline_id: Id::new("p"),
            kind: LinkKind::NodeLink,
            src_node_id: Id::new("b"),
            src_port_id: Some(Id::new("out")),
            trg_node_id: Id::new("a"),
            trg_port_id: Some(Id::new("in")),
        });
        let links = &primary(&controller).links;
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].id, "link-1");
    }

    #[test]
    fn test_link_to_missing_node_ignored() {
        let mut controller = controller();
        controller.dispatch(EditCommand::LinkComment {
            pipeline_id: Id::new("p"),
            comment_id: Id::new("c"),
            node_id: Id::new("ghost"),
        });
        assert_eq!(primary(&controller).links.len(), 1);
        assert!(!controller.can_undo());
    }

    #[test]
    fn test_copy_paste() {
        let mut controller = controller();
        let p = Id::new("p");
        controller.set_selections(vec![Id::new("a"), Id::new("b"), Id::new("l")], p);
        controller.dispatch(EditCommand::Copy);
        controller.dispatch(EditCommand::Paste {
            pipeline_id: p,
            position: Some(Point::new(0.0, 300.0)),
        });
        let pipeline = primary(&controller);
        assert_eq!(pipeline.nodes.len(), 4);
        assert_eq!(pipeline.links.len(), 2);
        let pasted_link = &pipeline.links[1];
        assert!(pipeline.node(pasted_link.src_node_id).is_some());
        assert_eq!(pipeline.node(pasted_link.src_node_id).unwrap().y_pos, 300.0);
        assert_eq!(controller.selection().unwrap().ids().len(), 2);
    }

    #[test]
    fn test_clipboard_failure_is_contained() {
        let mut controller = controller().with_clipboard(Box::new(BrokenClipboard));
        let p = Id::new("p");
        controller.set_selections(vec![Id::new("a")], p);
        controller.dispatch(EditCommand::Cut);
        // Copy failed, delete still happens.
        assert!(primary(&controller).node(Id::new("a")).is_none());
        controller.dispatch(EditCommand::Paste {
            pipeline_id: p,
            position: None,
        });
        assert_eq!(primary(&controller).nodes.len(), 1);
    }

    #[test]
    fn test_select_all() {
        let mut controller = controller();
        controller.dispatch(EditCommand::SelectAll { pipeline_id: Id::new("p") });
        assert_eq!(controller.selection().unwrap().ids().len(), 4);
        assert!(controller.is_selected(Id::new("l"), Id::new("p")));
    }

    #[test]
    fn test_resize_expanded_supernode_writes_expanded_size() {
        let mut pipeline = Pipeline::new("p");
        pipeline
            .nodes
            .push(Node::new("s", "Super", 0.0, 0.0).with_subflow("child", true));
        let mut controller = InMemoryController::new(CanvasInfo::new(pipeline).with_pipeline(Pipeline::new("child")));
        controller.dispatch(EditCommand::ResizeObjects {
            pipeline_id: Id::new("p"),
            objects: vec![(
                Id::new("s"),
                Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(300.0, 250.0)),
            )],
        });
        let node = primary(&controller).node(Id::new("s")).unwrap();
        assert_eq!(node.expanded_width, Some(300.0));
        assert_eq!(node.width, 70.0);
    }

    #[test]
    fn test_create_from_object_uses_label() {
        let mut controller = controller();
        controller.dispatch(EditCommand::CreateFromObject {
            pipeline_id: Id::new("p"),
            data: DropData::Raw("garbage".to_string()),
            position: Point::new(40.0, 40.0),
        });
        let node = primary(&controller).nodes.last().unwrap();
        assert_eq!(node.label, "External object");
        assert_eq!(node.position(), Point::new(40.0, 40.0));
        assert_eq!(controller.dispatched_commands().len(), 1);
    }
}
