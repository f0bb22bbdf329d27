//! Integration tests for the CanvasEngine API
//!
//! These tests drive the engine through its host entry points (pointer,
//! keyboard, drops, viewport) against the in-memory controller.

use float_cmp::assert_approx_eq;

use flowcanvas::{
    CanvasEngine,
    config::{AppConfig, CanvasLayout},
    controller::{CanvasController, ClipboardStorage, EditCommand, InMemoryController, StorageError, TipType},
    geometry::{Bounds, Point},
    identifier::Id,
    interaction::{Key, KeyEvent, ModeKind, PointerEvent},
    layout::ConnectionType,
    model::{CanvasInfo, Comment, Link, LinkKind, Node, Pipeline},
    scene::ItemKind,
};

fn id(name: &str) -> Id {
    Id::new(name)
}

/// `a` (100, 100) -> `b` (300, 100) through ports, and comment `c` below.
fn flat_canvas() -> CanvasInfo {
    let mut pipeline = Pipeline::new("main");
    pipeline
        .nodes
        .push(Node::new("a", "Source", 100.0, 100.0).with_ports(&[], &["out"]));
    pipeline
        .nodes
        .push(Node::new("b", "Target", 300.0, 100.0).with_ports(&["in"], &[]));
    pipeline
        .links
        .push(Link::new("l", LinkKind::NodeLink, "a", "b").with_ports("out", "in"));
    pipeline
        .comments
        .push(Comment::new("c", 100.0, 300.0, 100.0, 40.0, "note"));
    CanvasInfo::new(pipeline)
}

/// Expanded supernode `s` (0, 0) 200x200 showing pipeline `child`.
fn nested_canvas() -> CanvasInfo {
    let mut main = Pipeline::new("main");
    main.nodes
        .push(Node::new("s", "Super", 0.0, 0.0).with_subflow("child", true));
    let mut child = Pipeline::new("child");
    child.nodes.push(Node::new("inner", "Inner", 100.0, 100.0));
    child
        .comments
        .push(Comment::new("nc", 100.0, 250.0, 100.0, 40.0, "nested note"));
    CanvasInfo::new(main).with_pipeline(child)
}

fn engine(canvas: CanvasInfo) -> CanvasEngine<InMemoryController> {
    CanvasEngine::new(InMemoryController::new(canvas), AppConfig::default()).expect("engine should build")
}

fn commands(engine: &CanvasEngine<InMemoryController>) -> Vec<&'static str> {
    engine
        .controller()
        .dispatched_commands()
        .iter()
        .map(EditCommand::name)
        .collect()
}

fn controller_pipeline<'a>(engine: &'a CanvasEngine<InMemoryController>, pipeline: &str) -> &'a Pipeline {
    engine
        .controller()
        .canvas_info()
        .pipeline(id(pipeline))
        .expect("pipeline should exist")
}

#[test]
fn test_engine_requires_primary_pipeline() {
    let canvas = CanvasInfo {
        primary_pipeline: id("missing"),
        pipelines: vec![Pipeline::new("other")],
    };
    assert!(CanvasEngine::new(InMemoryController::new(canvas), AppConfig::default()).is_err());
}

#[test]
fn test_zoom_stays_in_range() {
    let mut engine = engine(flat_canvas());
    for _ in 0..50 {
        engine.zoom_in();
        assert!(engine.viewport().transform().k() <= 2.0);
    }
    assert_approx_eq!(f32, engine.viewport().transform().k(), 2.0);
    for _ in 0..100 {
        engine.zoom_out();
        assert!(engine.viewport().transform().k() >= 0.2);
    }
    assert_approx_eq!(f32, engine.viewport().transform().k(), 0.2);
}

#[test]
fn test_pan_keeps_small_content_in_view() {
    let mut engine = engine(flat_canvas());
    engine.pointer_down(PointerEvent::at(600.0, 500.0));
    assert_eq!(engine.mode().kind(), ModeKind::Panning);
    engine.pointer_move(PointerEvent::at(-2000.0, -2000.0));
    engine.pointer_up(PointerEvent::at(-2000.0, -2000.0));
    assert_eq!(engine.mode().kind(), ModeKind::Idle);

    let content = Bounds::from_corners(Point::new(100.0, 100.0), Point::new(370.0, 340.0));
    let on_screen = engine.viewport().transform().apply_bounds(content);
    assert!(on_screen.min_x() >= -0.001 && on_screen.min_y() >= -0.001);
    assert!(on_screen.max_x() <= 800.001 && on_screen.max_y() <= 600.001);
}

#[test]
fn test_drag_emits_single_move() {
    let mut engine = engine(flat_canvas());
    engine.pointer_down(PointerEvent::at(135.0, 120.0));
    assert_eq!(engine.mode().kind(), ModeKind::DraggingObjects);

    engine.pointer_move(PointerEvent::at(145.0, 120.0));
    let touched: Vec<Id> = engine
        .last_diff(id("main"))
        .unwrap()
        .touched()
        .map(|key| key.id())
        .collect();
    assert!(!touched.is_empty());
    assert!(touched.iter().all(|t| *t == id("a") || *t == id("l")));

    engine.pointer_move(PointerEvent::at(155.0, 130.0));
    engine.pointer_up(PointerEvent::at(165.0, 140.0));

    assert_eq!(commands(&engine), vec!["moveObjects"]);
    assert_eq!(
        engine.controller().dispatched_commands()[0],
        EditCommand::MoveObjects {
            pipeline_id: id("main"),
            ids: vec![id("a")],
            offset: Point::new(30.0, 20.0),
        }
    );
    let moved = controller_pipeline(&engine, "main").node(id("a")).unwrap();
    assert_eq!(moved.position(), Point::new(130.0, 120.0));
    assert_eq!(engine.mode().kind(), ModeKind::Idle);
}

#[test]
fn test_click_without_move_emits_nothing() {
    let mut engine = engine(flat_canvas());
    engine.pointer_down(PointerEvent::at(135.0, 120.0));
    // Shortcuts are ignored while a gesture is in flight.
    assert!(!engine.key_down(KeyEvent::new(Key::Delete)));
    engine.pointer_up(PointerEvent::at(135.0, 120.0));

    assert!(commands(&engine).is_empty());
    assert!(engine.controller().is_selected(id("a"), id("main")));
}

#[test]
fn test_delete_undo_redo_round_trip() {
    let mut engine = engine(flat_canvas());
    engine
        .controller_mut()
        .set_selections(vec![id("a"), id("c"), id("l")], id("main"));
    engine.refresh_from_controller();

    assert!(engine.key_down(KeyEvent::new(Key::Delete)));
    let pipeline = engine.canvas().pipeline(id("main")).unwrap();
    assert!(pipeline.node(id("a")).is_none());
    assert!(pipeline.comment(id("c")).is_none());
    assert!(pipeline.link(id("l")).is_none());
    let scene = engine.scene(id("main")).unwrap();
    assert!(scene.find(ItemKind::Node, id("a")).is_none());
    assert!(scene.find(ItemKind::Link, id("l")).is_none());

    assert!(engine.key_down(KeyEvent::new(Key::Char('z')).with_ctrl()));
    let pipeline = engine.canvas().pipeline(id("main")).unwrap();
    assert!(pipeline.node(id("a")).is_some());
    assert!(pipeline.comment(id("c")).is_some());
    assert!(pipeline.link(id("l")).is_some());
    assert!(engine.scene(id("main")).unwrap().find(ItemKind::Link, id("l")).is_some());

    assert!(engine.key_down(KeyEvent::new(Key::Char('y')).with_ctrl()));
    let pipeline = engine.canvas().pipeline(id("main")).unwrap();
    assert!(pipeline.node(id("a")).is_none());
    assert!(pipeline.link(id("l")).is_none());
    assert_eq!(commands(&engine), vec!["deleteSelectedObjects", "undo", "redo"]);
}

#[test]
fn test_resize_below_minimum_is_rejected() {
    let mut engine = engine(nested_canvas());
    let before = engine.canvas().pipeline(id("main")).unwrap().node(id("s")).unwrap().bounds();

    engine.pointer_down(PointerEvent::at(200.0, 200.0));
    assert_eq!(engine.mode().kind(), ModeKind::ResizingNode);
    engine.pointer_move(PointerEvent::at(50.0, 200.0));
    // Still resizing after the rejected step.
    assert_eq!(engine.mode().kind(), ModeKind::ResizingNode);
    engine.pointer_up(PointerEvent::at(50.0, 200.0));

    let after = engine.canvas().pipeline(id("main")).unwrap().node(id("s")).unwrap().bounds();
    assert_eq!(before, after);
    assert!(commands(&engine).is_empty());
}

#[test]
fn test_resize_moves_contained_siblings() {
    let mut canvas = nested_canvas();
    canvas
        .pipeline_mut(id("main"))
        .unwrap()
        .nodes
        .push(Node::new("inside", "Inside", 50.0, 50.0));
    let mut engine = engine(canvas);

    engine.pointer_down(PointerEvent::at(200.0, 200.0));
    engine.pointer_move(PointerEvent::at(250.0, 260.0));
    engine.pointer_up(PointerEvent::at(250.0, 260.0));

    let EditCommand::ResizeObjects { pipeline_id, objects } = &engine.controller().dispatched_commands()[0] else {
        panic!("expected a resize command");
    };
    assert_eq!(*pipeline_id, id("main"));
    assert_eq!(objects[0].0, id("s"));
    assert_eq!(objects[0].1.to_size(), flowcanvas::geometry::Size::new(250.0, 260.0));

    let (_, inside) = objects.iter().find(|(o, _)| *o == id("inside")).expect("sibling moved");
    // Center (85, 87.5) keeps its fraction of the grown box.
    assert_approx_eq!(f32, inside.center().x(), 106.25, epsilon = 0.001);
    assert_approx_eq!(f32, inside.center().y(), 113.75, epsilon = 0.001);
}

#[test]
fn test_new_link_between_ports() {
    let mut engine = engine(flat_canvas());
    engine.pointer_down(PointerEvent::at(170.0, 137.5));
    assert_eq!(engine.mode().kind(), ModeKind::DrawingNewLink);
    engine.pointer_move(PointerEvent::at(250.0, 137.0));
    assert!(
        engine
            .scene(id("main"))
            .unwrap()
            .find(ItemKind::Overlay, id("rubber-band"))
            .is_some()
    );
    engine.pointer_up(PointerEvent::at(300.0, 137.5));

    assert_eq!(
        engine.controller().dispatched_commands(),
        &[EditCommand::LinkNodes {
            pipeline_id: id("main"),
            kind: LinkKind::NodeLink,
            src_node_id: id("a"),
            src_port_id: Some(id("out")),
            trg_node_id: id("b"),
            trg_port_id: Some(id("in")),
        }]
    );
    assert!(
        engine
            .scene(id("main"))
            .unwrap()
            .find(ItemKind::Overlay, id("rubber-band"))
            .is_none()
    );
}

#[test]
fn test_comment_connector_links_comment_to_node() {
    let mut engine = engine(flat_canvas());
    // Connector centered on the right edge of `c`.
    engine.pointer_down(PointerEvent::at(200.0, 320.0));
    assert_eq!(engine.mode().kind(), ModeKind::DrawingNewLink);
    engine.pointer_move(PointerEvent::at(300.0, 200.0));
    engine.pointer_up(PointerEvent::at(335.0, 140.0));

    assert_eq!(
        engine.controller().dispatched_commands(),
        &[EditCommand::LinkComment {
            pipeline_id: id("main"),
            comment_id: id("c"),
            node_id: id("b"),
        }]
    );
    let pipeline = controller_pipeline(&engine, "main");
    assert!(
        pipeline
            .links
            .iter()
            .any(|l| l.kind == LinkKind::CommentLink && l.src_node_id == id("c") && l.trg_node_id == id("b"))
    );
}

#[test]
fn test_halo_new_link_between_nodes() {
    let config = AppConfig::default().with_layout(CanvasLayout {
        connection_type: ConnectionType::Halo,
        ..CanvasLayout::default()
    });
    let mut engine = CanvasEngine::new(InMemoryController::new(flat_canvas()), config).unwrap();

    // Just outside the right edge of `a`, inside its halo ring.
    engine.pointer_down(PointerEvent::at(174.0, 120.0));
    assert_eq!(engine.mode().kind(), ModeKind::DrawingNewLink);
    engine.pointer_move(PointerEvent::at(250.0, 130.0));
    engine.pointer_up(PointerEvent::at(335.0, 140.0));

    assert_eq!(
        engine.controller().dispatched_commands(),
        &[EditCommand::LinkNodes {
            pipeline_id: id("main"),
            kind: LinkKind::NodeLink,
            src_node_id: id("a"),
            src_port_id: None,
            trg_node_id: id("b"),
            trg_port_id: None,
        }]
    );
}

#[test]
fn test_self_link_release_is_refused() {
    let mut engine = engine(flat_canvas());
    engine.pointer_down(PointerEvent::at(170.0, 137.5));
    assert_eq!(engine.mode().kind(), ModeKind::DrawingNewLink);
    engine.pointer_up(PointerEvent::at(135.0, 120.0));

    assert!(commands(&engine).is_empty());
    assert_eq!(controller_pipeline(&engine, "main").links.len(), 1);
    // Refused targets snap back like empty canvas.
    assert!(engine.tick(0.0));
}

#[test]
fn test_comment_resize_emits_edit_comment() {
    let mut engine = engine(flat_canvas());
    engine.pointer_down(PointerEvent::at(150.0, 340.0));
    assert_eq!(engine.mode().kind(), ModeKind::ResizingComment);
    engine.pointer_move(PointerEvent::at(150.0, 360.0));
    engine.pointer_up(PointerEvent::at(150.0, 370.0));

    assert_eq!(
        engine.controller().dispatched_commands(),
        &[EditCommand::EditComment {
            pipeline_id: id("main"),
            id: id("c"),
            content: "note".to_string(),
            bounds: Some(Bounds::from_corners(Point::new(100.0, 300.0), Point::new(200.0, 370.0))),
        }]
    );
    let comment = controller_pipeline(&engine, "main").comment(id("c")).unwrap();
    assert_eq!(comment.bounds().height(), 70.0);
}

#[test]
fn test_select_all_targets_nested_selection() {
    let mut engine = engine(nested_canvas());
    engine.controller_mut().set_selections(vec![id("inner")], id("child"));
    engine.refresh_from_controller();

    assert!(engine.key_down(KeyEvent::new(Key::Char('a')).with_ctrl()));
    assert_eq!(
        engine.controller().dispatched_commands(),
        &[EditCommand::SelectAll { pipeline_id: id("child") }]
    );
    let selection = engine.controller().selection().unwrap();
    assert_eq!(selection.pipeline_id(), id("child"));
    assert!(selection.contains(id("inner")));
    assert!(selection.contains(id("nc")));
}

#[test]
fn test_new_link_on_empty_canvas_snaps_back() {
    let mut engine = engine(flat_canvas());
    engine.pointer_down(PointerEvent::at(170.0, 137.5));
    engine.pointer_up(PointerEvent::at(500.0, 500.0));

    assert!(commands(&engine).is_empty());
    assert_eq!(engine.mode().kind(), ModeKind::Idle);
    let band = |engine: &CanvasEngine<InMemoryController>| {
        engine
            .scene(id("main"))
            .unwrap()
            .find(ItemKind::Overlay, id("rubber-band"))
            .is_some()
    };
    assert!(band(&engine));

    assert!(engine.tick(0.0));
    assert!(engine.tick(500.0));
    assert!(!engine.tick(1000.0));
    assert!(!band(&engine));
}

#[test]
fn test_new_gesture_cancels_snap_back() {
    let mut engine = engine(flat_canvas());
    engine.pointer_down(PointerEvent::at(170.0, 137.5));
    engine.pointer_up(PointerEvent::at(500.0, 500.0));
    assert!(engine.tick(0.0));

    engine.pointer_down(PointerEvent::at(600.0, 500.0));
    assert!(!engine.tick(10.0));
}

#[test]
fn test_region_select_restores_transform() {
    let mut engine = engine(flat_canvas());
    let before = engine.viewport().transform();

    engine.pointer_down(PointerEvent::at(50.0, 50.0).with_shift());
    assert_eq!(engine.mode().kind(), ModeKind::RegionSelecting);
    engine.pointer_move(PointerEvent::at(250.0, 250.0));
    engine.pointer_up(PointerEvent::at(250.0, 250.0));

    assert_eq!(engine.viewport().transform(), before);
    let selection = engine.controller().selection().unwrap();
    assert_eq!(selection.ids(), &[id("a")]);
    assert!(commands(&engine).is_empty());
}

#[test]
fn test_comment_edit_grows_and_commits_once() {
    let mut engine = engine(flat_canvas());
    engine.double_click(PointerEvent::at(150.0, 320.0));
    assert_eq!(engine.mode().kind(), ModeKind::EditingCommentText);
    let editor = engine.text_editor().unwrap();
    assert_eq!(editor.bounds, Bounds::from_corners(Point::new(100.0, 300.0), Point::new(200.0, 340.0)));

    engine.text_input(" with more words that will need to wrap onto more lines");
    // Editor shortcuts stay with the text widget.
    assert!(engine.key_down(KeyEvent::new(Key::Char('a')).with_ctrl()));
    assert!(engine.text_editor().unwrap().pending);
    assert!(commands(&engine).is_empty());

    engine.blur();
    let EditCommand::EditComment { id: comment_id, content, bounds, .. } =
        &engine.controller().dispatched_commands()[0]
    else {
        panic!("expected a comment edit");
    };
    assert_eq!(*comment_id, id("c"));
    assert_eq!(content, "note with more words that will need to wrap onto more lines");
    assert!(bounds.unwrap().height() > 40.0);
    assert_eq!(commands(&engine), vec!["editComment"]);
}

#[test]
fn test_comment_edit_escape_cancels() {
    let mut engine = engine(flat_canvas());
    engine.double_click(PointerEvent::at(150.0, 320.0));
    engine.key_down(KeyEvent::new(Key::Char('!')));
    engine.key_down(KeyEvent::new(Key::Escape));

    assert_eq!(engine.mode().kind(), ModeKind::Idle);
    assert!(commands(&engine).is_empty());
    assert_eq!(engine.canvas().pipeline(id("main")).unwrap().comment(id("c")).unwrap().content, "note");
}

#[test]
fn test_comment_edit_suppressed_in_nested_pipeline() {
    let mut engine = engine(nested_canvas());
    let record = engine.arena().record(id("child")).unwrap();
    let comment = engine.canvas().pipeline(id("child")).unwrap().comment(id("nc")).unwrap();
    let screen = record.screen_transform().apply(comment.bounds().center());

    engine.double_click(PointerEvent {
        position: screen,
        ..PointerEvent::default()
    });
    assert_eq!(engine.mode().kind(), ModeKind::Idle);
}

#[test]
fn test_nested_renderer_cleanup_after_delete_and_undo() {
    let mut engine = engine(nested_canvas());
    assert!(engine.arena().contains(id("child")));

    engine.controller_mut().set_selections(vec![id("s")], id("main"));
    engine.key_down(KeyEvent::new(Key::Delete));
    assert!(!engine.arena().contains(id("child")));

    engine.key_down(KeyEvent::new(Key::Char('z')).with_ctrl());
    assert!(engine.arena().contains(id("child")));
    assert!(engine.arena().record(id("child")).unwrap().is_visible());
}

#[test]
fn test_full_page_and_back() {
    let mut engine = engine(nested_canvas());
    engine.double_click(PointerEvent::at(100.0, 12.0));
    assert_eq!(engine.root_pipeline(), id("child"));
    assert!(engine.is_full_page());
    assert!(
        engine
            .scene(id("child"))
            .unwrap()
            .find(ItemKind::Overlay, id("back-to-parent"))
            .is_some()
    );
    assert!(engine.render_svg().unwrap().contains("Back to parent"));

    engine.pointer_down(PointerEvent::at(20.0, 20.0));
    assert_eq!(engine.root_pipeline(), id("main"));
    assert!(!engine.is_full_page());
}

#[test]
fn test_malformed_drop_creates_external_object() {
    let mut engine = engine(flat_canvas());
    engine.node_dropped("{not json", 400.0, 300.0);

    assert_eq!(commands(&engine), vec!["createFromObject"]);
    let created = controller_pipeline(&engine, "main").nodes.last().unwrap();
    assert_eq!(created.label, "External object");
    assert_eq!(created.position(), Point::new(400.0, 300.0));
}

#[test]
fn test_template_drop_uses_viewport_transform() {
    let mut engine = engine(flat_canvas());
    engine.zoom_in();
    let raw = r#"{"operation": "createFromTemplate", "data": {"label": "Filter"}}"#;
    engine.node_dropped(raw, 400.0, 300.0);

    let expected = engine.viewport().to_content(Point::new(400.0, 300.0));
    let created = controller_pipeline(&engine, "main").nodes.last().unwrap();
    assert_eq!(created.label, "Filter");
    assert_approx_eq!(f32, created.x_pos, expected.x(), epsilon = 0.001);
    assert_approx_eq!(f32, created.y_pos, expected.y(), epsilon = 0.001);
}

struct BrokenClipboard;

impl ClipboardStorage for BrokenClipboard {
    fn store(&mut self, _content: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("denied".to_string()))
    }

    fn load(&self) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("denied".to_string()))
    }
}

#[test]
fn test_clipboard_failure_is_contained() {
    let controller = InMemoryController::new(flat_canvas()).with_clipboard(Box::new(BrokenClipboard));
    let mut engine = CanvasEngine::new(controller, AppConfig::default()).unwrap();
    engine.controller_mut().set_selections(vec![id("a")], id("main"));

    assert!(engine.key_down(KeyEvent::new(Key::Char('c')).with_ctrl()));
    assert!(engine.key_down(KeyEvent::new(Key::Char('v')).with_ctrl()));
    assert_eq!(controller_pipeline(&engine, "main").nodes.len(), 2);

    assert!(engine.key_down(KeyEvent::new(Key::Char('x')).with_ctrl()));
    assert!(controller_pipeline(&engine, "main").node(id("a")).is_none());
}

#[test]
fn test_hover_tip_respects_tip_showing() {
    let mut engine = engine(flat_canvas());
    engine.pointer_move(PointerEvent::at(135.0, 120.0));
    assert_eq!(engine.hover_tip(), Some((id("a"), TipType::Node)));

    engine.controller_mut().set_tip_showing(true);
    engine.pointer_move(PointerEvent::at(335.0, 120.0));
    assert_eq!(engine.hover_tip(), None);
}

#[test]
fn test_invalid_config_rejected() {
    let mut engine = engine(flat_canvas());
    let config: AppConfig = serde_json::from_str(r#"{"viewport": {"min_scale": 3.0, "max_scale": 1.0}}"#).unwrap();
    assert!(engine.set_config(config).is_err());
}

#[test]
fn test_font_config_renders() {
    let config: AppConfig =
        serde_json::from_str(r#"{"style": {"font_family": "sans-serif", "font_size": 11}}"#).unwrap();
    let engine = CanvasEngine::new(InMemoryController::new(flat_canvas()), config).unwrap();
    assert!(engine.render_svg().unwrap().contains("Target"));

    let zero: AppConfig = serde_json::from_str(r#"{"style": {"font_family": "sans-serif", "font_size": 0}}"#).unwrap();
    assert!(CanvasEngine::new(InMemoryController::new(flat_canvas()), zero).is_err());
}

#[test]
fn test_render_svg_after_zoom_to_fit() {
    let mut engine = engine(flat_canvas());
    engine.zoom_to_fit();
    let svg = engine.render_svg().unwrap();
    assert!(svg.contains("Source"));
    assert!(svg.contains(r#"data-layer="links""#));
}
