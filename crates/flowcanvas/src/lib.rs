//! flowcanvas - rendering and direct-manipulation engine for flow diagrams.
//!
//! The engine displays a tree of pipelines (nodes, comments and links) with
//! expanded supernodes drawn recursively in place, and turns pointer and
//! keyboard input into edit commands for an external controller.
//!
//! # Overview
//!
//! - [`CanvasEngine`] - Host-facing facade: viewport, gestures, redraws, export
//! - [`controller`] - The controller boundary and an in-memory reference controller
//! - [`interaction`] - The gesture state machine and event types
//! - [`scene`] / [`renderer`] - Declarative scene items, reconciliation and hit testing
//! - [`supernode`] - Arena of nested pipeline renderers
//! - [`export`] - SVG output
//!
//! # Example
//!
//! ```
//! use flowcanvas::{CanvasEngine, config::AppConfig, controller::InMemoryController};
//!
//! let canvas = flowcanvas::load_canvas(
//!     r#"{"primary_pipeline": "main", "pipelines": [{"id": "main", "nodes": []}]}"#,
//! )
//! .unwrap();
//! let mut engine = CanvasEngine::new(InMemoryController::new(canvas), AppConfig::default()).unwrap();
//! engine.zoom_to_fit();
//! let svg = engine.render_svg().unwrap();
//! assert!(svg.starts_with("<svg"));
//! ```

pub mod config;
pub mod controller;
pub mod drop;
pub mod export;
pub mod interaction;
pub mod renderer;
pub mod resize;
pub mod scene;
pub mod supernode;
pub mod viewport;

mod engine;
mod error;

pub use flowcanvas_core::{color, geometry, identifier, layout, model, ports, routing, text};

pub use engine::{CanvasEngine, TextEditorView};
pub use error::CanvasError;

use log::{debug, info};

use model::CanvasInfo;

/// Parses a pipeline tree from its JSON form.
pub fn load_canvas(src: &str) -> Result<CanvasInfo, CanvasError> {
    debug!(len = src.len(); "Parsing pipeline tree");
    let canvas: CanvasInfo =
        serde_json::from_str(src).map_err(|err| CanvasError::new_document_error(err, src))?;
    info!(
        primary_pipeline:% = canvas.primary_pipeline,
        pipelines = canvas.pipelines.len();
        "Pipeline tree loaded"
    );
    Ok(canvas)
}
