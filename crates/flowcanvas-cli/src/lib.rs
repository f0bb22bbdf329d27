//! CLI logic for the flowcanvas renderer.
//!
//! Loads a pipeline tree, drives a [`CanvasEngine`] over it with the
//! in-memory controller and writes the rendered SVG.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;
pub use config::ConfigError;

use std::{fs, str::FromStr};

use log::{LevelFilter, info, warn};

use flowcanvas::{
    CanvasEngine, CanvasError, controller::InMemoryController, geometry::Size, layout::LinkType,
};

/// Run the flowcanvas CLI application
///
/// This function loads the pipeline tree, lays it out and renders it through
/// the canvas engine, then writes the resulting SVG to the output file.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `CanvasError` for:
/// - File I/O errors
/// - Configuration loading errors, including an unknown link type
/// - Document parsing errors
/// - Rendering errors
pub fn run(args: &Args) -> Result<(), CanvasError> {
    info!(
        input_path = args.input,
        output_path = args.output;
        "Processing pipeline"
    );

    let mut app_config = config::load_config(args.config.as_ref())?;
    if let Some(link_type) = &args.link_type {
        let link_type = LinkType::from_str(link_type)
            .map_err(|err| CanvasError::Config(format!("{err}: {link_type}")))?;
        app_config.layout_mut().link_type = link_type;
    }

    let source = fs::read_to_string(&args.input)?;
    let canvas = flowcanvas::load_canvas(&source)?;

    let mut engine = CanvasEngine::new(InMemoryController::new(canvas), app_config)?;
    match LevelFilter::from_str(&args.log_level) {
        Ok(level) => engine.set_log_level(level),
        Err(_) => warn!(log_level = args.log_level; "Unknown log level, keeping the current one"),
    }
    engine.refresh_on_size_change(Size::new(args.width, args.height));
    if !args.no_fit {
        engine.zoom_to_fit();
    }

    engine.export_svg(&args.output)?;

    info!(output_file = args.output; "SVG exported successfully");

    Ok(())
}
