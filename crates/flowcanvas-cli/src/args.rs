//! Command-line argument definitions for the flowcanvas CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments control input/output paths, configuration file
//! selection, the viewport the pipeline is rendered into and logging
//! verbosity.

use clap::Parser;

/// Command-line arguments for the flowcanvas renderer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input pipeline tree (JSON)
    #[arg(help = "Path to the input file")]
    pub input: String,

    /// Path to the output SVG file
    #[arg(short, long, default_value = "out.svg")]
    pub output: String,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Link drawing algorithm (curve, elbow, straight, lightning), overriding the configuration
    #[arg(long)]
    pub link_type: Option<String>,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 800.0)]
    pub width: f32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 600.0)]
    pub height: f32,

    /// Keep the identity transform instead of zooming the content to fit
    #[arg(long)]
    pub no_fit: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Arguments for rendering `input` into `output` with every other option
    /// at its default.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            config: None,
            link_type: None,
            width: 800.0,
            height: 600.0,
            no_fit: false,
            log_level: "info".to_string(),
        }
    }
}
