//! Configuration types for the canvas engine.
//!
//! All types implement [`serde::Deserialize`] and every section falls back to
//! its defaults, so hosts may load partial documents.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining all sections
//! - [`CanvasLayout`] - Pixel constants and mode flags (re-exported from the core crate)
//! - [`ViewportConfig`] - Zoom limits, zoom step and pointer down-sampling
//! - [`InteractionConfig`] - Gesture options
//! - [`StyleConfig`] - Canvas colors and the label font
//!
//! # Example
//!
//! ```
//! # use flowcanvas::config::AppConfig;
//! let config = AppConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.viewport().max_scale(), 2.0);
//! ```

use serde::Deserialize;

pub use flowcanvas_core::layout::CanvasLayout;
use flowcanvas_core::{
    color::Color,
    text::{CharWidthMeasure, FontMeasure, TextMeasure},
};

use crate::CanvasError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    layout: CanvasLayout,

    #[serde(default)]
    viewport: ViewportConfig,

    #[serde(default)]
    interaction: InteractionConfig,

    #[serde(default)]
    style: StyleConfig,
}

impl AppConfig {
    pub fn new(
        layout: CanvasLayout,
        viewport: ViewportConfig,
        interaction: InteractionConfig,
        style: StyleConfig,
    ) -> Self {
        Self {
            layout,
            viewport,
            interaction,
            style,
        }
    }

    /// Returns a copy with the given layout.
    pub fn with_layout(mut self, layout: CanvasLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> &CanvasLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut CanvasLayout {
        &mut self.layout
    }

    pub fn viewport(&self) -> &ViewportConfig {
        &self.viewport
    }

    pub fn interaction(&self) -> &InteractionConfig {
        &self.interaction
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    /// Checks cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Config`] for an empty or inverted scale range, a
    /// zoom ratio not above one, an unparsable style color or a zero font size.
    pub fn validate(&self) -> Result<(), CanvasError> {
        let viewport = &self.viewport;
        if viewport.min_scale <= 0.0 || viewport.min_scale > viewport.max_scale {
            return Err(CanvasError::Config(format!(
                "scale range [{}, {}] is invalid",
                viewport.min_scale, viewport.max_scale
            )));
        }
        if viewport.zoom_ratio <= 1.0 {
            return Err(CanvasError::Config(format!(
                "zoom ratio {} must be greater than 1",
                viewport.zoom_ratio
            )));
        }
        self.style.background_color().map_err(CanvasError::Config)?;
        self.style.selection_color().map_err(CanvasError::Config)?;
        self.style.text_measure().map_err(CanvasError::Config)?;
        Ok(())
    }
}

/// Zoom and pan settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    min_scale: f32,
    max_scale: f32,
    zoom_ratio: f32,
    zoom_to_fit_padding: f32,
    /// Pointer moves shorter than this (in screen pixels) are skipped while
    /// panning, dragging or resizing.
    min_move_distance: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.2,
            max_scale: 2.0,
            zoom_ratio: 1.1,
            zoom_to_fit_padding: 20.0,
            min_move_distance: 0.0,
        }
    }
}

impl ViewportConfig {
    pub fn new(min_scale: f32, max_scale: f32, zoom_ratio: f32) -> Self {
        Self {
            min_scale,
            max_scale,
            zoom_ratio,
            ..Self::default()
        }
    }

    pub fn with_min_move_distance(mut self, distance: f32) -> Self {
        self.min_move_distance = distance;
        self
    }

    pub fn min_scale(&self) -> f32 {
        self.min_scale
    }

    pub fn max_scale(&self) -> f32 {
        self.max_scale
    }

    pub fn zoom_ratio(&self) -> f32 {
        self.zoom_ratio
    }

    pub fn zoom_to_fit_padding(&self) -> f32 {
        self.zoom_to_fit_padding
    }

    pub fn min_move_distance(&self) -> f32 {
        self.min_move_distance
    }
}

/// Gesture options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Allow a new link to end on its own source node.
    self_referencing_links: bool,
    /// Allow links from comments to nodes.
    comment_links: bool,
    /// Length of the new-link snap-back animation.
    snap_back_duration_ms: f64,
    /// Pointer tolerance for link hit testing, in screen pixels.
    link_hit_tolerance: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            self_referencing_links: false,
            comment_links: true,
            snap_back_duration_ms: 1000.0,
            link_hit_tolerance: 4.0,
        }
    }
}

impl InteractionConfig {
    pub fn with_self_referencing_links(mut self, allowed: bool) -> Self {
        self.self_referencing_links = allowed;
        self
    }

    pub fn self_referencing_links(&self) -> bool {
        self.self_referencing_links
    }

    pub fn comment_links(&self) -> bool {
        self.comment_links
    }

    pub fn snap_back_duration_ms(&self) -> f64 {
        self.snap_back_duration_ms
    }

    pub fn link_hit_tolerance(&self) -> f32 {
        self.link_hit_tolerance
    }
}

/// Default label font size in points when only a font family is configured.
pub const DEFAULT_FONT_SIZE: u16 = 12;

/// Canvas colors and label font. Unset fields fall back to renderer defaults.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StyleConfig {
    #[serde(default)]
    background_color: Option<String>,

    #[serde(default)]
    selection_color: Option<String>,

    /// Font family used to measure labels and comment text. Without it, a
    /// fixed per-character width is used.
    #[serde(default)]
    font_family: Option<String>,

    #[serde(default)]
    font_size: Option<u16>,
}

impl StyleConfig {
    pub fn new(background_color: Option<String>, selection_color: Option<String>) -> Self {
        Self {
            background_color,
            selection_color,
            ..Self::default()
        }
    }

    /// Returns a copy that measures text with `font_family` at `font_size` points.
    pub fn with_font(mut self, font_family: impl Into<String>, font_size: u16) -> Self {
        self.font_family = Some(font_family.into());
        self.font_size = Some(font_size);
        self
    }

    pub fn font_family(&self) -> Option<&str> {
        self.font_family.as_deref()
    }

    /// Builds the text measure for the configured font: shaped font metrics
    /// when a family is set, a fixed character width otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured font size is zero.
    pub fn text_measure(&self) -> Result<Box<dyn TextMeasure>, String> {
        let Some(family) = &self.font_family else {
            return Ok(Box::new(CharWidthMeasure::default()));
        };
        let size = self.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        FontMeasure::new(family, size)
            .map(|measure| Box::new(measure) as Box<dyn TextMeasure>)
            .map_err(|err| format!("Invalid font `{family}` at size {size} in config: {err}"))
    }

    /// Returns the parsed background [`Color`], or `None` if no color is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured color string cannot be parsed.
    pub fn background_color(&self) -> Result<Option<Color>, String> {
        parse_color(self.background_color.as_deref(), "background")
    }

    /// Returns the parsed outline [`Color`] for selected objects.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured color string cannot be parsed.
    pub fn selection_color(&self) -> Result<Option<Color>, String> {
        parse_color(self.selection_color.as_deref(), "selection")
    }
}

fn parse_color(value: Option<&str>, field: &str) -> Result<Option<Color>, String> {
    value
        .map(Color::new)
        .transpose()
        .map_err(|err| format!("Invalid {field} color in config: {err}"))
}
