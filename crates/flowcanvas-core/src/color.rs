//! Color handling for canvas styling.
//!
//! Colors are only used for the few style knobs the engine exposes (canvas
//! background, selection outline); everything else is left to class names on
//! the rendered elements.

use std::{fmt, str::FromStr};

use color::DynamicColor;

/// A parsed CSS color, backed by `DynamicColor` from the color crate.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
    color: DynamicColor,
}

impl Color {
    /// Parses a CSS color string such as `"#ff0000"`, `"rgb(255, 0, 0)"` or
    /// `"red"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use flowcanvas_core::color::Color;
    ///
    /// assert!(Color::new("#3d70b2").is_ok());
    /// assert!(Color::new("definitely-not-a-color").is_err());
    /// ```
    pub fn new(color_str: &str) -> Result<Self, String> {
        DynamicColor::from_str(color_str)
            .map(|color| Self { color })
            .map_err(|err| format!("invalid color `{color_str}`: {err}"))
    }

    /// Returns the alpha component, between 0.0 (transparent) and 1.0 (opaque).
    pub fn alpha(&self) -> f32 {
        self.color.components[3]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.color)
    }
}

impl From<&Color> for svg::node::Value {
    fn from(color: &Color) -> Self {
        Self::from(color.to_string())
    }
}
