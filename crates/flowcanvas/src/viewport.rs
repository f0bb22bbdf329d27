//! Viewport and zoom transform management.
//!
//! The [`Viewport`] owns the affine transform `{x, y, k}` applied to the whole
//! scene: a point `p` in content coordinates is drawn at `p * k + (x, y)` on
//! screen. The scale is always kept within the configured range.
//!
//! # Example
//!
//! ```
//! # use flowcanvas::{config::ViewportConfig, viewport::Viewport};
//! # use flowcanvas_core::geometry::Size;
//! let mut viewport = Viewport::new(ViewportConfig::default(), Size::new(800.0, 600.0));
//! for _ in 0..50 {
//!     viewport.zoom_in();
//! }
//! assert_eq!(viewport.transform().k(), 2.0);
//! ```

use log::debug;

use flowcanvas_core::geometry::{Bounds, Insets, Point, Size};

use crate::config::ViewportConfig;

/// Translate-then-scale transform from content to screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    x: f32,
    y: f32,
    k: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };

    pub fn new(x: f32, y: f32, k: f32) -> Self {
        Self { x, y, k }
    }

    pub fn x(self) -> f32 {
        self.x
    }

    pub fn y(self) -> f32 {
        self.y
    }

    pub fn k(self) -> f32 {
        self.k
    }

    pub fn translation(self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Maps a content point to screen coordinates.
    pub fn apply(self, point: Point) -> Point {
        Point::new(point.x() * self.k + self.x, point.y() * self.k + self.y)
    }

    /// Maps a screen point back to content coordinates.
    pub fn invert(self, point: Point) -> Point {
        Point::new((point.x() - self.x) / self.k, (point.y() - self.y) / self.k)
    }

    pub fn apply_bounds(self, bounds: Bounds) -> Bounds {
        Bounds::new_from_top_left(self.apply(bounds.min_point()), bounds.to_size().scale(self.k))
    }

    pub fn invert_bounds(self, bounds: Bounds) -> Bounds {
        Bounds::new_from_top_left(self.invert(bounds.min_point()), bounds.to_size().scale(1.0 / self.k))
    }

    /// Composes a nested transform with the transform of its parent.
    ///
    /// `self` maps nested content into the nested area, whose top-left corner
    /// is `area_origin` in the parent's content coordinates. The result maps
    /// nested content straight to the screen:
    /// `k = k_nested * k_parent` and `t = (t_nested + area_origin) * k_parent + t_parent`.
    pub fn nested_in(self, parent: Transform, area_origin: Point) -> Transform {
        Transform {
            x: (self.x + area_origin.x()) * parent.k + parent.x,
            y: (self.y + area_origin.y()) * parent.k + parent.y,
            k: self.k * parent.k,
        }
    }

    /// Transform that fits `content` inside an area of `area` size, scaled
    /// down (never up) and centered.
    pub fn fit(content: Bounds, area: Size, padding: f32, min_scale: f32, max_scale: f32) -> Transform {
        let padded = content.add_padding(Insets::uniform(padding));
        let k = if padded.width() <= 0.0 || padded.height() <= 0.0 {
            1.0
        } else {
            (area.width() / padded.width())
                .min(area.height() / padded.height())
                .min(1.0)
        }
        .clamp(min_scale, max_scale);

        let center = content.center();
        Transform {
            x: area.width() / 2.0 - center.x() * k,
            y: area.height() / 2.0 - center.y() * k,
            k,
        }
    }
}

/// The zoomable, pannable view onto the root pipeline.
#[derive(Debug, Clone)]
pub struct Viewport {
    transform: Transform,
    size: Size,
    config: ViewportConfig,
    last_move: Option<Point>,
}

impl Viewport {
    pub fn new(config: ViewportConfig, size: Size) -> Self {
        Self {
            transform: Transform::IDENTITY,
            size,
            config,
            last_move: None,
        }
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ViewportConfig) {
        self.config = config;
        let k = self.clamp_scale(self.transform.k);
        self.transform.k = k;
    }

    /// Replaces the transform, clamping the scale.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = Transform {
            k: self.clamp_scale(transform.k),
            ..transform
        };
    }

    /// Updates the viewport size after the host container was resized.
    pub fn set_size(&mut self, size: Size) {
        debug!(width = size.width(), height = size.height(); "Viewport resized");
        self.size = size;
    }

    fn clamp_scale(&self, k: f32) -> f32 {
        k.clamp(self.config.min_scale(), self.config.max_scale())
    }

    fn center(&self) -> Point {
        Point::new(self.size.width() / 2.0, self.size.height() / 2.0)
    }

    /// Multiplies the scale by `ratio`, keeping the content under `anchor`
    /// (a screen point) fixed.
    pub fn zoom_at(&mut self, anchor: Point, ratio: f32) {
        let content = self.transform.invert(anchor);
        let k = self.clamp_scale(self.transform.k * ratio);
        self.transform = Transform {
            x: anchor.x() - content.x() * k,
            y: anchor.y() - content.y() * k,
            k,
        };
    }

    pub fn zoom_in(&mut self) {
        self.zoom_at(self.center(), self.config.zoom_ratio());
    }

    pub fn zoom_out(&mut self) {
        self.zoom_at(self.center(), 1.0 / self.config.zoom_ratio());
    }

    /// Scales and centers `content` in the viewport. The scale never exceeds
    /// one. Without content the transform resets to identity.
    pub fn zoom_to_fit(&mut self, content: Option<Bounds>) {
        self.transform = match content {
            Some(bounds) => Transform::fit(
                bounds,
                self.size,
                self.config.zoom_to_fit_padding(),
                self.config.min_scale(),
                self.config.max_scale(),
            ),
            None => Transform::IDENTITY,
        };
    }

    /// Sets the translation during a pan gesture, then keeps content smaller
    /// than the viewport fully in view.
    pub fn pan_to(&mut self, translation: Point, content: Option<Bounds>) {
        self.transform.x = translation.x();
        self.transform.y = translation.y();
        if let Some(bounds) = content {
            self.clamp_translation(bounds);
        }
    }

    /// Clamps each axis on which the scaled content is smaller than the
    /// viewport so the content box stays inside it.
    pub fn clamp_translation(&mut self, content: Bounds) {
        let k = self.transform.k;
        if content.width() * k <= self.size.width() {
            let low = -content.min_x() * k;
            let high = self.size.width() - content.max_x() * k;
            self.transform.x = self.transform.x.clamp(low, high);
        }
        if content.height() * k <= self.size.height() {
            let low = -content.min_y() * k;
            let high = self.size.height() - content.max_y() * k;
            self.transform.y = self.transform.y.clamp(low, high);
        }
    }

    pub fn to_content(&self, screen: Point) -> Point {
        self.transform.invert(screen)
    }

    pub fn to_screen(&self, content: Point) -> Point {
        self.transform.apply(content)
    }

    /// Content coordinates of the visible area's top-left corner. Hosts use
    /// it to place new objects inside the visible viewport.
    pub fn svg_viewport_offset(&self) -> Point {
        self.transform.invert(Point::default())
    }

    /// Down-sampling gate for pointer moves: returns `false` when `screen` is
    /// closer than the minimum move distance to the last accepted move.
    pub fn accept_move(&mut self, screen: Point) -> bool {
        match self.last_move {
            Some(last) if last.distance(screen) < self.config.min_move_distance() => false,
            _ => {
                self.last_move = Some(screen);
                true
            }
        }
    }

    pub fn reset_move_gate(&mut self) {
        self.last_move = None;
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(ViewportConfig::default(), Size::new(800.0, 600.0))
    }

    #[test]
    fn test_zoom_in_keeps_center_fixed() {
        let mut viewport = viewport();
        let before = viewport.to_content(Point::new(400.0, 300.0));
        viewport.zoom_in();
        let after = viewport.to_content(Point::new(400.0, 300.0));
        assert_approx_eq!(f32, viewport.transform().k(), 1.1);
        assert_approx_eq!(f32, before.x(), after.x(), epsilon = 0.001);
        assert_approx_eq!(f32, before.y(), after.y(), epsilon = 0.001);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut viewport = viewport();
        for _ in 0..100 {
            viewport.zoom_out();
        }
        assert_eq!(viewport.transform().k(), 0.2);
        for _ in 0..100 {
            viewport.zoom_in();
        }
        assert_eq!(viewport.transform().k(), 2.0);
    }

    #[test]
    fn test_zoom_to_fit_large_content() {
        let mut viewport = viewport();
        let content = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(1560.0, 560.0));
        viewport.zoom_to_fit(Some(content));
        let t = viewport.transform();
        // Padded to 1600x600: limited by width.
        assert_approx_eq!(f32, t.k(), 0.5);
        let center = viewport.to_screen(content.center());
        assert_approx_eq!(f32, center.x(), 400.0);
        assert_approx_eq!(f32, center.y(), 300.0);
    }

    #[test]
    fn test_zoom_to_fit_never_enlarges() {
        let mut viewport = viewport();
        let content = Bounds::new_from_top_left(Point::new(100.0, 100.0), Size::new(50.0, 50.0));
        viewport.zoom_to_fit(Some(content));
        assert_eq!(viewport.transform().k(), 1.0);
        assert_eq!(viewport.to_screen(Point::new(125.0, 125.0)), Point::new(400.0, 300.0));
    }

    #[test]
    fn test_zoom_to_fit_without_content_resets() {
        let mut viewport = viewport();
        viewport.zoom_in();
        viewport.zoom_to_fit(None);
        assert_eq!(viewport.transform(), Transform::IDENTITY);
    }

    #[test]
    fn test_pan_clamped_for_small_content() {
        let mut viewport = viewport();
        let content = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(100.0, 100.0));
        viewport.pan_to(Point::new(-500.0, 900.0), Some(content));
        assert_eq!(viewport.transform().x(), 0.0);
        assert_eq!(viewport.transform().y(), 500.0);
    }

    #[test]
    fn test_pan_unclamped_for_large_content() {
        let mut viewport = viewport();
        let content = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(2000.0, 100.0));
        viewport.pan_to(Point::new(-900.0, 0.0), Some(content));
        assert_eq!(viewport.transform().x(), -900.0);
    }

    #[test]
    fn test_svg_viewport_offset() {
        let mut viewport = viewport();
        viewport.set_transform(Transform::new(-100.0, -50.0, 2.0));
        assert_eq!(viewport.svg_viewport_offset(), Point::new(50.0, 25.0));
    }

    #[test]
    fn test_move_gate() {
        let mut viewport = Viewport::new(
            ViewportConfig::default().with_min_move_distance(5.0),
            Size::new(100.0, 100.0),
        );
        assert!(viewport.accept_move(Point::new(0.0, 0.0)));
        assert!(!viewport.accept_move(Point::new(3.0, 0.0)));
        assert!(viewport.accept_move(Point::new(5.0, 0.0)));
        viewport.reset_move_gate();
        assert!(viewport.accept_move(Point::new(5.0, 1.0)));
    }

    #[test]
    fn test_nested_transform_composition() {
        let parent = Transform::new(10.0, 20.0, 2.0);
        let nested = Transform::new(5.0, 5.0, 0.5);
        let composed = nested.nested_in(parent, Point::new(100.0, 50.0));
        assert_eq!(composed, Transform::new(220.0, 130.0, 1.0));

        // Composition agrees with applying both steps.
        let p = Point::new(8.0, 4.0);
        let step = parent.apply(nested.apply(p).add_point(Point::new(100.0, 50.0)));
        assert_eq!(composed.apply(p), step);
    }

    #[test]
    fn test_transform_roundtrip() {
        let t = Transform::new(13.0, -7.0, 1.5);
        let p = Point::new(42.0, 17.0);
        let back = t.invert(t.apply(p));
        assert_approx_eq!(f32, back.x(), p.x(), epsilon = 0.0001);
        assert_approx_eq!(f32, back.y(), p.y(), epsilon = 0.0001);
    }
}
