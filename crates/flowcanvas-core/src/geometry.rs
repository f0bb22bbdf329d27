//! Geometric primitives for diagram layout and hit testing.
//!
//! This module provides the geometric types and pure functions the canvas uses
//! to position nodes and comments, compute link anchors and test pointer hits.
//!
//! # Overview
//!
//! - [`Point`] - A 2D coordinate in canvas space
//! - [`Size`] - Width and height dimensions
//! - [`Bounds`] - A rectangular bounding box defined by minimum and maximum coordinates
//! - [`Insets`] - Padding/margin values for four sides
//! - [`outer_coord`] - Where a ray from a rectangle's center leaves its perimeter
//! - [`arrow_head`] - Arrow-head triangle at the end of a segment
//!
//! # Coordinate System
//!
//! The canvas uses a coordinate system consistent with SVG:
//!
//! ```text
//!   (0,0) ────────► +X
//!     │
//!     │
//!     ▼
//!    +Y
//! ```
//!
//! Nodes and comments are positioned by their top-left corner (`x_pos`,
//! `y_pos`), so most bounds are built with [`Bounds::new_from_top_left`].

/// A position in canvas (content) coordinates.
///
/// # Examples
///
/// ```
/// # use flowcanvas_core::geometry::Point;
/// let node_origin = Point::new(10.0, 20.0);
/// let drag = Point::new(5.0, 5.0);
///
/// let moved = node_origin.add_point(drag);
/// assert_eq!(moved, Point::new(15.0, 25.0));
/// assert_eq!(moved.sub_point(node_origin), drag);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    x: f32,
    y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(self) -> f32 {
        self.x
    }

    pub fn y(self) -> f32 {
        self.y
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn add_point(self, other: Point) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn sub_point(self, other: Point) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    /// Length of the vector from the origin to this point.
    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f32 {
        self.sub_point(other).length()
    }

    pub fn scale(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Swaps the x and y coordinates.
    ///
    /// Routing for vertically formatted nodes is computed in a transposed
    /// space and swapped back on output.
    pub fn transpose(self) -> Self {
        Self {
            x: self.y,
            y: self.x,
        }
    }
}

/// Width and height of a node, comment or viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    width: f32,
    height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn width(self) -> f32 {
        self.width
    }

    pub fn height(self) -> f32 {
        self.height
    }

    /// Component-wise maximum, used to enforce minimum sizes.
    pub fn max(self, other: Size) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }

    pub fn scale(self, factor: f32) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

/// Axis-aligned rectangle stored as its two extreme corners.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    pub fn new_from_center(center: Point, size: Size) -> Self {
        let half = size.scale(0.5);
        Self {
            min_x: center.x - half.width,
            min_y: center.y - half.height,
            max_x: center.x + half.width,
            max_y: center.y + half.height,
        }
    }

    /// Bounds of an object positioned by its top-left corner.
    pub fn new_from_top_left(top_left: Point, size: Size) -> Self {
        Self {
            min_x: top_left.x,
            min_y: top_left.y,
            max_x: top_left.x + size.width,
            max_y: top_left.y + size.height,
        }
    }

    /// Creates the normalized bounds spanned by two arbitrary corner points.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flowcanvas_core::geometry::{Bounds, Point};
    /// let region = Bounds::from_corners(Point::new(50.0, 10.0), Point::new(20.0, 40.0));
    /// assert_eq!(region.min_x(), 20.0);
    /// assert_eq!(region.min_y(), 10.0);
    /// assert_eq!(region.width(), 30.0);
    /// ```
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    pub fn min_x(self) -> f32 {
        self.min_x
    }

    pub fn min_y(self) -> f32 {
        self.min_y
    }

    pub fn max_x(self) -> f32 {
        self.max_x
    }

    pub fn max_y(self) -> f32 {
        self.max_y
    }

    pub fn center(self) -> Point {
        Point::new((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn width(self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(self) -> f32 {
        self.max_y - self.min_y
    }

    /// Top-left corner.
    pub fn min_point(self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    pub fn to_size(self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// Smallest bounds containing both.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flowcanvas_core::geometry::{Bounds, Point, Size};
    /// let node = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(100.0, 30.0));
    /// let comment = Bounds::new_from_top_left(Point::new(10.0, 40.0), Size::new(120.0, 80.0));
    ///
    /// let content = node.merge(&comment);
    /// assert_eq!(content.to_size(), Size::new(130.0, 120.0));
    /// ```
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn translate(&self, offset: Point) -> Self {
        Self::new_from_top_left(self.min_point().add_point(offset), self.to_size())
    }

    /// Re-expresses the bounds relative to `origin`.
    pub fn inverse_translate(&self, origin: Point) -> Self {
        Self::new_from_top_left(self.min_point().sub_point(origin), self.to_size())
    }

    /// Grows the bounds outward by `insets`.
    pub fn add_padding(&self, insets: Insets) -> Self {
        Self {
            min_x: self.min_x - insets.left,
            min_y: self.min_y - insets.top,
            max_x: self.max_x + insets.right,
            max_y: self.max_y + insets.bottom,
        }
    }

    /// Returns `true` when the two bounds overlap or touch.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Returns `true` when the point lies inside or on the border.
    pub fn contains_point(&self, point: Point) -> bool {
        (self.min_x..=self.max_x).contains(&point.x) && (self.min_y..=self.max_y).contains(&point.y)
    }

    /// Returns `true` when `other` lies entirely inside these bounds.
    pub fn contains(&self, other: &Self) -> bool {
        self.contains_point(other.min_point()) && self.contains_point(Point::new(other.max_x, other.max_y))
    }
}

/// Per-side padding, used for halos, hit slop and fit margins.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Insets {
    top: f32,
    right: f32,
    bottom: f32,
    left: f32,
}

impl Insets {
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn top(self) -> f32 {
        self.top
    }

    pub fn right(self) -> f32 {
        self.right
    }

    pub fn bottom(self) -> f32 {
        self.bottom
    }

    pub fn left(self) -> f32 {
        self.left
    }
}

/// Computes where the ray from the center of `outer` towards `inner` crosses
/// the perimeter of `outer`.
///
/// The side that is hit is decided quadrant-by-quadrant from the slope of the
/// ray compared with the slope of the rectangle's diagonal: a shallower ray
/// leaves through the east or west side, a steeper one through the north or
/// south side. When `inner` coincides with the center, the center is returned.
///
/// # Examples
///
/// ```
/// # use flowcanvas_core::geometry::{outer_coord, Bounds, Point, Size};
/// let node = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(100.0, 50.0));
///
/// // Target far to the right: leaves through the east side.
/// let east = outer_coord(Point::new(300.0, 25.0), node);
/// assert_eq!(east, Point::new(100.0, 25.0));
///
/// // Target far below: leaves through the south side.
/// let south = outer_coord(Point::new(50.0, 400.0), node);
/// assert_eq!(south, Point::new(50.0, 50.0));
/// ```
pub fn outer_coord(inner: Point, outer: Bounds) -> Point {
    let center = outer.center();
    let dx = inner.x - center.x;
    let dy = inner.y - center.y;

    if dx == 0.0 && dy == 0.0 {
        return center;
    }

    let half_width = outer.width() / 2.0;
    let half_height = outer.height() / 2.0;

    // Compare |dy/dx| with the diagonal slope without dividing by zero.
    let leaves_east_west = dy.abs() * half_width <= dx.abs() * half_height;

    if leaves_east_west {
        let x = if dx > 0.0 { outer.max_x } else { outer.min_x };
        let y = center.y + dy * (half_width / dx.abs());
        Point::new(x, y)
    } else {
        let y = if dy > 0.0 { outer.max_y } else { outer.min_y };
        let x = center.x + dx * (half_height / dy.abs());
        Point::new(x, y)
    }
}

/// Returns the three corners of an arrow head whose tip sits at `end` and
/// which points along the segment from `start` to `end`.
///
/// The corners are `[tip, left, right]`. A zero-length segment yields an
/// arrow pointing along +X.
pub fn arrow_head(start: Point, end: Point, length: f32, half_width: f32) -> [Point; 3] {
    let delta = end.sub_point(start);
    let len = delta.length();
    let dir = if len == 0.0 {
        Point::new(1.0, 0.0)
    } else {
        delta.scale(1.0 / len)
    };
    let normal = Point::new(-dir.y, dir.x);
    let base = end.sub_point(dir.scale(length));

    [
        end,
        base.add_point(normal.scale(half_width)),
        base.sub_point(normal.scale(half_width)),
    ]
}

/// Formats an arrow head from [`arrow_head`] as a closed SVG path.
pub fn arrow_head_path(start: Point, end: Point, length: f32, half_width: f32) -> String {
    let [tip, left, right] = arrow_head(start, end, length, half_width);
    format!(
        "M {} {} L {} {} L {} {} Z",
        tip.x, tip.y, left.x, left.y, right.x, right.y
    )
}
