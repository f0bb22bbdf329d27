//! Resize math for expanded supernodes and comments.
//!
//! A resize gesture moves one or two edges of the object's bounds by the
//! pointer offset accumulated since the gesture started. A step that would
//! shrink the object below its minimum size is rejected as a whole, leaving
//! the previous geometry in place while the gesture stays active.
//!
//! When a supernode is resized, sibling nodes that sat entirely inside its
//! original footprint are translated so that they keep their relative place
//! within it.

use std::{fmt, str::FromStr};

use flowcanvas_core::geometry::{Bounds, Point, Size};

/// Edge or corner being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeDirection {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
}

impl ResizeDirection {
    pub const ALL: [ResizeDirection; 8] = [
        ResizeDirection::N,
        ResizeDirection::S,
        ResizeDirection::E,
        ResizeDirection::W,
        ResizeDirection::NE,
        ResizeDirection::NW,
        ResizeDirection::SE,
        ResizeDirection::SW,
    ];

    fn moves_top(self) -> bool {
        matches!(self, Self::N | Self::NE | Self::NW)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Self::S | Self::SE | Self::SW)
    }

    fn moves_left(self) -> bool {
        matches!(self, Self::W | Self::NW | Self::SW)
    }

    fn moves_right(self) -> bool {
        matches!(self, Self::E | Self::NE | Self::SE)
    }

    /// Direction for a pointer near the given edges, or `None` when no edge
    /// is near.
    pub fn from_edges(top: bool, bottom: bool, left: bool, right: bool) -> Option<Self> {
        match (top, bottom, left, right) {
            (true, _, true, _) => Some(Self::NW),
            (true, _, _, true) => Some(Self::NE),
            (_, true, true, _) => Some(Self::SW),
            (_, true, _, true) => Some(Self::SE),
            (true, _, _, _) => Some(Self::N),
            (_, true, _, _) => Some(Self::S),
            (_, _, true, _) => Some(Self::W),
            (_, _, _, true) => Some(Self::E),
            _ => None,
        }
    }
}

impl FromStr for ResizeDirection {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "n" => Ok(Self::N),
            "s" => Ok(Self::S),
            "e" => Ok(Self::E),
            "w" => Ok(Self::W),
            "ne" => Ok(Self::NE),
            "nw" => Ok(Self::NW),
            "se" => Ok(Self::SE),
            "sw" => Ok(Self::SW),
            _ => Err("Unsupported resize direction"),
        }
    }
}

impl From<ResizeDirection> for &'static str {
    fn from(val: ResizeDirection) -> Self {
        match val {
            ResizeDirection::N => "n",
            ResizeDirection::S => "s",
            ResizeDirection::E => "e",
            ResizeDirection::W => "w",
            ResizeDirection::NE => "ne",
            ResizeDirection::NW => "nw",
            ResizeDirection::SE => "se",
            ResizeDirection::SW => "sw",
        }
    }
}

impl fmt::Display for ResizeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &'static str = (*self).into();
        write!(f, "{s}")
    }
}

/// Bounds after dragging `direction` of `start` by `delta`, or `None` when
/// the result would be smaller than `min` on either axis.
pub fn resized_bounds(start: Bounds, direction: ResizeDirection, delta: Point, min: Size) -> Option<Bounds> {
    let mut min_x = start.min_x();
    let mut min_y = start.min_y();
    let mut max_x = start.max_x();
    let mut max_y = start.max_y();

    if direction.moves_left() {
        min_x += delta.x();
    }
    if direction.moves_right() {
        max_x += delta.x();
    }
    if direction.moves_top() {
        min_y += delta.y();
    }
    if direction.moves_bottom() {
        max_y += delta.y();
    }

    let size = Size::new(max_x - min_x, max_y - min_y);
    if size.width() < min.width() || size.height() < min.height() {
        return None;
    }
    Some(Bounds::new_from_top_left(Point::new(min_x, min_y), size))
}

/// New top-left corner for `child`, a box that sat inside `old`, after `old`
/// was resized to `new`. The child's center keeps its relative place.
pub fn proportional_position(old: Bounds, new: Bounds, child: Bounds) -> Point {
    let center = child.center();
    let fx = if old.width() > 0.0 {
        (center.x() - old.min_x()) / old.width()
    } else {
        0.5
    };
    let fy = if old.height() > 0.0 {
        (center.y() - old.min_y()) / old.height()
    } else {
        0.5
    };
    let new_center = Point::new(new.min_x() + fx * new.width(), new.min_y() + fy * new.height());
    Point::new(
        new_center.x() - child.width() / 2.0,
        new_center.y() - child.height() / 2.0,
    )
}
