//! Screen geometry shared by gestures, the coordinate bridge and the scenario.
//!
//! All values are device pixels in the coordinate space of the currently
//! active rendering context, with the origin at the top-left corner.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An integer screen position.
///
/// Points produced by the coordinate bridge always have non-negative
/// components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position in device pixels.
    pub x: i32,
    /// Vertical position in device pixels.
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Dimensions of the device window as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: i32,
    pub height: i32,
}

impl WindowSize {
    /// Midpoint of the window, rounded down.
    pub fn center(&self) -> Point {
        Point::new(self.width / 2, self.height / 2)
    }

    /// A point at the given fraction of width and height, truncated.
    ///
    /// `fraction(0.8, 0.2)` is the upper-right target used by the move step.
    pub fn fraction(&self, fx: f64, fy: f64) -> Point {
        Point::new(
            (self.width as f64 * fx) as i32,
            (self.height as f64 * fy) as i32,
        )
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle, used as the bounding box of composite gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    /// A square box centred on `center` extending `half_extent` pixels on
    /// each side.
    ///
    /// The box is not clamped to the screen; the driver decides how to treat
    /// regions that leave the viewport.
    pub fn around(center: Point, half_extent: i32) -> Self {
        Self {
            left: center.x - half_extent,
            top: center.y - half_extent,
            width: half_extent * 2,
            height: half_extent * 2,
        }
    }
}
