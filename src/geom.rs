//! Geometric primitives used by the packer and the cache.
//!
//! All coordinates are integer pixels. `Rect` positions live in
//! backing-store space; `Bounds` positions are relative to a content
//! item's logical anchor point and may be negative.

/// An axis-aligned rectangle in backing-store pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    /// Create a rectangle from its top-left corner and size.
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// One past the right edge.
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    /// One past the bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    /// Pixel area.
    pub fn area(&self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }

    /// Whether this rectangle and `other` share any pixel.
    ///
    /// Zero-sized rectangles intersect nothing.
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Whether `other` lies entirely within this rectangle.
    pub fn contains(&self, other: &Self) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// A signed pixel offset, measured from a rectangle's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Measured content bounds, relative to the item's logical anchor point.
///
/// `(x, y)` locate the top-left corner of the inked area; negative values
/// extend left of or above the anchor (e.g. text ascent above a baseline
/// anchor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Whether the inked area is empty (nothing to rasterize).
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}
