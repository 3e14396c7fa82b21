// Copyright 2026 the Winlatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer pixel geometry.
//!
//! Two rectangle forms are used throughout the pipeline:
//!
//! - [`Region`] is the `x, y, w, h` form that window configurations and
//!   hardware registers carry.
//! - [`Rect`] is the edge-inclusive `left, top, right, bottom` form the
//!   resolvers compute with. `right` and `bottom` name the last pixel that is
//!   still inside, so a one-pixel rectangle has `left == right`.
//!
//! Conversions between the two are lossless for non-empty regions.

/// Largest coordinate a window position or extent register can hold.
///
/// Regions that end past this are rejected at validation, which also keeps
/// every later edge computation clear of `i32` overflow.
pub const MAX_COORDINATE: i32 = 0x7fff;

/// An edge-inclusive rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    /// First column inside the rectangle.
    pub left: i32,
    /// First row inside the rectangle.
    pub top: i32,
    /// Last column inside the rectangle.
    pub right: i32,
    /// Last row inside the rectangle.
    pub bottom: i32,
}

impl Rect {
    /// Creates a rectangle from its inclusive edges.
    #[inline]
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Number of columns covered.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.right - self.left + 1
    }

    /// Number of rows covered.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.bottom - self.top + 1
    }

    /// Pixel count, zero for degenerate rectangles.
    #[must_use]
    pub const fn area(&self) -> u64 {
        let w = self.width();
        let h = self.height();
        if w <= 0 || h <= 0 {
            0
        } else {
            w as u64 * h as u64
        }
    }

    /// Returns `true` if the two rectangles share at least one pixel.
    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        !(self.right < other.left
            || self.left > other.right
            || self.bottom < other.top
            || self.top > other.bottom)
    }

    /// The shared part of two rectangles, or `None` when they are disjoint.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }
        Some(Self {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        })
    }

    /// The smallest rectangle containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Returns `true` if any edge differs.
    #[inline]
    #[must_use]
    pub fn differs(&self, other: &Self) -> bool {
        self != other
    }

    /// Returns `true` if `other` lies entirely inside `self`.
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    /// Shifts the rectangle by `(dx, dy)`.
    #[must_use]
    pub const fn translate(&self, dx: i32, dy: i32) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }

    /// Converts to the `x, y, w, h` form.
    #[must_use]
    pub const fn to_region(&self) -> Region {
        Region {
            x: self.left,
            y: self.top,
            w: self.width(),
            h: self.height(),
        }
    }
}

/// A rectangle in `x, y, w, h` form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Region {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub w: i32,
    /// Height in pixels.
    pub h: i32,
}

impl Region {
    /// Creates a region.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Returns `true` if the region covers no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// Returns `true` if both edges past the region end at or before
    /// [`MAX_COORDINATE`]. Negative origins are left to the caller.
    #[must_use]
    pub const fn fits_registers(&self) -> bool {
        match (self.x.checked_add(self.w), self.y.checked_add(self.h)) {
            (Some(right), Some(bottom)) => right <= MAX_COORDINATE && bottom <= MAX_COORDINATE,
            _ => false,
        }
    }

    /// Converts to the edge-inclusive form.
    #[must_use]
    pub const fn to_rect(&self) -> Rect {
        Rect {
            left: self.x,
            top: self.y,
            right: self.x + self.w - 1,
            bottom: self.y + self.h - 1,
        }
    }

    /// Returns this region with its origin moved into the coordinate space
    /// that starts at `(ox, oy)`.
    #[must_use]
    pub const fn relative_to(&self, ox: i32, oy: i32) -> Self {
        Self {
            x: self.x - ox,
            y: self.y - oy,
            w: self.w,
            h: self.h,
        }
    }
}

impl From<Rect> for Region {
    fn from(r: Rect) -> Self {
        r.to_region()
    }
}

impl From<Region> for Rect {
    fn from(r: Region) -> Self {
        r.to_rect()
    }
}

/// A buffer or panel extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Size {
    /// Creates a size.
    #[inline]
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// The rectangle anchored at the origin with this extent.
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width - 1, self.height - 1)
    }
}

/// Rounds `v` down to a multiple of `align` (a power of two).
#[inline]
#[must_use]
pub const fn align_down(v: i32, align: i32) -> i32 {
    v & !(align - 1)
}

/// Rounds `v` up to a multiple of `align` (a power of two).
#[inline]
#[must_use]
pub const fn align_up(v: i32, align: i32) -> i32 {
    (v + align - 1) & !(align - 1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
