//! Rectangle and size math shared by layers, tiles and frames
//!
//! All coordinates are `f32` device pixels at some zoom. Change detection
//! never compares floats exactly; it goes through [`fuzzy_eq`].

use std::fmt;

/// Tolerance used by every viewport/zoom comparison
pub const FUZZY_EPSILON: f32 = 1e-4;

/// Tolerance-based float equality
#[inline]
#[must_use]
pub fn fuzzy_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < FUZZY_EPSILON
}

/// Integer size in device pixels (tile edges, inflation margins)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntSize {
    pub width: u32,
    pub height: u32,
}

impl IntSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn square(edge: u32) -> Self {
        Self::new(edge, edge)
    }

    /// Multiply by a count of tiles per axis
    #[must_use]
    pub const fn tiles(self, columns: u32, rows: u32) -> Self {
        Self::new(
            self.width.saturating_mul(columns),
            self.height.saturating_mul(rows),
        )
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for IntSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Floating point size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FloatSize {
    pub width: f32,
    pub height: f32,
}

impl FloatSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    #[must_use]
    pub fn fuzzy_eq(self, other: Self) -> bool {
        fuzzy_eq(self.width, other.width) && fuzzy_eq(self.height, other.height)
    }
}

/// Axis-aligned rectangle given by its edges
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    pub const EMPTY: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn from_origin_size(x: f32, y: f32, size: FloatSize) -> Self {
        Self::new(x, y, x + size.width, y + size.height)
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[must_use]
    pub fn size(&self) -> FloatSize {
        FloatSize::new(self.width(), self.height())
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.right.is_finite()
            && self.bottom.is_finite()
    }

    /// True for zero/negative area and non-finite rectangles
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.is_finite() || self.right <= self.left || self.bottom <= self.top
    }

    /// Strict overlap test; rectangles that only share an edge do not intersect
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Whether `other` lies entirely inside `self`
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        !self.is_empty()
            && self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    #[must_use]
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    #[must_use]
    pub fn scale(&self, factor: f32) -> Self {
        Self::new(
            self.left * factor,
            self.top * factor,
            self.right * factor,
            self.bottom * factor,
        )
    }

    #[must_use]
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    #[must_use]
    pub fn fuzzy_eq(&self, other: &Self) -> bool {
        fuzzy_eq(self.left, other.left)
            && fuzzy_eq(self.top, other.top)
            && fuzzy_eq(self.right, other.right)
            && fuzzy_eq(self.bottom, other.bottom)
    }
}

impl fmt::Display for RectF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{},{},{})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Expand `rect` outward to the enclosing tile grid.
///
/// Left/top edges are floored and right/bottom edges ceiled to multiples of
/// the tile size, so coverage never ends in a partial tile.
#[must_use]
pub fn round_to_tile_size(rect: RectF, tile_size: IntSize) -> RectF {
    if rect.is_empty() || tile_size.is_empty() {
        return RectF::EMPTY;
    }

    let w = tile_size.width as f32;
    let h = tile_size.height as f32;
    RectF::new(
        (rect.left / w).floor() * w,
        (rect.top / h).floor() * h,
        (rect.right / w).ceil() * w,
        (rect.bottom / h).ceil() * h,
    )
}

/// Grow `rect` by `margin` on every side, clamping left/top at zero.
#[must_use]
pub fn inflate(rect: RectF, margin: IntSize) -> RectF {
    if rect.is_empty() {
        return RectF::EMPTY;
    }

    let dx = margin.width as f32;
    let dy = margin.height as f32;
    RectF::new(
        (rect.left - dx).max(0.0),
        (rect.top - dy).max(0.0),
        rect.right + dx,
        rect.bottom + dy,
    )
}

/// Rescale a rectangle rendered at `from_zoom` to `to_zoom`.
#[must_use]
pub fn normalize_rect(rect: RectF, from_zoom: f32, to_zoom: f32) -> RectF {
    if !from_zoom.is_finite() || from_zoom <= 0.0 || !to_zoom.is_finite() {
        return RectF::EMPTY;
    }

    rect.scale(to_zoom / from_zoom)
}
