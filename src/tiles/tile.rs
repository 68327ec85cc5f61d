//! Tile identity and cached tile state

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::geometry::{IntSize, RectF};

/// Pixel content of one tile
pub type TileBitmap = image::RgbaImage;

/// Grid address of a tile's expected content.
///
/// `col`/`row` index the tile grid in the layer's zoomed pixel space. The
/// zoom takes part in equality as millionths so float jitter cannot create
/// two identifiers for the same content.
#[derive(Clone, Copy, Debug)]
pub struct TileId {
    pub col: i32,
    pub row: i32,
    pub size: IntSize,
    pub zoom: f32,
}

impl TileId {
    #[must_use]
    pub const fn new(col: i32, row: i32, size: IntSize, zoom: f32) -> Self {
        Self {
            col,
            row,
            size,
            zoom,
        }
    }

    /// Zoom as stable integer key (millionths)
    #[must_use]
    pub fn zoom_millionths(&self) -> i64 {
        (f64::from(self.zoom) * 1_000_000.0).round() as i64
    }

    /// Top-left corner in zoomed pixels, saturating at the `i32` range
    #[must_use]
    pub fn origin(&self) -> (i32, i32) {
        let edge = |size: u32| i32::try_from(size).unwrap_or(i32::MAX);
        (
            self.col.saturating_mul(edge(self.size.width)),
            self.row.saturating_mul(edge(self.size.height)),
        )
    }

    /// Rectangle in zoomed pixels
    #[must_use]
    pub fn rect(&self) -> RectF {
        let x = f64::from(self.col) * f64::from(self.size.width);
        let y = f64::from(self.row) * f64::from(self.size.height);
        RectF::new(
            x as f32,
            y as f32,
            (x + f64::from(self.size.width)) as f32,
            (y + f64::from(self.size.height)) as f32,
        )
    }

    /// Rectangle in document space (zoom 1.0)
    #[must_use]
    pub fn document_rect(&self) -> RectF {
        if self.zoom <= 0.0 || !self.zoom.is_finite() {
            return RectF::EMPTY;
        }
        self.rect().scale(1.0 / self.zoom)
    }
}

impl PartialEq for TileId {
    fn eq(&self, other: &Self) -> bool {
        self.col == other.col
            && self.row == other.row
            && self.size == other.size
            && self.zoom_millionths() == other.zoom_millionths()
    }
}

impl Eq for TileId {}

impl Hash for TileId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.col.hash(state);
        self.row.hash(state);
        self.size.hash(state);
        self.zoom_millionths().hash(state);
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tile[{},{} {} z={}]",
            self.col, self.row, self.size, self.zoom
        )
    }
}

/// Content state of a tile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileState {
    /// Created, never filled
    Placeholder,
    /// Bitmap matches the document
    Valid,
    /// Bitmap is outdated but still shown until a refresh lands
    Stale,
}

/// A single cached bitmap unit
#[derive(Debug)]
pub struct Tile {
    id: TileId,
    bitmap: Option<Arc<TileBitmap>>,
    state: TileState,
    /// Set by the mark pass for tiles that survive the sweep
    pub(crate) marked: bool,
    failures: u32,
}

impl Tile {
    #[must_use]
    pub fn placeholder(id: TileId) -> Self {
        Self {
            id,
            bitmap: None,
            state: TileState::Placeholder,
            marked: false,
            failures: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> &TileId {
        &self.id
    }

    #[must_use]
    pub fn bitmap(&self) -> Option<&Arc<TileBitmap>> {
        self.bitmap.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> TileState {
        self.state
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.bitmap.is_some()
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.state == TileState::Stale
    }

    #[must_use]
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// Consecutive failed fetches since the last successful one
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Attach fresh content; clears staleness and the failure streak
    pub fn set_bitmap(&mut self, bitmap: Arc<TileBitmap>) {
        self.bitmap = Some(bitmap);
        self.state = TileState::Valid;
        self.failures = 0;
    }

    /// Flag the content outdated. Placeholders stay placeholders.
    pub fn invalidate(&mut self) {
        if self.bitmap.is_some() {
            self.state = TileState::Stale;
        }
    }

    pub(crate) fn record_failure(&mut self) -> u32 {
        self.failures = self.failures.saturating_add(1);
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn bitmap() -> Arc<TileBitmap> {
        Arc::new(TileBitmap::new(4, 4))
    }

    #[test]
    fn tile_id_equality_tolerates_zoom_jitter() {
        let size = IntSize::square(256);
        let a = TileId::new(1, 2, size, 0.0625);
        let b = TileId::new(1, 2, size, 0.062_500_01);
        let c = TileId::new(1, 2, size, 0.125);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<TileId> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn tile_id_rects() {
        let id = TileId::new(2, 1, IntSize::new(64, 32), 2.0);
        assert_eq!(id.origin(), (128, 32));
        assert_eq!(id.rect(), RectF::new(128.0, 32.0, 192.0, 64.0));
        assert_eq!(id.document_rect(), RectF::new(64.0, 16.0, 96.0, 32.0));
    }

    #[test]
    fn far_cells_saturate_instead_of_overflowing() {
        let id = TileId::new(i32::MAX / 2, -(i32::MAX / 2), IntSize::square(256), 1.0);
        assert_eq!(id.origin(), (i32::MAX, i32::MIN));
        assert!(id.rect().left > 1.0e11);
    }

    #[test]
    fn invalidate_keeps_bitmap() {
        let mut tile = Tile::placeholder(TileId::new(0, 0, IntSize::square(64), 1.0));
        let content = bitmap();
        tile.set_bitmap(Arc::clone(&content));
        tile.invalidate();

        assert!(tile.is_stale());
        assert!(Arc::ptr_eq(tile.bitmap().expect("bitmap kept"), &content));
    }

    #[test]
    fn invalidate_placeholder_is_noop() {
        let mut tile = Tile::placeholder(TileId::new(0, 0, IntSize::square(64), 1.0));
        tile.invalidate();
        assert_eq!(tile.state(), TileState::Placeholder);
    }

    #[test]
    fn set_bitmap_resets_failures() {
        let mut tile = Tile::placeholder(TileId::new(0, 0, IntSize::square(64), 1.0));
        assert_eq!(tile.record_failure(), 1);
        assert_eq!(tile.record_failure(), 2);

        tile.set_bitmap(bitmap());
        assert_eq!(tile.failures(), 0);
        assert_eq!(tile.state(), TileState::Valid);
    }
}
