//! Composed tile layers
//!
//! A layer holds the tiles covering an inflated viewport at one zoom. Which
//! rectangle, which zoom and how urgent the fetches are is decided by its
//! [`LayerPolicy`]; the reconciliation bookkeeping is shared.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::geometry::{IntSize, RectF, fuzzy_eq, inflate, normalize_rect, round_to_tile_size};
use super::metrics::{DisplayPort, ViewportMetrics};
use super::tile::{Tile, TileBitmap, TileId};

/// Default zoom of the low-resolution backdrop layer
pub const BACKDROP_ZOOM: f32 = 1.0 / 16.0;

/// Which layer a request is addressed to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Live-zoom layer the user interacts with
    Dynamic,
    /// Fixed low-zoom backdrop shown while live tiles stream in
    FixedZoom,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic => f.write_str("dynamic"),
            Self::FixedZoom => f.write_str("fixed-zoom"),
        }
    }
}

/// Strategy deciding what a layer covers.
///
/// Inflation margins are counted in tiles per axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayerPolicy {
    Dynamic { inflate: IntSize },
    FixedZoom { zoom: f32, inflate: IntSize },
}

impl LayerPolicy {
    #[must_use]
    pub const fn dynamic() -> Self {
        Self::Dynamic {
            inflate: IntSize::new(2, 4),
        }
    }

    #[must_use]
    pub const fn fixed_zoom() -> Self {
        Self::FixedZoom {
            zoom: BACKDROP_ZOOM,
            inflate: IntSize::new(1, 6),
        }
    }

    #[must_use]
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Dynamic { .. } => LayerKind::Dynamic,
            Self::FixedZoom { .. } => LayerKind::FixedZoom,
        }
    }

    /// Rectangle of zoomed pixel space that must be tile-covered
    #[must_use]
    pub fn viewport(&self, metrics: &ViewportMetrics, tile_size: IntSize) -> RectF {
        match *self {
            Self::Dynamic { inflate: margin } => inflate(
                round_to_tile_size(metrics.viewport(), tile_size),
                tile_size.tiles(margin.width, margin.height),
            ),
            Self::FixedZoom {
                inflate: margin, ..
            } => {
                let rect = normalize_rect(metrics.viewport(), metrics.zoom(), self.zoom(metrics));
                inflate(
                    round_to_tile_size(rect, tile_size),
                    tile_size.tiles(margin.width, margin.height),
                )
            }
        }
    }

    /// Zoom at which tiles are rendered
    #[must_use]
    pub fn zoom(&self, metrics: &ViewportMetrics) -> f32 {
        match *self {
            Self::Dynamic { .. } => metrics.zoom(),
            Self::FixedZoom { zoom, .. } => zoom,
        }
    }

    /// Fetch priority; higher is served first
    #[must_use]
    pub fn priority(&self) -> i32 {
        match self {
            Self::Dynamic { .. } => 0,
            Self::FixedZoom { .. } => -1,
        }
    }
}

/// Set of tiles covering one policy's display port
pub struct ComposedTileLayer {
    policy: LayerPolicy,
    tile_size: IntSize,
    tiles: HashMap<TileId, Tile>,
    display_port: Option<DisplayPort>,
    /// Page bounds at the display port's zoom
    page_rect: RectF,
}

impl ComposedTileLayer {
    #[must_use]
    pub fn new(policy: LayerPolicy, tile_size: IntSize) -> Self {
        Self {
            policy,
            tile_size,
            tiles: HashMap::new(),
            display_port: None,
            page_rect: RectF::EMPTY,
        }
    }

    #[must_use]
    pub fn kind(&self) -> LayerKind {
        self.policy.kind()
    }

    #[must_use]
    pub fn policy(&self) -> &LayerPolicy {
        &self.policy
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.policy.priority()
    }

    #[must_use]
    pub fn tile_size(&self) -> IntSize {
        self.tile_size
    }

    #[must_use]
    pub fn display_port(&self) -> Option<&DisplayPort> {
        self.display_port.as_ref()
    }

    /// Zoom of the current display port (0 before the first evaluation)
    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.display_port.map_or(0.0, |port| port.resolution)
    }

    #[must_use]
    pub fn tile(&self, id: &TileId) -> Option<&Tile> {
        self.tiles.get(id)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Swap the policy; the next evaluation never short-circuits
    pub fn set_policy(&mut self, policy: LayerPolicy) {
        self.policy = policy;
        self.force_reevaluation();
    }

    /// Recompute the display port for `metrics`.
    ///
    /// Returns `false` when the new rectangle and zoom are fuzzy-equal to the
    /// previous pair, in which case nothing changes.
    pub fn reevaluate(&mut self, metrics: &ViewportMetrics) -> bool {
        let zoom = self.policy.zoom(metrics);
        let rect = if metrics.is_degenerate() || !zoom.is_finite() || zoom <= 0.0 {
            RectF::EMPTY
        } else {
            self.policy.viewport(metrics, self.tile_size)
        };
        let candidate = DisplayPort::new(rect, zoom);

        if self
            .display_port
            .is_some_and(|current| current.fuzzy_eq(&candidate))
        {
            return false;
        }

        self.display_port = Some(candidate);
        self.page_rect = metrics.page_rect_at(zoom);
        true
    }

    /// Forget the last display port so the next evaluation always proceeds
    pub fn force_reevaluation(&mut self) {
        self.display_port = None;
    }

    /// Grid cells the current display port requires, row-major
    #[must_use]
    pub fn required_cells(&self) -> Vec<TileId> {
        let Some(port) = self.display_port else {
            return Vec::new();
        };
        let zoom = port.resolution;
        let rect = port.position;
        if rect.is_empty() || !zoom.is_finite() || zoom <= 0.0 || self.tile_size.is_empty() {
            return Vec::new();
        }

        // Cells whose origin falls outside the page are never needed, so the
        // scan stays bounded however far the viewport strays.
        let page = self.page_rect;
        if page.is_empty() || !page.is_finite() {
            return Vec::new();
        }
        let w = self.tile_size.width as f32;
        let h = self.tile_size.height as f32;
        let first_col = (rect.left.max(page.left) / w).floor() as i32;
        let first_row = (rect.top.max(page.top) / h).floor() as i32;
        let last_col = (rect.right.min(page.right) / w).ceil() as i32;
        let last_row = (rect.bottom.min(page.bottom) / h).ceil() as i32;

        let mut cells = Vec::new();
        for row in first_row..last_row {
            for col in first_col..last_col {
                let id = TileId::new(col, row, self.tile_size, zoom);
                let (x, y) = id.origin();
                if !self.page_rect.contains_point(x as f32, y as f32) {
                    continue;
                }
                if id.rect().intersects(&rect) {
                    cells.push(id);
                }
            }
        }
        cells
    }

    /// Create placeholders for missing cells and return the fetch batch.
    ///
    /// The batch holds every required tile without current content: new
    /// cells, placeholders left unfilled by a failed fetch, and stale tiles
    /// whose refetch failed.
    pub fn add_new_tiles(&mut self) -> Vec<TileId> {
        let mut batch = Vec::new();
        for id in self.required_cells() {
            let tile = self
                .tiles
                .entry(id)
                .or_insert_with(|| Tile::placeholder(id));
            if !tile.is_filled() || tile.is_stale() {
                batch.push(id);
            }
        }
        batch
    }

    /// Attach fetched content. Returns `false` if the tile is gone.
    pub fn attach(&mut self, id: &TileId, bitmap: Arc<TileBitmap>) -> bool {
        match self.tiles.get_mut(id) {
            Some(tile) => {
                tile.set_bitmap(bitmap);
                true
            }
            None => false,
        }
    }

    /// Count a failed fetch; the tile keeps whatever it showed before
    pub fn record_failure(&mut self, id: &TileId) -> u32 {
        self.tiles.get_mut(id).map_or(0, Tile::record_failure)
    }

    /// Mark the tiles that survive the sweep
    pub fn mark_tiles(&mut self) {
        let zoom = self.zoom();
        let required: HashSet<TileId> = self.required_cells().into_iter().collect();
        for (id, tile) in &mut self.tiles {
            tile.marked = fuzzy_eq(id.zoom, zoom) && required.contains(id);
        }
    }

    /// Drop every unmarked tile, releasing its bitmap
    pub fn clear_marked_tiles(&mut self) -> usize {
        let before = self.tiles.len();
        self.tiles.retain(|_, tile| tile.marked);
        before - self.tiles.len()
    }

    /// Flag tiles overlapping a document-space rectangle stale.
    ///
    /// Returns the ids to re-fetch, unfilled placeholders included.
    pub fn invalidate_tiles(&mut self, document_rect: &RectF) -> Vec<TileId> {
        if document_rect.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<TileId> = self
            .tiles
            .iter_mut()
            .filter(|(id, _)| document_rect.scale(id.zoom).intersects(&id.rect()))
            .map(|(id, tile)| {
                tile.invalidate();
                *id
            })
            .collect();
        hits.sort_by_key(|id| (id.row, id.col));
        hits
    }

    /// Flag every filled tile stale and return all ids
    pub fn invalidate_all(&mut self) -> Vec<TileId> {
        let mut ids: Vec<TileId> = self
            .tiles
            .iter_mut()
            .map(|(id, tile)| {
                tile.invalidate();
                *id
            })
            .collect();
        ids.sort_by_key(|id| (id.row, id.col));
        ids
    }

    /// Drop all tiles and forget the display port
    pub fn clear_and_reset(&mut self) -> usize {
        let dropped = self.tiles.len();
        self.tiles.clear();
        self.display_port = None;
        dropped
    }
}

impl fmt::Debug for ComposedTileLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedTileLayer")
            .field("kind", &self.kind())
            .field("tile_size", &self.tile_size)
            .field("tiles", &self.tiles.len())
            .field("display_port", &self.display_port)
            .finish_non_exhaustive()
    }
}
