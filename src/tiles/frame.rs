//! Composite snapshots handed to the UI thread
//!
//! A frame is immutable and shares tile bitmaps with the worker through
//! `Arc`, so publishing one never copies pixels.

use std::fmt;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::Rgba;

use super::geometry::RectF;
use super::metrics::ViewportMetrics;
use super::tile::{TileBitmap, TileId};

const BORDER_VALID: Rgba<u8> = Rgba([220, 40, 40, 255]);
const BORDER_STALE: Rgba<u8> = Rgba([240, 200, 0, 255]);

/// Counters maintained by the worker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Reconciliation passes actually run
    pub reconciliations: u64,
    /// Viewport events that changed no layer
    pub short_circuits: u64,
    /// Engine tile renders attempted
    pub tiles_requested: u64,
    pub tiles_filled: u64,
    pub fetch_failures: u64,
    /// Tiles dropped by sweeps and resets
    pub tiles_released: u64,
    /// Tiles re-fetched because of invalidation
    pub tiles_refreshed: u64,
}

/// One filled tile as seen by the compositor
#[derive(Clone)]
pub struct FrameTile {
    pub id: TileId,
    pub bitmap: Arc<TileBitmap>,
    pub stale: bool,
    pub priority: i32,
}

impl fmt::Debug for FrameTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTile")
            .field("id", &self.id)
            .field("stale", &self.stale)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Anything tiles can be drawn onto
pub trait DrawTarget {
    /// `dest` is in viewport-relative pixels at the live zoom
    fn draw_tile(&mut self, dest: RectF, bitmap: &TileBitmap, stale: bool);
}

/// Immutable composite of every filled tile at one point in time
#[derive(Clone, Debug)]
pub struct CompositeFrame {
    pub sequence: u64,
    pub metrics: Arc<ViewportMetrics>,
    /// Sorted by priority ascending (backdrop first), then row-major
    pub tiles: Vec<FrameTile>,
    pub stats: RenderStats,
    pub debug_borders: bool,
}

impl CompositeFrame {
    /// Frame with nothing to show
    #[must_use]
    pub fn empty(metrics: Arc<ViewportMetrics>) -> Self {
        Self {
            sequence: 0,
            metrics,
            tiles: Vec::new(),
            stats: RenderStats::default(),
            debug_borders: false,
        }
    }

    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn stale_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.stale).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[must_use]
    pub fn find(&self, id: &TileId) -> Option<&FrameTile> {
        self.tiles.iter().find(|t| t.id == *id)
    }

    /// Where a tile lands in viewport-relative pixels
    #[must_use]
    pub fn destination(&self, id: &TileId) -> RectF {
        let live = self.metrics.zoom();
        if id.zoom <= 0.0 || !id.zoom.is_finite() || live <= 0.0 || !live.is_finite() {
            return RectF::EMPTY;
        }

        let viewport = self.metrics.viewport();
        id.rect()
            .scale(live / id.zoom)
            .offset(-viewport.left, -viewport.top)
    }

    /// Draw every visible tile, backdrop first
    pub fn draw<T: DrawTarget>(&self, target: &mut T) {
        let visible = RectF::from_origin_size(0.0, 0.0, self.metrics.viewport().size());
        if visible.is_empty() {
            return;
        }

        for tile in &self.tiles {
            let dest = self.destination(&tile.id);
            if dest.intersects(&visible) {
                target.draw_tile(dest, &tile.bitmap, tile.stale);
            }
        }
    }

    /// Flatten the frame into a viewport-sized bitmap
    #[must_use]
    pub fn rasterize(&self) -> TileBitmap {
        let size = self.metrics.viewport().size();
        if self.metrics.viewport().is_empty() {
            return TileBitmap::new(0, 0);
        }

        let mut target = ImageTarget {
            image: TileBitmap::new(size.width.ceil() as u32, size.height.ceil() as u32),
            borders: self.debug_borders,
        };
        self.draw(&mut target);
        target.image
    }
}

struct ImageTarget {
    image: TileBitmap,
    borders: bool,
}

impl DrawTarget for ImageTarget {
    fn draw_tile(&mut self, dest: RectF, bitmap: &TileBitmap, stale: bool) {
        let x = dest.left.round() as i64;
        let y = dest.top.round() as i64;
        let width = (dest.right.round() as i64).saturating_sub(x).max(1);
        let height = (dest.bottom.round() as i64).saturating_sub(y).max(1);
        let (bitmap_w, bitmap_h) = bitmap.dimensions();
        let (image_w, image_h) = self.image.dimensions();

        // Only the source pixels that land inside the image are scaled, so a
        // magnified backdrop tile costs no more than the viewport.
        let (Some(cols), Some(rows)) = (
            clip_axis(x, width, bitmap_w, image_w),
            clip_axis(y, height, bitmap_h, image_h),
        ) else {
            return;
        };

        let unscaled = cols.src_len == cols.dst_len && rows.src_len == rows.dst_len;
        if unscaled && cols.src_len == bitmap_w && rows.src_len == bitmap_h {
            imageops::overlay(&mut self.image, bitmap, cols.dst_start, rows.dst_start);
        } else {
            let visible =
                imageops::crop_imm(bitmap, cols.src_start, rows.src_start, cols.src_len, rows.src_len)
                    .to_image();
            if unscaled {
                imageops::overlay(&mut self.image, &visible, cols.dst_start, rows.dst_start);
            } else {
                let scaled =
                    imageops::resize(&visible, cols.dst_len, rows.dst_len, FilterType::Nearest);
                imageops::overlay(&mut self.image, &scaled, cols.dst_start, rows.dst_start);
            }
        }

        if self.borders {
            let color = if stale { BORDER_STALE } else { BORDER_VALID };
            outline(&mut self.image, x, y, width, height, color);
        }
    }
}

/// Visible part of a tile along one axis
struct Span {
    src_start: u32,
    src_len: u32,
    dst_start: i64,
    dst_len: u32,
}

/// Clip a tile drawn at `pos..pos + len` to `0..limit` and find the source
/// pixels covering what is left, plus where those pixels land.
fn clip_axis(pos: i64, len: i64, src_len: u32, limit: u32) -> Option<Span> {
    let start = pos.max(0);
    let end = pos.saturating_add(len).min(i64::from(limit));
    if start >= end || src_len == 0 {
        return None;
    }

    let src = i64::from(src_len);
    let src_start = (start - pos).saturating_mul(src) / len;
    let src_end = ((end - pos).saturating_mul(src) + len - 1) / len;
    let src_end = src_end.clamp(src_start + 1, src);

    let dst_start = pos + src_start.saturating_mul(len) / src;
    let dst_end = pos + src_end.saturating_mul(len) / src;

    Some(Span {
        src_start: u32::try_from(src_start).ok()?,
        src_len: u32::try_from(src_end - src_start).ok()?,
        dst_start,
        dst_len: u32::try_from((dst_end - dst_start).max(1)).ok()?,
    })
}

fn outline(image: &mut TileBitmap, x: i64, y: i64, width: i64, height: i64, color: Rgba<u8>) {
    let (img_w, img_h) = (i64::from(image.width()), i64::from(image.height()));
    let mut put = |px: i64, py: i64| {
        if px >= 0 && py >= 0 && px < img_w && py < img_h {
            image.put_pixel(px as u32, py as u32, color);
        }
    };

    let right = x.saturating_add(width - 1);
    let bottom = y.saturating_add(height - 1);
    for px in x.max(0)..=right.min(img_w - 1) {
        put(px, y);
        put(px, bottom);
    }
    for py in y.max(0)..=bottom.min(img_h - 1) {
        put(x, py);
        put(right, py);
    }
}
