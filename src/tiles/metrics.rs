//! Immutable viewport snapshots
//!
//! A [`ViewportMetrics`] value is replaced, never mutated, on every pan,
//! zoom or resize. Every `with_*` method returns a new snapshot.

use std::fmt;

use super::geometry::{FloatSize, RectF, fuzzy_eq};

/// Pan/zoom/page-bounds snapshot describing what is currently visible
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportMetrics {
    /// Page rectangle in document space (zoom 1.0)
    css_page_rect: RectF,
    /// Visible rectangle in zoomed device pixels
    viewport: RectF,
    zoom: f32,
}

impl ViewportMetrics {
    /// Snapshot at zoom 1.0 with the viewport at the page origin
    #[must_use]
    pub fn new(page_size: FloatSize, viewport_size: FloatSize) -> Self {
        Self {
            css_page_rect: RectF::from_origin_size(0.0, 0.0, page_size),
            viewport: RectF::from_origin_size(0.0, 0.0, viewport_size),
            zoom: 1.0,
        }
    }

    /// Snapshot from raw parts; `viewport` is in pixels at `zoom`
    #[must_use]
    pub fn from_parts(css_page_rect: RectF, viewport: RectF, zoom: f32) -> Self {
        Self {
            css_page_rect,
            viewport,
            zoom,
        }
    }

    #[must_use]
    pub fn viewport(&self) -> RectF {
        self.viewport
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    #[must_use]
    pub fn css_page_rect(&self) -> RectF {
        self.css_page_rect
    }

    /// Page rectangle in pixels at the live zoom
    #[must_use]
    pub fn page_rect(&self) -> RectF {
        self.css_page_rect.scale(self.zoom)
    }

    /// Page rectangle in pixels at an arbitrary zoom
    #[must_use]
    pub fn page_rect_at(&self, zoom: f32) -> RectF {
        self.css_page_rect.scale(zoom)
    }

    /// Whether anything at all can be visible
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.viewport.is_empty() || !self.zoom.is_finite() || self.zoom <= 0.0
    }

    #[must_use]
    pub fn with_origin(&self, x: f32, y: f32) -> Self {
        Self {
            viewport: RectF::from_origin_size(x, y, self.viewport.size()),
            ..*self
        }
    }

    #[must_use]
    pub fn with_size(&self, size: FloatSize) -> Self {
        Self {
            viewport: RectF::from_origin_size(self.viewport.left, self.viewport.top, size),
            ..*self
        }
    }

    #[must_use]
    pub fn offset_by(&self, dx: f32, dy: f32) -> Self {
        Self {
            viewport: self.viewport.offset(dx, dy),
            ..*self
        }
    }

    /// Replace the zoom factor, keeping the viewport origin in pixels
    #[must_use]
    pub fn with_zoom(&self, zoom: f32) -> Self {
        Self { zoom, ..*self }
    }

    /// Zoom around a focus point given in viewport-relative pixels.
    ///
    /// The document point under the focus stays under the focus.
    #[must_use]
    pub fn scale_to(&self, zoom: f32, focus_x: f32, focus_y: f32) -> Self {
        if !self.zoom.is_finite() || self.zoom <= 0.0 {
            return self.with_zoom(zoom);
        }

        let factor = zoom / self.zoom;
        let x = (self.viewport.left + focus_x) * factor - focus_x;
        let y = (self.viewport.top + focus_y) * factor - focus_y;
        Self {
            viewport: RectF::from_origin_size(x, y, self.viewport.size()),
            zoom,
            ..*self
        }
    }

    /// Replace the document page size (zoom 1.0)
    #[must_use]
    pub fn with_page_size(&self, page_size: FloatSize) -> Self {
        Self {
            css_page_rect: RectF::from_origin_size(
                self.css_page_rect.left,
                self.css_page_rect.top,
                page_size,
            ),
            ..*self
        }
    }

    /// Pull the viewport back inside the page where possible.
    ///
    /// A viewport larger than the page along an axis is pinned to the page's
    /// leading edge on that axis.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let page = self.page_rect();
        let size = self.viewport.size();

        let clamp_axis = |pos: f32, extent: f32, min: f32, max: f32| {
            if extent >= max - min {
                min
            } else {
                pos.clamp(min, max - extent)
            }
        };

        let x = clamp_axis(self.viewport.left, size.width, page.left, page.right);
        let y = clamp_axis(self.viewport.top, size.height, page.top, page.bottom);
        self.with_origin(x, y)
    }

    #[must_use]
    pub fn fuzzy_eq(&self, other: &Self) -> bool {
        self.viewport.fuzzy_eq(&other.viewport)
            && self.css_page_rect.fuzzy_eq(&other.css_page_rect)
            && fuzzy_eq(self.zoom, other.zoom)
    }
}

impl Default for ViewportMetrics {
    fn default() -> Self {
        Self::new(FloatSize::default(), FloatSize::default())
    }
}

impl fmt::Display for ViewportMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "viewport={} page={} z={}",
            self.viewport, self.css_page_rect, self.zoom
        )
    }
}

/// The rectangle and resolution a layer last decided to cover
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayPort {
    pub position: RectF,
    pub resolution: f32,
}

impl DisplayPort {
    #[must_use]
    pub const fn new(position: RectF, resolution: f32) -> Self {
        Self {
            position,
            resolution,
        }
    }

    #[must_use]
    pub fn contains(&self, rect: &RectF) -> bool {
        self.position.contains(rect)
    }

    #[must_use]
    pub fn fuzzy_eq(&self, other: &Self) -> bool {
        self.position.fuzzy_eq(&other.position) && fuzzy_eq(self.resolution, other.resolution)
    }
}

impl fmt::Display for DisplayPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayPort v={} z={}", self.position, self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> ViewportMetrics {
        ViewportMetrics::new(FloatSize::new(1000.0, 2000.0), FloatSize::new(100.0, 100.0))
    }

    #[test]
    fn page_rect_follows_zoom() {
        let m = metrics().with_zoom(2.0);
        assert_eq!(m.page_rect(), RectF::new(0.0, 0.0, 2000.0, 4000.0));
        assert_eq!(m.css_page_rect(), RectF::new(0.0, 0.0, 1000.0, 2000.0));
    }

    #[test]
    fn with_methods_return_new_snapshots() {
        let original = metrics();
        let panned = original.offset_by(10.0, 20.0);

        assert_eq!(original.viewport(), RectF::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(panned.viewport(), RectF::new(10.0, 20.0, 110.0, 120.0));
    }

    #[test]
    fn scale_to_keeps_focus_point() {
        let m = metrics().with_origin(100.0, 100.0);
        let zoomed = m.scale_to(2.0, 50.0, 50.0);

        // Document point (150, 150) was under the focus at zoom 1
        assert!(zoomed.viewport().fuzzy_eq(&RectF::new(250.0, 250.0, 350.0, 350.0)));
        assert!(fuzzy_eq(zoomed.zoom(), 2.0));
    }

    #[test]
    fn clamped_keeps_viewport_inside_page() {
        let m = metrics().with_origin(-50.0, 1950.0).clamped();
        assert_eq!(m.viewport(), RectF::new(0.0, 1900.0, 100.0, 2000.0));

        let wide = ViewportMetrics::new(FloatSize::new(50.0, 50.0), FloatSize::new(100.0, 100.0))
            .with_origin(30.0, 30.0)
            .clamped();
        assert_eq!(wide.viewport().left, 0.0);
        assert_eq!(wide.viewport().top, 0.0);
    }

    #[test]
    fn degenerate_metrics() {
        assert!(ViewportMetrics::default().is_degenerate());
        assert!(metrics().with_zoom(0.0).is_degenerate());
        assert!(metrics().with_zoom(f32::NAN).is_degenerate());
        assert!(!metrics().is_degenerate());
    }

    #[test]
    fn display_port_fuzzy_eq() {
        let a = DisplayPort::new(RectF::new(0.0, 0.0, 256.0, 512.0), 1.0);
        let b = DisplayPort::new(RectF::new(0.000_01, 0.0, 256.0, 512.0), 1.000_01);
        let c = DisplayPort::new(RectF::new(0.0, 0.0, 256.0, 512.0), 2.0);

        assert!(a.fuzzy_eq(&b));
        assert!(!a.fuzzy_eq(&c));
    }
}
