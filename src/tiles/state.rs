//! UI-side view state management

use std::sync::Arc;

use super::geometry::{FloatSize, fuzzy_eq};
use super::metrics::ViewportMetrics;

/// Smallest zoom the UI may request
pub const MIN_ZOOM: f32 = 0.1;
/// Largest zoom the UI may request
pub const MAX_ZOOM: f32 = 16.0;

/// Current view as the UI thread sees it
#[derive(Clone, Debug)]
pub struct ViewState {
    metrics: Arc<ViewportMetrics>,
    part: usize,
}

impl ViewState {
    #[must_use]
    pub fn new(metrics: ViewportMetrics) -> Self {
        Self {
            metrics: Arc::new(metrics),
            part: 0,
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<ViewportMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn part(&self) -> usize {
        self.part
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::SetViewport(metrics) => self.replace(metrics),

            Command::SetZoom {
                zoom,
                focus_x,
                focus_y,
            } => {
                let zoom = clamp_zoom(zoom);
                let next = self.metrics.scale_to(zoom, focus_x, focus_y);
                self.replace(next)
            }

            Command::Pan { dx, dy } => {
                if fuzzy_eq(dx, 0.0) && fuzzy_eq(dy, 0.0) {
                    vec![]
                } else {
                    let next = self.metrics.offset_by(dx, dy);
                    self.replace(next)
                }
            }

            Command::ResizeViewport { width, height } => {
                let next = self.metrics.with_size(FloatSize::new(width, height));
                self.replace(next)
            }

            Command::ResizePage { width, height } => {
                let size = FloatSize::new(width, height);
                if self.metrics.css_page_rect().size().fuzzy_eq(size) {
                    vec![]
                } else {
                    self.metrics = Arc::new(self.metrics.with_page_size(size));
                    vec![Effect::ResizePage { width, height }]
                }
            }

            // The part is only committed once the worker confirms the switch
            Command::SetPart(part) => {
                if self.part == part {
                    vec![]
                } else {
                    vec![Effect::SwitchPart(part)]
                }
            }
        }
    }

    /// Commit a part switch the worker carried out and restart at its origin
    #[must_use]
    pub fn adopt_part(&mut self, part: usize) -> Vec<Effect> {
        if self.part == part {
            return vec![];
        }
        self.part = part;
        let next = self.metrics.with_origin(0.0, 0.0);
        self.replace(next)
    }

    /// Take over the page size reported by the worker
    pub fn adopt_page_size(&mut self, size: FloatSize) {
        if !self.metrics.css_page_rect().size().fuzzy_eq(size) {
            self.metrics = Arc::new(self.metrics.with_page_size(size));
        }
    }

    fn replace(&mut self, next: ViewportMetrics) -> Vec<Effect> {
        if self.metrics.fuzzy_eq(&next) {
            vec![]
        } else {
            self.metrics = Arc::new(next);
            vec![Effect::PublishViewport]
        }
    }
}

/// Clamp zoom to the supported range, handling NaN/Inf
#[must_use]
pub fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

/// Commands that modify the view
#[derive(Clone, Debug)]
pub enum Command {
    /// Replace the whole snapshot
    SetViewport(ViewportMetrics),
    /// Zoom around a viewport-relative focus point
    SetZoom {
        zoom: f32,
        focus_x: f32,
        focus_y: f32,
    },
    /// Pan by a pixel delta
    Pan { dx: f32, dy: f32 },
    /// The drawing surface changed size
    ResizeViewport { width: f32, height: f32 },
    /// The document page changed size (zoom 1.0 units)
    ResizePage { width: f32, height: f32 },
    /// Show another document part
    SetPart(usize),
}

/// Effects produced by view changes
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Send the current snapshot to the worker
    PublishViewport,
    /// Tell the worker the page size changed
    ResizePage { width: f32, height: f32 },
    /// Tell the worker to switch parts
    SwitchPart(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::geometry::RectF;

    fn test_state() -> ViewState {
        ViewState::new(ViewportMetrics::new(
            FloatSize::new(1000.0, 1000.0),
            FloatSize::new(100.0, 100.0),
        ))
    }

    #[test]
    fn pan_publishes_viewport() {
        let mut state = test_state();
        let effects = state.apply(Command::Pan { dx: 10.0, dy: 0.0 });

        assert_eq!(effects, vec![Effect::PublishViewport]);
        assert_eq!(state.metrics().viewport(), RectF::new(10.0, 0.0, 110.0, 100.0));
    }

    #[test]
    fn zero_pan_returns_empty() {
        let mut state = test_state();
        assert!(state.apply(Command::Pan { dx: 0.0, dy: 0.000_01 }).is_empty());
    }

    #[test]
    fn jittered_viewport_returns_empty() {
        let mut state = test_state();
        let jittered = state.metrics().offset_by(0.000_01, 0.0).with_zoom(1.000_01);
        assert!(state.apply(Command::SetViewport(jittered)).is_empty());
    }

    #[test]
    fn zoom_is_clamped() {
        let mut state = test_state();
        let effects = state.apply(Command::SetZoom {
            zoom: 100.0,
            focus_x: 0.0,
            focus_y: 0.0,
        });

        assert_eq!(effects, vec![Effect::PublishViewport]);
        assert_eq!(state.metrics().zoom(), MAX_ZOOM);
        assert_eq!(clamp_zoom(f32::NAN), 1.0);
        assert_eq!(clamp_zoom(0.0), MIN_ZOOM);
    }

    #[test]
    fn same_zoom_returns_empty() {
        let mut state = test_state();
        let effects = state.apply(Command::SetZoom {
            zoom: 1.0,
            focus_x: 50.0,
            focus_y: 50.0,
        });
        assert!(effects.is_empty());
    }

    #[test]
    fn page_resize_only_when_changed() {
        let mut state = test_state();
        assert!(
            state
                .apply(Command::ResizePage {
                    width: 1000.0,
                    height: 1000.0
                })
                .is_empty()
        );

        let effects = state.apply(Command::ResizePage {
            width: 500.0,
            height: 800.0,
        });
        assert_eq!(
            effects,
            vec![Effect::ResizePage {
                width: 500.0,
                height: 800.0
            }]
        );
    }

    #[test]
    fn set_part_waits_for_confirmation() {
        let mut state = test_state();
        let _ = state.apply(Command::Pan { dx: 300.0, dy: 300.0 });

        let effects = state.apply(Command::SetPart(2));
        assert_eq!(effects, vec![Effect::SwitchPart(2)]);
        assert_eq!(state.part(), 0);
        assert_eq!(state.metrics().viewport().left, 300.0);
    }

    #[test]
    fn adopted_part_resets_origin() {
        let mut state = test_state();
        let _ = state.apply(Command::Pan { dx: 300.0, dy: 300.0 });
        let _ = state.apply(Command::SetPart(2));

        assert_eq!(state.adopt_part(2), vec![Effect::PublishViewport]);
        assert_eq!(state.part(), 2);
        assert_eq!(state.metrics().viewport().left, 0.0);
        assert!(state.adopt_part(2).is_empty());
        assert!(state.apply(Command::SetPart(2)).is_empty());
    }
}
