//! Worker-side tile state: reconciliation and invalidation over all layers
//!
//! Everything here runs on the render worker. Engine calls block that thread
//! and only that thread, so at most one tile render is ever in flight.

use std::cmp::Reverse;
use std::sync::Arc;

use log::{debug, error, info, trace, warn};

use super::engine::{DocumentEngine, EngineCommand};
use super::frame::{CompositeFrame, FrameTile, RenderStats};
use super::geometry::{FloatSize, RectF};
use super::layer::{ComposedTileLayer, LayerKind};
use super::metrics::ViewportMetrics;
use super::request::{RenderFault, RenderResponse, ResponseSink};
use super::tile::TileId;
use crate::settings::Settings;

/// Owns the engine and every tile layer
pub struct TileCompositor<E> {
    engine: E,
    settings: Arc<Settings>,
    /// Highest priority first
    layers: Vec<ComposedTileLayer>,
    metrics: Arc<ViewportMetrics>,
    stats: RenderStats,
    sequence: u64,
}

impl<E: DocumentEngine> TileCompositor<E> {
    /// Build the layers described by `settings`. Nothing is fetched until the
    /// first viewport event.
    #[must_use]
    pub fn new(engine: E, settings: Arc<Settings>, metrics: ViewportMetrics) -> Self {
        let tile_size = settings.tile_size();
        let mut layers: Vec<ComposedTileLayer> = settings
            .layer_policies()
            .into_iter()
            .map(|policy| ComposedTileLayer::new(policy, tile_size))
            .collect();
        layers.sort_by_key(|layer| Reverse(layer.priority()));

        Self {
            engine,
            settings,
            layers,
            metrics: Arc::new(metrics),
            stats: RenderStats::default(),
            sequence: 0,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn layers(&self) -> &[ComposedTileLayer] {
        &self.layers
    }

    #[must_use]
    pub fn layer(&self, kind: LayerKind) -> Option<&ComposedTileLayer> {
        self.layers.iter().find(|layer| layer.kind() == kind)
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<ViewportMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Entry point for every viewport-affecting event
    pub fn viewport_changed(&mut self, metrics: Arc<ViewportMetrics>, sink: &mut impl ResponseSink) {
        if !metrics
            .css_page_rect()
            .fuzzy_eq(&self.metrics.css_page_rect())
        {
            for layer in &mut self.layers {
                layer.force_reevaluation();
            }
        }
        self.metrics = metrics;

        let mut changed = false;
        for index in 0..self.layers.len() {
            if self.layers[index].reevaluate(&self.metrics) {
                changed = true;
                self.reconcile(index, sink);
            }
        }

        if changed {
            self.publish(sink);
        } else {
            self.stats.short_circuits += 1;
            trace!("Viewport unchanged for every layer: {}", self.metrics);
        }
    }

    /// Reconcile one layer unconditionally, retrying unfilled tiles
    pub fn tile_reevaluation_request(&mut self, kind: LayerKind, sink: &mut impl ResponseSink) {
        let Some(index) = self.layers.iter().position(|layer| layer.kind() == kind) else {
            debug!("No {kind} layer configured, ignoring reevaluation");
            return;
        };

        if self.layers[index].display_port().is_none() {
            self.layers[index].reevaluate(&self.metrics);
        }
        self.reconcile(index, sink);
        self.publish(sink);
    }

    /// Mark tiles overlapping a document-space rectangle stale and refetch them
    pub fn tile_invalidation(&mut self, rect: RectF, sink: &mut impl ResponseSink) {
        if rect.is_empty() {
            debug!("Ignoring empty invalidation {rect}");
            return;
        }

        let mut refreshed = 0usize;
        for index in 0..self.layers.len() {
            let ids = self.layers[index].invalidate_tiles(&rect);
            refreshed += ids.len();
            for id in ids {
                self.stats.tiles_refreshed += 1;
                self.fetch(index, id, sink);
            }
        }

        debug!("Invalidation {rect} refetched {refreshed} tiles");
        self.publish(sink);
    }

    /// New document size; every layer recomputes from scratch
    pub fn page_resized(&mut self, page_size: FloatSize, sink: &mut impl ResponseSink) {
        for layer in &mut self.layers {
            layer.force_reevaluation();
        }
        let metrics = Arc::new(self.metrics.with_page_size(page_size));
        self.viewport_changed(metrics, sink);
    }

    /// Forward a command to the engine if editing is allowed
    pub fn post_command(&mut self, command: &EngineCommand) -> Result<(), RenderFault> {
        if !self.settings.editing_enabled() {
            warn!("Editing disabled, dropping command {command}");
            return Err(RenderFault::ReadOnly {
                command: command.name.clone(),
            });
        }

        debug!("Posting command {command}");
        self.engine.post_command(command)
    }

    /// Switch the engine to another part and rebuild from the top
    pub fn set_part(&mut self, part: usize, sink: &mut impl ResponseSink) -> Result<(), RenderFault> {
        self.engine.set_part(part)?;
        info!("Switched to part {part}");

        for layer in &mut self.layers {
            self.stats.tiles_released += layer.clear_and_reset() as u64;
        }

        let metrics = self
            .metrics
            .with_page_size(self.engine.document_size())
            .with_origin(0.0, 0.0);
        self.viewport_changed(Arc::new(metrics), sink);
        Ok(())
    }

    /// Drop every tile; only the highest-priority layer is rebuilt right away
    pub fn trim_memory(&mut self, sink: &mut impl ResponseSink) {
        let mut released = 0usize;
        for layer in &mut self.layers {
            released += layer.clear_and_reset();
        }
        self.stats.tiles_released += released as u64;
        info!("Memory trim released {released} tiles");

        if !self.layers.is_empty() {
            self.layers[0].reevaluate(&self.metrics);
            self.reconcile(0, sink);
        }
        self.publish(sink);
    }

    /// Refetch every held tile, showing the old content meanwhile
    pub fn refresh(&mut self, sink: &mut impl ResponseSink) {
        for index in 0..self.layers.len() {
            for id in self.layers[index].invalidate_all() {
                self.stats.tiles_refreshed += 1;
                self.fetch(index, id, sink);
            }
        }
        self.publish(sink);
    }

    /// Snapshot of every filled tile
    #[must_use]
    pub fn frame(&self) -> CompositeFrame {
        let mut tiles: Vec<FrameTile> = self
            .layers
            .iter()
            .flat_map(|layer| {
                let priority = layer.priority();
                layer.tiles().filter_map(move |tile| {
                    tile.bitmap().map(|bitmap| FrameTile {
                        id: *tile.id(),
                        bitmap: Arc::clone(bitmap),
                        stale: tile.is_stale(),
                        priority,
                    })
                })
            })
            .collect();
        tiles.sort_by_key(|t| (t.priority, t.id.row, t.id.col));

        CompositeFrame {
            sequence: self.sequence,
            metrics: Arc::clone(&self.metrics),
            tiles,
            stats: self.stats,
            debug_borders: self.settings.developer_mode,
        }
    }

    fn reconcile(&mut self, index: usize, sink: &mut impl ResponseSink) {
        self.stats.reconciliations += 1;
        let batch = self.layers[index].add_new_tiles();

        // No cancellation: a tile that falls out of the display port while
        // the batch runs is still rendered, then dropped by the sweep below.
        let mut filled = 0usize;
        for id in &batch {
            if self.fetch(index, *id, sink) {
                filled += 1;
            }
        }

        let layer = &mut self.layers[index];
        layer.mark_tiles();
        let released = layer.clear_marked_tiles();
        self.stats.tiles_released += released as u64;

        debug!(
            "Reconciled {} layer: requested={} filled={} released={} held={}",
            layer.kind(),
            batch.len(),
            filled,
            released,
            layer.len()
        );
    }

    fn fetch(&mut self, index: usize, id: TileId, sink: &mut impl ResponseSink) -> bool {
        let (x, y) = id.origin();
        self.stats.tiles_requested += 1;
        trace!("Fetching {id}");

        match self.engine.render_tile(x, y, id.size, id.zoom) {
            Ok(bitmap) => {
                if self.layers[index].attach(&id, Arc::new(bitmap)) {
                    self.stats.tiles_filled += 1;
                }
                true
            }
            Err(fault) => {
                self.stats.fetch_failures += 1;
                let attempts = self.layers[index].record_failure(&id);
                warn!("Fetching {id} failed (attempt {attempts}): {fault}");

                let threshold = self.settings.max_fetch_failures;
                if threshold > 0 && attempts == threshold {
                    error!("{id} failed {attempts} times in a row");
                    sink.send(RenderResponse::TileFailing { id, attempts });
                }
                false
            }
        }
    }

    /// One frame per handled event keeps the response queue bounded by the
    /// request queue.
    fn publish(&mut self, sink: &mut impl ResponseSink) {
        self.sequence += 1;
        sink.send(RenderResponse::Frame(Arc::new(self.frame())));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::test_utils::ScriptedEngine;
    use crate::tiles::geometry::IntSize;
    use crate::tiles::layer::LayerPolicy;
    use crate::tiles::tile::TileState;

    fn settings(backdrop: bool) -> Arc<Settings> {
        Arc::new(Settings {
            tile_size: 64,
            backdrop_layer: backdrop,
            ..Settings::default()
        })
    }

    fn metrics(viewport: RectF) -> Arc<ViewportMetrics> {
        Arc::new(ViewportMetrics::from_parts(
            RectF::new(0.0, 0.0, 4096.0, 4096.0),
            viewport,
            1.0,
        ))
    }

    fn compositor(backdrop: bool) -> TileCompositor<ScriptedEngine> {
        TileCompositor::new(
            ScriptedEngine::new(FloatSize::new(4096.0, 4096.0)),
            settings(backdrop),
            ViewportMetrics::default(),
        )
    }

    fn held(compositor: &TileCompositor<ScriptedEngine>, kind: LayerKind) -> HashSet<(i32, i32)> {
        compositor
            .layer(kind)
            .map(|layer| layer.tiles().map(|t| (t.id().col, t.id().row)).collect())
            .unwrap_or_default()
    }

    fn required(compositor: &TileCompositor<ScriptedEngine>, kind: LayerKind) -> HashSet<(i32, i32)> {
        compositor
            .layer(kind)
            .map(|layer| {
                layer
                    .required_cells()
                    .iter()
                    .map(|id| (id.col, id.row))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn layers_are_ordered_by_priority() {
        let compositor = compositor(true);
        let kinds: Vec<_> = compositor.layers().iter().map(ComposedTileLayer::kind).collect();
        assert_eq!(kinds, vec![LayerKind::Dynamic, LayerKind::FixedZoom]);
    }

    #[test]
    fn first_viewport_fills_every_required_tile() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);

        let expected = required(&compositor, LayerKind::Dynamic);
        assert_eq!(held(&compositor, LayerKind::Dynamic), expected);
        assert_eq!(compositor.engine().render_calls().len(), expected.len());
        assert!(
            compositor
                .layer(LayerKind::Dynamic)
                .is_some_and(|l| l.tiles().all(|t| t.state() == TileState::Valid))
        );
        assert!(matches!(sink.last(), Some(RenderResponse::Frame(_))));
    }

    #[test]
    fn repeated_viewport_is_idempotent() {
        let mut compositor = compositor(true);
        let mut sink = Vec::new();
        let m = metrics(RectF::new(0.0, 0.0, 100.0, 100.0));
        compositor.viewport_changed(Arc::clone(&m), &mut sink);

        let calls = compositor.engine().render_calls().len();
        let before = held(&compositor, LayerKind::Dynamic);
        sink.clear();

        let jittered = Arc::new(m.offset_by(0.000_01, -0.000_01));
        compositor.viewport_changed(m, &mut sink);
        compositor.viewport_changed(jittered, &mut sink);

        assert_eq!(compositor.engine().render_calls().len(), calls);
        assert_eq!(held(&compositor, LayerKind::Dynamic), before);
        assert_eq!(compositor.stats().short_circuits, 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn sub_tile_pan_requests_nothing_and_far_pan_replaces_set() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);
        let calls = compositor.engine().render_calls().len();
        let first = held(&compositor, LayerKind::Dynamic);

        compositor.viewport_changed(metrics(RectF::new(10.0, 0.0, 110.0, 100.0)), &mut sink);
        assert_eq!(compositor.engine().render_calls().len(), calls);

        compositor.viewport_changed(metrics(RectF::new(2000.0, 0.0, 2100.0, 100.0)), &mut sink);
        let moved = held(&compositor, LayerKind::Dynamic);
        assert!(first.is_disjoint(&moved));
        assert_eq!(moved, required(&compositor, LayerKind::Dynamic));
    }

    #[test]
    fn partial_pan_only_fetches_new_cells() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);
        let first = held(&compositor, LayerKind::Dynamic);
        let calls = compositor.engine().render_calls().len();

        compositor.viewport_changed(metrics(RectF::new(200.0, 0.0, 300.0, 100.0)), &mut sink);
        let second = held(&compositor, LayerKind::Dynamic);
        let new_cells = second.difference(&first).count();

        assert_eq!(compositor.engine().render_calls().len(), calls + new_cells);
        assert_eq!(second, required(&compositor, LayerKind::Dynamic));
    }

    #[test]
    fn failed_fetch_is_retried_on_reevaluation() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        compositor.engine_mut().fail_tile(0, 0);
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);

        let origin = TileId::new(0, 0, IntSize::square(64), 1.0);
        let layer = compositor.layer(LayerKind::Dynamic).expect("dynamic layer");
        assert!(!layer.tile(&origin).expect("placeholder kept").is_filled());
        assert_eq!(compositor.stats().fetch_failures, 1);

        compositor.engine_mut().heal_tile(0, 0);
        compositor.tile_reevaluation_request(LayerKind::Dynamic, &mut sink);
        let layer = compositor.layer(LayerKind::Dynamic).expect("dynamic layer");
        assert!(layer.tile(&origin).expect("tile").is_filled());
    }

    #[test]
    fn failure_streak_is_reported_once() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        compositor.engine_mut().fail_tile(0, 0);
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);
        for _ in 0..4 {
            compositor.tile_reevaluation_request(LayerKind::Dynamic, &mut sink);
        }

        let reports: Vec<_> = sink
            .iter()
            .filter_map(|r| match r {
                RenderResponse::TileFailing { id, attempts } => Some((*id, *attempts)),
                _ => None,
            })
            .collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0.origin(), (0, 0));
        assert_eq!(reports[0].1, 3);
    }

    #[test]
    fn invalidation_refetches_exactly_one_tile() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);
        compositor.engine_mut().clear_calls();

        compositor.tile_invalidation(RectF::new(5.0, 5.0, 10.0, 10.0), &mut sink);

        assert_eq!(compositor.engine().render_calls(), &[(0, 0, 64, 1.0)]);
        let layer = compositor.layer(LayerKind::Dynamic).expect("dynamic layer");
        assert!(layer.tiles().all(|t| t.state() == TileState::Valid));
        assert_eq!(compositor.stats().tiles_refreshed, 1);
    }

    #[test]
    fn stale_tile_keeps_bitmap_when_refetch_fails() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);

        let origin = TileId::new(0, 0, IntSize::square(64), 1.0);
        let before = compositor
            .layer(LayerKind::Dynamic)
            .and_then(|l| l.tile(&origin))
            .and_then(|t| t.bitmap().cloned())
            .expect("filled");

        compositor.engine_mut().fail_tile(0, 0);
        compositor.tile_invalidation(RectF::new(5.0, 5.0, 10.0, 10.0), &mut sink);

        let tile = compositor
            .layer(LayerKind::Dynamic)
            .and_then(|l| l.tile(&origin))
            .expect("tile held");
        assert!(tile.is_stale());
        assert!(Arc::ptr_eq(tile.bitmap().expect("bitmap kept"), &before));

        let Some(RenderResponse::Frame(frame)) = sink.last() else {
            panic!("expected a frame");
        };
        assert!(frame.find(&origin).is_some_and(|t| t.stale));

        compositor.engine_mut().heal_tile(0, 0);
        compositor.tile_invalidation(RectF::new(5.0, 5.0, 10.0, 10.0), &mut sink);
        let tile = compositor
            .layer(LayerKind::Dynamic)
            .and_then(|l| l.tile(&origin))
            .expect("tile held");
        assert!(!tile.is_stale());
        assert!(!Arc::ptr_eq(tile.bitmap().expect("bitmap"), &before));
    }

    #[test]
    fn failed_stale_refetch_is_retried_by_reconciliation() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);

        compositor.engine_mut().fail_tile(0, 0);
        compositor.tile_invalidation(RectF::new(5.0, 5.0, 10.0, 10.0), &mut sink);
        compositor.engine_mut().heal_tile(0, 0);
        compositor.engine_mut().clear_calls();

        compositor.tile_reevaluation_request(LayerKind::Dynamic, &mut sink);

        let origin = TileId::new(0, 0, IntSize::square(64), 1.0);
        let tile = compositor
            .layer(LayerKind::Dynamic)
            .and_then(|l| l.tile(&origin))
            .expect("tile held");
        assert_eq!(tile.state(), TileState::Valid);
        assert_eq!(compositor.engine().render_calls(), &[(0, 0, 64, 1.0)]);
    }

    #[test]
    fn far_off_page_viewport_fetches_nothing() {
        let mut compositor = compositor(true);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);
        compositor.engine_mut().clear_calls();

        compositor.viewport_changed(
            metrics(RectF::new(3.0e9, 0.0, 3.0e9 + 2000.0, 100.0)),
            &mut sink,
        );
        assert!(compositor.engine().render_calls().is_empty());
        assert!(held(&compositor, LayerKind::Dynamic).is_empty());

        compositor.viewport_changed(
            metrics(RectF::new(-3.0e9, -3.0e9, -2.9e9, -2.9e9)),
            &mut sink,
        );
        assert!(compositor.engine().render_calls().is_empty());
    }

    #[test]
    fn huge_viewport_only_covers_page() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        let huge = Arc::new(ViewportMetrics::from_parts(
            RectF::new(0.0, 0.0, 256.0, 256.0),
            RectF::new(0.0, 0.0, 1.0e9, 1.0e9),
            1.0,
        ));
        compositor.viewport_changed(huge, &mut sink);

        assert_eq!(held(&compositor, LayerKind::Dynamic).len(), 16);
        assert_eq!(compositor.engine().render_calls().len(), 16);
    }

    #[test]
    fn one_frame_per_handled_event() {
        fn frames(sink: &[RenderResponse]) -> usize {
            sink.iter()
                .filter(|r| matches!(r, RenderResponse::Frame(_)))
                .count()
        }

        let mut compositor = compositor(true);
        let mut sink = Vec::new();

        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 400.0, 800.0)), &mut sink);
        assert!(compositor.stats().tiles_filled > 10);
        assert_eq!(frames(&sink), 1);

        sink.clear();
        compositor.tile_invalidation(RectF::new(0.0, 0.0, 300.0, 300.0), &mut sink);
        assert_eq!(frames(&sink), 1);

        sink.clear();
        compositor.tile_reevaluation_request(LayerKind::FixedZoom, &mut sink);
        assert_eq!(frames(&sink), 1);
    }

    #[test]
    fn invalidation_reaches_backdrop_layer() {
        let mut compositor = compositor(true);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);
        compositor.engine_mut().clear_calls();

        compositor.tile_invalidation(RectF::new(5.0, 5.0, 10.0, 10.0), &mut sink);
        let zooms: Vec<f32> = compositor
            .engine()
            .render_calls()
            .iter()
            .map(|call| call.3)
            .collect();
        assert_eq!(zooms, vec![1.0, 1.0 / 16.0]);
    }

    #[test]
    fn page_resize_forces_reevaluation() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);
        let reconciliations = compositor.stats().reconciliations;

        compositor.page_resized(FloatSize::new(100.0, 100.0), &mut sink);
        assert_eq!(compositor.stats().reconciliations, reconciliations + 1);
        assert_eq!(
            held(&compositor, LayerKind::Dynamic),
            [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().collect()
        );
    }

    #[test]
    fn commands_require_editing_mode() {
        let mut compositor = compositor(false);
        let command = EngineCommand::new(".uno:Bold", "");
        assert!(matches!(
            compositor.post_command(&command),
            Err(RenderFault::ReadOnly { .. })
        ));

        let mut editable = TileCompositor::new(
            ScriptedEngine::new(FloatSize::new(100.0, 100.0)),
            Arc::new(Settings {
                experimental_mode: true,
                ..Settings::default()
            }),
            ViewportMetrics::default(),
        );
        assert!(editable.post_command(&command).is_ok());
        assert_eq!(editable.engine().commands(), &[command]);
    }

    #[test]
    fn set_part_resets_layers_and_rebuilds() {
        let mut compositor = TileCompositor::new(
            ScriptedEngine::new(FloatSize::new(4096.0, 4096.0)).with_parts(3),
            settings(false),
            ViewportMetrics::default(),
        );
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(500.0, 500.0, 600.0, 600.0)), &mut sink);

        compositor.set_part(2, &mut sink).expect("valid part");
        assert_eq!(compositor.engine().part(), 2);
        assert_eq!(compositor.metrics().viewport().left, 0.0);
        assert_eq!(
            held(&compositor, LayerKind::Dynamic),
            required(&compositor, LayerKind::Dynamic)
        );

        assert!(compositor.set_part(7, &mut sink).is_err());
    }

    #[test]
    fn trim_memory_rebuilds_only_visible_layer() {
        let mut compositor = compositor(true);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);

        compositor.trim_memory(&mut sink);
        assert!(!held(&compositor, LayerKind::Dynamic).is_empty());
        assert!(held(&compositor, LayerKind::FixedZoom).is_empty());

        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);
        assert!(!held(&compositor, LayerKind::FixedZoom).is_empty());
    }

    #[test]
    fn refresh_refetches_everything() {
        let mut compositor = compositor(false);
        let mut sink = Vec::new();
        compositor.viewport_changed(metrics(RectF::new(0.0, 0.0, 100.0, 100.0)), &mut sink);
        let held_count = held(&compositor, LayerKind::Dynamic).len();
        compositor.engine_mut().clear_calls();

        compositor.refresh(&mut sink);
        assert_eq!(compositor.engine().render_calls().len(), held_count);
    }

    #[test]
    fn backdrop_layer_can_be_disabled() {
        let compositor = compositor(false);
        assert!(compositor.layer(LayerKind::FixedZoom).is_none());
        assert_eq!(compositor.layers().len(), 1);
        assert_eq!(
            compositor.layers()[0].policy(),
            &LayerPolicy::Dynamic {
                inflate: IntSize::new(2, 4)
            }
        );
    }
}
