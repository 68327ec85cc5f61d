//! Render worker - owns the engine and every tile, runs in its own thread

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, info, warn};

use super::compositor::TileCompositor;
use super::engine::DocumentEngine;
use super::geometry::FloatSize;
use super::metrics::ViewportMetrics;
use super::request::{RenderRequest, RenderResponse};

/// Main worker function - runs in a dedicated thread.
///
/// Requests are handled one at a time in arrival order, so a reconciliation
/// always sees the fully applied result of the previous one.
pub fn render_worker<E: DocumentEngine>(
    mut compositor: TileCompositor<E>,
    requests: Receiver<RenderRequest>,
    mut responses: Sender<RenderResponse>,
) {
    info!("Render worker started");

    for request in requests {
        match request {
            RenderRequest::Viewport(metrics) => {
                // Page bounds are owned here; the UI only moves and zooms.
                let metrics = Arc::new(ViewportMetrics::from_parts(
                    compositor.metrics().css_page_rect(),
                    metrics.viewport(),
                    metrics.zoom(),
                ));
                compositor.viewport_changed(metrics, &mut responses);
            }

            RenderRequest::ReevaluateLayer(kind) => {
                compositor.tile_reevaluation_request(kind, &mut responses);
            }

            RenderRequest::ResizePage { width, height } => {
                debug!("Page resized to {width}x{height}");
                compositor.page_resized(FloatSize::new(width, height), &mut responses);
            }

            RenderRequest::Invalidate(rect) => {
                compositor.tile_invalidation(rect, &mut responses);
            }

            RenderRequest::Command { id, command } => {
                if let Err(error) = compositor.post_command(&command) {
                    warn!("Command {command} failed: {error}");
                    let _ = responses.send(RenderResponse::Error { id, error });
                }
            }

            RenderRequest::SetPart { id, part } => {
                match compositor.set_part(part, &mut responses) {
                    Ok(()) => {
                        let _ = responses.send(RenderResponse::PartChanged { id, part });
                    }
                    Err(error) => {
                        warn!("Switching to part {part} failed: {error}");
                        let _ = responses.send(RenderResponse::Error { id, error });
                    }
                }
            }

            RenderRequest::TrimMemory => compositor.trim_memory(&mut responses),

            RenderRequest::Refresh => compositor.refresh(&mut responses),

            RenderRequest::Flush(id) => {
                let _ = responses.send(RenderResponse::Flushed(id));
            }

            RenderRequest::Shutdown => break,
        }
    }

    let stats = compositor.stats();
    info!(
        "Render worker stopped: reconciliations={} requested={} failed={}",
        stats.reconciliations, stats.tiles_requested, stats.fetch_failures
    );
}
