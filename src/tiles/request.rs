//! Messages exchanged with the render worker

use std::sync::Arc;
use std::time::Duration;

use super::engine::EngineCommand;
use super::frame::CompositeFrame;
use super::geometry::RectF;
use super::layer::LayerKind;
use super::metrics::ViewportMetrics;
use super::tile::TileId;

/// Unique identifier for worker requests that expect an answer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Request sent to the render worker. Handled strictly in arrival order.
#[derive(Debug)]
pub enum RenderRequest {
    /// New viewport snapshot
    Viewport(Arc<ViewportMetrics>),

    /// Run reconciliation for one layer even if its display port is unchanged
    ReevaluateLayer(LayerKind),

    /// Document page size changed (zoom 1.0 units)
    ResizePage { width: f32, height: f32 },

    /// Document-space rectangle whose pixels changed
    Invalidate(RectF),

    /// Forward a command to the engine
    Command { id: RequestId, command: EngineCommand },

    /// Switch to another document part
    SetPart { id: RequestId, part: usize },

    /// Drop cached tiles under memory pressure
    TrimMemory,

    /// Re-fetch every held tile
    Refresh,

    /// Barrier answered with [`RenderResponse::Flushed`]
    Flush(RequestId),

    /// Stop the worker
    Shutdown,
}

/// Errors from the document engine or from rejected requests
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderFault {
    #[error("tile at ({x}, {y}) zoom {zoom} unavailable")]
    Unavailable { x: i32, y: i32, zoom: f32 },

    #[error("editing disabled, rejected command {command}")]
    ReadOnly { command: String },

    #[error("part {part} out of range (document has {count})")]
    UnknownPart { part: usize, count: usize },

    #[error("{detail}")]
    Engine { detail: String },

    #[error("render worker did not answer within {0:?}")]
    Timeout(Duration),

    #[error("render worker is gone")]
    Disconnected,
}

impl RenderFault {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine { detail: msg.into() }
    }
}

/// Response from the render worker
#[derive(Debug)]
pub enum RenderResponse {
    /// New composite after a forced render
    Frame(Arc<CompositeFrame>),

    /// A tile kept failing; emitted once per failure streak
    TileFailing { id: TileId, attempts: u32 },

    /// The engine now shows another part
    PartChanged { id: RequestId, part: usize },

    /// A request could not be carried out
    Error { id: RequestId, error: RenderFault },

    /// Every request posted before the matching flush is done
    Flushed(RequestId),
}

/// Destination for worker responses
pub trait ResponseSink {
    fn send(&mut self, response: RenderResponse);
}

impl ResponseSink for flume::Sender<RenderResponse> {
    fn send(&mut self, response: RenderResponse) {
        // The UI side may already be gone during shutdown.
        let _ = flume::Sender::send(self, response);
    }
}

impl ResponseSink for Vec<RenderResponse> {
    fn send(&mut self, response: RenderResponse) {
        self.push(response);
    }
}
