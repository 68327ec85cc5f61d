//! Tiled rendering infrastructure
//!
//! The UI thread owns a [`ViewState`] and talks to the render worker through
//! [`RenderService`]. The worker owns the [`DocumentEngine`] and every
//! [`ComposedTileLayer`], and publishes immutable [`CompositeFrame`]s back.

mod compositor;
mod engine;
mod frame;
mod geometry;
mod layer;
mod metrics;
mod request;
mod service;
mod state;
mod tile;
mod worker;

pub use compositor::TileCompositor;
pub use engine::{DocumentEngine, EngineCommand, SyntheticEngine};
pub use frame::{CompositeFrame, DrawTarget, FrameTile, RenderStats};
pub use geometry::{
    FUZZY_EPSILON, FloatSize, IntSize, RectF, fuzzy_eq, inflate, normalize_rect,
    round_to_tile_size,
};
pub use layer::{BACKDROP_ZOOM, ComposedTileLayer, LayerKind, LayerPolicy};
pub use metrics::{DisplayPort, ViewportMetrics};
pub use request::{RenderFault, RenderRequest, RenderResponse, RequestId, ResponseSink};
pub use service::{Invalidator, RenderService};
pub use state::{Command, Effect, MAX_ZOOM, MIN_ZOOM, ViewState, clamp_zoom};
pub use tile::{Tile, TileBitmap, TileId, TileState};
pub use worker::render_worker;
