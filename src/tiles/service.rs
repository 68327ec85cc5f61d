//! Render service - UI-facing handle to the render worker

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::compositor::TileCompositor;
use super::engine::{DocumentEngine, EngineCommand};
use super::frame::CompositeFrame;
use super::geometry::RectF;
use super::layer::LayerKind;
use super::metrics::ViewportMetrics;
use super::request::{RenderFault, RenderRequest, RenderResponse, RequestId};
use super::state::{Command, Effect, ViewState};
use super::worker::render_worker;
use crate::settings::Settings;

/// Handle for pushing engine-originated invalidations onto the worker queue
#[derive(Clone, Debug)]
pub struct Invalidator {
    tx: Sender<RenderRequest>,
}

impl Invalidator {
    /// Queue a document-space rectangle for refetch. Returns `false` once the
    /// worker is gone.
    pub fn invalidate(&self, rect: RectF) -> bool {
        self.tx.send(RenderRequest::Invalidate(rect)).is_ok()
    }
}

/// Spawns the render worker and talks to it without ever blocking on the engine
pub struct RenderService {
    state: ViewState,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    next_request_id: u64,
    latest: Arc<CompositeFrame>,
    worker: Option<JoinHandle<()>>,
}

impl RenderService {
    /// Start a worker thread and build the engine on it.
    ///
    /// `factory` receives an [`Invalidator`] so the engine can report changed
    /// regions on its own. The page size comes from the engine.
    pub fn spawn<E, F>(settings: Arc<Settings>, metrics: ViewportMetrics, factory: F) -> io::Result<Self>
    where
        E: DocumentEngine + 'static,
        F: FnOnce(Invalidator) -> E + Send + 'static,
    {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let invalidator = Invalidator {
            tx: request_tx.clone(),
        };
        let worker = std::thread::Builder::new()
            .name("tile-render".into())
            .spawn(move || {
                let engine = factory(invalidator);
                let initial = metrics.with_page_size(engine.document_size());
                let compositor = TileCompositor::new(engine, settings, initial);
                render_worker(compositor, request_rx, response_tx);
            })?;

        let state = ViewState::new(metrics);
        let latest = Arc::new(CompositeFrame::empty(Arc::clone(state.metrics())));
        let service = Self {
            state,
            request_tx,
            response_rx,
            next_request_id: 1,
            latest,
            worker: Some(worker),
        };
        service.send(RenderRequest::Viewport(Arc::clone(service.state.metrics())));
        Ok(service)
    }

    /// Current view as last set from the UI
    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<ViewportMetrics> {
        self.state.metrics()
    }

    /// Apply a view command and forward its effects to the worker
    pub fn apply_command(&mut self, cmd: Command) {
        let effects = self.state.apply(cmd);
        self.execute_effects(effects);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PublishViewport => {
                    self.send(RenderRequest::Viewport(Arc::clone(self.state.metrics())));
                }

                Effect::ResizePage { width, height } => {
                    self.send(RenderRequest::ResizePage { width, height });
                }

                Effect::SwitchPart(part) => {
                    let id = self.next_id();
                    self.send(RenderRequest::SetPart { id, part });
                }
            }
        }
    }

    pub fn on_viewport_changed(&mut self, metrics: ViewportMetrics) {
        self.apply_command(Command::SetViewport(metrics));
    }

    pub fn on_zoom_changed(&mut self, zoom: f32, focus_x: f32, focus_y: f32) {
        self.apply_command(Command::SetZoom {
            zoom,
            focus_x,
            focus_y,
        });
    }

    pub fn on_pan(&mut self, dx: f32, dy: f32) {
        self.apply_command(Command::Pan { dx, dy });
    }

    /// The drawing surface changed size
    pub fn on_viewport_resized(&mut self, width: f32, height: f32) {
        self.apply_command(Command::ResizeViewport { width, height });
    }

    /// The document page changed size
    pub fn on_resize(&mut self, page_width: f32, page_height: f32) {
        self.apply_command(Command::ResizePage {
            width: page_width,
            height: page_height,
        });
    }

    pub fn set_part(&mut self, part: usize) {
        self.apply_command(Command::SetPart(part));
    }

    /// Queue a document-space rectangle for refetch
    pub fn invalidate_region(&self, rect: RectF) {
        self.send(RenderRequest::Invalidate(rect));
    }

    /// Forward a command to the engine; failures come back as
    /// [`RenderResponse::Error`] carrying the returned id
    pub fn post_command(&mut self, command: EngineCommand) -> RequestId {
        let id = self.next_id();
        self.send(RenderRequest::Command { id, command });
        id
    }

    pub fn request_reevaluation(&self, kind: LayerKind) {
        self.send(RenderRequest::ReevaluateLayer(kind));
    }

    pub fn trim_memory(&self) {
        self.send(RenderRequest::TrimMemory);
    }

    pub fn refresh(&self) {
        self.send(RenderRequest::Refresh);
    }

    #[must_use]
    pub fn invalidator(&self) -> Invalidator {
        Invalidator {
            tx: self.request_tx.clone(),
        }
    }

    /// Most recent composite received from the worker
    #[must_use]
    pub fn composite(&self) -> Arc<CompositeFrame> {
        Arc::clone(&self.latest)
    }

    /// Drain pending responses, keeping the newest frame
    pub fn poll_responses(&mut self) -> Vec<RenderResponse> {
        let mut responses = vec![];

        while let Ok(response) = self.response_rx.try_recv() {
            self.observe(&response);
            responses.push(response);
        }

        responses
    }

    /// Block until the worker has handled everything posted so far.
    ///
    /// Returns every response received while waiting.
    pub fn wait_idle(&mut self, timeout: Duration) -> Result<Vec<RenderResponse>, RenderFault> {
        let id = self.next_id();
        self.request_tx
            .send(RenderRequest::Flush(id))
            .map_err(|_| RenderFault::Disconnected)?;

        let deadline = Instant::now() + timeout;
        let mut responses = vec![];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(RenderResponse::Flushed(flushed)) if flushed == id => return Ok(responses),
                Ok(response) => {
                    self.observe(&response);
                    responses.push(response);
                }
                Err(RecvTimeoutError::Timeout) => return Err(RenderFault::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(RenderFault::Disconnected),
            }
        }
    }

    /// Stop the worker and wait for it to finish its current request
    pub fn shutdown(&mut self) {
        let _ = self.request_tx.send(RenderRequest::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Render worker panicked");
            }
        }
    }

    fn observe(&mut self, response: &RenderResponse) {
        match response {
            RenderResponse::Frame(frame) if frame.sequence >= self.latest.sequence => {
                self.state
                    .adopt_page_size(frame.metrics.css_page_rect().size());
                self.latest = Arc::clone(frame);
            }
            RenderResponse::PartChanged { part, .. } => {
                let effects = self.state.adopt_part(*part);
                self.execute_effects(effects);
            }
            RenderResponse::TileFailing { id, attempts } => {
                debug!("Worker reports {id} failing after {attempts} attempts");
            }
            _ => {}
        }
    }

    fn send(&self, request: RenderRequest) {
        let _ = self.request_tx.send(request);
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
