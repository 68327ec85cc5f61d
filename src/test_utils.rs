//! Engine doubles shared by unit and integration tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use image::Rgba;

use crate::tiles::{
    DocumentEngine, EngineCommand, FloatSize, IntSize, Invalidator, RectF, RenderFault, TileBitmap,
};

/// One `render_tile` call: pixel origin, tile width and zoom
pub type RenderCall = (i32, i32, u32, f32);

#[derive(Debug, Default)]
struct Script {
    page: FloatSize,
    parts: usize,
    part: usize,
    failing: HashSet<(i32, i32)>,
    fail_next: usize,
    calls: Vec<RenderCall>,
    commands: Vec<EngineCommand>,
    generation: u32,
    delay: Option<Duration>,
    invalidate_on_command: Option<(Invalidator, RectF)>,
}

/// Engine that records every call and fails on demand.
///
/// Clones share state, so a test can keep one clone while the render worker
/// owns another.
#[derive(Clone, Debug)]
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    #[must_use]
    pub fn new(page: FloatSize) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                page,
                parts: 1,
                ..Script::default()
            })),
        }
    }

    #[must_use]
    pub fn with_parts(self, parts: usize) -> Self {
        self.lock().parts = parts.max(1);
        self
    }

    /// Sleep this long inside every `render_tile`
    #[must_use]
    pub fn with_render_delay(self, delay: Duration) -> Self {
        self.lock().delay = Some(delay);
        self
    }

    /// After every accepted command, report `rect` as changed
    pub fn invalidate_on_command(&self, invalidator: Invalidator, rect: RectF) {
        self.lock().invalidate_on_command = Some((invalidator, rect));
    }

    /// Fail every render whose pixel origin is `(x, y)`, at any zoom
    pub fn fail_tile(&mut self, x: i32, y: i32) {
        self.lock().failing.insert((x, y));
    }

    /// Fail the next `count` renders wherever they land
    pub fn fail_next(&mut self, count: usize) {
        self.lock().fail_next = count;
    }

    pub fn heal_tile(&mut self, x: i32, y: i32) {
        self.lock().failing.remove(&(x, y));
    }

    pub fn set_page(&self, page: FloatSize) {
        self.lock().page = page;
    }

    pub fn clear_calls(&mut self) {
        self.lock().calls.clear();
    }

    #[must_use]
    pub fn render_calls(&self) -> Vec<RenderCall> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn commands(&self) -> Vec<EngineCommand> {
        self.lock().commands.clone()
    }

    #[must_use]
    pub fn part(&self) -> usize {
        self.lock().part
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentEngine for ScriptedEngine {
    fn render_tile(
        &mut self,
        x: i32,
        y: i32,
        size: IntSize,
        zoom: f32,
    ) -> Result<TileBitmap, RenderFault> {
        let delay = {
            let mut script = self.lock();
            script.calls.push((x, y, size.width, zoom));
            script.delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut script = self.lock();
        if script.fail_next > 0 {
            script.fail_next -= 1;
            return Err(RenderFault::Unavailable { x, y, zoom });
        }
        if script.failing.contains(&(x, y)) {
            return Err(RenderFault::Unavailable { x, y, zoom });
        }

        // Every fetch gets its own colour so refetched bitmaps differ
        script.generation = script.generation.wrapping_add(1);
        let [r, g, b, _] = script.generation.to_le_bytes();
        Ok(TileBitmap::from_pixel(
            size.width,
            size.height,
            Rgba([r, g, b, 255]),
        ))
    }

    fn post_command(&mut self, command: &EngineCommand) -> Result<(), RenderFault> {
        let hook = {
            let mut script = self.lock();
            script.commands.push(command.clone());
            script.invalidate_on_command.clone()
        };
        if let Some((invalidator, rect)) = hook {
            invalidator.invalidate(rect);
        }
        Ok(())
    }

    fn document_size(&self) -> FloatSize {
        self.lock().page
    }

    fn part_count(&self) -> usize {
        self.lock().parts
    }

    fn set_part(&mut self, part: usize) -> Result<(), RenderFault> {
        let mut script = self.lock();
        if part >= script.parts {
            return Err(RenderFault::UnknownPart {
                part,
                count: script.parts,
            });
        }
        script.part = part;
        Ok(())
    }
}
