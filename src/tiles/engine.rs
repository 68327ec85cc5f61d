//! Document engine capability
//!
//! The engine is opaque, single-threaded and not reentrant. It lives on the
//! render worker and is only reached through [`DocumentEngine`].

use std::fmt;

use image::Rgba;

use super::geometry::{FloatSize, IntSize};
use super::request::RenderFault;
use super::tile::TileBitmap;

/// Command forwarded to the engine (e.g. an editing action)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineCommand {
    pub name: String,
    pub arguments: String,
}

impl EngineCommand {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arguments.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{} {}", self.name, self.arguments)
        }
    }
}

/// Narrow interface to the document renderer
pub trait DocumentEngine {
    /// Render the tile whose top-left corner is `(x, y)` in pixels at `zoom`.
    ///
    /// Every error is transient; the tile is retried on a later pass.
    fn render_tile(
        &mut self,
        x: i32,
        y: i32,
        size: IntSize,
        zoom: f32,
    ) -> Result<TileBitmap, RenderFault>;

    /// Dispatch a command. Resulting invalidations arrive separately.
    fn post_command(&mut self, command: &EngineCommand) -> Result<(), RenderFault>;

    /// Size of the current part at zoom 1.0
    fn document_size(&self) -> FloatSize;

    fn part_count(&self) -> usize {
        1
    }

    fn set_part(&mut self, part: usize) -> Result<(), RenderFault> {
        if part == 0 {
            Ok(())
        } else {
            Err(RenderFault::UnknownPart {
                part,
                count: self.part_count(),
            })
        }
    }
}

/// Deterministic renderer painting a checkerboard in document space.
///
/// Each document cell's shade depends on the part and on how many
/// `"bump"` commands were posted, so tiles that line up on screen line up in
/// content and refreshed tiles visibly differ.
#[derive(Debug)]
pub struct SyntheticEngine {
    page: FloatSize,
    parts: usize,
    part: usize,
    cell: f32,
    revision: u32,
}

impl SyntheticEngine {
    /// Engine whose document cells are 32 units wide
    #[must_use]
    pub fn new(page: FloatSize, parts: usize) -> Self {
        Self {
            page,
            parts: parts.max(1),
            part: 0,
            cell: 32.0,
            revision: 0,
        }
    }

    #[must_use]
    pub fn revision(&self) -> u32 {
        self.revision
    }

    fn shade(&self, doc_x: f32, doc_y: f32) -> Rgba<u8> {
        if doc_x < 0.0 || doc_y < 0.0 || doc_x >= self.page.width || doc_y >= self.page.height {
            return Rgba([0, 0, 0, 0]);
        }

        let cx = (doc_x / self.cell) as u32;
        let cy = (doc_y / self.cell) as u32;
        let base = if (cx + cy) % 2 == 0 { 230u8 } else { 200u8 };
        let tint = ((self.part as u32 * 40 + self.revision * 25) % 256) as u8;
        Rgba([base, base.wrapping_sub(tint / 2), base.wrapping_sub(tint), 255])
    }
}

impl DocumentEngine for SyntheticEngine {
    fn render_tile(
        &mut self,
        x: i32,
        y: i32,
        size: IntSize,
        zoom: f32,
    ) -> Result<TileBitmap, RenderFault> {
        if !zoom.is_finite() || zoom <= 0.0 || size.is_empty() {
            return Err(RenderFault::Unavailable { x, y, zoom });
        }

        let mut bitmap = TileBitmap::new(size.width, size.height);
        for (px, py, pixel) in bitmap.enumerate_pixels_mut() {
            let doc_x = (x as f32 + px as f32) / zoom;
            let doc_y = (y as f32 + py as f32) / zoom;
            *pixel = self.shade(doc_x, doc_y);
        }
        Ok(bitmap)
    }

    fn post_command(&mut self, command: &EngineCommand) -> Result<(), RenderFault> {
        match command.name.as_str() {
            "bump" => {
                self.revision = self.revision.wrapping_add(1);
                Ok(())
            }
            other => Err(RenderFault::engine(format!("unsupported command {other}"))),
        }
    }

    fn document_size(&self) -> FloatSize {
        self.page
    }

    fn part_count(&self) -> usize {
        self.parts
    }

    fn set_part(&mut self, part: usize) -> Result<(), RenderFault> {
        if part >= self.parts {
            return Err(RenderFault::UnknownPart {
                part,
                count: self.parts,
            });
        }
        self.part = part;
        Ok(())
    }
}
