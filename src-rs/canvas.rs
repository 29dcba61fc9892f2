//! Working canvas for the regenerating 3x3 challenge.
//!
//! The dynamic variant replaces selected tiles with fresh imagery after each
//! click pass. The engine keeps one in-memory scratch raster per challenge,
//! pastes replacement tiles into their grid regions, and re-runs detection on
//! the composite. There is no filesystem side channel: the canvas lives and
//! dies with its challenge instance.

use std::collections::BTreeSet;

use image::RgbImage;

use crate::error::CanvasError;

/// Per-tile image source identifiers, ordered by tile index. Change identity
/// is identifier equality, never pixel comparison.
pub type ImageUrlSet = Vec<String>;

/// Grid dimension of the compositing canvas.
const COMPOSITE_GRID: u32 = 3;
/// Edge length of one tile inside the compositing canvas.
const COMPOSITE_TILE: u32 = 100;
/// Edge length of the compositing canvas itself.
const COMPOSITE_CANVAS: u32 = COMPOSITE_GRID * COMPOSITE_TILE;

/// Square scratch raster holding the current state of the challenge image.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    /// Decodes fetched bytes into a canvas, normalizing to three-channel RGB
    /// on the way in. The image must be square.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CanvasError> {
        let decoded = image::load_from_memory(bytes).map_err(CanvasError::Decode)?;
        let image = decoded.to_rgb8();
        if image.width() != image.height() {
            return Err(CanvasError::CanvasSize {
                got_w: image.width(),
                got_h: image.height(),
                want: image.width().max(image.height()),
            });
        }
        Ok(Canvas { image })
    }

    pub fn from_image(image: RgbImage) -> Result<Self, CanvasError> {
        if image.width() != image.height() {
            return Err(CanvasError::CanvasSize {
                got_w: image.width(),
                got_h: image.height(),
                want: image.width().max(image.height()),
            });
        }
        Ok(Canvas { image })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Edge length in pixels.
    pub fn size(&self) -> u32 {
        self.image.width()
    }

    /// Pastes a decoded 100x100 tile into its grid region of the 300x300
    /// canvas. `index` is 1-based, row-major.
    pub fn paste_tile(&mut self, index: u32, tile: &RgbImage) -> Result<(), CanvasError> {
        if self.size() != COMPOSITE_CANVAS {
            return Err(CanvasError::CanvasSize {
                got_w: self.image.width(),
                got_h: self.image.height(),
                want: COMPOSITE_CANVAS,
            });
        }
        if index == 0 || index > COMPOSITE_GRID * COMPOSITE_GRID {
            return Err(CanvasError::IndexOutOfGrid {
                index,
                grid: COMPOSITE_GRID,
            });
        }
        if tile.width() != COMPOSITE_TILE || tile.height() != COMPOSITE_TILE {
            return Err(CanvasError::TileSize {
                got_w: tile.width(),
                got_h: tile.height(),
                want: COMPOSITE_TILE,
            });
        }

        let row = (index - 1) / COMPOSITE_GRID;
        let col = (index - 1) % COMPOSITE_GRID;
        let x0 = col * COMPOSITE_TILE;
        let y0 = row * COMPOSITE_TILE;
        for y in 0..COMPOSITE_TILE {
            for x in 0..COMPOSITE_TILE {
                self.image.put_pixel(x0 + x, y0 + y, *tile.get_pixel(x, y));
            }
        }
        Ok(())
    }

    /// Decodes tile bytes and pastes them in one step.
    pub fn paste_tile_bytes(&mut self, index: u32, bytes: &[u8]) -> Result<(), CanvasError> {
        let decoded = image::load_from_memory(bytes).map_err(CanvasError::Decode)?;
        self.paste_tile(index, &decoded.to_rgb8())
    }

    /// Copies one tile's pixel region back out.
    pub fn tile(&self, index: u32) -> Result<RgbImage, CanvasError> {
        if self.size() != COMPOSITE_CANVAS {
            return Err(CanvasError::CanvasSize {
                got_w: self.image.width(),
                got_h: self.image.height(),
                want: COMPOSITE_CANVAS,
            });
        }
        if index == 0 || index > COMPOSITE_GRID * COMPOSITE_GRID {
            return Err(CanvasError::IndexOutOfGrid {
                index,
                grid: COMPOSITE_GRID,
            });
        }
        let row = (index - 1) / COMPOSITE_GRID;
        let col = (index - 1) % COMPOSITE_GRID;
        let x0 = col * COMPOSITE_TILE;
        let y0 = row * COMPOSITE_TILE;
        let mut out = RgbImage::new(COMPOSITE_TILE, COMPOSITE_TILE);
        for y in 0..COMPOSITE_TILE {
            for x in 0..COMPOSITE_TILE {
                out.put_pixel(x, y, *self.image.get_pixel(x0 + x, y0 + y));
            }
        }
        Ok(out)
    }
}

/// True only when every selected tile's source identifier differs from its
/// previous value. Any unchanged (or unreadable) entry means the widget is
/// still loading replacements and the caller must re-read.
pub fn refresh_complete(selected: &BTreeSet<u32>, before: &[String], current: &[String]) -> bool {
    selected.iter().all(|&index| {
        let slot = (index - 1) as usize;
        match (before.get(slot), current.get(slot)) {
            (Some(old), Some(new)) => old != new,
            _ => false,
        }
    })
}
