use crate::engines::rendering::Canvas;
use crate::error::{EngineError, Result};
use crate::types::Argb;

/// Pixels the search tries to reproduce, RGBA row-major.
///
/// The optional importance map holds one byte per pixel; lower values mark
/// pixels whose mismatch should cost more.
#[derive(Debug, Clone)]
pub struct TargetImage {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    importance: Option<Vec<u8>>,
}

impl TargetImage {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::Configuration(format!(
                "[target] image must not be empty, got {}x{}",
                width, height
            )));
        }
        if pixels.len() != width * height * 4 {
            return Err(EngineError::Configuration(format!(
                "[target] expected {} RGBA bytes for {}x{}, got {}",
                width * height * 4,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            importance: None,
        })
    }

    /// Flat single-color target
    pub fn uniform(width: usize, height: usize, color: Argb) -> Result<Self> {
        let pixels = color.to_rgba().repeat(width * height);
        Self::new(width, height, pixels)
    }

    pub fn from_canvas(canvas: &Canvas) -> Result<Self> {
        Self::new(canvas.width(), canvas.height(), canvas.pixels().to_vec())
    }

    pub fn with_importance(mut self, importance: Vec<u8>) -> Result<Self> {
        if importance.len() != self.width * self.height {
            return Err(EngineError::Configuration(format!(
                "[target] importance map has {} entries, expected {}",
                importance.len(),
                self.width * self.height
            )));
        }
        self.importance = Some(importance);
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn importance(&self) -> Option<&[u8]> {
        self.importance.as_deref()
    }
}
