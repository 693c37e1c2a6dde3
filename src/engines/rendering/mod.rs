pub mod layer_cache;
pub mod raster;
pub mod renderer;
pub mod tail_cache;

pub use layer_cache::LayerCachingRenderer;
pub use raster::{Canvas, Sprite};
pub use renderer::{render_once, BaseRenderer, GenePainter, Renderer};
pub use tail_cache::TailCachingRenderer;

use crate::data::cache::CacheHandle;
use crate::types::Argb;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    Base,
    TailCaching,
    LayerCaching,
}

/// Builds one private renderer per worker
#[derive(Clone)]
pub struct RendererFactory {
    kind: RendererKind,
    width: usize,
    height: usize,
    background: Argb,
    tail_size: usize,
    cache: Option<CacheHandle>,
}

impl RendererFactory {
    pub fn new(kind: RendererKind, width: usize, height: usize, background: Argb) -> Self {
        Self {
            kind,
            width,
            height,
            background,
            tail_size: 8,
            cache: None,
        }
    }

    pub fn with_tail_size(mut self, tail_size: usize) -> Self {
        self.tail_size = tail_size;
        self
    }

    pub fn with_cache(mut self, cache: CacheHandle) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn kind(&self) -> RendererKind {
        self.kind
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn create(&self) -> Box<dyn Renderer> {
        let painter = match &self.cache {
            Some(cache) => GenePainter::cached(cache.clone()),
            None => GenePainter::direct(),
        };
        match self.kind {
            RendererKind::Base => Box::new(BaseRenderer::new(self.width, self.height, self.background, painter)),
            RendererKind::TailCaching => Box::new(TailCachingRenderer::new(
                self.width,
                self.height,
                self.background,
                self.tail_size,
                painter,
            )),
            RendererKind::LayerCaching => Box::new(LayerCachingRenderer::new(
                self.width,
                self.height,
                self.background,
                painter,
            )),
        }
    }
}
