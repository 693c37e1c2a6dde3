use crate::data::cache::CacheHandle;
use crate::engines::generation::{Gene, Genome};
use crate::engines::rendering::raster::{self, Canvas};
use crate::types::Argb;

/// Turns a genome into pixels.
///
/// Each worker owns its own renderer; implementations keep scratch rasters
/// between calls and hand back a borrow of the latest frame.
pub trait Renderer: Send {
    fn render(&mut self, genome: &Genome) -> &Canvas;
}

/// Draws single genes, through the polygon cache when one is attached
#[derive(Clone, Default)]
pub struct GenePainter {
    cache: Option<CacheHandle>,
}

impl GenePainter {
    pub fn direct() -> Self {
        Self { cache: None }
    }

    pub fn cached(cache: CacheHandle) -> Self {
        Self { cache: Some(cache) }
    }

    pub fn paint(&self, canvas: &mut Canvas, gene: &Gene) {
        if let Some(sprite) = self.cache.as_ref().and_then(|c| c.get(gene)) {
            sprite.composite(canvas);
        } else {
            raster::fill_gene(canvas, gene);
        }
    }

    /// Report the genome to the cache's background service, never blocks
    pub fn observe(&self, genome: &Genome) {
        if let Some(cache) = &self.cache {
            cache.observe(genome);
        }
    }
}

/// Clears to the background and draws every gene in order
pub struct BaseRenderer {
    canvas: Canvas,
    background: Argb,
    painter: GenePainter,
}

impl BaseRenderer {
    pub fn new(width: usize, height: usize, background: Argb, painter: GenePainter) -> Self {
        Self {
            canvas: Canvas::new(width, height),
            background,
            painter,
        }
    }
}

impl Renderer for BaseRenderer {
    fn render(&mut self, genome: &Genome) -> &Canvas {
        self.canvas.clear(self.background);
        for gene in genome.genes() {
            self.painter.paint(&mut self.canvas, gene);
        }
        self.painter.observe(genome);
        &self.canvas
    }
}

/// One-shot render without keeping a renderer around
pub fn render_once(genome: &Genome, width: usize, height: usize, background: Argb) -> Canvas {
    let mut canvas = Canvas::filled(width, height, background);
    for gene in genome.genes() {
        raster::fill_gene(&mut canvas, gene);
    }
    canvas
}
