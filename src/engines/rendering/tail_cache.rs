use crate::engines::generation::{Gene, Genome};
use crate::engines::rendering::raster::Canvas;
use crate::engines::rendering::renderer::{GenePainter, Renderer};
use crate::types::Argb;
use std::sync::Arc;

/// Caches everything except the newest `tail_size` genes.
///
/// The stable prefix lives in its own raster and only grows: when the
/// boundary advances, just the newly stable genes are drawn into it. If a
/// mutation touches a gene inside the prefix (or the genome shrinks below
/// it), the prefix is rebuilt from scratch.
pub struct TailCachingRenderer {
    tail_size: usize,
    background: Argb,
    painter: GenePainter,
    prefix: Canvas,
    prefix_genes: Vec<Arc<Gene>>,
    output: Canvas,
    rebuilds: u64,
}

impl TailCachingRenderer {
    pub fn new(width: usize, height: usize, background: Argb, tail_size: usize, painter: GenePainter) -> Self {
        Self {
            tail_size,
            background,
            painter,
            prefix: Canvas::filled(width, height, background),
            prefix_genes: Vec::new(),
            output: Canvas::new(width, height),
            rebuilds: 0,
        }
    }

    /// Genes currently baked into the prefix raster
    pub fn cached_prefix_len(&self) -> usize {
        self.prefix_genes.len()
    }

    /// How often a mismatch forced the prefix to start over
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    fn prefix_still_valid(&self, genes: &[&Arc<Gene>], stable: usize) -> bool {
        self.prefix_genes.len() <= stable
            && self
                .prefix_genes
                .iter()
                .zip(genes)
                .all(|(cached, current)| Arc::ptr_eq(cached, current) || cached == *current)
    }
}

impl Renderer for TailCachingRenderer {
    fn render(&mut self, genome: &Genome) -> &Canvas {
        let genes: Vec<&Arc<Gene>> = genome.genes().collect();
        let stable = genes.len().saturating_sub(self.tail_size);

        if !self.prefix_still_valid(&genes, stable) {
            self.prefix.clear(self.background);
            self.prefix_genes.clear();
            self.rebuilds += 1;
        }

        for gene in &genes[self.prefix_genes.len()..stable] {
            self.painter.paint(&mut self.prefix, gene);
            self.prefix_genes.push(Arc::clone(gene));
        }

        self.output.copy_from(&self.prefix);
        for gene in &genes[self.prefix_genes.len()..] {
            self.painter.paint(&mut self.output, gene);
        }
        self.painter.observe(genome);
        &self.output
    }
}
