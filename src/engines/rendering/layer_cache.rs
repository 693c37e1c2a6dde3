use crate::engines::generation::{Genome, Layer};
use crate::engines::rendering::raster::Canvas;
use crate::engines::rendering::renderer::{GenePainter, Renderer};
use crate::types::Argb;
use std::sync::Arc;

/// Same idea as the tail cache, applied per layer: every layer but the
/// newest is frozen, so the frozen stack is rendered once and reused.
pub struct LayerCachingRenderer {
    background: Argb,
    painter: GenePainter,
    frozen: Canvas,
    frozen_layers: Vec<Layer>,
    output: Canvas,
}

impl LayerCachingRenderer {
    pub fn new(width: usize, height: usize, background: Argb, painter: GenePainter) -> Self {
        Self {
            background,
            painter,
            frozen: Canvas::filled(width, height, background),
            frozen_layers: Vec::new(),
            output: Canvas::new(width, height),
        }
    }

    pub fn cached_layers(&self) -> usize {
        self.frozen_layers.len()
    }

    fn same_layer(a: &Layer, b: &Layer) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y) || x == y)
    }
}

impl Renderer for LayerCachingRenderer {
    fn render(&mut self, genome: &Genome) -> &Canvas {
        let layers = genome.layers();
        let frozen_count = layers.len() - 1;

        let valid = self.frozen_layers.len() <= frozen_count
            && self
                .frozen_layers
                .iter()
                .zip(layers)
                .all(|(cached, current)| Self::same_layer(cached, current));
        if !valid {
            self.frozen.clear(self.background);
            self.frozen_layers.clear();
        }

        for layer in &layers[self.frozen_layers.len()..frozen_count] {
            for gene in layer {
                self.painter.paint(&mut self.frozen, gene);
            }
            self.frozen_layers.push(layer.clone());
        }

        self.output.copy_from(&self.frozen);
        for gene in genome.newest_layer() {
            self.painter.paint(&mut self.output, gene);
        }
        self.painter.observe(genome);
        &self.output
    }
}
