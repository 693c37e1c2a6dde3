use crate::config::MutationConfig;
use crate::engines::generation::constraints::MutationConstraints;
use crate::engines::generation::gene::Gene;
use crate::engines::generation::genome::Genome;
use crate::error::{EngineError, Result};
use crate::types::{Argb, Bounds, EngineRng, Point};
use rand::Rng;
use std::sync::Arc;

const GENERATION_ATTEMPTS: usize = 32;

/// Produces the first candidate when no best genome exists yet
pub trait CandidateFactory: Send + Sync {
    fn create(&self, rng: &mut EngineRng) -> Result<Genome>;
}

/// Random polygon generator used by the factory and by `AddGene`.
///
/// The anchor of a new gene lies inside the canvas shrunk by the inner
/// border; its vertices scatter around the anchor and are clamped to the
/// canvas grown by the outer border.
#[derive(Debug, Clone)]
pub struct GeneGenerator {
    anchor_area: Bounds,
    outer: Bounds,
    vertices: usize,
    radius: i32,
    min_alpha: u8,
    max_alpha: u8,
    constraints: MutationConstraints,
}

impl GeneGenerator {
    pub fn new(config: &MutationConfig, width: usize, height: usize) -> Self {
        let canvas = Bounds::canvas(width, height, 0);
        let shrunk = canvas.expand(-config.borders.inner);
        Self {
            anchor_area: if shrunk.is_empty() { canvas } else { shrunk },
            outer: canvas.expand(config.borders.outer),
            vertices: config.new_gene_vertices,
            radius: config.new_gene_radius,
            min_alpha: config.new_gene_min_alpha,
            max_alpha: config.new_gene_max_alpha,
            constraints: config.constraints.clone(),
        }
    }

    /// A fresh gene, or `None` if every attempt broke a constraint
    pub fn generate(&self, rng: &mut EngineRng) -> Option<Gene> {
        (0..GENERATION_ATTEMPTS).find_map(|_| {
            let gene = self.attempt(rng)?;
            self.constraints.permits(&gene).then_some(gene)
        })
    }

    fn attempt(&self, rng: &mut EngineRng) -> Option<Gene> {
        let cx = rng.gen_range(self.anchor_area.min_x..=self.anchor_area.max_x);
        let cy = rng.gen_range(self.anchor_area.min_y..=self.anchor_area.max_y);

        let mut points: Vec<Point> = (0..self.vertices)
            .map(|_| {
                let p = Point::new(
                    cx + rng.gen_range(-self.radius..=self.radius),
                    cy + rng.gen_range(-self.radius..=self.radius),
                );
                self.outer.clamp_point(p)
            })
            .collect();
        // angular order around the anchor keeps larger polygons simple
        points.sort_by(|a, b| {
            let ta = ((a.y - cy) as f64).atan2((a.x - cx) as f64);
            let tb = ((b.y - cy) as f64).atan2((b.x - cx) as f64);
            ta.total_cmp(&tb)
        });

        let color = Argb::new(
            rng.gen_range(self.min_alpha..=self.max_alpha),
            rng.gen(),
            rng.gen(),
            rng.gen(),
        );
        Gene::new(points, color).ok()
    }
}

/// Starts the search from a handful of random genes in a single layer
#[derive(Debug, Clone)]
pub struct RandomGenomeFactory {
    generator: GeneGenerator,
    initial_genes: usize,
}

impl RandomGenomeFactory {
    pub fn new(config: &MutationConfig, width: usize, height: usize) -> Self {
        Self {
            generator: GeneGenerator::new(config, width, height),
            initial_genes: 1,
        }
    }

    pub fn with_initial_genes(mut self, count: usize) -> Self {
        self.initial_genes = count.max(1);
        self
    }
}

impl CandidateFactory for RandomGenomeFactory {
    fn create(&self, rng: &mut EngineRng) -> Result<Genome> {
        let genes = (0..self.initial_genes)
            .map(|_| {
                self.generator.generate(rng).map(Arc::new).ok_or_else(|| {
                    EngineError::InvalidGene("no random gene satisfied the mutation constraints".to_string())
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Genome::single_layer(genes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::seeded_rng;

    #[test]
    fn generated_genes_respect_configuration() {
        let config = MutationConfig {
            new_gene_vertices: 5,
            new_gene_min_alpha: 40,
            new_gene_max_alpha: 60,
            ..MutationConfig::default()
        };
        let generator = GeneGenerator::new(&config, 64, 48);
        let outer = Bounds::canvas(64, 48, config.borders.outer);
        let mut rng = seeded_rng(11);
        for _ in 0..100 {
            let gene = generator.generate(&mut rng).unwrap();
            assert_eq!(gene.vertex_count(), 5);
            assert!((40..=60).contains(&gene.color().a));
            assert!(gene.points().iter().all(|p| outer.contains(*p)));
        }
    }

    #[test]
    fn factory_is_deterministic_per_seed() {
        let factory = RandomGenomeFactory::new(&MutationConfig::default(), 32, 32).with_initial_genes(4);
        let a = factory.create(&mut seeded_rng(5)).unwrap();
        let b = factory.create(&mut seeded_rng(5)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.gene_count(), 4);
        assert_eq!(a.layer_count(), 1);
    }
}
