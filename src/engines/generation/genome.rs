/// Genome representation for polygon evolution
///
/// A genome is an ordered list of layers, each an ordered list of shared
/// [`Gene`] handles drawn back to front. Only the newest layer is ever
/// mutated; older layers are frozen and can be rendered once and reused.
///
/// # Structural sharing
///
/// Cloning a genome copies `Arc` pointers, never polygons. Every mutation
/// builds a new genome whose untouched genes are the very same `Arc`s as its
/// parent's, which is what lets renderers and the polygon cache recognise
/// stable genes by identity.
use crate::engines::generation::gene::Gene;
use crate::error::{EngineError, Result};
use std::sync::Arc;

pub type Layer = Vec<Arc<Gene>>;

#[derive(Debug, Clone)]
pub struct Genome {
    layers: Vec<Layer>,
    fitness: f64,
    improvements: u32,
    mutations: u32,
}

impl Genome {
    /// Unscored genome; fitness starts at +inf so any real score beats it
    pub fn new(layers: Vec<Layer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(EngineError::InvalidGenome("genome has no layers".to_string()));
        }
        if let Some(i) = layers.iter().position(|l| l.is_empty()) {
            return Err(EngineError::InvalidGenome(format!("layer {} is empty", i)));
        }
        Ok(Self {
            layers,
            fitness: f64::INFINITY,
            improvements: 0,
            mutations: 0,
        })
    }

    pub fn single_layer(genes: Layer) -> Result<Self> {
        Self::new(vec![genes])
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The only layer mutations may touch
    pub fn newest_layer(&self) -> &Layer {
        // non-empty by construction
        &self.layers[self.layers.len() - 1]
    }

    /// All genes in draw order
    pub fn genes(&self) -> impl Iterator<Item = &Arc<Gene>> {
        self.layers.iter().flatten()
    }

    pub fn gene_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.genes().map(|g| g.vertex_count()).sum()
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn improvements(&self) -> u32 {
        self.improvements
    }

    pub fn mutations(&self) -> u32 {
        self.mutations
    }

    pub fn with_fitness(mut self, fitness: f64) -> Self {
        self.fitness = fitness;
        self
    }

    pub fn with_counters(mut self, improvements: u32, mutations: u32) -> Self {
        self.improvements = improvements;
        self.mutations = mutations;
        self
    }

    /// Copy with the newest layer replaced. Older layers keep their `Arc`s.
    pub fn with_newest_layer(&self, layer: Layer) -> Result<Self> {
        if layer.is_empty() {
            return Err(EngineError::InvalidGenome("newest layer would be empty".to_string()));
        }
        let mut layers = self.layers.clone();
        let last = layers.len() - 1;
        layers[last] = layer;
        Ok(self.rebuilt(layers))
    }

    /// Copy with `layer` appended, freezing the current newest layer
    pub fn with_new_layer(&self, layer: Layer) -> Result<Self> {
        if layer.is_empty() {
            return Err(EngineError::InvalidGenome("new layer is empty".to_string()));
        }
        let mut layers = self.layers.clone();
        layers.push(layer);
        Ok(self.rebuilt(layers))
    }

    /// True when both genomes hold exactly the same gene handles in the same
    /// shape, i.e. no structural change happened between them
    pub fn shares_genes_with(&self, other: &Genome) -> bool {
        self.layers.len() == other.layers.len()
            && self.layers.iter().zip(&other.layers).all(|(a, b)| {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
            })
    }

    fn rebuilt(&self, layers: Vec<Layer>) -> Self {
        Self {
            layers,
            fitness: f64::INFINITY,
            improvements: self.improvements,
            mutations: self.mutations,
        }
    }
}

impl PartialEq for Genome {
    fn eq(&self, other: &Self) -> bool {
        self.fitness.to_bits() == other.fitness.to_bits()
            && self.improvements == other.improvements
            && self.mutations == other.mutations
            && self.layers.len() == other.layers.len()
            && self.layers.iter().zip(&other.layers).all(|(a, b)| {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Argb;

    fn tri(offset: i32) -> Arc<Gene> {
        Arc::new(
            Gene::from_coords(&[offset, offset + 10, offset + 5], &[0, 0, 10], Argb::BLACK).unwrap(),
        )
    }

    #[test]
    fn rejects_empty_layers() {
        assert!(Genome::new(vec![]).is_err());
        assert!(Genome::new(vec![vec![tri(0)], vec![]]).is_err());
    }

    #[test]
    fn replacing_newest_layer_keeps_frozen_handles() {
        let frozen = tri(0);
        let genome = Genome::new(vec![vec![Arc::clone(&frozen)], vec![tri(5)]]).unwrap();
        let next = genome.with_newest_layer(vec![tri(7), tri(9)]).unwrap();

        assert!(Arc::ptr_eq(&next.layers()[0][0], &frozen));
        assert_eq!(next.gene_count(), 3);
        assert!(!next.shares_genes_with(&genome));
        assert!(genome.clone().shares_genes_with(&genome));
    }
}
