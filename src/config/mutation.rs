use super::traits::{invalid, ConfigSection};
use crate::engines::generation::constraints::MutationConstraints;
use crate::engines::generation::selectors::IndexSelector;
use crate::engines::generation::gene::{MAX_VERTICES, MIN_VERTICES};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Where new and moved vertices may land.
///
/// `outer` lets vertices stray past the canvas edge by that many pixels;
/// `inner` keeps the anchor of a freshly generated gene that far inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Borders {
    pub outer: i32,
    pub inner: i32,
}

impl Default for Borders {
    fn default() -> Self {
        Self { outer: 16, inner: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneMutationWeights {
    pub move_vertex: f64,
    pub insert_vertex: f64,
    pub remove_vertex: f64,
    pub swap_vertices: f64,
    pub perturb_channel: f64,
    pub brighten: f64,
    pub darken: f64,
    pub hue_rotate: f64,
}

impl Default for GeneMutationWeights {
    fn default() -> Self {
        Self {
            move_vertex: 6.0,
            insert_vertex: 1.0,
            remove_vertex: 1.0,
            swap_vertices: 0.5,
            perturb_channel: 4.0,
            brighten: 0.5,
            darken: 0.5,
            hue_rotate: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeMutationWeights {
    pub add_gene: f64,
    pub remove_gene: f64,
    pub swap_genes: f64,
}

impl Default for GenomeMutationWeights {
    fn default() -> Self {
        Self {
            add_gene: 2.0,
            remove_gene: 1.0,
            swap_genes: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    pub borders: Borders,
    pub min_mutations: u32,
    pub max_mutations: u32,
    /// Chance that a single mutation acts on a gene rather than the genome
    pub gene_probability: f64,
    pub gene_weights: GeneMutationWeights,
    pub genome_weights: GenomeMutationWeights,
    pub selector: IndexSelector,
    /// Standard deviation of vertex moves, clamped to three of them
    pub vertex_sigma: f64,
    pub channel_delta: u8,
    /// Maximum hue rotation in degrees, either direction
    pub hue_delta: f64,
    pub new_gene_vertices: usize,
    pub new_gene_radius: i32,
    pub new_gene_min_alpha: u8,
    pub new_gene_max_alpha: u8,
    /// Genes per layer before a new layer is opened, 0 keeps a single layer
    pub layer_size: usize,
    pub constraints: MutationConstraints,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            borders: Borders::default(),
            min_mutations: 1,
            max_mutations: 3,
            gene_probability: 0.8,
            gene_weights: GeneMutationWeights::default(),
            genome_weights: GenomeMutationWeights::default(),
            selector: IndexSelector::Biased {
                fraction: 0.25,
                probability: 0.5,
            },
            vertex_sigma: 4.0,
            channel_delta: 16,
            hue_delta: 30.0,
            new_gene_vertices: 3,
            new_gene_radius: 32,
            new_gene_min_alpha: 30,
            new_gene_max_alpha: 200,
            layer_size: 0,
            constraints: MutationConstraints::default(),
        }
    }
}

impl ConfigSection for MutationConfig {
    fn section_name() -> &'static str {
        "mutation"
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.min_mutations == 0 {
            return Err(invalid::<Self>("min_mutations must be at least 1"));
        }
        if self.min_mutations > self.max_mutations {
            return Err(invalid::<Self>("min_mutations must not exceed max_mutations"));
        }
        if !(0.0..=1.0).contains(&self.gene_probability) {
            return Err(invalid::<Self>("gene_probability must be between 0 and 1"));
        }
        if !(self.vertex_sigma > 0.0) {
            return Err(invalid::<Self>("vertex_sigma must be positive"));
        }
        if !(self.hue_delta >= 0.0) {
            return Err(invalid::<Self>("hue_delta must be non-negative"));
        }
        if self.new_gene_vertices < MIN_VERTICES || self.new_gene_vertices > MAX_VERTICES {
            return Err(invalid::<Self>("new_gene_vertices must be between 3 and 255"));
        }
        if self.new_gene_radius < 1 {
            return Err(invalid::<Self>("new_gene_radius must be at least 1"));
        }
        if self.new_gene_min_alpha > self.new_gene_max_alpha {
            return Err(invalid::<Self>("new_gene_min_alpha must not exceed new_gene_max_alpha"));
        }
        if self.borders.outer < 0 || self.borders.inner < 0 {
            return Err(invalid::<Self>("borders must be non-negative"));
        }
        if self.borders.outer > 4096 {
            return Err(invalid::<Self>("outer border must be at most 4096"));
        }
        self.selector.validate()?;
        self.constraints.validate()?;

        let gene_total = [
            self.gene_weights.move_vertex,
            self.gene_weights.insert_vertex,
            self.gene_weights.remove_vertex,
            self.gene_weights.swap_vertices,
            self.gene_weights.perturb_channel,
            self.gene_weights.brighten,
            self.gene_weights.darken,
            self.gene_weights.hue_rotate,
        ];
        let genome_total = [
            self.genome_weights.add_gene,
            self.genome_weights.remove_gene,
            self.genome_weights.swap_genes,
        ];
        if gene_total.iter().chain(&genome_total).any(|w| !(*w >= 0.0)) {
            return Err(invalid::<Self>("operator weights must be non-negative"));
        }
        if self.gene_probability > 0.0 && gene_total.iter().sum::<f64>() <= 0.0 {
            return Err(invalid::<Self>("gene mutations enabled but all gene weights are zero"));
        }
        if self.gene_probability < 1.0 && genome_total.iter().sum::<f64>() <= 0.0 {
            return Err(invalid::<Self>("genome mutations enabled but all genome weights are zero"));
        }
        Ok(())
    }
}
