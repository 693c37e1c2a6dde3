//! Concrete mutation operators.
//!
//! Gene operators turn one gene into a new one; genome operators reshape the
//! newest layer. Neither ever modifies its input: a rejected mutation hands
//! back the very same `Arc` (or `None` for genomes) so callers can tell by
//! pointer identity that nothing changed.
use crate::config::MutationConfig;
use crate::engines::generation::constraints::MutationConstraints;
use crate::engines::generation::factory::GeneGenerator;
use crate::engines::generation::gene::{Gene, MAX_VERTICES, MIN_VERTICES};
use crate::engines::generation::genome::{Genome, Layer};
use crate::engines::generation::selectors::IndexSelector;
use crate::error::{EngineError, Result};
use crate::types::{Argb, Bounds, EngineRng, Point};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneMutation {
    MoveVertex,
    InsertVertex,
    RemoveVertex,
    SwapVertices,
    PerturbChannel,
    Brighten,
    Darken,
    HueRotate,
}

impl GeneMutation {
    pub const ALL: [GeneMutation; 8] = [
        GeneMutation::MoveVertex,
        GeneMutation::InsertVertex,
        GeneMutation::RemoveVertex,
        GeneMutation::SwapVertices,
        GeneMutation::PerturbChannel,
        GeneMutation::Brighten,
        GeneMutation::Darken,
        GeneMutation::HueRotate,
    ];

    /// Weight of this operator in the configured table
    pub fn weight(self, config: &MutationConfig) -> f64 {
        let w = &config.gene_weights;
        match self {
            GeneMutation::MoveVertex => w.move_vertex,
            GeneMutation::InsertVertex => w.insert_vertex,
            GeneMutation::RemoveVertex => w.remove_vertex,
            GeneMutation::SwapVertices => w.swap_vertices,
            GeneMutation::PerturbChannel => w.perturb_channel,
            GeneMutation::Brighten => w.brighten,
            GeneMutation::Darken => w.darken,
            GeneMutation::HueRotate => w.hue_rotate,
        }
    }

    /// Proposed replacement, `None` when the operator cannot apply
    fn propose(self, gene: &Gene, params: &GeneMutationParams, rng: &mut EngineRng) -> Option<Gene> {
        let points = gene.points();
        let n = points.len();
        match self {
            GeneMutation::MoveVertex => {
                let i = rng.gen_range(0..n);
                let mut moved = points.to_vec();
                let p = moved[i];
                moved[i] = params
                    .outer
                    .clamp_point(Point::new(p.x + params.vertex_delta(rng), p.y + params.vertex_delta(rng)));
                gene.with_points(moved).ok()
            }
            GeneMutation::InsertVertex => {
                if n >= MAX_VERTICES {
                    return None;
                }
                let i = rng.gen_range(0..n);
                let (a, b) = (points[i], points[(i + 1) % n]);
                let mid = Point::new(
                    (a.x + b.x) / 2 + params.vertex_delta(rng),
                    (a.y + b.y) / 2 + params.vertex_delta(rng),
                );
                let mut grown = points.to_vec();
                grown.insert(i + 1, params.outer.clamp_point(mid));
                gene.with_points(grown).ok()
            }
            GeneMutation::RemoveVertex => {
                if n <= MIN_VERTICES {
                    return None;
                }
                let mut shrunk = points.to_vec();
                shrunk.remove(rng.gen_range(0..n));
                gene.with_points(shrunk).ok()
            }
            GeneMutation::SwapVertices => {
                let i = rng.gen_range(0..n);
                let j = (i + rng.gen_range(1..n)) % n;
                let mut swapped = points.to_vec();
                swapped.swap(i, j);
                gene.with_points(swapped).ok()
            }
            GeneMutation::PerturbChannel => {
                if params.channel_delta == 0 {
                    return None;
                }
                let channel = rng.gen_range(0..4);
                let delta = params.channel_delta as i32;
                let magnitude = rng.gen_range(1..=delta);
                let signed = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
                let current = gene.color().channel(channel) as i32;
                let value = (current + signed).clamp(0, 255) as u8;
                Some(gene.with_color(gene.color().with_channel(channel, value)))
            }
            GeneMutation::Brighten => Some(gene.with_color(scale_rgb(gene.color(), 1.1))),
            GeneMutation::Darken => Some(gene.with_color(scale_rgb(gene.color(), 0.9))),
            GeneMutation::HueRotate => {
                if params.hue_delta <= 0.0 {
                    return None;
                }
                let degrees = rng.gen_range(-params.hue_delta..=params.hue_delta);
                Some(gene.with_color(rotate_hue(gene.color(), degrees)))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenomeMutation {
    AddGene,
    RemoveGene,
    SwapGenes,
}

impl GenomeMutation {
    pub const ALL: [GenomeMutation; 3] = [
        GenomeMutation::AddGene,
        GenomeMutation::RemoveGene,
        GenomeMutation::SwapGenes,
    ];

    pub fn weight(self, config: &MutationConfig) -> f64 {
        let w = &config.genome_weights;
        match self {
            GenomeMutation::AddGene => w.add_gene,
            GenomeMutation::RemoveGene => w.remove_gene,
            GenomeMutation::SwapGenes => w.swap_genes,
        }
    }

    /// New genome, or `None` when the operation is not possible here
    pub fn apply(
        self,
        genome: &Genome,
        selector: &IndexSelector,
        generator: &GeneGenerator,
        layer_size: usize,
        rng: &mut EngineRng,
    ) -> Option<Genome> {
        let layer = genome.newest_layer();
        match self {
            GenomeMutation::AddGene => {
                let gene = Arc::new(generator.generate(rng)?);
                if layer_size > 0 && layer.len() >= layer_size {
                    genome.with_new_layer(vec![gene]).ok()
                } else {
                    let mut grown: Layer = layer.clone();
                    grown.push(gene);
                    genome.with_newest_layer(grown).ok()
                }
            }
            GenomeMutation::RemoveGene => {
                // the newest layer never goes empty
                if layer.len() <= 1 {
                    return None;
                }
                let index = selector.select(layer.len(), rng)?;
                let mut shrunk = layer.clone();
                shrunk.remove(index);
                genome.with_newest_layer(shrunk).ok()
            }
            GenomeMutation::SwapGenes => {
                let (a, b) = selector.select_pair(layer.len(), rng)?;
                let mut swapped = layer.clone();
                swapped.swap(a, b);
                genome.with_newest_layer(swapped).ok()
            }
        }
    }
}

/// Numeric knobs shared by every gene operator
#[derive(Debug, Clone)]
pub struct GeneMutationParams {
    /// Vertices are clamped into this box
    pub outer: Bounds,
    noise: Normal<f64>,
    sigma: f64,
    pub channel_delta: u8,
    pub hue_delta: f64,
    pub constraints: MutationConstraints,
}

impl GeneMutationParams {
    pub fn new(outer: Bounds, vertex_sigma: f64, channel_delta: u8, hue_delta: f64) -> Result<Self> {
        let noise = Normal::new(0.0, vertex_sigma)
            .map_err(|e| EngineError::Configuration(format!("[mutation] vertex_sigma: {}", e)))?;
        Ok(Self {
            outer,
            noise,
            sigma: vertex_sigma,
            channel_delta,
            hue_delta,
            constraints: MutationConstraints::default(),
        })
    }

    pub fn from_config(config: &MutationConfig, width: usize, height: usize) -> Result<Self> {
        Ok(Self::new(
            Bounds::canvas(width, height, config.borders.outer),
            config.vertex_sigma,
            config.channel_delta,
            config.hue_delta,
        )?
        .with_constraints(config.constraints.clone()))
    }

    pub fn with_constraints(mut self, constraints: MutationConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Gaussian step, clamped to three standard deviations and rounded
    fn vertex_delta(&self, rng: &mut EngineRng) -> i32 {
        let limit = 3.0 * self.sigma;
        self.noise.sample(rng).clamp(-limit, limit).round() as i32
    }
}

/// Apply `op` to `gene`.
///
/// Returns a fresh `Arc` on success. When the operator does not apply, the
/// result equals the input, or the result breaks a constraint, the input
/// `Arc` itself is returned.
pub fn apply_gene_mutation(
    op: GeneMutation,
    gene: &Arc<Gene>,
    params: &GeneMutationParams,
    rng: &mut EngineRng,
) -> Arc<Gene> {
    match op.propose(gene, params, rng) {
        Some(candidate) if candidate != **gene && params.constraints.permits(&candidate) => Arc::new(candidate),
        _ => Arc::clone(gene),
    }
}

fn scale_rgb(color: Argb, factor: f64) -> Argb {
    let scale = |c: u8| (c as f64 * factor).round().clamp(0.0, 255.0) as u8;
    Argb::new(color.a, scale(color.r), scale(color.g), scale(color.b))
}

/// Rotate the hue by `degrees`, keeping saturation, value and alpha
fn rotate_hue(color: Argb, degrees: f64) -> Argb {
    let (h, s, v) = rgb_to_hsv(color.r, color.g, color.b);
    let (r, g, b) = hsv_to_rgb((h + degrees).rem_euclid(360.0), s, v);
    Argb::new(color.a, r, g, b)
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to_byte = |u: f64| ((u + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_byte(r), to_byte(g), to_byte(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::seeded_rng;

    fn params() -> GeneMutationParams {
        GeneMutationParams::new(Bounds::canvas(100, 100, 10), 4.0, 16, 30.0).unwrap()
    }

    fn triangle() -> Arc<Gene> {
        Arc::new(Gene::from_coords(&[10, 60, 30], &[10, 15, 70], Argb::new(128, 200, 40, 90)).unwrap())
    }

    #[test]
    fn hue_round_trip_is_stable() {
        for &(r, g, b) in &[(255, 0, 0), (12, 200, 99), (0, 0, 0), (255, 255, 255), (30, 60, 240)] {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            assert_eq!(hsv_to_rgb(h, s, v), (r, g, b));
        }
        let red = Argb::new(255, 255, 0, 0);
        assert_eq!(rotate_hue(red, 120.0), Argb::new(255, 0, 255, 0));
    }

    #[test]
    fn brighten_and_darken_scale_rgb_only() {
        let c = Argb::new(77, 100, 200, 250);
        assert_eq!(scale_rgb(c, 1.1), Argb::new(77, 110, 220, 255));
        assert_eq!(scale_rgb(c, 0.9), Argb::new(77, 90, 180, 225));
    }

    #[test]
    fn remove_vertex_on_triangle_is_rejected() {
        let mut rng = seeded_rng(1);
        let gene = triangle();
        let out = apply_gene_mutation(GeneMutation::RemoveVertex, &gene, &params(), &mut rng);
        assert!(Arc::ptr_eq(&gene, &out));
    }

    #[test]
    fn moved_vertices_stay_in_outer_box() {
        let mut rng = seeded_rng(2);
        let p = params();
        let mut gene = Arc::new(Gene::from_coords(&[0, 99, 50], &[0, 0, 99], Argb::BLACK).unwrap());
        for _ in 0..500 {
            gene = apply_gene_mutation(GeneMutation::MoveVertex, &gene, &p, &mut rng);
            assert!(gene.points().iter().all(|pt| p.outer.contains(*pt)));
        }
    }

    #[test]
    fn insert_then_remove_changes_vertex_count() {
        let mut rng = seeded_rng(3);
        let gene = triangle();
        let grown = apply_gene_mutation(GeneMutation::InsertVertex, &gene, &params(), &mut rng);
        if !Arc::ptr_eq(&gene, &grown) {
            assert_eq!(grown.vertex_count(), 4);
            let shrunk = apply_gene_mutation(GeneMutation::RemoveVertex, &grown, &params(), &mut rng);
            assert_eq!(shrunk.vertex_count(), 3);
        }
    }

    #[test]
    fn channel_perturbation_is_bounded() {
        let mut rng = seeded_rng(4);
        let gene = triangle();
        for _ in 0..200 {
            let out = apply_gene_mutation(GeneMutation::PerturbChannel, &gene, &params(), &mut rng);
            let (a, b) = (gene.color(), out.color());
            let diff: i32 = (0..4).map(|i| (a.channel(i) as i32 - b.channel(i) as i32).abs()).sum();
            assert!(diff <= 16);
            assert_eq!(out.points(), gene.points());
        }
    }
}
