use crate::config::FitnessConfig;
use crate::engines::evaluation::target::TargetImage;
use crate::engines::generation::Genome;
use crate::engines::rendering::Canvas;
use crate::error::{EngineError, Result};
use rayon::prelude::*;

/// Importance weights are `MAX_WEIGHT - importance[pixel]`
pub const MAX_WEIGHT: u64 = 256;

/// Lower-is-better distance between a rendering and the target.
///
/// The raw error is the sum over all pixels of squared per-channel
/// differences, each pixel scaled by its importance weight. It is then
/// inflated by `1 + gene_penalty * genes + vertex_penalty * vertices` so
/// that of two equally accurate genomes the simpler one wins.
#[derive(Debug, Clone, Default)]
pub struct FitnessFunction {
    config: FitnessConfig,
}

impl FitnessFunction {
    pub fn new(config: FitnessConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, genome: &Genome, canvas: &Canvas, target: &TargetImage) -> Result<f64> {
        let error = Self::pixel_error(canvas, target)? as f64;
        let penalty = 1.0
            + self.config.gene_penalty * genome.gene_count() as f64
            + self.config.vertex_penalty * genome.vertex_count() as f64;
        Ok(error * penalty)
    }

    /// Weighted squared error, summed row by row in parallel
    pub fn pixel_error(canvas: &Canvas, target: &TargetImage) -> Result<u64> {
        if canvas.width() != target.width() || canvas.height() != target.height() {
            return Err(EngineError::IllegalState {
                expected: "canvas matching the target size",
                actual: format!(
                    "{}x{} canvas for a {}x{} target",
                    canvas.width(),
                    canvas.height(),
                    target.width(),
                    target.height()
                ),
            });
        }
        let width = target.width();
        let stride = width * 4;

        let total: u64 = canvas
            .pixels()
            .par_chunks(stride)
            .zip(target.pixels().par_chunks(stride))
            .enumerate()
            .map(|(y, (rendered, wanted))| {
                let weights = target.importance().map(|imp| &imp[y * width..(y + 1) * width]);
                row_error(rendered, wanted, weights)
            })
            .sum();
        Ok(total)
    }
}

#[inline]
fn row_error(rendered: &[u8], wanted: &[u8], weights: Option<&[u8]>) -> u64 {
    rendered
        .chunks_exact(4)
        .zip(wanted.chunks_exact(4))
        .enumerate()
        .map(|(x, (r, w))| {
            let squared: u64 = r
                .iter()
                .zip(w)
                .map(|(&a, &b)| {
                    let d = a as i64 - b as i64;
                    (d * d) as u64
                })
                .sum();
            match weights {
                Some(imp) => squared * (MAX_WEIGHT - imp[x] as u64),
                None => squared,
            }
        })
        .sum()
}
