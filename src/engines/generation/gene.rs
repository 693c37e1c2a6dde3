use crate::data::codec;
use crate::error::{EngineError, Result};
use crate::types::{Argb, Bounds, Point};
use std::hash::{Hash, Hasher};

pub const MIN_VERTICES: usize = 3;
/// The vertex count is stored in a single byte
pub const MAX_VERTICES: usize = u8::MAX as usize;

/// One semi-transparent polygon.
///
/// Genes are immutable once built and shared between genomes through `Arc`;
/// every mutation produces a new `Gene`. The structural hash is the CRC32 of
/// the canonical encoding and is computed once, in the constructor, so it is
/// a pure function of fields that can never change afterwards.
#[derive(Debug, Clone)]
pub struct Gene {
    points: Vec<Point>,
    color: Argb,
    hash: u32,
}

impl Gene {
    pub fn new(points: Vec<Point>, color: Argb) -> Result<Self> {
        if points.len() < MIN_VERTICES || points.len() > MAX_VERTICES {
            return Err(EngineError::InvalidGene(format!(
                "vertex count {} outside {}..={}",
                points.len(),
                MIN_VERTICES,
                MAX_VERTICES
            )));
        }
        let in_range = |v: i32| v >= i16::MIN as i32 && v <= i16::MAX as i32;
        if let Some(p) = points.iter().find(|p| !in_range(p.x) || !in_range(p.y)) {
            return Err(EngineError::InvalidGene(format!(
                "vertex ({}, {}) does not fit 16-bit coordinates",
                p.x, p.y
            )));
        }

        let hash = codec::crc32(&codec::gene_bytes(&points, color));
        Ok(Self { points, color, hash })
    }

    /// Build from parallel coordinate slices
    pub fn from_coords(xs: &[i32], ys: &[i32], color: Argb) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(EngineError::InvalidGene(format!(
                "{} x coordinates but {} y coordinates",
                xs.len(),
                ys.len()
            )));
        }
        let points = xs.iter().zip(ys).map(|(&x, &y)| Point::new(x, y)).collect();
        Self::new(points, color)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn color(&self) -> Argb {
        self.color
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn structural_hash(&self) -> u32 {
        self.hash
    }

    pub fn bounds(&self) -> Bounds {
        // a gene always has at least three vertices
        Bounds::from_points(&self.points).unwrap_or(Bounds::new(0, 0, -1, -1))
    }

    pub fn with_points(&self, points: Vec<Point>) -> Result<Gene> {
        Gene::new(points, self.color)
    }

    pub fn with_color(&self, color: Argb) -> Gene {
        let hash = codec::crc32(&codec::gene_bytes(&self.points, color));
        Gene {
            points: self.points.clone(),
            color,
            hash,
        }
    }
}

impl PartialEq for Gene {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.color == other.color && self.points == other.points
    }
}

impl Eq for Gene {}

impl Hash for Gene {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash);
    }
}
