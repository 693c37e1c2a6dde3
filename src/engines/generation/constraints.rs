use crate::engines::generation::gene::Gene;
use crate::error::{EngineError, Result};
use crate::types;
use serde::{Deserialize, Serialize};

/// Optional limits a mutated gene must satisfy.
///
/// A gene mutation whose result fails any enabled check is discarded and the
/// original gene is kept. Nothing here is an error at mutation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConstraints {
    pub min_alpha: Option<u8>,
    pub max_alpha: Option<u8>,
    /// Smallest interior angle allowed at any vertex
    pub min_angle_degrees: Option<f64>,
    pub forbid_self_intersection: bool,
    /// Smallest distance between a vertex and any edge not touching it
    pub min_vertex_edge_distance: Option<f64>,
}

impl MutationConstraints {
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(lo), Some(hi)) = (self.min_alpha, self.max_alpha) {
            if lo > hi {
                return Err(EngineError::Configuration(
                    "[mutation] constraint min_alpha exceeds max_alpha".to_string(),
                ));
            }
        }
        if let Some(angle) = self.min_angle_degrees {
            if !(0.0..60.0).contains(&angle) {
                return Err(EngineError::Configuration(
                    "[mutation] constraint min_angle_degrees must be in [0, 60)".to_string(),
                ));
            }
        }
        if let Some(distance) = self.min_vertex_edge_distance {
            if !(distance >= 0.0) {
                return Err(EngineError::Configuration(
                    "[mutation] constraint min_vertex_edge_distance must be non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn permits(&self, gene: &Gene) -> bool {
        let alpha = gene.color().a;
        if self.min_alpha.is_some_and(|lo| alpha < lo) || self.max_alpha.is_some_and(|hi| alpha > hi) {
            return false;
        }
        let points = gene.points();
        if let Some(min_angle) = self.min_angle_degrees {
            if types::min_vertex_angle_degrees(points) < min_angle {
                return false;
            }
        }
        if self.forbid_self_intersection && types::is_self_intersecting(points) {
            return false;
        }
        if let Some(min_distance) = self.min_vertex_edge_distance {
            if types::min_vertex_edge_distance(points) < min_distance {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Argb;

    fn gene(xs: &[i32], ys: &[i32], alpha: u8) -> Gene {
        Gene::from_coords(xs, ys, Argb::new(alpha, 10, 20, 30)).unwrap()
    }

    #[test]
    fn unconstrained_permits_anything() {
        let bowtie = gene(&[0, 10, 0, 10], &[0, 10, 10, 0], 0);
        assert!(MutationConstraints::unconstrained().permits(&bowtie));
    }

    #[test]
    fn alpha_bounds() {
        let c = MutationConstraints {
            min_alpha: Some(20),
            max_alpha: Some(200),
            ..Default::default()
        };
        assert!(!c.permits(&gene(&[0, 10, 5], &[0, 0, 10], 10)));
        assert!(!c.permits(&gene(&[0, 10, 5], &[0, 0, 10], 250)));
        assert!(c.permits(&gene(&[0, 10, 5], &[0, 0, 10], 100)));
    }

    #[test]
    fn self_intersection_and_angle() {
        let c = MutationConstraints {
            forbid_self_intersection: true,
            min_angle_degrees: Some(30.0),
            ..Default::default()
        };
        let bowtie = gene(&[0, 10, 0, 10], &[0, 10, 10, 0], 255);
        let sliver = gene(&[0, 100, 0], &[0, 0, 1], 255);
        let square = gene(&[0, 10, 10, 0], &[0, 0, 10, 10], 255);
        assert!(!c.permits(&bowtie));
        assert!(!c.permits(&sliver));
        assert!(c.permits(&square));
    }

    #[test]
    fn inverted_alpha_range_is_invalid() {
        let c = MutationConstraints {
            min_alpha: Some(200),
            max_alpha: Some(100),
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }
}
