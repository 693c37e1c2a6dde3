use super::traits::{invalid, ConfigSection};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Relative error inflation per gene
    pub gene_penalty: f64,
    /// Relative error inflation per vertex
    pub vertex_penalty: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            gene_penalty: 1e-4,
            vertex_penalty: 1e-5,
        }
    }
}

impl ConfigSection for FitnessConfig {
    fn section_name() -> &'static str {
        "fitness"
    }

    fn validate(&self) -> Result<(), EngineError> {
        if !(self.gene_penalty >= 0.0) || !(self.vertex_penalty >= 0.0) {
            return Err(invalid::<Self>("penalties must be non-negative"));
        }
        Ok(())
    }
}
