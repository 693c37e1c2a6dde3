use crate::engines::generation::Genome;
use serde::Serialize;
use std::time::Duration;

/// Snapshot of engine progress handed to observers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStats {
    pub mutations: u64,
    pub improvements: u32,
    pub best_fitness: Option<f64>,
    pub gene_count: usize,
    pub vertex_count: usize,
    pub layer_count: usize,
    pub elapsed_ms: u64,
    pub mutations_per_second: f64,
}

impl EngineStats {
    pub(crate) fn capture(best: Option<&Genome>, mutations: u64, improvements: u32, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        Self {
            mutations,
            improvements,
            best_fitness: best.map(Genome::fitness),
            gene_count: best.map_or(0, Genome::gene_count),
            vertex_count: best.map_or(0, Genome::vertex_count),
            layer_count: best.map_or(0, Genome::layer_count),
            elapsed_ms: elapsed.as_millis() as u64,
            mutations_per_second: if secs > 0.0 { mutations as f64 / secs } else { 0.0 },
        }
    }
}
