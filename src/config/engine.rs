use super::traits::{invalid, ConfigSection};
use crate::engines::rendering::RendererKind;
use crate::error::EngineError;
use crate::types::Argb;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub threads: usize,
    pub seed: u64,
    pub background: Argb,
    pub renderer: RendererKind,
    /// Genes re-rendered on every call by the tail-caching renderer
    pub tail_size: usize,
    pub stop_timeout_ms: u64,
    /// Minimum spacing of periodic `update` notifications
    pub update_interval_ms: u64,
    /// Wall-clock budget for the binary, 0 runs until killed
    pub run_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            seed: 0x5EED_CAFE,
            background: Argb::WHITE,
            renderer: RendererKind::TailCaching,
            tail_size: 8,
            stop_timeout_ms: 5_000,
            update_interval_ms: 1_000,
            run_seconds: 0,
        }
    }
}

impl ConfigSection for EngineConfig {
    fn section_name() -> &'static str {
        "engine"
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.threads == 0 {
            return Err(invalid::<Self>("threads must be at least 1"));
        }
        if self.threads > 1024 {
            return Err(invalid::<Self>("threads must be at most 1024"));
        }
        if self.renderer == RendererKind::TailCaching && self.tail_size == 0 {
            return Err(invalid::<Self>("tail_size must be at least 1 for the tail-caching renderer"));
        }
        Ok(())
    }
}
