use super::traits::{invalid, ConfigSection};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Age at which a provisional entry is judged
    pub maturity_ms: u64,
    /// Durable entries untouched this long are evicted
    pub idle_ms: u64,
    /// A maturing entry must have been touched this recently to be promoted
    pub recent_touch_ms: u64,
    pub tick_ms: u64,
    /// Observations drained per wake-up before servicing again
    pub drain_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            maturity_ms: 5_000,
            idle_ms: 5_000,
            recent_touch_ms: 100,
            tick_ms: 250,
            drain_batch: 1_024,
        }
    }
}

impl ConfigSection for CacheConfig {
    fn section_name() -> &'static str {
        "cache"
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.tick_ms == 0 {
            return Err(invalid::<Self>("tick_ms must be positive"));
        }
        if self.drain_batch == 0 {
            return Err(invalid::<Self>("drain_batch must be positive"));
        }
        Ok(())
    }
}
