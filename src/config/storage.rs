use super::traits::{invalid, ConfigSection};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub directory: PathBuf,
    /// Candidates arriving sooner than this after the last write are dropped
    pub min_interval_ms: u64,
    /// Queue poll timeout, bounds how long shutdown waits on an idle sink
    pub poll_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("genomes"),
            min_interval_ms: 10_000,
            poll_ms: 200,
        }
    }
}

impl ConfigSection for StorageConfig {
    fn section_name() -> &'static str {
        "storage"
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.poll_ms == 0 {
            return Err(invalid::<Self>("poll_ms must be positive"));
        }
        if self.directory.as_os_str().is_empty() {
            return Err(invalid::<Self>("directory must not be empty"));
        }
        Ok(())
    }
}
