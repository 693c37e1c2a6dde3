use super::traits::{invalid, ConfigSection};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub image: PathBuf,
    /// Greyscale map, darker pixels matter more
    pub importance: Option<PathBuf>,
}

impl ConfigSection for TargetConfig {
    fn section_name() -> &'static str {
        "target"
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.importance.is_some() && self.image.as_os_str().is_empty() {
            return Err(invalid::<Self>("importance map given without a target image"));
        }
        Ok(())
    }
}
