use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<(), EngineError>;
}

/// Shorthand for a section-scoped configuration error
pub(crate) fn invalid<S: ConfigSection>(message: &str) -> EngineError {
    EngineError::Configuration(format!("[{}] {}", S::section_name(), message))
}
