use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported {kind} version: {version}")]
    UnsupportedVersion { kind: &'static str, version: u8 },

    #[error("Truncated {kind}: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        kind: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid gene: {0}")]
    InvalidGene(String),

    #[error("Invalid genome: {0}")]
    InvalidGenome(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Configuration is frozen while the engine is running")]
    FrozenConfiguration,

    #[error("Illegal state: expected {expected}, was {actual}")]
    IllegalState { expected: &'static str, actual: String },

    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
