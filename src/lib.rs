pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod types;

pub use engines::coordination::{Coordinator, EngineState};
pub use engines::generation::{Gene, Genome, MutationEngine};
pub use error::{EngineError, Result};
