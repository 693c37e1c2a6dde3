pub mod cache;
pub mod engine;
pub mod fitness;
pub mod manager;
pub mod mutation;
pub mod storage;
pub mod target;
pub mod traits;

pub use cache::CacheConfig;
pub use engine::EngineConfig;
pub use fitness::FitnessConfig;
pub use manager::{AppConfig, ConfigManager};
pub use mutation::{Borders, GeneMutationWeights, GenomeMutationWeights, MutationConfig};
pub use storage::StorageConfig;
pub use target::TargetConfig;
pub use traits::ConfigSection;
