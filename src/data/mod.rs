pub mod cache;
pub mod codec;
pub mod raw;
pub mod sink;
pub mod store;

pub use cache::{CacheEntry, CacheHandle, CacheMaintainer, CacheStats, PolygonCache, PolygonCacheService};
pub use raw::{RawGene, RawGenome};
pub use sink::{SinkOutcome, StorageWorker};
pub use store::{DirectoryStore, GenomeRow, GenomeStore, MemoryStore};
