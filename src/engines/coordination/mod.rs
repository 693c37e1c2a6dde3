pub mod coordinator;
pub mod observer;
pub mod stats;
mod worker;

pub use coordinator::{Coordinator, EngineState};
pub use observer::{ChannelObserver, EngineEvent, EngineObserver, LoggingObserver};
pub use stats::EngineStats;
