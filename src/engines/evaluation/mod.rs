pub mod fitness;
pub mod target;

pub use fitness::FitnessFunction;
pub use target::TargetImage;
