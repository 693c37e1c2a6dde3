pub mod coordination;
pub mod evaluation;
pub mod generation;
pub mod rendering;
