pub mod constraints;
pub mod factory;
pub mod gene;
pub mod genome;
pub mod mutation_engine;
pub mod operators;
pub mod selectors;
pub mod table;

pub use constraints::MutationConstraints;
pub use factory::{CandidateFactory, GeneGenerator, RandomGenomeFactory};
pub use gene::Gene;
pub use genome::{Genome, Layer};
pub use mutation_engine::{MutationChoice, MutationEngine};
pub use operators::{apply_gene_mutation, GeneMutation, GeneMutationParams, GenomeMutation};
pub use selectors::IndexSelector;
pub use table::WeightedTable;
