use crate::config::{ConfigSection, MutationConfig};
use crate::engines::generation::factory::GeneGenerator;
use crate::engines::generation::genome::Genome;
use crate::engines::generation::operators::{
    apply_gene_mutation, GeneMutation, GeneMutationParams, GenomeMutation,
};
use crate::engines::generation::selectors::IndexSelector;
use crate::engines::generation::table::WeightedTable;
use crate::error::Result;
use crate::types::EngineRng;
use rand::Rng;
use std::sync::Arc;

/// Nested choices bottom out in a concrete operator
#[derive(Debug, Clone, PartialEq)]
pub enum MutationChoice {
    Gene(GeneMutation),
    Genome(GenomeMutation),
    Table(WeightedTable<MutationChoice>),
}

impl MutationChoice {
    fn resolve(&self, rng: &mut EngineRng) -> Option<&MutationChoice> {
        let mut current = self;
        while let MutationChoice::Table(table) = current {
            current = table.pick(rng)?;
        }
        Some(current)
    }
}

/// Builds candidates from the current best genome.
///
/// Constructed once from [`MutationConfig`] and shared read-only by every
/// worker; all randomness comes from the caller's generator.
#[derive(Debug, Clone)]
pub struct MutationEngine {
    choices: MutationChoice,
    selector: IndexSelector,
    params: GeneMutationParams,
    generator: GeneGenerator,
    min_mutations: u32,
    max_mutations: u32,
    layer_size: usize,
}

impl MutationEngine {
    pub fn new(config: &MutationConfig, width: usize, height: usize) -> Result<Self> {
        config.validate()?;

        let gene_table = GeneMutation::ALL
            .iter()
            .fold(WeightedTable::new(), |t, op| t.with(op.weight(config), MutationChoice::Gene(*op)));
        let genome_table = GenomeMutation::ALL
            .iter()
            .fold(WeightedTable::new(), |t, op| t.with(op.weight(config), MutationChoice::Genome(*op)));
        let choices = MutationChoice::Table(
            WeightedTable::new()
                .with(config.gene_probability, MutationChoice::Table(gene_table))
                .with(1.0 - config.gene_probability, MutationChoice::Table(genome_table)),
        );

        Ok(Self {
            choices,
            selector: config.selector.clone(),
            params: GeneMutationParams::from_config(config, width, height)?,
            generator: GeneGenerator::new(config, width, height),
            min_mutations: config.min_mutations,
            max_mutations: config.max_mutations,
            layer_size: config.layer_size,
        })
    }

    /// Replace the operator tree, e.g. to exercise a single operator
    pub fn with_choices(mut self, choices: MutationChoice) -> Self {
        self.choices = choices;
        self
    }

    pub fn choices(&self) -> &MutationChoice {
        &self.choices
    }

    /// Apply between `min_mutations` and `max_mutations` operators in turn.
    ///
    /// Only the newest layer is touched. When every operator is rejected the
    /// result shares all gene handles with `genome` and keeps its fitness;
    /// callers detect that with [`Genome::shares_genes_with`].
    pub fn mutate(&self, genome: &Genome, rng: &mut EngineRng) -> Genome {
        let count = rng.gen_range(self.min_mutations..=self.max_mutations);
        let mut current = genome.clone();
        for _ in 0..count {
            if let Some(next) = self.mutate_once(&current, rng) {
                current = next;
            }
        }
        current
    }

    fn mutate_once(&self, genome: &Genome, rng: &mut EngineRng) -> Option<Genome> {
        match self.choices.resolve(rng)? {
            MutationChoice::Gene(op) => {
                let layer = genome.newest_layer();
                let index = self.selector.select(layer.len(), rng)?;
                let original = &layer[index];
                let mutated = apply_gene_mutation(*op, original, &self.params, rng);
                if Arc::ptr_eq(original, &mutated) {
                    return None;
                }
                let mut replaced = layer.clone();
                replaced[index] = mutated;
                genome.with_newest_layer(replaced).ok()
            }
            MutationChoice::Genome(op) => {
                op.apply(genome, &self.selector, &self.generator, self.layer_size, rng)
            }
            MutationChoice::Table(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::gene::Gene;
    use crate::types::{seeded_rng, Argb};

    fn genome_of(n: usize) -> Genome {
        let genes = (0..n as i32)
            .map(|i| Arc::new(Gene::from_coords(&[i, i + 20, i + 5], &[0, 3, 25], Argb::new(100, 1, 2, 3)).unwrap()))
            .collect();
        Genome::single_layer(genes).unwrap()
    }

    #[test]
    fn nested_tables_resolve_to_leaves() {
        let mut rng = seeded_rng(8);
        let engine = MutationEngine::new(&MutationConfig::default(), 64, 64).unwrap();
        for _ in 0..100 {
            let leaf = engine.choices().resolve(&mut rng).unwrap();
            assert!(!matches!(leaf, MutationChoice::Table(_)));
        }
    }

    #[test]
    fn layers_grow_once_full() {
        let config = MutationConfig {
            layer_size: 2,
            ..MutationConfig::default()
        };
        let engine = MutationEngine::new(&config, 64, 64)
            .unwrap()
            .with_choices(MutationChoice::Genome(GenomeMutation::AddGene));
        let mut rng = seeded_rng(21);
        let mut genome = genome_of(2);
        for _ in 0..3 {
            genome = engine.mutate(&genome, &mut rng);
        }
        assert!(genome.layer_count() >= 2);
        assert!(genome.layers().iter().all(|l| l.len() <= 2));
    }

    #[test]
    fn older_layers_are_never_touched() {
        let base = genome_of(3);
        let frozen = base.layers()[0].clone();
        let layered = base.with_new_layer(genome_of(4).layers()[0].clone()).unwrap();
        let engine = MutationEngine::new(&MutationConfig::default(), 64, 64).unwrap();
        let mut rng = seeded_rng(4);
        let mut current = layered;
        for _ in 0..200 {
            current = engine.mutate(&current, &mut rng);
            let first = &current.layers()[0];
            assert!(first.iter().zip(&frozen).all(|(a, b)| Arc::ptr_eq(a, b)));
            assert_eq!(first.len(), frozen.len());
        }
    }

    #[test]
    fn remove_gene_never_empties_the_layer() {
        let engine = MutationEngine::new(&MutationConfig::default(), 64, 64)
            .unwrap()
            .with_choices(MutationChoice::Genome(GenomeMutation::RemoveGene));
        let mut rng = seeded_rng(6);
        let genome = genome_of(1);
        let out = engine.mutate(&genome, &mut rng);
        assert!(out.shares_genes_with(&genome));
    }
}
