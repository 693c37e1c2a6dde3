use super::coordinator::Shared;
use crate::engines::evaluation::{FitnessFunction, TargetImage};
use crate::engines::generation::{CandidateFactory, Genome, MutationEngine};
use crate::engines::rendering::Renderer;
use crate::error::Result;
use crate::types::EngineRng;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Reports a thread's exit to the coordinator, including exit by panic
pub(crate) struct DoneGuard {
    name: String,
    done: Sender<String>,
}

impl DoneGuard {
    pub(crate) fn new(name: String, done: Sender<String>) -> Self {
        Self { name, done }
    }
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.done.send(std::mem::take(&mut self.name));
    }
}

/// One mutate, render, score, submit loop with private RNG and renderer
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) shared: Arc<Shared>,
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) factory: Arc<dyn CandidateFactory>,
    pub(crate) engine: Arc<MutationEngine>,
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) fitness: Arc<FitnessFunction>,
    pub(crate) target: Arc<TargetImage>,
    pub(crate) rng: EngineRng,
}

impl Worker {
    pub(crate) fn run(mut self) {
        log::debug!("Worker {} started", self.id);
        let mut reference = self.shared.best();
        let mut iterations = 0u64;

        while !self.shutdown.load(Ordering::Relaxed) {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.iterate(reference.clone())));
            match outcome {
                Ok(Ok(Some(next))) => {
                    reference = Some(next);
                    iterations += 1;
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    log::warn!("Worker {} iteration failed: {}", self.id, e);
                    reference = self.shared.best();
                }
                Err(_) => {
                    log::error!("Worker {} iteration panicked, continuing", self.id);
                    reference = self.shared.best();
                }
            }
        }
        log::debug!("Worker {} stopped after {} iterations", self.id, iterations);
    }

    /// `Ok(None)` when shutdown interrupted the search for a changed candidate
    fn iterate(&mut self, reference: Option<Arc<Genome>>) -> Result<Option<Arc<Genome>>> {
        let candidate = match reference.or_else(|| self.shared.best()) {
            None => self.factory.create(&mut self.rng)?,
            Some(parent) => match self.changed_candidate(&parent) {
                Some(candidate) => candidate,
                None => return Ok(None),
            },
        };

        let canvas = self.renderer.render(&candidate);
        let fitness = self.fitness.evaluate(&candidate, canvas, &self.target)?;
        Ok(Some(self.shared.submit(candidate.with_fitness(fitness), false)))
    }

    /// Mutate until the result differs structurally from `parent`
    fn changed_candidate(&mut self, parent: &Genome) -> Option<Genome> {
        while !self.shutdown.load(Ordering::Relaxed) {
            let candidate = self.engine.mutate(parent, &mut self.rng);
            if !candidate.shares_genes_with(parent) {
                return Some(candidate);
            }
        }
        None
    }
}
