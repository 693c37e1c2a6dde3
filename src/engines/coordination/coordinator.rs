use super::observer::EngineObserver;
use super::stats::EngineStats;
use super::worker::{DoneGuard, Worker};
use crate::config::{ConfigSection, EngineConfig, StorageConfig};
use crate::data::sink::StorageWorker;
use crate::data::store::GenomeStore;
use crate::engines::evaluation::{FitnessFunction, TargetImage};
use crate::engines::generation::{CandidateFactory, Genome, MutationEngine};
use crate::engines::rendering::RendererFactory;
use crate::error::{EngineError, Result};
use crate::types::{seeded_rng, SeedStream};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    Stopping,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Stopped => "stopped",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Everything guarded by the single compare-and-replace lock
struct BestSlot {
    best: Option<Arc<Genome>>,
    mutations: u64,
    improvements: u32,
    started_at: Option<Instant>,
    storage: Option<Sender<Arc<Genome>>>,
}

impl BestSlot {
    fn stats(&self) -> EngineStats {
        EngineStats::capture(
            self.best.as_deref(),
            self.mutations,
            self.improvements,
            self.started_at.map_or(Duration::ZERO, |t| t.elapsed()),
        )
    }
}

struct ObserverList {
    observers: Vec<Box<dyn EngineObserver>>,
    last_update: Instant,
    last_notified: u32,
}

/// State the workers share with the coordinator
pub(crate) struct Shared {
    slot: Mutex<BestSlot>,
    observers: Mutex<ObserverList>,
    update_interval: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn new(update_interval: Duration) -> Self {
        Self {
            slot: Mutex::new(BestSlot {
                best: None,
                mutations: 0,
                improvements: 0,
                started_at: None,
                storage: None,
            }),
            observers: Mutex::new(ObserverList {
                observers: Vec::new(),
                last_update: Instant::now(),
                last_notified: 0,
            }),
            update_interval,
        }
    }

    pub(crate) fn best(&self) -> Option<Arc<Genome>> {
        lock(&self.slot).best.clone()
    }

    fn stats(&self) -> EngineStats {
        lock(&self.slot).stats()
    }

    /// The only place the best genome changes.
    ///
    /// Acceptance, the counters, and the storage enqueue all happen under one
    /// lock, so the held fitness can never go up and the sink sees accepted
    /// genomes in acceptance order.
    pub(crate) fn submit(&self, candidate: Genome, force: bool) -> Arc<Genome> {
        let (current, improved) = {
            let mut slot = lock(&self.slot);
            slot.mutations += 1;
            // non-finite scores only get in when forced
            let accept = force
                || (candidate.fitness().is_finite()
                    && slot.best.as_ref().map_or(true, |best| candidate.fitness() < best.fitness()));
            if accept {
                slot.improvements = slot.improvements.saturating_add(1);
                let mutations = u32::try_from(slot.mutations).unwrap_or(u32::MAX);
                let accepted = Arc::new(candidate.with_counters(slot.improvements, mutations));
                slot.best = Some(Arc::clone(&accepted));
                if let Some(queue) = &slot.storage {
                    if queue.send(Arc::clone(&accepted)).is_err() {
                        log::warn!("Storage sink is gone, genome not queued");
                    }
                }
                (accepted, Some(slot.stats()))
            } else {
                match &slot.best {
                    Some(best) => (Arc::clone(best), None),
                    None => (Arc::new(candidate), None),
                }
            }
        };

        match improved {
            Some(stats) => self.notify_improved(&current, &stats),
            None => self.maybe_update(),
        }
        current
    }

    fn notify_improved(&self, best: &Arc<Genome>, stats: &EngineStats) {
        let mut list = lock(&self.observers);
        // a slower thread may arrive after a newer improvement was reported
        if best.improvements() <= list.last_notified {
            return;
        }
        list.last_notified = best.improvements();
        for observer in list.observers.iter_mut() {
            observer.improved(best, stats);
        }
        if list.last_update.elapsed() >= self.update_interval {
            list.last_update = Instant::now();
            for observer in list.observers.iter_mut() {
                observer.update(Some(best), stats);
            }
        }
    }

    fn maybe_update(&self) {
        // skip rather than wait when another thread is notifying
        let Ok(mut list) = self.observers.try_lock() else {
            return;
        };
        if list.observers.is_empty() || list.last_update.elapsed() < self.update_interval {
            return;
        }
        list.last_update = Instant::now();
        let (best, stats) = {
            let slot = lock(&self.slot);
            (slot.best.clone(), slot.stats())
        };
        for observer in list.observers.iter_mut() {
            observer.update(best.as_ref(), &stats);
        }
    }

    fn each_observer(&self, mut f: impl FnMut(&mut dyn EngineObserver)) {
        let mut list = lock(&self.observers);
        for observer in list.observers.iter_mut() {
            f(observer.as_mut());
        }
    }
}

/// Owns the canonical best genome and the threads working on it.
///
/// Collaborators are supplied with the `with_*` builders before
/// [`Coordinator::start`]; the coordinator then runs one storage thread (when
/// a store is attached) and `threads` workers until [`Coordinator::stop`].
pub struct Coordinator {
    config: EngineConfig,
    storage_config: StorageConfig,
    candidate_factory: Option<Arc<dyn CandidateFactory>>,
    mutation_engine: Option<Arc<MutationEngine>>,
    renderer_factory: Option<RendererFactory>,
    fitness: Option<Arc<FitnessFunction>>,
    target: Option<Arc<TargetImage>>,
    store: Option<Arc<dyn GenomeStore>>,
    shared: Arc<Shared>,
    state: Mutex<EngineState>,
    shutdown: Arc<AtomicBool>,
    threads: Vec<(String, JoinHandle<()>)>,
    done: Option<Receiver<String>>,
}

impl Coordinator {
    pub fn new(config: EngineConfig) -> Self {
        let update_interval = Duration::from_millis(config.update_interval_ms);
        Self {
            config,
            storage_config: StorageConfig::default(),
            candidate_factory: None,
            mutation_engine: None,
            renderer_factory: None,
            fitness: None,
            target: None,
            store: None,
            shared: Arc::new(Shared::new(update_interval)),
            state: Mutex::new(EngineState::Stopped),
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
            done: None,
        }
    }

    pub fn with_candidate_factory(mut self, factory: Arc<dyn CandidateFactory>) -> Self {
        self.candidate_factory = Some(factory);
        self
    }

    pub fn with_mutation_engine(mut self, engine: Arc<MutationEngine>) -> Self {
        self.mutation_engine = Some(engine);
        self
    }

    pub fn with_renderer_factory(mut self, factory: RendererFactory) -> Self {
        self.renderer_factory = Some(factory);
        self
    }

    pub fn with_fitness(mut self, fitness: Arc<FitnessFunction>) -> Self {
        self.fitness = Some(fitness);
        self
    }

    pub fn with_target(mut self, target: Arc<TargetImage>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn GenomeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_storage_config(mut self, config: StorageConfig) -> Self {
        self.storage_config = config;
        self
    }

    pub fn add_observer(&self, observer: Box<dyn EngineObserver>) {
        lock(&self.shared.observers).observers.push(observer);
    }

    pub fn state(&self) -> EngineState {
        *lock(&self.state)
    }

    pub fn best(&self) -> Option<Arc<Genome>> {
        self.shared.best()
    }

    pub fn stats(&self) -> EngineStats {
        self.shared.stats()
    }

    /// Offer a scored candidate; returns whatever is best afterwards
    pub fn submit(&self, candidate: Genome) -> Arc<Genome> {
        self.shared.submit(candidate, false)
    }

    /// Install `candidate` as best regardless of its fitness
    pub fn force_submit(&self, candidate: Genome) -> Arc<Genome> {
        self.shared.submit(candidate, true)
    }

    /// Seed the best slot from the store's most recent row
    pub fn resume_from_store(&self) -> Result<Option<Arc<Genome>>> {
        self.expect_state(EngineState::Stopped, "stopped engine")?;
        let store = self
            .store
            .as_ref()
            .ok_or(EngineError::MissingCollaborator("genome store"))?;
        let Some(row) = store.latest_genome()? else {
            log::info!("No stored genome to resume from");
            return Ok(None);
        };
        let genome = Arc::new(row.to_genome()?);
        let mut slot = lock(&self.shared.slot);
        slot.improvements = genome.improvements();
        slot.mutations = genome.mutations() as u64;
        slot.best = Some(Arc::clone(&genome));
        log::info!(
            "Resumed genome from {} with {} genes, fitness {:.1}",
            row.created_at,
            genome.gene_count(),
            genome.fitness()
        );
        Ok(Some(genome))
    }

    pub fn start(&mut self) -> Result<()> {
        self.expect_state(EngineState::Stopped, "stopped engine")?;
        self.config.validate()?;

        let factory = self
            .candidate_factory
            .clone()
            .ok_or(EngineError::MissingCollaborator("candidate factory"))?;
        let engine = self
            .mutation_engine
            .clone()
            .ok_or(EngineError::MissingCollaborator("mutation engine"))?;
        let renderers = self
            .renderer_factory
            .clone()
            .ok_or(EngineError::MissingCollaborator("renderer factory"))?;
        let fitness = self
            .fitness
            .clone()
            .ok_or(EngineError::MissingCollaborator("fitness function"))?;
        let target = self
            .target
            .clone()
            .ok_or(EngineError::MissingCollaborator("target image"))?;
        if renderers.dimensions() != (target.width(), target.height()) {
            let (w, h) = renderers.dimensions();
            return Err(EngineError::Configuration(format!(
                "renderer is {}x{} but the target is {}x{}",
                w,
                h,
                target.width(),
                target.height()
            )));
        }

        *lock(&self.state) = EngineState::Running;
        self.shutdown = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();
        self.done = Some(done_rx);
        lock(&self.shared.slot).started_at = Some(Instant::now());

        if let Err(e) = self.spawn_all(done_tx, factory, engine, renderers, fitness, target) {
            log::error!("Failed to start engine threads: {}", e);
            self.shutdown.store(true, Ordering::SeqCst);
            lock(&self.shared.slot).storage = None;
            self.join_threads(false);
            *lock(&self.state) = EngineState::Stopped;
            return Err(e);
        }

        log::info!(
            "Engine running with {} workers, {:?} renderer, seed {:#x}",
            self.config.threads,
            self.config.renderer,
            self.config.seed
        );
        let best = self.shared.best();
        self.shared.each_observer(|o| o.started(best.as_ref()));
        Ok(())
    }

    fn spawn_all(
        &mut self,
        done_tx: Sender<String>,
        factory: Arc<dyn CandidateFactory>,
        engine: Arc<MutationEngine>,
        renderers: RendererFactory,
        fitness: Arc<FitnessFunction>,
        target: Arc<TargetImage>,
    ) -> Result<()> {
        if let Some(store) = &self.store {
            let (queue_tx, queue_rx) = mpsc::channel();
            lock(&self.shared.slot).storage = Some(queue_tx);
            let sink = StorageWorker::new(Arc::clone(store), &self.storage_config);
            let shutdown = Arc::clone(&self.shutdown);
            let guard = DoneGuard::new("storage-sink".to_string(), done_tx.clone());
            let handle = std::thread::Builder::new()
                .name("storage-sink".to_string())
                .spawn(move || {
                    let _guard = guard;
                    sink.run(queue_rx, &shutdown);
                })?;
            self.threads.push(("storage-sink".to_string(), handle));
        }

        let mut seeds = SeedStream::new(self.config.seed);
        for id in 0..self.config.threads {
            let name = format!("worker-{}", id);
            let worker = Worker {
                id,
                shared: Arc::clone(&self.shared),
                shutdown: Arc::clone(&self.shutdown),
                factory: Arc::clone(&factory),
                engine: Arc::clone(&engine),
                renderer: renderers.create(),
                fitness: Arc::clone(&fitness),
                target: Arc::clone(&target),
                rng: seeded_rng(seeds.next_seed()),
            };
            let guard = DoneGuard::new(name.clone(), done_tx.clone());
            let handle = std::thread::Builder::new().name(name.clone()).spawn(move || {
                let _guard = guard;
                worker.run();
            })?;
            self.threads.push((name, handle));
        }
        Ok(())
    }

    /// Ask every thread to finish its current unit of work, then wait for
    /// them up to the configured timeout
    pub fn stop(&mut self) -> Result<()> {
        self.expect_state(EngineState::Running, "running engine")?;
        *lock(&self.state) = EngineState::Stopping;
        let stats = self.shared.stats();
        self.shared.each_observer(|o| o.stopping(&stats));

        self.shutdown.store(true, Ordering::SeqCst);
        lock(&self.shared.slot).storage = None;

        let timeout = Duration::from_millis(self.config.stop_timeout_ms);
        let deadline = Instant::now() + timeout;
        let mut remaining = self.threads.len();
        if let Some(done) = self.done.take() {
            while remaining > 0 {
                let wait = deadline.saturating_duration_since(Instant::now());
                match done.recv_timeout(wait) {
                    Ok(name) => {
                        log::debug!("{} finished", name);
                        remaining -= 1;
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        log::warn!("{} threads still running after {:?}", remaining, timeout);
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }
        self.join_threads(remaining == 0);

        *lock(&self.state) = EngineState::Stopped;
        let stats = self.shared.stats();
        self.shared.each_observer(|o| o.stopped(&stats));
        Ok(())
    }

    /// Join every thread once all reported done, otherwise only the finished ones
    fn join_threads(&mut self, all_done: bool) {
        for (name, handle) in self.threads.drain(..) {
            if all_done || handle.is_finished() {
                if handle.join().is_err() {
                    log::error!("{} panicked", name);
                }
            } else {
                log::warn!("Detaching {}, it did not stop in time", name);
            }
        }
    }

    fn expect_state(&self, expected: EngineState, description: &'static str) -> Result<()> {
        let actual = self.state();
        if actual != expected {
            return Err(EngineError::IllegalState {
                expected: description,
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.state() == EngineState::Running {
            if let Err(e) = self.stop() {
                log::error!("Failed to stop engine on drop: {}", e);
            }
        }
    }
}
