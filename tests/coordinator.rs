use polyevolve::config::{EngineConfig, FitnessConfig, MutationConfig, StorageConfig};
use polyevolve::data::{DirectoryStore, GenomeRow, GenomeStore, MemoryStore, SinkOutcome, StorageWorker};
use polyevolve::engines::coordination::{ChannelObserver, Coordinator, EngineEvent, EngineState};
use polyevolve::engines::evaluation::{FitnessFunction, TargetImage};
use polyevolve::engines::generation::{CandidateFactory, Gene, Genome, MutationEngine, RandomGenomeFactory};
use polyevolve::engines::rendering::{RendererFactory, RendererKind};
use polyevolve::error::{EngineError, Result};
use polyevolve::types::{Argb, EngineRng};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SIZE: usize = 24;

fn engine_config(threads: usize) -> EngineConfig {
    EngineConfig {
        threads,
        seed: 1234,
        renderer: RendererKind::TailCaching,
        tail_size: 4,
        stop_timeout_ms: 5_000,
        update_interval_ms: 50,
        ..EngineConfig::default()
    }
}

fn wired(threads: usize) -> Coordinator {
    let mutation = MutationConfig::default();
    let target = TargetImage::uniform(SIZE, SIZE, Argb::new(255, 200, 30, 30)).unwrap();
    Coordinator::new(engine_config(threads))
        .with_candidate_factory(Arc::new(RandomGenomeFactory::new(&mutation, SIZE, SIZE)))
        .with_mutation_engine(Arc::new(MutationEngine::new(&mutation, SIZE, SIZE).unwrap()))
        .with_renderer_factory(
            RendererFactory::new(RendererKind::TailCaching, SIZE, SIZE, Argb::WHITE).with_tail_size(4),
        )
        .with_fitness(Arc::new(FitnessFunction::new(FitnessConfig::default())))
        .with_target(Arc::new(target))
}

fn genome(fitness: f64) -> Genome {
    let gene = Gene::from_coords(&[0, 10, 5], &[0, 0, 9], Argb::new(120, 1, 2, 3)).unwrap();
    Genome::single_layer(vec![Arc::new(gene)]).unwrap().with_fitness(fitness)
}

#[test]
fn submit_keeps_the_better_genome() {
    let coordinator = Coordinator::new(engine_config(1));
    assert!(coordinator.best().is_none());

    let first = coordinator.submit(genome(100.0));
    assert_eq!(first.fitness(), 100.0);
    assert_eq!(first.improvements(), 1);

    let worse = coordinator.submit(genome(150.0));
    assert!(Arc::ptr_eq(&worse, &first));
    let tie = coordinator.submit(genome(100.0));
    assert!(Arc::ptr_eq(&tie, &first));
    let nan = coordinator.submit(genome(f64::NAN));
    assert!(Arc::ptr_eq(&nan, &first));

    let better = coordinator.submit(genome(40.0));
    assert_eq!(better.fitness(), 40.0);
    assert_eq!(better.improvements(), 2);
    assert_eq!(better.mutations(), 5);

    let forced = coordinator.force_submit(genome(500.0));
    assert_eq!(forced.fitness(), 500.0);
    let stats = coordinator.stats();
    assert_eq!(stats.improvements, 3);
    assert_eq!(stats.mutations, 6);
    assert_eq!(stats.best_fitness, Some(500.0));
}

#[test]
fn start_requires_every_collaborator() {
    let mut bare = Coordinator::new(engine_config(1));
    assert!(matches!(bare.start(), Err(EngineError::MissingCollaborator(_))));
    assert_eq!(bare.state(), EngineState::Stopped);

    let mutation = MutationConfig::default();
    let mut partial = Coordinator::new(engine_config(1))
        .with_candidate_factory(Arc::new(RandomGenomeFactory::new(&mutation, SIZE, SIZE)));
    assert!(matches!(
        partial.start(),
        Err(EngineError::MissingCollaborator("mutation engine"))
    ));
}

#[test]
fn mismatched_target_is_rejected() {
    let mut coordinator = wired(1).with_target(Arc::new(TargetImage::uniform(8, 8, Argb::BLACK).unwrap()));
    assert!(matches!(coordinator.start(), Err(EngineError::Configuration(_))));
    assert_eq!(coordinator.state(), EngineState::Stopped);
}

#[test]
fn lifecycle_transitions_are_checked() {
    let mut coordinator = wired(2);
    assert!(matches!(coordinator.stop(), Err(EngineError::IllegalState { .. })));

    coordinator.start().unwrap();
    assert_eq!(coordinator.state(), EngineState::Running);
    assert!(matches!(coordinator.start(), Err(EngineError::IllegalState { .. })));

    coordinator.stop().unwrap();
    assert_eq!(coordinator.state(), EngineState::Stopped);

    // a stopped engine can run again
    coordinator.start().unwrap();
    coordinator.stop().unwrap();
}

#[test]
fn single_worker_reports_every_improvement() {
    let mut coordinator = wired(1);
    let (tx, rx) = mpsc::channel();
    coordinator.add_observer(Box::new(ChannelObserver::new(tx)));

    coordinator.start().unwrap();
    std::thread::sleep(Duration::from_millis(300));
    coordinator.stop().unwrap();

    let events: Vec<EngineEvent> = rx.try_iter().collect();
    // workers may submit before the started hook has run
    assert!(events.iter().any(|e| matches!(e, EngineEvent::Started { .. })));
    assert!(matches!(events.last(), Some(EngineEvent::Stopped { .. })));

    let improved: Vec<Arc<Genome>> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Improved { best, .. } => Some(Arc::clone(best)),
            _ => None,
        })
        .collect();
    let stats = coordinator.stats();
    assert!(stats.improvements >= 1);
    assert_eq!(improved.len(), stats.improvements as usize);
    assert!(stats.mutations >= stats.improvements as u64);
    assert!(improved.windows(2).all(|w| w[1].fitness() < w[0].fitness()));

    let best = coordinator.best().unwrap();
    assert_eq!(Some(best.fitness()), stats.best_fitness);
}

#[test]
fn concurrent_workers_only_ever_improve() {
    let mut coordinator = wired(4);
    let (tx, rx) = mpsc::channel();
    coordinator.add_observer(Box::new(ChannelObserver::new(tx)));

    coordinator.start().unwrap();
    let mut seen = Vec::new();
    let deadline = Instant::now() + Duration::from_millis(400);
    while Instant::now() < deadline {
        if let Some(best) = coordinator.best() {
            seen.push(best.fitness());
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    coordinator.stop().unwrap();

    assert!(seen.windows(2).all(|w| w[1] <= w[0]));
    let improved: Vec<(u32, f64)> = rx
        .try_iter()
        .filter_map(|e| match e {
            EngineEvent::Improved { best, .. } => Some((best.improvements(), best.fitness())),
            _ => None,
        })
        .collect();
    assert!(!improved.is_empty());
    assert!(improved.windows(2).all(|w| w[1].0 > w[0].0 && w[1].1 < w[0].1));
}

#[test]
fn sink_drops_candidates_inside_the_interval() {
    let store = Arc::new(MemoryStore::new());
    let config = StorageConfig {
        min_interval_ms: 1_000,
        ..StorageConfig::default()
    };
    let mut sink = StorageWorker::new(store.clone(), &config);
    let t0 = Instant::now();

    assert_eq!(sink.offer(&genome(90.0), t0), SinkOutcome::Persisted);
    assert_eq!(sink.offer(&genome(80.0), t0 + Duration::from_millis(500)), SinkOutcome::Dropped);
    assert_eq!(sink.offer(&genome(70.0), t0 + Duration::from_millis(999)), SinkOutcome::Dropped);
    assert_eq!(sink.offer(&genome(60.0), t0 + Duration::from_millis(1_000)), SinkOutcome::Persisted);

    assert_eq!((sink.persisted(), sink.dropped(), sink.failed()), (2, 2, 0));
    let fitness: Vec<f64> = store.rows().iter().map(|r| r.fitness).collect();
    assert_eq!(fitness, vec![90.0, 60.0]);
}

#[test]
fn running_engine_persists_its_first_improvement() {
    let store = Arc::new(MemoryStore::new());
    let mut coordinator = wired(2).with_store(store.clone()).with_storage_config(StorageConfig {
        min_interval_ms: 60_000,
        poll_ms: 10,
        ..StorageConfig::default()
    });
    coordinator.start().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    coordinator.stop().unwrap();

    // everything after the first write lands inside the interval
    assert_eq!(store.len(), 1);
    let row = &store.rows()[0];
    assert_eq!(row.improvements, 1);
    assert_eq!(row.to_genome().unwrap().improvements(), 1);
}

#[test]
fn resume_seeds_the_best_slot() {
    let store = Arc::new(MemoryStore::new());
    let saved = genome(12.5).with_counters(7, 300);
    store.insert_genome(&GenomeRow::from_genome(&saved).unwrap()).unwrap();

    let coordinator = Coordinator::new(engine_config(1)).with_store(store);
    let resumed = coordinator.resume_from_store().unwrap().unwrap();
    assert_eq!(*resumed, saved);

    let stats = coordinator.stats();
    assert_eq!((stats.improvements, stats.mutations), (7, 300));
    let next = coordinator.submit(genome(10.0));
    assert_eq!(next.improvements(), 8);
    assert_eq!(next.mutations(), 301);
}

#[test]
fn resume_without_a_store_is_an_error() {
    let coordinator = Coordinator::new(engine_config(1));
    assert!(matches!(
        coordinator.resume_from_store(),
        Err(EngineError::MissingCollaborator(_))
    ));
    let empty = Coordinator::new(engine_config(1)).with_store(Arc::new(MemoryStore::new()));
    assert!(empty.resume_from_store().unwrap().is_none());
}

#[test]
fn directory_store_returns_the_latest_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryStore::open(dir.path().join("genomes")).unwrap();
    assert!(store.latest_genome().unwrap().is_none());

    let older = GenomeRow::from_genome(&genome(50.0).with_counters(3, 40)).unwrap();
    let newer = GenomeRow::from_genome(&genome(20.0).with_counters(11, 90)).unwrap();
    store.insert_genome(&newer).unwrap();
    store.insert_genome(&older).unwrap();

    let latest = store.latest_genome().unwrap().unwrap();
    assert_eq!(latest.improvements, 11);
    assert_eq!(latest.mutations, 90);
    assert_eq!(latest.fitness, 20.0);
    assert_eq!(latest.payload, newer.payload);
    assert_eq!(latest.created_at.timestamp_millis(), newer.created_at.timestamp_millis());
    assert_eq!(latest.to_genome().unwrap(), genome(20.0).with_counters(11, 90));

    let leftovers: Vec<_> = std::fs::read_dir(store.directory())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |x| x == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

/// Errors on its first call, panics on its second, then behaves
struct FaultyFactory {
    inner: RandomGenomeFactory,
    calls: AtomicUsize,
}

impl CandidateFactory for FaultyFactory {
    fn create(&self, rng: &mut EngineRng) -> Result<Genome> {
        match self.calls.fetch_add(1, Ordering::SeqCst) {
            0 => Err(EngineError::InvalidGene("first candidate refused".to_string())),
            1 => panic!("second candidate exploded"),
            _ => self.inner.create(rng),
        }
    }
}

#[test]
fn worker_survives_failing_and_panicking_iterations() {
    let factory = Arc::new(FaultyFactory {
        inner: RandomGenomeFactory::new(&MutationConfig::default(), SIZE, SIZE),
        calls: AtomicUsize::new(0),
    });
    let mut coordinator = wired(1).with_candidate_factory(factory.clone());

    coordinator.start().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while coordinator.stats().improvements < 2 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    coordinator.stop().unwrap();

    assert!(factory.calls.load(Ordering::SeqCst) >= 3);
    assert!(coordinator.stats().improvements >= 2);
    assert_eq!(coordinator.state(), EngineState::Stopped);
}

/// Refuses the first insert, then stores like `MemoryStore`
struct FlakyStore {
    failed_once: AtomicBool,
    rows: MemoryStore,
}

impl GenomeStore for FlakyStore {
    fn insert_genome(&self, row: &GenomeRow) -> Result<()> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(EngineError::Storage("disk unavailable".to_string()));
        }
        self.rows.insert_genome(row)
    }

    fn latest_genome(&self) -> Result<Option<GenomeRow>> {
        self.rows.latest_genome()
    }
}

#[test]
fn failed_write_does_not_start_the_interval() {
    let store = Arc::new(FlakyStore {
        failed_once: AtomicBool::new(false),
        rows: MemoryStore::new(),
    });
    let mut sink = StorageWorker::new(store.clone(), &StorageConfig::default());
    let now = Instant::now();

    assert_eq!(sink.offer(&genome(30.0), now), SinkOutcome::Failed);
    assert_eq!(sink.failed(), 1);
    assert_eq!(sink.offer(&genome(25.0), now), SinkOutcome::Persisted);
    assert_eq!(sink.offer(&genome(20.0), now), SinkOutcome::Dropped);

    assert_eq!((sink.persisted(), sink.dropped(), sink.failed()), (1, 1, 1));
    assert_eq!(store.latest_genome().unwrap().unwrap().fitness, 25.0);
}

#[test]
fn non_finite_fitness_never_takes_the_slot_unforced() {
    let coordinator = Coordinator::new(engine_config(1));
    let nan = coordinator.submit(genome(f64::NAN));
    assert!(nan.fitness().is_nan());
    assert!(coordinator.best().is_none());
    coordinator.submit(genome(f64::INFINITY));
    assert!(coordinator.best().is_none());

    let first = coordinator.submit(genome(80.0));
    assert_eq!(first.improvements(), 1);
    assert_eq!(coordinator.submit(genome(70.0)).fitness(), 70.0);
    assert_eq!(coordinator.stats().mutations, 4);
}

#[test]
fn repeated_stops_release_every_worker() {
    let factory = Arc::new(RandomGenomeFactory::new(&MutationConfig::default(), SIZE, SIZE));
    let mut coordinator = wired(4).with_candidate_factory(factory.clone());
    for _ in 0..5 {
        coordinator.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        coordinator.stop().unwrap();
        // the coordinator keeps one handle, joined workers hold none
        assert_eq!(Arc::strong_count(&factory), 2);
    }
}
