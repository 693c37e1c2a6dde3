use crate::config::StorageConfig;
use crate::data::store::{GenomeRow, GenomeStore};
use crate::engines::generation::Genome;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    Persisted,
    /// Arrived within the minimum interval of the last write
    Dropped,
    Failed,
}

/// Rate-limited consumer of accepted genomes.
///
/// A genome arriving less than `min_interval` after the last successful
/// write is dropped rather than queued, so at most one row per interval
/// reaches the store.
pub struct StorageWorker {
    store: Arc<dyn GenomeStore>,
    min_interval: Duration,
    poll: Duration,
    last_persist: Option<Instant>,
    persisted: u64,
    dropped: u64,
    failed: u64,
}

impl StorageWorker {
    pub fn new(store: Arc<dyn GenomeStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            min_interval: Duration::from_millis(config.min_interval_ms),
            poll: Duration::from_millis(config.poll_ms),
            last_persist: None,
            persisted: 0,
            dropped: 0,
            failed: 0,
        }
    }

    pub fn offer(&mut self, genome: &Genome, now: Instant) -> SinkOutcome {
        if let Some(last) = self.last_persist {
            if now.saturating_duration_since(last) < self.min_interval {
                self.dropped += 1;
                return SinkOutcome::Dropped;
            }
        }
        let result = GenomeRow::from_genome(genome).and_then(|row| self.store.insert_genome(&row));
        match result {
            Ok(()) => {
                self.last_persist = Some(now);
                self.persisted += 1;
                log::debug!(
                    "Persisted genome with fitness {:.1} after {} improvements",
                    genome.fitness(),
                    genome.improvements()
                );
                SinkOutcome::Persisted
            }
            Err(e) => {
                self.failed += 1;
                log::error!("Failed to persist genome: {}", e);
                SinkOutcome::Failed
            }
        }
    }

    pub fn persisted(&self) -> u64 {
        self.persisted
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Drain `queue` until shutdown is flagged or every sender is gone
    pub fn run(mut self, queue: Receiver<Arc<Genome>>, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::SeqCst) {
            match queue.recv_timeout(self.poll) {
                Ok(genome) => {
                    self.offer(&genome, Instant::now());
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::info!(
            "Storage sink finished: {} persisted, {} dropped, {} failed",
            self.persisted,
            self.dropped,
            self.failed
        );
    }
}
