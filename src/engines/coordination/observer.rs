use super::stats::EngineStats;
use crate::engines::generation::Genome;
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Hooks invoked synchronously by the coordinator.
///
/// `improved` and `update` run on whichever worker thread triggered them,
/// so implementations should return quickly.
pub trait EngineObserver: Send {
    fn started(&mut self, _best: Option<&Arc<Genome>>) {}
    fn improved(&mut self, _best: &Arc<Genome>, _stats: &EngineStats) {}
    fn update(&mut self, _best: Option<&Arc<Genome>>, _stats: &EngineStats) {}
    fn stopping(&mut self, _stats: &EngineStats) {}
    fn stopped(&mut self, _stats: &EngineStats) {}
}

/// Reports progress through the `log` facade
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl EngineObserver for LoggingObserver {
    fn started(&mut self, best: Option<&Arc<Genome>>) {
        match best {
            Some(genome) => log::info!(
                "Engine started from genome with {} genes, fitness {:.1}",
                genome.gene_count(),
                genome.fitness()
            ),
            None => log::info!("Engine started from scratch"),
        }
    }

    fn improved(&mut self, best: &Arc<Genome>, stats: &EngineStats) {
        log::debug!(
            "Improvement {}: fitness {:.1}, {} genes in {} layers",
            stats.improvements,
            best.fitness(),
            best.gene_count(),
            best.layer_count()
        );
    }

    fn update(&mut self, _best: Option<&Arc<Genome>>, stats: &EngineStats) {
        log::info!(
            "{} mutations ({:.0}/s), {} improvements, best fitness {}",
            stats.mutations,
            stats.mutations_per_second,
            stats.improvements,
            stats
                .best_fitness
                .map_or_else(|| "n/a".to_string(), |f| format!("{:.1}", f))
        );
    }

    fn stopping(&mut self, stats: &EngineStats) {
        log::info!("Engine stopping after {} mutations", stats.mutations);
    }

    fn stopped(&mut self, stats: &EngineStats) {
        log::info!(
            "Engine stopped: {} improvements in {:.1}s",
            stats.improvements,
            stats.elapsed_ms as f64 / 1000.0
        );
    }
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Started { best: Option<Arc<Genome>> },
    Improved { best: Arc<Genome>, stats: EngineStats },
    Update { best: Option<Arc<Genome>>, stats: EngineStats },
    Stopping { stats: EngineStats },
    Stopped { stats: EngineStats },
}

/// Forwards every hook as an [`EngineEvent`], e.g. to a preview window
pub struct ChannelObserver {
    sender: Sender<EngineEvent>,
}

impl ChannelObserver {
    pub fn new(sender: Sender<EngineEvent>) -> Self {
        Self { sender }
    }
}

impl EngineObserver for ChannelObserver {
    fn started(&mut self, best: Option<&Arc<Genome>>) {
        let _ = self.sender.send(EngineEvent::Started { best: best.cloned() });
    }

    fn improved(&mut self, best: &Arc<Genome>, stats: &EngineStats) {
        let _ = self.sender.send(EngineEvent::Improved {
            best: Arc::clone(best),
            stats: stats.clone(),
        });
    }

    fn update(&mut self, best: Option<&Arc<Genome>>, stats: &EngineStats) {
        let _ = self.sender.send(EngineEvent::Update {
            best: best.cloned(),
            stats: stats.clone(),
        });
    }

    fn stopping(&mut self, stats: &EngineStats) {
        let _ = self.sender.send(EngineEvent::Stopping { stats: stats.clone() });
    }

    fn stopped(&mut self, stats: &EngineStats) {
        let _ = self.sender.send(EngineEvent::Stopped { stats: stats.clone() });
    }
}
