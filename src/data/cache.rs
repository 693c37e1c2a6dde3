//! Background cache of rendered single-gene sprites.
//!
//! Renderers report every genome they draw; a single maintenance thread
//! tracks which genes keep showing up. Genes that are still being seen once
//! they reach maturity get rasterized once and promoted into the durable map,
//! which workers read concurrently. Short-lived genes are discarded without
//! ever being rendered, and durable entries nobody reads any more are evicted.
//!
//! Touch-on-read and evict-on-idle are not one transaction: a reader may use
//! an entry at the same moment it is being evicted. That is a stale hit on an
//! immutable sprite, never a torn one.
use crate::config::CacheConfig;
use crate::engines::generation::{Gene, Genome};
use crate::engines::rendering::Sprite;
use crate::error::{EngineError, Result};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// A promoted gene and its pre-rendered footprint
#[derive(Debug)]
pub struct CacheEntry {
    sprite: Arc<Sprite>,
    created_ms: u64,
    touched_ms: AtomicU64,
}

impl CacheEntry {
    fn new(sprite: Sprite, now_ms: u64) -> Self {
        Self {
            sprite: Arc::new(sprite),
            created_ms: now_ms,
            touched_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn sprite(&self) -> &Arc<Sprite> {
        &self.sprite
    }

    pub fn created_ms(&self) -> u64 {
        self.created_ms
    }

    pub fn touched_ms(&self) -> u64 {
        self.touched_ms.load(Ordering::Relaxed)
    }

    fn touch(&self, now_ms: u64) {
        self.touched_ms.fetch_max(now_ms, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub promotions: u64,
    pub discards: u64,
    pub evictions: u64,
    pub durable_len: usize,
    pub provisional_len: usize,
}

/// The shared, read-mostly half of the cache
#[derive(Debug)]
pub struct PolygonCache {
    durable: DashMap<Arc<Gene>, Arc<CacheEntry>>,
    epoch: Instant,
    width: usize,
    height: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    promotions: AtomicU64,
    discards: AtomicU64,
    evictions: AtomicU64,
    provisional_len: AtomicUsize,
}

impl PolygonCache {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            durable: DashMap::new(),
            epoch: Instant::now(),
            width,
            height,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            discards: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            provisional_len: AtomicUsize::new(0),
        }
    }

    /// Milliseconds since the cache was created
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub fn lookup(&self, gene: &Gene) -> Option<Arc<Sprite>> {
        self.lookup_at(gene, self.now_ms())
    }

    /// Durable lookup; a hit refreshes the entry's touch time
    pub fn lookup_at(&self, gene: &Gene, now_ms: u64) -> Option<Arc<Sprite>> {
        match self.durable.get(gene) {
            Some(entry) => {
                entry.touch(now_ms);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(entry.sprite()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn contains(&self, gene: &Gene) -> bool {
        self.durable.contains_key(gene)
    }

    pub fn entry(&self, gene: &Gene) -> Option<Arc<CacheEntry>> {
        self.durable.get(gene).map(|e| Arc::clone(e.value()))
    }

    pub fn len(&self) -> usize {
        self.durable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durable.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            durable_len: self.durable.len(),
            provisional_len: self.provisional_len.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Provisional {
    created_ms: u64,
    touched_ms: u64,
}

/// Single-writer side of the cache. Owns the provisional map.
///
/// Time is passed in explicitly so the lifecycle can be driven step by step.
pub struct CacheMaintainer {
    cache: Arc<PolygonCache>,
    provisional: HashMap<Arc<Gene>, Provisional>,
    config: CacheConfig,
}

impl CacheMaintainer {
    pub fn new(cache: Arc<PolygonCache>, config: CacheConfig) -> Self {
        Self {
            cache,
            provisional: HashMap::new(),
            config,
        }
    }

    pub fn cache(&self) -> &Arc<PolygonCache> {
        &self.cache
    }

    pub fn provisional_len(&self) -> usize {
        self.provisional.len()
    }

    pub fn is_provisional(&self, gene: &Gene) -> bool {
        self.provisional.contains_key(gene)
    }

    /// Record that every gene of `genome` was just drawn
    pub fn observe_at(&mut self, genome: &Genome, now_ms: u64) {
        for gene in genome.genes() {
            if let Some(entry) = self.cache.durable.get(&**gene) {
                entry.touch(now_ms);
                continue;
            }
            self.provisional
                .entry(Arc::clone(gene))
                .and_modify(|p| p.touched_ms = p.touched_ms.max(now_ms))
                .or_insert(Provisional {
                    created_ms: now_ms,
                    touched_ms: now_ms,
                });
        }
        self.publish_len();
    }

    /// Judge mature provisional entries and evict idle durable ones
    pub fn service_at(&mut self, now_ms: u64) {
        let (width, height) = (self.cache.width, self.cache.height);
        let maturity = self.config.maturity_ms;
        let recent = self.config.recent_touch_ms;

        let mature: Vec<Arc<Gene>> = self
            .provisional
            .iter()
            .filter(|(_, p)| now_ms.saturating_sub(p.created_ms) >= maturity)
            .map(|(gene, _)| Arc::clone(gene))
            .collect();

        let (mut promoted, mut discarded) = (0u64, 0u64);
        for gene in mature {
            let Some(p) = self.provisional.remove(&gene) else {
                continue;
            };
            if now_ms.saturating_sub(p.touched_ms) <= recent {
                let sprite = Sprite::rasterize(&gene, width, height);
                self.cache
                    .durable
                    .insert(gene, Arc::new(CacheEntry::new(sprite, now_ms)));
                promoted += 1;
            } else {
                discarded += 1;
            }
        }

        let idle = self.config.idle_ms;
        let before = self.cache.durable.len();
        self.cache
            .durable
            .retain(|_, entry| now_ms.saturating_sub(entry.touched_ms()) <= idle);
        let evicted = before.saturating_sub(self.cache.durable.len()) as u64;

        self.cache.promotions.fetch_add(promoted, Ordering::Relaxed);
        self.cache.discards.fetch_add(discarded, Ordering::Relaxed);
        self.cache.evictions.fetch_add(evicted, Ordering::Relaxed);
        self.publish_len();

        if promoted + discarded + evicted > 0 {
            log::debug!(
                "Polygon cache: +{} promoted, {} discarded, {} evicted ({} durable, {} provisional)",
                promoted,
                discarded,
                evicted,
                self.cache.durable.len(),
                self.provisional.len()
            );
        }
    }

    fn publish_len(&self) {
        self.cache
            .provisional_len
            .store(self.provisional.len(), Ordering::Relaxed);
    }
}

/// What renderers hold: read access plus a non-blocking observation queue
#[derive(Clone)]
pub struct CacheHandle {
    cache: Arc<PolygonCache>,
    observations: Sender<Genome>,
}

impl CacheHandle {
    pub fn get(&self, gene: &Gene) -> Option<Arc<Sprite>> {
        self.cache.lookup(gene)
    }

    pub fn observe(&self, genome: &Genome) {
        // a stopped service simply stops learning
        let _ = self.observations.send(genome.clone());
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Owns the maintenance thread
pub struct PolygonCacheService {
    cache: Arc<PolygonCache>,
    observations: Sender<Genome>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PolygonCacheService {
    pub fn start(config: CacheConfig, width: usize, height: usize) -> Result<Self> {
        let cache = Arc::new(PolygonCache::new(width, height));
        let (tx, rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));

        let maintainer = CacheMaintainer::new(Arc::clone(&cache), config);
        let flag = Arc::clone(&shutdown);
        let thread = std::thread::Builder::new()
            .name("polygon-cache".to_string())
            .spawn(move || run_maintainer(maintainer, rx, flag))?;

        log::info!("Polygon cache started for {}x{} canvas", width, height);
        Ok(Self {
            cache,
            observations: tx,
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> CacheHandle {
        CacheHandle {
            cache: Arc::clone(&self.cache),
            observations: self.observations.clone(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stop the maintenance thread, waiting at most `timeout`
    pub fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                log::warn!("Polygon cache thread did not stop within {:?}", timeout);
                return Err(EngineError::IllegalState {
                    expected: "polygon cache thread stopped",
                    actual: "still running after timeout".to_string(),
                });
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        if thread.join().is_err() {
            log::error!("Polygon cache thread panicked");
        }
        log::info!("Polygon cache stopped: {:?}", self.cache.stats());
        Ok(())
    }
}

impl Drop for PolygonCacheService {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_maintainer(mut maintainer: CacheMaintainer, rx: Receiver<Genome>, shutdown: Arc<AtomicBool>) {
    let tick = Duration::from_millis(maintainer.config.tick_ms);
    let batch = maintainer.config.drain_batch;
    let mut next_tick = Instant::now() + tick;

    while !shutdown.load(Ordering::SeqCst) {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(genome) => {
                let now = maintainer.cache.now_ms();
                maintainer.observe_at(&genome, now);
                for _ in 1..batch {
                    match rx.try_recv() {
                        Ok(genome) => maintainer.observe_at(&genome, now),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => return,
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if Instant::now() >= next_tick {
            let now = maintainer.cache.now_ms();
            maintainer.service_at(now);
            next_tick = Instant::now() + tick;
        }
    }
}
