use polyevolve::config::CacheConfig;
use polyevolve::data::{CacheMaintainer, PolygonCache};
use polyevolve::engines::generation::{Gene, Genome};
use polyevolve::engines::rendering::{raster, Canvas, Sprite};
use polyevolve::types::Argb;
use std::sync::Arc;

const W: usize = 32;
const H: usize = 32;

fn config() -> CacheConfig {
    CacheConfig {
        maturity_ms: 5_000,
        idle_ms: 5_000,
        recent_touch_ms: 100,
        tick_ms: 50,
        ..CacheConfig::default()
    }
}

fn gene(offset: i32, alpha: u8) -> Arc<Gene> {
    Arc::new(
        Gene::from_coords(
            &[offset, offset + 12, offset + 4],
            &[1, 6, 20],
            Argb::new(alpha, 200, 30, 60),
        )
        .unwrap(),
    )
}

fn genome(genes: &[Arc<Gene>]) -> Genome {
    Genome::single_layer(genes.to_vec()).unwrap()
}

fn maintainer() -> CacheMaintainer {
    CacheMaintainer::new(Arc::new(PolygonCache::new(W, H)), config())
}

#[test]
fn gene_touched_every_tick_is_promoted_and_stays() {
    let mut m = maintainer();
    let stable = gene(2, 180);
    let g = genome(&[Arc::clone(&stable)]);

    let mut now = 0;
    while now < 5_000 {
        m.observe_at(&g, now);
        m.service_at(now);
        assert!(!m.cache().contains(&stable), "promoted too early at {}", now);
        now += 50;
    }
    m.observe_at(&g, now);
    m.service_at(now);
    assert!(m.cache().contains(&stable));
    assert!(!m.is_provisional(&stable));

    // still in use, so it survives well past the idle threshold
    for _ in 0..400 {
        now += 50;
        m.observe_at(&g, now);
        m.service_at(now);
    }
    assert!(m.cache().contains(&stable));
    assert_eq!(m.cache().stats().promotions, 1);
}

#[test]
fn gene_seen_once_is_discarded_not_promoted() {
    let mut m = maintainer();
    let fleeting = gene(5, 90);
    m.observe_at(&genome(&[Arc::clone(&fleeting)]), 0);
    assert!(m.is_provisional(&fleeting));

    m.service_at(4_999);
    assert!(m.is_provisional(&fleeting));

    m.service_at(5_000);
    assert!(!m.is_provisional(&fleeting));
    assert!(!m.cache().contains(&fleeting));
    let stats = m.cache().stats();
    assert_eq!(stats.discards, 1);
    assert_eq!(stats.promotions, 0);
}

#[test]
fn idle_durable_entry_is_evicted() {
    let mut m = maintainer();
    let g = gene(3, 255);
    let observed = genome(&[Arc::clone(&g)]);
    m.observe_at(&observed, 0);
    m.observe_at(&observed, 5_000);
    m.service_at(5_000);
    assert!(m.cache().contains(&g));

    // exactly at the idle threshold it is kept
    m.service_at(10_000);
    assert!(m.cache().contains(&g));

    m.service_at(10_001);
    assert!(!m.cache().contains(&g));
    assert_eq!(m.cache().stats().evictions, 1);
}

#[test]
fn lookups_touch_and_keep_entries_alive() {
    let mut m = maintainer();
    let g = gene(4, 200);
    let observed = genome(&[Arc::clone(&g)]);
    m.observe_at(&observed, 0);
    m.observe_at(&observed, 5_000);
    m.service_at(5_000);

    let cache = Arc::clone(m.cache());
    assert!(cache.lookup_at(&g, 9_000).is_some());
    m.service_at(13_000);
    assert!(cache.contains(&g), "touched at 9000, idle only 4000");

    m.service_at(14_001);
    assert!(cache.lookup_at(&g, 14_002).is_none());

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[test]
fn lookup_by_equal_gene_hits_the_same_entry() {
    let mut m = maintainer();
    let g = gene(6, 120);
    let observed = genome(&[Arc::clone(&g)]);
    m.observe_at(&observed, 0);
    m.observe_at(&observed, 5_000);
    m.service_at(5_000);

    // a structurally equal gene built independently
    let twin = gene(6, 120);
    assert!(!Arc::ptr_eq(&g, &twin));
    let sprite = m.cache().lookup_at(&twin, 5_001).unwrap();

    let mut via_sprite = Canvas::filled(W, H, Argb::WHITE);
    sprite.composite(&mut via_sprite);
    let mut direct = Canvas::filled(W, H, Argb::WHITE);
    raster::fill_gene(&mut direct, &g);
    assert!(via_sprite.pixels() == direct.pixels());
    assert_eq!(*sprite, Sprite::rasterize(&g, W, H));
}

#[test]
fn concurrent_reads_during_maintenance() {
    let mut m = maintainer();
    let genes: Vec<Arc<Gene>> = (0..8).map(|i| gene(i, 100 + i as u8)).collect();
    let observed = genome(&genes);
    m.observe_at(&observed, 0);
    m.observe_at(&observed, 5_000);
    m.service_at(5_000);
    let cache = Arc::clone(m.cache());

    let readers: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let genes = genes.clone();
            std::thread::spawn(move || {
                let mut hits = 0usize;
                for round in 0..2_000u64 {
                    let g = &genes[(round as usize + t) % genes.len()];
                    if cache.lookup_at(g, 5_000 + round).is_some() {
                        hits += 1;
                    }
                }
                hits
            })
        })
        .collect();

    // evict everything while readers are active
    m.service_at(100_000);
    let total: usize = readers.into_iter().map(|r| r.join().unwrap()).sum();
    assert!(total <= 8_000);
    assert!(cache.is_empty() || cache.len() <= genes.len());
}
