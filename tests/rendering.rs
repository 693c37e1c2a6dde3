use polyevolve::config::{CacheConfig, MutationConfig};
use polyevolve::data::PolygonCacheService;
use polyevolve::engines::generation::{CandidateFactory, Gene, Genome, MutationEngine, RandomGenomeFactory};
use polyevolve::engines::rendering::{
    render_once, BaseRenderer, GenePainter, LayerCachingRenderer, Renderer, RendererFactory, RendererKind,
    TailCachingRenderer,
};
use polyevolve::types::{seeded_rng, Argb};
use std::sync::Arc;
use std::time::Duration;

const W: usize = 48;
const H: usize = 40;
const BG: Argb = Argb::new(255, 250, 245, 240);

fn mutation_config() -> MutationConfig {
    MutationConfig {
        layer_size: 6,
        new_gene_vertices: 4,
        ..MutationConfig::default()
    }
}

/// A chain of genomes as the search would produce them, sharing genes
fn lineage(steps: usize, seed: u64) -> Vec<Genome> {
    let config = mutation_config();
    let factory = RandomGenomeFactory::new(&config, W, H).with_initial_genes(5);
    let engine = MutationEngine::new(&config, W, H).unwrap();
    let mut rng = seeded_rng(seed);
    let mut current = factory.create(&mut rng).unwrap();
    let mut out = vec![current.clone()];
    for _ in 0..steps {
        current = engine.mutate(&current, &mut rng);
        out.push(current.clone());
    }
    out
}

fn all_renderers(painter: GenePainter) -> Vec<(&'static str, Box<dyn Renderer>)> {
    vec![
        ("base", Box::new(BaseRenderer::new(W, H, BG, painter.clone()))),
        ("tail", Box::new(TailCachingRenderer::new(W, H, BG, 3, painter.clone()))),
        ("tail-1", Box::new(TailCachingRenderer::new(W, H, BG, 1, painter.clone()))),
        ("layer", Box::new(LayerCachingRenderer::new(W, H, BG, painter))),
    ]
}

#[test]
fn caching_renderers_match_base_renderer() {
    let genomes = lineage(300, 17);
    assert!(genomes.last().unwrap().layer_count() > 1, "lineage should grow past one layer");

    let mut renderers = all_renderers(GenePainter::direct());
    for (step, genome) in genomes.iter().enumerate() {
        let expected = render_once(genome, W, H, BG);
        for (name, renderer) in renderers.iter_mut() {
            let canvas = renderer.render(genome);
            assert!(
                canvas.pixels() == expected.pixels(),
                "{} renderer diverged at step {}",
                name,
                step
            );
        }
    }
}

#[test]
fn tail_prefix_grows_and_rebuilds_on_change() {
    let genes: Vec<Arc<Gene>> = (0..6)
        .map(|i| {
            Arc::new(
                Gene::from_coords(&[i * 5, i * 5 + 20, i * 5 + 8], &[2, 10, 30], Argb::new(120, 40 * i as u8, 90, 200))
                    .unwrap(),
            )
        })
        .collect();
    let mut renderer = TailCachingRenderer::new(W, H, BG, 2, GenePainter::direct());

    let small = Genome::single_layer(genes[..3].to_vec()).unwrap();
    renderer.render(&small);
    assert_eq!(renderer.cached_prefix_len(), 1);

    let large = Genome::single_layer(genes.clone()).unwrap();
    renderer.render(&large);
    assert_eq!(renderer.cached_prefix_len(), 4);
    assert_eq!(renderer.rebuilds(), 0);

    // swapping the first gene invalidates the prefix
    let mut swapped = genes.clone();
    swapped.swap(0, 1);
    let changed = Genome::single_layer(swapped).unwrap();
    let canvas = renderer.render(&changed).pixels().to_vec();
    assert_eq!(renderer.rebuilds(), 1);
    assert_eq!(canvas, render_once(&changed, W, H, BG).pixels());
}

#[test]
fn layer_cache_keeps_frozen_layers() {
    let genomes = lineage(200, 5);
    let layered = genomes.iter().rev().find(|g| g.layer_count() >= 3).cloned();
    let Some(genome) = layered else {
        return;
    };
    let mut renderer = LayerCachingRenderer::new(W, H, BG, GenePainter::direct());
    renderer.render(&genome);
    assert_eq!(renderer.cached_layers(), genome.layer_count() - 1);
}

#[test]
fn renderers_through_polygon_cache_stay_identical() {
    let cache_config = CacheConfig {
        maturity_ms: 0,
        recent_touch_ms: 1_000,
        idle_ms: 60_000,
        tick_ms: 1,
        ..CacheConfig::default()
    };
    let mut service = PolygonCacheService::start(cache_config, W, H).unwrap();
    let genomes = lineage(150, 99);

    let mut renderers = all_renderers(GenePainter::cached(service.handle()));
    for _pass in 0..2 {
        for genome in &genomes {
            let expected = render_once(genome, W, H, BG);
            for (name, renderer) in renderers.iter_mut() {
                assert!(
                    renderer.render(genome).pixels() == expected.pixels(),
                    "{} renderer diverged with the polygon cache attached",
                    name
                );
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let stats = service.stats();
    assert!(stats.promotions > 0, "expected some promotions, got {:?}", stats);
    assert!(stats.hits > 0, "expected cache hits, got {:?}", stats);
    service.shutdown(Duration::from_secs(5)).unwrap();
}

#[test]
fn factory_builds_requested_renderer() {
    let genome = lineage(20, 3).pop().unwrap();
    let expected = render_once(&genome, W, H, BG);
    for kind in [RendererKind::Base, RendererKind::TailCaching, RendererKind::LayerCaching] {
        let factory = RendererFactory::new(kind, W, H, BG).with_tail_size(2);
        assert_eq!(factory.kind(), kind);
        assert_eq!(factory.dimensions(), (W, H));
        let mut renderer = factory.create();
        assert!(renderer.render(&genome).pixels() == expected.pixels());
    }
}
