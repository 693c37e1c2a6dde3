use anyhow::{bail, Context};
use polyevolve::config::{AppConfig, ConfigManager, TargetConfig};
use polyevolve::data::{DirectoryStore, PolygonCacheService};
use polyevolve::engines::coordination::{Coordinator, LoggingObserver};
use polyevolve::engines::evaluation::{FitnessFunction, TargetImage};
use polyevolve::engines::generation::{MutationEngine, RandomGenomeFactory};
use polyevolve::engines::rendering::RendererFactory;
use std::sync::Arc;
use std::time::Duration;

fn load_target(config: &TargetConfig) -> anyhow::Result<TargetImage> {
    if config.image.as_os_str().is_empty() {
        bail!("no target image configured, set [target] image");
    }
    let rgba = image::open(&config.image)
        .with_context(|| format!("failed to open target image {}", config.image.display()))?
        .to_rgba8();
    let (width, height) = (rgba.width() as usize, rgba.height() as usize);
    let mut target = TargetImage::new(width, height, rgba.into_raw())?;

    if let Some(path) = &config.importance {
        let luma = image::open(path)
            .with_context(|| format!("failed to open importance map {}", path.display()))?
            .to_luma8();
        if (luma.width() as usize, luma.height() as usize) != (width, height) {
            bail!(
                "importance map is {}x{} but the target is {}x{}",
                luma.width(),
                luma.height(),
                width,
                height
            );
        }
        target = target.with_importance(luma.into_raw())?;
    }
    Ok(target)
}

fn run(config: AppConfig) -> anyhow::Result<()> {
    let target = Arc::new(load_target(&config.target)?);
    let (width, height) = (target.width(), target.height());
    log::info!("Target {} is {}x{}", config.target.image.display(), width, height);

    let mut cache = if config.cache.enabled {
        Some(PolygonCacheService::start(config.cache.clone(), width, height)?)
    } else {
        None
    };

    let mut renderers = RendererFactory::new(config.engine.renderer, width, height, config.engine.background)
        .with_tail_size(config.engine.tail_size);
    if let Some(service) = &cache {
        renderers = renderers.with_cache(service.handle());
    }

    let store = DirectoryStore::open(&config.storage.directory)
        .with_context(|| format!("failed to open store {}", config.storage.directory.display()))?;

    let mut coordinator = Coordinator::new(config.engine.clone())
        .with_candidate_factory(Arc::new(RandomGenomeFactory::new(&config.mutation, width, height)))
        .with_mutation_engine(Arc::new(MutationEngine::new(&config.mutation, width, height)?))
        .with_renderer_factory(renderers)
        .with_fitness(Arc::new(FitnessFunction::new(config.fitness.clone())))
        .with_target(target)
        .with_store(Arc::new(store))
        .with_storage_config(config.storage.clone());
    coordinator.add_observer(Box::new(LoggingObserver));

    coordinator.resume_from_store()?;
    coordinator.start()?;

    if config.engine.run_seconds > 0 {
        std::thread::sleep(Duration::from_secs(config.engine.run_seconds));
    } else {
        loop {
            std::thread::sleep(Duration::from_secs(3600));
        }
    }

    coordinator.stop()?;
    if let Some(service) = cache.as_mut() {
        service.shutdown(Duration::from_millis(config.engine.stop_timeout_ms))?;
    }

    let report = serde_json::json!({
        "engine": coordinator.stats(),
        "cache": cache.as_ref().map(|s| s.stats()),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let manager = ConfigManager::new();
    match std::env::args().nth(1) {
        Some(path) => manager
            .load_from_file(&path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => manager.load_from_env()?,
    }
    manager.freeze();

    run(manager.get())
}
