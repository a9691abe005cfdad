use anyhow::Context;
use clantune::config::ConfigManager;
use clantune::engines::evolution::{EvolutionEngine, LoggingProgressCallback, TargetDistance};
use log::info;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let manager = ConfigManager::new();
    match std::env::args().nth(1) {
        Some(path) => manager
            .load_from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => manager.load_from_env().context("loading default config")?,
    }
    let config = manager.get();

    let founder = config.search_space.founder()?;
    let orchestrator = config.strategies.build()?;
    let evaluator = TargetDistance::from_search_space(&config.search_space)?;

    info!(
        "Evolving {} hyperparameters, population {}, {} generations",
        founder.alleles().len(),
        config.evolution.population_size,
        config.evolution.generations
    );

    let mut engine = EvolutionEngine::new(config.evolution.clone(), orchestrator);
    let elites = engine.run(&founder, &evaluator, LoggingProgressCallback)?;

    if let Some(best) = engine.hall_of_fame().best() {
        info!(
            "Best fitness {:.6} (generation {})",
            best.fitness,
            best.generation + 1
        );
    }

    println!("{}", serde_json::to_string_pretty(&elites)?);
    Ok(())
}
