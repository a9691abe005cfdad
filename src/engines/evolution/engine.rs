use crate::config::EvolutionConfig;
use crate::engines::evolution::hall_of_fame::{EliteGenome, HallOfFame};
use crate::engines::evolution::progress::{GenerationSummary, ProgressCallback};
use crate::engines::genetics::{Genome, GenomeOverrides, NodeFilter, RngSource};
use crate::engines::strategies::mutation::scatter;
use crate::engines::strategies::StrategyOrchestrator;
use crate::error::{ClanTuneError, Result};
use crate::types::Value;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Scores one set of expressed hyperparameters. Lower is better.
pub trait FitnessEvaluator: Sync {
    fn evaluate(&self, hyperparameters: &BTreeMap<String, Value>) -> Result<f64>;
}

impl<F> FitnessEvaluator for F
where
    F: Fn(&BTreeMap<String, Value>) -> Result<f64> + Sync,
{
    fn evaluate(&self, hyperparameters: &BTreeMap<String, Value>) -> Result<f64> {
        self(hyperparameters)
    }
}

// Stream label for the seeding pass, distinct from any generation index.
const SEEDING_STREAM: u64 = u64::MAX;

/// Single-process generational loop over a [`StrategyOrchestrator`].
pub struct EvolutionEngine {
    config: EvolutionConfig,
    orchestrator: StrategyOrchestrator,
    hall_of_fame: HallOfFame,
    run_seed: u64,
}

impl EvolutionEngine {
    pub fn new(config: EvolutionConfig, orchestrator: StrategyOrchestrator) -> Self {
        let run_seed = match config.seed {
            Some(seed) => seed,
            None => rand::random(),
        };
        let hall_of_fame = HallOfFame::new(config.hall_of_fame_size);

        Self {
            config,
            orchestrator,
            hall_of_fame,
            run_seed,
        }
    }

    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    /// Run the evolution process
    pub fn run<E, C>(
        &mut self,
        founder: &Genome,
        evaluator: &E,
        mut callback: C,
    ) -> Result<Vec<EliteGenome>>
    where
        E: FitnessEvaluator + ?Sized,
        C: ProgressCallback,
    {
        if self.config.population_size == 0 || self.config.generations == 0 {
            return Err(ClanTuneError::Configuration(
                "population_size and generations must be positive".to_string(),
            ));
        }

        let founder = self.orchestrator.setup_genome(founder)?;
        let mut population = self.initialize_population(&founder)?;

        for generation in 0..self.config.generations {
            callback.on_generation_start(generation);

            let evaluated = self.evaluate_population(&population, evaluator)?;

            for genome in &evaluated {
                if let Some(elite) = EliteGenome::from_evaluated(genome, generation) {
                    if !self.hall_of_fame.try_add(elite) {
                        debug!("Genome {} duplicates a hall of fame entry", genome.id());
                    }
                }
            }

            let summary =
                GenerationSummary::from_evaluated(generation, &evaluated, self.hall_of_fame.len());
            callback.on_generation_complete(&summary);

            // Check termination
            if generation + 1 == self.config.generations {
                break;
            }

            population = self.create_next_generation(&evaluated, generation)?;
        }

        Ok(self.hall_of_fame.get_all().to_vec())
    }

    /// The founder itself plus copies scattered across its domains without
    /// reference to the rest of the population.
    fn initialize_population(&self, founder: &Genome) -> Result<Vec<Genome>> {
        (0..self.config.population_size)
            .into_par_iter()
            .map(|index| {
                if index == 0 {
                    return Ok(founder.with_overrides(GenomeOverrides {
                        id: Some(Uuid::new_v4()),
                        ..GenomeOverrides::default()
                    }));
                }
                let mut rng = self.member_rng(SEEDING_STREAM, index);
                founder.update_alleles(NodeFilter::mutable(), |allele| scatter(allele, &mut rng))
            })
            .collect()
    }

    fn evaluate_population<E>(&self, population: &[Genome], evaluator: &E) -> Result<Vec<Genome>>
    where
        E: FitnessEvaluator + ?Sized,
    {
        population
            .par_iter()
            .map(|genome| {
                let fitness = evaluator.evaluate(&genome.as_hyperparameters())?;
                if fitness.is_nan() {
                    warn!("Genome {} scored NaN; treating as worst", genome.id());
                    return Ok(genome.with_fitness(f64::INFINITY));
                }
                Ok(genome.with_fitness(fitness))
            })
            .collect()
    }

    fn create_next_generation(&self, evaluated: &[Genome], generation: usize) -> Result<Vec<Genome>> {
        let next = evaluated
            .par_iter()
            .enumerate()
            .map(|(index, genome)| {
                let mut rng = self.member_rng(generation as u64, index);
                self.orchestrator.reproduce(genome, evaluated, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Generation {} produced {} offspring",
            generation + 1,
            next.len()
        );
        Ok(next)
    }

    /// Independent generator per (generation, member) so parallel
    /// reproduction stays reproducible under a fixed seed.
    fn member_rng(&self, stream: u64, index: usize) -> RngSource<StdRng> {
        RngSource::seeded(mix_seed(self.run_seed, stream, index as u64))
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn mix_seed(seed: u64, stream: u64, index: u64) -> u64 {
    splitmix64(splitmix64(splitmix64(seed) ^ stream) ^ index)
}
