//! Declarative choice of the three strategy roles.

use super::traits::ConfigSection;
use crate::engines::strategies::{
    AncestryStrategy, BoltzmannSelection, CauchyMutation, CrossbreedingStrategy,
    DifferentialEvolution, DominantParent, EliteBreeds, GaussianMutation, MutationStrategy,
    RankSelection, SamplingMode, SimulatedBinaryCrossover, StochasticCrossover,
    StrategyOrchestrator, TopN, TournamentSelection, UniformMutation, WeightedAverage,
};
use crate::error::Result;
use serde::{Deserialize, Serialize};

fn default_tournament_size() -> usize {
    3
}
fn default_num_rounds() -> usize {
    7
}
fn default_tier() -> usize {
    2
}
fn default_pressure() -> f64 {
    1.0
}
fn default_temperature() -> f64 {
    1.0
}
fn default_eta() -> f64 {
    15.0
}
fn default_noise() -> f64 {
    0.1
}
fn default_noise_chance() -> f64 {
    0.15
}
fn default_f() -> f64 {
    0.8
}
fn default_uniform_chance() -> f64 {
    0.1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AncestryChoice {
    Tournament {
        #[serde(default = "default_tournament_size")]
        tournament_size: usize,
        #[serde(default = "default_num_rounds")]
        num_rounds: usize,
    },
    EliteBreeds {
        #[serde(default = "default_tier")]
        thrive_count: usize,
        #[serde(default = "default_tier")]
        die_count: usize,
    },
    Rank {
        #[serde(default = "default_pressure")]
        selection_pressure: f64,
    },
    Boltzmann {
        #[serde(default = "default_temperature")]
        temperature: f64,
    },
}

impl AncestryChoice {
    fn build(&self) -> Result<Box<dyn AncestryStrategy>> {
        let strategy: Box<dyn AncestryStrategy> = match *self {
            AncestryChoice::Tournament {
                tournament_size,
                num_rounds,
            } => Box::new(TournamentSelection::new(tournament_size, num_rounds)?),
            AncestryChoice::EliteBreeds {
                thrive_count,
                die_count,
            } => Box::new(EliteBreeds::new(thrive_count, die_count)?),
            AncestryChoice::Rank { selection_pressure } => {
                Box::new(RankSelection::new(selection_pressure)?)
            }
            AncestryChoice::Boltzmann { temperature } => {
                Box::new(BoltzmannSelection::new(temperature)?)
            }
        };
        Ok(strategy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossbreedingChoice {
    WeightedAverage,
    DominantParent,
    SimulatedBinary {
        #[serde(default = "default_eta")]
        eta: f64,
        #[serde(default)]
        metalearning: bool,
    },
    Stochastic,
}

impl CrossbreedingChoice {
    fn build(&self) -> Result<Box<dyn CrossbreedingStrategy>> {
        let strategy: Box<dyn CrossbreedingStrategy> = match *self {
            CrossbreedingChoice::WeightedAverage => Box::new(WeightedAverage),
            CrossbreedingChoice::DominantParent => Box::new(DominantParent),
            CrossbreedingChoice::SimulatedBinary { eta, metalearning } => {
                Box::new(SimulatedBinaryCrossover::new(eta, metalearning)?)
            }
            CrossbreedingChoice::Stochastic => Box::new(StochasticCrossover),
        };
        Ok(strategy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationChoice {
    Gaussian {
        #[serde(default = "default_noise")]
        std: f64,
        #[serde(default = "default_noise_chance")]
        mutation_chance: f64,
        #[serde(default)]
        metalearning: bool,
    },
    Cauchy {
        #[serde(default = "default_noise")]
        scale: f64,
        #[serde(default = "default_noise_chance")]
        mutation_chance: f64,
        #[serde(default)]
        metalearning: bool,
    },
    DifferentialEvolution {
        #[serde(default = "default_f", rename = "F", alias = "f")]
        f: f64,
        #[serde(default = "default_sampling_mode")]
        sampling_mode: SamplingMode,
        #[serde(default)]
        metalearning: bool,
    },
    Uniform {
        #[serde(default = "default_uniform_chance")]
        mutation_chance: f64,
        #[serde(default)]
        metalearning: bool,
    },
}

fn default_sampling_mode() -> SamplingMode {
    SamplingMode::Random
}

impl MutationChoice {
    fn build(&self) -> Result<Box<dyn MutationStrategy>> {
        let strategy: Box<dyn MutationStrategy> = match *self {
            MutationChoice::Gaussian {
                std,
                mutation_chance,
                metalearning,
            } => Box::new(GaussianMutation::new(std, mutation_chance, metalearning)?),
            MutationChoice::Cauchy {
                scale,
                mutation_chance,
                metalearning,
            } => Box::new(CauchyMutation::new(scale, mutation_chance, metalearning)?),
            MutationChoice::DifferentialEvolution {
                f,
                sampling_mode,
                metalearning,
            } => Box::new(DifferentialEvolution::new(f, sampling_mode, metalearning)?),
            MutationChoice::Uniform {
                mutation_chance,
                metalearning,
            } => Box::new(UniformMutation::new(mutation_chance, metalearning)?),
        };
        Ok(strategy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Keep only the n most probable parents of the ancestry choice.
    pub top_n: Option<usize>,
    pub ancestry: AncestryChoice,
    pub crossbreeding: CrossbreedingChoice,
    pub mutation: MutationChoice,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            top_n: None,
            ancestry: AncestryChoice::Tournament {
                tournament_size: default_tournament_size(),
                num_rounds: default_num_rounds(),
            },
            crossbreeding: CrossbreedingChoice::WeightedAverage,
            mutation: MutationChoice::Gaussian {
                std: default_noise(),
                mutation_chance: default_noise_chance(),
                metalearning: false,
            },
        }
    }
}

impl StrategyConfig {
    pub fn build(&self) -> Result<StrategyOrchestrator> {
        let mut ancestry = self.ancestry.build()?;
        if let Some(n) = self.top_n {
            ancestry = Box::new(TopN::new(n, ancestry)?);
        }
        Ok(StrategyOrchestrator::new(
            ancestry,
            self.crossbreeding.build()?,
            self.mutation.build()?,
        ))
    }
}

impl ConfigSection for StrategyConfig {
    fn section_name() -> &'static str {
        "strategies"
    }

    fn validate(&self) -> Result<()> {
        // Constructors carry the parameter checks
        self.build().map(|_| ())
    }
}
