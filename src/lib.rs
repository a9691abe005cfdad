//! Evolutionary hyperparameter tuning over immutable allele trees.
//!
//! Genomes carry trees of typed alleles; ancestry, crossbreeding and
//! mutation strategies are composed by a [`StrategyOrchestrator`] into one
//! reproduction step, and [`EvolutionEngine`] drives that step over a
//! population.

pub mod config;
pub mod engines;
pub mod error;
pub mod types;

pub use engines::evolution::{EvolutionEngine, FitnessEvaluator};
pub use engines::genetics::{Allele, Genome};
pub use engines::strategies::StrategyOrchestrator;
pub use error::{ClanTuneError, Result};
