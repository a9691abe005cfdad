//! Allele-level combination of parent values.

use super::traits::{live_indices, probabilities, CrossbreedingStrategy, Strategy};
use crate::engines::genetics::{Allele, RandomSource};
use crate::error::{ClanTuneError, Result};
use crate::types::Ancestry;

pub(crate) fn numeric_value(allele: &Allele, strategy: &'static str) -> Result<f64> {
    allele.raw_value().ok_or_else(|| ClanTuneError::UnsupportedAllele {
        strategy,
        kind: allele.allele_type().to_string(),
    })
}

/// Offspring value is the probability-weighted sum of parent values.
/// Numeric alleles only; integers blend their backing floats.
#[derive(Debug, Clone, Default)]
pub struct WeightedAverage;

impl Strategy for WeightedAverage {}

impl CrossbreedingStrategy for WeightedAverage {
    fn combine_alleles(
        &self,
        template: &Allele,
        sources: &[Allele],
        ancestry: &Ancestry,
        _rng: &mut dyn RandomSource,
    ) -> Result<Allele> {
        let mut value = 0.0;
        for (source, (probability, _)) in sources.iter().zip(ancestry) {
            value += probability * numeric_value(source, "WeightedAverage")?;
        }
        template.with_value(value)
    }
}

/// Copies the value of the most probable parent; the lower index wins ties.
#[derive(Debug, Clone, Default)]
pub struct DominantParent;

impl Strategy for DominantParent {}

impl CrossbreedingStrategy for DominantParent {
    fn combine_alleles(
        &self,
        template: &Allele,
        sources: &[Allele],
        ancestry: &Ancestry,
        _rng: &mut dyn RandomSource,
    ) -> Result<Allele> {
        let mut dominant = 0;
        for (index, (probability, _)) in ancestry.iter().enumerate() {
            if *probability > ancestry[dominant].0 {
                dominant = index;
            }
        }
        let source = sources.get(dominant).ok_or_else(|| {
            ClanTuneError::ContractViolation("no source allele for dominant parent".to_string())
        })?;
        template.with_value(source.raw().clone())
    }
}

/// Simulated binary crossover over exactly two live parents.
///
/// The distribution index is read from the node's `eta` metadata when present.
/// With metalearning enabled, setup injects an evolvable `eta` in [2, 30].
#[derive(Debug, Clone)]
pub struct SimulatedBinaryCrossover {
    default_eta: f64,
    use_metalearning: bool,
}

impl SimulatedBinaryCrossover {
    pub fn new(default_eta: f64, use_metalearning: bool) -> Result<Self> {
        if !(default_eta > 0.0) {
            return Err(ClanTuneError::InvalidParameter(
                "eta must be positive".to_string(),
            ));
        }
        Ok(Self {
            default_eta,
            use_metalearning,
        })
    }
}

impl Default for SimulatedBinaryCrossover {
    fn default() -> Self {
        Self {
            default_eta: 15.0,
            use_metalearning: false,
        }
    }
}

impl Strategy for SimulatedBinaryCrossover {
    fn handle_setup(&self, allele: &Allele) -> Result<Allele> {
        if !self.use_metalearning {
            return Ok(allele.clone());
        }
        let eta = Allele::float(self.default_eta, Some(2.0), Some(30.0))?;
        Ok(allele.with_metadata("eta", eta))
    }
}

impl CrossbreedingStrategy for SimulatedBinaryCrossover {
    fn combine_alleles(
        &self,
        template: &Allele,
        sources: &[Allele],
        ancestry: &Ancestry,
        rng: &mut dyn RandomSource,
    ) -> Result<Allele> {
        let eta = template.meta_f64("eta").unwrap_or(self.default_eta);

        let live = live_indices(ancestry);
        if live.len() != 2 {
            return Err(ClanTuneError::InsufficientParents {
                strategy: "SimulatedBinaryCrossover",
                required: "exactly 2 (compose with TopN(2, ...))".to_string(),
                found: live.len(),
            });
        }
        let p1 = numeric_value(&sources[live[0]], "SimulatedBinaryCrossover")?;
        let p2 = numeric_value(&sources[live[1]], "SimulatedBinaryCrossover")?;

        let u = rng.uniform();
        let beta = if u <= 0.5 {
            (2.0 * u).powf(1.0 / (eta + 1.0))
        } else {
            (1.0 / (2.0 * (1.0 - u))).powf(1.0 / (eta + 1.0))
        };

        let value = if rng.uniform() < 0.5 {
            0.5 * ((1.0 + beta) * p1 + (1.0 - beta) * p2)
        } else {
            0.5 * ((1.0 - beta) * p1 + (1.0 + beta) * p2)
        };
        template.with_value(value)
    }
}

/// Copies one parent's value verbatim, drawn in proportion to its probability.
#[derive(Debug, Clone, Default)]
pub struct StochasticCrossover;

impl Strategy for StochasticCrossover {}

impl CrossbreedingStrategy for StochasticCrossover {
    fn combine_alleles(
        &self,
        template: &Allele,
        sources: &[Allele],
        ancestry: &Ancestry,
        rng: &mut dyn RandomSource,
    ) -> Result<Allele> {
        let chosen = rng.weighted_index(&probabilities(ancestry))?;
        let source = sources.get(chosen).ok_or_else(|| {
            ClanTuneError::ContractViolation("no source allele for sampled parent".to_string())
        })?;
        template.with_value(source.raw().clone())
    }
}
