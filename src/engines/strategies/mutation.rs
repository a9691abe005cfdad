//! Allele-level perturbation algorithms.
//!
//! Control parameters (`std`, `scale`, `mutation_chance`, `F`) are read from
//! the node's metadata first and fall back to the strategy defaults, so an
//! evolvable copy injected at setup takes over transparently.

use super::crossbreeding::numeric_value;
use super::traits::{live_indices, MutationStrategy, Strategy};
use crate::engines::genetics::{Allele, AlleleType, Domain, RandomSource};
use crate::error::{ClanTuneError, Result};
use crate::types::{Ancestry, Value};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

fn check_chance(chance: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&chance) {
        return Err(ClanTuneError::InvalidParameter(
            "mutation_chance must be in [0, 1]".to_string(),
        ));
    }
    Ok(())
}

/// Apply additive noise in the allele's natural space: backing float for
/// integers, multiplicative for log alleles.
fn apply_noise(allele: &Allele, noise: f64, strategy: &'static str) -> Result<Allele> {
    let current = numeric_value(allele, strategy)?;
    match allele.allele_type() {
        AlleleType::LogFloat => allele.with_value(current * noise.exp()),
        _ => allele.with_value(current + noise),
    }
}

fn ensure_numeric(allele: &Allele, strategy: &'static str) -> Result<()> {
    numeric_value(allele, strategy).map(|_| ())
}

/// Normal noise with probability `mutation_chance`.
#[derive(Debug, Clone)]
pub struct GaussianMutation {
    default_std: f64,
    default_mutation_chance: f64,
    use_metalearning: bool,
}

impl GaussianMutation {
    pub fn new(default_std: f64, default_mutation_chance: f64, use_metalearning: bool) -> Result<Self> {
        if !(default_std > 0.0) {
            return Err(ClanTuneError::InvalidParameter(
                "std must be positive".to_string(),
            ));
        }
        check_chance(default_mutation_chance)?;
        Ok(Self {
            default_std,
            default_mutation_chance,
            use_metalearning,
        })
    }
}

impl Default for GaussianMutation {
    fn default() -> Self {
        Self {
            default_std: 0.1,
            default_mutation_chance: 0.15,
            use_metalearning: false,
        }
    }
}

impl Strategy for GaussianMutation {
    fn handle_setup(&self, allele: &Allele) -> Result<Allele> {
        if !self.use_metalearning {
            return Ok(allele.clone());
        }
        let std = Allele::float(
            self.default_std,
            Some(0.01 * self.default_std),
            Some(10.0 * self.default_std),
        )?;
        let chance = Allele::float(self.default_mutation_chance, Some(0.1), Some(0.5))?;
        Ok(allele
            .with_metadata("std", std)
            .with_metadata("mutation_chance", chance))
    }
}

impl MutationStrategy for GaussianMutation {
    fn perturb_allele(
        &self,
        allele: &Allele,
        _population: &[Allele],
        _ancestry: &Ancestry,
        rng: &mut dyn RandomSource,
    ) -> Result<Allele> {
        ensure_numeric(allele, "GaussianMutation")?;
        let std = allele.meta_f64("std").unwrap_or(self.default_std);
        let chance = allele
            .meta_f64("mutation_chance")
            .unwrap_or(self.default_mutation_chance);

        if rng.uniform() > chance {
            return Ok(allele.clone());
        }
        let noise = rng.gaussian() * std;
        apply_noise(allele, noise, "GaussianMutation")
    }
}

/// Heavy-tailed Cauchy noise, `scale * tan(pi * (u - 0.5))`.
#[derive(Debug, Clone)]
pub struct CauchyMutation {
    default_scale: f64,
    default_mutation_chance: f64,
    use_metalearning: bool,
}

impl CauchyMutation {
    pub fn new(default_scale: f64, default_mutation_chance: f64, use_metalearning: bool) -> Result<Self> {
        if !(default_scale > 0.0) {
            return Err(ClanTuneError::InvalidParameter(
                "scale must be positive".to_string(),
            ));
        }
        check_chance(default_mutation_chance)?;
        Ok(Self {
            default_scale,
            default_mutation_chance,
            use_metalearning,
        })
    }
}

impl Default for CauchyMutation {
    fn default() -> Self {
        Self {
            default_scale: 0.1,
            default_mutation_chance: 0.15,
            use_metalearning: false,
        }
    }
}

impl Strategy for CauchyMutation {
    fn handle_setup(&self, allele: &Allele) -> Result<Allele> {
        if !self.use_metalearning {
            return Ok(allele.clone());
        }
        let scale = Allele::float(
            self.default_scale,
            Some(0.01 * self.default_scale),
            Some(10.0 * self.default_scale),
        )?;
        let chance = Allele::float(self.default_mutation_chance, Some(0.1), Some(0.5))?;
        Ok(allele
            .with_metadata("scale", scale)
            .with_metadata("mutation_chance", chance))
    }
}

impl MutationStrategy for CauchyMutation {
    fn perturb_allele(
        &self,
        allele: &Allele,
        _population: &[Allele],
        _ancestry: &Ancestry,
        rng: &mut dyn RandomSource,
    ) -> Result<Allele> {
        ensure_numeric(allele, "CauchyMutation")?;
        let scale = allele.meta_f64("scale").unwrap_or(self.default_scale);
        let chance = allele
            .meta_f64("mutation_chance")
            .unwrap_or(self.default_mutation_chance);

        if rng.uniform() > chance {
            return Ok(allele.clone());
        }
        let noise = scale * (PI * (rng.uniform() - 0.5)).tan();
        apply_noise(allele, noise, "CauchyMutation")
    }
}

/// How differential evolution draws its two donors from the live members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    Random,
    Weighted,
}

impl FromStr for SamplingMode {
    type Err = ClanTuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(SamplingMode::Random),
            "weighted" => Ok(SamplingMode::Weighted),
            other => Err(ClanTuneError::InvalidParameter(format!(
                "sampling_mode must be 'random' or 'weighted', got '{}'",
                other
            ))),
        }
    }
}

/// `base + F * (v1 - v2)` over two distinct live donors; log alleles use
/// `base * (v1 / v2) ^ F`. Needs at least three live members.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    default_f: f64,
    default_sampling_mode: SamplingMode,
    use_metalearning: bool,
}

impl DifferentialEvolution {
    pub fn new(default_f: f64, default_sampling_mode: SamplingMode, use_metalearning: bool) -> Result<Self> {
        if !(default_f > 0.0) {
            return Err(ClanTuneError::InvalidParameter("F must be positive".to_string()));
        }
        Ok(Self {
            default_f,
            default_sampling_mode,
            use_metalearning,
        })
    }
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self {
            default_f: 0.8,
            default_sampling_mode: SamplingMode::Random,
            use_metalearning: false,
        }
    }
}

impl Strategy for DifferentialEvolution {
    fn handle_setup(&self, allele: &Allele) -> Result<Allele> {
        if !self.use_metalearning {
            return Ok(allele.clone());
        }
        let f = Allele::float(self.default_f, Some(0.5), Some(2.0))?;
        Ok(allele.with_metadata("F", f))
    }
}

impl MutationStrategy for DifferentialEvolution {
    fn perturb_allele(
        &self,
        allele: &Allele,
        population: &[Allele],
        ancestry: &Ancestry,
        rng: &mut dyn RandomSource,
    ) -> Result<Allele> {
        let base = numeric_value(allele, "DifferentialEvolution")?;
        let f = allele.meta_f64("F").unwrap_or(self.default_f);
        let mode = match allele.meta_str("sampling_mode") {
            Some(mode) => mode.parse()?,
            None => self.default_sampling_mode,
        };

        let live = live_indices(ancestry);
        if live.len() < 3 {
            return Err(ClanTuneError::InsufficientParents {
                strategy: "DifferentialEvolution",
                required: "at least 3".to_string(),
                found: live.len(),
            });
        }
        let values = live
            .iter()
            .map(|index| {
                population
                    .get(*index)
                    .ok_or_else(|| {
                        ClanTuneError::ContractViolation(format!(
                            "no population allele at live index {}",
                            index
                        ))
                    })
                    .and_then(|donor| numeric_value(donor, "DifferentialEvolution"))
            })
            .collect::<Result<Vec<f64>>>()?;

        let (first, second) = match mode {
            SamplingMode::Random => rng.choose_two_distinct(values.len())?,
            SamplingMode::Weighted => {
                let weights: Vec<f64> = live.iter().map(|index| ancestry[*index].0).collect();
                rng.weighted_choose_two(&weights)?
            }
        };
        let (v1, v2) = (values[first], values[second]);

        let value = match allele.allele_type() {
            AlleleType::LogFloat => base * (v1 / v2).powf(f),
            _ => base + f * (v1 - v2),
        };
        allele.with_value(value)
    }
}

/// Resample uniformly over the whole domain with probability `mutation_chance`.
/// Numeric alleles need both bounds.
#[derive(Debug, Clone)]
pub struct UniformMutation {
    default_mutation_chance: f64,
    use_metalearning: bool,
}

impl UniformMutation {
    pub fn new(default_mutation_chance: f64, use_metalearning: bool) -> Result<Self> {
        check_chance(default_mutation_chance)?;
        Ok(Self {
            default_mutation_chance,
            use_metalearning,
        })
    }
}

impl Default for UniformMutation {
    fn default() -> Self {
        Self {
            default_mutation_chance: 0.1,
            use_metalearning: false,
        }
    }
}

impl Strategy for UniformMutation {
    fn handle_setup(&self, allele: &Allele) -> Result<Allele> {
        if !self.use_metalearning {
            return Ok(allele.clone());
        }
        let chance = Allele::float(self.default_mutation_chance, Some(0.01), Some(0.3))?;
        Ok(allele.with_metadata("mutation_chance", chance))
    }
}

impl MutationStrategy for UniformMutation {
    fn perturb_allele(
        &self,
        allele: &Allele,
        _population: &[Allele],
        _ancestry: &Ancestry,
        rng: &mut dyn RandomSource,
    ) -> Result<Allele> {
        let chance = allele
            .meta_f64("mutation_chance")
            .unwrap_or(self.default_mutation_chance);
        if rng.uniform() > chance {
            return Ok(allele.clone());
        }

        resample(allele, rng)
    }
}

/// Draw a fresh value uniformly from the allele's domain; log alleles are
/// sampled in log space. Unbounded numeric domains are rejected.
pub(crate) fn resample(allele: &Allele, rng: &mut dyn RandomSource) -> Result<Allele> {
    let value = match allele.domain() {
        Domain::Bool => Value::Bool([true, false][rng.choose_index(2)]),
        Domain::String(options) => {
            let index = rng.choose_index(options.len());
            match options.iter().nth(index) {
                Some(option) => Value::String(option.clone()),
                None => return Ok(allele.clone()),
            }
        }
        domain => {
            let (lo, hi) = domain.bounds().ok_or_else(|| {
                ClanTuneError::InvalidDomain(format!(
                    "uniform resampling requires a bounded domain, got {:?}",
                    domain
                ))
            })?;
            match domain {
                Domain::LogFloat { .. } => {
                    let (log_lo, log_hi) = (lo.ln(), hi.ln());
                    Value::Float((log_lo + rng.uniform() * (log_hi - log_lo)).exp())
                }
                _ => Value::Float(lo + rng.uniform() * (hi - lo)),
            }
        }
    };
    allele.with_value(value)
}

/// Population-free perturbation used to seed diverse founders: bounded,
/// boolean and string nodes are resampled, unbounded numerics get Gaussian
/// jitter scaled to their magnitude.
pub(crate) fn scatter(allele: &Allele, rng: &mut dyn RandomSource) -> Result<Allele> {
    if !allele.allele_type().is_numeric() || allele.domain().bounds().is_some() {
        return resample(allele, rng);
    }
    let current = numeric_value(allele, "scatter")?;
    let sigma = match allele.allele_type() {
        AlleleType::LogFloat => 0.1,
        _ => 0.1 * current.abs().max(1.0),
    };
    apply_noise(allele, sigma * rng.gaussian(), "scatter")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_validation() {
        assert!(GaussianMutation::new(0.0, 0.1, false).is_err());
        assert!(GaussianMutation::new(0.1, 1.5, false).is_err());
        assert!(CauchyMutation::new(-1.0, 0.1, false).is_err());
        assert!(DifferentialEvolution::new(0.0, SamplingMode::Random, false).is_err());
        assert!(UniformMutation::new(-0.1, false).is_err());
    }

    #[test]
    fn test_gaussian_setup_domains() {
        let strategy = GaussianMutation::new(0.2, 0.15, true).unwrap();
        let allele = strategy
            .handle_setup(&Allele::float(1.0, None, None).unwrap())
            .unwrap();

        let std = allele.meta("std").and_then(|m| m.as_allele()).unwrap();
        assert_eq!(std.domain().bounds(), Some((0.01 * 0.2, 10.0 * 0.2)));
        let chance = allele.meta("mutation_chance").and_then(|m| m.as_allele()).unwrap();
        assert_eq!(chance.domain().bounds(), Some((0.1, 0.5)));
    }

    #[test]
    fn test_scatter_resamples_bounded_and_jitters_unbounded() {
        let mut rng = crate::engines::genetics::RngSource::seeded(11);

        let bounded = Allele::float(0.5, Some(0.0), Some(1.0)).unwrap();
        let unbounded = Allele::float(200.0, None, None).unwrap();
        let log = Allele::log_float(1e-3, 1e-6, None).unwrap();
        for _ in 0..50 {
            let x = scatter(&bounded, &mut rng).unwrap().raw_value().unwrap();
            assert!((0.0..=1.0).contains(&x));

            let y = scatter(&unbounded, &mut rng).unwrap().raw_value().unwrap();
            assert!((y - 200.0).abs() < 200.0, "jitter too wide: {}", y);

            let z = scatter(&log, &mut rng).unwrap().raw_value().unwrap();
            assert!(z > 0.0 && (z / 1e-3).ln().abs() < 1.0);
        }
    }

    #[test]
    fn test_resample_rejects_unbounded() {
        let mut rng = crate::engines::genetics::RngSource::seeded(1);
        let allele = Allele::float(1.0, Some(0.0), None).unwrap();
        assert!(matches!(
            resample(&allele, &mut rng),
            Err(ClanTuneError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_sampling_mode_parse() {
        assert_eq!("weighted".parse::<SamplingMode>().unwrap(), SamplingMode::Weighted);
        assert!("roulette".parse::<SamplingMode>().is_err());
    }
}
