//! Parent selection algorithms. Lower fitness is better throughout.

use super::traits::{AncestryStrategy, Strategy};
use crate::engines::genetics::{Allele, Genome, RandomSource};
use crate::error::{ClanTuneError, Result};
use crate::types::Ancestry;

fn fitness_of(genome: &Genome) -> Result<f64> {
    genome.fitness().ok_or_else(|| {
        ClanTuneError::ContractViolation(format!("genome {} has no fitness", genome.id()))
    })
}

/// Population indices sorted by fitness ascending; ties keep population order.
fn rank_order(population: &[Genome]) -> Result<Vec<usize>> {
    let fitness = population.iter().map(fitness_of).collect::<Result<Vec<_>>>()?;
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|a, b| fitness[*a].total_cmp(&fitness[*b]));
    Ok(order)
}

/// Pair weights with population ids, normalizing by their sum.
fn normalized(population: &[Genome], weights: &[f64]) -> Result<Ancestry> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return Err(ClanTuneError::InvalidAncestry(format!(
            "selection weights must have a positive finite total, got {}",
            total
        )));
    }
    Ok(population
        .iter()
        .zip(weights)
        .map(|(genome, weight)| (weight / total, genome.id()))
        .collect())
}

/// Repeated tournaments; probability is each genome's share of the wins.
///
/// Each round samples `tournament_size` members with replacement and the
/// lowest fitness wins, the earliest draw winning ties.
#[derive(Debug, Clone)]
pub struct TournamentSelection {
    tournament_size: usize,
    num_rounds: usize,
}

impl TournamentSelection {
    pub fn new(tournament_size: usize, num_rounds: usize) -> Result<Self> {
        if tournament_size < 2 {
            return Err(ClanTuneError::InvalidParameter(
                "Tournament size must be at least 2".to_string(),
            ));
        }
        if num_rounds < 1 {
            return Err(ClanTuneError::InvalidParameter(
                "Tournament rounds must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            tournament_size,
            num_rounds,
        })
    }
}

impl Default for TournamentSelection {
    fn default() -> Self {
        Self {
            tournament_size: 3,
            num_rounds: 7,
        }
    }
}

impl Strategy for TournamentSelection {}

impl AncestryStrategy for TournamentSelection {
    fn select_ancestry(
        &self,
        _candidate: &Genome,
        population: &[Genome],
        rng: &mut dyn RandomSource,
    ) -> Result<Ancestry> {
        let fitness = population.iter().map(fitness_of).collect::<Result<Vec<_>>>()?;
        let mut wins = vec![0usize; population.len()];

        for _ in 0..self.num_rounds {
            let mut winner = rng.choose_index(population.len());
            for _ in 1..self.tournament_size {
                let challenger = rng.choose_index(population.len());
                if fitness[challenger] < fitness[winner] {
                    winner = challenger;
                }
            }
            wins[winner] += 1;
        }

        Ok(population
            .iter()
            .zip(&wins)
            .map(|(genome, count)| (*count as f64 / self.num_rounds as f64, genome.id()))
            .collect())
    }
}

/// Three deterministic tiers by fitness.
///
/// The best `thrive_count` and the middle ("survive") tier copy themselves.
/// Each of the worst `die_count` is replaced by an equal blend of the thrive
/// tier.
#[derive(Debug, Clone)]
pub struct EliteBreeds {
    thrive_count: usize,
    die_count: usize,
}

impl EliteBreeds {
    pub fn new(thrive_count: usize, die_count: usize) -> Result<Self> {
        if die_count > 0 && thrive_count == 0 {
            return Err(ClanTuneError::InvalidParameter(
                "thrive_count must be at least 1 when die_count is positive".to_string(),
            ));
        }
        Ok(Self {
            thrive_count,
            die_count,
        })
    }
}

impl Default for EliteBreeds {
    fn default() -> Self {
        Self {
            thrive_count: 2,
            die_count: 2,
        }
    }
}

impl Strategy for EliteBreeds {}

impl AncestryStrategy for EliteBreeds {
    fn select_ancestry(
        &self,
        candidate: &Genome,
        population: &[Genome],
        _rng: &mut dyn RandomSource,
    ) -> Result<Ancestry> {
        if self.thrive_count + self.die_count >= population.len() {
            return Err(ClanTuneError::InvalidParameter(format!(
                "thrive_count + die_count ({}) must be less than population size ({})",
                self.thrive_count + self.die_count,
                population.len()
            )));
        }
        let order = rank_order(population)?;
        let thrive = &order[..self.thrive_count];
        let die = &order[order.len() - self.die_count..];
        let me = candidate.position_in(population).ok_or_else(|| {
            ClanTuneError::ContractViolation("candidate genome must be in population".to_string())
        })?;

        let weights: Vec<f64> = if die.contains(&me) {
            (0..population.len())
                .map(|i| if thrive.contains(&i) { 1.0 } else { 0.0 })
                .collect()
        } else {
            (0..population.len())
                .map(|i| if i == me { 1.0 } else { 0.0 })
                .collect()
        };
        normalized(population, &weights)
    }
}

/// Weight `(n - rank) ^ selection_pressure`, rank 0 being the best.
#[derive(Debug, Clone)]
pub struct RankSelection {
    selection_pressure: f64,
}

impl RankSelection {
    pub fn new(selection_pressure: f64) -> Result<Self> {
        if !(selection_pressure > 0.0) {
            return Err(ClanTuneError::InvalidParameter(
                "Selection pressure must be positive".to_string(),
            ));
        }
        Ok(Self { selection_pressure })
    }
}

impl Default for RankSelection {
    fn default() -> Self {
        Self {
            selection_pressure: 1.0,
        }
    }
}

impl Strategy for RankSelection {}

impl AncestryStrategy for RankSelection {
    fn select_ancestry(
        &self,
        _candidate: &Genome,
        population: &[Genome],
        _rng: &mut dyn RandomSource,
    ) -> Result<Ancestry> {
        let n = population.len();
        let mut weights = vec![0.0; n];
        for (rank, index) in rank_order(population)?.into_iter().enumerate() {
            weights[index] = ((n - rank) as f64).powf(self.selection_pressure);
        }
        normalized(population, &weights)
    }
}

/// Weight `exp(-fitness / temperature)`.
#[derive(Debug, Clone)]
pub struct BoltzmannSelection {
    temperature: f64,
}

impl BoltzmannSelection {
    pub fn new(temperature: f64) -> Result<Self> {
        if !(temperature > 0.0) {
            return Err(ClanTuneError::InvalidParameter(
                "Temperature must be positive".to_string(),
            ));
        }
        Ok(Self { temperature })
    }
}

impl Default for BoltzmannSelection {
    fn default() -> Self {
        Self { temperature: 1.0 }
    }
}

impl Strategy for BoltzmannSelection {}

impl AncestryStrategy for BoltzmannSelection {
    fn select_ancestry(
        &self,
        _candidate: &Genome,
        population: &[Genome],
        _rng: &mut dyn RandomSource,
    ) -> Result<Ancestry> {
        let fitness = population.iter().map(fitness_of).collect::<Result<Vec<_>>>()?;
        // Shifting by the best fitness cancels in normalization and keeps exp() finite
        let best = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let weights: Vec<f64> = fitness
            .iter()
            .map(|f| {
                // inf - inf is NaN; members tied with the best weigh 1
                let delta = if *f == best { 0.0 } else { f - best };
                (-delta / self.temperature).exp()
            })
            .collect();
        normalized(population, &weights)
    }
}

/// Keeps the `n` most probable entries of an inner strategy and renormalizes.
/// Ties go to the lower population index.
pub struct TopN {
    n: usize,
    inner: Box<dyn AncestryStrategy>,
}

impl TopN {
    pub fn new(n: usize, inner: Box<dyn AncestryStrategy>) -> Result<Self> {
        if n < 1 {
            return Err(ClanTuneError::InvalidParameter(
                "n must be at least 1".to_string(),
            ));
        }
        Ok(Self { n, inner })
    }
}

impl Strategy for TopN {
    fn handle_setup(&self, allele: &Allele) -> Result<Allele> {
        self.inner.handle_setup(allele)
    }
}

impl AncestryStrategy for TopN {
    fn select_ancestry(
        &self,
        candidate: &Genome,
        population: &[Genome],
        rng: &mut dyn RandomSource,
    ) -> Result<Ancestry> {
        let ancestry = self.inner.select(candidate, population, rng)?;

        let mut order: Vec<usize> = (0..ancestry.len()).collect();
        order.sort_by(|a, b| ancestry[*b].0.total_cmp(&ancestry[*a].0));
        let mut weights = vec![0.0; ancestry.len()];
        for index in order.into_iter().take(self.n) {
            weights[index] = ancestry[index].0;
        }
        normalized(population, &weights)
    }
}
