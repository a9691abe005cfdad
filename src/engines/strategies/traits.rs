use crate::engines::genetics::{
    synthesize_genome_population, Allele, Genome, NodeFilter, RandomSource,
};
use crate::error::{ClanTuneError, Result};
use crate::types::Ancestry;

const ANCESTRY_SUM_TOLERANCE: f64 = 1e-6;

/// Shared setup capability of every strategy role.
///
/// Strategies hold configuration only; all randomness arrives through the
/// `RandomSource` argument of each role's hook.
pub trait Strategy: Send + Sync {
    /// Per-allele setup hook, typically injecting evolvable metadata.
    /// Must not change the allele's value.
    fn handle_setup(&self, allele: &Allele) -> Result<Allele> {
        Ok(allele.clone())
    }

    /// Apply [`Strategy::handle_setup`] to each top-level allele. Nested
    /// metadata alleles are left alone.
    fn setup_genome(&self, genome: &Genome) -> Result<Genome> {
        let alleles = genome
            .alleles()
            .iter()
            .map(|(name, allele)| Ok((name.clone(), self.handle_setup(allele)?)))
            .collect::<Result<_>>()?;
        Ok(genome.with_alleles(alleles))
    }
}

/// Declares who reproduces, and with what weight.
pub trait AncestryStrategy: Strategy {
    /// Selection algorithm. Inputs are validated by [`AncestryStrategy::select`].
    fn select_ancestry(
        &self,
        candidate: &Genome,
        population: &[Genome],
        rng: &mut dyn RandomSource,
    ) -> Result<Ancestry>;

    fn select(
        &self,
        candidate: &Genome,
        population: &[Genome],
        rng: &mut dyn RandomSource,
    ) -> Result<Ancestry> {
        if population.iter().any(|genome| genome.fitness().is_none()) {
            return Err(ClanTuneError::ContractViolation(
                "all genomes must have fitness set before selection".to_string(),
            ));
        }
        if candidate.position_in(population).is_none() {
            return Err(ClanTuneError::ContractViolation(
                "candidate genome must be in population".to_string(),
            ));
        }

        let ancestry = self.select_ancestry(candidate, population, rng)?;
        validate_ancestry(&ancestry, population)?;
        Ok(ancestry)
    }
}

/// Checks a declaration against its population: one entry per member in
/// population order, finite non-negative probabilities summing to 1.
pub fn validate_ancestry(ancestry: &Ancestry, population: &[Genome]) -> Result<()> {
    check_length(ancestry, population.len())?;
    for (index, ((probability, id), genome)) in ancestry.iter().zip(population).enumerate() {
        if *id != genome.id() {
            return Err(ClanTuneError::InvalidAncestry(format!(
                "entry {} names {} but population holds {}",
                index,
                id,
                genome.id()
            )));
        }
        if !probability.is_finite() || *probability < 0.0 {
            return Err(ClanTuneError::InvalidAncestry(format!(
                "entry {} has invalid probability {}",
                index, probability
            )));
        }
    }
    let total: f64 = ancestry.iter().map(|(probability, _)| probability).sum();
    if (total - 1.0).abs() > ANCESTRY_SUM_TOLERANCE {
        return Err(ClanTuneError::InvalidAncestry(format!(
            "probabilities must sum to 1, got {}",
            total
        )));
    }
    Ok(())
}

fn check_length(ancestry: &Ancestry, population_size: usize) -> Result<()> {
    if ancestry.len() != population_size {
        return Err(ClanTuneError::InvalidAncestry(format!(
            "ancestry length ({}) must equal population size ({})",
            ancestry.len(),
            population_size
        )));
    }
    Ok(())
}

/// Probabilities of a declaration, in population order.
pub fn probabilities(ancestry: &Ancestry) -> Vec<f64> {
    ancestry.iter().map(|(probability, _)| *probability).collect()
}

/// Indices with a non-zero probability.
pub fn live_indices(ancestry: &Ancestry) -> Vec<usize> {
    ancestry
        .iter()
        .enumerate()
        .filter(|(_, (probability, _))| *probability > 0.0)
        .map(|(index, _)| index)
        .collect()
}

/// Decides how parent values combine into an offspring value.
pub trait CrossbreedingStrategy: Strategy {
    /// One-node hook. `template` and `sources` are flattened; `sources` is
    /// index-aligned with `ancestry`.
    fn combine_alleles(
        &self,
        template: &Allele,
        sources: &[Allele],
        ancestry: &Ancestry,
        rng: &mut dyn RandomSource,
    ) -> Result<Allele>;

    /// Offspring of `candidate` built over every crossbreedable node.
    fn crossbreed(
        &self,
        candidate: &Genome,
        population: &[Genome],
        ancestry: &Ancestry,
        rng: &mut dyn RandomSource,
    ) -> Result<Genome> {
        check_length(ancestry, population.len())?;
        candidate.synthesize_new_alleles(
            population,
            NodeFilter::crossbreedable(),
            |template, sources| self.combine_alleles(template, sources, ancestry, &mut *rng),
        )
    }
}

/// Perturbs values to explore the search space.
pub trait MutationStrategy: Strategy {
    /// One-node hook. `population` holds the same position across the
    /// population, never the allele being mutated.
    fn perturb_allele(
        &self,
        allele: &Allele,
        population: &[Allele],
        ancestry: &Ancestry,
        rng: &mut dyn RandomSource,
    ) -> Result<Allele>;

    /// Mutate every mutable node of `genome`. `genome` need not belong to
    /// `population`; when it does, its own entry (matched by id) is dropped
    /// from the donors together with its ancestry weight.
    fn mutate(
        &self,
        genome: &Genome,
        population: &[Genome],
        ancestry: &Ancestry,
        rng: &mut dyn RandomSource,
    ) -> Result<Genome> {
        check_length(ancestry, population.len())?;
        let (mut extended, donor_ancestry): (Vec<Genome>, Ancestry) = population
            .iter()
            .zip(ancestry.iter())
            .filter(|(member, _)| member.id() != genome.id())
            .map(|(member, entry)| (member.clone(), *entry))
            .unzip();
        // Template goes last so the donors are a prefix of every source list
        extended.push(genome.clone());

        synthesize_genome_population(
            genome,
            &extended,
            NodeFilter::mutable(),
            |template, sources| {
                let donors = &sources[..sources.len() - 1];
                self.perturb_allele(template, donors, &donor_ancestry, &mut *rng)
            },
        )
    }
}
