use super::traits::{live_indices, AncestryStrategy, CrossbreedingStrategy, MutationStrategy};
use crate::engines::genetics::{Genome, RandomSource};
use crate::error::Result;
use log::debug;

/// One strategy per role, run as a fixed reproduction cycle.
pub struct StrategyOrchestrator {
    ancestry: Box<dyn AncestryStrategy>,
    crossbreeding: Box<dyn CrossbreedingStrategy>,
    mutation: Box<dyn MutationStrategy>,
}

impl StrategyOrchestrator {
    pub fn new(
        ancestry: Box<dyn AncestryStrategy>,
        crossbreeding: Box<dyn CrossbreedingStrategy>,
        mutation: Box<dyn MutationStrategy>,
    ) -> Self {
        Self {
            ancestry,
            crossbreeding,
            mutation,
        }
    }

    pub fn ancestry_strategy(&self) -> &dyn AncestryStrategy {
        self.ancestry.as_ref()
    }

    pub fn crossbreeding_strategy(&self) -> &dyn CrossbreedingStrategy {
        self.crossbreeding.as_ref()
    }

    pub fn mutation_strategy(&self) -> &dyn MutationStrategy {
        self.mutation.as_ref()
    }

    /// Chain setup through ancestry, crossbreeding, then mutation.
    pub fn setup_genome(&self, genome: &Genome) -> Result<Genome> {
        let genome = self.ancestry.setup_genome(genome)?;
        let genome = self.crossbreeding.setup_genome(&genome)?;
        self.mutation.setup_genome(&genome)
    }

    /// Select, crossbreed, mutate, then attach the ancestry.
    pub fn reproduce(
        &self,
        candidate: &Genome,
        population: &[Genome],
        rng: &mut dyn RandomSource,
    ) -> Result<Genome> {
        let ancestry = self.ancestry.select(candidate, population, rng)?;
        debug!(
            "Reproducing {} from {} live parents",
            candidate.id(),
            live_indices(&ancestry).len()
        );
        let offspring = self.crossbreeding.crossbreed(candidate, population, &ancestry, rng)?;
        let mutated = self.mutation.mutate(&offspring, population, &ancestry, rng)?;
        Ok(mutated.with_ancestry(ancestry))
    }
}
