pub mod ancestry;
pub mod crossbreeding;
pub mod mutation;
pub mod orchestrator;
pub mod traits;

pub use ancestry::{BoltzmannSelection, EliteBreeds, RankSelection, TopN, TournamentSelection};
pub use crossbreeding::{DominantParent, SimulatedBinaryCrossover, StochasticCrossover, WeightedAverage};
pub use mutation::{CauchyMutation, DifferentialEvolution, GaussianMutation, SamplingMode, UniformMutation};
pub use orchestrator::StrategyOrchestrator;
pub use traits::{
    live_indices, probabilities, validate_ancestry, AncestryStrategy, CrossbreedingStrategy,
    MutationStrategy, Strategy,
};
