pub mod benchmark;
pub mod engine;
pub mod hall_of_fame;
pub mod progress;

pub use benchmark::TargetDistance;
pub use engine::{EvolutionEngine, FitnessEvaluator};
pub use hall_of_fame::{get_canonical_signature, EliteGenome, HallOfFame};
pub use progress::{
    ChannelProgressCallback, GenerationSummary, LoggingProgressCallback, ProgressCallback,
    ProgressMessage,
};
