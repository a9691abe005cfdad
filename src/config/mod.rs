pub mod evolution;
pub mod manager;
pub mod search_space;
pub mod strategies;
pub mod traits;

pub use evolution::EvolutionConfig;
pub use manager::{AppConfig, ConfigManager, ENV_PREFIX};
pub use search_space::{HyperparameterConfig, SearchSpaceConfig};
pub use strategies::{AncestryChoice, CrossbreedingChoice, MutationChoice, StrategyConfig};
pub use traits::ConfigSection;
