use super::traits::ConfigSection;
use crate::error::{ClanTuneError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Fixed run seed; a fresh one is drawn when absent.
    pub seed: Option<u64>,
    pub hall_of_fame_size: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 16,
            generations: 20,
            seed: None,
            hall_of_fame_size: 10,
        }
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(ClanTuneError::Configuration(
                "Population size must be at least 2".to_string(),
            ));
        }
        if self.generations == 0 {
            return Err(ClanTuneError::Configuration(
                "Generations must be at least 1".to_string(),
            ));
        }
        if self.hall_of_fame_size == 0 {
            return Err(ClanTuneError::Configuration(
                "Hall of fame size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EvolutionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_single_member_population() {
        let config = EvolutionConfig {
            population_size: 1,
            ..EvolutionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ClanTuneError::Configuration(_))
        ));
    }
}
