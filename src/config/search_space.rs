use super::traits::ConfigSection;
use crate::engines::genetics::{Constraints, Genome};
use crate::error::{ClanTuneError, Result};
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

fn default_true() -> bool {
    true
}

/// One tunable hyperparameter of the founding genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterConfig {
    pub name: String,
    /// Allele type tag: float, logfloat, int, bool or string.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default = "default_true")]
    pub can_mutate: bool,
    #[serde(default = "default_true")]
    pub can_crossbreed: bool,
    /// Optimum used by the benchmark evaluator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,
}

impl HyperparameterConfig {
    pub fn constraints(&self) -> Constraints {
        Constraints {
            min: self.min,
            max: self.max,
            options: self.options.clone(),
            can_mutate: self.can_mutate,
            can_crossbreed: self.can_crossbreed,
            ..Constraints::default()
        }
    }

    fn numeric(name: &str, kind: &str, value: f64, min: f64, max: f64, target: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            value: Value::Float(value),
            min: Some(min),
            max: Some(max),
            options: Vec::new(),
            can_mutate: true,
            can_crossbreed: true,
            target: Some(Value::Float(target)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpaceConfig {
    pub hyperparameters: Vec<HyperparameterConfig>,
}

impl Default for SearchSpaceConfig {
    fn default() -> Self {
        Self {
            hyperparameters: vec![
                HyperparameterConfig::numeric("learning_rate", "logfloat", 0.01, 1e-5, 1.0, 0.003),
                HyperparameterConfig::numeric("momentum", "float", 0.5, 0.0, 1.0, 0.9),
                HyperparameterConfig::numeric("batch_size", "int", 32.0, 8.0, 512.0, 128.0),
            ],
        }
    }
}

impl SearchSpaceConfig {
    /// Founding genome holding every configured hyperparameter.
    pub fn founder(&self) -> Result<Genome> {
        self.hyperparameters
            .iter()
            .try_fold(Genome::new(), |genome, hp| {
                genome.add_hyperparameter(&hp.name, &hp.kind, hp.value.clone(), &hp.constraints())
            })
    }

    pub fn targets(&self) -> BTreeMap<String, Value> {
        self.hyperparameters
            .iter()
            .filter_map(|hp| hp.target.clone().map(|t| (hp.name.clone(), t)))
            .collect()
    }
}

impl ConfigSection for SearchSpaceConfig {
    fn section_name() -> &'static str {
        "search_space"
    }

    fn validate(&self) -> Result<()> {
        if self.hyperparameters.is_empty() {
            return Err(ClanTuneError::Configuration(
                "Search space must declare at least one hyperparameter".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for hp in &self.hyperparameters {
            if !seen.insert(hp.name.as_str()) {
                return Err(ClanTuneError::Configuration(format!(
                    "Hyperparameter '{}' is declared twice",
                    hp.name
                )));
            }
        }
        self.founder().map(|_| ())
    }
}
