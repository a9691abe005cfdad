//! Synthetic fitness for exercising the engine without a training loop.

use super::engine::FitnessEvaluator;
use crate::config::SearchSpaceConfig;
use crate::engines::genetics::AlleleType;
use crate::error::{ClanTuneError, Result};
use crate::types::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct TargetTerm {
    target: Value,
    kind: AlleleType,
    span: f64,
}

/// Sum of per-hyperparameter distances to configured targets.
///
/// Log alleles are compared in log space, bounded numerics are scaled by
/// their range, and bool or string alleles score 0 on a match and 1 otherwise.
#[derive(Debug, Clone)]
pub struct TargetDistance {
    terms: BTreeMap<String, TargetTerm>,
}

impl TargetDistance {
    pub fn from_search_space(space: &SearchSpaceConfig) -> Result<Self> {
        let mut terms = BTreeMap::new();
        for hp in &space.hyperparameters {
            let Some(target) = hp.target.clone() else {
                continue;
            };
            let kind: AlleleType = hp.kind.parse()?;
            if kind == AlleleType::LogFloat && !target.as_f64().is_some_and(|t| t > 0.0) {
                return Err(ClanTuneError::Configuration(format!(
                    "target for log hyperparameter '{}' must be positive",
                    hp.name
                )));
            }
            let span = match (hp.min, hp.max) {
                (Some(min), Some(max)) if max > min && kind != AlleleType::LogFloat => max - min,
                _ => 1.0,
            };
            terms.insert(hp.name.clone(), TargetTerm { target, kind, span });
        }
        Ok(Self { terms })
    }

    fn distance(term: &TargetTerm, value: &Value) -> Result<f64> {
        if !term.kind.is_numeric() {
            return Ok(if *value == term.target { 0.0 } else { 1.0 });
        }
        let (Some(v), Some(t)) = (value.as_f64(), term.target.as_f64()) else {
            return Err(ClanTuneError::TypeMismatch {
                expected: "numeric value".to_string(),
                actual: value.type_name().to_string(),
            });
        };
        Ok(match term.kind {
            AlleleType::LogFloat => (v.ln() - t.ln()).abs(),
            _ => (v - t).abs() / term.span,
        })
    }
}

impl FitnessEvaluator for TargetDistance {
    fn evaluate(&self, hyperparameters: &BTreeMap<String, Value>) -> Result<f64> {
        let mut total = 0.0;
        for (name, term) in &self.terms {
            let value = hyperparameters.get(name).ok_or_else(|| {
                ClanTuneError::InvalidParameter(format!("hyperparameter '{}' is missing", name))
            })?;
            total += Self::distance(term, value)?;
        }
        Ok(total)
    }
}
