use super::allele::{Allele, Constraints};
use super::tree::{synthesize_allele_trees, walk_allele_trees, NodeFilter};
use crate::error::{ClanTuneError, Result};
use crate::types::{Ancestry, Value};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Named collection of allele trees plus identity, fitness and ancestry.
#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    id: Uuid,
    alleles: BTreeMap<String, Allele>,
    fitness: Option<f64>,
    ancestry: Option<Ancestry>,
    metadata: BTreeMap<String, serde_json::Value>,
}

/// Fields to replace in [`Genome::with_overrides`]. The outer `None` keeps
/// the current value; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct GenomeOverrides {
    pub id: Option<Uuid>,
    pub alleles: Option<BTreeMap<String, Allele>>,
    pub fitness: Option<Option<f64>>,
    pub ancestry: Option<Option<Ancestry>>,
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl Default for Genome {
    fn default() -> Self {
        Self::new()
    }
}

impl Genome {
    pub fn new() -> Self {
        Self::from_alleles(BTreeMap::new())
    }

    pub fn from_alleles(alleles: BTreeMap<String, Allele>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alleles,
            fitness: None,
            ancestry: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn alleles(&self) -> &BTreeMap<String, Allele> {
        &self.alleles
    }

    pub fn allele(&self, name: &str) -> Option<&Allele> {
        self.alleles.get(name)
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn ancestry(&self) -> Option<&Ancestry> {
        self.ancestry.as_ref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn get_metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Index of this genome in `population`, matched by id.
    pub fn position_in(&self, population: &[Genome]) -> Option<usize> {
        population.iter().position(|g| g.id == self.id)
    }

    /// Rebuild with explicit field replacements. Keeps the id unless one is given.
    pub fn with_overrides(&self, overrides: GenomeOverrides) -> Self {
        Self {
            id: overrides.id.unwrap_or(self.id),
            alleles: overrides.alleles.unwrap_or_else(|| self.alleles.clone()),
            fitness: overrides.fitness.unwrap_or(self.fitness),
            ancestry: overrides.ancestry.unwrap_or_else(|| self.ancestry.clone()),
            metadata: overrides.metadata.unwrap_or_else(|| self.metadata.clone()),
        }
    }

    /// Add a named hyperparameter built from a type tag, value and constraints.
    ///
    /// The result gets a new id; fitness and ancestry carry over.
    pub fn add_hyperparameter(
        &self,
        name: &str,
        tag: &str,
        value: impl Into<Value>,
        constraints: &Constraints,
    ) -> Result<Self> {
        if self.alleles.contains_key(name) {
            return Err(ClanTuneError::InvalidParameter(format!(
                "hyperparameter '{}' already exists",
                name
            )));
        }
        let allele = Allele::from_tag(tag, value, constraints)?;
        let mut alleles = self.alleles.clone();
        alleles.insert(name.to_string(), allele);
        Ok(self.with_overrides(GenomeOverrides {
            id: Some(Uuid::new_v4()),
            alleles: Some(alleles),
            ..GenomeOverrides::default()
        }))
    }

    /// Flat name to value mapping for a training loop.
    pub fn as_hyperparameters(&self) -> BTreeMap<String, Value> {
        self.alleles
            .iter()
            .map(|(name, allele)| (name.clone(), allele.value()))
            .collect()
    }

    /// Same individual, now scored.
    pub fn with_fitness(&self, fitness: f64) -> Self {
        self.with_overrides(GenomeOverrides {
            fitness: Some(Some(fitness)),
            ..GenomeOverrides::default()
        })
    }

    pub fn with_fitness_new_id(&self, fitness: f64) -> Self {
        self.with_overrides(GenomeOverrides {
            id: Some(Uuid::new_v4()),
            fitness: Some(Some(fitness)),
            ..GenomeOverrides::default()
        })
    }

    pub fn with_alleles(&self, alleles: BTreeMap<String, Allele>) -> Self {
        self.with_overrides(GenomeOverrides {
            id: Some(Uuid::new_v4()),
            alleles: Some(alleles),
            ..GenomeOverrides::default()
        })
    }

    pub fn with_ancestry(&self, ancestry: Ancestry) -> Self {
        self.with_overrides(GenomeOverrides {
            id: Some(Uuid::new_v4()),
            ancestry: Some(Some(ancestry)),
            ..GenomeOverrides::default()
        })
    }

    /// Set one genome-level metadata entry; keeps the id.
    pub fn with_metadata(&self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.insert(key.into(), value);
        self.with_overrides(GenomeOverrides {
            metadata: Some(metadata),
            ..GenomeOverrides::default()
        })
    }

    // Offspring: fresh id, unscored, no ancestry until one is attached.
    fn offspring(&self, alleles: BTreeMap<String, Allele>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alleles,
            fitness: None,
            ancestry: None,
            metadata: self.metadata.clone(),
        }
    }

    /// Transform this genome's own trees; see [`Allele::update_tree`].
    pub fn update_alleles<F>(&self, filter: NodeFilter, mut handler: F) -> Result<Self>
    where
        F: FnMut(&Allele) -> Result<Allele>,
    {
        let mut alleles = BTreeMap::new();
        for (name, allele) in &self.alleles {
            alleles.insert(name.clone(), allele.update_tree(filter, &mut handler)?);
        }
        Ok(self.offspring(alleles))
    }

    /// Synthesize offspring from `population` using this genome as the template.
    pub fn synthesize_new_alleles<F>(
        &self,
        population: &[Genome],
        filter: NodeFilter,
        handler: F,
    ) -> Result<Self>
    where
        F: FnMut(&Allele, &[Allele]) -> Result<Allele>,
    {
        synthesize_genome_population(self, population, filter, handler)
    }

    pub fn to_record(&self) -> serde_json::Value {
        let alleles: serde_json::Map<String, serde_json::Value> = self
            .alleles
            .iter()
            .map(|(name, allele)| (name.clone(), allele.to_record()))
            .collect();
        let ancestry = self.ancestry.as_ref().map(|entries| {
            entries
                .iter()
                .map(|(probability, id)| serde_json::json!([probability, id.to_string()]))
                .collect::<Vec<_>>()
        });
        serde_json::json!({
            "id": self.id.to_string(),
            "alleles": alleles,
            "fitness": self.fitness.map(encode_fitness),
            "ancestry": ancestry,
            "metadata": self.metadata,
        })
    }

    pub fn from_record(record: &serde_json::Value) -> Result<Self> {
        let parsed: GenomeRecord = serde_json::from_value(record.clone())?;
        let alleles = parsed
            .alleles
            .iter()
            .map(|(name, allele)| Ok((name.clone(), Allele::from_record(allele)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self {
            id: parsed.id,
            alleles,
            fitness: parsed.fitness.map(decode_fitness).transpose()?,
            ancestry: parsed.ancestry,
            metadata: parsed.metadata,
        })
    }
}

#[derive(Deserialize)]
struct GenomeRecord {
    id: Uuid,
    alleles: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    fitness: Option<serde_json::Value>,
    #[serde(default)]
    ancestry: Option<Ancestry>,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

// JSON numbers cannot hold non-finite floats, so those travel as strings.
fn encode_fitness(fitness: f64) -> serde_json::Value {
    if fitness.is_finite() {
        serde_json::json!(fitness)
    } else if fitness.is_nan() {
        serde_json::json!("nan")
    } else if fitness > 0.0 {
        serde_json::json!("inf")
    } else {
        serde_json::json!("-inf")
    }
}

fn decode_fitness(value: serde_json::Value) -> Result<f64> {
    match value {
        serde_json::Value::Number(number) => number.as_f64().ok_or_else(|| {
            ClanTuneError::SchemaMismatch(format!("fitness {} is not representable", number))
        }),
        serde_json::Value::String(text) => match text.as_str() {
            "inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            "nan" => Ok(f64::NAN),
            other => Err(ClanTuneError::SchemaMismatch(format!(
                "unknown fitness '{}'",
                other
            ))),
        },
        other => Err(ClanTuneError::SchemaMismatch(format!(
            "fitness must be a number, got {}",
            other
        ))),
    }
}

impl Serialize for Genome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Genome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = serde_json::Value::deserialize(deserializer)?;
        Genome::from_record(&record).map_err(serde::de::Error::custom)
    }
}

fn check_same_keys(genomes: &[Genome]) -> Result<()> {
    let Some(first) = genomes.first() else {
        return Ok(());
    };
    for genome in &genomes[1..] {
        if !genome.alleles.keys().eq(first.alleles.keys()) {
            return Err(ClanTuneError::HyperparameterMismatch(format!(
                "{:?} vs {:?}",
                first.alleles.keys().collect::<Vec<_>>(),
                genome.alleles.keys().collect::<Vec<_>>()
            )));
        }
    }
    Ok(())
}

/// Walk every hyperparameter across `genomes` in name order, collecting the
/// handler's non-`None` results.
pub fn walk_genome_population<T, F>(
    genomes: &[Genome],
    filter: NodeFilter,
    mut handler: F,
) -> Result<Vec<T>>
where
    F: FnMut(&[Allele]) -> Result<Option<T>>,
{
    check_same_keys(genomes)?;
    let Some(first) = genomes.first() else {
        return Ok(Vec::new());
    };

    let mut results = Vec::new();
    for name in first.alleles.keys() {
        let trees: Vec<&Allele> = genomes
            .iter()
            .filter_map(|genome| genome.alleles.get(name))
            .collect();
        for result in walk_allele_trees(&trees, filter, &mut handler)? {
            results.push(result?);
        }
    }
    Ok(results)
}

/// Synthesize one offspring genome from `population`, with `main` supplying
/// structure. `main` must be a member of `population` (matched by id).
pub fn synthesize_genome_population<F>(
    main: &Genome,
    population: &[Genome],
    filter: NodeFilter,
    mut handler: F,
) -> Result<Genome>
where
    F: FnMut(&Allele, &[Allele]) -> Result<Allele>,
{
    if population.is_empty() {
        return Err(ClanTuneError::ContractViolation(
            "synthesis requires a non-empty population".to_string(),
        ));
    }
    let template = main.position_in(population).ok_or_else(|| {
        ClanTuneError::ContractViolation("main genome must be present in population".to_string())
    })?;
    check_same_keys(population)?;

    let mut alleles = BTreeMap::new();
    for name in main.alleles.keys() {
        let sources: Vec<&Allele> = population
            .iter()
            .filter_map(|genome| genome.alleles.get(name))
            .collect();
        let synthesized = synthesize_allele_trees(&sources, template, filter, &mut handler)?;
        alleles.insert(name.clone(), synthesized);
    }
    Ok(main.offspring(alleles))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lr_genome(lr: f64) -> Genome {
        Genome::new()
            .add_hyperparameter("lr", "float", lr, &Constraints::default())
            .unwrap()
    }

    #[test]
    fn test_add_hyperparameter() {
        let genome = Genome::new()
            .add_hyperparameter("lr", "logfloat", 0.01, &Constraints::bounded(Some(1e-5), Some(1.0)))
            .unwrap()
            .add_hyperparameter("batch", "int", 32, &Constraints::bounded(Some(1.0), Some(512.0)))
            .unwrap();

        let values = genome.as_hyperparameters();
        assert_eq!(values["lr"], Value::Float(0.01));
        assert_eq!(values["batch"], Value::Integer(32));
    }

    #[test]
    fn test_add_hyperparameter_rejects_duplicates_and_unknown_tags() {
        let genome = lr_genome(0.01);
        assert!(genome
            .add_hyperparameter("lr", "float", 0.02, &Constraints::default())
            .is_err());
        assert!(matches!(
            genome.add_hyperparameter("x", "complex", 0.02, &Constraints::default()),
            Err(ClanTuneError::UnknownAlleleType(_))
        ));
    }

    #[test]
    fn test_add_hyperparameter_new_id_keeps_fitness() {
        let genome = lr_genome(0.01).with_fitness(0.5);
        let extended = genome
            .add_hyperparameter("wd", "float", 0.001, &Constraints::default())
            .unwrap();
        assert_ne!(extended.id(), genome.id());
        assert_eq!(extended.fitness(), Some(0.5));
    }

    #[test]
    fn test_identity_rules() {
        let genome = lr_genome(0.01);
        assert_eq!(genome.with_fitness(1.0).id(), genome.id());
        assert_ne!(genome.with_fitness_new_id(1.0).id(), genome.id());
        assert_ne!(genome.with_alleles(BTreeMap::new()).id(), genome.id());
        assert_ne!(genome.with_ancestry(Vec::new()).id(), genome.id());
        assert_eq!(genome.with_metadata("k", serde_json::json!(1)).id(), genome.id());
        assert_eq!(
            genome
                .with_overrides(GenomeOverrides {
                    fitness: Some(Some(2.0)),
                    ..GenomeOverrides::default()
                })
                .id(),
            genome.id()
        );
    }

    #[test]
    fn test_with_alleles_and_ancestry_preserve_other_fields() {
        let parent = Uuid::new_v4();
        let genome = lr_genome(0.01).with_fitness(0.85).with_ancestry(vec![(1.0, parent)]);

        let replaced = genome.with_alleles(BTreeMap::new());
        assert_eq!(replaced.fitness(), Some(0.85));
        assert_eq!(replaced.ancestry(), Some(&vec![(1.0, parent)]));

        let reparented = genome.with_ancestry(Vec::new());
        assert_eq!(reparented.alleles(), genome.alleles());
        assert_eq!(reparented.fitness(), Some(0.85));
    }

    #[test]
    fn test_update_alleles_clears_fitness_and_ancestry() {
        let genome = lr_genome(0.01)
            .with_fitness(0.3)
            .with_ancestry(vec![(1.0, Uuid::new_v4())])
            .with_metadata("note", serde_json::json!("kept"));
        let updated = genome
            .update_alleles(NodeFilter::ALL, |node| {
                node.with_value(node.value().as_f64().unwrap_or_default() * 10.0)
            })
            .unwrap();

        assert_ne!(updated.id(), genome.id());
        assert_eq!(updated.fitness(), None);
        assert_eq!(updated.ancestry(), None);
        assert_eq!(updated.get_metadata("note"), Some(&serde_json::json!("kept")));
        assert!((updated.as_hyperparameters()["lr"].as_f64().unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_synthesize_requires_member_main() {
        let a = lr_genome(0.01);
        let b = lr_genome(0.02);
        let err = synthesize_genome_population(&a, &[b], NodeFilter::ALL, |t, _| Ok(t.clone()))
            .unwrap_err();
        assert!(err.to_string().contains("main genome must be present"));

        let err = synthesize_genome_population(&a, &[], NodeFilter::ALL, |t, _| Ok(t.clone()))
            .unwrap_err();
        assert!(err.to_string().contains("non-empty population"));
    }

    #[test]
    fn test_population_key_mismatch() {
        let a = lr_genome(0.01);
        let b = Genome::new()
            .add_hyperparameter("wd", "float", 0.001, &Constraints::default())
            .unwrap();
        let population = vec![a.clone(), b];

        let err = walk_genome_population(&population, NodeFilter::ALL, |nodes| {
            Ok(nodes[0].value().as_f64())
        })
        .unwrap_err();
        assert!(err.to_string().contains("same hyperparameter keys"));

        let err = synthesize_genome_population(&a, &population, NodeFilter::ALL, |t, _| Ok(t.clone()))
            .unwrap_err();
        assert!(err.to_string().contains("same hyperparameter keys"));
    }

    #[test]
    fn test_record_round_trip() {
        let genome = lr_genome(0.1 + 0.2)
            .with_fitness(0.123456789)
            .with_ancestry(vec![(0.25, Uuid::new_v4()), (0.75, Uuid::new_v4())])
            .with_metadata("expression", serde_json::json!({"lr_path": "optimizer/0/lr"}));

        let text = serde_json::to_string(&genome).unwrap();
        let restored: Genome = serde_json::from_str(&text).unwrap();
        assert_eq!(restored, genome);
    }

    #[test]
    fn test_record_keeps_infinite_fitness() {
        let worst = lr_genome(0.5).with_fitness(f64::INFINITY);
        let record = worst.to_record();
        assert_eq!(record["fitness"], serde_json::json!("inf"));
        assert_eq!(Genome::from_record(&record).unwrap().fitness(), Some(f64::INFINITY));

        let text = serde_json::to_string(&lr_genome(0.5).with_fitness(f64::NEG_INFINITY)).unwrap();
        let restored: Genome = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.fitness(), Some(f64::NEG_INFINITY));

        let unscored = lr_genome(0.5).to_record();
        assert_eq!(Genome::from_record(&unscored).unwrap().fitness(), None);
    }

    #[test]
    fn test_record_rejects_unknown_fitness_text() {
        let mut record = lr_genome(0.5).to_record();
        record["fitness"] = serde_json::json!("worst");
        assert!(Genome::from_record(&record).is_err());
    }
}
