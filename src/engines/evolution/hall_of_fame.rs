use crate::engines::genetics::Genome;
use crate::types::Value;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Debug, Serialize)]
pub struct EliteGenome {
    pub genome: Genome,
    pub fitness: f64,
    pub generation: usize,
    pub hyperparameters: BTreeMap<String, Value>,
    #[serde(skip)]
    pub canonical_string: String, // For deduplication
}

impl EliteGenome {
    /// Snapshot an evaluated genome. Returns `None` while it is unscored.
    pub fn from_evaluated(genome: &Genome, generation: usize) -> Option<Self> {
        let fitness = genome.fitness()?;
        Some(Self {
            genome: genome.clone(),
            fitness,
            generation,
            hyperparameters: genome.as_hyperparameters(),
            canonical_string: get_canonical_signature(genome),
        })
    }
}

/// Best distinct genomes seen so far, lowest fitness first.
pub struct HallOfFame {
    entries: Vec<EliteGenome>,
    max_size: usize,
    seen_signatures: HashSet<String>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_size,
            seen_signatures: HashSet::new(),
        }
    }

    /// Attempt to add a genome to the Hall of Fame
    pub fn try_add(&mut self, elite: EliteGenome) -> bool {
        // Same expressed hyperparameters already recorded
        if self.seen_signatures.contains(&elite.canonical_string) {
            return false;
        }

        self.seen_signatures.insert(elite.canonical_string.clone());
        self.entries.push(elite);
        self.sort_and_trim();
        true
    }

    fn sort_and_trim(&mut self) {
        self.entries
            .sort_by(|a, b| a.fitness.total_cmp(&b.fitness));

        while self.entries.len() > self.max_size {
            if let Some(removed) = self.entries.pop() {
                self.seen_signatures.remove(&removed.canonical_string);
            }
        }
    }

    pub fn get_all(&self) -> &[EliteGenome] {
        &self.entries
    }

    pub fn best(&self) -> Option<&EliteGenome> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Mantissa digits after the point in a float signature (10 significant).
const SIGNATURE_DIGITS: usize = 9;

/// Name-ordered `name=value` pairs of the expressed hyperparameters, with
/// floats rounded to 10 significant digits so rounding noise deduplicates.
pub fn get_canonical_signature(genome: &Genome) -> String {
    genome
        .as_hyperparameters()
        .iter()
        .map(|(name, value)| format!("{}={}", name, signature_value(value)))
        .collect::<Vec<_>>()
        .join(";")
}

fn signature_value(value: &Value) -> String {
    match value {
        // -0.0 and 0.0 express the same setting
        Value::Float(x) if *x == 0.0 => format!("{:.*e}", SIGNATURE_DIGITS, 0.0),
        Value::Float(x) => format!("{:.*e}", SIGNATURE_DIGITS, x),
        Value::Integer(i) => i.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => format!("{:?}", s),
    }
}
