#![allow(dead_code)]

use clantune::engines::genetics::{Allele, Genome, RandomSource};
use clantune::types::Ancestry;
use std::collections::{BTreeMap, VecDeque};

/// Replays fixed draws so strategy arithmetic can be checked exactly.
#[derive(Debug, Default)]
pub struct ScriptedRandom {
    uniforms: VecDeque<f64>,
    gaussians: VecDeque<f64>,
    indices: VecDeque<usize>,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uniforms(mut self, draws: impl IntoIterator<Item = f64>) -> Self {
        self.uniforms.extend(draws);
        self
    }

    pub fn gaussians(mut self, draws: impl IntoIterator<Item = f64>) -> Self {
        self.gaussians.extend(draws);
        self
    }

    pub fn indices(mut self, draws: impl IntoIterator<Item = usize>) -> Self {
        self.indices.extend(draws);
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.uniforms.is_empty() && self.gaussians.is_empty() && self.indices.is_empty()
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform(&mut self) -> f64 {
        self.uniforms.pop_front().expect("uniform script exhausted")
    }

    fn gaussian(&mut self) -> f64 {
        self.gaussians.pop_front().expect("gaussian script exhausted")
    }

    fn choose_index(&mut self, len: usize) -> usize {
        let index = self.indices.pop_front().expect("index script exhausted");
        assert!(index < len, "scripted index {} out of range {}", index, len);
        index
    }
}

/// Genome with a single unbounded float allele `x`.
pub fn float_genome(x: f64) -> Genome {
    let mut alleles = BTreeMap::new();
    alleles.insert("x".to_string(), Allele::float(x, None, None).unwrap());
    Genome::from_alleles(alleles)
}

/// Population of `x` genomes scored with the given fitness values.
pub fn scored_population(values: &[f64], fitness: &[f64]) -> Vec<Genome> {
    values
        .iter()
        .zip(fitness)
        .map(|(x, f)| float_genome(*x).with_fitness(*f))
        .collect()
}

pub fn ancestry_for(population: &[Genome], probabilities: &[f64]) -> Ancestry {
    probabilities
        .iter()
        .zip(population)
        .map(|(p, genome)| (*p, genome.id()))
        .collect()
}

pub fn uniform_ancestry(population: &[Genome]) -> Ancestry {
    let p = 1.0 / population.len() as f64;
    population.iter().map(|genome| (p, genome.id())).collect()
}

pub fn probabilities(ancestry: &Ancestry) -> Vec<f64> {
    ancestry.iter().map(|(p, _)| *p).collect()
}

pub fn x_of(genome: &Genome) -> f64 {
    genome.allele("x").and_then(Allele::raw_value).unwrap()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
