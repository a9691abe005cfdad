pub mod allele;
pub mod genome;
pub mod random;
pub mod tree;

pub use allele::{Allele, AlleleOverrides, AlleleType, Constraints, Domain, MetaValue};
pub use genome::{synthesize_genome_population, walk_genome_population, Genome, GenomeOverrides};
pub use random::{RandomSource, RngSource};
pub use tree::{synthesize_allele_trees, walk_allele_trees, NodeFilter, Walk};
