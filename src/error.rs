use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClanTuneError {
    #[error("Domain violation: {0}")]
    DomainViolation(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Structure mismatch: {0}")]
    StructureMismatch(String),

    #[error("Hyperparameter mismatch: genomes must have the same hyperparameter keys ({0})")]
    HyperparameterMismatch(String),

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Invalid ancestry: {0}")]
    InvalidAncestry(String),

    #[error("{strategy} requires {required} live parents, found {found}")]
    InsufficientParents {
        strategy: &'static str,
        required: String,
        found: usize,
    },

    #[error("Unknown allele type: {0}")]
    UnknownAlleleType(String),

    #[error("Missing 'type' field in serialized allele data")]
    MissingTypeTag,

    #[error("{strategy} does not support {kind} alleles")]
    UnsupportedAllele { strategy: &'static str, kind: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClanTuneError>;
