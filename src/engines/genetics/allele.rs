//! Typed, immutable evolvable values.
//!
//! An allele couples a value with its domain, two participation flags and a
//! metadata map. Metadata entries are either raw JSON scalars or further
//! alleles, so control parameters (a mutation step size, a crossover index)
//! can evolve through the same machinery as the value they govern.
//!
//! Every value-replacing operation goes through [`Allele::with_overrides`],
//! which re-applies the domain rules: numeric domains clamp, finite domains
//! reject.

use crate::error::{ClanTuneError, Result};
use crate::types::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Variant tag of an allele; doubles as the persisted `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlleleType {
    Float,
    LogFloat,
    Int,
    Bool,
    String,
}

impl AlleleType {
    pub fn tag(&self) -> &'static str {
        match self {
            AlleleType::Float => "float",
            AlleleType::LogFloat => "logfloat",
            AlleleType::Int => "int",
            AlleleType::Bool => "bool",
            AlleleType::String => "string",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, AlleleType::Float | AlleleType::LogFloat | AlleleType::Int)
    }
}

impl fmt::Display for AlleleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for AlleleType {
    type Err = ClanTuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "float" => Ok(AlleleType::Float),
            "logfloat" => Ok(AlleleType::LogFloat),
            "int" => Ok(AlleleType::Int),
            "bool" => Ok(AlleleType::Bool),
            "string" => Ok(AlleleType::String),
            other => Err(ClanTuneError::UnknownAlleleType(other.to_string())),
        }
    }
}

/// Variant-specific constraints on an allele's value
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    Float { min: Option<f64>, max: Option<f64> },
    LogFloat { min: f64, max: Option<f64> },
    Int { min: Option<i64>, max: Option<i64> },
    Bool,
    String(BTreeSet<String>),
}

impl Domain {
    pub fn allele_type(&self) -> AlleleType {
        match self {
            Domain::Float { .. } => AlleleType::Float,
            Domain::LogFloat { .. } => AlleleType::LogFloat,
            Domain::Int { .. } => AlleleType::Int,
            Domain::Bool => AlleleType::Bool,
            Domain::String(_) => AlleleType::String,
        }
    }

    /// Lower and upper bound as floats, when the domain is numeric and closed.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Domain::Float { min: Some(lo), max: Some(hi) } => Some((*lo, *hi)),
            Domain::LogFloat { min, max: Some(hi) } => Some((*min, *hi)),
            Domain::Int { min: Some(lo), max: Some(hi) } => Some((*lo as f64, *hi as f64)),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Domain::Float { min, max } => check_order(*min, *max),
            Domain::LogFloat { min, max } => {
                if !(*min > 0.0) {
                    return Err(ClanTuneError::InvalidDomain(format!(
                        "log domain requires min > 0, got {}",
                        min
                    )));
                }
                check_order(Some(*min), *max)
            }
            Domain::Int { min, max } => {
                check_order(min.map(|m| m as f64), max.map(|m| m as f64))
            }
            Domain::Bool => Ok(()),
            Domain::String(options) => {
                if options.is_empty() {
                    return Err(ClanTuneError::InvalidDomain(
                        "string domain must list at least one option".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Validate `value` against this domain, clamping numeric variants.
    fn admit(&self, value: Value) -> Result<Value> {
        match self {
            Domain::Float { min, max } => self.admit_numeric(&value, *min, *max),
            Domain::LogFloat { min, max } => self.admit_numeric(&value, Some(*min), *max),
            Domain::Int { min, max } => {
                self.admit_numeric(&value, min.map(|m| m as f64), max.map(|m| m as f64))
            }
            Domain::Bool => match value {
                Value::Bool(b) => Ok(Value::Bool(b)),
                other => Err(ClanTuneError::DomainViolation(format!(
                    "value {} is outside the boolean domain",
                    other
                ))),
            },
            Domain::String(options) => match value {
                Value::String(s) if options.contains(&s) => Ok(Value::String(s)),
                other => Err(ClanTuneError::DomainViolation(format!(
                    "value '{}' is not in domain {:?}",
                    other, options
                ))),
            },
        }
    }

    fn numeric(&self, value: &Value) -> Result<f64> {
        let x = value.as_f64().ok_or_else(|| ClanTuneError::TypeMismatch {
            expected: format!("numeric value for {} allele", self.allele_type()),
            actual: value.type_name().to_string(),
        })?;
        if x.is_nan() {
            return Err(ClanTuneError::DomainViolation(format!(
                "NaN is not a valid {} value",
                self.allele_type()
            )));
        }
        Ok(x)
    }

    // Records store plain JSON numbers, so only finite values survive clamping.
    fn admit_numeric(&self, value: &Value, min: Option<f64>, max: Option<f64>) -> Result<Value> {
        let x = clamp(self.numeric(value)?, min, max);
        if !x.is_finite() {
            return Err(ClanTuneError::DomainViolation(format!(
                "{} is not a valid {} value",
                x,
                self.allele_type()
            )));
        }
        Ok(Value::Float(x))
    }
}

fn check_order(min: Option<f64>, max: Option<f64>) -> Result<()> {
    if let Some(bound) = min.into_iter().chain(max).find(|b| !b.is_finite()) {
        return Err(ClanTuneError::InvalidDomain(format!(
            "bounds must be finite, got {}",
            bound
        )));
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(ClanTuneError::InvalidDomain(format!(
                "min ({}) must not exceed max ({})",
                lo, hi
            )));
        }
    }
    Ok(())
}

fn clamp(x: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let mut x = x;
    if let Some(lo) = min {
        if x < lo {
            x = lo;
        }
    }
    if let Some(hi) = max {
        if x > hi {
            x = hi;
        }
    }
    x
}

/// A metadata entry: either a nested allele or a constant raw value
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Allele(Allele),
    Raw(serde_json::Value),
}

impl MetaValue {
    pub fn as_allele(&self) -> Option<&Allele> {
        match self {
            MetaValue::Allele(a) => Some(a),
            MetaValue::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&serde_json::Value> {
        match self {
            MetaValue::Raw(v) => Some(v),
            MetaValue::Allele(_) => None,
        }
    }

    pub fn is_allele(&self) -> bool {
        matches!(self, MetaValue::Allele(_))
    }

    /// Numeric reading of either a raw number or a nested numeric allele.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Raw(v) => v.as_f64(),
            MetaValue::Allele(a) => a.value().as_f64(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Raw(v) => v.as_str(),
            MetaValue::Allele(a) => match &a.raw {
                Value::String(s) => Some(s),
                _ => None,
            },
        }
    }
}

impl From<Allele> for MetaValue {
    fn from(a: Allele) -> Self {
        MetaValue::Allele(a)
    }
}

impl From<serde_json::Value> for MetaValue {
    fn from(v: serde_json::Value) -> Self {
        MetaValue::Raw(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Raw(serde_json::Value::from(v))
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Raw(serde_json::Value::from(v))
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Raw(serde_json::Value::Bool(v))
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Raw(serde_json::Value::String(v.to_string()))
    }
}

/// Constructor arguments to replace when rebuilding an allele.
/// Unset fields keep the current state.
#[derive(Debug, Clone, Default)]
pub struct AlleleOverrides {
    pub value: Option<Value>,
    pub domain: Option<Domain>,
    pub can_mutate: Option<bool>,
    pub can_crossbreed: Option<bool>,
    pub metadata: Option<BTreeMap<String, MetaValue>>,
}

/// Loosely-typed constraints used when building an allele from a type tag
#[derive(Debug, Clone)]
pub struct Constraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub options: Vec<String>,
    pub can_mutate: bool,
    pub can_crossbreed: bool,
    pub metadata: BTreeMap<String, MetaValue>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            options: Vec::new(),
            can_mutate: true,
            can_crossbreed: true,
            metadata: BTreeMap::new(),
        }
    }
}

impl Constraints {
    pub fn bounded(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }

    pub fn options<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allele {
    domain: Domain,
    // Numeric variants always hold Value::Float; integers keep their backing float here.
    raw: Value,
    can_mutate: bool,
    can_crossbreed: bool,
    metadata: BTreeMap<String, MetaValue>,
}

impl Allele {
    /// Build an allele with both flags enabled and empty metadata.
    pub fn new(domain: Domain, value: impl Into<Value>) -> Result<Self> {
        Self::build(domain, value.into(), true, true, BTreeMap::new())
    }

    pub fn float(value: f64, min: Option<f64>, max: Option<f64>) -> Result<Self> {
        Self::new(Domain::Float { min, max }, value)
    }

    pub fn log_float(value: f64, min: f64, max: Option<f64>) -> Result<Self> {
        Self::new(Domain::LogFloat { min, max }, value)
    }

    pub fn int(value: f64, min: Option<i64>, max: Option<i64>) -> Result<Self> {
        Self::new(Domain::Int { min, max }, value)
    }

    pub fn boolean(value: bool) -> Result<Self> {
        Self::new(Domain::Bool, value)
    }

    pub fn string<I, S>(value: &str, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.into_iter().map(Into::into).collect();
        Self::new(Domain::String(options), value)
    }

    /// Build an allele from a variant tag (`float`, `logfloat`, `int`, `bool`, `string`).
    pub fn from_tag(tag: &str, value: impl Into<Value>, constraints: &Constraints) -> Result<Self> {
        let domain = match tag.parse::<AlleleType>()? {
            AlleleType::Float => Domain::Float {
                min: constraints.min,
                max: constraints.max,
            },
            AlleleType::LogFloat => Domain::LogFloat {
                min: constraints.min.ok_or_else(|| {
                    ClanTuneError::InvalidDomain("log allele requires a min bound".to_string())
                })?,
                max: constraints.max,
            },
            AlleleType::Int => Domain::Int {
                min: constraints.min.map(|m| m.round() as i64),
                max: constraints.max.map(|m| m.round() as i64),
            },
            AlleleType::Bool => Domain::Bool,
            AlleleType::String => {
                Domain::String(constraints.options.iter().cloned().collect())
            }
        };
        Self::build(
            domain,
            value.into(),
            constraints.can_mutate,
            constraints.can_crossbreed,
            constraints.metadata.clone(),
        )
    }

    fn build(
        domain: Domain,
        value: Value,
        can_mutate: bool,
        can_crossbreed: bool,
        metadata: BTreeMap<String, MetaValue>,
    ) -> Result<Self> {
        domain.validate()?;
        let raw = domain.admit(value)?;
        Ok(Self {
            domain,
            raw,
            can_mutate,
            can_crossbreed,
            metadata,
        })
    }

    pub fn allele_type(&self) -> AlleleType {
        self.domain.allele_type()
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The typed value. Integer alleles round their backing float (ties to even).
    pub fn value(&self) -> Value {
        match (&self.domain, &self.raw) {
            (Domain::Int { .. }, Value::Float(x)) => Value::Integer(x.round_ties_even() as i64),
            (_, raw) => raw.clone(),
        }
    }

    /// The backing float of a numeric allele; `None` for bool and string alleles.
    pub fn raw_value(&self) -> Option<f64> {
        if self.allele_type().is_numeric() {
            self.raw.as_f64()
        } else {
            None
        }
    }

    // Stored value before the integer view is applied.
    pub(crate) fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn can_mutate(&self) -> bool {
        self.can_mutate
    }

    pub fn can_crossbreed(&self) -> bool {
        self.can_crossbreed
    }

    pub fn metadata(&self) -> &BTreeMap<String, MetaValue> {
        &self.metadata
    }

    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(MetaValue::as_f64)
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetaValue::as_str)
    }

    /// Rebuild through the constructor; every value change lands here.
    pub fn with_overrides(&self, overrides: AlleleOverrides) -> Result<Self> {
        Self::build(
            overrides.domain.unwrap_or_else(|| self.domain.clone()),
            overrides.value.unwrap_or_else(|| self.raw.clone()),
            overrides.can_mutate.unwrap_or(self.can_mutate),
            overrides.can_crossbreed.unwrap_or(self.can_crossbreed),
            overrides.metadata.unwrap_or_else(|| self.metadata.clone()),
        )
    }

    pub fn with_value(&self, value: impl Into<Value>) -> Result<Self> {
        self.with_overrides(AlleleOverrides {
            value: Some(value.into()),
            ..AlleleOverrides::default()
        })
    }

    pub fn with_flags(&self, can_mutate: bool, can_crossbreed: bool) -> Self {
        Self {
            can_mutate,
            can_crossbreed,
            ..self.clone()
        }
    }

    /// Add or replace one metadata entry.
    pub fn with_metadata(&self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.insert(key.into(), value.into());
        self.replace_metadata(metadata)
    }

    // Metadata never feeds into value validation, so no revalidation is needed.
    pub(crate) fn replace_metadata(&self, metadata: BTreeMap<String, MetaValue>) -> Self {
        Self {
            domain: self.domain.clone(),
            raw: self.raw.clone(),
            can_mutate: self.can_mutate,
            can_crossbreed: self.can_crossbreed,
            metadata,
        }
    }

    /// Replace allele-valued metadata with their plain values, one level deep.
    pub fn flatten(&self) -> Self {
        let metadata = self
            .metadata
            .iter()
            .map(|(key, entry)| {
                let flat = match entry {
                    MetaValue::Allele(child) => MetaValue::Raw(child.value().to_json()),
                    MetaValue::Raw(raw) => MetaValue::Raw(raw.clone()),
                };
                (key.clone(), flat)
            })
            .collect();
        self.replace_metadata(metadata)
    }

    /// Merge resolved entries back over this allele's metadata.
    /// Keys absent from `resolved` keep their current entry.
    pub fn unflatten(&self, resolved: &BTreeMap<String, MetaValue>) -> Self {
        let mut metadata = self.metadata.clone();
        for (key, entry) in resolved {
            metadata.insert(key.clone(), entry.clone());
        }
        self.replace_metadata(metadata)
    }

    /// Self-describing record: type tag, variant fields, flags, nested metadata.
    pub fn to_record(&self) -> serde_json::Value {
        let node = match (&self.domain, &self.raw) {
            (Domain::Float { min, max }, raw) => NodeRecord::Float {
                value: raw.as_f64().unwrap_or_default(),
                domain: Bounds { min: *min, max: *max },
                can_mutate: self.can_mutate,
                can_crossbreed: self.can_crossbreed,
            },
            (Domain::LogFloat { min, max }, raw) => NodeRecord::LogFloat {
                value: raw.as_f64().unwrap_or_default(),
                domain: Bounds { min: Some(*min), max: *max },
                can_mutate: self.can_mutate,
                can_crossbreed: self.can_crossbreed,
            },
            (Domain::Int { min, max }, raw) => NodeRecord::Int {
                raw_value: raw.as_f64().unwrap_or_default(),
                domain: Bounds { min: *min, max: *max },
                can_mutate: self.can_mutate,
                can_crossbreed: self.can_crossbreed,
            },
            (Domain::Bool, raw) => NodeRecord::Bool {
                value: raw.as_bool().unwrap_or_default(),
                can_mutate: self.can_mutate,
                can_crossbreed: self.can_crossbreed,
            },
            (Domain::String(options), raw) => NodeRecord::String {
                value: raw.as_str().unwrap_or_default().to_string(),
                domain: options.clone(),
                can_mutate: self.can_mutate,
                can_crossbreed: self.can_crossbreed,
            },
        };

        let mut record = match serde_json::to_value(node) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        let metadata = self
            .metadata
            .iter()
            .map(|(key, entry)| {
                let value = match entry {
                    MetaValue::Allele(child) => child.to_record(),
                    MetaValue::Raw(raw) => raw.clone(),
                };
                (key.clone(), value)
            })
            .collect::<serde_json::Map<_, _>>();
        record.insert("metadata".to_string(), serde_json::Value::Object(metadata));
        serde_json::Value::Object(record)
    }

    /// Rebuild an allele tree from [`Allele::to_record`] output.
    pub fn from_record(record: &serde_json::Value) -> Result<Self> {
        let fields = record.as_object().ok_or_else(|| {
            ClanTuneError::ContractViolation("serialized allele must be an object".to_string())
        })?;
        let tag = fields
            .get("type")
            .ok_or(ClanTuneError::MissingTypeTag)?
            .as_str()
            .ok_or_else(|| ClanTuneError::UnknownAlleleType(fields["type"].to_string()))?;
        tag.parse::<AlleleType>()?;

        let mut metadata = BTreeMap::new();
        if let Some(entries) = fields.get("metadata").and_then(|m| m.as_object()) {
            for (key, entry) in entries {
                let value = if is_allele_record(entry) {
                    MetaValue::Allele(Self::from_record(entry)?)
                } else {
                    MetaValue::Raw(entry.clone())
                };
                metadata.insert(key.clone(), value);
            }
        }

        let node: NodeRecord = serde_json::from_value(record.clone())?;
        let (domain, value, can_mutate, can_crossbreed) = match node {
            NodeRecord::Float { value, domain, can_mutate, can_crossbreed } => (
                Domain::Float { min: domain.min, max: domain.max },
                Value::Float(value),
                can_mutate,
                can_crossbreed,
            ),
            NodeRecord::LogFloat { value, domain, can_mutate, can_crossbreed } => (
                Domain::LogFloat {
                    min: domain.min.ok_or_else(|| {
                        ClanTuneError::InvalidDomain("log allele requires a min bound".to_string())
                    })?,
                    max: domain.max,
                },
                Value::Float(value),
                can_mutate,
                can_crossbreed,
            ),
            NodeRecord::Int { raw_value, domain, can_mutate, can_crossbreed } => (
                Domain::Int { min: domain.min, max: domain.max },
                Value::Float(raw_value),
                can_mutate,
                can_crossbreed,
            ),
            NodeRecord::Bool { value, can_mutate, can_crossbreed } => {
                (Domain::Bool, Value::Bool(value), can_mutate, can_crossbreed)
            }
            NodeRecord::String { value, domain, can_mutate, can_crossbreed } => (
                Domain::String(domain),
                Value::String(value),
                can_mutate,
                can_crossbreed,
            ),
        };

        Self::build(domain, value, can_mutate, can_crossbreed, metadata)
    }
}

fn is_allele_record(value: &serde_json::Value) -> bool {
    value
        .as_object()
        .map(|fields| fields.contains_key("type"))
        .unwrap_or(false)
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct Bounds<T> {
    #[serde(default)]
    min: Option<T>,
    #[serde(default)]
    max: Option<T>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum NodeRecord {
    Float {
        value: f64,
        domain: Bounds<f64>,
        #[serde(default = "default_true")]
        can_mutate: bool,
        #[serde(default = "default_true")]
        can_crossbreed: bool,
    },
    #[serde(rename = "logfloat")]
    LogFloat {
        value: f64,
        domain: Bounds<f64>,
        #[serde(default = "default_true")]
        can_mutate: bool,
        #[serde(default = "default_true")]
        can_crossbreed: bool,
    },
    Int {
        raw_value: f64,
        domain: Bounds<i64>,
        #[serde(default = "default_true")]
        can_mutate: bool,
        #[serde(default = "default_true")]
        can_crossbreed: bool,
    },
    Bool {
        value: bool,
        #[serde(default = "default_true")]
        can_mutate: bool,
        #[serde(default = "default_true")]
        can_crossbreed: bool,
    },
    String {
        value: String,
        domain: BTreeSet<String>,
        #[serde(default = "default_true")]
        can_mutate: bool,
        #[serde(default = "default_true")]
        can_crossbreed: bool,
    },
}

impl Serialize for Allele {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Allele {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = serde_json::Value::deserialize(deserializer)?;
        Allele::from_record(&record).map_err(serde::de::Error::custom)
    }
}
