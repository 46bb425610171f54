use crate::accumulator::{SchemeError, SchemeParams, UpdateScheme};
use crate::drift::Distribution;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Statistic computed by a baseline test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestStatistic {
    #[serde(rename = "zValue")]
    ZValue,
    #[serde(rename = "CUSUM")]
    Cusum,
    #[serde(rename = "GLR")]
    Glr,
    #[serde(rename = "dDist", alias = "scalarProduct")]
    DiscreteDistribution,
    #[serde(rename = "chiSquareDistribution")]
    ChiSquareDistribution,
}

impl TestStatistic {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatistic::ZValue => "zValue",
            TestStatistic::Cusum => "CUSUM",
            TestStatistic::Glr => "GLR",
            TestStatistic::DiscreteDistribution => "dDist",
            TestStatistic::ChiSquareDistribution => "chiSquareDistribution",
        }
    }
}

impl fmt::Display for TestStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the discrete-distribution inner product is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Normalization {
    /// `<b,o> / ((|b|^2 + |o|^2) / 2)`
    #[default]
    SizeWeighted,
    /// `<b,o> / (|b| |o|)`
    Independent,
    /// Raw inner product.
    Unnormalized,
}

/// Baseline category counts. `sample` marks a normalized table whose counts
/// are fractions of a sample of that size.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CountTable {
    pub counts: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<f64>,
}

impl CountTable {
    pub fn total(&self) -> f64 {
        self.counts.values().sum()
    }

    pub fn norm_squared(&self) -> f64 {
        self.counts.values().map(|c| c * c).sum()
    }
}

/// Baseline model of a test: a parametric density or a count table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Baseline {
    Distribution(Distribution),
    Counts(CountTable),
}

impl Baseline {
    pub fn kind(&self) -> &'static str {
        match self {
            Baseline::Distribution(distribution) => distribution.name(),
            Baseline::Counts(_) => "counts",
        }
    }
}

/// Definition of one baseline drift test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDistributions {
    #[serde(rename = "testStatistic")]
    pub statistic: TestStatistic,
    pub threshold: f64,
    /// CUSUM reset floor.
    #[serde(default)]
    pub reset_value: f64,
    /// Test-level window; zero defers to the configured scheme.
    #[serde(default)]
    pub window_size: usize,
    /// Unset means independent for conditioned tests, size-weighted otherwise.
    #[serde(
        default,
        rename = "normalizationScheme",
        skip_serializing_if = "Option::is_none"
    )]
    pub normalization: Option<Normalization>,
    /// Discrete counts are kept per value of a conditioning field.
    #[serde(default)]
    pub conditioned: bool,
    pub baseline: Baseline,
    #[serde(default)]
    pub alternate: Option<Baseline>,
    /// Number of leading scores to suppress.
    #[serde(default)]
    pub skip: u64,
    /// Persisted CUSUM value to resume from.
    #[serde(default)]
    pub cusum_initialization: Option<f64>,
}

impl TestDistributions {
    pub fn new(statistic: TestStatistic, threshold: f64, baseline: Baseline) -> Self {
        Self {
            statistic,
            threshold,
            reset_value: 0.0,
            window_size: 0,
            normalization: None,
            conditioned: false,
            baseline,
            alternate: None,
            skip: 0,
            cusum_initialization: None,
        }
    }

    /// Normalization applied by the discrete-distribution test.
    pub fn normalization_scheme(&self) -> Normalization {
        match self.normalization {
            Some(normalization) => normalization,
            None if self.conditioned => Normalization::Independent,
            None => Normalization::SizeWeighted,
        }
    }
}

/// Update schemes used for scoring and for baseline production.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSchemes {
    pub consumer: UpdateScheme,
    pub producer: UpdateScheme,
}

impl Default for EngineSchemes {
    fn default() -> Self {
        Self {
            consumer: UpdateScheme::unweighted(),
            producer: UpdateScheme::unweighted(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SchemeDocument {
    scheme: String,
    #[serde(flatten)]
    params: SchemeParams,
}

/// Builds an [`UpdateScheme`] from `{"scheme": "window", "windowSize": 5, ...}`.
pub fn load_scheme(value: &Value) -> Result<UpdateScheme, ConfigError> {
    let document: SchemeDocument =
        serde_json::from_value(value.clone()).map_err(ConfigError::InvalidDocument)?;
    Ok(UpdateScheme::new(&document.scheme, document.params)?)
}

/// Reads `consumerUpdateScheme` and `producerUpdateScheme`; either may be
/// omitted, in which case it is unweighted.
pub fn load_engine_schemes(value: &Value) -> Result<EngineSchemes, ConfigError> {
    let object = value
        .as_object()
        .ok_or(ConfigError::NotAnObject("engine configuration"))?;
    let mut schemes = EngineSchemes::default();
    if let Some(consumer) = object.get("consumerUpdateScheme") {
        schemes.consumer = load_scheme(consumer)?;
    }
    if let Some(producer) = object.get("producerUpdateScheme") {
        schemes.producer = load_scheme(producer)?;
    }
    Ok(schemes)
}

pub fn load_test_distributions(value: &Value) -> Result<TestDistributions, ConfigError> {
    serde_json::from_value(value.clone()).map_err(ConfigError::InvalidDocument)
}

/// Errors surfaced while loading configuration documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be a JSON object")]
    NotAnObject(&'static str),
    #[error("invalid configuration document: {0}")]
    InvalidDocument(#[source] serde_json::Error),
    #[error(transparent)]
    Scheme(#[from] SchemeError),
}
