//! Baseline drift tests scored one event at a time.

pub mod chisquare;
pub mod cusum;
pub mod discrete;
pub mod distribution;
pub mod glr;
pub mod producer;
pub mod zvalue;

pub use discrete::ObservedCounts;
pub use distribution::Distribution;
pub use producer::{BaselineProducer, PartialSums, ProducedFamily};

use crate::accumulator::{AccumulatorError, SchemeError, UpdateScheme};
use crate::checkpoint::CounterCheckpoint;
use crate::config::{TestDistributions, TestStatistic};
use crate::logging::{JsonLineLogger, LogLevel, LoggingError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

const LOG_MODULE: &str = "driftwatch::drift";

/// Value of the tested field for one event, as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Category(String),
    Missing,
}

impl FieldValue {
    pub fn number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(x) => Some(*x),
            _ => None,
        }
    }

    /// Key under which the value is counted by the discrete tests.
    pub fn category(&self) -> Option<String> {
        match self {
            FieldValue::Number(x) => Some(x.to_string()),
            FieldValue::Category(name) => Some(name.clone()),
            FieldValue::Missing => None,
        }
    }
}

/// One event as seen by a test: the field value plus the optional weight
/// and conditioning values used by the discrete tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub value: FieldValue,
    pub weight: Option<f64>,
    pub condition: Option<String>,
}

impl Observation {
    pub fn number(value: f64) -> Self {
        Self::of(FieldValue::Number(value))
    }

    pub fn category(value: impl Into<String>) -> Self {
        Self::of(FieldValue::Category(value.into()))
    }

    pub fn missing() -> Self {
        Self::of(FieldValue::Missing)
    }

    fn of(value: FieldValue) -> Self {
        Self {
            value,
            weight: None,
            condition: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// Diagnostic value attached to a score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AncillaryValue {
    Number(f64),
    Integer(i64),
    Text(String),
    Missing,
}

impl AncillaryValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AncillaryValue::Number(x) => Some(*x),
            AncillaryValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AncillaryValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

pub type Ancillary = BTreeMap<String, AncillaryValue>;

/// Result of scoring one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestScore {
    pub value: f64,
    pub alert: bool,
    pub segment: String,
    pub ancillary: Ancillary,
}

/// Direction in which a score crosses its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPolarity {
    /// `value >= threshold`
    Above,
    /// `|value| >= threshold`
    AbsAbove,
    /// `value <= threshold`; similarity tests alert when similarity drops.
    Below,
}

impl AlertPolarity {
    pub fn for_statistic(statistic: TestStatistic) -> Self {
        match statistic {
            TestStatistic::ZValue => AlertPolarity::AbsAbove,
            TestStatistic::DiscreteDistribution => AlertPolarity::Below,
            TestStatistic::Cusum | TestStatistic::Glr | TestStatistic::ChiSquareDistribution => {
                AlertPolarity::Above
            }
        }
    }

    pub fn breaks(self, value: f64, threshold: f64) -> bool {
        match self {
            AlertPolarity::Above => value >= threshold,
            AlertPolarity::AbsAbove => value.abs() >= threshold,
            AlertPolarity::Below => value <= threshold,
        }
    }
}

/// Why a configured test will never score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    /// Baseline variance is zero.
    ZeroVariance,
    /// Baseline or alternate density collapses to a point.
    DegenerateDensity,
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisabledReason::ZeroVariance => f.write_str("baseline variance is zero"),
            DisabledReason::DegenerateDensity => f.write_str("density is degenerate"),
        }
    }
}

/// Outcome of setting up a test: a ready monitor, or a test that is
/// configured but can never score.
#[derive(Debug)]
pub enum TestSetup {
    Ready(BaselineMonitor),
    Disabled(DisabledReason),
}

impl TestSetup {
    pub fn monitor(self) -> Option<BaselineMonitor> {
        match self {
            TestSetup::Ready(monitor) => Some(monitor),
            TestSetup::Disabled(_) => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, TestSetup::Disabled(_))
    }
}

/// Per-event outcome of a test function.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Evaluation {
    Scored { value: f64, ancillary: Ancillary },
    Unscored(&'static str),
}

impl Evaluation {
    pub(crate) fn scored(value: f64) -> Self {
        Evaluation::Scored {
            value,
            ancillary: Ancillary::new(),
        }
    }
}

/// Statistic-specific state behind a [`BaselineMonitor`].
pub(crate) trait TestFunction: fmt::Debug + Send {
    fn evaluate(&mut self, sync_id: i64, observation: &Observation)
        -> Result<Evaluation, DriftError>;

    /// Accumulator state worth persisting between runs.
    fn checkpoint(&self) -> Option<CounterCheckpoint> {
        None
    }

    fn observed_counts(&self) -> Option<ObservedCounts> {
        None
    }
}

pub(crate) type Prepared = Result<Box<dyn TestFunction>, DisabledReason>;

/// A configured drift test for one segment.
#[derive(Debug)]
pub struct BaselineMonitor {
    segment: String,
    statistic: TestStatistic,
    threshold: f64,
    polarity: AlertPolarity,
    skip_remaining: u64,
    function: Box<dyn TestFunction>,
    logger: Option<JsonLineLogger>,
}

impl BaselineMonitor {
    /// Validates a test definition and builds its state. `scheme` supplies
    /// the weighting for tests that accumulate; a test-level window
    /// overrides it.
    pub fn setup(
        definition: &TestDistributions,
        scheme: &UpdateScheme,
        segment: impl Into<String>,
    ) -> Result<TestSetup, DriftError> {
        Self::setup_with_logger(definition, scheme, segment, None)
    }

    pub fn setup_with_logger(
        definition: &TestDistributions,
        scheme: &UpdateScheme,
        segment: impl Into<String>,
        logger: Option<JsonLineLogger>,
    ) -> Result<TestSetup, DriftError> {
        let prepared = match definition.statistic {
            TestStatistic::ZValue => zvalue::prepare(definition)?,
            TestStatistic::Cusum => cusum::prepare(definition, scheme)?,
            TestStatistic::Glr => glr::prepare(definition, scheme)?,
            TestStatistic::DiscreteDistribution => discrete::prepare(definition, scheme)?,
            TestStatistic::ChiSquareDistribution => chisquare::prepare(definition, scheme)?,
        };
        let function = match prepared {
            Ok(function) => function,
            Err(reason) => return Ok(TestSetup::Disabled(reason)),
        };
        let mut monitor = Self {
            segment: segment.into(),
            statistic: definition.statistic,
            threshold: definition.threshold,
            polarity: AlertPolarity::for_statistic(definition.statistic),
            skip_remaining: definition.skip,
            function,
            logger,
        };
        let message = format!(
            "{} test ready, threshold {}",
            monitor.statistic, monitor.threshold
        );
        monitor.log(LogLevel::Info, None, &message)?;
        Ok(TestSetup::Ready(monitor))
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn statistic(&self) -> TestStatistic {
        self.statistic
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn polarity(&self) -> AlertPolarity {
        self.polarity
    }

    pub fn logger(&self) -> Option<&JsonLineLogger> {
        self.logger.as_ref()
    }

    pub fn logger_mut(&mut self) -> Option<&mut JsonLineLogger> {
        self.logger.as_mut()
    }

    /// Updates the test with one event and scores it. `None` means no score
    /// this event: the value was unusable, the statistic was not computable,
    /// or the score fell within the configured skip.
    pub fn score(
        &mut self,
        sync_id: i64,
        observation: &Observation,
    ) -> Result<Option<TestScore>, DriftError> {
        let (value, ancillary) = match self.function.evaluate(sync_id, observation)? {
            Evaluation::Scored { value, ancillary } => (value, ancillary),
            Evaluation::Unscored(reason) => {
                self.log(LogLevel::Debug, Some(sync_id), reason)?;
                return Ok(None);
            }
        };
        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            self.log(LogLevel::Debug, Some(sync_id), "score skipped")?;
            return Ok(None);
        }
        Ok(Some(TestScore {
            value,
            alert: self.polarity.breaks(value, self.threshold),
            segment: self.segment.clone(),
            ancillary,
        }))
    }

    /// Counter state to persist so a later run can resume this test.
    pub fn checkpoint(&self) -> Option<CounterCheckpoint> {
        self.function.checkpoint()
    }

    /// Copy of the category counts held by a discrete test.
    pub fn observed_counts(&self) -> Option<ObservedCounts> {
        self.function.observed_counts()
    }

    fn log(
        &mut self,
        level: LogLevel,
        sync_id: Option<i64>,
        message: &str,
    ) -> Result<(), LoggingError> {
        match self.logger.as_mut() {
            Some(logger) => logger.log(level, LOG_MODULE, &self.segment, sync_id, message),
            None => Ok(()),
        }
    }
}

/// Errors raised while setting up or feeding a drift test.
#[derive(Debug, Error)]
pub enum DriftError {
    #[error("invalid {distribution} distribution: {reason}")]
    InvalidDistribution {
        distribution: &'static str,
        reason: &'static str,
    },
    #[error("CUSUM test requires an alternate distribution")]
    MissingAlternate,
    #[error("{statistic} test does not support a {baseline} baseline")]
    UnsupportedBaseline {
        statistic: TestStatistic,
        baseline: &'static str,
    },
    #[error("conditioned counts cannot be windowed")]
    WindowedConditionedCounts,
    #[error("{statistic} test does not support a conditioning field")]
    ConditionUnsupported { statistic: TestStatistic },
    #[error(transparent)]
    Accumulator(#[from] AccumulatorError),
    #[error(transparent)]
    Scheme(#[from] SchemeError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Scheme a windowed test accumulates under.
pub(crate) fn effective_scheme(definition: &TestDistributions, scheme: &UpdateScheme) -> UpdateScheme {
    if definition.window_size > 0 {
        UpdateScheme::window(definition.window_size)
    } else {
        *scheme
    }
}
