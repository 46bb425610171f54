use super::{Distribution, DriftError, Observation, LOG_MODULE};
use crate::accumulator::{Accumulator, CounterKind, UpdateScheme};
use crate::checkpoint::CounterCheckpoint;
use crate::logging::{JsonLineLogger, LogLevel};
use serde::{Deserialize, Serialize};

/// Distribution family a producer fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducedFamily {
    Gaussian,
    Poisson,
    Uniform,
}

impl ProducedFamily {
    fn counters(self) -> &'static [CounterKind] {
        match self {
            ProducedFamily::Gaussian => &[CounterKind::Count, CounterKind::RunMean, CounterKind::RunSn],
            ProducedFamily::Poisson => &[CounterKind::Count, CounterKind::RunMean],
            ProducedFamily::Uniform => &[CounterKind::Min, CounterKind::Max],
        }
    }
}

/// Running sums a producer persists so a later run can continue the fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialSums {
    pub family: ProducedFamily,
    pub counters: CounterCheckpoint,
}

/// Fits a baseline distribution from observed values.
#[derive(Debug)]
pub struct BaselineProducer {
    family: ProducedFamily,
    segment: String,
    accumulator: Accumulator,
    logger: Option<JsonLineLogger>,
}

impl BaselineProducer {
    pub fn new(
        family: ProducedFamily,
        scheme: &UpdateScheme,
        segment: impl Into<String>,
    ) -> Result<Self, DriftError> {
        Ok(Self {
            family,
            segment: segment.into(),
            accumulator: scheme.accumulator(family.counters())?,
            logger: None,
        })
    }

    /// Continues a fit from sums persisted by an earlier run.
    pub fn update_existing(
        scheme: &UpdateScheme,
        segment: impl Into<String>,
        partial: &PartialSums,
    ) -> Result<Self, DriftError> {
        let mut producer = Self::new(partial.family, scheme, segment)?;
        producer.accumulator.initialize(&partial.counters)?;
        Ok(producer)
    }

    pub fn with_logger(mut self, logger: JsonLineLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn logger(&self) -> Option<&JsonLineLogger> {
        self.logger.as_ref()
    }

    pub fn family(&self) -> ProducedFamily {
        self.family
    }

    /// Folds one observation in; returns whether it was used.
    pub fn update(&mut self, sync_id: i64, observation: &Observation) -> Result<bool, DriftError> {
        match observation.value.number() {
            Some(x) => {
                self.accumulator.increment(sync_id, x)?;
                Ok(true)
            }
            None => {
                if let Some(logger) = self.logger.as_mut() {
                    logger.log(
                        LogLevel::Debug,
                        LOG_MODULE,
                        &self.segment,
                        Some(sync_id),
                        "non-numeric value ignored by producer",
                    )?;
                }
                Ok(false)
            }
        }
    }

    /// Current fit; `None` until enough data has been seen.
    pub fn distribution(&self) -> Option<Distribution> {
        let accumulator = &self.accumulator;
        match self.family {
            ProducedFamily::Gaussian => Some(Distribution::Gaussian {
                mean: accumulator.run_mean()?,
                variance: accumulator.run_variance()?,
            }),
            ProducedFamily::Poisson => Some(Distribution::Poisson {
                mean: accumulator.run_mean()?,
            }),
            ProducedFamily::Uniform => Some(Distribution::Uniform {
                lower: accumulator.min()?,
                upper: accumulator.max()?,
            }),
        }
    }

    pub fn partial_sums(&self) -> PartialSums {
        PartialSums {
            family: self.family,
            counters: self.accumulator.checkpoint(),
        }
    }
}
