use super::{
    effective_scheme, Ancillary, AncillaryValue, DisabledReason, Distribution, DriftError,
    Evaluation, Observation, Prepared, TestFunction,
};
use crate::accumulator::{Accumulator, CounterKind, UpdateScheme};
use crate::checkpoint::CounterCheckpoint;
use crate::config::{Baseline, TestDistributions, TestStatistic};

/// Log-likelihood kernel evaluated on a partial sum `s` of `n` raw values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlrKernel {
    /// Unknown shift of a Gaussian mean with known variance.
    Gaussian { mean: f64, variance: f64 },
    /// Unknown change of a Poisson rate.
    Poisson { mean: f64 },
}

impl GlrKernel {
    pub fn evaluate(&self, s: f64, n: f64) -> f64 {
        match *self {
            GlrKernel::Gaussian { mean, .. } => (s - n * mean).powi(2) / n,
            GlrKernel::Poisson { mean } => {
                let base = -mean.ln() * s + n * mean - s;
                if s > 0.0 {
                    base + (s / n).ln() * s
                } else {
                    base
                }
            }
        }
    }

    /// Turns the maximal kernel value into the reported statistic.
    fn scale(&self, maximum: f64) -> f64 {
        match *self {
            GlrKernel::Gaussian { variance, .. } => maximum / (2.0 * variance),
            GlrKernel::Poisson { .. } => maximum,
        }
    }
}

/// Generalized likelihood ratio for a change of unknown onset.
#[derive(Debug)]
pub(crate) struct GlrTest {
    kernel: GlrKernel,
    accumulator: Accumulator,
}

pub(crate) fn prepare(
    definition: &TestDistributions,
    scheme: &UpdateScheme,
) -> Result<Prepared, DriftError> {
    let kernel = match definition.baseline {
        Baseline::Distribution(distribution) => {
            distribution.validate()?;
            match distribution {
                Distribution::Gaussian { variance, .. } if variance == 0.0 => {
                    return Ok(Err(DisabledReason::ZeroVariance))
                }
                Distribution::Gaussian { mean, variance } => GlrKernel::Gaussian { mean, variance },
                Distribution::Poisson { mean } => GlrKernel::Poisson { mean },
                other => {
                    return Err(DriftError::UnsupportedBaseline {
                        statistic: TestStatistic::Glr,
                        baseline: other.name(),
                    })
                }
            }
        }
        Baseline::Counts(_) => {
            return Err(DriftError::UnsupportedBaseline {
                statistic: TestStatistic::Glr,
                baseline: "counts",
            })
        }
    };
    let accumulator = effective_scheme(definition, scheme).accumulator(&[CounterKind::Glr])?;
    Ok(Ok(Box::new(GlrTest {
        kernel,
        accumulator,
    })))
}

impl TestFunction for GlrTest {
    fn evaluate(&mut self, sync_id: i64, observation: &Observation) -> Result<Evaluation, DriftError> {
        if let Some(x) = observation.value.number() {
            self.accumulator.increment(sync_id, x)?;
        }
        let kernel = self.kernel;
        let Some((onset, maximum)) = self.accumulator.glr(|s, n| kernel.evaluate(s, n)) else {
            return Ok(Evaluation::Unscored("GLR trace is empty"));
        };
        let mut ancillary = Ancillary::new();
        ancillary.insert("thresholdTime".to_string(), AncillaryValue::Integer(onset));
        Ok(Evaluation::Scored {
            value: kernel.scale(maximum),
            ancillary,
        })
    }

    fn checkpoint(&self) -> Option<CounterCheckpoint> {
        Some(self.accumulator.checkpoint())
    }
}
