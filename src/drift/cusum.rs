use super::{
    effective_scheme, DisabledReason, Distribution, DriftError, Evaluation, Observation, Prepared,
    TestFunction,
};
use crate::accumulator::{Accumulator, CounterKind, UpdateScheme};
use crate::checkpoint::CounterCheckpoint;
use crate::config::{Baseline, TestDistributions, TestStatistic};

/// CUSUM of the log-likelihood ratio between an alternate and a baseline
/// density, clamped at the reset floor.
#[derive(Debug)]
pub(crate) struct CusumTest {
    baseline: Distribution,
    alternate: Distribution,
    accumulator: Accumulator,
}

fn distribution_of(baseline: &Baseline) -> Result<Distribution, DriftError> {
    match baseline {
        Baseline::Distribution(distribution) => {
            distribution.validate()?;
            Ok(*distribution)
        }
        Baseline::Counts(_) => Err(DriftError::UnsupportedBaseline {
            statistic: TestStatistic::Cusum,
            baseline: "counts",
        }),
    }
}

pub(crate) fn prepare(
    definition: &TestDistributions,
    scheme: &UpdateScheme,
) -> Result<Prepared, DriftError> {
    let baseline = distribution_of(&definition.baseline)?;
    let alternate = definition
        .alternate
        .as_ref()
        .ok_or(DriftError::MissingAlternate)
        .and_then(distribution_of)?;
    if baseline.pdf(0.0).is_none() || alternate.pdf(0.0).is_none() {
        return Ok(Err(DisabledReason::DegenerateDensity));
    }
    let mut accumulator = effective_scheme(definition, scheme)
        .with_reset_floor(definition.reset_value)
        .accumulator(&[CounterKind::Cusum])?;
    if let Some(value) = definition.cusum_initialization {
        accumulator.initialize(&CounterCheckpoint {
            cusum: Some(vec![value]),
            ..CounterCheckpoint::default()
        })?;
    }
    Ok(Ok(Box::new(CusumTest {
        baseline,
        alternate,
        accumulator,
    })))
}

impl CusumTest {
    fn log_ratio(&self, x: f64) -> Option<f64> {
        let ratio = self.alternate.log_pdf(x)? - self.baseline.log_pdf(x)?;
        ratio.is_finite().then_some(ratio)
    }
}

impl TestFunction for CusumTest {
    fn evaluate(&mut self, sync_id: i64, observation: &Observation) -> Result<Evaluation, DriftError> {
        let Some(x) = observation.value.number() else {
            return Ok(Evaluation::Unscored("field value is not numeric"));
        };
        let Some(ratio) = self.log_ratio(x) else {
            return Ok(Evaluation::Unscored("log-likelihood ratio is not finite"));
        };
        self.accumulator.increment(sync_id, ratio)?;
        Ok(match self.accumulator.cusum() {
            Some(value) => Evaluation::scored(value),
            None => Evaluation::Unscored("window holds no events yet"),
        })
    }

    fn checkpoint(&self) -> Option<CounterCheckpoint> {
        Some(self.accumulator.checkpoint())
    }
}
