use super::{
    Ancillary, AncillaryValue, DisabledReason, Distribution, DriftError, Evaluation, Observation,
    Prepared, TestFunction,
};
use crate::config::{Baseline, TestDistributions, TestStatistic};
use statrs::function::erf::erf_inv;

/// Cumulative probabilities this close to 0 or 1 map to a z of -10 or 10.
const TAIL_EPSILON: f64 = 1e-16;
const Z_LIMIT: f64 = 10.0;

/// Stateless z-value test against a fixed baseline.
#[derive(Debug, Clone)]
pub(crate) struct ZValueTest {
    baseline: Distribution,
}

pub(crate) fn prepare(definition: &TestDistributions) -> Result<Prepared, DriftError> {
    let baseline = match definition.baseline {
        Baseline::Distribution(distribution) => distribution,
        Baseline::Counts(_) => {
            return Err(DriftError::UnsupportedBaseline {
                statistic: TestStatistic::ZValue,
                baseline: "counts",
            })
        }
    };
    baseline.validate()?;
    if let Distribution::Gaussian { variance, .. } = baseline {
        if variance == 0.0 {
            return Ok(Err(DisabledReason::ZeroVariance));
        }
    }
    if baseline.is_degenerate() {
        return Ok(Err(DisabledReason::DegenerateDensity));
    }
    Ok(Ok(Box::new(ZValueTest { baseline })))
}

impl ZValueTest {
    /// Returns `(z, cdf)` for `x`.
    fn z_value(&self, x: f64) -> Option<(f64, f64)> {
        let probability = self.baseline.cdf(x)?;
        let z = match self.baseline {
            Distribution::Gaussian { mean, variance } => (x - mean) / variance.sqrt(),
            _ => gaussian_equivalent(probability),
        };
        Some((z, probability))
    }
}

/// Maps a cumulative probability onto the standard-normal quantile.
pub(crate) fn gaussian_equivalent(probability: f64) -> f64 {
    if probability <= TAIL_EPSILON {
        -Z_LIMIT
    } else if probability >= 1.0 - TAIL_EPSILON {
        Z_LIMIT
    } else {
        std::f64::consts::SQRT_2 * erf_inv(2.0 * probability - 1.0)
    }
}

/// Two-sided p-value of a cumulative probability.
pub(crate) fn two_sided_p_value(probability: f64) -> f64 {
    1.0 - 2.0 * (probability - 0.5).abs()
}

impl TestFunction for ZValueTest {
    fn evaluate(
        &mut self,
        _sync_id: i64,
        observation: &Observation,
    ) -> Result<Evaluation, DriftError> {
        let Some(x) = observation.value.number() else {
            return Ok(Evaluation::Unscored("field value is not numeric"));
        };
        let Some((z, probability)) = self.z_value(x) else {
            return Ok(Evaluation::Unscored("baseline has no cumulative distribution"));
        };
        let mut ancillary = Ancillary::new();
        ancillary.insert(
            "pValue".to_string(),
            AncillaryValue::Number(two_sided_p_value(probability)),
        );
        Ok(Evaluation::Scored {
            value: z,
            ancillary,
        })
    }
}
