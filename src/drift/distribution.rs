use super::DriftError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{
    Continuous, ContinuousCDF, Discrete, DiscreteCDF, Exp, Normal, Poisson, Uniform,
};

/// Parametric baseline or alternate density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Distribution {
    Gaussian { mean: f64, variance: f64 },
    Poisson { mean: f64 },
    Exponential { mean: f64 },
    Uniform { lower: f64, upper: f64 },
}

impl Distribution {
    pub fn name(&self) -> &'static str {
        match self {
            Distribution::Gaussian { .. } => "gaussian",
            Distribution::Poisson { .. } => "poisson",
            Distribution::Exponential { .. } => "exponential",
            Distribution::Uniform { .. } => "uniform",
        }
    }

    /// Rejects parameters no density can be built from. Zero-width
    /// distributions pass: they are degenerate, not invalid.
    pub fn validate(&self) -> Result<(), DriftError> {
        let reason = match *self {
            Distribution::Gaussian { mean, variance } => {
                if !mean.is_finite() || !variance.is_finite() {
                    Some("parameters must be finite")
                } else if variance < 0.0 {
                    Some("variance must be non-negative")
                } else {
                    None
                }
            }
            Distribution::Poisson { mean } | Distribution::Exponential { mean } => {
                (!(mean.is_finite() && mean > 0.0)).then_some("mean must be positive")
            }
            Distribution::Uniform { lower, upper } => {
                if !lower.is_finite() || !upper.is_finite() {
                    Some("bounds must be finite")
                } else if upper < lower {
                    Some("upper bound lies below lower bound")
                } else {
                    None
                }
            }
        };
        match reason {
            Some(reason) => Err(DriftError::InvalidDistribution {
                distribution: self.name(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// True when the density collapses to a point mass.
    pub fn is_degenerate(&self) -> bool {
        match *self {
            Distribution::Gaussian { variance, .. } => variance == 0.0,
            Distribution::Uniform { lower, upper } => lower == upper,
            _ => false,
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Gaussian { mean, .. }
            | Distribution::Poisson { mean }
            | Distribution::Exponential { mean } => mean,
            Distribution::Uniform { lower, upper } => 0.5 * (lower + upper),
        }
    }

    pub fn variance(&self) -> f64 {
        match *self {
            Distribution::Gaussian { variance, .. } => variance,
            Distribution::Poisson { mean } => mean,
            Distribution::Exponential { mean } => mean * mean,
            Distribution::Uniform { lower, upper } => (upper - lower).powi(2) / 12.0,
        }
    }

    /// Density (or mass, for Poisson) at `x`; `None` when degenerate.
    pub fn pdf(&self, x: f64) -> Option<f64> {
        match *self {
            Distribution::Gaussian { mean, variance } => {
                Normal::new(mean, variance.sqrt()).ok().map(|d| d.pdf(x))
            }
            Distribution::Poisson { mean } => {
                let poisson = Poisson::new(mean).ok()?;
                Some(count_index(x).map_or(0.0, |k| poisson.pmf(k)))
            }
            Distribution::Exponential { mean } => Exp::new(1.0 / mean).ok().map(|d| d.pdf(x)),
            Distribution::Uniform { lower, upper } => {
                if lower == upper {
                    return None;
                }
                Uniform::new(lower, upper).ok().map(|d| d.pdf(x))
            }
        }
    }

    /// Natural log of [`Distribution::pdf`]; `-inf` outside the support.
    pub fn log_pdf(&self, x: f64) -> Option<f64> {
        match *self {
            Distribution::Gaussian { mean, variance } => {
                Normal::new(mean, variance.sqrt()).ok().map(|d| d.ln_pdf(x))
            }
            Distribution::Poisson { mean } => {
                let poisson = Poisson::new(mean).ok()?;
                Some(count_index(x).map_or(f64::NEG_INFINITY, |k| poisson.ln_pmf(k)))
            }
            Distribution::Exponential { mean } => Exp::new(1.0 / mean).ok().map(|d| d.ln_pdf(x)),
            Distribution::Uniform { .. } => self.pdf(x).map(f64::ln),
        }
    }

    /// Cumulative probability up to `x`; `None` when degenerate.
    pub fn cdf(&self, x: f64) -> Option<f64> {
        match *self {
            Distribution::Gaussian { mean, variance } => {
                Normal::new(mean, variance.sqrt()).ok().map(|d| d.cdf(x))
            }
            Distribution::Poisson { mean } => {
                let poisson = Poisson::new(mean).ok()?;
                if x < 0.0 {
                    return Some(0.0);
                }
                Some(poisson.cdf(x.floor() as u64))
            }
            Distribution::Exponential { mean } => Exp::new(1.0 / mean).ok().map(|d| d.cdf(x)),
            Distribution::Uniform { lower, upper } => {
                if lower == upper {
                    return None;
                }
                Uniform::new(lower, upper).ok().map(|d| d.cdf(x))
            }
        }
    }
}

/// Non-negative integral values index a count distribution.
fn count_index(x: f64) -> Option<u64> {
    (x >= 0.0 && x.fract() == 0.0 && x.is_finite()).then_some(x as u64)
}
