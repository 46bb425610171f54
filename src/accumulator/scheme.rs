use super::kind::CounterKind;
use super::weighting::{Exponential, FixedWindow, SynchronizedWindow, Unweighted, Weighting};
use super::{Accumulator, AccumulatorError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Weighting variant selected by an [`UpdateScheme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    Unweighted,
    Exponential,
    Window,
    Synchronized,
}

impl SchemeKind {
    pub fn parse(name: &str) -> Result<Self, SchemeError> {
        match name {
            "unweighted" => Ok(SchemeKind::Unweighted),
            "exponential" => Ok(SchemeKind::Exponential),
            "window" => Ok(SchemeKind::Window),
            "synchronized" => Ok(SchemeKind::Synchronized),
            other => Err(SchemeError::UnknownScheme(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemeKind::Unweighted => "unweighted",
            SchemeKind::Exponential => "exponential",
            SchemeKind::Window => "window",
            SchemeKind::Synchronized => "synchronized",
        }
    }
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters shared by all weighting variants; each variant reads the ones
/// it needs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemeParams {
    pub alpha: Option<f64>,
    pub window_size: Option<i64>,
    pub window_lag: Option<i64>,
    #[serde(rename = "resetValue")]
    pub reset_floor: f64,
}

/// Validated weighting plus its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Policy {
    Unweighted,
    Exponential { alpha: f64 },
    Window { size: usize, lag: usize },
    Synchronized { size: i64, lag: i64 },
}

/// Factory for accumulators sharing one weighting variant.
///
/// All validation happens here, so building accumulators per event context
/// can only fail on counter combinations the variant cannot carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateScheme {
    kind: SchemeKind,
    policy: Policy,
    reset_floor: f64,
}

impl UpdateScheme {
    /// Builds a scheme from its configured name.
    pub fn new(name: &str, params: SchemeParams) -> Result<Self, SchemeError> {
        Self::from_kind(SchemeKind::parse(name)?, params)
    }

    pub fn from_kind(kind: SchemeKind, params: SchemeParams) -> Result<Self, SchemeError> {
        let policy = match kind {
            SchemeKind::Unweighted => Policy::Unweighted,
            SchemeKind::Exponential => {
                let alpha = params.alpha.ok_or(SchemeError::MissingParameter {
                    scheme: kind,
                    parameter: "alpha",
                })?;
                if !(alpha > 0.0 && alpha <= 1.0) {
                    return Err(SchemeError::AlphaOutOfRange(alpha));
                }
                Policy::Exponential { alpha }
            }
            SchemeKind::Window | SchemeKind::Synchronized => {
                let size = params.window_size.ok_or(SchemeError::MissingParameter {
                    scheme: kind,
                    parameter: "windowSize",
                })?;
                let lag = params.window_lag.unwrap_or(0);
                if size < 0 {
                    return Err(SchemeError::NegativeWindow {
                        parameter: "windowSize",
                        value: size,
                    });
                }
                if lag < 0 {
                    return Err(SchemeError::NegativeWindow {
                        parameter: "windowLag",
                        value: lag,
                    });
                }
                if kind == SchemeKind::Window {
                    Policy::Window {
                        size: size as usize,
                        lag: lag as usize,
                    }
                } else {
                    Policy::Synchronized { size, lag }
                }
            }
        };
        Ok(Self {
            kind,
            policy,
            reset_floor: params.reset_floor,
        })
    }

    pub fn unweighted() -> Self {
        Self {
            kind: SchemeKind::Unweighted,
            policy: Policy::Unweighted,
            reset_floor: 0.0,
        }
    }

    /// Arrival-order window with no lag.
    pub fn window(size: usize) -> Self {
        Self {
            kind: SchemeKind::Window,
            policy: Policy::Window { size, lag: 0 },
            reset_floor: 0.0,
        }
    }

    /// Returns a copy whose accumulators clamp CUSUM at `reset_floor`.
    pub fn with_reset_floor(mut self, reset_floor: f64) -> Self {
        self.reset_floor = reset_floor;
        self
    }

    pub fn kind(&self) -> SchemeKind {
        self.kind
    }

    pub fn reset_floor(&self) -> f64 {
        self.reset_floor
    }

    pub fn alpha(&self) -> Option<f64> {
        match self.policy {
            Policy::Exponential { alpha } => Some(alpha),
            _ => None,
        }
    }

    /// `(size, lag)` for the window variants.
    pub fn window_bounds(&self) -> Option<(i64, i64)> {
        match self.policy {
            Policy::Window { size, lag } => Some((size as i64, lag as i64)),
            Policy::Synchronized { size, lag } => Some((size, lag)),
            _ => None,
        }
    }

    /// Builds a fresh, independently owned accumulator.
    pub fn accumulator(&self, counters: &[CounterKind]) -> Result<Accumulator, AccumulatorError> {
        let weighting: Box<dyn Weighting> = match self.policy {
            Policy::Unweighted => Box::new(Unweighted),
            Policy::Exponential { alpha } => Box::new(Exponential { alpha }),
            Policy::Window { size, lag } => Box::new(FixedWindow::new(size, lag)),
            Policy::Synchronized { size, lag } => Box::new(SynchronizedWindow::new(size, lag)),
        };
        Accumulator::new(weighting, counters, self.reset_floor)
    }
}

/// Errors raised while constructing an [`UpdateScheme`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemeError {
    #[error("unrecognized update scheme '{0}'")]
    UnknownScheme(String),
    #[error("update scheme '{scheme}' requires parameter '{parameter}'")]
    MissingParameter {
        scheme: SchemeKind,
        parameter: &'static str,
    },
    #[error("{parameter} must be non-negative, got {value}")]
    NegativeWindow { parameter: &'static str, value: i64 },
    #[error("alpha must lie in (0, 1], got {0}")]
    AlphaOutOfRange(f64),
}
