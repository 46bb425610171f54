//! Event-at-a-time accumulators.
//!
//! An [`Accumulator`] carries a fixed set of counters chosen when it is built
//! by an [`UpdateScheme`]. The scheme's weighting decides which past events
//! still contribute: all of them, a geometrically decayed history, the last
//! N arrivals, or the events whose sync ids fall inside a window.

pub mod kind;
pub mod ols;
pub mod scheme;
pub(crate) mod state;
pub(crate) mod weighting;

pub use kind::{CounterKind, CounterSet};
pub use ols::{OlsCheckpoint, OrdinaryLeastSquares};
pub use scheme::{SchemeError, SchemeKind, SchemeParams, UpdateScheme};

use crate::checkpoint::CounterCheckpoint;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use state::{covariance_len, CounterState};
use thiserror::Error;
use weighting::Weighting;

/// One observed value: a scalar, or a vector for covariance and OLS counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sample {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Sample {
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Sample::Scalar(x) => Some(*x),
            Sample::Vector(_) => None,
        }
    }

    /// Components as a slice; a scalar is a one-element vector.
    pub fn components(&self) -> &[f64] {
        match self {
            Sample::Scalar(x) => std::slice::from_ref(x),
            Sample::Vector(values) => values,
        }
    }
}

impl From<f64> for Sample {
    fn from(value: f64) -> Self {
        Sample::Scalar(value)
    }
}

impl From<Vec<f64>> for Sample {
    fn from(values: Vec<f64>) -> Self {
        Sample::Vector(values)
    }
}

impl From<&[f64]> for Sample {
    fn from(values: &[f64]) -> Self {
        Sample::Vector(values.to_vec())
    }
}

/// Event retained by a window-based accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sync_id: i64,
    pub sample: Sample,
}

/// Errors raised while building, feeding or restoring an accumulator.
#[derive(Debug, Error, PartialEq)]
pub enum AccumulatorError {
    #[error("counter {kind} is not supported by the {scheme} weighting")]
    UnsupportedCounter {
        kind: CounterKind,
        scheme: &'static str,
    },
    #[error("counter {kind} only accepts scalar samples")]
    ScalarRequired { kind: CounterKind },
    #[error("counter {kind} expects samples of length {expected}, got {actual}")]
    VectorLength {
        kind: CounterKind,
        expected: usize,
        actual: usize,
    },
    #[error("checkpoint carries {kind}, which this accumulator does not track")]
    CounterNotRequested { kind: CounterKind },
    #[error("checkpoint value for {kind} has length {actual}, expected {expected}")]
    CheckpointShape {
        kind: CounterKind,
        expected: usize,
        actual: usize,
    },
    #[error("initialize must be called before the first increment")]
    AlreadyStarted,
    #[error("the {scheme} weighting does not keep an event history")]
    HistoryNotSupported { scheme: &'static str },
}

/// Running statistics for one independent context (segment, field, cluster).
#[derive(Debug)]
pub struct Accumulator {
    state: CounterState,
    weighting: Box<dyn Weighting>,
    started: bool,
}

impl Accumulator {
    pub(crate) fn new(
        weighting: Box<dyn Weighting>,
        requested: &[CounterKind],
        reset_floor: f64,
    ) -> Result<Self, AccumulatorError> {
        let counters = weighting.prepare(CounterSet::from_kinds(requested))?;
        Ok(Self {
            state: CounterState::new(counters, reset_floor),
            weighting,
            started: false,
        })
    }

    /// Name of the weighting variant, as accepted by [`SchemeKind::parse`].
    pub fn scheme_name(&self) -> &'static str {
        self.weighting.name()
    }

    /// Counters actually stored, including implied ones.
    pub fn counters(&self) -> CounterSet {
        self.state.counters
    }

    /// True when `kind` is stored, whether requested or implied.
    pub fn has_counter(&self, kind: CounterKind) -> bool {
        self.state.counters.contains(kind)
    }

    /// Floor applied to CUSUM traces.
    pub fn reset_floor(&self) -> f64 {
        self.state.reset_floor
    }

    /// Folds one event in. Events must arrive in sync-id order for the
    /// order-sensitive counters and weightings.
    pub fn increment(
        &mut self,
        sync_id: i64,
        sample: impl Into<Sample>,
    ) -> Result<(), AccumulatorError> {
        let sample = sample.into();
        self.state.check_sample(&sample)?;
        self.weighting.increment(&mut self.state, sync_id, sample);
        self.started = true;
        Ok(())
    }

    /// Drops all accumulated state, including any window history, keeping
    /// the counter selection. A cleared accumulator may be initialized again.
    pub fn clear(&mut self) {
        self.state.clear();
        self.weighting.clear();
        self.started = false;
    }

    /// Re-seeds the counters from a checkpoint taken by a compatible
    /// accumulator. Counters absent from the checkpoint keep their cleared
    /// values.
    pub fn initialize(&mut self, checkpoint: &CounterCheckpoint) -> Result<(), AccumulatorError> {
        if self.started {
            return Err(AccumulatorError::AlreadyStarted);
        }
        let counters = self.state.counters;
        for kind in checkpoint.kinds() {
            if !counters.contains(kind) {
                return Err(AccumulatorError::CounterNotRequested { kind });
            }
        }
        if let (Some(d), Some(block)) = (counters.covariance, checkpoint.covariance.as_ref()) {
            if block.len() != covariance_len(d) {
                return Err(AccumulatorError::CheckpointShape {
                    kind: CounterKind::Covariance { dimension: d },
                    expected: covariance_len(d),
                    actual: block.len(),
                });
            }
        }
        if let (Some(ols), Some(saved)) = (self.state.ols.as_ref(), checkpoint.ols.as_ref()) {
            let p = ols.parameters();
            if saved.vector.len() != p || saved.matrix.len() != p * p {
                return Err(AccumulatorError::CheckpointShape {
                    kind: CounterKind::Ols { parameters: p },
                    expected: p,
                    actual: saved.vector.len(),
                });
            }
        }
        if let Some(history) = checkpoint.history.clone() {
            self.weighting.restore_history(history)?;
        }

        let state = &mut self.state;
        if let Some(count) = checkpoint.count {
            state.count = count;
        }
        if let Some(sum1) = checkpoint.sum1 {
            state.sum1 = sum1;
        }
        if let Some(sumx) = checkpoint.sumx {
            state.sumx = sumx;
        }
        if let Some(sumxx) = checkpoint.sumxx {
            state.sumxx = sumxx;
        }
        if let Some(run_mean) = checkpoint.run_mean {
            state.run_mean = run_mean;
        }
        if let Some(run_sn) = checkpoint.run_sn {
            state.run_sn = run_sn;
        }
        if checkpoint.min.is_some() {
            state.min = checkpoint.min;
        }
        if checkpoint.max.is_some() {
            state.max = checkpoint.max;
        }
        if let Some(cusum) = checkpoint.cusum.as_ref() {
            state.cusum = cusum.iter().copied().collect();
        }
        if let Some(glr) = checkpoint.glr.as_ref() {
            state.glr = glr.iter().copied().collect();
        }
        if let Some(block) = checkpoint.covariance.as_ref() {
            state.covariance = block.clone();
        }
        if let (Some(ols), Some(saved)) = (state.ols.as_mut(), checkpoint.ols.as_ref()) {
            ols.restore(saved);
        }
        Ok(())
    }

    /// Captures the raw counters (and window history) needed to resume.
    pub fn checkpoint(&self) -> CounterCheckpoint {
        let state = &self.state;
        let counters = state.counters;
        let history = self.weighting.history();
        CounterCheckpoint {
            count: counters.count.then_some(state.count),
            sum1: counters.sum1.then_some(state.sum1),
            sumx: counters.sumx.then_some(state.sumx),
            sumxx: counters.sumxx.then_some(state.sumxx),
            run_mean: counters.run_mean.then_some(state.run_mean),
            run_sn: counters.run_sn.then_some(state.run_sn),
            min: if counters.min { state.min } else { None },
            max: if counters.max { state.max } else { None },
            cusum: counters.cusum.then(|| state.cusum.iter().copied().collect()),
            glr: counters.glr.then(|| state.glr.iter().copied().collect()),
            covariance: counters.covariance.map(|_| state.covariance.clone()),
            ols: state.ols.as_ref().map(OrdinaryLeastSquares::to_checkpoint),
            history: (!history.is_empty()).then_some(history),
        }
    }

    /// Number of events counted, if COUNT is tracked.
    pub fn count(&self) -> Option<u64> {
        self.state.counters.count.then_some(self.state.count)
    }

    /// Weighted event count, if SUM1 is tracked.
    pub fn sum1(&self) -> Option<f64> {
        self.state.counters.sum1.then_some(self.state.sum1)
    }

    /// Weighted sum of values (SUMX); for exponential weighting this is the
    /// decayed, uncorrected sum.
    pub fn sum(&self) -> Option<f64> {
        self.state.counters.sumx.then_some(self.state.sumx)
    }

    /// Weighted mean of the contributing events. `None` until SUM1 is
    /// positive or when SUM1/SUMX are not tracked.
    pub fn mean(&self) -> Option<f64> {
        self.weighting.mean(&self.state)
    }

    /// Bias-corrected variance; exactly zero when the moments cancel.
    pub fn variance(&self) -> Option<f64> {
        self.weighting.variance(&self.state)
    }

    /// Running mean from the RUNMEAN counter; windows answer with `mean`.
    pub fn run_mean(&self) -> Option<f64> {
        self.weighting.run_mean(&self.state)
    }

    /// Running sample variance from RUNSN; `None` until two events are seen.
    pub fn run_variance(&self) -> Option<f64> {
        self.weighting.run_variance(&self.state)
    }

    /// Smallest contributing value, if MIN is tracked and any event was seen.
    pub fn min(&self) -> Option<f64> {
        self.state.min
    }

    /// Largest contributing value, if MAX is tracked and any event was seen.
    pub fn max(&self) -> Option<f64> {
        self.state.max
    }

    /// Current CUSUM value; for windows, the trace started at the oldest
    /// active event.
    pub fn cusum(&self) -> Option<f64> {
        self.state.cusum.front().copied()
    }

    /// Maximum of `kernel(partial_sum, weight)` over every candidate change
    /// point, with the sync id where it was reached.
    pub fn glr<F>(&self, kernel: F) -> Option<(i64, f64)>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.state.glr_scan(self.weighting.glr_keep(), kernel)
    }

    /// Values retained for the GLR scan with their sync ids, oldest first.
    pub fn glr_trace(&self) -> Vec<(i64, f64)> {
        self.state.glr.iter().copied().collect()
    }

    /// Covariance matrix of the vector samples. `None` until the block holds
    /// a positive weight (and, for exponential weighting, two events).
    pub fn covariance(&self) -> Option<Array2<f64>> {
        self.weighting.covariance(&self.state)
    }

    /// Per-component mean of the vector samples.
    pub fn covmean(&self) -> Option<Array1<f64>> {
        self.weighting.covmean(&self.state)
    }

    /// Regression coefficients, one per regressor; `None` while the normal
    /// equations are singular or no OLS block is tracked.
    pub fn ordinary_least_squares(&self) -> Option<Vec<f64>> {
        self.state.ols.as_ref()?.estimator()
    }
}
