use super::kind::{CounterKind, CounterSet};
use super::ols::OrdinaryLeastSquares;
use super::{AccumulatorError, Sample};
use ndarray::{Array1, Array2};
use std::collections::VecDeque;

/// Relative difference under which `E[x^2] - E[x]^2` counts as cancellation.
pub(crate) const VARIANCE_FUZZ: f64 = 1e-12;

/// Raw counter storage shared by every weighting variant.
///
/// Only counters present in `counters` are meaningful; the rest stay at their
/// cleared values and are never read.
#[derive(Debug, Clone)]
pub(crate) struct CounterState {
    pub(crate) counters: CounterSet,
    pub(crate) reset_floor: f64,
    pub(crate) count: u64,
    pub(crate) sum1: f64,
    pub(crate) sumx: f64,
    pub(crate) sumxx: f64,
    pub(crate) run_mean: f64,
    pub(crate) run_sn: f64,
    pub(crate) min: Option<f64>,
    pub(crate) max: Option<f64>,
    pub(crate) cusum: VecDeque<f64>,
    pub(crate) glr: VecDeque<(i64, f64)>,
    pub(crate) covariance: Vec<f64>,
    pub(crate) ols: Option<OrdinaryLeastSquares>,
}

impl CounterState {
    pub(crate) fn new(counters: CounterSet, reset_floor: f64) -> Self {
        let mut state = Self {
            counters,
            reset_floor,
            count: 0,
            sum1: 0.0,
            sumx: 0.0,
            sumxx: 0.0,
            run_mean: 0.0,
            run_sn: 0.0,
            min: None,
            max: None,
            cusum: VecDeque::new(),
            glr: VecDeque::new(),
            covariance: Vec::new(),
            ols: None,
        };
        state.clear();
        state
    }

    /// Resets every counter; the covariance block gets the -1 sentinel.
    pub(crate) fn clear(&mut self) {
        self.count = 0;
        self.sum1 = 0.0;
        self.sumx = 0.0;
        self.sumxx = 0.0;
        self.run_mean = 0.0;
        self.run_sn = 0.0;
        self.min = None;
        self.max = None;
        self.cusum.clear();
        self.glr.clear();
        self.covariance = match self.counters.covariance {
            Some(d) => {
                let mut block = vec![0.0; covariance_len(d)];
                block[0] = -1.0;
                block
            }
            None => Vec::new(),
        };
        self.ols = self.counters.ols.map(OrdinaryLeastSquares::new);
    }

    /// Rejects samples whose shape does not fit the selected counters.
    pub(crate) fn check_sample(&self, sample: &Sample) -> Result<(), AccumulatorError> {
        if let Sample::Vector(values) = sample {
            if let Some(kind) = self
                .counters
                .kinds()
                .into_iter()
                .find(|kind| kind.is_scalar_valued())
            {
                return Err(AccumulatorError::ScalarRequired { kind });
            }
            if let Some(dimension) = self.counters.covariance {
                if values.len() != dimension {
                    return Err(AccumulatorError::VectorLength {
                        kind: CounterKind::Covariance { dimension },
                        expected: dimension,
                        actual: values.len(),
                    });
                }
            }
            if let Some(parameters) = self.counters.ols {
                if values.len() != parameters + 1 {
                    return Err(AccumulatorError::VectorLength {
                        kind: CounterKind::Ols { parameters },
                        expected: parameters + 1,
                        actual: values.len(),
                    });
                }
            }
            return Ok(());
        }
        // A scalar is a one-component vector.
        if let Some(dimension) = self.counters.covariance.filter(|&d| d != 1) {
            return Err(AccumulatorError::VectorLength {
                kind: CounterKind::Covariance { dimension },
                expected: dimension,
                actual: 1,
            });
        }
        if let Some(parameters) = self.counters.ols.filter(|&p| p != 0) {
            return Err(AccumulatorError::VectorLength {
                kind: CounterKind::Ols { parameters },
                expected: parameters + 1,
                actual: 1,
            });
        }
        Ok(())
    }

    /// Adds one sample with unit weight and no decay.
    pub(crate) fn add(&mut self, sync_id: i64, sample: &Sample) {
        self.add_moments(sample);
        if let Some(x) = sample.scalar() {
            if self.counters.run_mean {
                let old = self.run_mean;
                self.run_mean += (x - old) / self.count.max(1) as f64;
                if self.counters.run_sn {
                    self.run_sn += (x - old) * (x - self.run_mean);
                }
            }
            if self.counters.min && self.min.map_or(true, |m| x < m) {
                self.min = Some(x);
            }
            if self.counters.max && self.max.map_or(true, |m| x > m) {
                self.max = Some(x);
            }
            if self.counters.cusum {
                let previous = self.cusum.front().copied().unwrap_or(0.0);
                self.cusum.clear();
                self.cusum.push_back(self.reset_floor.max(previous + x));
            }
        }
        self.add_tail(sync_id, sample);
    }

    /// Adds a sample entering a window: one fresh CUSUM trace starts here and
    /// every live trace absorbs the value. Extrema are recomputed separately.
    pub(crate) fn add_entering(&mut self, sync_id: i64, sample: &Sample) {
        self.add_moments(sample);
        if let (true, Some(x)) = (self.counters.cusum, sample.scalar()) {
            self.cusum.push_back(0.0);
            let floor = self.reset_floor;
            for trace in self.cusum.iter_mut() {
                *trace = floor.max(*trace + x);
            }
        }
        self.add_tail(sync_id, sample);
    }

    /// Retracts a sample leaving a window.
    pub(crate) fn remove_leaving(&mut self, sample: &Sample) {
        if self.counters.count {
            self.count = self.count.saturating_sub(1);
        }
        if self.counters.sum1 {
            self.sum1 -= 1.0;
        }
        if let Some(x) = sample.scalar() {
            if self.counters.sumx {
                self.sumx -= x;
            }
            if self.counters.sumxx {
                self.sumxx -= x * x;
            }
        }
        if self.counters.cusum {
            self.cusum.pop_front();
        }
        if self.counters.glr {
            self.glr.pop_front();
        }
        if let Some(d) = self.counters.covariance {
            let values = sample.components();
            self.covariance[0] -= 1.0;
            for i in 0..d {
                self.covariance[1 + i] -= values[i];
                for j in i..d {
                    self.covariance[packed_index(d, i, j)] -= values[i] * values[j];
                }
            }
        }
        if let Some(ols) = self.ols.as_mut() {
            ols.increment(sample.components(), 0.0, -1.0);
        }
    }

    /// Recomputes MIN/MAX over the samples currently inside a window.
    pub(crate) fn recompute_extrema<'a>(&mut self, window: impl Iterator<Item = &'a Sample>) {
        let mut min = None;
        let mut max = None;
        for x in window.filter_map(Sample::scalar) {
            if min.map_or(true, |m| x < m) {
                min = Some(x);
            }
            if max.map_or(true, |m| x > m) {
                max = Some(x);
            }
        }
        if self.counters.min {
            self.min = min;
        }
        if self.counters.max {
            self.max = max;
        }
    }

    fn add_moments(&mut self, sample: &Sample) {
        if self.counters.count {
            self.count += 1;
        }
        if self.counters.sum1 {
            self.sum1 += 1.0;
        }
        if let Some(x) = sample.scalar() {
            if self.counters.sumx {
                self.sumx += x;
            }
            if self.counters.sumxx {
                self.sumxx += x * x;
            }
        }
    }

    fn add_tail(&mut self, sync_id: i64, sample: &Sample) {
        if let (true, Some(x)) = (self.counters.glr, sample.scalar()) {
            self.glr.push_back((sync_id, x));
        }
        if let Some(d) = self.counters.covariance {
            let values = sample.components();
            if self.covariance[0] < 0.0 {
                self.covariance[0] = 0.0;
            }
            self.covariance[0] += 1.0;
            for i in 0..d {
                self.covariance[1 + i] += values[i];
                for j in i..d {
                    self.covariance[packed_index(d, i, j)] += values[i] * values[j];
                }
            }
        }
        if let Some(ols) = self.ols.as_mut() {
            ols.increment(sample.components(), 0.0, 1.0);
        }
    }

    pub(crate) fn plain_mean(&self) -> Option<f64> {
        if !(self.counters.sum1 && self.counters.sumx) || self.sum1 <= 0.0 {
            return None;
        }
        Some(self.sumx / self.sum1)
    }

    pub(crate) fn plain_variance(&self) -> Option<f64> {
        if !(self.counters.sum1 && self.counters.sumx && self.counters.sumxx) || self.sum1 <= 1.0 {
            return None;
        }
        let mean = self.sumx / self.sum1;
        let difference = fuzzed_difference(self.sumxx / self.sum1, mean);
        Some(self.sum1 / (self.sum1 - 1.0) * difference)
    }

    pub(crate) fn welford_mean(&self) -> Option<f64> {
        if !self.counters.run_mean || self.count == 0 {
            return None;
        }
        Some(self.run_mean)
    }

    pub(crate) fn welford_variance(&self) -> Option<f64> {
        if !self.counters.run_sn || self.count <= 1 {
            return None;
        }
        Some((self.run_sn / (self.count - 1) as f64).max(0.0))
    }

    /// Scans the GLR trace newest to oldest, decaying the partial sum and
    /// its weight by `keep` per step.
    pub(crate) fn glr_scan<F>(&self, keep: f64, kernel: F) -> Option<(i64, f64)>
    where
        F: Fn(f64, f64) -> f64,
    {
        if !self.counters.glr {
            return None;
        }
        let mut best: Option<(i64, f64)> = None;
        let mut partial = 0.0;
        let mut denominator = 0.0;
        for &(sync_id, residual) in self.glr.iter().rev() {
            partial = residual + partial * keep;
            denominator = denominator * keep + 1.0;
            let trial = kernel(partial, denominator);
            if !trial.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, max)| trial > max) {
                best = Some((sync_id, trial));
            }
        }
        best
    }

    /// Effective sample size of the covariance block, if it holds any data.
    pub(crate) fn covariance_weight(&self) -> Option<f64> {
        self.counters.covariance?;
        let c0 = self.covariance[0];
        (c0 > 0.0).then_some(c0)
    }

    /// Per-component means and pair means scaled by `factor / c0`.
    pub(crate) fn covariance_moments(&self, factor: f64) -> Option<(Array1<f64>, Array2<f64>)> {
        let d = self.counters.covariance?;
        let c0 = self.covariance_weight()?;
        let scale = factor / c0;
        let means = Array1::from_shape_fn(d, |i| self.covariance[1 + i] * scale);
        let pairs = Array2::from_shape_fn((d, d), |(i, j)| {
            let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
            self.covariance[packed_index(d, lo, hi)] * scale
        });
        Some((means, pairs))
    }
}

/// `E[x^2] - E[x]^2`, snapped to zero under catastrophic cancellation.
pub(crate) fn fuzzed_difference(second_moment: f64, mean: f64) -> f64 {
    let difference = second_moment - mean * mean;
    if second_moment == 0.0 || (difference / second_moment).abs() < VARIANCE_FUZZ {
        return 0.0;
    }
    difference.max(0.0)
}

/// Length of the packed covariance block: count, `d` sums, upper triangle.
pub(crate) fn covariance_len(dimension: usize) -> usize {
    1 + dimension + dimension * (dimension + 1) / 2
}

/// Offset of pair `(i, j)`, `i <= j`, inside the packed block.
pub(crate) fn packed_index(dimension: usize, i: usize, j: usize) -> usize {
    1 + dimension + i * dimension - i * i.saturating_sub(1) / 2 + (j - i)
}
