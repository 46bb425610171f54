use super::kind::{CounterKind, CounterSet};
use super::state::{fuzzed_difference, packed_index, CounterState};
use super::{AccumulatorError, HistoryEntry, Sample};
use ndarray::{Array1, Array2};
use std::collections::VecDeque;
use std::fmt;

/// Policy deciding how much each past event still contributes.
///
/// The default methods implement the unweighted reading of the counters;
/// variants override only what their weighting changes.
pub(crate) trait Weighting: fmt::Debug + Send {
    fn name(&self) -> &'static str;

    /// Maps the requested counters onto the set actually stored.
    fn prepare(&self, requested: CounterSet) -> Result<CounterSet, AccumulatorError> {
        Ok(requested.with_implied())
    }

    fn increment(&mut self, state: &mut CounterState, sync_id: i64, sample: Sample);

    fn mean(&self, state: &CounterState) -> Option<f64> {
        state.plain_mean()
    }

    fn variance(&self, state: &CounterState) -> Option<f64> {
        state.plain_variance()
    }

    fn run_mean(&self, state: &CounterState) -> Option<f64> {
        state.welford_mean()
    }

    fn run_variance(&self, state: &CounterState) -> Option<f64> {
        state.welford_variance()
    }

    /// Per-step factor applied to older GLR residuals.
    fn glr_keep(&self) -> f64 {
        1.0
    }

    fn covariance(&self, state: &CounterState) -> Option<Array2<f64>> {
        let (means, pairs) = state.covariance_moments(1.0)?;
        Some(pairs - outer(&means))
    }

    fn covmean(&self, state: &CounterState) -> Option<Array1<f64>> {
        state.covariance_moments(1.0).map(|(means, _)| means)
    }

    /// Drops any state kept outside the counters.
    fn clear(&mut self) {}

    /// Retained event history, oldest first.
    fn history(&self) -> Vec<HistoryEntry> {
        Vec::new()
    }

    fn restore_history(&mut self, entries: Vec<HistoryEntry>) -> Result<(), AccumulatorError> {
        if entries.is_empty() {
            return Ok(());
        }
        Err(AccumulatorError::HistoryNotSupported {
            scheme: self.name(),
        })
    }
}

fn outer(means: &Array1<f64>) -> Array2<f64> {
    let d = means.len();
    Array2::from_shape_fn((d, d), |(i, j)| means[i] * means[j])
}

/// Every event counts with weight one, forever.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Unweighted;

impl Weighting for Unweighted {
    fn name(&self) -> &'static str {
        "unweighted"
    }

    fn increment(&mut self, state: &mut CounterState, sync_id: i64, sample: Sample) {
        state.add(sync_id, &sample);
    }
}

/// Geometric decay: each event multiplies the weight of all earlier events
/// by `1 - alpha`.
///
/// RUNMEAN is seeded with the first value instead of starting from zero, so
/// running fits read higher than a zero-started EWMA would for roughly the
/// first `1 / alpha` events.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Exponential {
    pub(crate) alpha: f64,
}

impl Exponential {
    fn keep(&self) -> f64 {
        1.0 - self.alpha
    }

    /// `1 - (1 - alpha)^n`, the share of total weight seen after `n` events.
    fn correction(&self, n: u64) -> f64 {
        1.0 - self.keep().powf(n as f64)
    }
}

impl Weighting for Exponential {
    fn name(&self) -> &'static str {
        "exponential"
    }

    fn prepare(&self, requested: CounterSet) -> Result<CounterSet, AccumulatorError> {
        for kind in [CounterKind::Cusum, CounterKind::Min, CounterKind::Max] {
            if requested.contains(kind) {
                return Err(AccumulatorError::UnsupportedCounter {
                    kind,
                    scheme: self.name(),
                });
            }
        }
        let mut counters = requested.with_implied();
        if counters.sum1 || counters.covariance.is_some() {
            counters.count = true;
        }
        Ok(counters)
    }

    fn increment(&mut self, state: &mut CounterState, sync_id: i64, sample: Sample) {
        let keep = self.keep();
        let counters = state.counters;
        if counters.count {
            state.count += 1;
        }
        if let Some(x) = sample.scalar() {
            if counters.sumx {
                state.sumx = x + keep * state.sumx;
            }
            if counters.sumxx {
                state.sumxx = x * x + keep * state.sumxx;
            }
            if counters.sum1 {
                state.sum1 = 1.0 + keep * state.sum1;
                if state.count == 1 {
                    state.sumx = x / self.alpha;
                    state.sumxx = x * x / self.alpha;
                }
            }
            if counters.run_mean {
                if state.count == 1 {
                    state.run_mean = x;
                    state.run_sn = 0.0;
                } else {
                    let diff = x - state.run_mean;
                    let step = self.alpha * diff;
                    state.run_mean += step;
                    if counters.run_sn {
                        state.run_sn = keep * (state.run_sn + diff * step);
                    }
                }
            }
            if counters.glr {
                state.glr.push_back((sync_id, x));
            }
        } else if counters.sum1 {
            state.sum1 = 1.0 + keep * state.sum1;
        }
        if let Some(d) = counters.covariance {
            let values = sample.components();
            let block = &mut state.covariance;
            block[0] = 1.0 + keep * block[0].max(0.0);
            for i in 0..d {
                block[1 + i] = values[i] + keep * block[1 + i];
                for j in i..d {
                    let k = packed_index(d, i, j);
                    block[k] = values[i] * values[j] + keep * block[k];
                }
            }
        }
        if let Some(ols) = state.ols.as_mut() {
            ols.increment(sample.components(), self.alpha, 1.0);
        }
    }

    fn mean(&self, state: &CounterState) -> Option<f64> {
        let counters = state.counters;
        if !(counters.sum1 && counters.sumx) || state.sum1 <= 0.0 {
            return None;
        }
        Some(state.sumx * self.correction(state.count) / state.sum1)
    }

    fn variance(&self, state: &CounterState) -> Option<f64> {
        if !state.counters.sumxx || state.count <= 1 {
            return None;
        }
        let n = state.count as f64;
        let mean = self.mean(state)?;
        let second = state.sumxx * self.correction(state.count) / state.sum1;
        Some(n / (n - 1.0) * fuzzed_difference(second, mean))
    }

    fn run_variance(&self, state: &CounterState) -> Option<f64> {
        if !state.counters.run_sn || state.count <= 1 {
            return None;
        }
        let n = state.count as f64;
        Some(state.run_sn * n / (n - 1.0))
    }

    fn glr_keep(&self) -> f64 {
        self.keep()
    }

    fn covariance(&self, state: &CounterState) -> Option<Array2<f64>> {
        if state.count <= 1 {
            return None;
        }
        let n = state.count as f64;
        let (means, pairs) = state.covariance_moments(1.0)?;
        Some((pairs - outer(&means)) * (n / (n - 1.0)))
    }
}

/// Fixed window over the last `size` events by arrival order, skipping the
/// newest `lag` events.
#[derive(Debug, Clone)]
pub(crate) struct FixedWindow {
    size: usize,
    lag: usize,
    /// Newest entry at the front.
    history: VecDeque<HistoryEntry>,
}

impl FixedWindow {
    pub(crate) fn new(size: usize, lag: usize) -> Self {
        Self {
            size,
            lag,
            history: VecDeque::new(),
        }
    }
}

/// Window variants answer running statistics from plain sums instead.
fn windowed_counters(requested: CounterSet) -> CounterSet {
    let mut counters = requested;
    if counters.run_mean || counters.run_sn {
        counters.sum1 = true;
        counters.sumx = true;
    }
    if counters.run_sn {
        counters.sumxx = true;
    }
    counters.run_mean = false;
    counters.run_sn = false;
    counters
}

impl Weighting for FixedWindow {
    fn name(&self) -> &'static str {
        "window"
    }

    fn prepare(&self, requested: CounterSet) -> Result<CounterSet, AccumulatorError> {
        Ok(windowed_counters(requested))
    }

    fn increment(&mut self, state: &mut CounterState, sync_id: i64, sample: Sample) {
        self.history.push_front(HistoryEntry { sync_id, sample });
        let entering = self.history.get(self.lag).cloned();
        let leaving = if self.history.len() > self.lag + self.size {
            self.history.pop_back()
        } else {
            None
        };
        if let Some(entry) = entering {
            state.add_entering(entry.sync_id, &entry.sample);
        }
        if let Some(entry) = leaving {
            state.remove_leaving(&entry.sample);
        }
        if state.counters.min || state.counters.max {
            let end = (self.lag + self.size).min(self.history.len());
            let start = self.lag.min(end);
            state.recompute_extrema(self.history.range(start..end).map(|entry| &entry.sample));
        }
    }

    fn run_mean(&self, state: &CounterState) -> Option<f64> {
        self.mean(state)
    }

    fn run_variance(&self, state: &CounterState) -> Option<f64> {
        self.variance(state)
    }

    fn clear(&mut self) {
        self.history.clear();
    }

    fn history(&self) -> Vec<HistoryEntry> {
        self.history.iter().rev().cloned().collect()
    }

    fn restore_history(&mut self, entries: Vec<HistoryEntry>) -> Result<(), AccumulatorError> {
        self.history = entries.into_iter().rev().collect();
        self.history.truncate(self.lag + self.size);
        Ok(())
    }
}

/// Window keyed by external sync ids: an entry is active while
/// `now - lag - size < sync_id <= now - lag`. Every increment rebuilds the
/// counters from the retained history.
#[derive(Debug, Clone)]
pub(crate) struct SynchronizedWindow {
    size: i64,
    lag: i64,
    /// Oldest entry at the front.
    history: Vec<HistoryEntry>,
}

impl SynchronizedWindow {
    pub(crate) fn new(size: i64, lag: i64) -> Self {
        Self {
            size,
            lag,
            history: Vec::new(),
        }
    }
}

impl Weighting for SynchronizedWindow {
    fn name(&self) -> &'static str {
        "synchronized"
    }

    fn prepare(&self, requested: CounterSet) -> Result<CounterSet, AccumulatorError> {
        Ok(windowed_counters(requested))
    }

    // TODO: diff the entering and leaving sync ids instead of rescanning the
    // whole retained history on every event.
    fn increment(&mut self, state: &mut CounterState, sync_id: i64, sample: Sample) {
        self.history.push(HistoryEntry { sync_id, sample });
        let tail = sync_id.saturating_sub(self.lag).saturating_sub(self.size);
        self.history.retain(|entry| entry.sync_id > tail);
        state.clear();
        let head = sync_id.saturating_sub(self.lag);
        for entry in self.history.iter().filter(|entry| entry.sync_id <= head) {
            state.add(entry.sync_id, &entry.sample);
        }
    }

    fn run_mean(&self, state: &CounterState) -> Option<f64> {
        self.mean(state)
    }

    fn run_variance(&self, state: &CounterState) -> Option<f64> {
        self.variance(state)
    }

    fn clear(&mut self) {
        self.history.clear();
    }

    fn history(&self) -> Vec<HistoryEntry> {
        self.history.clone()
    }

    fn restore_history(&mut self, entries: Vec<HistoryEntry>) -> Result<(), AccumulatorError> {
        self.history = entries;
        Ok(())
    }
}
