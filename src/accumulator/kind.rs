use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Tag naming one running statistic an accumulator can carry.
///
/// `Covariance` and `Ols` carry their dimension as data, but two tags of the
/// same family compare equal regardless of it: the dimension only sizes the
/// storage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CounterKind {
    Count,
    Sum1,
    SumX,
    SumXX,
    RunMean,
    RunSn,
    Min,
    Max,
    Cusum,
    Glr,
    Covariance { dimension: usize },
    Ols { parameters: usize },
}

impl CounterKind {
    /// Returns the canonical uppercase name used in checkpoint records.
    pub fn as_str(self) -> &'static str {
        match self {
            CounterKind::Count => "COUNT",
            CounterKind::Sum1 => "SUM1",
            CounterKind::SumX => "SUMX",
            CounterKind::SumXX => "SUMXX",
            CounterKind::RunMean => "RUNMEAN",
            CounterKind::RunSn => "RUNSN",
            CounterKind::Min => "MIN",
            CounterKind::Max => "MAX",
            CounterKind::Cusum => "CUSUM",
            CounterKind::Glr => "GLR",
            CounterKind::Covariance { .. } => "COVARIANCE",
            CounterKind::Ols { .. } => "OLS",
        }
    }

    fn ordinal(self) -> u8 {
        match self {
            CounterKind::Count => 0,
            CounterKind::Sum1 => 1,
            CounterKind::SumX => 2,
            CounterKind::SumXX => 3,
            CounterKind::RunMean => 4,
            CounterKind::RunSn => 5,
            CounterKind::Min => 6,
            CounterKind::Max => 7,
            CounterKind::Cusum => 8,
            CounterKind::Glr => 9,
            CounterKind::Covariance { .. } => 10,
            CounterKind::Ols { .. } => 11,
        }
    }

    /// True for counters whose samples must be scalars.
    pub fn is_scalar_valued(self) -> bool {
        matches!(
            self,
            CounterKind::SumX
                | CounterKind::SumXX
                | CounterKind::RunMean
                | CounterKind::RunSn
                | CounterKind::Min
                | CounterKind::Max
                | CounterKind::Cusum
                | CounterKind::Glr
        )
    }
}

impl PartialEq for CounterKind {
    fn eq(&self, other: &Self) -> bool {
        self.ordinal() == other.ordinal()
    }
}

impl Eq for CounterKind {}

impl Hash for CounterKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ordinal().hash(state);
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterKind::Covariance { dimension } => write!(f, "COVARIANCE-{dimension}"),
            CounterKind::Ols { parameters } => write!(f, "OLS-{parameters}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Fixed set of counters selected when an accumulator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSet {
    pub count: bool,
    pub sum1: bool,
    pub sumx: bool,
    pub sumxx: bool,
    pub run_mean: bool,
    pub run_sn: bool,
    pub min: bool,
    pub max: bool,
    pub cusum: bool,
    pub glr: bool,
    pub covariance: Option<usize>,
    pub ols: Option<usize>,
}

impl CounterSet {
    /// Builds a set from requested kinds; the first dimension seen for a
    /// parameterized family wins.
    pub fn from_kinds(kinds: &[CounterKind]) -> Self {
        let mut set = Self::default();
        for kind in kinds {
            set.insert(*kind);
        }
        set
    }

    pub fn insert(&mut self, kind: CounterKind) {
        match kind {
            CounterKind::Count => self.count = true,
            CounterKind::Sum1 => self.sum1 = true,
            CounterKind::SumX => self.sumx = true,
            CounterKind::SumXX => self.sumxx = true,
            CounterKind::RunMean => self.run_mean = true,
            CounterKind::RunSn => self.run_sn = true,
            CounterKind::Min => self.min = true,
            CounterKind::Max => self.max = true,
            CounterKind::Cusum => self.cusum = true,
            CounterKind::Glr => self.glr = true,
            CounterKind::Covariance { dimension } => {
                self.covariance.get_or_insert(dimension);
            }
            CounterKind::Ols { parameters } => {
                self.ols.get_or_insert(parameters);
            }
        }
    }

    pub fn remove(&mut self, kind: CounterKind) {
        match kind {
            CounterKind::Count => self.count = false,
            CounterKind::Sum1 => self.sum1 = false,
            CounterKind::SumX => self.sumx = false,
            CounterKind::SumXX => self.sumxx = false,
            CounterKind::RunMean => self.run_mean = false,
            CounterKind::RunSn => self.run_sn = false,
            CounterKind::Min => self.min = false,
            CounterKind::Max => self.max = false,
            CounterKind::Cusum => self.cusum = false,
            CounterKind::Glr => self.glr = false,
            CounterKind::Covariance { .. } => self.covariance = None,
            CounterKind::Ols { .. } => self.ols = None,
        }
    }

    pub fn contains(&self, kind: CounterKind) -> bool {
        match kind {
            CounterKind::Count => self.count,
            CounterKind::Sum1 => self.sum1,
            CounterKind::SumX => self.sumx,
            CounterKind::SumXX => self.sumxx,
            CounterKind::RunMean => self.run_mean,
            CounterKind::RunSn => self.run_sn,
            CounterKind::Min => self.min,
            CounterKind::Max => self.max,
            CounterKind::Cusum => self.cusum,
            CounterKind::Glr => self.glr,
            CounterKind::Covariance { .. } => self.covariance.is_some(),
            CounterKind::Ols { .. } => self.ols.is_some(),
        }
    }

    /// Lists the selected kinds in canonical order.
    pub fn kinds(&self) -> Vec<CounterKind> {
        let mut kinds = Vec::new();
        let flags = [
            (self.count, CounterKind::Count),
            (self.sum1, CounterKind::Sum1),
            (self.sumx, CounterKind::SumX),
            (self.sumxx, CounterKind::SumXX),
            (self.run_mean, CounterKind::RunMean),
            (self.run_sn, CounterKind::RunSn),
            (self.min, CounterKind::Min),
            (self.max, CounterKind::Max),
            (self.cusum, CounterKind::Cusum),
            (self.glr, CounterKind::Glr),
        ];
        for (present, kind) in flags {
            if present {
                kinds.push(kind);
            }
        }
        if let Some(dimension) = self.covariance {
            kinds.push(CounterKind::Covariance { dimension });
        }
        if let Some(parameters) = self.ols {
            kinds.push(CounterKind::Ols { parameters });
        }
        kinds
    }

    /// True when any selected counter only accepts scalar samples.
    pub fn has_scalar_counters(&self) -> bool {
        self.kinds().into_iter().any(CounterKind::is_scalar_valued)
    }

    /// Applies the implications shared by every weighting variant.
    pub(crate) fn with_implied(mut self) -> Self {
        if self.run_sn {
            self.run_mean = true;
        }
        if self.run_mean {
            self.count = true;
        }
        self
    }
}
