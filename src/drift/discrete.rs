use super::{
    effective_scheme, Ancillary, AncillaryValue, DriftError, Evaluation, Observation, Prepared,
    TestFunction,
};
use crate::accumulator::{Accumulator, AccumulatorError, CounterKind, UpdateScheme};
use crate::config::{Baseline, CountTable, Normalization, TestDistributions, TestStatistic};
use std::collections::BTreeMap;

/// Owned copy of the counts a discrete test has observed.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedCounts {
    Plain(BTreeMap<String, f64>),
    /// Keyed by conditioning value, then category.
    Conditioned(BTreeMap<String, BTreeMap<String, f64>>),
}

/// One SUMX accumulator per category. Every event feeds every bin (zero for
/// all but the observed category) so windowed bins age out together.
#[derive(Debug)]
pub(crate) struct CategoryCounts {
    scheme: UpdateScheme,
    bins: BTreeMap<String, Accumulator>,
}

impl CategoryCounts {
    pub(crate) fn new(scheme: UpdateScheme) -> Self {
        Self {
            scheme,
            bins: BTreeMap::new(),
        }
    }

    pub(crate) fn observe(
        &mut self,
        sync_id: i64,
        category: &str,
        weight: f64,
    ) -> Result<(), AccumulatorError> {
        for (bin, accumulator) in self.bins.iter_mut() {
            let value = if bin == category { weight } else { 0.0 };
            accumulator.increment(sync_id, value)?;
        }
        if !self.bins.contains_key(category) {
            let mut accumulator = self.scheme.accumulator(&[CounterKind::SumX])?;
            accumulator.increment(sync_id, weight)?;
            self.bins.insert(category.to_string(), accumulator);
        }
        Ok(())
    }

    pub(crate) fn counts(&self) -> BTreeMap<String, f64> {
        self.bins
            .iter()
            .map(|(bin, accumulator)| (bin.clone(), accumulator.sum().unwrap_or(0.0)))
            .collect()
    }
}

/// Similarity of an observed count vector to the baseline counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Similarity {
    pub score: f64,
    /// Category with the largest share of the inner product.
    pub top_category: Option<String>,
    /// That category's contribution, scaled like the score.
    pub top_contribution: f64,
}

/// Scores `observed` against `baseline`; `None` when either vector has zero
/// norm under a normalized scheme.
pub fn similarity(
    baseline: &CountTable,
    observed: &BTreeMap<String, f64>,
    normalization: Normalization,
) -> Option<Similarity> {
    let baseline_norm2 = baseline.norm_squared();
    let mut observed_norm2 = 0.0;
    let mut inner = 0.0;
    let mut top_category = None;
    let mut top_contribution = 0.0;
    for (category, &count) in observed {
        observed_norm2 += count * count;
        if let Some(&expected) = baseline.counts.get(category) {
            let contribution = expected * count;
            inner += contribution;
            if contribution > top_contribution {
                top_contribution = contribution;
                top_category = Some(category.clone());
            }
        }
    }
    let scale = match normalization {
        Normalization::SizeWeighted => (baseline_norm2 + observed_norm2) / 2.0,
        Normalization::Independent => (baseline_norm2 * observed_norm2).max(0.0).sqrt(),
        Normalization::Unnormalized => 1.0,
    };
    if baseline_norm2 <= 0.0 || observed_norm2 <= 0.0 || scale <= 0.0 {
        return None;
    }
    Some(Similarity {
        score: inner / scale,
        top_category,
        top_contribution: top_contribution / scale,
    })
}

#[derive(Debug)]
enum Counts {
    Plain(CategoryCounts),
    Conditioned {
        scheme: UpdateScheme,
        groups: BTreeMap<String, CategoryCounts>,
    },
}

/// Discrete-distribution similarity test.
#[derive(Debug)]
pub(crate) struct DiscreteTest {
    baseline: CountTable,
    normalization: Normalization,
    counts: Counts,
}

pub(crate) fn prepare(
    definition: &TestDistributions,
    scheme: &UpdateScheme,
) -> Result<Prepared, DriftError> {
    let baseline = count_table(definition, TestStatistic::DiscreteDistribution)?;
    let counts = if definition.conditioned {
        if definition.window_size != 0 || scheme.window_bounds().is_some() {
            return Err(DriftError::WindowedConditionedCounts);
        }
        Counts::Conditioned {
            scheme: *scheme,
            groups: BTreeMap::new(),
        }
    } else {
        Counts::Plain(CategoryCounts::new(effective_scheme(definition, scheme)))
    };
    Ok(Ok(Box::new(DiscreteTest {
        baseline,
        normalization: definition.normalization_scheme(),
        counts,
    })))
}

/// Baseline count table of a test that compares category counts.
pub(crate) fn count_table(
    definition: &TestDistributions,
    statistic: TestStatistic,
) -> Result<CountTable, DriftError> {
    match &definition.baseline {
        Baseline::Counts(table) => Ok(table.clone()),
        Baseline::Distribution(distribution) => Err(DriftError::UnsupportedBaseline {
            statistic,
            baseline: distribution.name(),
        }),
    }
}

impl DiscreteTest {
    fn best_condition(&self) -> Option<(String, Similarity)> {
        let Counts::Conditioned { groups, .. } = &self.counts else {
            return None;
        };
        let mut best: Option<(String, Similarity)> = None;
        for (condition, group) in groups {
            let Some(candidate) = similarity(&self.baseline, &group.counts(), self.normalization)
            else {
                continue;
            };
            if best
                .as_ref()
                .map_or(true, |(_, current)| candidate.score > current.score)
            {
                best = Some((condition.clone(), candidate));
            }
        }
        best
    }
}

impl TestFunction for DiscreteTest {
    fn evaluate(&mut self, sync_id: i64, observation: &Observation) -> Result<Evaluation, DriftError> {
        let weight = observation.weight.unwrap_or(1.0);
        let category = observation.value.category();
        if let Some(category) = category.as_deref() {
            match &mut self.counts {
                Counts::Plain(counts) => counts.observe(sync_id, category, weight)?,
                Counts::Conditioned { scheme, groups } => {
                    if let Some(condition) = observation.condition.as_ref() {
                        groups
                            .entry(condition.clone())
                            .or_insert_with(|| CategoryCounts::new(*scheme))
                            .observe(sync_id, category, weight)?;
                    }
                }
            }
        }

        let (result, condition) = match &self.counts {
            Counts::Plain(counts) => (
                similarity(&self.baseline, &counts.counts(), self.normalization),
                None,
            ),
            Counts::Conditioned { .. } => match self.best_condition() {
                Some((condition, result)) => (Some(result), Some(condition)),
                None => (None, None),
            },
        };
        let Some(result) = result else {
            return Ok(Evaluation::Unscored("count vector has zero norm"));
        };

        let mut ancillary = Ancillary::new();
        ancillary.insert(
            "maxDistCat".to_string(),
            result
                .top_category
                .map_or(AncillaryValue::Missing, AncillaryValue::Text),
        );
        ancillary.insert(
            "maxDistCatVal".to_string(),
            AncillaryValue::Number(result.top_contribution),
        );
        ancillary.insert("weightVal".to_string(), AncillaryValue::Number(weight));
        ancillary.insert(
            "conditionVal".to_string(),
            observation
                .condition
                .clone()
                .map_or(AncillaryValue::Missing, AncillaryValue::Text),
        );
        if let Some(condition) = condition {
            ancillary.insert("maxDistCondVal".to_string(), AncillaryValue::Text(condition));
        }
        Ok(Evaluation::Scored {
            value: result.score,
            ancillary,
        })
    }

    fn observed_counts(&self) -> Option<ObservedCounts> {
        Some(match &self.counts {
            Counts::Plain(counts) => ObservedCounts::Plain(counts.counts()),
            Counts::Conditioned { groups, .. } => ObservedCounts::Conditioned(
                groups
                    .iter()
                    .map(|(condition, group)| (condition.clone(), group.counts()))
                    .collect(),
            ),
        })
    }
}
