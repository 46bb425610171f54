use super::discrete::{count_table, CategoryCounts, ObservedCounts};
use super::{
    effective_scheme, Ancillary, AncillaryValue, DriftError, Evaluation, Observation, Prepared,
    TestFunction,
};
use crate::accumulator::UpdateScheme;
use crate::config::{CountTable, TestDistributions, TestStatistic};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::collections::{BTreeMap, BTreeSet};

/// Chi-square comparison of observed counts with a baseline table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquareResult {
    pub chi_square: f64,
    pub degrees_of_freedom: u32,
    /// Chi-square CDF at `chi_square`.
    pub probability: f64,
}

impl ChiSquareResult {
    pub fn p_value(&self) -> f64 {
        1.0 - self.probability
    }
}

/// Compares normalized frequencies bin by bin. `None` when either table is
/// empty or fewer than two bins carry counts.
pub fn chi_square(baseline: &CountTable, observed: &BTreeMap<String, f64>) -> Option<ChiSquareResult> {
    let expected_total = baseline.total();
    let observed_total: f64 = observed.values().sum();
    if expected_total <= 0.0 || observed_total <= 0.0 || baseline.sample.is_some_and(|s| s <= 0.0) {
        return None;
    }
    let bins: BTreeSet<&String> = baseline.counts.keys().chain(observed.keys()).collect();
    let mut chi_square = 0.0;
    let mut populated = 0u32;
    for bin in bins {
        let expected = baseline.counts.get(bin).copied().unwrap_or(0.0);
        let observed = observed.get(bin).copied().unwrap_or(0.0);
        if expected <= 0.0 && observed <= 0.0 {
            continue;
        }
        let difference = expected / expected_total - observed / observed_total;
        let expected_error = match baseline.sample {
            Some(sample) => expected / expected_total / sample,
            None => expected / (expected_total * expected_total),
        };
        let observed_error = observed / (observed_total * observed_total);
        chi_square += difference * difference / (expected_error + observed_error);
        populated += 1;
    }
    let degrees_of_freedom = populated.checked_sub(1).filter(|ndf| *ndf > 0)?;
    let probability = ChiSquared::new(f64::from(degrees_of_freedom))
        .ok()?
        .cdf(chi_square);
    Some(ChiSquareResult {
        chi_square,
        degrees_of_freedom,
        probability,
    })
}

#[derive(Debug)]
pub(crate) struct ChiSquareTest {
    baseline: CountTable,
    counts: CategoryCounts,
}

pub(crate) fn prepare(
    definition: &TestDistributions,
    scheme: &UpdateScheme,
) -> Result<Prepared, DriftError> {
    if definition.conditioned {
        return Err(DriftError::ConditionUnsupported {
            statistic: TestStatistic::ChiSquareDistribution,
        });
    }
    let baseline = count_table(definition, TestStatistic::ChiSquareDistribution)?;
    Ok(Ok(Box::new(ChiSquareTest {
        baseline,
        counts: CategoryCounts::new(effective_scheme(definition, scheme)),
    })))
}

impl TestFunction for ChiSquareTest {
    fn evaluate(&mut self, sync_id: i64, observation: &Observation) -> Result<Evaluation, DriftError> {
        if let Some(category) = observation.value.category() {
            let weight = observation.weight.unwrap_or(1.0);
            self.counts.observe(sync_id, &category, weight)?;
        }
        let Some(result) = chi_square(&self.baseline, &self.counts.counts()) else {
            return Ok(Evaluation::Unscored("too few populated categories"));
        };
        let mut ancillary = Ancillary::new();
        ancillary.insert("pValue".to_string(), AncillaryValue::Number(result.p_value()));
        ancillary.insert("chiSquare".to_string(), AncillaryValue::Number(result.chi_square));
        ancillary.insert(
            "degreesOfFreedom".to_string(),
            AncillaryValue::Integer(i64::from(result.degrees_of_freedom)),
        );
        Ok(Evaluation::Scored {
            value: result.probability,
            ancillary,
        })
    }

    fn observed_counts(&self) -> Option<ObservedCounts> {
        Some(ObservedCounts::Plain(self.counts.counts()))
    }
}
