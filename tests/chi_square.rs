use approx::assert_abs_diff_eq;
use driftwatch::{
    chi_square, AncillaryValue, Baseline, BaselineMonitor, CountTable, DriftError, Observation,
    TestDistributions, TestStatistic, UpdateScheme,
};
use std::collections::BTreeMap;

fn table(entries: &[(&str, f64)], sample: Option<f64>) -> CountTable {
    CountTable {
        counts: entries
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect(),
        sample,
    }
}

fn observed(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(name, count)| (name.to_string(), *count))
        .collect()
}

#[test]
fn matching_proportions_give_zero_statistic() {
    let result = chi_square(
        &table(&[("a", 50.0), ("b", 50.0)], None),
        &observed(&[("a", 5.0), ("b", 5.0)]),
    )
    .unwrap();
    assert_eq!(result.chi_square, 0.0);
    assert_eq!(result.degrees_of_freedom, 1);
    assert_abs_diff_eq!(result.p_value(), 1.0, epsilon = 1e-12);
}

#[test]
fn statistic_weighs_both_sampling_errors() {
    let result = chi_square(
        &table(&[("a", 1.0), ("b", 1.0)], None),
        &observed(&[("a", 3.0), ("b", 1.0)]),
    )
    .unwrap();
    // 0.0625 / 0.4375 + 0.0625 / 0.3125
    assert_abs_diff_eq!(result.chi_square, 1.0 / 7.0 + 0.2, epsilon = 1e-12);
    assert!(result.probability > 0.0 && result.probability < 1.0);
}

#[test]
fn normalized_baseline_uses_its_sample_size() {
    let result = chi_square(
        &table(&[("a", 0.5), ("b", 0.5)], Some(100.0)),
        &observed(&[("a", 3.0), ("b", 1.0)]),
    )
    .unwrap();
    // expected error 0.005 per bin
    let expected = 0.0625 / (0.005 + 3.0 / 16.0) + 0.0625 / (0.005 + 1.0 / 16.0);
    assert_abs_diff_eq!(result.chi_square, expected, epsilon = 1e-12);
}

#[test]
fn a_single_populated_bin_has_no_degrees_of_freedom() {
    assert!(chi_square(&table(&[("a", 4.0)], None), &observed(&[("a", 2.0)])).is_none());
    assert!(chi_square(&table(&[("a", 4.0)], None), &BTreeMap::new()).is_none());
}

#[test]
fn monitor_alerts_on_shifted_counts() {
    let definition = TestDistributions::new(
        TestStatistic::ChiSquareDistribution,
        0.95,
        Baseline::Counts(table(&[("a", 50.0), ("b", 50.0)], None)),
    );
    let mut monitor = BaselineMonitor::setup(&definition, &UpdateScheme::unweighted(), "all")
        .unwrap()
        .monitor()
        .unwrap();
    let mut last = None;
    for sync in 0..40 {
        last = monitor.score(sync, &Observation::category("a")).unwrap();
    }
    let last = last.unwrap();
    assert!(last.alert);
    assert_eq!(
        last.ancillary["degreesOfFreedom"],
        AncillaryValue::Integer(1)
    );
    assert!(last.ancillary["pValue"].as_f64().unwrap() < 0.05);
}

#[test]
fn conditioned_definitions_are_rejected() {
    let mut definition = TestDistributions::new(
        TestStatistic::ChiSquareDistribution,
        0.95,
        Baseline::Counts(table(&[("a", 1.0)], None)),
    );
    definition.conditioned = true;
    let err = BaselineMonitor::setup(&definition, &UpdateScheme::unweighted(), "all").unwrap_err();
    assert!(matches!(err, DriftError::ConditionUnsupported { .. }));
}
