use approx::assert_abs_diff_eq;
use driftwatch::{AccumulatorError, CounterKind, SchemeParams, UpdateScheme};

fn exponential(alpha: f64) -> UpdateScheme {
    UpdateScheme::new(
        "exponential",
        SchemeParams {
            alpha: Some(alpha),
            ..SchemeParams::default()
        },
    )
    .unwrap()
}

/// Reference EWMA seeded with the first value.
fn ewma(values: &[f64], alpha: f64) -> f64 {
    let mut mean = values[0];
    for x in &values[1..] {
        mean = alpha * x + (1.0 - alpha) * mean;
    }
    mean
}

#[test]
fn first_event_sets_the_mean() {
    let mut acc = exponential(0.3)
        .accumulator(&[CounterKind::Sum1, CounterKind::SumX])
        .unwrap();
    assert!(acc.has_counter(CounterKind::Count));
    acc.increment(0, 7.0).unwrap();
    assert_abs_diff_eq!(acc.mean().unwrap(), 7.0, epsilon = 1e-12);
}

#[test]
fn corrected_mean_matches_seeded_ewma() {
    let values = [4.0, 6.0, 5.0, 9.0, 1.0, 3.0];
    let alpha = 0.25;
    let mut acc = exponential(alpha)
        .accumulator(&[CounterKind::Sum1, CounterKind::SumX, CounterKind::SumXX])
        .unwrap();
    for (sync, x) in values.iter().enumerate() {
        acc.increment(sync as i64, *x).unwrap();
    }
    assert_abs_diff_eq!(acc.mean().unwrap(), ewma(&values, alpha), epsilon = 1e-9);
    assert!(acc.variance().unwrap() > 0.0);
}

#[test]
fn constant_stream_has_zero_variance() {
    let mut acc = exponential(0.1)
        .accumulator(&[CounterKind::Sum1, CounterKind::SumX, CounterKind::SumXX])
        .unwrap();
    for sync in 0..200 {
        acc.increment(sync, 2.5).unwrap();
    }
    assert_abs_diff_eq!(acc.mean().unwrap(), 2.5, epsilon = 1e-9);
    assert_eq!(acc.variance(), Some(0.0));
}

#[test]
fn recent_events_dominate() {
    let mut acc = exponential(0.5)
        .accumulator(&[CounterKind::Sum1, CounterKind::SumX])
        .unwrap();
    for sync in 0..20 {
        acc.increment(sync, 0.0).unwrap();
    }
    for sync in 20..40 {
        acc.increment(sync, 10.0).unwrap();
    }
    assert!(acc.mean().unwrap() > 9.99);
}

#[test]
fn running_mean_decays_geometrically() {
    let values = [1.0, 5.0, 2.0, 8.0];
    let alpha = 0.4;
    let mut acc = exponential(alpha).accumulator(&[CounterKind::RunSn]).unwrap();
    for (sync, x) in values.iter().enumerate() {
        acc.increment(sync as i64, *x).unwrap();
    }
    assert_abs_diff_eq!(acc.run_mean().unwrap(), ewma(&values, alpha), epsilon = 1e-12);
    assert!(acc.run_variance().unwrap() > 0.0);
}

#[test]
fn cusum_and_extrema_are_rejected_at_construction() {
    let scheme = exponential(0.2);
    for kind in [CounterKind::Cusum, CounterKind::Min, CounterKind::Max] {
        let err = scheme.accumulator(&[CounterKind::SumX, kind]).unwrap_err();
        assert_eq!(
            err,
            AccumulatorError::UnsupportedCounter {
                kind,
                scheme: "exponential"
            }
        );
    }
}

#[test]
fn glr_scan_decays_older_residuals() {
    let mut acc = exponential(0.5).accumulator(&[CounterKind::Glr]).unwrap();
    acc.increment(0, 4.0).unwrap();
    acc.increment(1, 2.0).unwrap();
    // newest alone: s = 2, n = 1; both: s = 4 + 2 * 0.5 = 5, n = 1.5
    let (onset, maximum) = acc.glr(|s, n| s * s / n).unwrap();
    assert_eq!(onset, 0);
    assert_abs_diff_eq!(maximum, 25.0 / 1.5, epsilon = 1e-12);
}

#[test]
fn covariance_uses_decayed_weights() {
    let mut acc = exponential(0.5)
        .accumulator(&[CounterKind::Covariance { dimension: 2 }])
        .unwrap();
    acc.increment(0, vec![0.0, 0.0]).unwrap();
    assert!(acc.covariance().is_none());
    acc.increment(1, vec![2.0, -2.0]).unwrap();
    // weights 0.5 and 1 over a total of 1.5
    let means = acc.covmean().unwrap();
    assert_abs_diff_eq!(means[0], 2.0 / 1.5, epsilon = 1e-12);
    assert_abs_diff_eq!(means[1], -2.0 / 1.5, epsilon = 1e-12);
    let cov = acc.covariance().unwrap();
    assert!(cov[[0, 0]] > 0.0);
    assert!(cov[[0, 1]] < 0.0);
    assert_abs_diff_eq!(cov[[0, 1]], -cov[[0, 0]], epsilon = 1e-12);
}
