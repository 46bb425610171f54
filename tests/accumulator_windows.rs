use approx::assert_abs_diff_eq;
use driftwatch::{CounterKind, SchemeParams, UpdateScheme};

fn scheme(name: &str, size: i64, lag: i64) -> UpdateScheme {
    UpdateScheme::new(
        name,
        SchemeParams {
            window_size: Some(size),
            window_lag: Some(lag),
            ..SchemeParams::default()
        },
    )
    .unwrap()
}

fn moments() -> Vec<CounterKind> {
    vec![
        CounterKind::Count,
        CounterKind::Sum1,
        CounterKind::SumX,
        CounterKind::SumXX,
        CounterKind::Min,
        CounterKind::Max,
    ]
}

#[test]
fn fixed_window_keeps_last_three_events() {
    let mut acc = scheme("window", 3, 0).accumulator(&moments()).unwrap();
    for (sync, x) in [10.0, 20.0, 30.0, 40.0, 50.0, 60.0].into_iter().enumerate() {
        acc.increment(sync as i64, x).unwrap();
    }
    assert_eq!(acc.count(), Some(3));
    assert_eq!(acc.mean(), Some(50.0));
    assert_abs_diff_eq!(acc.variance().unwrap(), 100.0, epsilon = 1e-9);
    assert_eq!((acc.min(), acc.max()), (Some(40.0), Some(60.0)));
}

#[test]
fn fixed_window_mean_ignores_older_history() {
    let tail = [3.0, -1.0, 4.0, 1.0];
    for prefix in [0usize, 5, 50] {
        let mut acc = scheme("window", 4, 0).accumulator(&moments()).unwrap();
        let mut sync = 0;
        for _ in 0..prefix {
            acc.increment(sync, 1000.0).unwrap();
            sync += 1;
        }
        for x in tail {
            acc.increment(sync, x).unwrap();
            sync += 1;
        }
        assert_abs_diff_eq!(acc.mean().unwrap(), 1.75, epsilon = 1e-9);
    }
}

#[test]
fn lag_delays_entry_into_window() {
    let mut acc = scheme("window", 2, 1).accumulator(&moments()).unwrap();
    acc.increment(0, 1.0).unwrap();
    assert_eq!(acc.count(), Some(0));
    assert_eq!(acc.min(), None);
    acc.increment(1, 2.0).unwrap();
    assert_eq!(acc.mean(), Some(1.0));
    acc.increment(2, 3.0).unwrap();
    acc.increment(3, 4.0).unwrap();
    // active: events 1 and 2, event 3 still lagging
    assert_eq!(acc.mean(), Some(2.5));
    assert_eq!((acc.min(), acc.max()), (Some(2.0), Some(3.0)));
}

#[test]
fn running_statistics_answer_from_window_sums() {
    let mut acc = scheme("window", 2, 0)
        .accumulator(&[CounterKind::RunSn])
        .unwrap();
    assert!(!acc.has_counter(CounterKind::RunMean));
    assert!(acc.has_counter(CounterKind::SumXX));
    for (sync, x) in [100.0, 1.0, 3.0].into_iter().enumerate() {
        acc.increment(sync as i64, x).unwrap();
    }
    assert_eq!(acc.run_mean(), Some(2.0));
    assert_eq!(acc.run_variance(), Some(2.0));
}

#[test]
fn windowed_cusum_restarts_at_oldest_active_event() {
    let mut acc = scheme("window", 2, 0)
        .accumulator(&[CounterKind::Cusum])
        .unwrap();
    acc.increment(0, 5.0).unwrap();
    acc.increment(1, 1.0).unwrap();
    assert_eq!(acc.cusum(), Some(6.0));
    acc.increment(2, 2.0).unwrap();
    // trace started at event 1 survives
    assert_eq!(acc.cusum(), Some(3.0));
}

#[test]
fn windowed_glr_forgets_evicted_residuals() {
    let mut acc = scheme("window", 3, 0)
        .accumulator(&[CounterKind::Glr])
        .unwrap();
    for sync in 0..10 {
        acc.increment(sync, 2.0).unwrap();
    }
    assert_eq!(acc.glr_trace().len(), 3);
    let (onset, maximum) = acc.glr(|s, n| s * s / n).unwrap();
    assert_eq!(onset, 7);
    assert_abs_diff_eq!(maximum, 12.0, epsilon = 1e-12);
}

#[test]
fn windowed_covariance_and_ols_subtract_evicted_samples() {
    let mut acc = scheme("window", 3, 0)
        .accumulator(&[CounterKind::Covariance { dimension: 2 }])
        .unwrap();
    acc.increment(0, vec![100.0, -100.0]).unwrap();
    for (sync, x) in [1.0, 2.0, 3.0].into_iter().enumerate() {
        acc.increment(sync as i64 + 1, vec![x, 2.0 * x]).unwrap();
    }
    let means = acc.covmean().unwrap();
    assert_abs_diff_eq!(means[0], 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(means[1], 4.0, epsilon = 1e-9);

    let mut ols = scheme("window", 3, 0)
        .accumulator(&[CounterKind::Ols { parameters: 2 }])
        .unwrap();
    ols.increment(0, vec![50.0, 1.0, 0.0]).unwrap();
    for (sync, x) in [1.0, 2.0, 3.0].into_iter().enumerate() {
        ols.increment(sync as i64 + 1, vec![-1.0 + 0.5 * x, 1.0, x]).unwrap();
    }
    let beta = ols.ordinary_least_squares().unwrap();
    assert_abs_diff_eq!(beta[0], -1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(beta[1], 0.5, epsilon = 1e-9);
}

#[test]
fn zero_sized_window_never_holds_events() {
    let mut acc = scheme("window", 0, 0).accumulator(&moments()).unwrap();
    for sync in 0..5 {
        acc.increment(sync, sync as f64).unwrap();
    }
    assert_eq!(acc.count(), Some(0));
    assert_eq!(acc.mean(), None);
}

#[test]
fn synchronized_window_uses_sync_id_distance() {
    let mut acc = scheme("synchronized", 3, 0).accumulator(&moments()).unwrap();
    acc.increment(1, 1.0).unwrap();
    acc.increment(2, 2.0).unwrap();
    // sync ids 3..6 skipped by this context
    acc.increment(7, 7.0).unwrap();
    assert_eq!(acc.count(), Some(1));
    assert_eq!(acc.mean(), Some(7.0));
    acc.increment(8, 8.0).unwrap();
    acc.increment(9, 9.0).unwrap();
    acc.increment(10, 10.0).unwrap();
    assert_eq!(acc.mean(), Some(9.0));
    assert_eq!((acc.min(), acc.max()), (Some(8.0), Some(10.0)));
}

#[test]
fn synchronized_lag_excludes_recent_sync_ids() {
    let mut acc = scheme("synchronized", 2, 2).accumulator(&moments()).unwrap();
    for sync in 0..6 {
        acc.increment(sync, sync as f64).unwrap();
    }
    // head = 3, tail = 1: active ids 2 and 3
    assert_eq!(acc.count(), Some(2));
    assert_eq!(acc.mean(), Some(2.5));
}

#[test]
fn synchronized_covariance_is_rebuilt_each_event() {
    let mut acc = scheme("synchronized", 2, 0)
        .accumulator(&[CounterKind::Covariance { dimension: 2 }, CounterKind::Count])
        .unwrap();
    for sync in 0..5 {
        let x = sync as f64;
        acc.increment(sync, vec![x, -x]).unwrap();
    }
    assert_eq!(acc.count(), Some(2));
    let cov = acc.covariance().unwrap();
    assert_abs_diff_eq!(cov[[0, 0]], 0.25, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[0, 1]], -0.25, epsilon = 1e-12);
}

#[test]
fn clear_drops_window_history() {
    for name in ["window", "synchronized"] {
        let mut acc = scheme(name, 3, 0).accumulator(&moments()).unwrap();
        for sync in 0..5 {
            acc.increment(sync, sync as f64).unwrap();
        }
        acc.clear();
        assert_eq!(acc.count(), Some(0));
        assert!(acc.checkpoint().history.is_none());
        for sync in 5..10 {
            acc.increment(sync, 100.0).unwrap();
        }
        assert_eq!(acc.count(), Some(3), "{name}");
        assert_eq!(acc.mean(), Some(100.0), "{name}");
        assert_eq!((acc.min(), acc.max()), (Some(100.0), Some(100.0)));
    }

    let mut source = scheme("window", 3, 0).accumulator(&moments()).unwrap();
    source.increment(0, 7.0).unwrap();
    let mut acc = scheme("window", 3, 0).accumulator(&moments()).unwrap();
    acc.increment(0, 1.0).unwrap();
    acc.clear();
    acc.initialize(&source.checkpoint()).unwrap();
    assert_eq!(acc.mean(), Some(7.0));
}
