use approx::assert_abs_diff_eq;
use driftwatch::{
    AccumulatorError, CheckpointBook, CounterCheckpoint, CounterKind, HistoryEntry, Sample,
    UpdateScheme,
};
use std::fs;
use tempfile::tempdir;

fn moments() -> Vec<CounterKind> {
    vec![
        CounterKind::Count,
        CounterKind::Sum1,
        CounterKind::SumX,
        CounterKind::SumXX,
    ]
}

#[test]
fn unweighted_resume_matches_uninterrupted_run() {
    let values = [3.5, 1.0, -2.0, 8.25, 4.0, 4.0, 0.5];
    let scheme = UpdateScheme::unweighted();
    let mut whole = scheme.accumulator(&moments()).unwrap();
    let mut first = scheme.accumulator(&moments()).unwrap();
    for (sync, x) in values.iter().enumerate() {
        whole.increment(sync as i64, *x).unwrap();
        if sync < 4 {
            first.increment(sync as i64, *x).unwrap();
        }
    }

    let record = first.checkpoint();
    let mut resumed = scheme.accumulator(&moments()).unwrap();
    resumed.initialize(&record).unwrap();
    for (sync, x) in values.iter().enumerate().skip(4) {
        resumed.increment(sync as i64, *x).unwrap();
    }
    assert_eq!(resumed.count(), whole.count());
    assert_eq!(resumed.mean(), whole.mean());
    assert_eq!(resumed.variance(), whole.variance());
}

#[test]
fn moments_record_uses_uppercase_names() {
    let record = CounterCheckpoint::moments(3, 3.0, 6.0, 14.0);
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["COUNT"], 3);
    assert_eq!(json["SUMXX"], 14.0);
    assert!(json.get("RUNMEAN").is_none());
    assert!(json.get("HISTORY").is_none());
    assert_eq!(
        record.kinds(),
        vec![
            CounterKind::Count,
            CounterKind::Sum1,
            CounterKind::SumX,
            CounterKind::SumXX
        ]
    );

    let mut acc = UpdateScheme::unweighted().accumulator(&moments()).unwrap();
    acc.initialize(&record).unwrap();
    assert_eq!(acc.mean(), Some(2.0));
    assert_abs_diff_eq!(acc.variance().unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn initialize_after_increment_is_rejected() {
    let mut acc = UpdateScheme::unweighted().accumulator(&moments()).unwrap();
    acc.increment(0, 1.0).unwrap();
    let record = CounterCheckpoint::moments(1, 1.0, 1.0, 1.0);
    assert_eq!(acc.initialize(&record), Err(AccumulatorError::AlreadyStarted));
}

#[test]
fn initialize_rejects_untracked_counters() {
    let mut acc = UpdateScheme::unweighted()
        .accumulator(&[CounterKind::SumX])
        .unwrap();
    let record = CounterCheckpoint::moments(1, 1.0, 1.0, 1.0);
    assert_eq!(
        acc.initialize(&record),
        Err(AccumulatorError::CounterNotRequested {
            kind: CounterKind::Count
        })
    );
}

#[test]
fn initialize_checks_covariance_block_length() {
    let mut acc = UpdateScheme::unweighted()
        .accumulator(&[CounterKind::Covariance { dimension: 2 }])
        .unwrap();
    let record = CounterCheckpoint {
        covariance: Some(vec![1.0, 2.0, 3.0]),
        ..CounterCheckpoint::default()
    };
    assert!(matches!(
        acc.initialize(&record),
        Err(AccumulatorError::CheckpointShape {
            expected: 6,
            actual: 3,
            ..
        })
    ));
}

#[test]
fn unweighted_accumulator_refuses_window_history() {
    let mut acc = UpdateScheme::unweighted().accumulator(&moments()).unwrap();
    let record = CounterCheckpoint {
        history: Some(vec![HistoryEntry {
            sync_id: 0,
            sample: Sample::Scalar(1.0),
        }]),
        ..CounterCheckpoint::default()
    };
    assert_eq!(
        acc.initialize(&record),
        Err(AccumulatorError::HistoryNotSupported {
            scheme: "unweighted"
        })
    );
}

#[test]
fn window_resume_carries_history_through_json() {
    let scheme = UpdateScheme::window(3);
    let kinds = [
        CounterKind::Sum1,
        CounterKind::SumX,
        CounterKind::Min,
        CounterKind::Max,
    ];
    let values = [5.0, 9.0, 1.0, 7.0, 3.0, 6.0, 2.0, 8.0];
    let mut whole = scheme.accumulator(&kinds).unwrap();
    let mut first = scheme.accumulator(&kinds).unwrap();
    for (sync, x) in values.iter().enumerate() {
        whole.increment(sync as i64, *x).unwrap();
        if sync < 5 {
            first.increment(sync as i64, *x).unwrap();
        }
    }

    let text = serde_json::to_string(&first.checkpoint()).unwrap();
    let record: CounterCheckpoint = serde_json::from_str(&text).unwrap();
    assert_eq!(record.history.as_ref().map(Vec::len), Some(3));

    let mut resumed = scheme.accumulator(&kinds).unwrap();
    resumed.initialize(&record).unwrap();
    for (sync, x) in values.iter().enumerate().skip(5) {
        resumed.increment(sync as i64, *x).unwrap();
    }
    assert_eq!(resumed.mean(), whole.mean());
    assert_eq!(resumed.min(), whole.min());
    assert_eq!(resumed.max(), whole.max());
    assert_eq!(resumed.mean(), Some(16.0 / 3.0));
}

#[test]
fn checkpoint_book_round_trips_through_disk() {
    let scheme = UpdateScheme::unweighted();
    let mut book = CheckpointBook::new();
    for (name, offset) in [("segment-a", 0.0), ("segment-b", 100.0)] {
        let mut acc = scheme
            .accumulator(&[CounterKind::RunSn, CounterKind::Cusum])
            .unwrap();
        for sync in 0..10 {
            acc.increment(sync, offset + sync as f64).unwrap();
        }
        book.insert(name, acc.checkpoint());
    }

    let dir = tempdir().unwrap();
    let path = dir.path().join("checkpoints.json");
    fs::write(&path, serde_json::to_vec_pretty(&book).unwrap()).unwrap();
    let loaded: CheckpointBook = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();

    assert_eq!(loaded, book);
    assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["segment-a", "segment-b"]);
    let record = loaded.get("segment-b").unwrap();
    let mut acc = scheme
        .accumulator(&[CounterKind::RunSn, CounterKind::Cusum])
        .unwrap();
    acc.initialize(record).unwrap();
    assert_abs_diff_eq!(acc.run_mean().unwrap(), 104.5, epsilon = 1e-9);
    assert_eq!(acc.count(), Some(10));
}
