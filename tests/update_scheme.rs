use driftwatch::{
    load_engine_schemes, load_scheme, ConfigError, CounterKind, SchemeError, SchemeKind,
    SchemeParams, UpdateScheme,
};
use serde_json::json;

#[test]
fn unknown_scheme_name_is_rejected() {
    let err = UpdateScheme::new("rolling", SchemeParams::default()).unwrap_err();
    assert_eq!(err, SchemeError::UnknownScheme("rolling".to_string()));
    assert_eq!(err.to_string(), "unrecognized update scheme 'rolling'");
}

#[test]
fn exponential_requires_alpha_in_unit_interval() {
    assert_eq!(
        UpdateScheme::new("exponential", SchemeParams::default()).unwrap_err(),
        SchemeError::MissingParameter {
            scheme: SchemeKind::Exponential,
            parameter: "alpha"
        }
    );
    for alpha in [0.0, -0.5, 1.5, f64::NAN] {
        let params = SchemeParams {
            alpha: Some(alpha),
            ..SchemeParams::default()
        };
        assert!(matches!(
            UpdateScheme::new("exponential", params),
            Err(SchemeError::AlphaOutOfRange(_))
        ));
    }
    let params = SchemeParams {
        alpha: Some(1.0),
        ..SchemeParams::default()
    };
    assert_eq!(UpdateScheme::new("exponential", params).unwrap().alpha(), Some(1.0));
}

#[test]
fn window_schemes_require_non_negative_size() {
    for name in ["window", "synchronized"] {
        let err = UpdateScheme::new(name, SchemeParams::default()).unwrap_err();
        assert!(matches!(
            err,
            SchemeError::MissingParameter {
                parameter: "windowSize",
                ..
            }
        ));
        let params = SchemeParams {
            window_size: Some(-1),
            ..SchemeParams::default()
        };
        assert_eq!(
            UpdateScheme::new(name, params).unwrap_err(),
            SchemeError::NegativeWindow {
                parameter: "windowSize",
                value: -1
            }
        );
        let params = SchemeParams {
            window_size: Some(4),
            window_lag: Some(-2),
            ..SchemeParams::default()
        };
        assert_eq!(
            UpdateScheme::new(name, params).unwrap_err(),
            SchemeError::NegativeWindow {
                parameter: "windowLag",
                value: -2
            }
        );
    }
}

#[test]
fn window_lag_defaults_to_zero() {
    let params = SchemeParams {
        window_size: Some(7),
        ..SchemeParams::default()
    };
    let scheme = UpdateScheme::new("synchronized", params).unwrap();
    assert_eq!(scheme.kind(), SchemeKind::Synchronized);
    assert_eq!(scheme.window_bounds(), Some((7, 0)));
    assert_eq!(UpdateScheme::unweighted().window_bounds(), None);
}

#[test]
fn accumulators_from_one_scheme_are_independent() {
    let scheme = UpdateScheme::window(2);
    let kinds = [CounterKind::Sum1, CounterKind::SumX];
    let mut first = scheme.accumulator(&kinds).unwrap();
    let second = scheme.accumulator(&kinds).unwrap();
    first.increment(0, 10.0).unwrap();
    assert_eq!(first.mean(), Some(10.0));
    assert_eq!(second.mean(), None);
    assert_eq!(first.scheme_name(), "window");
}

#[test]
fn scheme_documents_load_from_json() {
    let scheme = load_scheme(&json!({
        "scheme": "window",
        "windowSize": 5,
        "windowLag": 1,
        "resetValue": -2.0
    }))
    .unwrap();
    assert_eq!(scheme.window_bounds(), Some((5, 1)));
    assert_eq!(scheme.reset_floor(), -2.0);

    let err = load_scheme(&json!({"scheme": "exponential"})).unwrap_err();
    assert!(matches!(err, ConfigError::Scheme(SchemeError::MissingParameter { .. })));
    let err = load_scheme(&json!({"windowSize": 5})).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDocument(_)));
}

#[test]
fn engine_schemes_default_to_unweighted() {
    let schemes = load_engine_schemes(&json!({
        "producerUpdateScheme": {"scheme": "exponential", "alpha": 0.05}
    }))
    .unwrap();
    assert_eq!(schemes.consumer.kind(), SchemeKind::Unweighted);
    assert_eq!(schemes.producer.alpha(), Some(0.05));

    assert!(matches!(
        load_engine_schemes(&json!([1, 2])),
        Err(ConfigError::NotAnObject(_))
    ));
}
