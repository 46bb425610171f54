//! Incremental accumulators and baseline drift tests for event-at-a-time
//! model scoring.

pub mod accumulator;
pub mod checkpoint;
pub mod config;
pub mod drift;
pub mod logging;

pub use accumulator::{
    Accumulator, AccumulatorError, CounterKind, CounterSet, HistoryEntry, OlsCheckpoint,
    OrdinaryLeastSquares, Sample, SchemeError, SchemeKind, SchemeParams, UpdateScheme,
};
pub use checkpoint::{CheckpointBook, CounterCheckpoint};
pub use config::{
    load_engine_schemes, load_scheme, load_test_distributions, Baseline, ConfigError, CountTable,
    EngineSchemes, Normalization, TestDistributions, TestStatistic,
};
pub use drift::chisquare::{chi_square, ChiSquareResult};
pub use drift::discrete::{similarity, Similarity};
pub use drift::glr::GlrKernel;
pub use drift::{
    AlertPolarity, Ancillary, AncillaryValue, BaselineMonitor, BaselineProducer, DisabledReason,
    Distribution, DriftError, FieldValue, Observation, ObservedCounts, PartialSums,
    ProducedFamily, TestScore, TestSetup,
};
pub use logging::{JsonLineLogger, LogFile, LogLevel, LogRotationPolicy, LoggingError};
