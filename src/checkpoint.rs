use crate::accumulator::{CounterKind, HistoryEntry, OlsCheckpoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw counter values needed to resume an accumulator without replaying
/// history.
///
/// The record does not say which weighting produced it; callers rebuild a
/// compatible accumulator before calling `Accumulator::initialize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct CounterCheckpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sumx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sumxx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "RUNMEAN")]
    pub run_mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "RUNSN")]
    pub run_sn: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cusum: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glr: Option<Vec<(i64, f64)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covariance: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ols: Option<OlsCheckpoint>,
    /// Retained events of a window-based accumulator, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

impl CounterCheckpoint {
    /// Plain moments record, the minimal shape every resumable consumer
    /// understands.
    pub fn moments(count: u64, sum1: f64, sumx: f64, sumxx: f64) -> Self {
        Self {
            count: Some(count),
            sum1: Some(sum1),
            sumx: Some(sumx),
            sumxx: Some(sumxx),
            ..Self::default()
        }
    }

    /// Counter kinds carried by this record. Covariance and OLS report a
    /// dimension of zero: kinds compare by family.
    pub fn kinds(&self) -> Vec<CounterKind> {
        let scalars = [
            (self.count.is_some(), CounterKind::Count),
            (self.sum1.is_some(), CounterKind::Sum1),
            (self.sumx.is_some(), CounterKind::SumX),
            (self.sumxx.is_some(), CounterKind::SumXX),
            (self.run_mean.is_some(), CounterKind::RunMean),
            (self.run_sn.is_some(), CounterKind::RunSn),
            (self.min.is_some(), CounterKind::Min),
            (self.max.is_some(), CounterKind::Max),
            (self.cusum.is_some(), CounterKind::Cusum),
            (self.glr.is_some(), CounterKind::Glr),
            (
                self.covariance.is_some(),
                CounterKind::Covariance { dimension: 0 },
            ),
            (self.ols.is_some(), CounterKind::Ols { parameters: 0 }),
        ];
        scalars
            .into_iter()
            .filter_map(|(present, kind)| present.then_some(kind))
            .collect()
    }

    /// True when the record carries no counters and no history.
    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty() && self.history.is_none()
    }
}

/// Named checkpoint records, one per accumulator instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointBook {
    records: BTreeMap<String, CounterCheckpoint>,
}

impl CheckpointBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record, returning the one it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        record: CounterCheckpoint,
    ) -> Option<CounterCheckpoint> {
        self.records.insert(name.into(), record)
    }

    /// Looks up the record stored under `name`.
    pub fn get(&self, name: &str) -> Option<&CounterCheckpoint> {
        self.records.get(name)
    }

    /// Removes and returns the record stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<CounterCheckpoint> {
        self.records.remove(name)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Records with their names, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CounterCheckpoint)> {
        self.records.iter().map(|(name, record)| (name.as_str(), record))
    }
}
