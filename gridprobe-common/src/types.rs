//! Common types used across gridprobe components.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Unique identifier for a node under evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for a single node. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique identifier for this node.
    pub id: NodeId,
    /// Public endpoint URI (used for liveness and placement probes).
    pub endpoint_uri: String,
    /// Control-channel hostname or IP, if the node exposes one.
    ///
    /// When absent, remote-command probes (reachability, throughput,
    /// compute) degrade to failure samples instead of erroring.
    pub control_host: Option<String>,
    /// Control-channel SSH port.
    pub control_port: Option<u16>,
}

/// The health dimensions a probe can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Reachability,
    Throughput,
    Liveness,
    Placement,
    Compute,
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Reachability => "reachability",
            Self::Throughput => "throughput",
            Self::Liveness => "liveness",
            Self::Placement => "placement",
            Self::Compute => "compute",
        };
        write!(f, "{}", name)
    }
}

/// A single latency observation.
///
/// Failures carry no meaningful finite value, so the sentinel is a tagged
/// variant rather than a numeric infinity. Aggregation code cannot
/// accidentally do arithmetic on a failed measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ms", rename_all = "snake_case")]
pub enum Latency {
    /// Measured round-trip time in milliseconds.
    Measured(u64),
    /// The attempt failed; no bounded latency exists.
    Unbounded,
}

impl Latency {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

/// Structured geolocation record for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Outcome of a placement lookup.
///
/// `NotFound` (the geo database has no record for the address) is distinct
/// from `LookupFailed` (resolution or database error). The aggregator treats
/// both as absent, but diagnostics can tell them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlacementOutcome {
    Located(Geolocation),
    NotFound,
    LookupFailed { reason: String },
}

/// One raw observation recorded by a probe execution, tagged by dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSample {
    Reachability { success: bool, latency: Latency },
    Throughput(f64),
    Liveness(bool),
    Compute(bool),
    Placement(PlacementOutcome),
}

impl RawSample {
    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Reachability { .. } => Dimension::Reachability,
            Self::Throughput(_) => Dimension::Throughput,
            Self::Liveness(_) => Dimension::Liveness,
            Self::Compute(_) => Dimension::Compute,
            Self::Placement(_) => Dimension::Placement,
        }
    }
}

/// Accumulated raw samples for a single node.
///
/// Sequences grow only by append. Reachability and latency always advance
/// together: the only append path records both, using `Latency::Unbounded`
/// on failure, so the two sequences stay equal-length by construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSamples {
    reachability: Vec<bool>,
    latency: Vec<Latency>,
    liveness: Vec<bool>,
    throughput: Vec<f64>,
    compute: Vec<bool>,
    placement: Option<PlacementOutcome>,
}

impl NodeSamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one reachability attempt and its paired latency entry.
    pub fn record_reachability(&mut self, success: bool, latency: Latency) {
        self.reachability.push(success);
        self.latency.push(latency);
    }

    pub fn record_liveness(&mut self, alive: bool) {
        self.liveness.push(alive);
    }

    pub fn record_throughput(&mut self, mbps: f64) {
        self.throughput.push(mbps);
    }

    pub fn record_compute(&mut self, correct: bool) {
        self.compute.push(correct);
    }

    /// Set the single placement slot (at most one per node; last write wins).
    pub fn set_placement(&mut self, outcome: PlacementOutcome) {
        self.placement = Some(outcome);
    }

    /// Record a raw sample into the matching sequence.
    pub fn record(&mut self, sample: RawSample) {
        match sample {
            RawSample::Reachability { success, latency } => {
                self.record_reachability(success, latency)
            }
            RawSample::Throughput(mbps) => self.record_throughput(mbps),
            RawSample::Liveness(alive) => self.record_liveness(alive),
            RawSample::Compute(correct) => self.record_compute(correct),
            RawSample::Placement(outcome) => self.set_placement(outcome),
        }
    }

    pub fn reachability(&self) -> &[bool] {
        &self.reachability
    }

    pub fn latency(&self) -> &[Latency] {
        &self.latency
    }

    pub fn liveness(&self) -> &[bool] {
        &self.liveness
    }

    pub fn throughput(&self) -> &[f64] {
        &self.throughput
    }

    pub fn compute(&self) -> &[bool] {
        &self.compute
    }

    pub fn placement(&self) -> Option<&PlacementOutcome> {
        self.placement.as_ref()
    }
}

/// Error returned when a sample targets a node outside the fixed run set.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown node id: {0}")]
pub struct UnknownNode(pub NodeId);

/// Per-node sample accumulation for one run.
///
/// Entries exist for exactly the fixed node set supplied at run start;
/// recording against any other id is an error rather than a silent insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleStore {
    samples: BTreeMap<NodeId, NodeSamples>,
}

impl SampleStore {
    /// Create a store with an empty entry for every node in the run set.
    pub fn new<'a>(nodes: impl IntoIterator<Item = &'a NodeConfig>) -> Self {
        let samples = nodes
            .into_iter()
            .map(|n| (n.id.clone(), NodeSamples::new()))
            .collect();
        Self { samples }
    }

    /// Append one raw sample for a node.
    pub fn record(&mut self, id: &NodeId, sample: RawSample) -> Result<(), UnknownNode> {
        match self.samples.get_mut(id) {
            Some(node) => {
                node.record(sample);
                Ok(())
            }
            None => Err(UnknownNode(id.clone())),
        }
    }

    /// Replace a node's entire sample set (used when a node battery ran on
    /// its own task and hands back the samples it accumulated).
    pub fn merge(&mut self, id: &NodeId, samples: NodeSamples) -> Result<(), UnknownNode> {
        match self.samples.get_mut(id) {
            Some(node) => {
                *node = samples;
                Ok(())
            }
            None => Err(UnknownNode(id.clone())),
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&NodeSamples> {
        self.samples.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeSamples)> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Running counters maintained by the uptime sampler.
///
/// `total_checks` advances once per sampling tick, not once per node, so a
/// node's uptime score is its success count over the shared tick count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UptimeCounters {
    total_checks: u64,
    successes: BTreeMap<NodeId, u64>,
}

impl UptimeCounters {
    pub fn new<'a>(nodes: impl IntoIterator<Item = &'a NodeConfig>) -> Self {
        let successes = nodes.into_iter().map(|n| (n.id.clone(), 0)).collect();
        Self {
            total_checks: 0,
            successes,
        }
    }

    /// Advance the shared tick counter by one.
    pub fn tick(&mut self) {
        self.total_checks += 1;
    }

    /// Record one liveness success for a node.
    pub fn record_success(&mut self, id: &NodeId) -> Result<(), UnknownNode> {
        match self.successes.get_mut(id) {
            Some(count) => {
                *count += 1;
                Ok(())
            }
            None => Err(UnknownNode(id.clone())),
        }
    }

    pub fn total_checks(&self) -> u64 {
        self.total_checks
    }

    pub fn successes(&self, id: &NodeId) -> u64 {
        self.successes.get(id).copied().unwrap_or(0)
    }
}

/// Aggregated latency for one node over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ms", rename_all = "snake_case")]
pub enum LatencyScore {
    /// Arithmetic mean of measured latencies, in milliseconds.
    Measured(f64),
    /// The sequence was empty or contained at least one failed attempt.
    Unbounded,
}

/// Finalized per-node scores. Produced once per run by the aggregator and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedMetrics {
    /// Percentage of reachability attempts that succeeded (0-100).
    pub reachability_score: f64,
    /// Mean control-channel latency, or the unbounded sentinel.
    pub avg_latency: LatencyScore,
    /// Percentage of liveness checks that succeeded (0-100).
    pub liveness_score: f64,
    /// Mean transfer throughput in MB/s.
    pub avg_throughput_mbps: f64,
    /// Percentage of uptime ticks in which the node answered (0-100).
    pub uptime_score: f64,
    /// Percentage of compute tasks that returned the exact expected value (0-100).
    pub compute_score: f64,
    /// Placement record, passed through unscored.
    pub placement: Option<PlacementOutcome>,
}
