//! Metrics aggregation: reduce raw samples into finalized per-node scores.
//!
//! `reduce` is pure and deterministic. Boolean dimensions score as
//! `100 * successes / samples` with an explicit `0` for empty sequences, so
//! no division by zero and no NaN can escape. Latency is the one dimension
//! whose empty/failed default is the unbounded sentinel instead of zero: an
//! unmeasured latency is not a zero-millisecond latency.

use gridprobe_common::{
    FinalizedMetrics, Latency, LatencyScore, NodeId, SampleStore, UptimeCounters,
};
use std::collections::BTreeMap;

/// Reduce a run's accumulated samples and uptime counters into one
/// finalized score record per node.
///
/// Tolerates partially populated stores (cancelled runs): every node in the
/// store gets an entry, with per-dimension zero-sample defaults applied.
pub fn reduce(
    store: &SampleStore,
    uptime: &UptimeCounters,
) -> BTreeMap<NodeId, FinalizedMetrics> {
    let mut metrics = BTreeMap::new();

    for (id, samples) in store.iter() {
        metrics.insert(
            id.clone(),
            FinalizedMetrics {
                reachability_score: percent(samples.reachability()),
                avg_latency: mean_latency(samples.latency()),
                liveness_score: percent(samples.liveness()),
                avg_throughput_mbps: mean(samples.throughput()),
                uptime_score: uptime_score(uptime, id),
                compute_score: percent(samples.compute()),
                placement: samples.placement().cloned(),
            },
        );
    }

    metrics
}

/// Percentage of successful samples, 0 for an empty sequence.
fn percent(samples: &[bool]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let successes = samples.iter().filter(|s| **s).count();
    successes as f64 / samples.len() as f64 * 100.0
}

/// Arithmetic mean, 0 for an empty sequence.
fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Mean latency over a run.
///
/// A single failed attempt dominates the whole sequence: the mean of
/// anything with an unbounded term is unbounded, and an empty sequence has
/// no finite mean either.
fn mean_latency(samples: &[Latency]) -> LatencyScore {
    if samples.is_empty() || samples.iter().any(Latency::is_unbounded) {
        return LatencyScore::Unbounded;
    }
    let total: u64 = samples
        .iter()
        .map(|l| match l {
            Latency::Measured(ms) => *ms,
            Latency::Unbounded => unreachable!("filtered above"),
        })
        .sum();
    LatencyScore::Measured(total as f64 / samples.len() as f64)
}

/// Uptime percentage against the shared tick count, 0 when no ticks ran.
fn uptime_score(uptime: &UptimeCounters, id: &NodeId) -> f64 {
    let total = uptime.total_checks();
    if total == 0 {
        return 0.0;
    }
    uptime.successes(id) as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridprobe_common::{NodeConfig, PlacementOutcome, RawSample};

    fn node(id: &str) -> NodeConfig {
        NodeConfig {
            id: NodeId::new(id),
            endpoint_uri: format!("https://{}.example.com:8443", id),
            control_host: None,
            control_port: None,
        }
    }

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    #[test]
    fn test_percent_zero_samples_is_zero() {
        assert_eq!(percent(&[]), 0.0);
        assert_eq!(percent(&[true, true]), 100.0);
        assert_eq!(percent(&[true, false, false, false]), 25.0);
    }

    #[test]
    fn test_mean_latency_empty_is_unbounded() {
        assert_eq!(mean_latency(&[]), LatencyScore::Unbounded);
    }

    #[test]
    fn test_mean_latency_one_failure_dominates() {
        let samples = [
            Latency::Measured(10),
            Latency::Unbounded,
            Latency::Measured(20),
        ];
        assert_eq!(mean_latency(&samples), LatencyScore::Unbounded);
    }

    #[test]
    fn test_mean_latency_all_measured() {
        let samples = [Latency::Measured(10), Latency::Measured(30)];
        assert_eq!(mean_latency(&samples), LatencyScore::Measured(20.0));
    }

    #[test]
    fn test_uptime_zero_ticks_is_zero() {
        let nodes = [node("a")];
        let counters = UptimeCounters::new(&nodes);
        assert_eq!(uptime_score(&counters, &id("a")), 0.0);
    }

    #[test]
    fn test_uptime_partial() {
        let nodes = [node("a")];
        let mut counters = UptimeCounters::new(&nodes);
        for _ in 0..4 {
            counters.tick();
        }
        counters.record_success(&id("a")).unwrap();
        counters.record_success(&id("a")).unwrap();
        counters.record_success(&id("a")).unwrap();
        assert_eq!(uptime_score(&counters, &id("a")), 75.0);
    }

    #[test]
    fn test_reduce_empty_store_produces_entry_per_node() {
        let nodes = [node("a"), node("b")];
        let store = SampleStore::new(&nodes);
        let counters = UptimeCounters::new(&nodes);

        let metrics = reduce(&store, &counters);
        assert_eq!(metrics.len(), 2);

        let a = &metrics[&id("a")];
        assert_eq!(a.reachability_score, 0.0);
        assert_eq!(a.avg_latency, LatencyScore::Unbounded);
        assert_eq!(a.liveness_score, 0.0);
        assert_eq!(a.avg_throughput_mbps, 0.0);
        assert_eq!(a.uptime_score, 0.0);
        assert_eq!(a.compute_score, 0.0);
        assert!(a.placement.is_none());
    }

    #[test]
    fn test_reduce_scores_are_bounded() {
        let nodes = [node("a")];
        let mut store = SampleStore::new(&nodes);
        let a = id("a");

        for i in 0..7 {
            store
                .record(
                    &a,
                    RawSample::Reachability {
                        success: i % 2 == 0,
                        latency: if i % 2 == 0 {
                            Latency::Measured(50)
                        } else {
                            Latency::Unbounded
                        },
                    },
                )
                .unwrap();
            store.record(&a, RawSample::Liveness(i != 3)).unwrap();
            store
                .record(&a, RawSample::Throughput(i as f64 * 3.5))
                .unwrap();
            store.record(&a, RawSample::Compute(true)).unwrap();
        }

        let mut counters = UptimeCounters::new(&nodes);
        counters.tick();
        counters.record_success(&a).unwrap();

        let metrics = reduce(&store, &counters);
        let m = &metrics[&a];
        for score in [
            m.reachability_score,
            m.liveness_score,
            m.uptime_score,
            m.compute_score,
        ] {
            assert!((0.0..=100.0).contains(&score), "score out of range: {score}");
        }
        assert!(m.avg_throughput_mbps >= 0.0);
        // Mixed success/failure latencies collapse to the sentinel.
        assert_eq!(m.avg_latency, LatencyScore::Unbounded);
    }

    #[test]
    fn test_reduce_is_pure() {
        let nodes = [node("a"), node("b")];
        let mut store = SampleStore::new(&nodes);
        store
            .record(
                &id("a"),
                RawSample::Reachability {
                    success: true,
                    latency: Latency::Measured(12),
                },
            )
            .unwrap();
        store.record(&id("a"), RawSample::Throughput(8.25)).unwrap();
        store
            .record(
                &id("b"),
                RawSample::Placement(PlacementOutcome::NotFound),
            )
            .unwrap();

        let mut counters = UptimeCounters::new(&nodes);
        counters.tick();
        counters.record_success(&id("a")).unwrap();

        let first = reduce(&store, &counters);
        let second = reduce(&store, &counters);
        assert_eq!(first, second);

        // Deterministic serialization as well.
        let first_json = serde_json::to_string(&first).unwrap();
        let second_json = serde_json::to_string(&second).unwrap();
        assert_eq!(first_json, second_json);
    }

    #[test]
    fn test_placement_passed_through() {
        let nodes = [node("a")];
        let mut store = SampleStore::new(&nodes);
        store
            .record(
                &id("a"),
                RawSample::Placement(PlacementOutcome::LookupFailed {
                    reason: "dns".to_string(),
                }),
            )
            .unwrap();

        let metrics = reduce(&store, &UptimeCounters::new(&nodes));
        assert_eq!(
            metrics[&id("a")].placement,
            Some(PlacementOutcome::LookupFailed {
                reason: "dns".to_string()
            })
        );
    }
}
