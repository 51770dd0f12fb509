//! End-to-end run against scripted probes: orchestration, uptime sampling,
//! and reduction, without touching the network.

use gridprobe::probes::mock::{FnProbe, StaticProbe};
use gridprobe::{Orchestrator, ProbeSet};
use gridprobe_common::{
    Dimension, Geolocation, Latency, LatencyScore, NodeConfig, NodeId, PlacementOutcome,
    RawSample,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn fleet() -> Vec<NodeConfig> {
    vec![
        NodeConfig {
            id: NodeId::new("healthy"),
            endpoint_uri: "https://healthy.example.com:8443".to_string(),
            control_host: Some("203.0.113.1".to_string()),
            control_port: Some(22),
        },
        NodeConfig {
            id: NodeId::new("flaky"),
            endpoint_uri: "https://flaky.example.com:8443".to_string(),
            control_host: Some("203.0.113.2".to_string()),
            control_port: Some(22),
        },
        NodeConfig {
            id: NodeId::new("headless"),
            endpoint_uri: "https://headless.example.com:8443".to_string(),
            control_host: None,
            control_port: None,
        },
    ]
}

/// Scripted battery: "healthy" passes everything, "flaky" fails its SSH
/// handshake, "headless" has no control channel at all.
fn probes() -> ProbeSet {
    ProbeSet {
        reachability: Arc::new(FnProbe::new(Dimension::Reachability, |node: &NodeConfig| {
            match node.id.as_str() {
                "healthy" => RawSample::Reachability {
                    success: true,
                    latency: Latency::Measured(35),
                },
                _ => RawSample::Reachability {
                    success: false,
                    latency: Latency::Unbounded,
                },
            }
        })),
        throughput: Arc::new(FnProbe::new(Dimension::Throughput, |node: &NodeConfig| {
            match node.id.as_str() {
                "healthy" => RawSample::Throughput(31.4),
                _ => RawSample::Throughput(0.0),
            }
        })),
        liveness: Arc::new(FnProbe::new(Dimension::Liveness, |node: &NodeConfig| {
            RawSample::Liveness(node.id.as_str() != "flaky")
        })),
        placement: Arc::new(FnProbe::new(Dimension::Placement, |node: &NodeConfig| {
            match node.id.as_str() {
                "healthy" => RawSample::Placement(PlacementOutcome::Located(Geolocation {
                    latitude: 52.52,
                    longitude: 13.405,
                    city: Some("Berlin".to_string()),
                    country: Some("DE".to_string()),
                })),
                _ => RawSample::Placement(PlacementOutcome::NotFound),
            }
        })),
        compute: Arc::new(FnProbe::new(Dimension::Compute, |node: &NodeConfig| {
            RawSample::Compute(node.id.as_str() == "healthy")
        })),
    }
}

fn orchestrator() -> Orchestrator {
    // duration=20, interval=5: exactly four uptime ticks under paused time.
    Orchestrator::new(
        fleet(),
        probes(),
        1,
        Duration::from_secs(20),
        Duration::from_secs(5),
    )
}

#[tokio::test(start_paused = true)]
async fn test_full_run_scores_mixed_fleet() {
    let report = orchestrator().run(CancellationToken::new()).await;
    assert_eq!(report.metrics.len(), 3);
    assert_eq!(report.uptime.total_checks(), 4);

    let healthy = &report.metrics[&NodeId::new("healthy")];
    assert_eq!(healthy.reachability_score, 100.0);
    assert_eq!(healthy.avg_latency, LatencyScore::Measured(35.0));
    assert_eq!(healthy.liveness_score, 100.0);
    assert_eq!(healthy.avg_throughput_mbps, 31.4);
    assert_eq!(healthy.uptime_score, 100.0);
    assert_eq!(healthy.compute_score, 100.0);
    match &healthy.placement {
        Some(PlacementOutcome::Located(geo)) => {
            assert_eq!(geo.city.as_deref(), Some("Berlin"));
        }
        other => panic!("unexpected placement: {:?}", other),
    }

    let flaky = &report.metrics[&NodeId::new("flaky")];
    assert_eq!(flaky.reachability_score, 0.0);
    assert_eq!(flaky.avg_latency, LatencyScore::Unbounded);
    assert_eq!(flaky.liveness_score, 0.0);
    assert_eq!(flaky.uptime_score, 0.0);
    assert_eq!(flaky.compute_score, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_headless_node_still_gets_liveness_and_placement() {
    let report = orchestrator().run(CancellationToken::new()).await;

    let headless = &report.metrics[&NodeId::new("headless")];
    assert_eq!(headless.reachability_score, 0.0);
    assert_eq!(headless.avg_throughput_mbps, 0.0);
    assert_eq!(headless.compute_score, 0.0);
    assert_eq!(headless.liveness_score, 100.0);
    assert_eq!(headless.uptime_score, 100.0);
    assert_eq!(headless.placement, Some(PlacementOutcome::NotFound));
}

#[tokio::test(start_paused = true)]
async fn test_metrics_serialize_without_numeric_sentinels() {
    let report = orchestrator().run(CancellationToken::new()).await;
    let json = serde_json::to_string(&report.metrics).unwrap();

    // Failed latency serializes as a tagged variant, never as a float that
    // JSON cannot represent.
    assert!(json.contains(r#""kind":"unbounded""#));
    assert!(!json.contains("Infinity"));
    assert!(!json.contains("null,"));
}

#[tokio::test(start_paused = true)]
async fn test_one_liveness_sample_per_node_in_probe_pass() {
    let report = orchestrator().run(CancellationToken::new()).await;

    // The probe pass contributes exactly one sample per dimension; uptime
    // ticks land in the counters, not in the store.
    for (_, samples) in report.store.iter() {
        assert_eq!(samples.reachability().len(), 1);
        assert_eq!(samples.latency().len(), 1);
        assert_eq!(samples.liveness().len(), 1);
        assert_eq!(samples.throughput().len(), 1);
        assert_eq!(samples.compute().len(), 1);
    }
}
