//! Run orchestration: sequence probes, feed the sample store, run the
//! uptime sampler, and hand the reduced metrics to the caller.
//!
//! The orchestrator owns no scoring logic. It only wires components and
//! guarantees that one node's failures never stop the rest of the run.

use crate::aggregate::reduce;
use crate::probes::{
    ComputeProbe, LivenessProbe, PlacementProbe, Probe, ReachabilityProbe, ThroughputProbe,
};
use crate::sampler::UptimeSampler;
use futures::StreamExt;
use gridprobe_common::{
    FinalizedMetrics, GridprobeConfig, NodeConfig, NodeId, NodeSamples, SampleStore, SshOptions,
    UptimeCounters,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The five probes making up one node's battery, in execution order.
pub struct ProbeSet {
    pub reachability: Arc<dyn Probe>,
    pub throughput: Arc<dyn Probe>,
    pub liveness: Arc<dyn Probe>,
    pub placement: Arc<dyn Probe>,
    pub compute: Arc<dyn Probe>,
}

impl ProbeSet {
    /// Build the real probe set from configuration.
    pub fn from_config(config: &GridprobeConfig) -> Self {
        let ssh = SshOptions::from_settings(
            &config.ssh,
            config.probe.connect_timeout(),
            config.probe.command_timeout(),
        );

        Self {
            reachability: Arc::new(ReachabilityProbe::new(ssh.clone())),
            throughput: Arc::new(ThroughputProbe::new(
                ssh.clone(),
                config.probe.transfer_size_mb,
            )),
            liveness: Arc::new(LivenessProbe::new(config.probe.connect_timeout())),
            placement: Arc::new(PlacementProbe::new(
                config.placement.geodb_path.as_deref(),
                config.probe.connect_timeout(),
            )),
            compute: Arc::new(ComputeProbe::new(ssh)),
        }
    }

    /// Battery order: reachability, throughput, liveness, placement, compute.
    fn battery(&self) -> [Arc<dyn Probe>; 5] {
        [
            self.reachability.clone(),
            self.throughput.clone(),
            self.liveness.clone(),
            self.placement.clone(),
            self.compute.clone(),
        ]
    }
}

/// Everything a completed run produces.
pub struct RunReport {
    /// Raw samples, retained for diagnostics.
    pub store: SampleStore,
    /// Uptime counters from the sampling window.
    pub uptime: UptimeCounters,
    /// Finalized per-node scores.
    pub metrics: BTreeMap<NodeId, FinalizedMetrics>,
}

pub struct Orchestrator {
    nodes: Vec<NodeConfig>,
    probes: ProbeSet,
    /// Node batteries allowed in flight at once (1 = fully sequential).
    concurrency: usize,
    uptime_duration: Duration,
    uptime_interval: Duration,
}

impl Orchestrator {
    pub fn new(
        nodes: Vec<NodeConfig>,
        probes: ProbeSet,
        concurrency: usize,
        uptime_duration: Duration,
        uptime_interval: Duration,
    ) -> Self {
        Self {
            nodes,
            probes,
            concurrency: concurrency.max(1),
            uptime_duration,
            uptime_interval,
        }
    }

    /// Execute a full run: probe pass, uptime window, reduction.
    ///
    /// Cancellation stops issuing new probes and aborts the uptime window;
    /// whatever accumulated still reduces to a report with an entry for
    /// every node.
    pub async fn run(&self, cancel: CancellationToken) -> RunReport {
        let mut store = SampleStore::new(&self.nodes);

        info!(
            "Probing {} nodes ({} in flight)",
            self.nodes.len(),
            self.concurrency
        );

        // Each node's battery runs on its own future and owns its samples
        // until the merge below, so no sequence ever has two writers.
        let results: Vec<(NodeId, NodeSamples)> =
            futures::stream::iter(self.nodes.iter().map(|node| {
                let cancel = cancel.clone();
                async move { self.probe_node(node, cancel).await }
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (id, samples) in results {
            if let Err(e) = store.merge(&id, samples) {
                warn!("Dropping samples: {}", e);
            }
        }

        let uptime = if cancel.is_cancelled() {
            info!("Skipping uptime window: run cancelled");
            UptimeCounters::new(&self.nodes)
        } else {
            let sampler = UptimeSampler::new(
                self.nodes.clone(),
                self.probes.liveness.clone(),
                self.uptime_duration,
                self.uptime_interval,
            );
            match sampler.start(cancel.clone()).await {
                Ok(counters) => counters,
                Err(e) => {
                    warn!("Uptime sampler task failed: {}", e);
                    UptimeCounters::new(&self.nodes)
                }
            }
        };

        let metrics = reduce(&store, &uptime);
        info!("Run complete: {} nodes scored", metrics.len());

        RunReport {
            store,
            uptime,
            metrics,
        }
    }

    /// Run the full battery against one node, in fixed dimension order.
    async fn probe_node(&self, node: &NodeConfig, cancel: CancellationToken) -> (NodeId, NodeSamples) {
        let mut samples = NodeSamples::new();

        info!("Probing node {}...", node.id);
        for probe in self.probes.battery() {
            if cancel.is_cancelled() {
                info!("Cancelled before {} probe of {}", probe.dimension(), node.id);
                break;
            }
            let sample = probe.run(node).await;
            samples.record(sample);
        }

        (node.id.clone(), samples)
    }
}
