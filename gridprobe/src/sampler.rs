//! Bounded-window uptime sampler.
//!
//! Runs a fixed-interval liveness loop over all nodes and maintains running
//! counters. One tick increments the shared check counter once, then probes
//! every node in the set.

use crate::probes::Probe;
use gridprobe_common::{NodeConfig, RawSample, UptimeCounters};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sampler lifecycle. Idle until started, Sampling for the configured
/// window, Done once the window elapses or the run is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Sampling,
    Done,
}

/// Fixed-duration, fixed-interval liveness sampler.
///
/// Cadence is best-effort: a tick that takes longer than the interval is not
/// compensated, so the realized tick count can drift by one against the
/// nominal `duration / interval`. That tradeoff is accepted, not a bug.
pub struct UptimeSampler {
    nodes: Vec<NodeConfig>,
    probe: Arc<dyn Probe>,
    duration: Duration,
    interval: Duration,
    state: watch::Sender<SamplerState>,
}

impl UptimeSampler {
    pub fn new(
        nodes: Vec<NodeConfig>,
        probe: Arc<dyn Probe>,
        duration: Duration,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SamplerState::Idle);
        Self {
            nodes,
            probe,
            duration,
            interval,
            state,
        }
    }

    /// Subscribe to lifecycle transitions. The receiver keeps reporting the
    /// final state after the sampling task finishes.
    pub fn state(&self) -> watch::Receiver<SamplerState> {
        self.state.subscribe()
    }

    /// Spawn the sampling loop as an independently cancellable task.
    ///
    /// Cancellation stops the loop at the next tick boundary; the counters
    /// accumulated so far are returned either way.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<UptimeCounters> {
        tokio::spawn(self.run(cancel))
    }

    /// Run the sampling loop to completion on the current task.
    pub async fn run(self, cancel: CancellationToken) -> UptimeCounters {
        let mut counters = UptimeCounters::new(&self.nodes);

        self.state.send_replace(SamplerState::Sampling);
        info!(
            "Uptime sampler started (duration: {:?}, interval: {:?}, {} nodes)",
            self.duration,
            self.interval,
            self.nodes.len()
        );

        let start = Instant::now();
        while start.elapsed() < self.duration {
            if cancel.is_cancelled() {
                info!("Uptime sampler cancelled");
                break;
            }

            // One tick: the shared counter advances once, then every node
            // is checked against that tick.
            counters.tick();
            for node in &self.nodes {
                match self.probe.run(node).await {
                    RawSample::Liveness(true) => {
                        if let Err(e) = counters.record_success(&node.id) {
                            warn!("Uptime counter error: {}", e);
                        }
                    }
                    RawSample::Liveness(false) => {
                        debug!("Uptime tick: {} not alive", node.id);
                    }
                    other => {
                        warn!(
                            "Uptime sampler got a {} sample; expected liveness",
                            other.dimension()
                        );
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => {
                    info!("Uptime sampler cancelled");
                    break;
                }
            }
        }

        self.state.send_replace(SamplerState::Done);
        info!(
            "Uptime sampler done ({} ticks over {:?})",
            counters.total_checks(),
            start.elapsed()
        );
        counters
    }
}
