//! File-transfer throughput probe.
//!
//! Writes a fixed-size payload to a scratch path on the node, reads it back,
//! and reports megabytes per elapsed second. Any failing step yields exactly
//! zero, never a partial value.

use super::Probe;
use async_trait::async_trait;
use gridprobe_common::{Dimension, NodeConfig, RawSample, SshClient, SshOptions};
use rand::RngCore;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Remote scratch path for the transfer payload.
const SCRATCH_PATH: &str = "/tmp/gridprobe_scratch.bin";

pub struct ThroughputProbe {
    options: SshOptions,
    payload_mb: u64,
}

impl ThroughputProbe {
    pub fn new(options: SshOptions, payload_mb: u64) -> Self {
        Self { options, payload_mb }
    }
}

#[async_trait]
impl Probe for ThroughputProbe {
    fn dimension(&self) -> Dimension {
        Dimension::Throughput
    }

    async fn run(&self, node: &NodeConfig) -> RawSample {
        let Some(mut client) = SshClient::for_node(node, self.options.clone()) else {
            info!("Skipping throughput probe for {}: no control host", node.id);
            return RawSample::Throughput(0.0);
        };

        // Incompressible payload, so transport-level compression cannot
        // inflate the measured rate.
        let mut payload = vec![0u8; (self.payload_mb * 1024 * 1024) as usize];
        rand::thread_rng().fill_bytes(&mut payload);
        let start = Instant::now();

        let outcome = async {
            client.connect().await?;
            client.write_remote_file(SCRATCH_PATH, &payload).await?;
            client.read_remote_file(SCRATCH_PATH).await
        }
        .await;
        let _ = client.disconnect().await;

        match outcome {
            Ok(echoed) if echoed.len() == payload.len() => {
                let elapsed = start.elapsed().as_secs_f64();
                // elapsed cannot be zero after a real 10 MB round trip, but
                // guard the division anyway.
                if elapsed <= 0.0 {
                    return RawSample::Throughput(0.0);
                }
                let mbps = self.payload_mb as f64 / elapsed;
                debug!("Throughput for {}: {:.2} MB/s", node.id, mbps);
                RawSample::Throughput(mbps)
            }
            Ok(echoed) => {
                warn!(
                    "Throughput readback truncated for {} ({} of {} bytes)",
                    node.id,
                    echoed.len(),
                    payload.len()
                );
                RawSample::Throughput(0.0)
            }
            Err(e) => {
                warn!("Throughput probe failed for {}: {:#}", node.id, e);
                RawSample::Throughput(0.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridprobe_common::NodeId;

    #[tokio::test]
    async fn test_missing_control_host_yields_zero() {
        let node = NodeConfig {
            id: NodeId::new("headless"),
            endpoint_uri: "https://headless.example.com:8443".to_string(),
            control_host: None,
            control_port: None,
        };

        let probe = ThroughputProbe::new(SshOptions::default(), 10);
        let sample = probe.run(&node).await;
        assert_eq!(sample, RawSample::Throughput(0.0));
    }
}
