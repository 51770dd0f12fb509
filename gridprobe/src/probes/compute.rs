//! Compute-correctness probe.
//!
//! Evaluates a fixed arithmetic expression through the node's interpreter
//! and requires the trimmed output to match the precomputed result exactly.
//! No tolerance: a node that rounds, truncates, or garbles the answer fails.

use super::Probe;
use async_trait::async_trait;
use gridprobe_common::{Dimension, NodeConfig, RawSample, SshClient, SshOptions};
use tracing::{debug, info, warn};

/// Remote compute task.
const COMPUTE_TASK: &str = "echo 'print(12345 * 6789)' | python3";

/// Expected output: 12345 * 6789.
const EXPECTED: &str = "83810205";

pub struct ComputeProbe {
    options: SshOptions,
}

impl ComputeProbe {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Probe for ComputeProbe {
    fn dimension(&self) -> Dimension {
        Dimension::Compute
    }

    async fn run(&self, node: &NodeConfig) -> RawSample {
        let Some(mut client) = SshClient::for_node(node, self.options.clone()) else {
            info!("Skipping compute probe for {}: no control host", node.id);
            return RawSample::Compute(false);
        };

        let outcome = async {
            client.connect().await?;
            client.execute(COMPUTE_TASK).await
        }
        .await;
        let _ = client.disconnect().await;

        match outcome {
            Ok(result) => {
                let correct = result.success() && result.stdout.trim() == EXPECTED;
                if correct {
                    debug!("Compute check ok for {}", node.id);
                } else {
                    warn!(
                        "Compute mismatch for {} (exit={}, stdout={:?})",
                        node.id,
                        result.exit_code,
                        result.stdout.trim()
                    );
                }
                RawSample::Compute(correct)
            }
            Err(e) => {
                warn!("Compute probe failed for {}: {:#}", node.id, e);
                RawSample::Compute(false)
            }
        }
    }
}
