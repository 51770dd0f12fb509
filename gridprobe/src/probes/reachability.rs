//! Control-channel reachability probe.
//!
//! Opens an SSH session, writes a marker to a scratch file and reads it
//! back, succeeding only when stdout contains the exact marker string.

use super::Probe;
use async_trait::async_trait;
use gridprobe_common::{CommandResult, Dimension, Latency, NodeConfig, RawSample, SshClient, SshOptions};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Marker string the remote command must echo back verbatim.
const MARKER: &str = "gridprobe handshake";

/// Remote command: write the marker through the filesystem and read it back.
const TEST_COMMAND: &str =
    "echo \"gridprobe handshake\" > /tmp/gridprobe_touch.txt && cat /tmp/gridprobe_touch.txt";

pub struct ReachabilityProbe {
    options: SshOptions,
}

impl ReachabilityProbe {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }
}

/// Judge one command outcome. Success requires a zero exit code and the
/// exact marker somewhere in stdout; anything else is a failure with the
/// unbounded latency sentinel.
fn evaluate(result: &CommandResult, elapsed: Duration) -> RawSample {
    if result.success() && result.stdout.contains(MARKER) {
        RawSample::Reachability {
            success: true,
            latency: Latency::Measured(elapsed.as_millis() as u64),
        }
    } else {
        RawSample::Reachability {
            success: false,
            latency: Latency::Unbounded,
        }
    }
}

#[async_trait]
impl Probe for ReachabilityProbe {
    fn dimension(&self) -> Dimension {
        Dimension::Reachability
    }

    async fn run(&self, node: &NodeConfig) -> RawSample {
        let Some(mut client) = SshClient::for_node(node, self.options.clone()) else {
            info!("Skipping reachability probe for {}: no control host", node.id);
            return RawSample::Reachability {
                success: false,
                latency: Latency::Unbounded,
            };
        };

        // Latency covers the full round trip, connect included.
        let start = Instant::now();

        let outcome = async {
            client.connect().await?;
            client.execute(TEST_COMMAND).await
        }
        .await;
        let _ = client.disconnect().await;

        match outcome {
            Ok(result) => {
                let sample = evaluate(&result, start.elapsed());
                match &sample {
                    RawSample::Reachability { success: true, latency } => {
                        debug!("Reachability ok for {} ({:?})", node.id, latency);
                    }
                    _ => {
                        warn!(
                            "Reachability content mismatch for {} (exit={}, stdout={:?})",
                            node.id,
                            result.exit_code,
                            result.stdout.trim()
                        );
                    }
                }
                sample
            }
            Err(e) => {
                warn!("Reachability probe failed for {}: {:#}", node.id, e);
                RawSample::Reachability {
                    success: false,
                    latency: Latency::Unbounded,
                }
            }
        }
    }
}
