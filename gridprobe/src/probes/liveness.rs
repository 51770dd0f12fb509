//! Network-layer liveness probe.
//!
//! Sends an ICMP echo request to the host resolved from the node's endpoint
//! URI. Requires raw-socket privileges; a permission error surfaces as a
//! failed check like any other transport failure.

use super::{Probe, resolve_endpoint_ip};
use async_trait::async_trait;
use gridprobe_common::{Dimension, NodeConfig, RawSample};
use std::time::Duration;
use tracing::{debug, warn};

/// Echo payload sent with each request.
const PING_PAYLOAD: [u8; 56] = [0; 56];

pub struct LivenessProbe {
    timeout: Duration,
}

impl LivenessProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Probe for LivenessProbe {
    fn dimension(&self) -> Dimension {
        Dimension::Liveness
    }

    async fn run(&self, node: &NodeConfig) -> RawSample {
        let ip = match resolve_endpoint_ip(node, self.timeout).await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Liveness resolution failed for {}: {:#}", node.id, e);
                return RawSample::Liveness(false);
            }
        };

        let echo = tokio::time::timeout(self.timeout, surge_ping::ping(ip, &PING_PAYLOAD)).await;
        match echo {
            Ok(Ok((_packet, rtt))) => {
                debug!("Liveness ok for {} ({}: {:?})", node.id, ip, rtt);
                RawSample::Liveness(true)
            }
            Ok(Err(e)) => {
                warn!("Liveness echo failed for {} ({}): {}", node.id, ip, e);
                RawSample::Liveness(false)
            }
            Err(_) => {
                warn!(
                    "Liveness echo timed out for {} ({}) after {:?}",
                    node.id, ip, self.timeout
                );
                RawSample::Liveness(false)
            }
        }
    }
}
