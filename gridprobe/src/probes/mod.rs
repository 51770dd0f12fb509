//! Probe implementations, one per health dimension.
//!
//! A probe performs one bounded observation against one node and returns a
//! typed sample. Failures are first-class outcomes, not errors: transport
//! faults, timeouts, content mismatches, and missing control endpoints all
//! map to failure samples, and the diagnostic detail goes to the log only.

pub mod compute;
pub mod liveness;
pub mod mock;
pub mod placement;
pub mod reachability;
pub mod throughput;

pub use compute::ComputeProbe;
pub use liveness::LivenessProbe;
pub use placement::PlacementProbe;
pub use reachability::ReachabilityProbe;
pub use throughput::ThroughputProbe;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use gridprobe_common::{Dimension, NodeConfig, RawSample};
use std::net::IpAddr;
use std::time::Duration;
use url::Url;

/// One bounded observation against one node along a single dimension.
#[async_trait]
pub trait Probe: Send + Sync {
    /// The dimension this probe observes.
    fn dimension(&self) -> Dimension;

    /// Execute one observation. Never fails: every failure mode is encoded
    /// in the returned sample.
    async fn run(&self, node: &NodeConfig) -> RawSample;
}

/// Extract the hostname from a node's endpoint URI.
pub(crate) fn endpoint_host(node: &NodeConfig) -> Result<String> {
    let url = Url::parse(&node.endpoint_uri)
        .with_context(|| format!("Invalid endpoint URI: {}", node.endpoint_uri))?;
    url.host_str()
        .map(str::to_string)
        .with_context(|| format!("Endpoint URI has no host: {}", node.endpoint_uri))
}

/// Resolve a node's endpoint host to an IP address within `timeout`.
///
/// DNS shares the probe's wait budget; a resolver stuck in a retry chain
/// counts as a failed observation like any other slow transport.
pub(crate) async fn resolve_endpoint_ip(node: &NodeConfig, timeout: Duration) -> Result<IpAddr> {
    let host = endpoint_host(node)?;

    // Literal addresses skip DNS.
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = tokio::time::timeout(timeout, tokio::net::lookup_host((host.as_str(), 0)))
        .await
        .map_err(|_| anyhow!("Timed out resolving {} after {:?}", host, timeout))?
        .with_context(|| format!("Failed to resolve {}", host))?;
    addrs
        .next()
        .map(|sock| sock.ip())
        .with_context(|| format!("No addresses for {}", host))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridprobe_common::NodeId;

    fn node(uri: &str) -> NodeConfig {
        NodeConfig {
            id: NodeId::new("n"),
            endpoint_uri: uri.to_string(),
            control_host: None,
            control_port: None,
        }
    }

    #[test]
    fn test_endpoint_host_extraction() {
        let host = endpoint_host(&node("https://provider.example.com:8443")).unwrap();
        assert_eq!(host, "provider.example.com");

        let host = endpoint_host(&node("https://198.51.100.4:8443")).unwrap();
        assert_eq!(host, "198.51.100.4");

        assert!(endpoint_host(&node("not a uri")).is_err());
    }

    #[tokio::test]
    async fn test_resolve_literal_ip_skips_dns() {
        // A zero budget would fail any DNS path; literals must not need one.
        let ip = resolve_endpoint_ip(&node("https://198.51.100.4:8443"), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(ip, "198.51.100.4".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_resolution_is_bounded() {
        // Reserved TLD: resolution can fail fast or hit the deadline, but it
        // can never succeed and never outlive the budget by much.
        let result = resolve_endpoint_ip(
            &node("https://node.does-not-exist.invalid:8443"),
            Duration::from_millis(250),
        )
        .await;
        assert!(result.is_err());
    }
}
