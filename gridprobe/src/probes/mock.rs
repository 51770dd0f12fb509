//! Scripted probes for tests.
//!
//! Real probes need live nodes; these return canned samples so the
//! orchestrator, sampler, and aggregator can be exercised hermetically.

use super::Probe;
use async_trait::async_trait;
use gridprobe_common::{Dimension, NodeConfig, RawSample};

/// Probe backed by a closure over the node being probed.
pub struct FnProbe<F> {
    dimension: Dimension,
    f: F,
}

impl<F> FnProbe<F>
where
    F: Fn(&NodeConfig) -> RawSample + Send + Sync,
{
    pub fn new(dimension: Dimension, f: F) -> Self {
        Self { dimension, f }
    }
}

#[async_trait]
impl<F> Probe for FnProbe<F>
where
    F: Fn(&NodeConfig) -> RawSample + Send + Sync,
{
    fn dimension(&self) -> Dimension {
        self.dimension
    }

    async fn run(&self, node: &NodeConfig) -> RawSample {
        (self.f)(node)
    }
}

/// Probe that returns the same sample for every node.
pub struct StaticProbe {
    dimension: Dimension,
    sample: RawSample,
}

impl StaticProbe {
    pub fn new(dimension: Dimension, sample: RawSample) -> Self {
        Self { dimension, sample }
    }
}

#[async_trait]
impl Probe for StaticProbe {
    fn dimension(&self) -> Dimension {
        self.dimension
    }

    async fn run(&self, _node: &NodeConfig) -> RawSample {
        self.sample.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridprobe_common::NodeId;

    fn node(id: &str) -> NodeConfig {
        NodeConfig {
            id: NodeId::new(id),
            endpoint_uri: format!("https://{}.example.com", id),
            control_host: None,
            control_port: None,
        }
    }

    #[tokio::test]
    async fn test_static_probe() {
        let probe = StaticProbe::new(Dimension::Liveness, RawSample::Liveness(true));
        assert_eq!(probe.dimension(), Dimension::Liveness);
        assert_eq!(probe.run(&node("a")).await, RawSample::Liveness(true));
    }

    #[tokio::test]
    async fn test_fn_probe_sees_node() {
        let probe = FnProbe::new(Dimension::Liveness, |node: &NodeConfig| {
            RawSample::Liveness(node.id.as_str() == "alive")
        });
        assert_eq!(probe.run(&node("alive")).await, RawSample::Liveness(true));
        assert_eq!(probe.run(&node("dead")).await, RawSample::Liveness(false));
    }
}
