//! Gridprobe - Common Library
//!
//! Shared types, configuration, logging, and SSH plumbing used by the
//! gridprobe binary.

#![deny(unsafe_code)]

pub mod config;
pub mod logging;
pub mod ssh;
pub mod types;

pub use config::{
    ArchiveSettings, ChartSettings, GridprobeConfig, NodeEntry, PlacementSettings, ProbeSettings,
    SshSettings, UptimeSettings, example_config, load_config, load_nodes,
};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use ssh::{CommandResult, KnownHostsPolicy, SshClient, SshOptions};
pub use types::{
    Dimension, FinalizedMetrics, Geolocation, Latency, LatencyScore, NodeConfig, NodeId,
    NodeSamples, PlacementOutcome, RawSample, SampleStore, UnknownNode, UptimeCounters,
};
