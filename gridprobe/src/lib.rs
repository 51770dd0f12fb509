//! Gridprobe: probe orchestration and metrics aggregation for remote
//! compute nodes.
//!
//! A run probes a fixed node set along five health dimensions, samples
//! liveness over a bounded uptime window, reduces the accumulated samples
//! into per-node scores, and hands the scores to optional post-run sinks.

#![deny(unsafe_code)]

pub mod aggregate;
pub mod archive;
pub mod charts;
pub mod orchestrator;
pub mod probes;
pub mod sampler;

pub use aggregate::reduce;
pub use archive::ArchiveSink;
pub use charts::ChartSink;
pub use orchestrator::{Orchestrator, ProbeSet, RunReport};
pub use probes::Probe;
pub use sampler::{SamplerState, UptimeSampler};
