//! Chart sink: render finalized scores as per-dimension bar charts.
//!
//! Strictly post-run and read-only over the metrics map. One PNG per
//! dimension, one bar per node, nodes in identifier order.

use anyhow::{Context, Result, anyhow};
use gridprobe_common::{ChartSettings, FinalizedMetrics, LatencyScore, NodeId};
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CHART_WIDTH: u32 = 900;
const CHART_HEIGHT: u32 = 600;

/// One chart per dimension, fixed filenames.
const CHARTS: &[(&str, &str, fn(&FinalizedMetrics) -> f64)] = &[
    ("reachability.png", "Reachability Score (%)", |m| {
        m.reachability_score
    }),
    ("latency.png", "Average Latency (ms)", |m| {
        latency_bar_value(&m.avg_latency)
    }),
    ("liveness.png", "Liveness Score (%)", |m| m.liveness_score),
    ("throughput.png", "Throughput (MB/s)", |m| {
        m.avg_throughput_mbps
    }),
    ("uptime.png", "Uptime Score (%)", |m| m.uptime_score),
    ("compute.png", "Compute Score (%)", |m| m.compute_score),
];

/// Chart-only projection of the latency sentinel. The sentinel survives
/// untouched in the metrics themselves; a bar just needs a finite height.
fn latency_bar_value(score: &LatencyScore) -> f64 {
    match score {
        LatencyScore::Measured(ms) => *ms,
        LatencyScore::Unbounded => 0.0,
    }
}

pub struct ChartSink {
    output_dir: PathBuf,
}

impl ChartSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn from_settings(settings: &ChartSettings) -> Self {
        Self::new(settings.output_dir.clone())
    }

    /// Render all six charts, returning the paths written.
    pub fn render_all(
        &self,
        metrics: &BTreeMap<NodeId, FinalizedMetrics>,
    ) -> Result<Vec<PathBuf>> {
        if metrics.is_empty() {
            warn!("No metrics to chart");
            return Ok(Vec::new());
        }

        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create chart directory {:?}", self.output_dir))?;

        let labels: Vec<String> = metrics.keys().map(|id| id.to_string()).collect();
        let mut written = Vec::with_capacity(CHARTS.len());

        for (filename, title, extract) in CHARTS {
            let values: Vec<f64> = metrics.values().map(extract).collect();
            let path = self.output_dir.join(filename);
            render_bar_chart(&path, title, &labels, &values)
                .with_context(|| format!("Failed to render {}", filename))?;
            written.push(path);
        }

        info!("Rendered {} charts to {:?}", written.len(), self.output_dir);
        Ok(written)
    }
}

fn render_bar_chart(path: &Path, title: &str, labels: &[String], values: &[f64]) -> Result<()> {
    let root = BitMapBackend::new(path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| anyhow!("Chart fill failed: {}", e))?;

    let y_max = values.iter().copied().fold(0.0_f64, f64::max).max(1.0) * 1.1;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(48)
        .y_label_area_size(56)
        .build_cartesian_2d(0usize..labels.len(), 0.0..y_max)
        .map_err(|e| anyhow!("Chart layout failed: {}", e))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len())
        .x_label_formatter(&|idx| labels.get(*idx).cloned().unwrap_or_default())
        .draw()
        .map_err(|e| anyhow!("Chart mesh failed: {}", e))?;

    chart
        .draw_series(values.iter().enumerate().map(|(i, v)| {
            Rectangle::new([(i, 0.0), (i + 1, *v)], BLUE.mix(0.6).filled())
        }))
        .map_err(|e| anyhow!("Chart series failed: {}", e))?;

    root.present()
        .map_err(|e| anyhow!("Chart write failed: {}", e))?;
    Ok(())
}
