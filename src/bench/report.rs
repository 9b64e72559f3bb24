//! Benchmark report: comparison table and JSON output

use super::{EndpointSeries, Operation};
use anyhow::Context;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Results of a benchmark run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchReport {
    /// Payload sizes, in bytes
    pub sizes: Vec<usize>,
    pub iterations: usize,
    /// One entry per endpoint, target first
    pub series: Vec<EndpointSeries>,
}

impl BenchReport {
    pub fn new(sizes: Vec<usize>, iterations: usize) -> Self {
        BenchReport {
            sizes,
            iterations,
            series: Vec::new(),
        }
    }

    /// Mean latency of `operation` at `size` for the named endpoint
    pub fn mean_ms(&self, endpoint: &str, operation: Operation, size: usize) -> Option<f64> {
        self.series
            .iter()
            .find(|s| s.endpoint == endpoint)?
            .series(operation)?
            .points
            .iter()
            .find(|p| p.size == size)
            .map(|p| p.mean_ms)
    }

    /// One table per operation: sizes as rows, endpoints as columns
    pub fn comparison_table(&self) -> String {
        let mut out = String::new();
        let endpoints: Vec<&str> = self.series.iter().map(|s| s.endpoint.as_str()).collect();

        for operation in Operation::ALL {
            let _ = writeln!(out, "{} mean latency (ms), {} iterations", operation, self.iterations);
            let _ = write!(out, "{:>10}", "size");
            for name in &endpoints {
                let _ = write!(out, " {:>12}", name);
            }
            out.push('\n');

            for &size in &self.sizes {
                let _ = write!(out, "{:>10}", size);
                for name in &endpoints {
                    match self.mean_ms(name, operation, size) {
                        Some(ms) => {
                            let _ = write!(out, " {:>12.3}", ms);
                        }
                        None => {
                            let _ = write!(out, " {:>12}", "-");
                        }
                    }
                }
                out.push('\n');
            }
            out.push('\n');
        }

        out
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))
    }
}
