//! Latency benchmark
//!
//! Measures the mean latency of SET, GET and DEL over a ladder of payload sizes,
//! against the target and, when configured, a reference server.
//! Each size uses one random string as both key and value.

mod report;

pub use report::BenchReport;

use crate::client::Client;
use crate::config::{BenchConfig, Config, Endpoint};
use crate::dataset::{payload_sizes, random_string};
use anyhow::{bail, Context};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// Measured operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Set,
    Get,
    Del,
}

impl Operation {
    /// Measurement order
    pub const ALL: [Operation; 3] = [Operation::Set, Operation::Get, Operation::Del];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Set => "SET",
            Operation::Get => "GET",
            Operation::Del => "DEL",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mean latency of one operation at one payload size
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyPoint {
    pub size: usize,
    pub mean_ms: f64,
}

/// Latency curve of one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSeries {
    pub operation: Operation,
    pub points: Vec<LatencyPoint>,
}

/// All curves measured against one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointSeries {
    pub endpoint: String,
    pub operations: Vec<OperationSeries>,
}

impl EndpointSeries {
    pub fn series(&self, operation: Operation) -> Option<&OperationSeries> {
        self.operations.iter().find(|s| s.operation == operation)
    }
}

/// Benchmark runner
pub struct Benchmark {
    config: BenchConfig,
    endpoints: Vec<Endpoint>,
}

impl Benchmark {
    pub fn new(config: BenchConfig, target: Endpoint, reference: Option<Endpoint>) -> Self {
        let mut endpoints = vec![target];
        endpoints.extend(reference);
        Benchmark { config, endpoints }
    }

    pub fn from_config(config: &Config) -> Self {
        Benchmark::new(
            config.bench.clone(),
            config.target.clone(),
            config.reference.clone(),
        )
    }

    /// Measure every endpoint in turn, target first
    pub async fn run(&self) -> anyhow::Result<BenchReport> {
        let sizes = payload_sizes(self.config.min_size, self.config.max_size);
        if sizes.is_empty() {
            bail!(
                "no payload sizes between {} and {}",
                self.config.min_size,
                self.config.max_size
            );
        }

        let payloads: Vec<(usize, String)> =
            sizes.iter().map(|&size| (size, random_string(size))).collect();

        let mut report = BenchReport::new(sizes, self.config.iterations);
        for endpoint in &self.endpoints {
            info!(
                "Benchmarking {} at {} ({} iterations per point)",
                endpoint.name,
                endpoint.addr(),
                self.config.iterations
            );
            let mut client = Client::connect(endpoint)
                .await
                .with_context(|| format!("failed to connect to {} at {}", endpoint.name, endpoint.addr()))?;
            client
                .ping()
                .await
                .with_context(|| format!("{} did not answer PING", endpoint.name))?;

            let series =
                measure_endpoint(&mut client, &endpoint.name, &payloads, self.config.iterations)
                    .await
                    .with_context(|| format!("benchmark against {} failed", endpoint.name))?;
            report.series.push(series);
        }

        Ok(report)
    }
}

/// Measure SET, GET then DEL for every payload over one session
pub async fn measure_endpoint<T: AsyncRead + AsyncWrite + Unpin>(
    client: &mut Client<T>,
    name: &str,
    payloads: &[(usize, String)],
    iterations: usize,
) -> anyhow::Result<EndpointSeries> {
    let mut operations = Vec::with_capacity(Operation::ALL.len());

    for operation in Operation::ALL {
        let mut points = Vec::with_capacity(payloads.len());
        for (size, payload) in payloads {
            let mut total = Duration::ZERO;
            for _ in 0..iterations {
                let started = Instant::now();
                run_once(client, operation, payload).await?;
                total += started.elapsed();
            }

            let mean_ms = total.as_secs_f64() * 1000.0 / iterations as f64;
            debug!("{} {} size {}: {:.3} ms", name, operation, size, mean_ms);
            points.push(LatencyPoint {
                size: *size,
                mean_ms,
            });
        }
        info!("{}: {} series done", name, operation);
        operations.push(OperationSeries { operation, points });
    }

    Ok(EndpointSeries {
        endpoint: name.to_string(),
        operations,
    })
}

async fn run_once<T: AsyncRead + AsyncWrite + Unpin>(
    client: &mut Client<T>,
    operation: Operation,
    payload: &str,
) -> anyhow::Result<()> {
    match operation {
        Operation::Set => {
            client.set(payload.to_owned(), payload.to_owned()).await?;
        }
        Operation::Get => {
            let value = client.get(payload.to_owned()).await?;
            if value.as_deref() != Some(payload.as_bytes()) {
                bail!(
                    "GET of a {} byte payload returned {}",
                    payload.len(),
                    value.map(|v| format!("{} bytes", v.len())).unwrap_or_else(|| "nothing".to_string())
                );
            }
        }
        Operation::Del => {
            client.del(payload.to_owned()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Connection;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_get_mismatch_aborts() {
        let mock = Builder::new()
            .write(b"*3\r\n$3\r\nSET\r\n$2\r\nab\r\n$2\r\nab\r\n")
            .read(b"+OK\r\n")
            .write(b"*2\r\n$3\r\nGET\r\n$2\r\nab\r\n")
            .read(b"$2\r\nzz\r\n")
            .build();
        let mut client = Client::new(Connection::new(mock));

        let payloads = vec![(2, "ab".to_string())];
        let err = measure_endpoint(&mut client, "mock", &payloads, 1).await.unwrap_err();
        assert!(err.to_string().contains("2 byte payload"));
    }

    #[tokio::test]
    async fn test_series_order() {
        let mock = Builder::new()
            .write(b"*3\r\n$3\r\nSET\r\n$1\r\nx\r\n$1\r\nx\r\n")
            .read(b"+OK\r\n")
            .write(b"*2\r\n$3\r\nGET\r\n$1\r\nx\r\n")
            .read(b"$1\r\nx\r\n")
            .write(b"*2\r\n$3\r\nDEL\r\n$1\r\nx\r\n")
            .read(b":1\r\n")
            .build();
        let mut client = Client::new(Connection::new(mock));

        let payloads = vec![(1, "x".to_string())];
        let series = measure_endpoint(&mut client, "mock", &payloads, 1).await.unwrap();
        let order: Vec<Operation> = series.operations.iter().map(|s| s.operation).collect();
        assert_eq!(order, Operation::ALL.to_vec());
        assert_eq!(series.series(Operation::Get).unwrap().points[0].size, 1);
    }

    #[test]
    fn test_reference_follows_target() {
        let bench = Benchmark::new(
            BenchConfig::default(),
            Endpoint::default(),
            Some(Endpoint::reference()),
        );
        let names: Vec<&str> = bench.endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["target", "redis"]);
    }
}
