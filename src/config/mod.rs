//! Configuration module
//!
//! One JSON document drives every harness. Every field has a default, so an empty
//! object (or no file at all) reproduces the stock suite against a local server.

use crate::protocol::ProtocolVersion;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server under test
    pub target: Endpoint,

    /// Optional reference server for benchmark comparison
    pub reference: Option<Endpoint>,

    pub conformance: ConformanceConfig,
    pub bench: BenchConfig,
    pub load: LoadConfig,
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(text).context("malformed JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no harness can run with
    pub fn validate(&self) -> anyhow::Result<()> {
        self.target.validate()?;
        if let Some(reference) = &self.reference {
            reference.validate()?;
        }

        let c = &self.conformance;
        if c.kv_dataset_size == 0 || c.tx_dataset_size == 0 || c.merge_dataset_size == 0 {
            bail!("conformance dataset sizes must be positive");
        }
        if c.str_len == 0 {
            bail!("conformance.str_len must be positive");
        }
        if c.pubsub_message_count == 0 {
            bail!("conformance.pubsub_message_count must be positive");
        }
        let largest = c
            .kv_dataset_size
            .max(c.tx_dataset_size)
            .max(c.merge_dataset_size)
            .max(c.pubsub_message_count);
        if !crate::dataset::can_hold(largest, c.str_len) {
            bail!(
                "conformance.str_len {} is too short for {} unique strings",
                c.str_len,
                largest
            );
        }
        if c.merge_versions == 0 || c.merge_delete_every == 0 {
            bail!("conformance.merge_versions and merge_delete_every must be positive");
        }

        let b = &self.bench;
        if b.iterations == 0 {
            bail!("bench.iterations must be positive");
        }
        if b.min_size == 0 {
            bail!("bench.min_size must be positive");
        }
        if b.min_size > b.max_size {
            bail!(
                "bench.min_size ({}) exceeds bench.max_size ({})",
                b.min_size,
                b.max_size
            );
        }

        let l = &self.load;
        if l.users == 0 {
            bail!("load.users must be positive");
        }
        if !(l.spawn_rate > 0.0) || !(1.0 / l.spawn_rate).is_finite() {
            bail!("load.spawn_rate must be a positive, representable rate");
        }
        if l.tasks.is_empty() {
            bail!("load.tasks must enable at least one of set, get");
        }

        Ok(())
    }
}

/// A server to connect to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    /// Label used in logs and reports
    pub name: String,
    pub host: String,
    pub port: u16,
    pub protocol: ProtocolVersion,
    pub connect_timeout_ms: u64,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            name: name.into(),
            host: host.into(),
            port,
            ..Endpoint::default()
        }
    }

    /// Stock reference server: a local Redis speaking RESP2
    pub fn reference() -> Self {
        Endpoint {
            name: "redis".to_string(),
            port: 6379,
            protocol: ProtocolVersion::Resp2,
            ..Endpoint::default()
        }
    }

    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    /// `host:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.host.is_empty() {
            bail!("endpoint {} has an empty host", self.name);
        }
        if self.connect_timeout_ms == 0 {
            bail!("endpoint {} has a zero connect timeout", self.name);
        }
        Ok(())
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint {
            name: "target".to_string(),
            host: "127.0.0.1".to_string(),
            port: 7698,
            protocol: ProtocolVersion::Resp3,
            connect_timeout_ms: 5000,
        }
    }
}

/// Correctness harness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformanceConfig {
    /// Pairs used by the key/value cases
    pub kv_dataset_size: usize,
    /// Pairs used by the transaction cases
    pub tx_dataset_size: usize,
    /// Length of every generated key and value
    pub str_len: usize,
    /// EX argument of `set_ex`
    pub expire_seconds: u64,
    /// PX argument of `set_px`
    pub expire_millis: u64,
    pub pubsub_channel: String,
    pub pubsub_message_count: usize,
    pub pubsub_timeout_ms: u64,
    pub merge_dataset_size: usize,
    /// Versions written per key before MERGE
    pub merge_versions: usize,
    /// Delete every key whose index is a multiple of this
    pub merge_delete_every: usize,
    /// Cases to run by name; all when absent
    pub cases: Option<Vec<String>>,
}

impl ConformanceConfig {
    pub fn pubsub_timeout(&self) -> Duration {
        Duration::from_millis(self.pubsub_timeout_ms)
    }
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        ConformanceConfig {
            kv_dataset_size: 128,
            tx_dataset_size: 16,
            str_len: 1024,
            expire_seconds: 3,
            expire_millis: 1500,
            pubsub_channel: "test_channel".to_string(),
            pubsub_message_count: 16,
            pubsub_timeout_ms: 10_000,
            merge_dataset_size: 16,
            merge_versions: 5,
            merge_delete_every: 5,
            cases: None,
        }
    }
}

/// Benchmark harness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Calls per (operation, size) point
    pub iterations: usize,
    pub min_size: usize,
    pub max_size: usize,
    /// Where to write the JSON report, if anywhere
    pub report_path: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            iterations: 100,
            min_size: 128,
            max_size: 8096,
            report_path: None,
        }
    }
}

/// Load task a virtual user may pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadTask {
    Set,
    Get,
}

/// Load harness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Virtual users
    pub users: usize,
    /// Users started per second
    pub spawn_rate: f64,
    pub duration_secs: u64,
    pub set_key: String,
    pub get_key: String,
    pub tasks: Vec<LoadTask>,
}

impl LoadConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Delay between two user starts
    ///
    /// Rates too small to yield a finite delay saturate at `Duration::MAX`.
    pub fn spawn_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.spawn_rate).unwrap_or(Duration::MAX)
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            users: 100,
            spawn_rate: 1.0,
            duration_secs: 300,
            set_key: "string_set_operation".to_string(),
            get_key: "string_get_operation".to_string(),
            tasks: vec![LoadTask::Set, LoadTask::Get],
        }
    }
}
