//! Correctness harness
//!
//! Runs the command contract against the server under test. Every case opens its own
//! connections, generates its own data and reports the first divergence it finds.
//! A failing case never stops the suite.

mod report;
mod kv;
mod transaction;
mod pubsub;
mod merge;

pub use report::{preview, preview_opt, CaseFailure, CaseOutcome, SuiteReport};

use crate::client::Client;
use crate::commands::SetReply;
use crate::config::{Config, ConformanceConfig, Endpoint};
use crate::dataset::Dataset;
use anyhow::bail;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

/// Result of a single case
pub type CaseResult = Result<(), CaseFailure>;

/// Contract cases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Case {
    SetGet,
    SetEx,
    SetPx,
    SetNx,
    SetXx,
    SetGetOption,
    Del,
    TxAtomic,
    TxCommit,
    TxDiscard,
    TxInvalidCommand,
    TxWatch,
    PubSub,
    Merge,
}

impl Case {
    pub const ALL: [Case; 14] = [
        Case::SetGet,
        Case::SetEx,
        Case::SetPx,
        Case::SetNx,
        Case::SetXx,
        Case::SetGetOption,
        Case::Del,
        Case::TxAtomic,
        Case::TxCommit,
        Case::TxDiscard,
        Case::TxInvalidCommand,
        Case::TxWatch,
        Case::PubSub,
        Case::Merge,
    ];

    /// Stable identifier, as used in configuration
    pub fn name(self) -> &'static str {
        match self {
            Case::SetGet => "set_get",
            Case::SetEx => "set_ex",
            Case::SetPx => "set_px",
            Case::SetNx => "set_nx",
            Case::SetXx => "set_xx",
            Case::SetGetOption => "set_get_option",
            Case::Del => "del",
            Case::TxAtomic => "tx_atomic",
            Case::TxCommit => "tx_commit",
            Case::TxDiscard => "tx_discard",
            Case::TxInvalidCommand => "tx_invalid_command",
            Case::TxWatch => "tx_watch",
            Case::PubSub => "pub_sub",
            Case::Merge => "merge",
        }
    }

    pub fn from_name(name: &str) -> Option<Case> {
        Case::ALL.iter().copied().find(|case| case.name() == name)
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runner for the contract cases
pub struct ContractSuite {
    target: Endpoint,
    config: ConformanceConfig,
}

impl ContractSuite {
    pub fn new(target: Endpoint, config: ConformanceConfig) -> Self {
        ContractSuite { target, config }
    }

    pub fn from_config(config: &Config) -> Self {
        ContractSuite::new(config.target.clone(), config.conformance.clone())
    }

    pub fn config(&self) -> &ConformanceConfig {
        &self.config
    }

    /// Cases named in the configuration, in declaration order; all when none are named
    pub fn selected_cases(&self) -> anyhow::Result<Vec<Case>> {
        let names = match &self.config.cases {
            Some(names) => names,
            None => return Ok(Case::ALL.to_vec()),
        };

        for name in names {
            if Case::from_name(name).is_none() {
                bail!("unknown conformance case: {}", name);
            }
        }

        Ok(Case::ALL
            .iter()
            .copied()
            .filter(|case| names.iter().any(|name| name == case.name()))
            .collect())
    }

    /// Run the configured cases
    pub async fn run(&self) -> anyhow::Result<SuiteReport> {
        let cases = self.selected_cases()?;
        Ok(self.run_cases(&cases).await)
    }

    /// Run the given cases in order
    pub async fn run_cases(&self, cases: &[Case]) -> SuiteReport {
        let mut report = SuiteReport::new(self.target.name.clone());

        for &case in cases {
            info!("Running case {}", case);
            let started = Instant::now();
            let result = self.run_case(case).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            match &result {
                Ok(()) => info!("Case {} passed in {:.1} ms", case, elapsed_ms),
                Err(failure) => warn!("Case {} failed: {}", case, failure),
            }

            report.outcomes.push(CaseOutcome {
                case,
                elapsed_ms,
                failure: result.err(),
            });
        }

        report
    }

    /// Run one case
    pub async fn run_case(&self, case: Case) -> CaseResult {
        match case {
            Case::SetGet => kv::set_get(self).await,
            Case::SetEx => kv::set_ex(self).await,
            Case::SetPx => kv::set_px(self).await,
            Case::SetNx => kv::set_nx(self).await,
            Case::SetXx => kv::set_xx(self).await,
            Case::SetGetOption => kv::set_get_option(self).await,
            Case::Del => kv::del(self).await,
            Case::TxAtomic => transaction::tx_atomic(self).await,
            Case::TxCommit => transaction::tx_commit(self).await,
            Case::TxDiscard => transaction::tx_discard(self).await,
            Case::TxInvalidCommand => transaction::tx_invalid_command(self).await,
            Case::TxWatch => transaction::tx_watch(self).await,
            Case::PubSub => pubsub::pub_sub(self).await,
            Case::Merge => merge::merge(self).await,
        }
    }

    /// Fresh session with the server under test
    async fn connect(&self) -> Result<Client, CaseFailure> {
        Client::connect(&self.target)
            .await
            .map_err(|e| CaseFailure::new(format!("cannot connect to {}: {}", self.target.addr(), e)))
    }

    fn dataset(&self, size: usize) -> Dataset {
        Dataset::generate(size, self.config.str_len)
    }
}

/// Fail with `message` unless `condition` holds
fn ensure(condition: bool, message: impl FnOnce() -> String) -> CaseResult {
    if condition {
        Ok(())
    } else {
        Err(CaseFailure::new(message()))
    }
}

/// Check a GET result against the expected value
fn expect_value(key: &str, expected: Option<&str>, actual: Option<&Bytes>) -> CaseResult {
    let actual = actual.map(|b| &b[..]);
    ensure(expected.map(str::as_bytes) == actual, || {
        format!(
            "GET {}: expected {}, got {}",
            preview(key.as_bytes()),
            preview_opt(expected.map(str::as_bytes)),
            preview_opt(actual)
        )
    })
}

/// Check that a setup SET was applied
fn expect_stored(key: &str, reply: SetReply) -> CaseResult {
    ensure(reply.is_stored(), || {
        format!("SET {}: expected OK, got {:?}", preview(key.as_bytes()), reply)
    })
}

/// Check that a key no longer exists
async fn expect_absent(client: &mut Client, key: &str, context: &str) -> CaseResult {
    let exists = client.exists(key.to_owned()).await?;
    ensure(!exists, || {
        format!("{}: key {} still exists", context, preview(key.as_bytes()))
    })
}
