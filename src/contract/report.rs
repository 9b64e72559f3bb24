//! Case outcomes and the suite report

use super::Case;
use crate::error::ClientError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::fmt;

/// Characters of a value shown in failure messages
const PREVIEW_CHARS: usize = 48;

/// First divergence found by a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseFailure {
    pub message: String,
}

impl CaseFailure {
    pub fn new(message: impl Into<String>) -> Self {
        CaseFailure {
            message: message.into(),
        }
    }
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CaseFailure {}

impl From<ClientError> for CaseFailure {
    fn from(err: ClientError) -> Self {
        CaseFailure::new(format!("client error: {}", err))
    }
}

/// Printable rendering of a key or value
///
/// UTF-8 is truncated to a few dozen characters; anything else is shown as base64.
pub fn preview(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let mut chars = text.chars();
            let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
            if chars.next().is_some() {
                format!("{:?}...", head)
            } else {
                format!("{:?}", head)
            }
        }
        Err(_) => format!("base64:{}", STANDARD.encode(bytes)),
    }
}

/// Preview of an optional value, `<absent>` for none
pub fn preview_opt(bytes: Option<&[u8]>) -> String {
    bytes.map(preview).unwrap_or_else(|| "<absent>".to_string())
}

/// Result of one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    pub case: Case,
    pub elapsed_ms: f64,
    pub failure: Option<CaseFailure>,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Results of a suite run, in execution order
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Name of the endpoint under test
    pub target: String,
    pub outcomes: Vec<CaseOutcome>,
}

impl SuiteReport {
    pub fn new(target: impl Into<String>) -> Self {
        SuiteReport {
            target: target.into(),
            outcomes: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(CaseOutcome::passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    /// Outcome of a given case, if it ran
    pub fn outcome(&self, case: Case) -> Option<&CaseOutcome> {
        self.outcomes.iter().find(|o| o.case == case)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "conformance against {}", self.target)?;
        for outcome in &self.outcomes {
            let status = if outcome.passed() { "ok" } else { "FAILED" };
            writeln!(
                f,
                "  {:<20} {:>6} {:>10.1} ms",
                outcome.case.name(),
                status,
                outcome.elapsed_ms
            )?;
            if let Some(failure) = &outcome.failure {
                writeln!(f, "      {}", failure)?;
            }
        }
        let failed = self.failed().count();
        write!(
            f,
            "{} passed, {} failed",
            self.outcomes.len() - failed,
            failed
        )
    }
}
